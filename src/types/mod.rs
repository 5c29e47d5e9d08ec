//! Type definitions

pub mod field_mapping;
pub mod import_job;
pub mod messages;
pub mod parser_config;
pub mod upload;

pub use field_mapping::*;
pub use import_job::*;
pub use messages::*;
pub use parser_config::*;
pub use upload::*;
