//! Business logic services

pub mod config_resolver;
pub mod csv_header_reader;
pub mod error;
pub mod field_registry;
pub mod file_stager;
pub mod import_job_factory;
pub mod job_store;
pub mod mapping_validator;
pub mod pipeline;
pub mod storage;
