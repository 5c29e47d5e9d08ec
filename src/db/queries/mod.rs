//! Database queries

pub mod contact_field;
pub mod import_job;
