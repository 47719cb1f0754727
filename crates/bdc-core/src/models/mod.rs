//! Data models: input documents, extracted records, and configuration.

pub mod config;
pub mod document;
pub mod record;
