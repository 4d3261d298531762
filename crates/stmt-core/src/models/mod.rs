//! Data models shared by the pipeline stages.

pub mod config;
pub mod document;
pub mod transaction;
