//! Application services layer.

pub mod browser;
pub mod error;
pub mod ingest;
pub mod repos;
