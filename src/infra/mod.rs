//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod memory;
pub mod telemetry;
pub mod terminal;
