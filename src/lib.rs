// ABOUTME: Library root for shipit - exposes the engine, shippers, and config for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod shippers;
pub mod types;
