//! SQLite persistence for lamess.
//!
//! The peer directory is backed by a single-file SQLite database under
//! the configured storage location. This crate owns the connection
//! pool, the schema migrations, and the per-entity repositories.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
