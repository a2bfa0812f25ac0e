//! Database connection plumbing

pub mod pool;

pub use pool::{create_pool, test_connection, DatabaseConfig, SslMode};
