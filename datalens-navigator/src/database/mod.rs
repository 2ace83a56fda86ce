//! Database access layer
//!
//! Connection resolution, pooling and execution of the generated queries
//! against PostgreSQL.

pub mod jdbc;
pub mod pool;
pub mod postgres;
pub mod traits;

// Re-export the main types
pub use pool::{ConnectionDefaults, PoolKey, PoolManager, PoolSettings};
pub use postgres::PostgresProvider;
pub use traits::{DatabaseError, DatabaseProvider, ResolvedConnection};
