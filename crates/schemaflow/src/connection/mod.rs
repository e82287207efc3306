//! Pooled connections that run a migrator during initialization.

pub mod lifecycle;
pub mod pool;

pub use lifecycle::{Connection, ConnectionState, MigratedConnection, PluggableConnection};
pub use pool::{DriverPoolBuilder, PoolBuilder, PoolSettings};
