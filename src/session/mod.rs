// ABOUTME: Server session management
// Authenticated sessions, their connection pools, and the manager that tracks them by id

pub mod error;
pub mod manager;
pub mod pool;
pub mod server;

pub use error::SessionError;
pub use manager::SessionManager;
pub use pool::{ConnectionPool, PoolStats};
pub use server::{ConnectionState, ServerSession, SessionSettings};
