//! Network module.
//!
//! Contains the Gateway (TCP listeners) and the per-connection task.

mod connection;
mod gateway;

pub use connection::ConnectionTask;
pub use gateway::Gateway;
