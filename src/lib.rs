//! lanternd - a small single-server IRC daemon.
//!
//! The binary in `main.rs` wires these modules together; tests drive them
//! directly.

pub mod config;
pub mod error;
pub mod handlers;
pub mod modes;
pub mod network;
pub mod state;
pub mod supervisor;
