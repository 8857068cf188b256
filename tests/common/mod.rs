//! Integration test common infrastructure.
//!
//! Provides an in-process test server on an ephemeral port and a raw line
//! client for asserting on IRC message flows.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;

/// The command or numeric of a raw line (second word of a prefixed line).
#[allow(dead_code)]
pub fn code(line: &str) -> Option<&str> {
    if line.starts_with(':') {
        line.split(' ').nth(1)
    } else {
        line.split(' ').next()
    }
}
