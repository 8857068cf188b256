//! State management module.
//!
//! Contains the Hub (shared server state), the two registries, and the
//! connection and channel entities they hold.

mod channel;
mod channels;
mod client;
mod connection;
mod flags;
mod hub;
mod link;
mod registry;
mod service;

pub use channel::{Channel, JoinOutcome, Topic};
pub use channels::{ChannelRegistry, is_valid_channel_name};
pub use client::{Client, ClientInfo};
pub use connection::{
    ConnId, Connection, ConnectionCore, ConnectionKind, Liveness, LivenessAction,
};
pub use flags::{FlagSet, Flagable};
pub use hub::{Hub, VERSION};
pub use link::ServerLink;
pub use registry::{ConnectionRegistry, NickCollision};
pub use service::Service;
