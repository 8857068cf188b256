//! # lantern-proto
//!
//! Protocol building blocks for the lanternd IRC server:
//!
//! - line parsing and serialization ([`Message`], [`Prefix`])
//! - the closed numeric reply catalog ([`Response`])
//! - rfc1459 casemapping ([`irc_to_lower`], [`irc_eq`])
//! - glob matching for masks and LIST patterns ([`match_glob`])
//! - a tokio line codec ([`LineCodec`], behind the `tokio` feature)
//!
//! ```rust
//! use lantern_proto::{Message, Prefix};
//!
//! let msg: Message = "PRIVMSG #rust :hello there".parse().unwrap();
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.arg(1), Some("hello there"));
//!
//! let out = Message::new("NICK", Vec::<String>::new())
//!     .with_trailing("alice2")
//!     .with_prefix(Prefix::new("alice", "a", "host"));
//! assert_eq!(out.to_string(), ":alice!a@host NICK :alice2");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod error;
pub mod glob;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod prefix;
pub mod response;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use self::error::ProtocolError;
pub use self::glob::match_glob;
#[cfg(feature = "tokio")]
pub use self::line::{LineCodec, MAX_LINE_LEN};
pub use self::message::Message;
pub use self::prefix::Prefix;
pub use self::response::Response;
