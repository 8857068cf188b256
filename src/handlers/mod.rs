//! IRC command handlers.
//!
//! Client lines go through the [`Registry`], which maps each command word to
//! a [`Handler`]. Server links are not clients and take the much smaller
//! path in [`handle_link_line`].

mod channel;
mod connection;
mod core;
mod link;
mod messaging;
mod mode;
mod oper;
mod welcome;

pub use self::core::{Context, Handler, Phase, Registry};
pub use channel::{JoinHandler, ListHandler, NamesHandler, PartHandler, TopicHandler};
pub use connection::{NickHandler, PassHandler, PingHandler, PongHandler, QuitHandler, UserHandler};
pub use link::{LinkAction, handle_link_line};
pub use messaging::PrivmsgHandler;
pub use mode::ModeHandler;
pub use oper::{KillHandler, OperHandler, StopHandler};
pub use welcome::complete_registration;
