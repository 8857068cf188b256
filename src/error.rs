//! Unified error handling for lanternd.
//!
//! Handler and channel failures carry enough context to be rendered as the
//! numeric reply the client should see.

use lantern_proto::{Message, Response};
use thiserror::Error;

// ============================================================================
// Handler Errors (command processing)
// ============================================================================

/// Errors that can occur during command handling.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("no nickname given")]
    NoNicknameGiven,

    #[error("erroneous nickname: {0}")]
    ErroneousNickname(String),

    #[error("nickname in use: {0}")]
    NicknameInUse(String),

    #[error("not registered")]
    NotRegistered,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("password mismatch")]
    PasswordMismatch,

    #[error("no recipient given")]
    NoRecipient,

    #[error("no text to send")]
    NoTextToSend,

    #[error("no such nick: {0}")]
    NoSuchNick(String),

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("bad channel mask: {0}")]
    BadChanMask(String),

    #[error("not an IRC operator")]
    NoPrivileges,

    #[error("no oper block matches")]
    NoOperHost,

    #[error("cannot change mode for other users")]
    UsersDontMatch,

    #[error("{channel}: {error}")]
    Channel {
        channel: String,
        #[source]
        error: ChannelError,
    },

    /// Disconnect the client; the reason ends up in the closing ERROR line.
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("client quit: {0:?}")]
    Quit(Option<String>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Build the channel variant.
    pub fn channel(channel: impl Into<String>, error: ChannelError) -> Self {
        Self::Channel {
            channel: channel.into(),
            error,
        }
    }

    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NeedMoreParams => "need_more_params",
            Self::NoNicknameGiven => "no_nickname_given",
            Self::ErroneousNickname(_) => "erroneous_nickname",
            Self::NicknameInUse(_) => "nickname_in_use",
            Self::NotRegistered => "not_registered",
            Self::AlreadyRegistered => "already_registered",
            Self::PasswordMismatch => "password_mismatch",
            Self::NoRecipient => "no_recipient",
            Self::NoTextToSend => "no_text_to_send",
            Self::NoSuchNick(_) => "no_such_nick",
            Self::NoSuchChannel(_) => "no_such_channel",
            Self::BadChanMask(_) => "bad_chan_mask",
            Self::NoPrivileges => "no_privileges",
            Self::NoOperHost => "no_oper_host",
            Self::UsersDontMatch => "users_dont_match",
            Self::Channel { .. } => "channel_error",
            Self::AccessDenied(_) => "access_denied",
            Self::Quit(_) => "quit",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Convert to an IRC error reply message.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply
    /// (quit, access denied, internal errors).
    pub fn to_irc_reply(&self, server_name: &str, nick: &str, cmd_name: &str) -> Option<Message> {
        let reply = |response: Response, args: &[&str]| Message::reply(server_name, response, args);
        Some(match self {
            Self::NeedMoreParams => reply(Response::ERR_NEEDMOREPARAMS, &[nick, cmd_name]),
            Self::NoNicknameGiven => reply(Response::ERR_NONICKNAMEGIVEN, &[nick]),
            Self::ErroneousNickname(bad) => reply(Response::ERR_ERRONEUSNICKNAME, &[nick, bad.as_str()]),
            Self::NicknameInUse(taken) => reply(Response::ERR_NICKNAMEINUSE, &[nick, taken.as_str()]),
            Self::NotRegistered => reply(Response::ERR_NOTREGISTERED, &[nick]),
            Self::AlreadyRegistered => reply(Response::ERR_ALREADYREGISTRED, &[nick]),
            Self::PasswordMismatch => reply(Response::ERR_PASSWDMISMATCH, &[nick]),
            Self::NoRecipient => reply(Response::ERR_NORECIPIENT, &[nick, cmd_name]),
            Self::NoTextToSend => reply(Response::ERR_NOTEXTTOSEND, &[nick]),
            Self::NoSuchNick(target) => reply(Response::ERR_NOSUCHNICK, &[nick, target.as_str()]),
            Self::NoSuchChannel(chan) => reply(Response::ERR_NOSUCHCHANNEL, &[nick, chan.as_str()]),
            Self::BadChanMask(chan) => reply(Response::ERR_BADCHANMASK, &[nick, chan.as_str()]),
            Self::NoPrivileges => reply(Response::ERR_NOPRIVILEGES, &[nick]),
            Self::NoOperHost => reply(Response::ERR_NOOPERHOST, &[nick]),
            Self::UsersDontMatch => reply(Response::ERR_USERSDONTMATCH, &[nick]),
            Self::Channel { channel, error } => error.to_irc_reply(server_name, nick, channel),

            // These errors don't get client-visible replies
            Self::AccessDenied(_) | Self::Quit(_) | Self::Internal(_) => return None,
        })
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Channel operation errors.
///
/// These represent channel-specific failures that handler code maps to
/// numeric replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("not on channel")]
    NotOnChannel,

    #[error("you're not channel operator")]
    ChanOpPrivsNeeded,

    #[error("user {0} is not on that channel")]
    UserNotInChannel(String),

    #[error("cannot join channel (+l)")]
    ChannelIsFull,

    #[error("cannot join channel (+k)")]
    BadChannelKey,

    #[error("cannot send to channel")]
    CannotSendToChan,

    #[error("channel is being deleted")]
    Tombstone,
}

impl ChannelError {
    /// Convert to an IRC error reply message.
    pub fn to_irc_reply(&self, server_name: &str, nick: &str, channel: &str) -> Message {
        let (response, args): (Response, Vec<&str>) = match self {
            Self::NotOnChannel => (Response::ERR_NOTONCHANNEL, vec![nick, channel]),
            Self::ChanOpPrivsNeeded => (Response::ERR_CHANOPRIVSNEEDED, vec![nick, channel]),
            Self::UserNotInChannel(target) => {
                (Response::ERR_USERNOTINCHANNEL, vec![nick, target.as_str(), channel])
            }
            Self::ChannelIsFull => (Response::ERR_CHANNELISFULL, vec![nick, channel]),
            Self::BadChannelKey => (Response::ERR_BADCHANNELKEY, vec![nick, channel]),
            Self::CannotSendToChan => (Response::ERR_CANNOTSENDTOCHAN, vec![nick, channel]),
            Self::Tombstone => (Response::ERR_NOSUCHCHANNEL, vec![nick, channel]),
        };
        Message::reply(server_name, response, &args)
    }
}
