//! Message prefixes.
//!
//! Server replies carry the server name; relayed client traffic carries the
//! originating client's `nick!user@host`.

use std::fmt;

/// Origin of a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// A server host name.
    ServerName(String),
    /// A client identity: nickname, username, hostname.
    Nickname(String, String, String),
}

impl Prefix {
    /// Build a client prefix.
    pub fn new(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Prefix::Nickname(nick.into(), user.into(), host.into())
    }

    /// Lenient parse of the text after a leading `:`.
    ///
    /// Anything without `!` or `@` is treated as a server name.
    pub fn parse(s: &str) -> Self {
        match s.split_once('!') {
            Some((nick, rest)) => {
                let (user, host) = rest.split_once('@').unwrap_or((rest, ""));
                Prefix::new(nick, user, host)
            }
            None => match s.split_once('@') {
                Some((nick, host)) => Prefix::new(nick, "", host),
                None => Prefix::ServerName(s.to_string()),
            },
        }
    }

    /// The nickname or server name part.
    pub fn name(&self) -> &str {
        match self {
            Prefix::ServerName(name) => name,
            Prefix::Nickname(nick, _, _) => nick,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{}", user)?;
                }
                if !host.is_empty() {
                    write!(f, "@{}", host)?;
                }
                Ok(())
            }
        }
    }
}
