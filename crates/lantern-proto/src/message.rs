//! Line parsing and serialization.
//!
//! Wire form: `[:prefix] COMMAND arg1 arg2 ... [:trailing with spaces]`.
//!
//! Parsing is applied once per line. The first token (after an optional
//! prefix) is the command word, folded to upper case. A parameter token that
//! begins with `:` starts the trailing parameter, which runs to the end of
//! the line. A `:` in the middle of a token is ordinary text.

use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};
use crate::prefix::Prefix;
use crate::response::Response;

/// A single protocol line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Origin, if any.
    pub prefix: Option<Prefix>,
    /// Command word (upper case) or three-digit numeric.
    pub command: String,
    /// Leading parameters followed by the trailing parameter, if present.
    pub params: Vec<String>,
    /// Whether the last parameter is written in trailing (`:`) form even
    /// when it would not need to be.
    trailing: bool,
}

#[inline]
fn is_separator(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Split the parameter section of a line into arguments.
///
/// Returns the arguments and whether the final one was a trailing parameter.
fn split_params(mut rest: &str) -> (Vec<String>, bool) {
    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(is_separator);
        if rest.is_empty() {
            return (params, false);
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing.to_string());
            return (params, true);
        }
        let end = rest.find(is_separator).unwrap_or(rest.len());
        params.push(rest[..end].to_string());
        rest = &rest[end..];
    }
}

impl Message {
    /// Build a message from a command word and parameters.
    pub fn new<I, S>(command: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
            trailing: false,
        }
    }

    /// Build a numeric reply from the catalog, prefixed with the server name.
    ///
    /// # Panics
    ///
    /// Panics if `args` is shorter than the reply's arity.
    pub fn reply(server: &str, response: Response, args: &[&str]) -> Self {
        let (params, trailing) = response.params(args);
        Self {
            prefix: Some(Prefix::ServerName(server.to_string())),
            command: response.code_str(),
            params,
            trailing,
        }
    }

    /// Parse one line. Trailing CR/LF is ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let mut rest = line
            .trim_end_matches(['\r', '\n'])
            .trim_start_matches(is_separator);
        if rest.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }

        let prefix = match rest.strip_prefix(':') {
            Some(after) => {
                let end = after.find(is_separator).unwrap_or(after.len());
                let prefix = Prefix::parse(&after[..end]);
                rest = after[end..].trim_start_matches(is_separator);
                Some(prefix)
            }
            None => None,
        };
        if rest.is_empty() {
            return Err(ProtocolError::MissingCommand);
        }

        let end = rest.find(is_separator).unwrap_or(rest.len());
        let command = rest[..end].to_ascii_uppercase();
        let (params, trailing) = split_params(&rest[end..]);

        Ok(Self {
            prefix,
            command,
            params,
            trailing,
        })
    }

    /// Attach a prefix.
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Append a parameter that is always written in trailing form.
    pub fn with_trailing(mut self, text: impl Into<String>) -> Self {
        self.params.push(text.into());
        self.trailing = true;
        self
    }

    /// Append plain parameters, ahead of the trailing one if there is one.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let at = if self.trailing {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        };
        self.params.splice(at..at, args.into_iter().map(Into::into));
        self
    }

    /// Parameter `n`, if present.
    #[inline]
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }

    /// All parameters, trailing one included.
    #[inline]
    pub fn args(&self) -> &[String] {
        &self.params
    }

    /// Whether the last parameter arrived (or will be sent) after a `:`.
    #[inline]
    pub fn has_trailing(&self) -> bool {
        self.trailing
    }

    /// Numeric code, if the command is a three-digit reply.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;

        let Some((last, leading)) = self.params.split_last() else {
            return Ok(());
        };
        for param in leading {
            write!(f, " {}", param)?;
        }
        let needs_colon = self.trailing
            || last.is_empty()
            || last.starts_with(':')
            || last.contains(is_separator);
        if needs_colon {
            write!(f, " :{}", last)
        } else {
            write!(f, " {}", last)
        }
    }
}
