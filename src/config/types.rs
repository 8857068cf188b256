//! Typed configuration snapshot.

use super::defaults::{
    default_channel_length, default_description, default_listen_address, default_send_queue,
    default_username_length,
};
use super::oper::OperBlock;
use super::provider::{ConfigProvider, TomlProvider};
use super::validation::{ValidationError, validate};
use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("required config key `{0}` is missing")]
    Missing(String),
    #[error("config key `{key}` has invalid value `{value}`: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error(
        "invalid configuration: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Validation(Vec<ValidationError>),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Listening sockets.
    pub listen: ListenConfig,
    /// Nickname rules.
    pub nick: NickConfig,
    /// Liveness supervision.
    pub ping: PingConfig,
    /// Time allowed between accept and registration.
    pub registration_timeout: Duration,
    /// Operator privilege switches.
    pub policy: PolicyConfig,
    /// Size limits.
    pub limits: LimitsConfig,
    /// Nicknames reserved by in-process services.
    pub services: Vec<String>,
    /// MOTD lines, sent after the welcome numerics.
    pub motd: Vec<String>,
    /// Operator credentials.
    pub opers: Vec<OperBlock>,
}

/// Server identity.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name (e.g., "irc.lantern.test").
    pub name: String,
    /// Network name shown in the welcome line.
    pub network: String,
    /// Free-form description.
    pub description: String,
    /// Whether clients must send a matching PASS before registering.
    pub password_required: bool,
    /// Connection password.
    pub password: Option<String>,
}

/// Listening sockets.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Bind address.
    pub address: String,
    /// Client ports. Port 0 picks an ephemeral port.
    pub ports: Vec<u16>,
    /// Server-link ports.
    pub link_ports: Vec<u16>,
}

/// Nickname rules.
#[derive(Debug, Clone)]
pub struct NickConfig {
    pub min_length: usize,
    /// Longer nicknames are truncated, not rejected.
    pub max_length: usize,
    /// Legality pattern.
    pub pattern: Regex,
    /// Glob patterns that may not be used as nicknames.
    pub blacklist: Vec<String>,
}

/// Liveness supervision.
#[derive(Debug, Clone, Copy)]
pub struct PingConfig {
    /// Idle time before the server sends a PING.
    pub frequency: Duration,
    /// Time allowed for the matching PONG.
    pub timeout: Duration,
}

/// Operator privilege switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyConfig {
    /// Opers may change other users' modes.
    pub opers_set_user_modes: bool,
    /// Opers may change modes of channels they are not in.
    pub opers_set_channel_modes: bool,
}

/// Size limits.
#[derive(Debug, Clone, Copy)]
pub struct LimitsConfig {
    /// Outbound queue depth per connection.
    pub send_queue: usize,
    pub username_length: usize,
    pub channel_length: usize,
}

impl Config {
    /// Load configuration from a TOML file layered over the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_provider(&TomlProvider::load(path)?)
    }

    /// Build configuration from TOML text layered over the defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Self::from_provider(&TomlProvider::parse(text)?)
    }

    /// Resolve and validate every key.
    ///
    /// A missing required key is fatal, so this must run before any
    /// listener opens.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let pattern_src = required_one(provider, "nick.pattern")?;
        let pattern = Regex::new(&pattern_src).map_err(|e| ConfigError::Invalid {
            key: "nick.pattern".into(),
            value: pattern_src.clone(),
            reason: e.to_string(),
        })?;

        let config = Config {
            server: ServerConfig {
                name: required_one(provider, "server.name")?,
                network: required_one(provider, "server.network")?,
                description: provider
                    .get_value("server.description")
                    .unwrap_or_else(default_description),
                password_required: parsed(provider, "server.password_required")?,
                password: provider.get_value("server.password"),
            },
            listen: ListenConfig {
                address: provider
                    .get_value("listen.address")
                    .unwrap_or_else(default_listen_address),
                ports: parsed_list(provider, "listen.ports")?,
                link_ports: optional_list(provider, "listen.link_ports")?,
            },
            nick: NickConfig {
                min_length: parsed(provider, "nick.min_length")?,
                max_length: parsed(provider, "nick.max_length")?,
                pattern,
                blacklist: required(provider, "nick.blacklist")?,
            },
            ping: PingConfig {
                frequency: Duration::from_secs(parsed(provider, "ping.frequency")?),
                timeout: Duration::from_secs(parsed(provider, "ping.timeout")?),
            },
            registration_timeout: Duration::from_secs(parsed(provider, "registration.timeout")?),
            policy: PolicyConfig {
                opers_set_user_modes: optional(provider, "policy.opers_set_user_modes", false)?,
                opers_set_channel_modes: optional(
                    provider,
                    "policy.opers_set_channel_modes",
                    false,
                )?,
            },
            limits: LimitsConfig {
                send_queue: optional(provider, "limits.send_queue", default_send_queue())?,
                username_length: optional(
                    provider,
                    "limits.username_length",
                    default_username_length(),
                )?,
                channel_length: optional(
                    provider,
                    "limits.channel_length",
                    default_channel_length(),
                )?,
            },
            services: provider.get_values("services.nicks").unwrap_or_default(),
            motd: provider.get_values("motd.lines").unwrap_or_default(),
            opers: provider.oper_blocks()?,
        };

        validate(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn required(provider: &dyn ConfigProvider, key: &str) -> Result<Vec<String>, ConfigError> {
    provider
        .get_values(key)
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn required_one(provider: &dyn ConfigProvider, key: &str) -> Result<String, ConfigError> {
    required(provider, key)?
        .into_iter()
        .next()
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn parse_value<T>(key: &str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
        value,
    })
}

fn parsed<T>(provider: &dyn ConfigProvider, key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, required_one(provider, key)?)
}

fn parsed_list<T>(provider: &dyn ConfigProvider, key: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    required(provider, key)?
        .into_iter()
        .map(|v| parse_value(key, v))
        .collect()
}

fn optional<T>(provider: &dyn ConfigProvider, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match provider.get_value(key) {
        Some(value) => parse_value(key, value),
        None => Ok(default),
    }
}

fn optional_list<T>(provider: &dyn ConfigProvider, key: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match provider.get_values(key) {
        Some(_) => parsed_list(provider, key),
        None => Ok(Vec::new()),
    }
}
