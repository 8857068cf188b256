//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use lantern_proto::irc_to_lower;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name must be non-empty and contain no spaces, got '{0}'")]
    InvalidServerName(String),
    #[error("server.network is required")]
    MissingNetworkName,
    #[error("listen.ports must name at least one port")]
    NoListenPorts,
    #[error("nick.min_length ({min}) must be at least 1 and not exceed nick.max_length ({max})")]
    NickLengthBounds { min: usize, max: usize },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("server.password_required is set but server.password is missing")]
    PasswordRequiredWithoutPassword,
    #[error("services.nicks entry '{0}' is not a legal nickname")]
    InvalidServiceNick(String),
    #[error("services.nicks entry '{0}' is listed twice")]
    DuplicateServiceNick(String),
    #[error("limits.send_queue must be greater than zero")]
    EmptySendQueue,
    #[error("oper block '{0}' has an empty password")]
    EmptyOperPassword(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = &config.server.name;
    if name.is_empty() || name.contains(char::is_whitespace) {
        errors.push(ValidationError::InvalidServerName(name.clone()));
    }
    if config.server.network.is_empty() {
        errors.push(ValidationError::MissingNetworkName);
    }
    if config.listen.ports.is_empty() {
        errors.push(ValidationError::NoListenPorts);
    }

    let (min, max) = (config.nick.min_length, config.nick.max_length);
    if min == 0 || min > max {
        errors.push(ValidationError::NickLengthBounds { min, max });
    }

    if config.ping.frequency.is_zero() {
        errors.push(ValidationError::ZeroDuration("ping.frequency"));
    }
    if config.ping.timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("ping.timeout"));
    }
    if config.registration_timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("registration.timeout"));
    }

    if config.server.password_required && config.server.password.is_none() {
        errors.push(ValidationError::PasswordRequiredWithoutPassword);
    }

    let mut seen = HashSet::new();
    for nick in &config.services {
        let len = nick.chars().count();
        if !config.nick.pattern.is_match(nick) || len < min || len > max {
            errors.push(ValidationError::InvalidServiceNick(nick.clone()));
        }
        if !seen.insert(irc_to_lower(nick)) {
            errors.push(ValidationError::DuplicateServiceNick(nick.clone()));
        }
    }

    if config.limits.send_queue == 0 {
        errors.push(ValidationError::EmptySendQueue);
    }

    for oper in &config.opers {
        if oper.password.is_empty() {
            errors.push(ValidationError::EmptyOperPassword(oper.name.clone()));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
