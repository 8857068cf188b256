//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: the typed snapshot (`Config`) and `ConfigError`
//! - [`provider`]: dotted-key access (`ConfigProvider`) and TOML layering
//! - [`defaults`]: built-in values for every defaulted key
//! - [`oper`]: operator blocks
//! - [`validation`]: startup checks

mod defaults;
mod oper;
mod provider;
mod types;
mod validation;

pub use defaults::DEFAULTS_TOML;
pub use oper::OperBlock;
pub use provider::{ConfigProvider, TomlProvider};
pub use types::{
    Config, ConfigError, LimitsConfig, ListenConfig, NickConfig, PingConfig, PolicyConfig,
    ServerConfig,
};
pub use validation::{ValidationError, validate};
