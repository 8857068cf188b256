//! Built-in configuration defaults.
//!
//! The operator's file is layered over [`DEFAULTS_TOML`], so every key listed
//! here resolves even when the file omits it. `server.name` has no default.

/// Defaults compiled into the binary.
pub const DEFAULTS_TOML: &str = r#"
[server]
network = "LanternNet"
description = "Lantern IRC Daemon"
password_required = false

[listen]
address = "0.0.0.0"
ports = [6667]
link_ports = []

[nick]
min_length = 1
max_length = 30
pattern = '^[A-Za-z\[\]\\`_^{|}][A-Za-z0-9\[\]\\`_^{|}-]*$'
blacklist = []

[ping]
frequency = 90
timeout = 120

[registration]
timeout = 60

[policy]
opers_set_user_modes = false
opers_set_channel_modes = false

[limits]
send_queue = 512
username_length = 10
channel_length = 50

[services]
nicks = []

[motd]
lines = []
"#;

// =============================================================================
// Fallbacks for optional keys
// =============================================================================

pub fn default_send_queue() -> usize {
    512
}

pub fn default_username_length() -> usize {
    10
}

pub fn default_channel_length() -> usize {
    50
}

pub fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

pub fn default_description() -> String {
    "Lantern IRC Daemon".to_string()
}
