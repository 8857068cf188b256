//! Key/value access to layered configuration.
//!
//! Keys are dotted paths (`nick.max_length`). A scalar resolves to a
//! one-element list, an array of scalars to its elements in order.

use super::defaults::DEFAULTS_TOML;
use super::oper::OperBlock;
use super::types::ConfigError;
use std::path::Path;
use toml::{Table, Value};

/// Source of configuration values.
pub trait ConfigProvider: Send + Sync {
    /// All values stored under `key`, or `None` if the key is absent.
    fn get_values(&self, key: &str) -> Option<Vec<String>>;

    /// First value stored under `key`.
    fn get_value(&self, key: &str) -> Option<String> {
        self.get_values(key)?.into_iter().next()
    }

    /// Structured `[[oper]]` blocks. Providers without structure have none.
    fn oper_blocks(&self) -> Result<Vec<OperBlock>, ConfigError> {
        Ok(Vec::new())
    }
}

/// A TOML document layered over the built-in defaults.
#[derive(Debug, Clone)]
pub struct TomlProvider {
    root: Table,
}

impl TomlProvider {
    /// Parse `text` and layer it over the defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let base: Table = DEFAULTS_TOML.parse()?;
        let overlay: Table = text.parse()?;
        Ok(Self::layered(base, overlay))
    }

    /// Read and parse a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Overlay `overlay` onto `base`. Tables merge key by key; any other
    /// value in the overlay replaces the base value outright.
    pub fn layered(mut base: Table, overlay: Table) -> Self {
        merge(&mut base, overlay);
        Self { root: base }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut value = self.root.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }
}

fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(inner)), Value::Table(over)) => merge(inner, over),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(d) => Some(d.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

impl ConfigProvider for TomlProvider {
    fn get_values(&self, key: &str) -> Option<Vec<String>> {
        match self.lookup(key)? {
            Value::Array(items) => items.iter().map(scalar).collect(),
            other => scalar(other).map(|s| vec![s]),
        }
    }

    fn oper_blocks(&self) -> Result<Vec<OperBlock>, ConfigError> {
        match self.root.get("oper") {
            Some(value) => Ok(value.clone().try_into()?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_without_a_file() {
        let provider = TomlProvider::parse("").unwrap();
        assert_eq!(provider.get_values("listen.ports"), Some(vec!["6667".into()]));
        assert_eq!(provider.get_value("ping.frequency").as_deref(), Some("90"));
        assert_eq!(provider.get_values("nick.blacklist"), Some(vec![]));
        assert_eq!(provider.get_value("server.name"), None);
    }

    #[test]
    fn file_overrides_defaults_key_by_key() {
        let provider = TomlProvider::parse(
            r#"
            [server]
            name = "irc.example.org"

            [nick]
            max_length = 9
            "#,
        )
        .unwrap();
        assert_eq!(provider.get_value("server.name").as_deref(), Some("irc.example.org"));
        assert_eq!(provider.get_value("nick.max_length").as_deref(), Some("9"));
        // Sibling keys from the defaults survive the merge.
        assert_eq!(provider.get_value("nick.min_length").as_deref(), Some("1"));
        assert_eq!(provider.get_value("server.network").as_deref(), Some("LanternNet"));
    }

    #[test]
    fn arrays_replace_rather_than_append() {
        let provider = TomlProvider::parse("[listen]\nports = [7000, 7001]").unwrap();
        assert_eq!(
            provider.get_values("listen.ports"),
            Some(vec!["7000".into(), "7001".into()])
        );
    }

    #[test]
    fn tables_are_not_values() {
        let provider = TomlProvider::parse("").unwrap();
        assert_eq!(provider.get_values("nick"), None);
        assert_eq!(provider.get_values("nick.pattern.deeper"), None);
    }

    #[test]
    fn parses_oper_blocks() {
        let provider = TomlProvider::parse(
            r#"
            [[oper]]
            name = "root"
            password = "hunter2"
            hostmask = "*@127.0.0.1"
            "#,
        )
        .unwrap();
        let opers = provider.oper_blocks().unwrap();
        assert_eq!(opers.len(), 1);
        assert_eq!(opers[0].name, "root");
        assert_eq!(opers[0].hostmask.as_deref(), Some("*@127.0.0.1"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            TomlProvider::parse("[server"),
            Err(ConfigError::Parse(_))
        ));
    }
}
