//! Operator block configuration.

use lantern_proto::match_glob;
use serde::Deserialize;

/// Operator block configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OperBlock {
    /// Operator name (used in OPER command).
    pub name: String,
    /// Password (plaintext or bcrypt hash).
    pub password: String,
    /// Optional `user@host` mask restriction (e.g., "*@trusted.host").
    pub hostmask: Option<String>,
}

impl OperBlock {
    /// Verify the provided password against the stored password (plaintext or bcrypt).
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password.starts_with("$2") {
            bcrypt::verify(password, &self.password).unwrap_or(false)
        } else {
            self.password == password
        }
    }

    /// Whether a client at `user@host` may use this block.
    pub fn allows(&self, user_host: &str) -> bool {
        self.hostmask
            .as_deref()
            .is_none_or(|mask| match_glob(mask, user_host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(password: &str, hostmask: Option<&str>) -> OperBlock {
        OperBlock {
            name: "root".into(),
            password: password.into(),
            hostmask: hostmask.map(Into::into),
        }
    }

    #[test]
    fn plaintext_password() {
        let oper = block("hunter2", None);
        assert!(oper.verify_password("hunter2"));
        assert!(!oper.verify_password("hunter3"));
    }

    #[test]
    fn bcrypt_password() {
        let hash = bcrypt::hash("s3cret", 4).unwrap();
        let oper = block(&hash, None);
        assert!(oper.verify_password("s3cret"));
        assert!(!oper.verify_password("S3cret"));
    }

    #[test]
    fn hostmask_restricts_origin() {
        let oper = block("x", Some("*@10.0.*"));
        assert!(oper.allows("~alice@10.0.0.7"));
        assert!(!oper.allows("~alice@192.168.0.7"));
        assert!(block("x", None).allows("anyone@anywhere"));
    }
}
