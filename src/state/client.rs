//! Human users connected over a socket.

use super::connection::{Connection, ConnectionCore, ConnectionKind};
use super::flags::{FlagSet, Flagable};
use lantern_proto::Prefix;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identity fields. Every field may be filled in at any time, by commands or
/// by identity enrichment; the registration check reads whatever is present.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub nick: Option<String>,
    pub username: Option<String>,
    pub realname: Option<String>,
    pub hostname: String,
    pub ident_verified: bool,
    pub pass_accepted: bool,
    /// Name of the oper block used, once OPER succeeds.
    pub oper_name: Option<String>,
}

impl ClientInfo {
    /// Username as shown to others; `~` marks an unverified ident.
    pub fn display_username(&self) -> String {
        match (&self.username, self.ident_verified) {
            (Some(user), true) => user.clone(),
            (Some(user), false) => format!("~{user}"),
            (None, _) => "*".to_string(),
        }
    }

    pub fn prefix(&self) -> Prefix {
        Prefix::new(
            self.nick.as_deref().unwrap_or("*"),
            self.display_username(),
            self.hostname.as_str(),
        )
    }
}

pub struct Client {
    core: ConnectionCore,
    info: RwLock<ClientInfo>,
    flags: RwLock<FlagSet>,
    /// Case-folded names of joined channels.
    channels: Mutex<BTreeSet<String>>,
    password_required: bool,
    welcomed: AtomicBool,
}

impl Client {
    pub fn new(core: ConnectionCore, hostname: impl Into<String>, password_required: bool) -> Self {
        Self {
            core,
            info: RwLock::new(ClientInfo {
                hostname: hostname.into(),
                ..ClientInfo::default()
            }),
            flags: RwLock::new(FlagSet::new()),
            channels: Mutex::new(BTreeSet::new()),
            password_required,
            welcomed: AtomicBool::new(false),
        }
    }

    /// Snapshot of the identity fields.
    pub fn info(&self) -> ClientInfo {
        self.info.read().clone()
    }

    pub fn nick(&self) -> Option<String> {
        self.info.read().nick.clone()
    }

    pub fn prefix(&self) -> Prefix {
        self.info.read().prefix()
    }

    /// `user@host` as matched against oper host masks.
    pub fn user_host(&self) -> String {
        let info = self.info.read();
        format!("{}@{}", info.display_username(), info.hostname)
    }

    /// Replace the nickname, returning the previous one.
    ///
    /// Uniqueness is not checked here; callers go through
    /// `ConnectionRegistry::commit_nick`.
    pub(crate) fn set_nick(&self, nick: &str) -> Option<String> {
        self.info.write().nick.replace(nick.to_string())
    }

    pub fn set_username(&self, username: impl Into<String>) {
        self.info.write().username = Some(username.into());
    }

    pub fn set_realname(&self, realname: impl Into<String>) {
        self.info.write().realname = Some(realname.into());
    }

    pub fn set_hostname(&self, hostname: impl Into<String>) {
        self.info.write().hostname = hostname.into();
    }

    pub fn set_ident_verified(&self, verified: bool) {
        self.info.write().ident_verified = verified;
    }

    pub fn accept_password(&self) {
        self.info.write().pass_accepted = true;
    }

    pub fn set_oper_name(&self, name: Option<String>) {
        self.info.write().oper_name = name;
    }

    /// Claim the one-shot welcome. Only the first caller gets `true`.
    pub fn mark_welcomed(&self) -> bool {
        self.welcomed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_welcomed(&self) -> bool {
        self.welcomed.load(Ordering::Acquire)
    }

    pub fn is_oper(&self) -> bool {
        self.has_flag('o')
    }

    pub fn is_invisible(&self) -> bool {
        self.has_flag('i')
    }

    /// Case-folded names of the channels this client is on.
    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().iter().cloned().collect()
    }

    pub(crate) fn add_channel(&self, key: &str) {
        self.channels.lock().insert(key.to_string());
    }

    pub(crate) fn remove_channel(&self, key: &str) {
        self.channels.lock().remove(key);
    }
}

impl Flagable for Client {
    fn flags(&self) -> FlagSet {
        self.flags.read().clone()
    }

    fn set_flag(&self, letter: char, param: Option<String>) -> bool {
        self.flags.write().set(letter, param)
    }

    fn clear_flag(&self, letter: char) -> bool {
        self.flags.write().clear(letter)
    }

    fn has_flag(&self, letter: char) -> bool {
        self.flags.read().contains(letter)
    }
}

impl Connection for Client {
    fn core(&self) -> &ConnectionCore {
        &self.core
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Client
    }

    fn common_name(&self) -> Option<String> {
        self.nick()
    }

    fn is_registered(&self) -> bool {
        let info = self.info.read();
        info.nick.is_some()
            && info.username.is_some()
            && (!self.password_required || info.pass_accepted)
    }

    fn as_client(&self) -> Option<&Client> {
        Some(self)
    }
}
