//! Character-keyed mode flags shared by users and channels.
//!
//! Storage is deliberately opaque: a flag is a letter plus an optional
//! parameter. Which letters exist, who may set them and whether they take a
//! parameter is decided by the mode engine (`crate::modes`).

use std::collections::BTreeMap;

/// An ordered set of mode flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: BTreeMap<char, Option<String>>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, letter: char) -> bool {
        self.flags.contains_key(&letter)
    }

    /// Parameter attached to `letter`, if the flag is set and has one.
    pub fn param(&self, letter: char) -> Option<&str> {
        self.flags.get(&letter)?.as_deref()
    }

    /// Set a flag. Returns `true` if the set changed.
    pub fn set(&mut self, letter: char, param: Option<String>) -> bool {
        match self.flags.insert(letter, param.clone()) {
            Some(previous) => previous != param,
            None => true,
        }
    }

    /// Clear a flag. Returns `true` if it was set.
    pub fn clear(&mut self, letter: char) -> bool {
        self.flags.remove(&letter).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn letters(&self) -> impl Iterator<Item = char> + '_ {
        self.flags.keys().copied()
    }

    /// Mode string in reply form: `+lnt 10`. Parameters follow the letters
    /// in letter order.
    pub fn mode_string(&self) -> String {
        self.mode_args(&[]).join(" ")
    }

    /// The letters, then one argument per parameter. Letters in `hidden`
    /// are listed but their parameters are left out.
    pub fn mode_args(&self, hidden: &[char]) -> Vec<String> {
        let mut letters = String::from("+");
        let mut params = Vec::new();
        for (letter, param) in &self.flags {
            letters.push(*letter);
            if let Some(param) = param.as_ref().filter(|_| !hidden.contains(letter)) {
                params.push(param.clone());
            }
        }
        std::iter::once(letters).chain(params).collect()
    }
}

/// Anything that holds mode flags behind its own lock.
pub trait Flagable {
    /// Snapshot of the current flags.
    fn flags(&self) -> FlagSet;

    /// Set a flag. Returns `true` if anything changed.
    fn set_flag(&self, letter: char, param: Option<String>) -> bool;

    /// Clear a flag. Returns `true` if it was set.
    fn clear_flag(&self, letter: char) -> bool;

    fn has_flag(&self, letter: char) -> bool {
        self.flags().contains(letter)
    }

    fn flag_param(&self, letter: char) -> Option<String> {
        self.flags().param(letter).map(str::to_string)
    }

    fn mode_string(&self) -> String {
        self.flags().mode_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_changes() {
        let mut flags = FlagSet::new();
        assert!(flags.set('i', None));
        assert!(!flags.set('i', None));
        assert!(flags.set('k', Some("one".into())));
        assert!(flags.set('k', Some("two".into())));
        assert_eq!(flags.param('k'), Some("two"));
    }

    #[test]
    fn set_then_clear_round_trips() {
        let mut flags = FlagSet::new();
        flags.set('n', None);
        flags.set('l', Some("5".into()));
        let before = flags.clone();

        for letter in ['s', 't', 'k'] {
            flags.set(letter, Some("x".into()).filter(|_| letter == 'k'));
            flags.clear(letter);
        }
        assert_eq!(flags, before);
    }

    #[test]
    fn clear_of_unset_flag_is_a_no_op() {
        let mut flags = FlagSet::new();
        assert!(!flags.clear('o'));
        assert!(flags.is_empty());
    }

    #[test]
    fn mode_string_lists_params_in_letter_order() {
        let mut flags = FlagSet::new();
        flags.set('t', None);
        flags.set('l', Some("10".into()));
        flags.set('k', Some("secret".into()));
        assert_eq!(flags.mode_string(), "+klt secret 10");
        assert_eq!(FlagSet::new().mode_string(), "+");
    }

    #[test]
    fn hidden_params_keep_their_letter() {
        let mut flags = FlagSet::new();
        flags.set('k', Some("secret".into()));
        flags.set('l', Some("10".into()));
        assert_eq!(flags.mode_args(&['k']), vec!["+kl", "10"]);
        assert_eq!(flags.mode_args(&[]), vec!["+kl", "secret", "10"]);
    }
}
