//! Glob matching for LIST patterns, blacklists and hostmasks.
//!
//! `*` matches any run of characters (including none), `?` matches exactly
//! one. Comparison is case-insensitive under rfc1459 casemapping.

use crate::casemap::irc_lower_char;

/// Match `text` against a glob `pattern`.
///
/// ```
/// use lantern_proto::match_glob;
///
/// assert!(match_glob("*", ""));
/// assert!(match_glob("a*d", "abcd"));
/// assert!(match_glob("#RUST*", "#rust-beginners"));
/// assert!(!match_glob("f?o", "!oo"));
/// ```
pub fn match_glob(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(irc_lower_char).collect();
    let text: Vec<char> = text.chars().map(irc_lower_char).collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(&'*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, tried)) => {
                    p = star + 1;
                    t = tried + 1;
                    backtrack = Some((star, tried + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
