//! Shell-style glob matching over `/`-separated paths.
//!
//! Supported syntax:
//!
//! | Token | Matches |
//! |-------|---------|
//! | `*`   | any run of characters within one path segment |
//! | `**`  | any run of characters across segments; `**/` also matches zero segments |
//! | `?`   | exactly one character other than `/` |
//!
//! # Example
//!
//! ```
//! use layerscan::glob::glob_match;
//!
//! assert!(glob_match("**/PKG-INFO", "/usr/lib/python3/site-packages/six.egg-info/PKG-INFO"));
//! assert!(glob_match("@types/*", "@types/node"));
//! assert!(!glob_match("/usr/*/PKG-INFO", "/usr/lib/deep/PKG-INFO"));
//! ```

use crate::error::{Error, Result};

/// Returns true if `text` matches `pattern` in its entirety.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

/// Rejects patterns that can never be meaningful.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(Error::Glob {
            pattern: pattern.to_string(),
            reason: "pattern is empty".to_string(),
        });
    }
    if pattern.contains("***") {
        return Err(Error::Glob {
            pattern: pattern.to_string(),
            reason: "more than two consecutive '*'".to_string(),
        });
    }
    Ok(())
}

fn match_from(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') if pattern.get(1) == Some(&'*') => {
            let rest = &pattern[2..];
            // `**/` may stand for no directory at all
            if rest.first() == Some(&'/') && match_from(&rest[1..], text) {
                return true;
            }
            (0..=text.len()).any(|i| match_from(rest, &text[i..]))
        }
        Some('*') => {
            let rest = &pattern[1..];
            for i in 0..=text.len() {
                if match_from(rest, &text[i..]) {
                    return true;
                }
                if i < text.len() && text[i] == '/' {
                    break;
                }
            }
            false
        }
        Some('?') => match text.first() {
            Some(c) if *c != '/' => match_from(&pattern[1..], &text[1..]),
            _ => false,
        },
        Some(c) => text.first() == Some(c) && match_from(&pattern[1..], &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("lodash", "lodash"));
        assert!(!glob_match("lodash", "underscore"));
    }

    #[test]
    fn test_glob_match_prefix() {
        assert!(glob_match("lodash*", "lodash"));
        assert!(glob_match("lodash*", "lodash.debounce"));
        assert!(!glob_match("lodash*", "underscore"));
    }

    #[test]
    fn test_glob_match_suffix() {
        assert!(glob_match("*-cli", "typescript-cli"));
        assert!(!glob_match("*-cli", "typescript"));
    }

    #[test]
    fn test_glob_match_contains() {
        assert!(glob_match("*lodash*", "my-lodash-plugin"));
        assert!(!glob_match("*lodash*", "underscore"));
    }

    #[test]
    fn test_single_star_stays_within_segment() {
        assert!(glob_match("/usr/*/PKG-INFO", "/usr/lib/PKG-INFO"));
        assert!(!glob_match("/usr/*/PKG-INFO", "/usr/lib/python/PKG-INFO"));
        assert!(glob_match("@types/*", "@types/node"));
        assert!(!glob_match("@types/*", "@babel/core"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert!(glob_match("**/Cargo.lock", "/Cargo.lock"));
        assert!(glob_match("**/Cargo.lock", "/src/app/Cargo.lock"));
        assert!(glob_match("**/Cargo.lock", "Cargo.lock"));
        assert!(!glob_match("**/Cargo.lock", "/src/app/Cargo.lock.bak"));
        assert!(glob_match(
            "**/*egg-info/PKG-INFO",
            "/site-packages/requests-2.22.0.egg-info/PKG-INFO"
        ));
        assert!(glob_match("/usr/**", "/usr/lib/a/b"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("/etc/?.conf", "/etc/a.conf"));
        assert!(!glob_match("/etc/?.conf", "/etc/ab.conf"));
        assert!(!glob_match("/a?b", "/a/b"));
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("**/PKG-INFO").is_ok());
        assert!(matches!(validate_pattern(""), Err(Error::Glob { .. })));
        assert!(matches!(validate_pattern("/***"), Err(Error::Glob { .. })));
    }
}
