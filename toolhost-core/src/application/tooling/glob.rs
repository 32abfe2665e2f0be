//! Minimal glob matching over tool names.
//!
//! `*` matches any run of characters, including none. Every other character
//! matches itself. Matching is case-sensitive and anchored to the whole name.

use regex::Regex;
use tracing::warn;

pub fn matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }

    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match Regex::new(&format!("^(?s:{body})$")) {
        Ok(regex) => regex.is_match(name),
        Err(err) => {
            warn!(pattern, %err, "glob pattern did not compile");
            false
        }
    }
}

pub fn matches_any<S: AsRef<str>>(patterns: &[S], name: &str) -> bool {
    patterns.iter().any(|pattern| matches(pattern.as_ref(), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns_require_exact_equality() {
        assert!(matches("read_file", "read_file"));
        assert!(!matches("read_file", "read_file2"));
        assert!(!matches("read_file", "Read_file"));
        assert!(!matches("file", "read_file"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(matches("read*", "read_file"));
        assert!(matches("read*", "read"));
        assert!(!matches("read*", "write_file"));
        assert!(matches("*_file", "write_file"));
        assert!(matches("fs_*_v2", "fs_read_v2"));
        assert!(!matches("fs_*_v2", "fs_read_v3"));
    }

    #[test]
    fn lone_star_matches_everything() {
        for name in ["", "a", "server__tool", "line\nbreak"] {
            assert!(matches("*", name), "{name:?}");
        }
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(matches("a.b*", "a.bc"));
        assert!(!matches("a.b*", "axbc"));
        assert!(matches("(x)+*", "(x)+y"));
        assert!(!matches("x?", "x"));
    }

    #[test]
    fn any_of_several_patterns() {
        let patterns = vec!["fs_*".to_string(), "net_fetch".to_string()];
        assert!(matches_any(&patterns, "net_fetch"));
        assert!(matches_any(&patterns, "fs_read"));
        assert!(!matches_any(&patterns, "net_post"));
        assert!(!matches_any::<String>(&[], "fs_read"));
    }
}
