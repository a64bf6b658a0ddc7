//! Minimal glob-pattern support for `docs.load`'s `glob`/`directory` sources.
//! Supports `*` (any run of non-separator characters), `**` (any run
//! including separators), and `?` (single character) — translated to a
//! regex rather than pulled in as a separate crate, since `regex` is already
//! a dependency throughout this workspace.

use std::path::{Path, PathBuf};

use regex::Regex;
use rlm_core::{Error, Result};

pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    re.push_str(".*");
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push('.'),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '[' | ']' | '\\' => {
                re.push('\\');
                re.push(c);
            }
            _ => re.push(c),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| Error::InvalidStrategy(format!("invalid pattern: {e}")))
}

/// Split a glob pattern into the longest wildcard-free leading directory and
/// the remaining pattern (relative, `/`-separated) matched against each
/// candidate's path relative to that base.
pub fn split_glob_base(pattern: &str) -> (PathBuf, String) {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    let mut in_rest = false;
    for component in path.components() {
        let s = component.as_os_str().to_string_lossy().to_string();
        if !in_rest && !s.contains('*') && !s.contains('?') {
            base.push(&s);
        } else {
            in_rest = true;
            rest.push(s);
        }
    }
    if rest.is_empty() {
        // No wildcard anywhere: match the base's file name exactly.
        if let Some(name) = base.file_name() {
            let name = name.to_string_lossy().to_string();
            base.pop();
            rest.push(name);
        }
    }
    (base, rest.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_within_one_segment() {
        let re = glob_to_regex("*.rs").unwrap();
        assert!(re.is_match("main.rs"));
        assert!(!re.is_match("sub/main.rs"));
    }

    #[test]
    fn double_star_matches_across_segments() {
        let re = glob_to_regex("**/*.rs").unwrap();
        assert!(re.is_match("sub/dir/main.rs"));
    }

    #[test]
    fn split_base_separates_fixed_prefix_from_pattern() {
        let (base, rest) = split_glob_base("docs/guides/**/*.md");
        assert_eq!(base, PathBuf::from("docs/guides"));
        assert_eq!(rest, "**/*.md");
    }
}
