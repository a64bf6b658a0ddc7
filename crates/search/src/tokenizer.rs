//! The single canonical tokenizer version, `simple-v1`: lowercase, extract
//! runs of word characters (Unicode alphanumerics plus underscore), split
//! each run further on underscores, drop empty tokens.
//!
//! This persists with the index (see `rlm-index`); changing the algorithm
//! must change this name.

use regex::Regex;
use std::sync::OnceLock;

pub const TOKENIZER_NAME: &str = "simple-v1";

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").unwrap())
}

pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_re()
        .find_iter(&lower)
        .flat_map(|m| m.as_str().split('_'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_extracts_word_runs() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn splits_word_runs_on_underscore() {
        assert_eq!(tokenize("snake_case_name"), vec!["snake", "case", "name"]);
    }

    #[test]
    fn drops_empty_tokens_from_leading_or_trailing_underscore() {
        assert_eq!(tokenize("_leading trailing_"), vec!["leading", "trailing"]);
    }

    #[test]
    fn single_character_tokens_are_kept() {
        assert_eq!(tokenize("a b c"), vec!["a", "b", "c"]);
    }
}
