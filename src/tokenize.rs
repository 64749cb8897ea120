// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! ASCII alphanumeric-run tokenizer.
//!
//! Splits text into maximal runs of ASCII letters and digits, lowercased.
//! No Unicode-aware segmentation, no stemming, no stopword removal: those
//! are explicitly out of scope.

/// Tokenizes `text` into lowercase ASCII alphanumeric runs, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_lowercases() {
        assert_eq!(
            tokenize("Hello, World! 123-go"),
            vec!["hello", "world", "123", "go"]
        );
    }

    #[test]
    fn ignores_non_ascii_letters() {
        assert_eq!(tokenize("café naïve"), vec!["caf", "na", "ve"]);
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n  ").is_empty());
    }

    #[test]
    fn leading_and_trailing_punctuation() {
        assert_eq!(tokenize("--hello--"), vec!["hello"]);
    }
}
