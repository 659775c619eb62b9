//! Document-side token pipeline.
//!
//! Each stage is a plain iterator adapter:
//!
//! ```text
//! Tokenizer -> SuffixExpander -> Collapse -> DocumentQuery
//! ```
//!
//! - [`tokenizer`] - Reference word tokenizer standing in for the upstream analyzer
//! - [`suffix`] - Keyword copy plus marked suffixes of every token
//! - [`dedup`] - Drops repeated `(field, text, start_offset)` tokens

pub mod dedup;
pub mod suffix;
pub mod tokenizer;

use std::sync::Arc;

pub use dedup::{collapse, Collapse};
pub use suffix::{expand, SuffixExpander};
pub use tokenizer::Tokenizer;

/// Context-free lower-casing shared by query terms and document tokens.
///
/// Chars are folded one at a time through their uppercase form, so every
/// case variant of a letter lands on the same lowercase char (`Σ`, `σ` and
/// final `ς` all become `σ`). `str::to_lowercase` is avoided because its
/// result for `Σ` depends on the neighbouring chars.
pub fn fold_case(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.chars() {
        let mut upper = ch.to_uppercase();
        match (upper.next(), upper.next()) {
            (Some(single), None) => folded.extend(single.to_lowercase()),
            _ => folded.extend(ch.to_lowercase()),
        }
    }
    folded
}

/// A token produced by the upstream text-analysis layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentToken {
    pub field: Arc<str>,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl DocumentToken {
    pub fn new(
        field: impl Into<Arc<str>>,
        text: impl Into<String>,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
            start_offset,
            end_offset,
        }
    }
}

/// What an expanded token stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GramKind {
    /// Unmarked copy of the source token, for exact-term lookups
    Keyword,
    /// A suffix of the source token (the first is the whole token) with the
    /// suffix marker appended
    Suffix,
    /// Stand-in for a token too long to expand; matches any anchor
    AnyToken,
}

/// Token emitted by the n-gram expander
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NGramToken {
    pub field: Arc<str>,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Start offset of the source token this was derived from
    pub origin: usize,
    pub kind: GramKind,
}

impl NGramToken {
    /// Copy of a source token, unchanged
    pub fn keyword(token: &DocumentToken) -> Self {
        Self {
            field: Arc::clone(&token.field),
            text: token.text.clone(),
            start_offset: token.start_offset,
            end_offset: token.end_offset,
            origin: token.start_offset,
            kind: GramKind::Keyword,
        }
    }

    /// True when both tokens collapse to one occurrence
    pub fn same_key(&self, other: &NGramToken) -> bool {
        self.start_offset == other.start_offset
            && self.text == other.text
            && self.field == other.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_case_ascii() {
        assert_eq!(fold_case("FooBAR_42"), "foobar_42");
    }

    #[test]
    fn test_fold_case_ignores_context() {
        // Word-final capital sigma folds like any other sigma
        assert_eq!(fold_case("ΟΣ"), "οσ");
        assert_eq!(fold_case("ΟΣΑ"), "οσα");
        assert_eq!(fold_case("ος"), "οσ");
        assert_eq!(fold_case("Σ"), fold_case("ς"));
    }

    #[test]
    fn test_fold_case_keeps_multi_char_uppercase() {
        assert_eq!(fold_case("ß"), "ß");
        assert_eq!(fold_case("\u{1E9E}"), "ß");
        assert_eq!(fold_case("\u{212A}"), "k");
    }
}
