//! Query-side term extraction.
//!
//! Each registered query is reduced to a set of [`QueryTerm`]s: if a
//! document matches the query, it contains at least one of them. Leaf
//! clauses are handled by pluggable [`TermExtractor`]s:
//!
//! - [`exact::ExactTermExtractor`] - plain term clauses
//! - [`anchor::AnchorExtractor`] - wildcard, regex and prefix clauses,
//!   indexed by their longest literal run plus the suffix marker

pub mod anchor;
pub mod exact;

use crate::error::Result;
use crate::query::QueryClause;
use serde::{Deserialize, Serialize};

pub use anchor::AnchorExtractor;
pub use exact::ExactTermExtractor;

/// How a term is matched against a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// Equal to a document token
    Exact,
    /// Literal run of a pattern plus the suffix marker; found through the
    /// document's marked suffixes
    AnchoredPattern,
    /// Always present in every document
    AnyToken,
}

/// An indexable term derived from a query
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryTerm {
    pub field: String,
    pub text: String,
    pub kind: TermKind,
}

impl QueryTerm {
    pub fn exact(field: &str, text: &str) -> Self {
        Self {
            field: field.to_string(),
            text: text.to_string(),
            kind: TermKind::Exact,
        }
    }

    pub fn any_token(any_token: &str) -> Self {
        Self {
            field: String::new(),
            text: any_token.to_string(),
            kind: TermKind::AnyToken,
        }
    }

    /// Anchor text without the trailing marker
    pub fn anchor_body<'t>(&'t self, marker: &str) -> &'t str {
        match self.kind {
            TermKind::AnchoredPattern => self.text.strip_suffix(marker).unwrap_or(&self.text),
            _ => &self.text,
        }
    }
}

/// Outcome of extracting one clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A matching document contains at least one of these terms
    Terms(Vec<QueryTerm>),
    /// Nothing narrows this clause; its query is always a candidate
    Unconstrained,
}

impl Extraction {
    /// Selectivity used to choose among the children of a conjunction.
    /// Longer terms are rarer; exact terms beat anchors of equal length
    /// since an anchor also matches longer tokens.
    pub fn weight(&self, marker: &str) -> Option<usize> {
        match self {
            Extraction::Unconstrained => None,
            Extraction::Terms(terms) => terms
                .iter()
                .map(|term| match term.kind {
                    TermKind::Exact => 2 * term.text.chars().count() + 1,
                    TermKind::AnchoredPattern => 2 * term.anchor_body(marker).chars().count(),
                    TermKind::AnyToken => 0,
                })
                .min()
                .or(Some(usize::MAX)),
        }
    }
}

/// Turns leaf query clauses into index terms.
///
/// Returns `Ok(None)` for clauses this extractor does not handle, so that
/// several extractors can be combined in a presearcher.
pub trait TermExtractor: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    fn extract(&self, clause: &QueryClause) -> Result<Option<Extraction>>;
}
