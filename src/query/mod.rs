pub mod parser;

pub use parser::parse_query;

use serde::{Deserialize, Serialize};

/// A registered query, as seen by the presearcher.
///
/// Leaves carry the field they apply to. `All` requires every child and
/// `Any` at least one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryClause {
    /// Exact term
    Term { field: String, text: String },
    /// Terms starting with `prefix`
    Prefix { field: String, prefix: String },
    /// Wildcard pattern (`*`, `?`)
    Wildcard { field: String, pattern: String },
    /// Regular expression matched against whole terms
    Regex { field: String, pattern: String },
    /// Boolean AND
    All { clauses: Vec<QueryClause> },
    /// Boolean OR
    Any { clauses: Vec<QueryClause> },
}

impl QueryClause {
    pub fn term(field: &str, text: &str) -> Self {
        QueryClause::Term {
            field: field.to_string(),
            text: text.to_string(),
        }
    }

    pub fn prefix(field: &str, prefix: &str) -> Self {
        QueryClause::Prefix {
            field: field.to_string(),
            prefix: prefix.to_string(),
        }
    }

    pub fn wildcard(field: &str, pattern: &str) -> Self {
        QueryClause::Wildcard {
            field: field.to_string(),
            pattern: pattern.to_string(),
        }
    }

    pub fn regex(field: &str, pattern: &str) -> Self {
        QueryClause::Regex {
            field: field.to_string(),
            pattern: pattern.to_string(),
        }
    }

    /// Field of a leaf clause
    pub fn field(&self) -> Option<&str> {
        match self {
            QueryClause::Term { field, .. }
            | QueryClause::Prefix { field, .. }
            | QueryClause::Wildcard { field, .. }
            | QueryClause::Regex { field, .. } => Some(field),
            QueryClause::All { .. } | QueryClause::Any { .. } => None,
        }
    }
}
