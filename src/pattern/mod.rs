//! Pattern AST for wildcard and regex query clauses.
//!
//! A pattern is flattened into a sequence of literal chars and wildcard
//! operators. Anything that does not guarantee a literal char at that point
//! of every matching string is a wildcard operator, so the maximal literal
//! runs between operators are substrings every match must contain.
//!
//! ```
//! use wildgram::pattern::Pattern;
//!
//! let pattern = Pattern::parse_wildcard("fo*bar").unwrap();
//! let runs: Vec<_> = pattern.literal_runs().into_iter().map(|r| r.text).collect();
//! assert_eq!(runs, ["fo", "bar"]);
//! ```

pub mod parser;

use crate::error::Result;
use regex::Regex;
use std::fmt;

pub use parser::{parse_regex, parse_wildcard};

/// Operator that breaks a literal run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardOp {
    /// `*` in wildcard syntax, `.*` and friends in regex
    AnyString,
    /// `?` in wildcard syntax, `.` in regex
    AnyChar,
    /// Bracketed class, `\d`-style escape, or a case-insensitive letter
    CharClass,
    /// An atom that may be absent (`?`, `*`, `{0,n}`)
    Optional,
    /// Extra repetitions of the preceding atom (`+`, `{n,m}` with n >= 1)
    Repeat,
    /// A set of alternatives, none of which is guaranteed
    Alternation,
    /// Zero-width assertion (`^`, `$`, `\b`)
    Anchor,
}

/// One element of a flattened pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternNode {
    Literal(char),
    Wildcard(WildcardOp),
}

/// Surface syntax a pattern was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSyntax {
    Wildcard,
    Regex,
}

/// A maximal run of literal chars inside a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralRun {
    /// Index of the run's first node in the pattern
    pub node_index: usize,
    pub text: String,
    /// Length in chars
    pub len: usize,
}

/// Parsed wildcard or regex pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    syntax: PatternSyntax,
    nodes: Vec<PatternNode>,
    /// A regex `#` comment may be open at the end of the source
    open_comment: bool,
}

impl Pattern {
    /// Parse Lucene-style wildcard syntax (`*`, `?`, `\` escapes)
    pub fn parse_wildcard(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.to_string(),
            syntax: PatternSyntax::Wildcard,
            nodes: parse_wildcard(source)?,
            open_comment: false,
        })
    }

    /// Parse a regular expression
    pub fn parse_regex(source: &str) -> Result<Self> {
        let parsed = parser::parse_regex_with_flags(source)?;
        Ok(Self {
            source: source.to_string(),
            syntax: PatternSyntax::Regex,
            nodes: parsed.nodes,
            open_comment: parsed.verbose_at_end,
        })
    }

    /// Pattern for a prefix query: the literal prefix followed by `*`
    pub fn prefix(prefix: &str) -> Self {
        let mut nodes: Vec<PatternNode> = prefix.chars().map(PatternNode::Literal).collect();
        nodes.push(PatternNode::Wildcard(WildcardOp::AnyString));
        let mut source = String::with_capacity(prefix.len() + 1);
        for ch in prefix.chars() {
            if matches!(ch, '*' | '?' | '\\') {
                source.push('\\');
            }
            source.push(ch);
        }
        source.push('*');
        Self {
            source,
            syntax: PatternSyntax::Wildcard,
            nodes,
            open_comment: false,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn syntax(&self) -> PatternSyntax {
        self.syntax
    }

    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    /// Maximal literal runs in pattern order
    pub fn literal_runs(&self) -> Vec<LiteralRun> {
        let mut runs = Vec::new();
        let mut current = String::new();
        let mut len = 0;
        let mut start = 0;

        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                PatternNode::Literal(ch) => {
                    if len == 0 {
                        start = i;
                    }
                    current.push(*ch);
                    len += 1;
                }
                PatternNode::Wildcard(_) => {
                    if len > 0 {
                        runs.push(LiteralRun {
                            node_index: start,
                            text: std::mem::take(&mut current),
                            len,
                        });
                        len = 0;
                    }
                }
            }
        }

        if len > 0 {
            runs.push(LiteralRun {
                node_index: start,
                text: current,
                len,
            });
        }

        runs
    }

    /// Compile a whole-token matcher for candidate verification
    pub fn to_regex(&self, case_insensitive: bool) -> Result<Regex> {
        let body = match self.syntax {
            // End a trailing verbose comment before the closing group
            PatternSyntax::Regex if self.open_comment => format!("{}\n", self.source),
            PatternSyntax::Regex => self.source.clone(),
            PatternSyntax::Wildcard => {
                let mut body = String::with_capacity(self.source.len() * 2);
                for node in &self.nodes {
                    match node {
                        PatternNode::Literal(ch) => {
                            body.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4])))
                        }
                        PatternNode::Wildcard(WildcardOp::AnyString) => body.push_str(".*"),
                        PatternNode::Wildcard(_) => body.push('.'),
                    }
                }
                body
            }
        };

        let flags = if case_insensitive { "(?is)" } else { "(?s)" };
        Ok(Regex::new(&format!("{}^(?:{})$", flags, body))?)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
