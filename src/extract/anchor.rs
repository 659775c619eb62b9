use super::{Extraction, QueryTerm, TermExtractor, TermKind};
use crate::analysis::fold_case;
use crate::config::PresearchConfig;
use crate::error::{PresearchError, Result};
use crate::pattern::{LiteralRun, Pattern};
use crate::query::QueryClause;
use log::{debug, trace};
use memchr::memmem;

/// Indexes wildcard, regex and prefix clauses by their longest literal run.
///
/// Every string a pattern matches contains each of its literal runs, so the
/// longest run is a safe required term. The marker appended to it keeps the
/// anchor apart from exact terms with the same text.
#[derive(Debug, Clone)]
pub struct AnchorExtractor {
    marker: String,
    min_anchor_len: usize,
    fold_case: bool,
    reject_collisions: bool,
}

impl AnchorExtractor {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            min_anchor_len: 1,
            fold_case: false,
            reject_collisions: true,
        }
    }

    pub fn from_config(config: &PresearchConfig) -> Self {
        Self {
            marker: config.suffix_marker.clone(),
            min_anchor_len: config.min_anchor_len,
            fold_case: config.fold_case,
            reject_collisions: config.reject_marker_collisions,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Anchor term for a pattern, or `None` when no literal run is long
    /// enough to narrow it.
    ///
    /// The longest run wins; among runs of equal length the leftmost one is
    /// kept.
    pub fn extract_anchor(&self, pattern: &Pattern, field: &str) -> Result<Option<QueryTerm>> {
        let best = longest_run(pattern.literal_runs());

        let Some(run) = best.filter(|run| run.len >= self.min_anchor_len) else {
            debug!("pattern {:?} on {} has no usable literal run", pattern.source(), field);
            return Ok(None);
        };

        let anchor = if self.fold_case {
            fold_case(&run.text)
        } else {
            run.text
        };

        if self.reject_collisions && memmem::find(anchor.as_bytes(), self.marker.as_bytes()).is_some() {
            return Err(PresearchError::MarkerCollision {
                marker: self.marker.clone(),
                context: "query",
                text: anchor,
            });
        }

        let mut text = String::with_capacity(anchor.len() + self.marker.len());
        text.push_str(&anchor);
        text.push_str(&self.marker);

        trace!("pattern {:?} on {} anchored by {:?}", pattern.source(), field, anchor);

        Ok(Some(QueryTerm {
            field: field.to_string(),
            text,
            kind: TermKind::AnchoredPattern,
        }))
    }

    fn extract_pattern(&self, pattern: &Pattern, field: &str) -> Result<Extraction> {
        Ok(match self.extract_anchor(pattern, field)? {
            Some(term) => Extraction::Terms(vec![term]),
            None => Extraction::Unconstrained,
        })
    }
}

/// Leftmost of the longest runs
fn longest_run(runs: Vec<LiteralRun>) -> Option<LiteralRun> {
    let mut best: Option<LiteralRun> = None;
    for run in runs {
        if best.as_ref().is_none_or(|b| run.len > b.len) {
            best = Some(run);
        }
    }
    best
}

impl TermExtractor for AnchorExtractor {
    fn name(&self) -> &'static str {
        "anchor"
    }

    fn extract(&self, clause: &QueryClause) -> Result<Option<Extraction>> {
        let extraction = match clause {
            QueryClause::Wildcard { field, pattern } => {
                self.extract_pattern(&Pattern::parse_wildcard(pattern)?, field)?
            }
            QueryClause::Regex { field, pattern } => {
                self.extract_pattern(&Pattern::parse_regex(pattern)?, field)?
            }
            QueryClause::Prefix { field, prefix } => {
                self.extract_pattern(&Pattern::prefix(prefix), field)?
            }
            _ => return Ok(None),
        };
        Ok(Some(extraction))
    }
}
