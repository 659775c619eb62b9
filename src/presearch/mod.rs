//! Presearcher orchestration.
//!
//! A [`Presearcher`] pairs a list of [`TermExtractor`]s (query side) with a
//! [`DocumentTransform`] (document side). Queries are reduced to a
//! [`QuerySignature`]; documents become a [`DocumentQuery`], a disjunction
//! over the document's terms that admits every query the document could match.
//!
//! - [`document`] - Document term sets and the admission test
//! - [`index`] - In-memory term index with roaring postings
//! - [`monitor`] - Query registry with batch presearch and verification

pub mod document;
pub mod index;
pub mod monitor;

use crate::analysis::{collapse, expand, DocumentToken, NGramToken};
use crate::config::PresearchConfig;
use crate::error::Result;
use crate::extract::{AnchorExtractor, ExactTermExtractor, Extraction, QueryTerm, TermExtractor};
use crate::query::QueryClause;
use log::{debug, warn};
use std::collections::BTreeSet;

pub use document::{DocumentQuery, DocumentQueryBuilder, FieldTerms};
pub use index::{QueryId, TermIndex};
pub use monitor::{Document, MatchReport, Monitor};

/// Terms a query is indexed under. A matching document contains at least
/// one of them; an empty signature means the query can never match.
pub type QuerySignature = BTreeSet<QueryTerm>;

/// Rewrites a field's upstream tokens into the terms indexed for a document
pub trait DocumentTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform<'a>(
        &'a self,
        tokens: Box<dyn Iterator<Item = DocumentToken> + 'a>,
    ) -> Box<dyn Iterator<Item = NGramToken> + 'a>;
}

/// Keyword copy plus marked suffixes, duplicates collapsed
#[derive(Debug, Clone)]
pub struct SuffixNGramTransform {
    config: PresearchConfig,
}

impl SuffixNGramTransform {
    pub fn new(config: &PresearchConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentTransform for SuffixNGramTransform {
    fn name(&self) -> &'static str {
        "suffix-ngram"
    }

    fn transform<'a>(
        &'a self,
        tokens: Box<dyn Iterator<Item = DocumentToken> + 'a>,
    ) -> Box<dyn Iterator<Item = NGramToken> + 'a> {
        Box::new(collapse(expand(tokens, &self.config), self.config.dedup_window))
    }
}

/// Keyword copies only
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransform;

impl DocumentTransform for PassthroughTransform {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn transform<'a>(
        &'a self,
        tokens: Box<dyn Iterator<Item = DocumentToken> + 'a>,
    ) -> Box<dyn Iterator<Item = NGramToken> + 'a> {
        Box::new(tokens.map(|token| NGramToken::keyword(&token)))
    }
}

/// Builds query signatures and document queries from one shared config
pub struct Presearcher {
    config: PresearchConfig,
    extractors: Vec<Box<dyn TermExtractor>>,
    transform: Box<dyn DocumentTransform>,
}

impl Presearcher {
    pub fn new(
        config: PresearchConfig,
        extractors: Vec<Box<dyn TermExtractor>>,
        transform: Box<dyn DocumentTransform>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractors,
            transform,
        })
    }

    /// Exact terms plus anchored patterns matched against document suffixes
    pub fn wildcard_ngram(config: PresearchConfig) -> Result<Self> {
        let extractors: Vec<Box<dyn TermExtractor>> = vec![
            Box::new(ExactTermExtractor::from_config(&config)),
            Box::new(AnchorExtractor::from_config(&config)),
        ];
        let transform = Box::new(SuffixNGramTransform::new(&config));
        Self::new(config, extractors, transform)
    }

    /// Exact terms only; pattern queries are always candidates
    pub fn exact(config: PresearchConfig) -> Result<Self> {
        let extractors: Vec<Box<dyn TermExtractor>> =
            vec![Box::new(ExactTermExtractor::from_config(&config))];
        Self::new(config, extractors, Box::new(PassthroughTransform))
    }

    pub fn config(&self) -> &PresearchConfig {
        &self.config
    }

    pub fn transform_name(&self) -> &'static str {
        self.transform.name()
    }

    /// Reduce a query to the terms it is indexed under.
    ///
    /// A query that cannot be narrowed gets the any-token term and is a
    /// candidate for every document.
    pub fn index_query(&self, clause: &QueryClause) -> Result<QuerySignature> {
        match self.extract_clause(clause)? {
            Extraction::Terms(terms) => {
                if terms.is_empty() {
                    warn!("query {:?} can never match", clause);
                }
                Ok(terms.into_iter().collect())
            }
            Extraction::Unconstrained => {
                warn!("query {:?} cannot be narrowed, indexed under the any-token", clause);
                let mut signature = QuerySignature::new();
                signature.insert(QueryTerm::any_token(&self.config.any_token));
                Ok(signature)
            }
        }
    }

    fn extract_clause(&self, clause: &QueryClause) -> Result<Extraction> {
        match clause {
            QueryClause::All { clauses } => {
                // Any one required child is enough; keep the most selective
                let mut best: Option<(usize, Extraction)> = None;
                for child in clauses {
                    let extraction = self.extract_clause(child)?;
                    if let Some(weight) = extraction.weight(&self.config.suffix_marker) {
                        if best.as_ref().is_none_or(|(best_weight, _)| weight > *best_weight) {
                            best = Some((weight, extraction));
                        }
                    }
                }
                Ok(best.map_or(Extraction::Unconstrained, |(_, extraction)| extraction))
            }
            QueryClause::Any { clauses } => {
                let mut terms = Vec::new();
                let mut unconstrained = false;
                for child in clauses {
                    match self.extract_clause(child)? {
                        Extraction::Terms(child_terms) => terms.extend(child_terms),
                        Extraction::Unconstrained => unconstrained = true,
                    }
                }
                if unconstrained {
                    Ok(Extraction::Unconstrained)
                } else {
                    Ok(Extraction::Terms(terms))
                }
            }
            leaf => {
                for extractor in &self.extractors {
                    if let Some(extraction) = extractor.extract(leaf)? {
                        debug!("{} extractor handled {:?}", extractor.name(), leaf);
                        return Ok(extraction);
                    }
                }
                Ok(Extraction::Unconstrained)
            }
        }
    }

    /// Start building the query for one document
    pub fn document_query(&self) -> DocumentQueryBuilder<'_> {
        DocumentQueryBuilder::new(self)
    }

    /// Build a document query from `(field, tokens)` pairs
    pub fn build_document_query<F, T>(&self, fields: F) -> Result<DocumentQuery>
    where
        F: IntoIterator<Item = (String, T)>,
        T: IntoIterator<Item = std::io::Result<DocumentToken>>,
    {
        let mut builder = self.document_query();
        for (field, tokens) in fields {
            builder.add_field(&field, tokens)?;
        }
        Ok(builder.build())
    }

    pub(crate) fn transform_tokens<'a>(
        &'a self,
        tokens: Box<dyn Iterator<Item = DocumentToken> + 'a>,
    ) -> Box<dyn Iterator<Item = NGramToken> + 'a> {
        self.transform.transform(tokens)
    }

    /// True when the transform may skip suffixes an anchor could start at
    pub(crate) fn suffixes_bounded(&self) -> bool {
        self.config.min_suffix_len > 1 || self.config.max_suffix_len.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TermKind;

    fn presearcher() -> Presearcher {
        Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap()
    }

    fn texts(signature: &QuerySignature) -> Vec<&str> {
        signature.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_wildcard_query_signature() {
        let signature = presearcher()
            .index_query(&QueryClause::wildcard("body", "fo*bar"))
            .unwrap();
        assert_eq!(texts(&signature), ["barXX"]);
        assert_eq!(signature.iter().next().unwrap().kind, TermKind::AnchoredPattern);
    }

    #[test]
    fn test_unnarrowable_query_gets_any_token() {
        let signature = presearcher()
            .index_query(&QueryClause::wildcard("body", "*"))
            .unwrap();
        assert_eq!(signature.len(), 1);
        assert_eq!(signature.iter().next().unwrap().kind, TermKind::AnyToken);
        assert_eq!(texts(&signature), ["__ANYTOKEN__"]);
    }

    #[test]
    fn test_all_keeps_most_selective_child() {
        let clause = QueryClause::All {
            clauses: vec![
                QueryClause::wildcard("body", "a*"),
                QueryClause::term("body", "hello"),
                QueryClause::wildcard("body", "*world*"),
            ],
        };
        let signature = presearcher().index_query(&clause).unwrap();
        assert_eq!(texts(&signature), ["hello"]);
    }

    #[test]
    fn test_all_exact_beats_equal_anchor() {
        let clause = QueryClause::All {
            clauses: vec![
                QueryClause::wildcard("body", "abc*"),
                QueryClause::term("body", "xyz"),
            ],
        };
        let signature = presearcher().index_query(&clause).unwrap();
        assert_eq!(texts(&signature), ["xyz"]);
    }

    #[test]
    fn test_all_skips_unconstrained_children() {
        let clause = QueryClause::All {
            clauses: vec![QueryClause::wildcard("body", "*"), QueryClause::prefix("body", "ab")],
        };
        let signature = presearcher().index_query(&clause).unwrap();
        assert_eq!(texts(&signature), ["abXX"]);

        let empty = presearcher().index_query(&QueryClause::All { clauses: vec![] }).unwrap();
        assert_eq!(empty.iter().next().unwrap().kind, TermKind::AnyToken);
    }

    #[test]
    fn test_any_unions_children() {
        let clause = QueryClause::Any {
            clauses: vec![QueryClause::term("body", "foo"), QueryClause::wildcard("title", "b?r*z")],
        };
        let signature = presearcher().index_query(&clause).unwrap();
        assert_eq!(signature.len(), 2);
        assert!(signature.contains(&QueryTerm::exact("body", "foo")));
        assert!(signature.iter().any(|t| t.field == "title" && t.text == "bXX"));
    }

    #[test]
    fn test_any_with_unconstrained_child() {
        let clause = QueryClause::Any {
            clauses: vec![QueryClause::term("body", "foo"), QueryClause::regex("body", ".*")],
        };
        let signature = presearcher().index_query(&clause).unwrap();
        assert_eq!(texts(&signature), ["__ANYTOKEN__"]);
    }

    #[test]
    fn test_empty_any_never_matches() {
        let signature = presearcher().index_query(&QueryClause::Any { clauses: vec![] }).unwrap();
        assert!(signature.is_empty());
    }

    #[test]
    fn test_malformed_child_fails_whole_query() {
        let clause = QueryClause::Any {
            clauses: vec![QueryClause::regex("body", ".*"), QueryClause::regex("body", "a)")],
        };
        assert!(presearcher().index_query(&clause).is_err());
    }

    #[test]
    fn test_exact_presearcher_cannot_narrow_patterns() {
        let exact = Presearcher::exact(PresearchConfig::default()).unwrap();
        let signature = exact.index_query(&QueryClause::wildcard("body", "fo*bar")).unwrap();
        assert_eq!(signature.iter().next().unwrap().kind, TermKind::AnyToken);
        assert_eq!(exact.transform_name(), "passthrough");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PresearchConfig::default();
        config.suffix_marker.clear();
        assert!(Presearcher::wildcard_ngram(config).is_err());
    }

    #[test]
    fn test_presearcher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Presearcher>();
    }
}
