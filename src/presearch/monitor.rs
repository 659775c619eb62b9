use super::{DocumentQuery, Presearcher, QueryId, QuerySignature, TermIndex};
use crate::analysis::{self, DocumentToken, Tokenizer};
use crate::error::Result;
use crate::pattern::Pattern;
use crate::query::{parse_query, QueryClause};
use log::{debug, info};
use regex::Regex;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// An incoming document: named text fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.fields.insert(name.into(), content.into());
        self
    }
}

/// Presearch and verification outcome for one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub document: String,
    /// Queries selected by the presearcher
    pub candidates: Vec<QueryId>,
    /// Candidates that really match
    pub matches: Vec<QueryId>,
}

/// Whole-token evaluator for a registered query
#[derive(Debug, Clone)]
enum Matcher {
    Term { field: String, text: String },
    Pattern { field: String, regex: Regex },
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
}

type FieldTokens<'a> = FxHashMap<&'a str, Vec<String>>;

impl Matcher {
    fn compile(clause: &QueryClause, fold_case: bool) -> Result<Self> {
        Ok(match clause {
            QueryClause::Term { field, text } => Matcher::Term {
                field: field.clone(),
                text: if fold_case { analysis::fold_case(text) } else { text.clone() },
            },
            QueryClause::Prefix { field, prefix } => Matcher::Pattern {
                field: field.clone(),
                regex: Pattern::prefix(prefix).to_regex(fold_case)?,
            },
            QueryClause::Wildcard { field, pattern } => Matcher::Pattern {
                field: field.clone(),
                regex: Pattern::parse_wildcard(pattern)?.to_regex(fold_case)?,
            },
            QueryClause::Regex { field, pattern } => Matcher::Pattern {
                field: field.clone(),
                regex: Pattern::parse_regex(pattern)?.to_regex(fold_case)?,
            },
            QueryClause::All { clauses } => Matcher::All(
                clauses
                    .iter()
                    .map(|c| Matcher::compile(c, fold_case))
                    .collect::<Result<_>>()?,
            ),
            QueryClause::Any { clauses } => Matcher::Any(
                clauses
                    .iter()
                    .map(|c| Matcher::compile(c, fold_case))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn matches(&self, tokens: &FieldTokens<'_>) -> bool {
        match self {
            Matcher::Term { field, text } => tokens
                .get(field.as_str())
                .is_some_and(|words| words.iter().any(|w| w == text)),
            Matcher::Pattern { field, regex } => tokens
                .get(field.as_str())
                .is_some_and(|words| words.iter().any(|w| regex.is_match(w))),
            Matcher::All(children) => children.iter().all(|c| c.matches(tokens)),
            Matcher::Any(children) => children.iter().any(|c| c.matches(tokens)),
        }
    }
}

struct RegisteredQuery {
    clause: QueryClause,
    signature: QuerySignature,
    matcher: Matcher,
}

/// Registry of stored queries, matched against a stream of documents.
///
/// Registration needs `&mut self`; matching only reads, so batches are
/// presearched in parallel.
pub struct Monitor {
    presearcher: Presearcher,
    tokenizer: Tokenizer,
    index: TermIndex,
    queries: FxHashMap<QueryId, RegisteredQuery>,
}

impl Monitor {
    pub fn new(presearcher: Presearcher) -> Self {
        let config = presearcher.config();
        let tokenizer = Tokenizer::new(config.fold_case).with_offset_unit(config.offset_unit);
        let index = TermIndex::new(&config.suffix_marker, &config.any_token);
        Self {
            presearcher,
            tokenizer,
            index,
            queries: FxHashMap::default(),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn presearcher(&self) -> &Presearcher {
        &self.presearcher
    }

    pub fn index(&self) -> &TermIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Register (or replace) a query, returning the terms it is indexed under
    pub fn register(&mut self, id: QueryId, clause: QueryClause) -> Result<&QuerySignature> {
        let signature = self.presearcher.index_query(&clause)?;
        let matcher = Matcher::compile(&clause, self.presearcher.config().fold_case)?;

        self.index.insert(id, &signature);
        debug!("registered query {} under {} terms", id, signature.len());

        let registered = RegisteredQuery {
            clause,
            signature,
            matcher,
        };
        self.queries.insert(id, registered);
        Ok(&self.queries[&id].signature)
    }

    /// Parse and register a query string
    pub fn register_str(&mut self, id: QueryId, query: &str, default_field: &str) -> Result<&QuerySignature> {
        let clause = parse_query(query, default_field)?;
        self.register(id, clause)
    }

    pub fn unregister(&mut self, id: QueryId) -> bool {
        self.index.remove(id);
        self.queries.remove(&id).is_some()
    }

    pub fn query(&self, id: QueryId) -> Option<&QueryClause> {
        self.queries.get(&id).map(|q| &q.clause)
    }

    pub fn signature(&self, id: QueryId) -> Option<&QuerySignature> {
        self.queries.get(&id).map(|q| &q.signature)
    }

    fn tokenize(&self, document: &Document) -> Vec<(String, Vec<DocumentToken>)> {
        document
            .fields
            .iter()
            .map(|(field, content)| (field.clone(), self.tokenizer.tokenize(field, content)))
            .collect()
    }

    fn build_query(&self, fields: &[(String, Vec<DocumentToken>)]) -> Result<DocumentQuery> {
        let mut builder = self.presearcher.document_query();
        for (field, tokens) in fields {
            builder.add_field(field, tokens.iter().cloned().map(Ok::<_, std::io::Error>))?;
        }
        Ok(builder.build())
    }

    /// The candidate-selection query for a document
    pub fn document_query(&self, document: &Document) -> Result<DocumentQuery> {
        self.build_query(&self.tokenize(document))
    }

    /// Registered queries the document could match
    pub fn candidates(&self, document: &Document) -> Result<RoaringBitmap> {
        Ok(self.index.candidates(&self.document_query(document)?))
    }

    /// Presearch a document, then check each candidate against its tokens
    pub fn match_document(&self, document: &Document) -> Result<MatchReport> {
        let fields = self.tokenize(document);
        let candidates = self.index.candidates(&self.build_query(&fields)?);

        let fold_case = self.presearcher.config().fold_case;
        let tokens: FieldTokens<'_> = fields
            .iter()
            .map(|(field, tokens)| {
                let words = tokens
                    .iter()
                    .map(|t| if fold_case { analysis::fold_case(&t.text) } else { t.text.clone() })
                    .collect();
                (field.as_str(), words)
            })
            .collect();

        let matches = candidates
            .iter()
            .filter(|id| {
                self.queries
                    .get(id)
                    .is_some_and(|query| query.matcher.matches(&tokens))
            })
            .collect();

        Ok(MatchReport {
            document: document.id.clone(),
            candidates: candidates.iter().collect(),
            matches,
        })
    }

    /// Match many documents; reports come back in input order
    pub fn match_batch(&self, documents: &[Document]) -> Result<Vec<MatchReport>> {
        #[cfg(feature = "parallel")]
        let reports: Result<Vec<MatchReport>> =
            documents.par_iter().map(|d| self.match_document(d)).collect();

        #[cfg(not(feature = "parallel"))]
        let reports: Result<Vec<MatchReport>> =
            documents.iter().map(|d| self.match_document(d)).collect();

        let reports = reports?;
        let candidates: usize = reports.iter().map(|r| r.candidates.len()).sum();
        let matches: usize = reports.iter().map(|r| r.matches.len()).sum();
        info!(
            "matched {} documents against {} queries: {} candidates, {} matches",
            documents.len(),
            self.queries.len(),
            candidates,
            matches
        );

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresearchConfig;

    fn monitor(config: PresearchConfig) -> Monitor {
        Monitor::new(Presearcher::wildcard_ngram(config).unwrap())
    }

    #[test]
    fn test_match_document() {
        let mut monitor = monitor(PresearchConfig::default());
        monitor.register_str(1, "fo*bar", "body").unwrap();
        monitor.register_str(2, "hello world", "body").unwrap();
        monitor.register_str(3, "/b.z/", "body").unwrap();

        let report = monitor
            .match_document(&Document::new("d1").with_field("body", "foobar and hello"))
            .unwrap();
        assert_eq!(report.document, "d1");
        // "b" from /b.z/ is found inside "foobar"
        assert_eq!(report.candidates, [1, 2, 3]);
        assert_eq!(report.matches, [1]);
    }

    #[test]
    fn test_candidates_include_every_match() {
        let mut monitor = monitor(PresearchConfig::default());
        monitor.register_str(1, "*oba*", "body").unwrap();
        monitor.register_str(2, "b?z", "body").unwrap();
        monitor.register_str(3, "title:qux*", "body").unwrap();

        let report = monitor
            .match_document(
                &Document::new("d")
                    .with_field("body", "foobaz biz")
                    .with_field("title", "quxx"),
            )
            .unwrap();
        assert_eq!(report.matches, [1, 2, 3]);
        for id in &report.matches {
            assert!(report.candidates.contains(id));
        }
    }

    #[test]
    fn test_fold_case() {
        let mut config = PresearchConfig::default();
        config.fold_case = true;
        let mut monitor = monitor(config);
        monitor.register_str(1, "Fo*BAR", "body").unwrap();
        monitor.register_str(2, "HELLO", "body").unwrap();

        let report = monitor
            .match_document(&Document::new("d").with_field("body", "FOOBAR Hello"))
            .unwrap();
        assert_eq!(report.matches, [1, 2]);
    }

    #[test]
    fn test_long_word_reaches_token_limit() {
        let word = format!("{}needle{}", "x".repeat(150), "y".repeat(150));
        let doc = Document::new("d").with_field("body", format!("short {}", word));

        let mut config = PresearchConfig::default();
        config.max_token_chars = Some(32);
        let mut limited = monitor(config);
        limited.register_str(1, "*needle*", "body").unwrap();
        limited.register_str(2, "*absent*", "body").unwrap();

        let query = limited.document_query(&doc).unwrap();
        assert!(query.field("body").unwrap().is_unbounded());
        let report = limited.match_document(&doc).unwrap();
        assert_eq!(report.candidates, [1, 2]);
        assert_eq!(report.matches, [1]);

        let mut unlimited = monitor(PresearchConfig::default());
        unlimited.register_str(1, "*needle*", "body").unwrap();
        let report = unlimited.match_document(&doc).unwrap();
        assert_eq!(report.candidates, [1]);
        assert_eq!(report.matches, [1]);
    }

    #[test]
    fn test_fold_case_final_sigma() {
        let mut config = PresearchConfig::default();
        config.fold_case = true;
        let mut monitor = monitor(config);
        monitor.register_str(1, "*ΟΣ*", "body").unwrap();
        monitor.register_str(2, "/θεος/", "body").unwrap();

        let report = monitor
            .match_document(&Document::new("d").with_field("body", "ΟΣΑ ΘΕΟΣ"))
            .unwrap();
        assert_eq!(report.candidates, [1, 2]);
        assert_eq!(report.matches, [1, 2]);
    }

    #[test]
    fn test_verbose_regex_query() {
        let mut monitor = monitor(PresearchConfig::default());
        let signature = monitor.register_str(1, "/(?x)foo bar/", "body").unwrap();
        assert_eq!(signature.iter().next().unwrap().text, "foobarXX");

        let report = monitor
            .match_document(&Document::new("d").with_field("body", "foobar"))
            .unwrap();
        assert_eq!(report.candidates, [1]);
        assert_eq!(report.matches, [1]);
    }

    #[test]
    fn test_unregister() {
        let mut monitor = monitor(PresearchConfig::default());
        monitor.register_str(1, "foo*", "body").unwrap();
        assert_eq!(monitor.len(), 1);
        assert!(monitor.unregister(1));
        assert!(!monitor.unregister(1));
        assert!(monitor.is_empty());

        let doc = Document::new("d").with_field("body", "food");
        assert!(monitor.candidates(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let mut monitor = monitor(PresearchConfig::default());
        monitor.register_str(1, "alpha", "body").unwrap();
        let signature = monitor.register_str(1, "beta*", "body").unwrap();
        assert_eq!(signature.iter().next().unwrap().text, "betaXX");
        assert_eq!(monitor.len(), 1);
        assert_eq!(monitor.query(1), Some(&QueryClause::prefix("body", "beta")));
    }

    #[test]
    fn test_malformed_query_not_registered() {
        let mut monitor = monitor(PresearchConfig::default());
        assert!(monitor.register_str(1, "/(abc/", "body").is_err());
        assert!(monitor.is_empty());
        assert!(monitor.signature(1).is_none());
    }

    #[test]
    fn test_match_batch_keeps_order() {
        let mut monitor = monitor(PresearchConfig::default());
        monitor.register_str(1, "*bar", "body").unwrap();

        let documents: Vec<Document> = (0..20)
            .map(|i| {
                let body = if i % 2 == 0 { "foobar" } else { "foobaz" };
                Document::new(format!("doc{}", i)).with_field("body", body)
            })
            .collect();

        let reports = monitor.match_batch(&documents).unwrap();
        assert_eq!(reports.len(), 20);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.document, format!("doc{}", i));
            let expected: &[u32] = if i % 2 == 0 { &[1] } else { &[] };
            assert_eq!(report.matches, expected);
        }
    }
}
