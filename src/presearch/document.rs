use super::Presearcher;
use crate::analysis::{fold_case, DocumentToken, GramKind};
use crate::error::{PresearchError, Result};
use crate::extract::{QueryTerm, TermKind};
use log::debug;
use memchr::memmem;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::io;

/// Terms collected for one field of a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTerms {
    keywords: BTreeSet<String>,
    /// Suffix texts with the marker stripped, sorted for prefix probes
    suffixes: BTreeSet<String>,
    /// Set when a token was too long to expand
    unbounded: bool,
}

impl FieldTerms {
    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    pub fn suffixes(&self) -> &BTreeSet<String> {
        &self.suffixes
    }

    pub fn is_unbounded(&self) -> bool {
        self.unbounded
    }

    /// Some suffix starts with `body`
    pub fn has_suffix_starting_with(&self, body: &str) -> bool {
        self.suffixes
            .range::<str, _>((Bound::Included(body), Bound::Unbounded))
            .next()
            .is_some_and(|suffix| suffix.starts_with(body))
    }
}

/// The candidate-selection query for one document: a disjunction over the
/// document's terms plus the any-token term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    marker: String,
    any_token: String,
    fields: BTreeMap<String, FieldTerms>,
    /// Fall back to substring checks on keywords for anchors
    scan_keywords: bool,
}

impl DocumentQuery {
    pub fn field(&self, name: &str) -> Option<&FieldTerms> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldTerms)> {
        self.fields.iter().map(|(name, terms)| (name.as_str(), terms))
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn any_token(&self) -> &str {
        &self.any_token
    }

    /// Anchors may be found only by scanning keywords
    pub fn scans_keywords(&self) -> bool {
        self.scan_keywords
    }

    /// Number of distinct terms in the disjunction
    pub fn term_count(&self) -> usize {
        1 + self
            .fields
            .values()
            .map(|terms| terms.keywords.len() + terms.suffixes.len())
            .sum::<usize>()
    }

    /// Whether a term with exactly this text is in the disjunction
    pub fn contains_term(&self, field: &str, text: &str) -> bool {
        if text == self.any_token {
            return true;
        }
        let Some(terms) = self.fields.get(field) else {
            return false;
        };
        if terms.keywords.contains(text) {
            return true;
        }
        text.strip_suffix(self.marker.as_str())
            .is_some_and(|body| terms.suffixes.contains(body))
    }

    /// The terms of the disjunction, marked suffixes included
    pub fn terms(&self) -> Vec<QueryTerm> {
        let mut terms = Vec::with_capacity(self.term_count());
        for (field, field_terms) in &self.fields {
            for keyword in &field_terms.keywords {
                terms.push(QueryTerm::exact(field, keyword));
            }
            for suffix in &field_terms.suffixes {
                terms.push(QueryTerm {
                    field: field.clone(),
                    text: format!("{}{}", suffix, self.marker),
                    kind: TermKind::AnchoredPattern,
                });
            }
        }
        terms.push(QueryTerm::any_token(&self.any_token));
        terms
    }

    /// Whether a query indexed under `term` must be a candidate for this
    /// document.
    ///
    /// An anchor is admitted when some suffix of a token in its field starts
    /// with the anchor text, i.e. the anchor occurs somewhere inside a token.
    pub fn admits(&self, term: &QueryTerm) -> bool {
        match term.kind {
            TermKind::AnyToken => true,
            TermKind::Exact => self
                .fields
                .get(&term.field)
                .is_some_and(|terms| terms.keywords.contains(&term.text)),
            TermKind::AnchoredPattern => {
                let Some(terms) = self.fields.get(&term.field) else {
                    return false;
                };
                let body = term.anchor_body(&self.marker);
                terms.unbounded
                    || terms.has_suffix_starting_with(body)
                    || (self.scan_keywords && keywords_contain(terms, body))
            }
        }
    }
}

fn keywords_contain(terms: &FieldTerms, body: &str) -> bool {
    let finder = memmem::Finder::new(body.as_bytes());
    terms
        .keywords
        .iter()
        .any(|keyword| finder.find(keyword.as_bytes()).is_some())
}

/// Accumulates the fields of one document
pub struct DocumentQueryBuilder<'p> {
    presearcher: &'p Presearcher,
    fields: BTreeMap<String, FieldTerms>,
}

impl<'p> DocumentQueryBuilder<'p> {
    pub(crate) fn new(presearcher: &'p Presearcher) -> Self {
        Self {
            presearcher,
            fields: BTreeMap::new(),
        }
    }

    /// Read one field's upstream tokens and add their terms.
    ///
    /// Tokens are taken under `field` whatever field they carry.
    pub fn add_field<T>(&mut self, field: &str, tokens: T) -> Result<&mut Self>
    where
        T: IntoIterator<Item = io::Result<DocumentToken>>,
    {
        let presearcher = self.presearcher;
        let config = presearcher.config();
        let marker = memmem::Finder::new(config.suffix_marker.as_bytes());

        let mut raw = Vec::new();
        for token in tokens {
            let mut token = token?;
            if config.fold_case {
                token.text = fold_case(&token.text);
            }
            if config.reject_marker_collisions && marker.find(token.text.as_bytes()).is_some() {
                return Err(PresearchError::MarkerCollision {
                    marker: config.suffix_marker.clone(),
                    context: "document",
                    text: token.text,
                });
            }
            raw.push(token);
        }

        let read = raw.len();
        let mut emitted = 0;
        let terms = self.fields.entry(field.to_string()).or_default();
        for gram in presearcher.transform_tokens(Box::new(raw.into_iter())) {
            emitted += 1;
            match gram.kind {
                GramKind::Keyword => {
                    terms.keywords.insert(gram.text);
                }
                GramKind::Suffix => {
                    let body = match gram.text.strip_suffix(config.suffix_marker.as_str()) {
                        Some(body) => body.to_string(),
                        None => gram.text,
                    };
                    terms.suffixes.insert(body);
                }
                GramKind::AnyToken => terms.unbounded = true,
            }
        }

        debug!(
            "field {}: {} tokens expanded to {} grams, {} distinct suffixes",
            field,
            read,
            emitted,
            terms.suffixes.len()
        );

        Ok(self)
    }

    pub fn build(self) -> DocumentQuery {
        let config = self.presearcher.config();
        DocumentQuery {
            marker: config.suffix_marker.clone(),
            any_token: config.any_token.clone(),
            fields: self.fields,
            scan_keywords: self.presearcher.suffixes_bounded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::NGramToken;
    use crate::config::PresearchConfig;
    use crate::extract::{AnchorExtractor, TermExtractor};
    use crate::presearch::DocumentTransform;
    use crate::query::QueryClause;

    fn tokens(field: &str, words: &[&str]) -> Vec<io::Result<DocumentToken>> {
        let mut offset = 0;
        words
            .iter()
            .map(|word| {
                let len = word.chars().count();
                let token = DocumentToken::new(field, *word, offset, offset + len);
                offset += len + 1;
                Ok(token)
            })
            .collect()
    }

    fn document(presearcher: &Presearcher, words: &[&str]) -> DocumentQuery {
        let mut builder = presearcher.document_query();
        builder.add_field("body", tokens("body", words)).unwrap();
        builder.build()
    }

    fn anchor(presearcher: &Presearcher, pattern: &str) -> QueryTerm {
        presearcher
            .index_query(&QueryClause::wildcard("body", pattern))
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn test_foobar_admits_fo_star_bar() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let term = anchor(&presearcher, "fo*bar");

        assert!(document(&presearcher, &["foobar"]).admits(&term));
        assert!(!document(&presearcher, &["foobaz"]).admits(&term));
    }

    #[test]
    fn test_infix_anchor_found_by_prefix_probe() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let doc = document(&presearcher, &["xxbarxx"]);
        assert!(doc.admits(&anchor(&presearcher, "*bar*")));
        assert!(!doc.admits(&anchor(&presearcher, "*baz*")));
    }

    #[test]
    fn test_exact_terms() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let doc = document(&presearcher, &["hello", "world"]);
        assert!(doc.admits(&QueryTerm::exact("body", "hello")));
        assert!(!doc.admits(&QueryTerm::exact("body", "hell")));
        assert!(!doc.admits(&QueryTerm::exact("title", "hello")));
        assert!(doc.admits(&QueryTerm::any_token("__ANYTOKEN__")));
    }

    #[test]
    fn test_contains_term_and_terms() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let doc = document(&presearcher, &["foo"]);

        assert!(doc.contains_term("body", "foo"));
        assert!(doc.contains_term("body", "fooXX"));
        assert!(doc.contains_term("body", "ooXX"));
        assert!(doc.contains_term("body", "oXX"));
        assert!(!doc.contains_term("body", "fXX"));
        assert!(doc.contains_term("other", "__ANYTOKEN__"));

        // keyword, three suffixes, any-token
        assert_eq!(doc.term_count(), 5);
        assert_eq!(doc.terms().len(), 5);
    }

    #[test]
    fn test_overlong_token_admits_every_anchor() {
        let mut config = PresearchConfig::default();
        config.max_token_chars = Some(4);
        let presearcher = Presearcher::wildcard_ngram(config).unwrap();
        let doc = document(&presearcher, &["abcdefgh"]);

        assert!(doc.field("body").unwrap().is_unbounded());
        assert!(doc.admits(&anchor(&presearcher, "*zzz*")));
        assert!(doc.admits(&QueryTerm::exact("body", "abcdefgh")));
    }

    #[test]
    fn test_bounded_suffixes_fall_back_to_keyword_scan() {
        let mut config = PresearchConfig::default();
        config.max_suffix_len = Some(2);
        let presearcher = Presearcher::wildcard_ngram(config).unwrap();
        let doc = document(&presearcher, &["foobar"]);

        assert!(doc.scans_keywords());
        assert!(!doc.field("body").unwrap().has_suffix_starting_with("ar"));
        assert!(doc.admits(&anchor(&presearcher, "*ar")));
        assert!(!doc.admits(&anchor(&presearcher, "*xy")));
    }

    #[test]
    fn test_marker_collision_in_document() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let mut builder = presearcher.document_query();
        let err = builder.add_field("body", tokens("body", &["aXXb"])).err().unwrap();
        assert!(matches!(err, PresearchError::MarkerCollision { context: "document", .. }));
    }

    #[test]
    fn test_io_error_propagates() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let mut builder = presearcher.document_query();
        let stream = vec![Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"))];
        let err = builder.add_field("body", stream).err().unwrap();
        assert!(matches!(err, PresearchError::Io(_)));
    }

    #[test]
    fn test_fold_case_lowercases_document_tokens() {
        let mut config = PresearchConfig::default();
        config.fold_case = true;
        let presearcher = Presearcher::wildcard_ngram(config).unwrap();
        let doc = document(&presearcher, &["FooBAR"]);
        assert!(doc.admits(&anchor(&presearcher, "fo*Bar")));
    }

    #[test]
    fn test_prefix_probe_boundaries() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let doc = document(&presearcher, &["abc"]);
        let terms = doc.field("body").unwrap();

        assert!(terms.has_suffix_starting_with("bc"));
        assert!(terms.has_suffix_starting_with("b"));
        assert!(terms.has_suffix_starting_with(""));
        assert!(!terms.has_suffix_starting_with("bd"));
        assert!(!terms.has_suffix_starting_with("cz"));
        assert!(!terms.has_suffix_starting_with("d"));
    }

    /// Emits every token as a suffix gram without the marker
    struct UnmarkedSuffixes;

    impl DocumentTransform for UnmarkedSuffixes {
        fn name(&self) -> &'static str {
            "unmarked"
        }

        fn transform<'a>(
            &'a self,
            tokens: Box<dyn Iterator<Item = DocumentToken> + 'a>,
        ) -> Box<dyn Iterator<Item = NGramToken> + 'a> {
            Box::new(tokens.map(|token| NGramToken {
                kind: GramKind::Suffix,
                ..NGramToken::keyword(&token)
            }))
        }
    }

    #[test]
    fn test_custom_transform_without_marker() {
        let config = PresearchConfig::default();
        let extractors: Vec<Box<dyn TermExtractor>> =
            vec![Box::new(AnchorExtractor::from_config(&config))];
        let presearcher = Presearcher::new(config, extractors, Box::new(UnmarkedSuffixes)).unwrap();

        // "a" is shorter than the marker
        let doc = document(&presearcher, &["a", "abc"]);
        let suffixes: Vec<&str> = doc
            .field("body")
            .unwrap()
            .suffixes()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(suffixes, ["a", "abc"]);
        assert!(doc.admits(&anchor(&presearcher, "ab*")));
    }

    #[test]
    fn test_fold_case_final_sigma() {
        let mut config = PresearchConfig::default();
        config.fold_case = true;
        let presearcher = Presearcher::wildcard_ngram(config).unwrap();
        let term = anchor(&presearcher, "*ΟΣ*");

        assert!(document(&presearcher, &["ΟΣΑ"]).admits(&term));
        assert!(document(&presearcher, &["θεος"]).admits(&term));
    }

    #[test]
    fn test_build_document_query_many_fields() {
        let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
        let doc = presearcher
            .build_document_query(vec![
                ("title".to_string(), tokens("title", &["alpha"])),
                ("body".to_string(), tokens("body", &["beta"])),
            ])
            .unwrap();
        assert_eq!(doc.fields().count(), 2);
        assert!(doc.contains_term("title", "phaXX"));
        assert!(!doc.contains_term("body", "phaXX"));
    }
}
