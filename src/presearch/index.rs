use super::{DocumentQuery, QuerySignature};
use crate::extract::{QueryTerm, TermKind};
use log::debug;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;

/// Registered query identifier
pub type QueryId = u32;

/// In-memory term index over registered queries.
///
/// Exact terms are keyed by `(field, text)`. Anchors are keyed by field and
/// anchor text without the marker, so a document suffix finds every anchor
/// it starts with by probing its own prefixes.
#[derive(Debug, Clone)]
pub struct TermIndex {
    marker: String,
    any_token: String,
    exact: FxHashMap<(String, String), RoaringBitmap>,
    anchored: FxHashMap<String, FxHashMap<String, RoaringBitmap>>,
    any: RoaringBitmap,
    by_query: FxHashMap<QueryId, Vec<QueryTerm>>,
}

impl TermIndex {
    pub fn new(marker: &str, any_token: &str) -> Self {
        Self {
            marker: marker.to_string(),
            any_token: any_token.to_string(),
            exact: FxHashMap::default(),
            anchored: FxHashMap::default(),
            any: RoaringBitmap::new(),
            by_query: FxHashMap::default(),
        }
    }

    /// Number of registered queries
    pub fn len(&self) -> usize {
        self.by_query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_query.is_empty()
    }

    /// All registered query IDs
    pub fn query_ids(&self) -> RoaringBitmap {
        self.by_query.keys().copied().collect()
    }

    /// Index one term for a query
    pub fn add(&mut self, term: &QueryTerm, id: QueryId) {
        match term.kind {
            TermKind::AnyToken => {
                self.any.insert(id);
            }
            TermKind::Exact => {
                self.exact
                    .entry((term.field.clone(), term.text.clone()))
                    .or_default()
                    .insert(id);
            }
            TermKind::AnchoredPattern => {
                let body = term.anchor_body(&self.marker).to_string();
                self.anchored
                    .entry(term.field.clone())
                    .or_default()
                    .entry(body)
                    .or_default()
                    .insert(id);
            }
        }
        self.by_query.entry(id).or_default().push(term.clone());
    }

    /// Index a whole signature, replacing anything registered under `id`
    pub fn insert(&mut self, id: QueryId, signature: &QuerySignature) {
        self.remove(id);
        // An empty signature still registers the query
        self.by_query.entry(id).or_default();
        for term in signature {
            self.add(term, id);
        }
    }

    /// Drop every term of a query. Returns false for an unknown ID.
    pub fn remove(&mut self, id: QueryId) -> bool {
        let Some(terms) = self.by_query.remove(&id) else {
            return false;
        };

        for term in terms {
            match term.kind {
                TermKind::AnyToken => {
                    self.any.remove(id);
                }
                TermKind::Exact => {
                    let key = (term.field, term.text);
                    if let Some(ids) = self.exact.get_mut(&key) {
                        ids.remove(id);
                        if ids.is_empty() {
                            self.exact.remove(&key);
                        }
                    }
                }
                TermKind::AnchoredPattern => {
                    let body = term.anchor_body(&self.marker);
                    if let Some(anchors) = self.anchored.get_mut(&term.field) {
                        if let Some(ids) = anchors.get_mut(body) {
                            ids.remove(id);
                            if ids.is_empty() {
                                anchors.remove(body);
                            }
                        }
                        if anchors.is_empty() {
                            self.anchored.remove(&term.field);
                        }
                    }
                }
            }
        }
        true
    }

    /// Queries indexed under exactly this term text
    pub fn lookup(&self, field: &str, text: &str) -> RoaringBitmap {
        let mut ids = RoaringBitmap::new();
        if text == self.any_token {
            ids |= &self.any;
        }
        if let Some(exact) = self.exact.get(&(field.to_string(), text.to_string())) {
            ids |= exact;
        }
        if let Some(body) = text.strip_suffix(self.marker.as_str()) {
            if let Some(anchored) = self.anchored.get(field).and_then(|a| a.get(body)) {
                ids |= anchored;
            }
        }
        ids
    }

    /// Queries a document must be checked against
    pub fn candidates(&self, document: &DocumentQuery) -> RoaringBitmap {
        let mut ids = self.any.clone();

        for (field, terms) in document.fields() {
            for keyword in terms.keywords() {
                if let Some(exact) = self.exact.get(&(field.to_string(), keyword.clone())) {
                    ids |= exact;
                }
            }

            let Some(anchors) = self.anchored.get(field) else {
                continue;
            };

            if terms.is_unbounded() || document.scans_keywords() {
                for (body, anchored) in anchors {
                    if terms.is_unbounded()
                        || terms.has_suffix_starting_with(body)
                        || terms.keywords().iter().any(|k| k.contains(body.as_str()))
                    {
                        ids |= anchored;
                    }
                }
                continue;
            }

            for suffix in terms.suffixes() {
                for (i, ch) in suffix.char_indices() {
                    if let Some(anchored) = anchors.get(&suffix[..i + ch.len_utf8()]) {
                        ids |= anchored;
                    }
                }
            }
        }

        debug!(
            "{} of {} queries are candidates",
            ids.len(),
            self.by_query.len()
        );

        ids
    }
}
