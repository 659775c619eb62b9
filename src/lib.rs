//! # wildgram - wildcard-aware presearcher
//!
//! wildgram narrows a large set of stored queries down to the few that could
//! match an incoming document, without false negatives, so that an exact
//! evaluator only runs on that candidate set. Wildcard and regex queries are
//! indexed by their longest literal run; documents are expanded into marked
//! suffixes so a plain term lookup still finds those anchors.
//!
//! ## Architecture
//!
//! - [`pattern`] - Wildcard and regex parsing into literal runs
//! - [`query`] - Query clause tree and query-string parser
//! - [`extract`] - Query-side term extraction (exact terms, pattern anchors)
//! - [`analysis`] - Document-side tokenizer, suffix expansion, dedup
//! - [`presearch`] - Presearcher, document queries, term index, monitor
//! - [`config`] - Shared configuration, loaded from the app data directory
//!
//! ## Quick Start
//!
//! ```
//! use wildgram::config::PresearchConfig;
//! use wildgram::presearch::{Document, Monitor, Presearcher};
//!
//! let presearcher = Presearcher::wildcard_ngram(PresearchConfig::default()).unwrap();
//! let mut monitor = Monitor::new(presearcher);
//! monitor.register_str(1, "fo*bar", "body").unwrap();
//!
//! let hit = Document::new("a").with_field("body", "foobar");
//! let miss = Document::new("b").with_field("body", "foobaz");
//! assert!(monitor.candidates(&hit).unwrap().contains(1));
//! assert!(!monitor.candidates(&miss).unwrap().contains(1));
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod pattern;
pub mod presearch;
pub mod query;

pub use error::{PresearchError, Result};
