use super::{DocumentToken, GramKind, NGramToken};
use crate::config::{OffsetUnit, PresearchConfig};
use std::sync::Arc;

/// Expand a token stream into keyword copies and marked suffixes.
///
/// For a token of `L` chars this yields the unmarked keyword copy, then the
/// whole token with the marker appended, then the suffix starting at every
/// char position from `min_suffix_len` up to `min(max_suffix_len, L - 1)`.
/// With the default bounds that is exactly `L` marked variants.
pub fn expand<I>(tokens: I, config: &PresearchConfig) -> SuffixExpander<I::IntoIter>
where
    I: IntoIterator<Item = DocumentToken>,
{
    SuffixExpander::from_config(tokens.into_iter(), config)
}

/// Suffixes still to be emitted for the current source token
struct PendingSuffixes {
    token: DocumentToken,
    /// Byte index of each char boundary in the token text
    boundaries: Vec<usize>,
    /// Next char position to emit; position 0 is the whole token
    next: usize,
    last: usize,
}

/// Iterator adapter generating suffix n-grams, one source token at a time.
///
/// The adapter is lazy and single-pass: once the source iterator is
/// exhausted it cannot be restarted.
pub struct SuffixExpander<I> {
    input: I,
    marker: Arc<str>,
    min_suffix_len: usize,
    max_suffix_len: Option<usize>,
    max_token_chars: Option<usize>,
    any_token: Arc<str>,
    offset_unit: OffsetUnit,
    pending: Option<PendingSuffixes>,
    queued: Option<NGramToken>,
}

impl<I> SuffixExpander<I>
where
    I: Iterator<Item = DocumentToken>,
{
    pub fn new(input: I, marker: &str, min_suffix_len: usize, max_suffix_len: Option<usize>) -> Self {
        Self {
            input,
            marker: Arc::from(marker),
            min_suffix_len,
            max_suffix_len,
            max_token_chars: None,
            any_token: Arc::from(""),
            offset_unit: OffsetUnit::Chars,
            pending: None,
            queued: None,
        }
    }

    pub fn from_config(input: I, config: &PresearchConfig) -> Self {
        let expander = Self::new(
            input,
            &config.suffix_marker,
            config.min_suffix_len,
            config.max_suffix_len,
        )
        .with_offset_unit(config.offset_unit);

        match config.max_token_chars {
            Some(limit) => expander.with_max_token_chars(limit, &config.any_token),
            None => expander,
        }
    }

    pub fn with_offset_unit(mut self, unit: OffsetUnit) -> Self {
        self.offset_unit = unit;
        self
    }

    /// Replace the suffixes of tokens longer than `limit` chars with a single
    /// `any_token` gram
    pub fn with_max_token_chars(mut self, limit: usize, any_token: &str) -> Self {
        self.max_token_chars = Some(limit);
        self.any_token = Arc::from(any_token);
        self
    }

    fn last_suffix_start(&self, len: usize) -> usize {
        let last = len.saturating_sub(1);
        match self.max_suffix_len {
            Some(max) => max.min(last),
            None => last,
        }
    }

    fn start_token(&mut self, token: DocumentToken) {
        let boundaries: Vec<usize> = token.text.char_indices().map(|(i, _)| i).collect();
        if boundaries.is_empty() {
            return;
        }

        if self.max_token_chars.is_some_and(|limit| boundaries.len() > limit) {
            self.queued = Some(NGramToken {
                text: self.any_token.to_string(),
                start_offset: token.start_offset,
                end_offset: token.end_offset,
                origin: token.start_offset,
                kind: GramKind::AnyToken,
                field: token.field,
            });
            return;
        }

        let last = self.last_suffix_start(boundaries.len());
        self.pending = Some(PendingSuffixes {
            token,
            boundaries,
            next: 0,
            last,
        });
    }

    fn next_suffix(&mut self) -> Option<NGramToken> {
        let pending = self.pending.as_mut()?;

        let pos = pending.next;
        if pos > pending.last {
            self.pending = None;
            return None;
        }

        // After the whole token, jump straight to the first configured start
        pending.next = if pos == 0 { self.min_suffix_len } else { pos + 1 };

        let byte_start = pending.boundaries[pos];
        let advance = match self.offset_unit {
            OffsetUnit::Chars => pos,
            OffsetUnit::Bytes => byte_start,
        };

        let suffix = &pending.token.text[byte_start..];
        let mut text = String::with_capacity(suffix.len() + self.marker.len());
        text.push_str(suffix);
        text.push_str(&self.marker);

        Some(NGramToken {
            field: Arc::clone(&pending.token.field),
            text,
            start_offset: pending.token.start_offset + advance,
            end_offset: pending.token.end_offset,
            origin: pending.token.start_offset,
            kind: GramKind::Suffix,
        })
    }
}

impl<I> Iterator for SuffixExpander<I>
where
    I: Iterator<Item = DocumentToken>,
{
    type Item = NGramToken;

    fn next(&mut self) -> Option<NGramToken> {
        if let Some(gram) = self.queued.take() {
            return Some(gram);
        }
        if let Some(gram) = self.next_suffix() {
            return Some(gram);
        }

        let token = self.input.next()?;
        let keyword = NGramToken::keyword(&token);
        self.start_token(token);
        Some(keyword)
    }
}
