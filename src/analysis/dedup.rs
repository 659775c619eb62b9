use super::NGramToken;
use crate::config::DedupWindow;
use ahash::AHashSet;
use std::sync::Arc;

/// Drop tokens whose `(field, text, start_offset)` was already emitted.
///
/// The first occurrence wins and the order of the remaining tokens is kept.
pub fn collapse<I>(tokens: I, window: DedupWindow) -> Collapse<I::IntoIter>
where
    I: IntoIterator<Item = NGramToken>,
{
    Collapse::new(tokens.into_iter(), window)
}

type Key = (Arc<str>, String, usize);

/// Iterator adapter removing duplicate n-gram tokens.
///
/// With [`DedupWindow::Positional`] the seen-set only spans tokens derived
/// from the same source token (same field and origin), which keeps memory
/// proportional to one token's expansion.
pub struct Collapse<I> {
    input: I,
    window: DedupWindow,
    seen: AHashSet<Key>,
    group: Option<(Arc<str>, usize)>,
    dropped: usize,
}

impl<I> Collapse<I>
where
    I: Iterator<Item = NGramToken>,
{
    pub fn new(input: I, window: DedupWindow) -> Self {
        Self {
            input,
            window,
            seen: AHashSet::new(),
            group: None,
            dropped: 0,
        }
    }

    /// Number of duplicates removed so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn enter_group(&mut self, token: &NGramToken) {
        if self.window == DedupWindow::Global {
            return;
        }

        let same_group = self
            .group
            .as_ref()
            .is_some_and(|(field, origin)| *origin == token.origin && *field == token.field);

        if !same_group {
            self.seen.clear();
            self.group = Some((Arc::clone(&token.field), token.origin));
        }
    }
}

impl<I> Iterator for Collapse<I>
where
    I: Iterator<Item = NGramToken>,
{
    type Item = NGramToken;

    fn next(&mut self) -> Option<NGramToken> {
        loop {
            let token = self.input.next()?;
            self.enter_group(&token);

            let key = (Arc::clone(&token.field), token.text.clone(), token.start_offset);
            if self.seen.insert(key) {
                return Some(token);
            }
            self.dropped += 1;
        }
    }
}
