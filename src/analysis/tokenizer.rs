use super::DocumentToken;
use crate::config::OffsetUnit;
use std::sync::Arc;

/// Longest word split into identifier parts.
/// Longer words are likely base64, hex dumps, or other non-identifier content.
const MAX_SPLIT_LENGTH: usize = 128;

/// Reference word tokenizer.
///
/// Splits on anything that is not alphanumeric or `_`, optionally
/// lower-cases, and reports offsets in the configured unit. With
/// `split_identifiers` it also emits the camelCase and snake_case parts of
/// each word as extra tokens at their own offsets.
///
/// Every word is emitted whatever its length; `max_token_chars` in the
/// presearch config decides whether a long word is expanded.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pub lowercase: bool,
    pub split_identifiers: bool,
    pub offset_unit: OffsetUnit,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            lowercase: false,
            split_identifiers: false,
            offset_unit: OffsetUnit::Chars,
        }
    }
}

/// A word found in the input, before offset conversion
struct Span {
    char_start: usize,
    char_end: usize,
    byte_start: usize,
    byte_end: usize,
}

impl Tokenizer {
    pub fn new(lowercase: bool) -> Self {
        Self {
            lowercase,
            ..Self::default()
        }
    }

    pub fn with_split_identifiers(mut self, split: bool) -> Self {
        self.split_identifiers = split;
        self
    }

    pub fn with_offset_unit(mut self, unit: OffsetUnit) -> Self {
        self.offset_unit = unit;
        self
    }

    /// Tokenize one field's text
    pub fn tokenize(&self, field: &str, content: &str) -> Vec<DocumentToken> {
        let field: Arc<str> = Arc::from(field);
        let mut tokens = Vec::with_capacity(content.len() / 6);

        let mut start: Option<(usize, usize)> = None;
        let mut char_pos = 0;

        for (byte_pos, ch) in content.char_indices() {
            if is_word_char(ch) {
                if start.is_none() {
                    start = Some((char_pos, byte_pos));
                }
            } else if let Some((char_start, byte_start)) = start.take() {
                let span = Span {
                    char_start,
                    char_end: char_pos,
                    byte_start,
                    byte_end: byte_pos,
                };
                self.emit(&field, content, &span, &mut tokens);
            }
            char_pos += 1;
        }

        // Handle last token
        if let Some((char_start, byte_start)) = start {
            let span = Span {
                char_start,
                char_end: char_pos,
                byte_start,
                byte_end: content.len(),
            };
            self.emit(&field, content, &span, &mut tokens);
        }

        tokens
    }

    fn emit(&self, field: &Arc<str>, content: &str, span: &Span, tokens: &mut Vec<DocumentToken>) {
        let word = &content[span.byte_start..span.byte_end];
        let word_chars = span.char_end - span.char_start;
        tokens.push(self.make_token(field, word, span.char_start, span.byte_start, word_chars));

        if !self.split_identifiers || word_chars > MAX_SPLIT_LENGTH {
            return;
        }

        let parts = identifier_parts(word);
        if parts.len() < 2 {
            return;
        }
        for part in parts {
            let part_chars = word[part.byte_start..part.byte_end].chars().count();
            tokens.push(self.make_token(
                field,
                &word[part.byte_start..part.byte_end],
                span.char_start + part.char_start,
                span.byte_start + part.byte_start,
                part_chars,
            ));
        }
    }

    fn make_token(
        &self,
        field: &Arc<str>,
        text: &str,
        char_start: usize,
        byte_start: usize,
        chars: usize,
    ) -> DocumentToken {
        let (start, end) = match self.offset_unit {
            OffsetUnit::Chars => (char_start, char_start + chars),
            OffsetUnit::Bytes => (byte_start, byte_start + text.len()),
        };
        let text = if self.lowercase {
            super::fold_case(text)
        } else {
            text.to_string()
        };
        DocumentToken {
            field: Arc::clone(field),
            text,
            start_offset: start,
            end_offset: end,
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CharType {
    Upper,
    Lower,
    Digit,
    Underscore,
    Other,
}

fn classify_char(ch: char) -> CharType {
    if ch.is_uppercase() {
        CharType::Upper
    } else if ch.is_lowercase() {
        CharType::Lower
    } else if ch.is_numeric() {
        CharType::Digit
    } else if ch == '_' {
        CharType::Underscore
    } else {
        CharType::Other
    }
}

/// camelCase / snake_case parts of a word, relative to the word
fn identifier_parts(word: &str) -> Vec<Span> {
    let mut parts = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    let mut prev_char_type = CharType::Other;

    let mut char_pos = 0;
    for (byte_pos, ch) in word.char_indices() {
        let char_type = classify_char(ch);

        match char_type {
            CharType::Underscore => {
                if let Some(s) = start.take() {
                    push_part(s, char_pos, byte_pos, &mut parts);
                }
            }
            CharType::Upper if prev_char_type == CharType::Lower => {
                // CamelCase split: uppercase after lowercase
                if let Some(s) = start.take() {
                    push_part(s, char_pos, byte_pos, &mut parts);
                }
                start = Some((char_pos, byte_pos));
            }
            _ => {
                if start.is_none() {
                    start = Some((char_pos, byte_pos));
                }
            }
        }

        prev_char_type = char_type;
        char_pos += 1;
    }

    if let Some(s) = start {
        push_part(s, char_pos, word.len(), &mut parts);
    }

    parts
}

fn push_part(start: (usize, usize), char_end: usize, byte_end: usize, parts: &mut Vec<Span>) {
    parts.push(Span {
        char_start: start.0,
        char_end,
        byte_start: start.1,
        byte_end,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[DocumentToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_words() {
        let tokens = Tokenizer::default().tokenize("body", "foo bar, baz!");
        assert_eq!(texts(&tokens), ["foo", "bar", "baz"]);
        assert_eq!((tokens[1].start_offset, tokens[1].end_offset), (4, 7));
        assert_eq!(&*tokens[0].field, "body");
    }

    #[test]
    fn test_lowercase() {
        let tokens = Tokenizer::new(true).tokenize("body", "Hello WORLD");
        assert_eq!(texts(&tokens), ["hello", "world"]);
    }

    #[test]
    fn test_char_and_byte_offsets() {
        let text = "żółw foo";
        let chars = Tokenizer::default().tokenize("body", text);
        assert_eq!((chars[1].start_offset, chars[1].end_offset), (5, 8));

        let bytes = Tokenizer::default()
            .with_offset_unit(OffsetUnit::Bytes)
            .tokenize("body", text);
        assert_eq!((bytes[0].start_offset, bytes[0].end_offset), (0, 7));
        assert_eq!((bytes[1].start_offset, bytes[1].end_offset), (8, 11));
    }

    #[test]
    fn test_split_identifiers() {
        let tokens = Tokenizer::new(true)
            .with_split_identifiers(true)
            .tokenize("code", "getUserById snake_case");
        assert_eq!(
            texts(&tokens),
            ["getuserbyid", "get", "user", "by", "id", "snake_case", "snake", "case"]
        );
        let user = &tokens[2];
        assert_eq!((user.start_offset, user.end_offset), (3, 7));
        let case = &tokens[7];
        assert_eq!((case.start_offset, case.end_offset), (18, 22));
    }

    #[test]
    fn test_long_words_are_kept_unsplit() {
        let long = "aB".repeat(MAX_SPLIT_LENGTH);
        let tokens = Tokenizer::default()
            .with_split_identifiers(true)
            .tokenize("body", &format!("{} okThen", long));
        assert_eq!(texts(&tokens), [long.as_str(), "okThen", "ok", "Then"]);
        assert_eq!(tokens[0].end_offset, 2 * MAX_SPLIT_LENGTH);
    }
}
