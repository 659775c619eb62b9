use super::QueryClause;
use crate::error::{PresearchError, Result};

/// Parse a query string into a clause tree.
///
/// Syntax: whitespace-separated clauses are ANDed, `|` ORs, parentheses
/// group. A clause is `[field:]value` where value is a bare word (wildcards
/// `*` and `?` allowed, `\` escapes), a `"quoted term"` or a `/regex/`.
/// A bare word whose only wildcard is a single trailing `*` is a prefix
/// query.
pub fn parse_query(input: &str, default_field: &str) -> Result<QueryClause> {
    let mut parser = QueryParser::new(input, default_field);
    parser.parse()
}

/// Query parser
struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
    default_field: &'a str,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str, default_field: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            default_field,
        }
    }

    fn parse(&mut self) -> Result<QueryClause> {
        let root = self.parse_or()?;

        self.skip_whitespace();
        if !self.is_eof() {
            return Err(self.error("unexpected closing parenthesis"));
        }

        Ok(root)
    }

    fn parse_or(&mut self) -> Result<QueryClause> {
        let mut clauses = vec![self.parse_and()?];

        self.skip_whitespace();
        while self.consume_char('|') {
            self.skip_whitespace();
            clauses.push(self.parse_and()?);
            self.skip_whitespace();
        }

        if clauses.len() == 1 {
            Ok(clauses.swap_remove(0))
        } else {
            Ok(QueryClause::Any { clauses })
        }
    }

    fn parse_and(&mut self) -> Result<QueryClause> {
        let mut clauses = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_eof() || self.peek_char() == Some(')') || self.peek_char() == Some('|') {
                break;
            }

            clauses.push(self.parse_primary()?);
        }

        match clauses.len() {
            0 => Err(self.error("empty query")),
            1 => Ok(clauses.swap_remove(0)),
            _ => Ok(QueryClause::All { clauses }),
        }
    }

    fn parse_primary(&mut self) -> Result<QueryClause> {
        let start = self.pos;

        // Parenthesized expression
        if self.consume_char('(') {
            let clause = self.parse_or()?;
            if !self.consume_char(')') {
                self.pos = start;
                return Err(self.error("unclosed parenthesis"));
            }
            return Ok(clause);
        }

        let field = self.parse_field_prefix();
        let field = field.unwrap_or(self.default_field).to_string();

        match self.peek_char() {
            Some('"') => self.parse_quoted(field),
            Some('/') => self.parse_regex(field),
            _ => self.parse_word(field),
        }
    }

    /// Consume `field:` if present
    fn parse_field_prefix(&mut self) -> Option<&'a str> {
        let input = self.input;
        let start = self.pos;

        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else if ch == ':' && self.pos > start {
                let field = &input[start..self.pos];
                self.advance();
                return Some(field);
            } else {
                break;
            }
        }

        self.pos = start;
        None
    }

    fn parse_quoted(&mut self, field: String) -> Result<QueryClause> {
        let start = self.pos;
        self.consume_char('"');
        let text_start = self.pos;

        while !self.is_eof() && self.peek_char() != Some('"') {
            self.advance();
        }

        if self.is_eof() {
            self.pos = start;
            return Err(self.error("unclosed quote"));
        }

        let text = self.input[text_start..self.pos].to_string();
        self.consume_char('"');

        Ok(QueryClause::Term { field, text })
    }

    fn parse_regex(&mut self, field: String) -> Result<QueryClause> {
        let start = self.pos;
        self.consume_char('/');
        let mut pattern = String::new();

        // Find closing /. Escapes are consumed in pairs and only \/ is unescaped
        loop {
            match self.peek_char() {
                None => {
                    self.pos = start;
                    return Err(self.error("unclosed regex"));
                }
                Some('/') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('/') => pattern.push('/'),
                        Some(escaped) => {
                            pattern.push('\\');
                            pattern.push(escaped);
                        }
                        None => continue,
                    }
                    self.advance();
                }
                Some(ch) => {
                    pattern.push(ch);
                    self.advance();
                }
            }
        }

        Ok(QueryClause::Regex { field, pattern })
    }

    fn parse_word(&mut self, field: String) -> Result<QueryClause> {
        let start = self.pos;
        let mut raw = String::new();
        let mut literal = String::new();
        let mut wildcards = 0;
        let mut trailing_star = false;

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || ch == '|' || ch == ')' || ch == '(' {
                break;
            }
            self.advance();

            match ch {
                '\\' => {
                    let Some(escaped) = self.peek_char() else {
                        return Err(self.error("trailing backslash"));
                    };
                    self.advance();
                    raw.push('\\');
                    raw.push(escaped);
                    literal.push(escaped);
                    trailing_star = false;
                }
                '*' | '?' => {
                    raw.push(ch);
                    wildcards += 1;
                    trailing_star = ch == '*';
                }
                c => {
                    raw.push(c);
                    literal.push(c);
                    trailing_star = false;
                }
            }
        }

        if raw.is_empty() {
            self.pos = start;
            return Err(self.error("expected a term"));
        }

        let clause = match wildcards {
            0 => QueryClause::Term { field, text: literal },
            1 if trailing_star => QueryClause::Prefix { field, prefix: literal },
            _ => QueryClause::Wildcard { field, pattern: raw },
        };

        Ok(clause)
    }

    fn error(&self, reason: &'static str) -> PresearchError {
        PresearchError::malformed(self.input, self.pos, reason)
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.peek_char().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn remaining(&self) -> &str {
        &self.input[self.pos..]
    }
}
