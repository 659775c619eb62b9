use super::{PatternNode, WildcardOp};
use crate::error::{PresearchError, Result};

/// Parse wildcard syntax into pattern nodes.
///
/// `*` matches any string, `?` any single char, and `\` escapes the next
/// char. A trailing `\` is malformed.
pub fn parse_wildcard(input: &str) -> Result<Vec<PatternNode>> {
    let mut nodes = Vec::with_capacity(input.len());
    let mut chars = input.char_indices();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '*' => nodes.push(PatternNode::Wildcard(WildcardOp::AnyString)),
            '?' => nodes.push(PatternNode::Wildcard(WildcardOp::AnyChar)),
            '\\' => match chars.next() {
                Some((_, escaped)) => nodes.push(PatternNode::Literal(escaped)),
                None => {
                    return Err(PresearchError::malformed(input, pos, "trailing backslash"));
                }
            },
            c => nodes.push(PatternNode::Literal(c)),
        }
    }

    Ok(nodes)
}

/// Parse a regular expression into pattern nodes.
///
/// Only the literal structure matters here, so every construct that does not
/// pin a char (classes, alternation, optional or repeated atoms, assertions)
/// is reduced to a wildcard operator.
pub fn parse_regex(input: &str) -> Result<Vec<PatternNode>> {
    parse_regex_with_flags(input).map(|parsed| parsed.nodes)
}

/// Regex nodes plus the flag state left open at the end of the input
pub(crate) struct ParsedRegex {
    pub nodes: Vec<PatternNode>,
    /// `(?x)` is still in effect after the last char, so a trailing `#`
    /// comment runs to the end of the input
    pub verbose_at_end: bool,
}

pub(crate) fn parse_regex_with_flags(input: &str) -> Result<ParsedRegex> {
    let mut parser = RegexParser::new(input);
    let nodes = parser.parse()?;
    Ok(ParsedRegex {
        nodes,
        verbose_at_end: parser.verbose_at_end,
    })
}

/// Regex parser
struct RegexParser<'a> {
    input: &'a str,
    pos: usize,
    /// Inside a `(?i)` scope, letters with case variants are classes
    case_insensitive: bool,
    /// Inside a `(?x)` scope, whitespace and `#` comments are ignored
    verbose: bool,
    verbose_at_end: bool,
}

impl<'a> RegexParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            case_insensitive: false,
            verbose: false,
            verbose_at_end: false,
        }
    }

    fn parse(&mut self) -> Result<Vec<PatternNode>> {
        let nodes = self.parse_alternation()?;

        if !self.is_eof() {
            // parse_alternation only stops early on ')'
            return Err(self.error("unmatched closing parenthesis"));
        }

        Ok(nodes)
    }

    fn parse_alternation(&mut self) -> Result<Vec<PatternNode>> {
        let mut branches = vec![self.parse_sequence()?];

        while self.consume_char('|') {
            branches.push(self.parse_sequence()?);
        }

        if branches.len() == 1 {
            Ok(branches.pop().unwrap_or_default())
        } else {
            Ok(vec![PatternNode::Wildcard(WildcardOp::Alternation)])
        }
    }

    fn parse_sequence(&mut self) -> Result<Vec<PatternNode>> {
        let mut nodes = Vec::new();

        loop {
            self.skip_verbose_trivia();
            let Some(ch) = self.peek_char() else {
                self.verbose_at_end = self.verbose;
                break;
            };
            if ch == '|' || ch == ')' {
                break;
            }

            let atom_start = nodes.len();
            let has_operand = self.parse_atom(&mut nodes)?;
            if has_operand {
                self.parse_quantifier(&mut nodes, atom_start)?;
            }
        }

        Ok(nodes)
    }

    /// Parse one atom, appending its nodes. Returns false for constructs a
    /// quantifier cannot apply to.
    fn parse_atom(&mut self, nodes: &mut Vec<PatternNode>) -> Result<bool> {
        let start = self.pos;
        let Some(ch) = self.peek_char() else {
            return Ok(false);
        };
        self.advance();

        match ch {
            '(' => self.parse_group(nodes, start),
            '[' => {
                self.parse_class(start)?;
                nodes.push(PatternNode::Wildcard(WildcardOp::CharClass));
                Ok(true)
            }
            '.' => {
                nodes.push(PatternNode::Wildcard(WildcardOp::AnyChar));
                Ok(true)
            }
            '^' | '$' => {
                nodes.push(PatternNode::Wildcard(WildcardOp::Anchor));
                Ok(true)
            }
            '\\' => {
                self.parse_escape(nodes, start)?;
                Ok(true)
            }
            '*' | '+' | '?' | '{' => {
                self.pos = start;
                Err(self.error("quantifier without operand"))
            }
            c => {
                self.push_literal(nodes, c);
                Ok(true)
            }
        }
    }

    fn parse_group(&mut self, nodes: &mut Vec<PatternNode>, start: usize) -> Result<bool> {
        let outer_case = self.case_insensitive;
        let outer_verbose = self.verbose;

        if self.consume_char('?') {
            if self.remaining().starts_with("P<") || self.remaining().starts_with('<') {
                // Named capture group
                while let Some(ch) = self.peek_char() {
                    self.advance();
                    if ch == '>' {
                        break;
                    }
                }
            } else {
                let mut enable = true;
                loop {
                    match self.peek_char() {
                        Some(':') => {
                            self.advance();
                            break;
                        }
                        Some(')') => {
                            // Flags apply to the rest of the enclosing group
                            self.advance();
                            return Ok(false);
                        }
                        Some('-') => enable = false,
                        Some('i') => self.case_insensitive = enable,
                        Some('x') => self.verbose = enable,
                        Some(c) if c.is_ascii_alphabetic() => {}
                        _ => {
                            self.pos = start;
                            return Err(self.error("invalid group flags"));
                        }
                    }
                    self.advance();
                }
            }
        }

        let inner = self.parse_alternation()?;
        // Bare `(?i)` and `(?x)` inside the group end with it
        self.case_insensitive = outer_case;
        self.verbose = outer_verbose;

        if !self.consume_char(')') {
            self.pos = start;
            return Err(self.error("unclosed group"));
        }

        if inner.is_empty() {
            // `()` matches the empty string and can be ignored
            return Ok(false);
        }

        nodes.extend(inner);
        Ok(true)
    }

    fn parse_class(&mut self, start: usize) -> Result<()> {
        let mut depth = 1;

        self.consume_char('^');
        // A leading ']' is a literal member
        self.consume_char(']');

        while let Some(ch) = self.peek_char() {
            self.advance();
            match ch {
                '\\' => {
                    if self.peek_char().is_none() {
                        break;
                    }
                    self.advance();
                }
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        self.pos = start;
        Err(self.error("unclosed character class"))
    }

    fn parse_escape(&mut self, nodes: &mut Vec<PatternNode>, start: usize) -> Result<()> {
        let Some(escaped) = self.peek_char() else {
            self.pos = start;
            return Err(self.error("trailing backslash"));
        };
        self.advance();

        let node = match escaped {
            'n' => PatternNode::Literal('\n'),
            't' => PatternNode::Literal('\t'),
            'r' => PatternNode::Literal('\r'),
            'f' => PatternNode::Literal('\x0C'),
            'v' => PatternNode::Literal('\x0B'),
            'x' => PatternNode::Literal(self.parse_hex_escape(start)?),
            'b' | 'B' | 'A' | 'z' | '<' | '>' => PatternNode::Wildcard(WildcardOp::Anchor),
            'p' | 'P' => {
                if self.consume_char('{') {
                    self.skip_past('}', start, "unclosed unicode class")?;
                } else if self.peek_char().is_some() {
                    self.advance();
                }
                PatternNode::Wildcard(WildcardOp::CharClass)
            }
            c if c.is_ascii_alphanumeric() => PatternNode::Wildcard(WildcardOp::CharClass),
            c => {
                self.push_literal(nodes, c);
                return Ok(());
            }
        };

        nodes.push(node);
        Ok(())
    }

    fn parse_hex_escape(&mut self, start: usize) -> Result<char> {
        let digits = if self.consume_char('{') {
            let digits_start = self.pos;
            self.skip_past('}', start, "unclosed hex escape")?;
            &self.input[digits_start..self.pos - 1]
        } else {
            let digits_start = self.pos;
            for _ in 0..2 {
                match self.peek_char() {
                    Some(c) if c.is_ascii_hexdigit() => self.advance(),
                    _ => {
                        self.pos = start;
                        return Err(self.error("invalid hex escape"));
                    }
                }
            }
            &self.input[digits_start..self.pos]
        };

        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                PresearchError::malformed(self.input, start, "invalid hex escape")
            })
    }

    fn parse_quantifier(&mut self, nodes: &mut Vec<PatternNode>, atom_start: usize) -> Result<()> {
        self.skip_verbose_trivia();
        let start = self.pos;
        let min = match self.peek_char() {
            Some('*') | Some('?') => {
                self.advance();
                0
            }
            Some('+') => {
                self.advance();
                1
            }
            Some('{') => {
                self.advance();
                self.parse_repetition(start)?
            }
            _ => return Ok(()),
        };

        // Lazy modifier
        self.skip_verbose_trivia();
        self.consume_char('?');

        if min == 0 {
            nodes.truncate(atom_start);
            nodes.push(PatternNode::Wildcard(WildcardOp::Optional));
        } else {
            // One copy of the atom is guaranteed
            nodes.push(PatternNode::Wildcard(WildcardOp::Repeat));
        }

        Ok(())
    }

    /// Parse `{n}`, `{n,}` or `{n,m}` after the opening brace, returning n
    fn parse_repetition(&mut self, start: usize) -> Result<u32> {
        let body_start = self.pos;
        self.skip_past('}', start, "unclosed repetition")?;
        let body = &self.input[body_start..self.pos - 1];

        let (min, max) = match body.split_once(',') {
            Some((min, max)) => (min.trim(), Some(max.trim())),
            None => (body.trim(), None),
        };

        let min: u32 = min
            .parse()
            .map_err(|_| PresearchError::malformed(self.input, start, "invalid repetition"))?;

        if let Some(max) = max.filter(|m| !m.is_empty()) {
            let max: u32 = max
                .parse()
                .map_err(|_| PresearchError::malformed(self.input, start, "invalid repetition"))?;
            if max < min {
                return Err(PresearchError::malformed(
                    self.input,
                    start,
                    "repetition bounds out of order",
                ));
            }
        }

        Ok(min)
    }

    fn push_literal(&self, nodes: &mut Vec<PatternNode>, ch: char) {
        if self.case_insensitive && has_case_variants(ch) {
            nodes.push(PatternNode::Wildcard(WildcardOp::CharClass));
        } else {
            nodes.push(PatternNode::Literal(ch));
        }
    }

    /// Skip whitespace and `#` line comments while `(?x)` is in effect
    fn skip_verbose_trivia(&mut self) {
        if !self.verbose {
            return;
        }
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(ch) = self.peek_char() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn skip_past(&mut self, close: char, start: usize, reason: &'static str) -> Result<()> {
        while let Some(ch) = self.peek_char() {
            self.advance();
            if ch == close {
                return Ok(());
            }
        }
        Err(PresearchError::malformed(self.input, start, reason))
    }

    fn error(&self, reason: &'static str) -> PresearchError {
        PresearchError::malformed(self.input, self.pos, reason)
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

fn has_case_variants(ch: char) -> bool {
    ch.to_lowercase().ne(ch.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(nodes: &[PatternNode]) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        for node in nodes {
            match node {
                PatternNode::Literal(c) => current.push(*c),
                PatternNode::Wildcard(_) => {
                    if !current.is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    #[test]
    fn test_wildcard_simple() {
        let nodes = parse_wildcard("fo*bar").unwrap();
        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes[2], PatternNode::Wildcard(WildcardOp::AnyString));
        assert_eq!(runs(&nodes), ["fo", "bar"]);
    }

    #[test]
    fn test_wildcard_escape() {
        let nodes = parse_wildcard("a\\*b?").unwrap();
        assert_eq!(runs(&nodes), ["a*b"]);
        assert_eq!(nodes.last(), Some(&PatternNode::Wildcard(WildcardOp::AnyChar)));
    }

    #[test]
    fn test_wildcard_trailing_backslash() {
        let err = parse_wildcard("abc\\").unwrap_err();
        assert!(matches!(err, PresearchError::MalformedPattern { position: 3, .. }));
    }

    #[test]
    fn test_regex_literal_runs() {
        assert_eq!(runs(&parse_regex("hello.*world").unwrap()), ["hello", "world"]);
        assert_eq!(runs(&parse_regex("^foo$").unwrap()), ["foo"]);
        assert_eq!(runs(&parse_regex("a\\.b").unwrap()), ["a.b"]);
    }

    #[test]
    fn test_regex_optional_removes_char() {
        assert_eq!(runs(&parse_regex("colou?r").unwrap()), ["colo", "r"]);
        assert_eq!(runs(&parse_regex("ab*c").unwrap()), ["a", "c"]);
        assert_eq!(runs(&parse_regex("ab{0,3}c").unwrap()), ["a", "c"]);
    }

    #[test]
    fn test_regex_repeat_keeps_one_copy() {
        assert_eq!(runs(&parse_regex("fo+bar").unwrap()), ["fo", "bar"]);
        assert_eq!(runs(&parse_regex("ab{2,}c").unwrap()), ["ab", "c"]);
    }

    #[test]
    fn test_regex_top_level_alternation() {
        let nodes = parse_regex("foo|barbaz").unwrap();
        assert_eq!(nodes, [PatternNode::Wildcard(WildcardOp::Alternation)]);
    }

    #[test]
    fn test_regex_groups() {
        assert_eq!(runs(&parse_regex("(foo)bar").unwrap()), ["foobar"]);
        assert_eq!(runs(&parse_regex("x(?:a|b)yz").unwrap()), ["x", "yz"]);
        assert_eq!(runs(&parse_regex("(ab)?cd").unwrap()), ["cd"]);
        assert_eq!(runs(&parse_regex("(?P<name>abc)d").unwrap()), ["abcd"]);
    }

    #[test]
    fn test_regex_classes_and_escapes() {
        assert_eq!(runs(&parse_regex("ab[c-e]fg").unwrap()), ["ab", "fg"]);
        assert_eq!(runs(&parse_regex("a[]x]b").unwrap()), ["a", "b"]);
        assert_eq!(runs(&parse_regex("id\\d+x").unwrap()), ["id", "x"]);
        assert_eq!(runs(&parse_regex("\\p{Greek}ab").unwrap()), ["ab"]);
        assert_eq!(runs(&parse_regex("\\x41\\x{42}c").unwrap()), ["ABc"]);
    }

    #[test]
    fn test_regex_case_insensitive_flags() {
        assert!(runs(&parse_regex("(?i)abc").unwrap()).is_empty());
        assert_eq!(runs(&parse_regex("(?i:ab)cd").unwrap()), ["cd"]);
        assert_eq!(runs(&parse_regex("(?i)12-34").unwrap()), ["12-34"]);
        assert_eq!(runs(&parse_regex("x(?i)a").unwrap()), ["x"]);
    }

    #[test]
    fn test_regex_verbose_flag() {
        assert_eq!(runs(&parse_regex("(?x)foo bar").unwrap()), ["foobar"]);
        assert_eq!(runs(&parse_regex("(?x) ab # comment\ncd").unwrap()), ["abcd"]);
        assert_eq!(runs(&parse_regex("(?x)ab\\ cd").unwrap()), ["ab cd"]);
        // Whitespace between an atom and its quantifier is ignored too
        assert_eq!(runs(&parse_regex("(?x)colou ?r").unwrap()), ["colo", "r"]);
        assert_eq!(runs(&parse_regex("(?x)a b{ 2 , }c").unwrap()), ["ab", "c"]);
    }

    #[test]
    fn test_regex_verbose_flag_scope() {
        assert_eq!(runs(&parse_regex("(?x:a b)c d").unwrap()), ["abc d"]);
        assert_eq!(runs(&parse_regex("x (?x)y z").unwrap()), ["x yz"]);
        assert_eq!(runs(&parse_regex("(a(?x) b)c d").unwrap()), ["abc d"]);
        assert_eq!(runs(&parse_regex("(?x)a b(?-x) c").unwrap()), ["ab c"]);
        assert_eq!(runs(&parse_regex("(?ix)A b").unwrap()), Vec::<String>::new());
    }

    #[test]
    fn test_regex_verbose_at_end() {
        assert!(parse_regex_with_flags("(?x)ab # note").unwrap().verbose_at_end);
        assert!(!parse_regex_with_flags("(?x:ab)c").unwrap().verbose_at_end);
        assert!(!parse_regex_with_flags("ab#c").unwrap().verbose_at_end);
        // Flags carry over into later alternatives
        assert!(parse_regex_with_flags("(?x)a|b # note").unwrap().verbose_at_end);
    }

    #[test]
    fn test_regex_malformed() {
        assert!(parse_regex("(abc").is_err());
        assert!(parse_regex("abc)").is_err());
        assert!(parse_regex("[abc").is_err());
        assert!(parse_regex("*abc").is_err());
        assert!(parse_regex("abc\\").is_err());
        assert!(parse_regex("a{3,1}").is_err());
        assert!(parse_regex("a{x}").is_err());
        assert!(parse_regex("\\xZZ").is_err());
    }

    #[test]
    fn test_regex_empty() {
        assert!(parse_regex("").unwrap().is_empty());
        assert!(parse_regex("()").unwrap().is_empty());
    }
}
