//! Expression tokenizer

use super::SyntaxError;
use crate::value::Number;

/// One step of a path as written in the source
#[derive(Debug, Clone, PartialEq)]
pub enum RawSegment {
    /// Leading `/`
    Root,
    /// `.`
    Current,
    /// `..`
    Parent,
    /// Plain name or index
    Name(String),
    /// `[expr]`, with the byte offset of the inner source
    Dynamic { source: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(Number),
    Str(String),
    True,
    False,
    Null,
    Path(Vec<RawSegment>),
    /// Identifier immediately followed by `(` (the parenthesis is consumed)
    Function(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the expression source
    pub offset: usize,
}

/// Lexer over an expression string
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };
            let offset = self.pos;
            let kind = match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ',' => self.single(TokenKind::Comma),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '*' => self.single(TokenKind::Star),
                '=' => {
                    if self.rest().starts_with("==") {
                        self.pos += 2;
                        TokenKind::Eq
                    } else {
                        return Err(SyntaxError::new(offset, "unexpected '='"));
                    }
                }
                '!' => {
                    if self.rest().starts_with("!=") {
                        self.pos += 2;
                        TokenKind::Ne
                    } else {
                        return Err(SyntaxError::new(offset, "unexpected '!'"));
                    }
                }
                '<' => self.maybe_equal(TokenKind::Lt, TokenKind::Le),
                '>' => self.maybe_equal(TokenKind::Gt, TokenKind::Ge),
                '\'' | '"' => TokenKind::Str(self.read_string(c)?),
                '0'..='9' => self.read_number(),
                '.' if self.next_is_digit() => self.read_number(),
                '/' | '.' | '[' => TokenKind::Path(self.read_path()?),
                c if is_name_start(c) => self.read_word()?,
                other => {
                    return Err(SyntaxError::new(
                        offset,
                        format!("unexpected character '{}'", other),
                    ))
                }
            };
            tokens.push(Token { kind, offset });
        }
        Ok(tokens)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn next_is_digit(&self) -> bool {
        self.rest()[1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn maybe_equal(&mut self, plain: TokenKind, with_equal: TokenKind) -> TokenKind {
        self.pos += 1;
        if self.peek() == Some('=') {
            self.pos += 1;
            with_equal
        } else {
            plain
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            if c == quote {
                return Ok(value);
            }
            if c == '\\' {
                match self.peek() {
                    Some(escaped) if escaped == quote || escaped == '\\' => {
                        self.pos += escaped.len_utf8();
                        value.push(escaped);
                        continue;
                    }
                    _ => {}
                }
            }
            value.push(c);
        }
        Err(SyntaxError::new(start, "unterminated string literal"))
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.pos;
        let bytes = self.source.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.pos + 1 < bytes.len() && bytes[self.pos] == b'.' && bytes[self.pos + 1].is_ascii_digit()
        {
            is_float = true;
            self.pos += 1;
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        let text = &self.source[start..self.pos];
        if is_float {
            TokenKind::Number(Number::Float(text.parse().unwrap_or(0.0)))
        } else {
            match text.parse::<i64>() {
                Ok(i) => TokenKind::Number(Number::Int(i)),
                Err(_) => TokenKind::Number(Number::Float(text.parse().unwrap_or(0.0))),
            }
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_name_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.source[start..self.pos]
    }

    /// Keyword, function name, or the first segment of a path
    fn read_word(&mut self) -> Result<TokenKind, SyntaxError> {
        let start = self.pos;
        let word = self.read_name();
        if self.peek() != Some('/') {
            if let Some(keyword) = keyword(word) {
                return Ok(keyword);
            }
            let after = self.pos;
            self.skip_whitespace();
            if self.peek() == Some('(') {
                self.pos += 1;
                return Ok(TokenKind::Function(word.to_string()));
            }
            self.pos = after;
        }
        self.pos = start;
        self.read_path().map(TokenKind::Path)
    }

    fn read_path(&mut self) -> Result<Vec<RawSegment>, SyntaxError> {
        let mut segments = Vec::new();
        if self.peek() == Some('/') {
            self.pos += 1;
            segments.push(RawSegment::Root);
            if !self.peek().map(is_segment_start).unwrap_or(false) {
                return Ok(segments);
            }
        }
        loop {
            segments.push(self.read_segment()?);
            if self.peek() != Some('/') {
                return Ok(segments);
            }
            self.pos += 1;
            if !self.peek().map(is_segment_start).unwrap_or(false) {
                return Err(SyntaxError::new(self.pos, "expected a path segment after '/'"));
            }
        }
    }

    fn read_segment(&mut self) -> Result<RawSegment, SyntaxError> {
        let offset = self.pos;
        match self.peek() {
            Some('.') => {
                if self.rest().starts_with("..") {
                    self.pos += 2;
                    Ok(RawSegment::Parent)
                } else {
                    self.pos += 1;
                    Ok(RawSegment::Current)
                }
            }
            Some('[') => self.read_dynamic(),
            Some(c) if is_name_char(c) => Ok(RawSegment::Name(self.read_name().to_string())),
            _ => Err(SyntaxError::new(offset, "expected a path segment")),
        }
    }

    /// `[ ... ]` with nesting and quoted strings skipped
    fn read_dynamic(&mut self) -> Result<RawSegment, SyntaxError> {
        let open = self.pos;
        self.pos += 1;
        let inner_start = self.pos;
        let mut depth = 1;
        let mut quote: Option<char> = None;
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), '\\') => {
                    if let Some(next) = self.peek() {
                        self.pos += next.len_utf8();
                    }
                }
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, '[') => depth += 1,
                (None, ']') => {
                    depth -= 1;
                    if depth == 0 {
                        let inner_end = self.pos - 1;
                        return Ok(RawSegment::Dynamic {
                            source: self.source[inner_start..inner_end].to_string(),
                            offset: inner_start,
                        });
                    }
                }
                (None, _) => {}
            }
        }
        Err(SyntaxError::new(open, "unterminated '['"))
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "div" => TokenKind::Div,
        "mod" => TokenKind::Mod,
        "gt" => TokenKind::Gt,
        "gte" => TokenKind::Ge,
        "lt" => TokenKind::Lt,
        "lte" => TokenKind::Le,
        _ => return None,
    })
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_segment_start(c: char) -> bool {
    is_name_char(c) || c == '.' || c == '['
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            kinds("1 + 2 div 3 <= 4 and not true"),
            vec![
                TokenKind::Number(Number::Int(1)),
                TokenKind::Plus,
                TokenKind::Number(Number::Int(2)),
                TokenKind::Div,
                TokenKind::Number(Number::Int(3)),
                TokenKind::Le,
                TokenKind::Number(Number::Int(4)),
                TokenKind::And,
                TokenKind::Not,
                TokenKind::True,
            ]
        );
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            kinds("/data/items"),
            vec![TokenKind::Path(vec![
                RawSegment::Root,
                RawSegment::Name("data".to_string()),
                RawSegment::Name("items".to_string()),
            ])]
        );
        assert_eq!(kinds("/"), vec![TokenKind::Path(vec![RawSegment::Root])]);
        assert_eq!(
            kinds("../title"),
            vec![TokenKind::Path(vec![
                RawSegment::Parent,
                RawSegment::Name("title".to_string()),
            ])]
        );
        assert_eq!(
            kinds("list/0"),
            vec![TokenKind::Path(vec![
                RawSegment::Name("list".to_string()),
                RawSegment::Name("0".to_string()),
            ])]
        );
    }

    #[test]
    fn test_dynamic_segment() {
        assert_eq!(
            kinds("map/[key]"),
            vec![TokenKind::Path(vec![
                RawSegment::Name("map".to_string()),
                RawSegment::Dynamic {
                    source: "key".to_string(),
                    offset: 5,
                },
            ])]
        );
    }

    #[test]
    fn test_function_token() {
        assert_eq!(
            kinds("count (/items)"),
            vec![
                TokenKind::Function("count".to_string()),
                TokenKind::Path(vec![RawSegment::Root, RawSegment::Name("items".to_string())]),
                TokenKind::RParen,
            ]
        );
        assert_eq!(kinds("not(false)")[0], TokenKind::Not);
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds("'it\\'s'"), vec![TokenKind::Str("it's".to_string())]);
        assert_eq!(kinds("\"a b\""), vec![TokenKind::Str("a b".to_string())]);
    }

    #[test]
    fn test_errors_carry_offset() {
        let err = Lexer::new("2 == true=").tokenize().unwrap_err();
        assert_eq!(err.offset, 9);
        let err = Lexer::new("'open").tokenize().unwrap_err();
        assert_eq!(err.offset, 0);
    }
}
