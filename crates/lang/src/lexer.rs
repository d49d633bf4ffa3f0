//! Lexer for ConsoleBox source text
//!
//! Converts raw text into a stream of tokens. Offsets and columns count
//! characters, not bytes.

use crate::ast::{SourceLocation, Span};
use crate::error::{LangError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token types recognized by the lexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenType {
    // Literals
    String(String),
    Float(f64),
    Integer(i64),

    // Identifiers and keywords
    Identifier(String),
    Keyword(Keyword),

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Not,
    Assign,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Dot,

    // Special
    Eof,
    Comment(String),
}

/// Reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Using,
    Static,
    Class,
    Function,
    Let,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Throw,
    Try,
    Catch,
    Break,
    Continue,
    New,
    True,
    False,
    Null,
}

impl Keyword {
    pub const ALL: [(&'static str, Keyword); 20] = [
        ("using", Keyword::Using),
        ("static", Keyword::Static),
        ("class", Keyword::Class),
        ("function", Keyword::Function),
        ("let", Keyword::Let),
        ("if", Keyword::If),
        ("else", Keyword::Else),
        ("while", Keyword::While),
        ("for", Keyword::For),
        ("in", Keyword::In),
        ("return", Keyword::Return),
        ("throw", Keyword::Throw),
        ("try", Keyword::Try),
        ("catch", Keyword::Catch),
        ("break", Keyword::Break),
        ("continue", Keyword::Continue),
        ("new", Keyword::New),
        ("true", Keyword::True),
        ("false", Keyword::False),
        ("null", Keyword::Null),
    ];

    pub fn as_str(&self) -> &'static str {
        Keyword::ALL
            .iter()
            .find(|(_, keyword)| keyword == self)
            .map(|(text, _)| *text)
            .unwrap_or("")
    }
}

/// Token with location information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl Token {
    /// Span covering the token; multi-line tokens end at their start line.
    pub fn span(&self) -> Span {
        Span {
            start: SourceLocation {
                line: self.line,
                column: self.column,
                offset: self.offset,
            },
            end: SourceLocation {
                line: self.line,
                column: self.column + self.length,
                offset: self.offset + self.length,
            },
        }
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.length
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.token_type {
            TokenType::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.token_type == TokenType::Keyword(keyword)
    }
}

/// Lexer for ConsoleBox source
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    keywords: HashMap<&'static str, Keyword>,
    /// Errors found inside a token that was still produced.
    deferred: Vec<LangError>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            keywords: Keyword::ALL.iter().copied().collect(),
            deferred: Vec::new(),
        }
    }

    /// Tokenize the entire input, stopping at the first error.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            if let Some(error) = self.deferred.drain(..).next() {
                return Err(error);
            }
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);

            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Tokenize everything, skipping offending characters and collecting errors.
    pub fn tokenize_with_errors(&mut self) -> (Vec<Token>, Vec<LangError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        loop {
            let before = self.position;
            let next = self.next_token();
            errors.append(&mut self.deferred);
            match next {
                Ok(token) => {
                    let is_eof = matches!(token.token_type, TokenType::Eof);
                    tokens.push(token);
                    if is_eof {
                        break;
                    }
                }
                Err(error) => {
                    errors.push(error);
                    if self.position == before {
                        self.advance();
                    }
                }
            }
        }

        (tokens, errors)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let start_line = self.line;
        let start_column = self.column;
        let start_offset = self.position;

        if self.position >= self.input.len() {
            return Ok(Token {
                token_type: TokenType::Eof,
                line: start_line,
                column: start_column,
                offset: start_offset,
                length: 0,
            });
        }

        let ch = self.current_char();

        let token_type = match ch {
            '/' if self.peek_char() == Some('/') => TokenType::Comment(self.read_line_comment()),
            '/' if self.peek_char() == Some('*') => TokenType::Comment(self.read_block_comment()?),

            '"' => TokenType::String(self.read_string()?),

            c if c.is_ascii_digit() => self.read_number()?,

            c if c.is_alphabetic() || c == '_' => {
                let identifier = self.read_identifier();
                match self.keywords.get(identifier.as_str()) {
                    Some(keyword) => TokenType::Keyword(*keyword),
                    None => TokenType::Identifier(identifier),
                }
            }

            '+' => self.single(TokenType::Plus),
            '-' => self.single(TokenType::Minus),
            '*' => self.single(TokenType::Multiply),
            '/' => self.single(TokenType::Divide),
            '%' => self.single(TokenType::Modulo),
            '=' if self.peek_char() == Some('=') => self.double(TokenType::Equal),
            '=' => self.single(TokenType::Assign),
            '!' if self.peek_char() == Some('=') => self.double(TokenType::NotEqual),
            '!' => self.single(TokenType::Not),
            '<' if self.peek_char() == Some('=') => self.double(TokenType::LessThanOrEqual),
            '<' => self.single(TokenType::LessThan),
            '>' if self.peek_char() == Some('=') => self.double(TokenType::GreaterThanOrEqual),
            '>' => self.single(TokenType::GreaterThan),
            '&' if self.peek_char() == Some('&') => self.double(TokenType::And),
            '|' if self.peek_char() == Some('|') => self.double(TokenType::Or),

            '(' => self.single(TokenType::LeftParen),
            ')' => self.single(TokenType::RightParen),
            '{' => self.single(TokenType::LeftBrace),
            '}' => self.single(TokenType::RightBrace),
            '[' => self.single(TokenType::LeftBracket),
            ']' => self.single(TokenType::RightBracket),
            ',' => self.single(TokenType::Comma),
            ';' => self.single(TokenType::Semicolon),
            '.' => self.single(TokenType::Dot),

            _ => {
                let span = self.span_from(start_line, start_column, start_offset, 1);
                self.advance();
                return Err(LangError::lexing(
                    format!("Unexpected character '{}'", ch),
                    span,
                ));
            }
        };

        Ok(Token {
            token_type,
            line: start_line,
            column: start_column,
            offset: start_offset,
            length: self.position - start_offset,
        })
    }

    fn single(&mut self, token_type: TokenType) -> TokenType {
        self.advance();
        token_type
    }

    fn double(&mut self, token_type: TokenType) -> TokenType {
        self.advance();
        self.advance();
        token_type
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char_opt() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let (line, column, offset) = (self.line, self.column, self.position);
        self.advance(); // opening quote
        let mut string = String::new();

        while let Some(ch) = self.current_char_opt() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(string);
                }
                '\\' => {
                    self.advance();
                    let Some(escaped) = self.current_char_opt() else {
                        break;
                    };
                    match escaped {
                        'n' => string.push('\n'),
                        't' => string.push('\t'),
                        'r' => string.push('\r'),
                        '0' => string.push('\0'),
                        '\\' => string.push('\\'),
                        '"' => string.push('"'),
                        // Reported, then skipped so the rest of the literal still lexes.
                        other => {
                            let span = self.span_from(self.line, self.column - 1, self.position - 1, 2);
                            self.deferred.push(LangError::lexing(
                                format!("Unrecognized escape sequence '\\{}'", other),
                                span,
                            ));
                        }
                    }
                    self.advance();
                }
                '\n' => break,
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        let length = self.position - offset;
        Err(LangError::lexing(
            "Newline in constant",
            self.span_from(line, column, offset, length.max(1)),
        ))
    }

    fn read_number(&mut self) -> Result<TokenType> {
        let (line, column, offset) = (self.line, self.column, self.position);
        let mut number_str = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char_opt() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.advance();
            } else if ch == '.'
                && !has_dot
                && self.peek_char().is_some_and(|next| next.is_ascii_digit())
            {
                has_dot = true;
                number_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let span = self.span_from(line, column, offset, number_str.chars().count());
        if has_dot {
            number_str
                .parse::<f64>()
                .map(TokenType::Float)
                .map_err(|_| LangError::lexing(format!("Invalid number: {}", number_str), span))
        } else {
            number_str.parse::<i64>().map(TokenType::Integer).map_err(|_| {
                LangError::lexing("Integral constant is too large", span)
            })
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut identifier = String::new();
        while let Some(ch) = self.current_char_opt() {
            if ch.is_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        identifier
    }

    fn read_line_comment(&mut self) -> String {
        self.advance();
        self.advance();
        let mut comment = String::new();
        while let Some(ch) = self.current_char_opt() {
            if ch == '\n' {
                break;
            }
            comment.push(ch);
            self.advance();
        }
        comment.trim().to_string()
    }

    fn read_block_comment(&mut self) -> Result<String> {
        let (line, column, offset) = (self.line, self.column, self.position);
        self.advance();
        self.advance();
        let mut comment = String::new();

        while let Some(ch) = self.current_char_opt() {
            if ch == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(comment.trim().to_string());
            }
            comment.push(ch);
            self.advance();
        }

        Err(LangError::lexing(
            "End-of-file found, '*/' expected",
            self.span_from(line, column, offset, 2),
        ))
    }

    fn span_from(&self, line: usize, column: usize, offset: usize, length: usize) -> Span {
        Span {
            start: SourceLocation {
                line,
                column,
                offset,
            },
            end: SourceLocation {
                line,
                column: column + length,
                offset: offset + length,
            },
        }
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn current_char_opt(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char_opt() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenType> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        let tokens = kinds("let x = 42;");
        assert_eq!(
            tokens,
            vec![
                TokenType::Keyword(Keyword::Let),
                TokenType::Identifier("x".to_string()),
                TokenType::Assign,
                TokenType::Integer(42),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_member_chain() {
        let tokens = kinds("System.Console.WriteLine(\"Hi\");");
        assert_eq!(tokens[0], TokenType::Identifier("System".to_string()));
        assert_eq!(tokens[1], TokenType::Dot);
        assert_eq!(tokens[4], TokenType::Identifier("WriteLine".to_string()));
        assert_eq!(tokens[6], TokenType::String("Hi".to_string()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("3.25")[0], TokenType::Float(3.25));
        assert_eq!(kinds("7")[0], TokenType::Integer(7));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("a == b != c <= d && !e || f");
        assert!(tokens.contains(&TokenType::Equal));
        assert!(tokens.contains(&TokenType::NotEqual));
        assert!(tokens.contains(&TokenType::LessThanOrEqual));
        assert!(tokens.contains(&TokenType::And));
        assert!(tokens.contains(&TokenType::Not));
        assert!(tokens.contains(&TokenType::Or));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\n\"c\"""#)[0],
            TokenType::String("a\tb\n\"c\"".to_string())
        );
    }

    #[test]
    fn test_bad_escape_reported_once() {
        let (tokens, errors) =
            Lexer::new("Console.Write(\"caf\\u00e9\");\nlet x = 1;").tokenize_with_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Unrecognized escape sequence '\\u'");
        assert!(tokens
            .iter()
            .any(|t| t.token_type == TokenType::String("caf00e9".to_string())));
        assert!(tokens.iter().any(|t| t.token_type == TokenType::RightParen));
        assert!(tokens
            .iter()
            .any(|t| t.token_type == TokenType::Identifier("x".to_string())));

        assert!(Lexer::new("\"\\q\"").tokenize().is_err());
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = Lexer::new("function main() {\n  foo();\n}").tokenize().unwrap();
        let foo = tokens
            .iter()
            .find(|t| t.identifier() == Some("foo"))
            .unwrap();
        assert_eq!(foo.line, 2);
        assert_eq!(foo.column, 3);
        assert_eq!(foo.offset, 20);
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("// note\n/* block */ x");
        assert_eq!(tokens[0], TokenType::Comment("note".to_string()));
        assert_eq!(tokens[1], TokenType::Comment("block".to_string()));
        assert_eq!(tokens[2], TokenType::Identifier("x".to_string()));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let error = Lexer::new("let s = \"abc").tokenize().unwrap_err();
        assert!(matches!(error, LangError::Lexing { .. }));
        assert_eq!(error.span().start.column, 9);
    }

    #[test]
    fn test_lossy_tokenize_recovers() {
        let (tokens, errors) = Lexer::new("let # x = 1;").tokenize_with_errors();
        assert_eq!(errors.len(), 1);
        assert!(tokens
            .iter()
            .any(|t| t.token_type == TokenType::Identifier("x".to_string())));
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    }
}
