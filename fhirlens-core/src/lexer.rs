// fhirlens Lexer
//
// This module implements the lexical analysis for path expressions.

use crate::errors::FhirPathError;
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

/// Token types for path expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Literals
    Identifier,
    DelimitedIdentifier,
    StringLiteral,
    NumberLiteral,
    BooleanLiteral,

    // Operators
    Dot,            // .
    Equal,          // =
    NotEqual,       // !=
    Equivalent,     // ~
    NotEquivalent,  // !~
    LessThan,       // <
    LessOrEqual,    // <=
    GreaterThan,    // >
    GreaterOrEqual, // >=
    Plus,           // +
    Minus,          // -
    Multiply,       // *
    Divide,         // /
    Ampersand,      // &
    Pipe,           // |

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Comma,        // ,

    // Keywords
    And,      // and
    Or,       // or
    Xor,      // xor
    Implies,  // implies
    In,       // in
    Contains, // contains
    Is,       // is
    As,       // as
    Div,      // div
    Mod,      // mod

    // End of input
    EOF,
}

impl TokenType {
    /// Operators and operator keywords of the full FHIRPath grammar
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            TokenType::Equal
                | TokenType::NotEqual
                | TokenType::Equivalent
                | TokenType::NotEquivalent
                | TokenType::LessThan
                | TokenType::LessOrEqual
                | TokenType::GreaterThan
                | TokenType::GreaterOrEqual
                | TokenType::Plus
                | TokenType::Minus
                | TokenType::Multiply
                | TokenType::Divide
                | TokenType::Ampersand
                | TokenType::Pipe
                | TokenType::And
                | TokenType::Or
                | TokenType::Xor
                | TokenType::Implies
                | TokenType::In
                | TokenType::Contains
                | TokenType::Is
                | TokenType::As
                | TokenType::Div
                | TokenType::Mod
        )
    }

    /// Keywords double as element names in navigation position
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenType::And
                | TokenType::Or
                | TokenType::Xor
                | TokenType::Implies
                | TokenType::In
                | TokenType::Contains
                | TokenType::Is
                | TokenType::As
                | TokenType::Div
                | TokenType::Mod
        )
    }
}

/// A token in a path expression
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

/// Lexer for path expressions
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
    line: usize,
    column: usize,
    keywords: HashMap<&'static str, TokenType>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input
    pub fn new(input: &'a str) -> Self {
        let keywords = HashMap::from([
            ("and", TokenType::And),
            ("or", TokenType::Or),
            ("xor", TokenType::Xor),
            ("implies", TokenType::Implies),
            ("in", TokenType::In),
            ("contains", TokenType::Contains),
            ("is", TokenType::Is),
            ("as", TokenType::As),
            ("div", TokenType::Div),
            ("mod", TokenType::Mod),
            ("true", TokenType::BooleanLiteral),
            ("false", TokenType::BooleanLiteral),
        ]);

        Lexer {
            chars: input.chars().peekable(),
            position: 0,
            line: 1,
            column: 1,
            keywords,
        }
    }

    /// Advances the lexer by one character
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(ch) = c {
            self.position += 1;
            self.column += 1;

            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            }
        }
        c
    }

    /// Peeks at the next character without advancing
    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    /// Peeks one character past the next one
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn error(&self, message: impl std::fmt::Display) -> FhirPathError {
        FhirPathError::syntax(format!(
            "{} at line {}, column {}",
            message, self.line, self.column
        ))
    }

    /// Skips whitespace and comments
    fn skip_trivia(&mut self) -> Result<(), FhirPathError> {
        loop {
            match self.peek().copied() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(&c) = self.peek() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some(&'/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(FhirPathError::syntax(format!(
                                    "Unterminated block comment starting at line {}, column {}",
                                    line, column
                                )))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Scans an identifier or keyword
    fn identifier(&mut self) -> String {
        let mut identifier = String::new();
        while let Some(&c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                identifier.push(c);
                self.advance();
            } else {
                break;
            }
        }
        identifier
    }

    /// Scans a number literal
    fn number(&mut self) -> String {
        let mut number = String::new();
        let mut has_decimal = false;

        while let Some(&c) = self.peek() {
            if c.is_ascii_digit() {
                number.push(c);
                self.advance();
            } else if c == '.'
                && !has_decimal
                && self.peek_second().is_some_and(|next| next.is_ascii_digit())
            {
                has_decimal = true;
                number.push(c);
                self.advance();
            } else {
                // A dot not followed by a digit starts the next path segment
                break;
            }
        }
        number
    }

    /// Reads a backslash escape; the backslash has been consumed
    fn escape(&mut self, quote: char) -> Result<char, FhirPathError> {
        let Some(escaped) = self.advance() else {
            return Err(self.error("Incomplete escape sequence"));
        };
        let c = match escaped {
            c if c == quote => c,
            '\'' | '"' | '`' | '\\' | '/' => escaped,
            'f' => '\x0C',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => {
                let mut value = 0u32;
                for _ in 0..4 {
                    let digit = self
                        .advance()
                        .and_then(|hex| hex.to_digit(16))
                        .ok_or_else(|| self.error("Invalid unicode escape sequence"))?;
                    value = value * 16 + digit;
                }
                char::from_u32(value)
                    .ok_or_else(|| self.error("Invalid unicode value in escape sequence"))?
            }
            other => return Err(self.error(format!("Invalid escape sequence '\\{}'", other))),
        };
        Ok(c)
    }

    /// Scans a quoted string literal or delimited identifier
    fn quoted(&mut self, quote: char, what: &str) -> Result<String, FhirPathError> {
        let (line, column) = (self.line, self.column);

        // Opening quote
        self.advance();

        let mut value = String::new();
        while let Some(c) = self.advance() {
            match c {
                c if c == quote => return Ok(value),
                '\\' => value.push(self.escape(quote)?),
                '\n' => break,
                c => value.push(c),
            }
        }

        Err(FhirPathError::syntax(format!(
            "Unterminated {} at line {}, column {}",
            what, line, column
        )))
    }

    /// Scans the next token
    pub fn scan_token(&mut self) -> Result<Token, FhirPathError> {
        self.skip_trivia()?;

        let (position, line, column) = (self.position, self.line, self.column);
        let token = |token_type: TokenType, lexeme: String| Token {
            token_type,
            lexeme,
            position,
            line,
            column,
        };

        let Some(&c) = self.peek() else {
            return Ok(token(TokenType::EOF, String::new()));
        };

        let single = match c {
            '(' => Some(TokenType::LeftParen),
            ')' => Some(TokenType::RightParen),
            '[' => Some(TokenType::LeftBracket),
            ']' => Some(TokenType::RightBracket),
            ',' => Some(TokenType::Comma),
            '|' => Some(TokenType::Pipe),
            '.' => Some(TokenType::Dot),
            '+' => Some(TokenType::Plus),
            '-' => Some(TokenType::Minus),
            '*' => Some(TokenType::Multiply),
            '/' => Some(TokenType::Divide),
            '&' => Some(TokenType::Ampersand),
            '=' => Some(TokenType::Equal),
            '~' => Some(TokenType::Equivalent),
            _ => None,
        };
        if let Some(token_type) = single {
            self.advance();
            return Ok(token(token_type, c.to_string()));
        }

        match c {
            '!' | '<' | '>' => {
                self.advance();
                let next = self.peek().copied();
                let (token_type, lexeme) = match (c, next) {
                    ('!', Some('=')) => (TokenType::NotEqual, "!="),
                    ('!', Some('~')) => (TokenType::NotEquivalent, "!~"),
                    ('<', Some('=')) => (TokenType::LessOrEqual, "<="),
                    ('>', Some('=')) => (TokenType::GreaterOrEqual, ">="),
                    ('<', _) => return Ok(token(TokenType::LessThan, "<".to_string())),
                    ('>', _) => return Ok(token(TokenType::GreaterThan, ">".to_string())),
                    _ => {
                        return Err(FhirPathError::syntax(format!(
                            "Unexpected character '!' at line {}, column {}",
                            line, column
                        )))
                    }
                };
                self.advance();
                Ok(token(token_type, lexeme.to_string()))
            }
            '\'' => {
                let value = self.quoted('\'', "string literal")?;
                Ok(token(TokenType::StringLiteral, value))
            }
            '`' => {
                let value = self.quoted('`', "delimited identifier")?;
                Ok(token(TokenType::DelimitedIdentifier, value))
            }
            '0'..='9' => {
                let number = self.number();
                Ok(token(TokenType::NumberLiteral, number))
            }
            c if c.is_alphabetic() || c == '_' => {
                let identifier = self.identifier();
                let token_type = self
                    .keywords
                    .get(identifier.as_str())
                    .copied()
                    .unwrap_or(TokenType::Identifier);
                Ok(token(token_type, identifier))
            }
            _ => Err(FhirPathError::syntax(format!(
                "Unexpected character '{}' at line {}, column {}",
                c, line, column
            ))),
        }
    }
}

/// Tokenizes a path expression
pub fn tokenize(input: &str) -> Result<Vec<Token>, FhirPathError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.scan_token()?;
        let is_eof = token.token_type == TokenType::EOF;
        tokens.push(token);

        if is_eof {
            break;
        }
    }

    Ok(tokens)
}
