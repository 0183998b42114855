// fhirlens Parser
//
// This module turns a token stream into an ordered list of navigation steps.
// Function names and argument shapes are checked here, so malformed
// expressions fail before any resource is touched.

use crate::errors::FhirPathError;
use crate::functions::{self, ArgumentKind, Function};
use crate::lexer::{Token, TokenType};
use crate::schema::Schema;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Literal operand of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
}

impl Literal {
    /// Canonical text form used for coerced equality
    pub fn text(&self) -> String {
        match self {
            Literal::String(s) => s.clone(),
            Literal::Integer(i) => i.to_string(),
            Literal::Decimal(d) => d.to_string(),
            Literal::Boolean(b) => b.to_string(),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Literal::Integer(i) => Some(Decimal::from(*i)),
            Literal::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

/// Equality condition `path = literal` inside `where(...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field names navigated from each candidate node
    pub path: Vec<String>,
    pub literal: Literal,
}

/// Typed function argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    None,
    Predicate(Predicate),
}

impl Argument {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            Argument::None => ArgumentKind::None,
            Argument::Predicate(_) => ArgumentKind::Predicate,
        }
    }
}

/// A function call with its validated argument
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub function: Function,
    pub argument: Argument,
}

/// One parsed unit of a path expression
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Navigate to a named field
    Field(String),

    /// Keep only resources of the named type
    TypeFilter(String),

    /// Leading capitalized name the schema does not know as a resource.
    /// Filters by type when an input resource has that type, otherwise
    /// navigates to the field of that name.
    TypeOrField(String),

    /// Call a registered function
    Invoke(Invocation),
}

/// Ordered, immutable sequence of steps
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    steps: Vec<Step>,
}

impl ParsedExpression {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Parser for path expressions
pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    schema: &'a Schema,
}

impl<'a> Parser<'a> {
    /// Creates a new parser; the schema supplies resource type names
    pub fn new(tokens: &'a [Token], schema: &'a Schema) -> Self {
        Self {
            tokens,
            current: 0,
            schema,
        }
    }

    /// Parses a full expression
    pub fn parse(&mut self) -> Result<ParsedExpression, FhirPathError> {
        if self.is_at_end() {
            return Err(FhirPathError::syntax("Empty expression"));
        }

        let mut steps = Vec::new();
        loop {
            let step = self.step(steps.is_empty())?;
            steps.push(step);

            if self.match_token(TokenType::Dot) {
                continue;
            }
            if self.is_at_end() {
                break;
            }

            let token = self.peek();
            let message = match token.token_type {
                TokenType::RightParen => "Unmatched ')'".to_string(),
                t if t.is_operator() => format!("Unsupported operator '{}'", token.lexeme),
                _ => format!("Expected '.', got '{}'", token.lexeme),
            };
            return Err(self.error_at(token, &message));
        }

        Ok(ParsedExpression::new(steps))
    }

    /// Checks if we've reached the end of the token stream
    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || self.peek().token_type == TokenType::EOF
    }

    /// Returns the current token without advancing
    fn peek(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;
        &tokens[self.current.min(tokens.len().saturating_sub(1))]
    }

    /// Returns the token after the current one
    fn peek_next(&self) -> Option<&'a Token> {
        let tokens: &'a [Token] = self.tokens;
        tokens.get(self.current + 1)
    }

    /// Advances to the next token and returns the consumed one
    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    /// Checks if the current token matches the given type
    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    /// Consumes the current token if it matches the given type
    fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_at(&self, token: &Token, message: &str) -> FhirPathError {
        FhirPathError::syntax(format!(
            "{} at line {}, column {}",
            message, token.line, token.column
        ))
    }

    /// Parses one dot-separated segment
    fn step(&mut self, first: bool) -> Result<Step, FhirPathError> {
        let token = self.advance();
        match token.token_type {
            TokenType::Identifier if self.check(TokenType::LeftParen) => {
                self.invocation(token).map(Step::Invoke)
            }
            TokenType::Identifier if first && self.schema.is_resource_type(&token.lexeme) => {
                Ok(Step::TypeFilter(token.lexeme.clone()))
            }
            TokenType::Identifier if first && starts_uppercase(&token.lexeme) => {
                Ok(Step::TypeOrField(token.lexeme.clone()))
            }
            TokenType::Identifier | TokenType::DelimitedIdentifier => {
                Ok(Step::Field(token.lexeme.clone()))
            }
            t if t.is_keyword() => Ok(Step::Field(token.lexeme.clone())),
            TokenType::EOF => Err(self.error_at(token, "Expected identifier after '.'")),
            _ => Err(self.error_at(
                token,
                &format!("Expected identifier, got '{}'", token.lexeme),
            )),
        }
    }

    /// Parses `name(args)`; the name token has been consumed
    fn invocation(&mut self, name: &'a Token) -> Result<Invocation, FhirPathError> {
        let signature = functions::lookup(&name.lexeme).ok_or_else(|| {
            let known: Vec<&str> = functions::function_names().collect();
            self.error_at(
                name,
                &format!(
                    "Unknown function: {} (expected one of {})",
                    name.lexeme,
                    known.join(", ")
                ),
            )
        })?;

        let open = self.advance();

        let argument = match signature.argument {
            ArgumentKind::None => Argument::None,
            ArgumentKind::Predicate => {
                if self.check(TokenType::RightParen) {
                    return Err(self.error_at(
                        name,
                        &format!("'{}' function expects a predicate argument", signature.name),
                    ));
                }
                Argument::Predicate(self.predicate()?)
            }
        };

        if self.match_token(TokenType::RightParen) {
            return Ok(Invocation {
                function: signature.function,
                argument,
            });
        }

        let token = self.peek();
        let message = match (signature.argument, token.token_type) {
            (_, TokenType::EOF) => "Unmatched '('".to_string(),
            (ArgumentKind::None, _) => {
                format!("'{}' function expects 0 arguments", signature.name)
            }
            (ArgumentKind::Predicate, t) if t.is_operator() => format!(
                "Unsupported operator '{}' in {}() predicate",
                token.lexeme, signature.name
            ),
            (ArgumentKind::Predicate, _) => {
                format!("Expected ')' after {}() predicate", signature.name)
            }
        };
        let at = if token.token_type == TokenType::EOF {
            open
        } else {
            token
        };
        Err(self.error_at(at, &message))
    }

    /// Parses `path = literal` or `literal = path`
    fn predicate(&mut self) -> Result<Predicate, FhirPathError> {
        if self.at_literal() {
            let literal = self.literal()?;
            self.equals()?;
            let path = self.predicate_path()?;
            Ok(Predicate { path, literal })
        } else {
            let path = self.predicate_path()?;
            self.equals()?;
            let literal = self.literal()?;
            Ok(Predicate { path, literal })
        }
    }

    fn at_literal(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::StringLiteral
                | TokenType::NumberLiteral
                | TokenType::BooleanLiteral
                | TokenType::Minus
        )
    }

    fn equals(&mut self) -> Result<(), FhirPathError> {
        if self.match_token(TokenType::Equal) {
            return Ok(());
        }
        let token = self.peek();
        let message = if token.token_type.is_operator() {
            format!(
                "Unsupported operator '{}' in predicate; only '=' is supported",
                token.lexeme
            )
        } else {
            "Expected '=' in predicate".to_string()
        };
        Err(self.error_at(token, &message))
    }

    /// Parses `name(.name)*` inside a predicate
    fn predicate_path(&mut self) -> Result<Vec<String>, FhirPathError> {
        let mut path = Vec::new();
        loop {
            let token = self.advance();
            match token.token_type {
                TokenType::Identifier if self.check(TokenType::LeftParen) => {
                    return Err(self.error_at(
                        token,
                        "Function calls are not supported inside predicates",
                    ));
                }
                TokenType::Identifier | TokenType::DelimitedIdentifier => {
                    path.push(token.lexeme.clone())
                }
                t if t.is_keyword() => path.push(token.lexeme.clone()),
                _ => {
                    return Err(self.error_at(
                        token,
                        &format!("Expected field name in predicate, got '{}'", token.lexeme),
                    ))
                }
            }

            // A dot followed by a name continues the path
            let continues = self.check(TokenType::Dot)
                && self.peek_next().is_some_and(|next| {
                    matches!(
                        next.token_type,
                        TokenType::Identifier | TokenType::DelimitedIdentifier
                    ) || next.token_type.is_keyword()
                });
            if !continues {
                return Ok(path);
            }
            self.advance();
        }
    }

    /// Parses a string, number or boolean literal
    fn literal(&mut self) -> Result<Literal, FhirPathError> {
        let negative = self.match_token(TokenType::Minus);
        let token = self.advance();
        match token.token_type {
            TokenType::NumberLiteral => parse_number(&token.lexeme, negative)
                .ok_or_else(|| self.error_at(token, &format!("Invalid number: {}", token.lexeme))),
            _ if negative => Err(self.error_at(token, "Expected number after '-'")),
            TokenType::StringLiteral => Ok(Literal::String(token.lexeme.clone())),
            TokenType::BooleanLiteral => Ok(Literal::Boolean(token.lexeme == "true")),
            _ => Err(self.error_at(
                token,
                &format!("Expected literal in predicate, got '{}'", token.lexeme),
            )),
        }
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn parse_number(lexeme: &str, negative: bool) -> Option<Literal> {
    if lexeme.contains('.') {
        let value = Decimal::from_str(lexeme).ok()?;
        Some(Literal::Decimal(if negative { -value } else { value }))
    } else {
        let value: i64 = lexeme.parse().ok()?;
        Some(Literal::Integer(if negative { -value } else { value }))
    }
}

/// Parses an expression from tokens
pub fn parse(tokens: &[Token], schema: &Schema) -> Result<ParsedExpression, FhirPathError> {
    let mut parser = Parser::new(tokens, schema);
    parser.parse()
}

/// Tokenizes and parses an expression
pub fn parse_str(expression: &str, schema: &Schema) -> Result<ParsedExpression, FhirPathError> {
    let tokens = crate::lexer::tokenize(expression)?;
    parse(&tokens, schema)
}
