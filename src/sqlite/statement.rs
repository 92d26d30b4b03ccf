//! SQL statement parsing.
//!
//! A two-step hand-rolled parser: lexical analysis into tokens, then
//! parsing into a [`SelectStmt`]. Only the SELECT shape the executor
//! consumes is accepted:
//!
//! ```text
//! SELECT <idents | * | COUNT(*)> FROM <tables>
//!     [WHERE col = literal [AND ...]] [LIMIT n]
//! ```

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::sqlite::core::schema::clean_identifier;

/// Sentinel carried in the projection when the query is `COUNT(*)`.
pub const COUNT_IDENT: &str = "count(*)";

/// Represents different types of SQL tokens
#[derive(Debug, PartialEq, Clone)]
enum Token {
    /// Keywords (SELECT, FROM, WHERE, AND, LIMIT)
    Keyword(String),
    /// Identifiers like table names, column names
    Identifier(String),
    /// Function names
    Function(String),
    /// A single-quoted string literal
    StringLiteral(String),
    /// An integer literal
    Number(String),
    /// Special characters and operators
    Symbol(char),
    /// The wildcard operator *
    Asterisk,
}

/// A parsed SELECT statement, identifiers already normalized.
#[derive(Debug, PartialEq)]
pub struct SelectStmt {
    pub tables: Vec<String>,
    /// Projected column names; `*` or the `count(*)` sentinel.
    pub projection: Vec<String>,
    /// Equality WHERE conjunctions, column -> literal (lowercased).
    pub predicates: HashMap<String, String>,
    /// 0 means unbounded.
    pub limit: usize,
}

impl SelectStmt {
    pub fn parse(sql: &str) -> Result<Self> {
        let tokens = tokenize(sql)?;
        parse_tokens(tokens)
    }

    pub fn is_count(&self) -> bool {
        self.projection.first().map(String::as_str) == Some(COUNT_IDENT)
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }

            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.to_uppercase().as_str() {
                    "SELECT" | "FROM" | "WHERE" | "AND" | "LIMIT" => Token::Keyword(word),
                    "COUNT" => Token::Function(word),
                    _ => Token::Identifier(word),
                };
                tokens.push(token);
            }

            c if c.is_ascii_digit() => {
                let mut number = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(number));
            }

            '\'' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => literal.push(c),
                        None => return Err(anyhow!("unterminated string literal")),
                    }
                }
                tokens.push(Token::StringLiteral(literal));
            }

            '"' => {
                chars.next();
                let mut ident = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => ident.push(c),
                        None => return Err(anyhow!("unterminated quoted identifier")),
                    }
                }
                tokens.push(Token::Identifier(ident));
            }

            '[' => {
                chars.next();
                let mut ident = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => ident.push(c),
                        None => return Err(anyhow!("unterminated bracketed identifier")),
                    }
                }
                tokens.push(Token::Identifier(ident));
            }

            '*' => {
                tokens.push(Token::Asterisk);
                chars.next();
            }
            '(' | ')' | ',' | '=' | ';' => {
                tokens.push(Token::Symbol(c));
                chars.next();
            }

            _ => return Err(anyhow!("unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

fn parse_tokens(tokens: Vec<Token>) -> Result<SelectStmt> {
    let mut iter = tokens.into_iter().peekable();

    match iter.next() {
        Some(Token::Keyword(k)) if k.to_uppercase() == "SELECT" => {}
        _ => return Err(anyhow!("expected SELECT keyword")),
    }

    // Projection list, up to FROM.
    let mut projection = Vec::new();
    loop {
        match iter.next() {
            Some(Token::Function(_)) => {
                for expected in ['(', '*', ')'] {
                    let matched = match (expected, iter.next()) {
                        ('*', Some(Token::Asterisk)) => true,
                        (sym, Some(Token::Symbol(c))) => c == sym,
                        _ => false,
                    };
                    if !matched {
                        return Err(anyhow!("malformed COUNT(*) expression"));
                    }
                }
                projection.push(COUNT_IDENT.to_string());
            }
            Some(Token::Asterisk) => projection.push("*".to_string()),
            Some(Token::Identifier(ident)) => projection.push(clean_identifier(&ident)),
            other => return Err(anyhow!("unexpected token in projection: {other:?}")),
        }

        match iter.next() {
            Some(Token::Symbol(',')) => continue,
            Some(Token::Keyword(k)) if k.to_uppercase() == "FROM" => break,
            other => return Err(anyhow!("expected , or FROM, got {other:?}")),
        }
    }

    // Table list.
    let mut tables = Vec::new();
    loop {
        match iter.next() {
            Some(Token::Identifier(table)) => tables.push(clean_identifier(&table)),
            other => return Err(anyhow!("expected table name, got {other:?}")),
        }
        match iter.peek() {
            Some(Token::Symbol(',')) => {
                iter.next();
            }
            _ => break,
        }
    }

    // Optional WHERE conjunctions.
    let mut predicates = HashMap::new();
    if matches!(iter.peek(), Some(Token::Keyword(k)) if k.to_uppercase() == "WHERE") {
        iter.next();
        loop {
            let column = match iter.next() {
                Some(Token::Identifier(ident)) => clean_identifier(&ident),
                other => return Err(anyhow!("expected column in WHERE, got {other:?}")),
            };
            match iter.next() {
                Some(Token::Symbol('=')) => {}
                other => return Err(anyhow!("expected = in WHERE, got {other:?}")),
            }
            let literal = match iter.next() {
                Some(Token::StringLiteral(s)) => s.to_lowercase(),
                Some(Token::Number(n)) => n,
                Some(Token::Identifier(ident)) => clean_identifier(&ident),
                other => return Err(anyhow!("expected literal in WHERE, got {other:?}")),
            };
            predicates.insert(column, literal);

            match iter.peek() {
                Some(Token::Keyword(k)) if k.to_uppercase() == "AND" => {
                    iter.next();
                }
                _ => break,
            }
        }
    }

    // Optional LIMIT.
    let mut limit = 0;
    if matches!(iter.peek(), Some(Token::Keyword(k)) if k.to_uppercase() == "LIMIT") {
        iter.next();
        limit = match iter.next() {
            Some(Token::Number(n)) => n.parse()?,
            other => return Err(anyhow!("expected number after LIMIT, got {other:?}")),
        };
    }

    match iter.next() {
        None | Some(Token::Symbol(';')) => {}
        Some(other) => return Err(anyhow!("trailing token: {other:?}")),
    }

    Ok(SelectStmt {
        tables,
        projection,
        predicates,
        limit,
    })
}
