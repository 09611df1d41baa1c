//! Expression tokenizer
//!
//! Identifiers follow Unicode XID classes (plus `_`), numeric literals
//! carry width suffixes (`L` long, `F` float, `D` double, `H` big integer,
//! `B` big decimal), strings accept single or double quotes, and `$name`
//! reads a context variable. A bare `$`, `*`, `^`, or `~` token surfaces
//! so the parser can read the dynamic subscript sentinels inside brackets.

use num_bigint::BigInt;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{FieldPathError, Result};
use crate::model::Value;

/// One lexed token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal value (number, string, boolean, null)
    Literal(Value),
    /// Identifier
    Ident(String),
    /// Context variable reference (`$name`)
    Variable(String),
    /// `@`, starting a static field reference
    At,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*` (multiplication, or the ALL sentinel inside brackets)
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `^` (the FIRST sentinel inside brackets)
    Caret,
    /// `~` (the MID sentinel inside brackets)
    Tilde,
    /// `$` (the LAST sentinel inside brackets)
    Dollar,
    /// The `as` cast keyword
    As,
}

/// Token plus its byte offset in the input
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token
    pub token: Token,
    /// Byte offset where the token starts
    pub pos: usize,
}

fn is_ident_start(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_start(c) || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_continue(c)
}

struct Lexer<'input> {
    input: &'input str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'input> Lexer<'input> {
    fn new(input: &'input str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn error(&self, message: impl Into<String>) -> FieldPathError {
        FieldPathError::Parse {
            position: self.offset(),
            message: message.into(),
        }
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.offset();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let mut is_decimal = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }

        let suffix = match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {
                self.bump();
                Some(c.to_ascii_uppercase())
            }
            _ => None,
        };

        let parse_err = |position: usize| FieldPathError::Parse {
            position,
            message: format!("malformed numeric literal '{text}'"),
        };

        let value = match (suffix, is_decimal) {
            (Some('L'), false) => Value::Long(text.parse().map_err(|_| parse_err(start))?),
            (Some('H'), false) => {
                Value::BigInt(BigInt::from_str(&text).map_err(|_| parse_err(start))?)
            }
            (Some('F'), _) => Value::Float(text.parse().map_err(|_| parse_err(start))?),
            (Some('D'), _) => Value::Double(text.parse().map_err(|_| parse_err(start))?),
            (Some('B'), _) => {
                Value::Decimal(Decimal::from_str(&text).map_err(|_| parse_err(start))?)
            }
            (Some(other), _) => {
                return Err(FieldPathError::Parse {
                    position: start,
                    message: format!("unknown numeric suffix '{other}'"),
                });
            }
            (None, true) => Value::Double(text.parse().map_err(|_| parse_err(start))?),
            (None, false) => match text.parse::<i64>() {
                Ok(n) if i32::try_from(n).is_ok() => Value::Int(n as i32),
                Ok(n) => Value::Long(n),
                Err(_) => Value::BigInt(BigInt::from_str(&text).map_err(|_| parse_err(start))?),
            },
        };
        Ok(Token::Literal(value))
    }

    fn lex_string(&mut self, quote: char) -> Result<Token> {
        let start = self.offset();
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(FieldPathError::Parse {
                        position: start,
                        message: "unterminated string literal".to_string(),
                    });
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some(other) => {
                        return Err(self.error(format!("unknown escape '\\{other}'")));
                    }
                    None => {
                        return Err(self.error("unterminated escape"));
                    }
                },
                Some(c) => out.push(c),
            }
        }
        Ok(Token::Literal(Value::Str(out)))
    }

    fn lex_ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match name.as_str() {
            "true" => Token::Literal(Value::Bool(true)),
            "false" => Token::Literal(Value::Bool(false)),
            "null" => Token::Literal(Value::Null),
            "as" => Token::As,
            _ => Token::Ident(name),
        }
    }
}

/// Tokenize an expression string
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(c) = lexer.peek() {
        let pos = lexer.offset();
        let token = match c {
            c if c.is_whitespace() => {
                lexer.bump();
                continue;
            }
            c if c.is_ascii_digit() => lexer.lex_number()?,
            '\'' | '"' => lexer.lex_string(c)?,
            c if is_ident_start(c) => lexer.lex_ident(),
            '$' => {
                lexer.bump();
                if lexer.peek().is_some_and(is_ident_start) {
                    match lexer.lex_ident() {
                        Token::Ident(name) => Token::Variable(name),
                        // a keyword after '$' is still a variable name
                        Token::As => Token::Variable("as".to_string()),
                        Token::Literal(_) => {
                            return Err(lexer.error("reserved word after '$'"));
                        }
                        _ => unreachable!(),
                    }
                } else {
                    Token::Dollar
                }
            }
            '@' => {
                lexer.bump();
                Token::At
            }
            '.' => {
                lexer.bump();
                Token::Dot
            }
            ',' => {
                lexer.bump();
                Token::Comma
            }
            '(' => {
                lexer.bump();
                Token::LParen
            }
            ')' => {
                lexer.bump();
                Token::RParen
            }
            '[' => {
                lexer.bump();
                Token::LBracket
            }
            ']' => {
                lexer.bump();
                Token::RBracket
            }
            '+' => {
                lexer.bump();
                Token::Plus
            }
            '-' => {
                lexer.bump();
                Token::Minus
            }
            '*' => {
                lexer.bump();
                Token::Star
            }
            '/' => {
                lexer.bump();
                Token::Slash
            }
            '%' => {
                lexer.bump();
                Token::Percent
            }
            '^' => {
                lexer.bump();
                Token::Caret
            }
            '~' => {
                lexer.bump();
                Token::Tilde
            }
            '<' => {
                lexer.bump();
                if lexer.peek() == Some('=') {
                    lexer.bump();
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                lexer.bump();
                if lexer.peek() == Some('=') {
                    lexer.bump();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '=' => {
                lexer.bump();
                if lexer.peek() == Some('=') {
                    lexer.bump();
                    Token::EqEq
                } else {
                    return Err(lexer.error("'=' is not an operator; use '=='"));
                }
            }
            '!' => {
                lexer.bump();
                if lexer.peek() == Some('=') {
                    lexer.bump();
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '&' => {
                lexer.bump();
                if lexer.peek() == Some('&') {
                    lexer.bump();
                    Token::AndAnd
                } else {
                    return Err(lexer.error("'&' is not an operator; use '&&'"));
                }
            }
            '|' => {
                lexer.bump();
                if lexer.peek() == Some('|') {
                    lexer.bump();
                    Token::OrOr
                } else {
                    return Err(lexer.error("'|' is not an operator; use '||'"));
                }
            }
            other => {
                return Err(lexer.error(format!("unexpected character '{other}'")));
            }
        };
        tokens.push(SpannedToken { token, pos });
    }
    Ok(tokens)
}
