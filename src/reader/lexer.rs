use std::fmt;

use phf::phf_map;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, LexError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    QuoteMark,
    Number,
    String,
    Boolean,
    Identifier,

    Quote,
    Set,
    Define,
    If,
    Cond,
    Else,
    Begin,
    Lambda,
    Let,
    And,
    Or,
    Delay,
    ConsStream,

    Eof,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        !matches!(
            self,
            TokenKind::LeftParen
                | TokenKind::RightParen
                | TokenKind::QuoteMark
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::Boolean
                | TokenKind::Identifier
                | TokenKind::Eof
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::LeftParen => "`(`",
            TokenKind::RightParen => "`)`",
            TokenKind::QuoteMark => "`'`",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Boolean => "boolean",
            TokenKind::Identifier => "identifier",
            TokenKind::Quote => "`quote`",
            TokenKind::Set => "`set!`",
            TokenKind::Define => "`define`",
            TokenKind::If => "`if`",
            TokenKind::Cond => "`cond`",
            TokenKind::Else => "`else`",
            TokenKind::Begin => "`begin`",
            TokenKind::Lambda => "`lambda`",
            TokenKind::Let => "`let`",
            TokenKind::And => "`and`",
            TokenKind::Or => "`or`",
            TokenKind::Delay => "`delay`",
            TokenKind::ConsStream => "`cons-stream`",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", name)
    }
}

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "quote" => TokenKind::Quote,
    "set!" => TokenKind::Set,
    "define" => TokenKind::Define,
    "if" => TokenKind::If,
    "cond" => TokenKind::Cond,
    "else" => TokenKind::Else,
    "begin" => TokenKind::Begin,
    "lambda" => TokenKind::Lambda,
    "let" => TokenKind::Let,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "delay" => TokenKind::Delay,
    "cons-stream" => TokenKind::ConsStream,
    "true" => TokenKind::Boolean,
    "false" => TokenKind::Boolean,
};

/// The token kind of a bare word: a keyword, a boolean or an identifier.
pub fn word_kind(text: &str) -> TokenKind { KEYWORDS.get(text).copied().unwrap_or(TokenKind::Identifier) }

/// 1-based source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}:{}", self.line, self.column) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; the unescaped contents for strings.
    pub text: String,
    pub line: usize,
    pub position: usize,
}

impl Token {
    pub fn location(&self) -> Position { Position { line: self.line, column: self.position } }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, Error> {
    let tokens = Lexer::new(src).run()?;
    trace!("tokenized {} chars into {} tokens", src.len(), tokens.len());
    Ok(tokens)
}

struct Lexer {
    chars: Vec<char>,
    offset: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

fn is_delimiter(c: char) -> bool { c.is_whitespace() || matches!(c, '(' | ')' | '"' | '\'' | ';') }

impl Lexer {
    fn new(src: &str) -> Lexer {
        Lexer {
            chars: src.chars().collect(),
            offset: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> { self.chars.get(self.offset).copied() }

    fn peek_next(&self) -> Option<char> { self.chars.get(self.offset + 1).copied() }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize, position: usize) { self.tokens.push(Token { kind, text, line, position }) }

    fn run(mut self) -> Result<Vec<Token>, Error> {
        loop {
            self.skip_blanks();
            let (line, position) = (self.line, self.column);
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    self.push(TokenKind::Eof, String::new(), line, position);
                    return Ok(self.tokens);
                }
            };
            match c {
                '(' | ')' | '\'' => {
                    self.advance();
                    let kind = match c {
                        '(' => TokenKind::LeftParen,
                        ')' => TokenKind::RightParen,
                        _ => TokenKind::QuoteMark,
                    };
                    self.push(kind, c.to_string(), line, position);
                }
                '"' => self.string()?,
                '+' | '-' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                _ if c.is_ascii_digit() => self.number()?,
                _ => self.word(),
            }
        }
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn number(&mut self) -> Result<(), Error> {
        let (line, position) = (self.line, self.column);
        let mut text = String::new();
        let mut seen_dot = false;
        // leading sign or first digit
        if let Some(c) = self.advance() {
            text.push(c);
        }
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            match c {
                '0'..='9' => text.push(c),
                '.' if !seen_dot => {
                    seen_dot = true;
                    text.push(c);
                }
                _ => {
                    return Err(LexError::InvalidNumberCharacter {
                        character: c,
                        line: self.line,
                        position: self.column,
                    }
                    .into())
                }
            }
            self.advance();
        }
        self.push(TokenKind::Number, text, line, position);
        Ok(())
    }

    fn string(&mut self) -> Result<(), Error> {
        let (line, position) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            let (c_line, c_position) = (self.line, self.column);
            match self.advance() {
                None => return Err(LexError::NonTerminatedString { line, position }.into()),
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.advance() {
                        None => return Err(LexError::NonTerminatedString { line, position }.into()),
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => {
                            return Err(LexError::InvalidEscapeSequence {
                                character: other,
                                line: c_line,
                                position: c_position,
                            }
                            .into())
                        }
                    };
                    text.push(escaped);
                }
                Some(c @ ('\n' | '\r')) => {
                    return Err(LexError::InvalidStringCharacter {
                        character: c,
                        line: c_line,
                        position: c_position,
                    }
                    .into())
                }
                Some(c) => text.push(c),
            }
        }
        self.push(TokenKind::String, text, line, position);
        Ok(())
    }

    fn word(&mut self) {
        let (line, position) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        let kind = word_kind(&text);
        self.push(kind, text, line, position);
    }
}
