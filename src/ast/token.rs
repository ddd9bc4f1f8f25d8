//! Tokenizer for the visualization query language.
//!
//! Produces positioned tokens one at a time. Positions are 1-based character
//! offsets into the query text. Once the input is exhausted every further call
//! yields an `Eol` token at the same position.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals and names
    String,
    Number,
    Identifier,
    Eol,
    Error,

    // Keywords
    And,
    Asc,
    By,
    Date,
    DateTime,
    Desc,
    False,
    Format,
    Group,
    Label,
    Limit,
    Not,
    Offset,
    Options,
    Or,
    Order,
    Pivot,
    Select,
    TimeOfDay,
    Timestamp,
    True,
    Where,

    // Operators and punctuation
    Eq,
    Ne,
    Lt,
    Gt,
    Ge,
    Le,
    Plus,
    Minus,
    Times,
    Div,
    LParen,
    RParen,
    Comma,
}

impl TokenKind {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq | TokenKind::Ne | TokenKind::Lt | TokenKind::Gt | TokenKind::Ge | TokenKind::Le
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::String => "a string literal",
            TokenKind::Number => "a number",
            TokenKind::Identifier => "an identifier",
            TokenKind::Eol => "the end of statement",
            TokenKind::Error => "a valid token",
            TokenKind::And => "'and'",
            TokenKind::Asc => "'asc'",
            TokenKind::By => "'by'",
            TokenKind::Date => "'date'",
            TokenKind::DateTime => "'datetime'",
            TokenKind::Desc => "'desc'",
            TokenKind::False => "'false'",
            TokenKind::Format => "'format'",
            TokenKind::Group => "'group'",
            TokenKind::Label => "'label'",
            TokenKind::Limit => "'limit'",
            TokenKind::Not => "'not'",
            TokenKind::Offset => "'offset'",
            TokenKind::Options => "'options'",
            TokenKind::Or => "'or'",
            TokenKind::Order => "'order'",
            TokenKind::Pivot => "'pivot'",
            TokenKind::Select => "'select'",
            TokenKind::TimeOfDay => "'timeofday'",
            TokenKind::Timestamp => "'timestamp'",
            TokenKind::True => "'true'",
            TokenKind::Where => "'where'",
            TokenKind::Eq => "'='",
            TokenKind::Ne => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::Le => "'<='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Times => "'*'",
            TokenKind::Div => "'/'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub pos: usize,
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(pos: usize, kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            pos,
            kind,
            text: text.into(),
        }
    }

    /// True for an identifier whose text matches `word` ignoring ASCII case.
    /// Used for the multi-word operators that are not reserved keywords.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}

/// Look up a lower-cased word or operator in the keyword table.
pub fn keyword(s: &str) -> Option<TokenKind> {
    let kind = match s {
        "and" => TokenKind::And,
        "asc" => TokenKind::Asc,
        "by" => TokenKind::By,
        "date" => TokenKind::Date,
        "datetime" => TokenKind::DateTime,
        "desc" => TokenKind::Desc,
        "false" => TokenKind::False,
        "format" => TokenKind::Format,
        "group" => TokenKind::Group,
        "label" => TokenKind::Label,
        "limit" => TokenKind::Limit,
        "not" => TokenKind::Not,
        "offset" => TokenKind::Offset,
        "options" => TokenKind::Options,
        "or" => TokenKind::Or,
        "order" => TokenKind::Order,
        "pivot" => TokenKind::Pivot,
        "select" => TokenKind::Select,
        "timeofday" => TokenKind::TimeOfDay,
        "timestamp" => TokenKind::Timestamp,
        "true" => TokenKind::True,
        "where" => TokenKind::Where,
        "=" => TokenKind::Eq,
        "!=" | "<>" => TokenKind::Ne,
        "<" => TokenKind::Lt,
        "<=" => TokenKind::Le,
        ">" => TokenKind::Gt,
        ">=" => TokenKind::Ge,
        "-" => TokenKind::Minus,
        "+" => TokenKind::Plus,
        "*" => TokenKind::Times,
        "/" => TokenKind::Div,
        "(" => TokenKind::LParen,
        ")" => TokenKind::RParen,
        "," => TokenKind::Comma,
        _ => return None,
    };
    Some(kind)
}

pub fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    current: Token,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            current: Token::new(0, TokenKind::Eol, ""),
        }
    }

    /// The most recently produced token.
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Advance to the next token and return it.
    pub fn next_token(&mut self) -> Token {
        self.current = self.scan();
        self.current.clone()
    }

    fn scan(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos + 1;

        let Some(&c) = self.chars.get(self.pos) else {
            return Token::new(start, TokenKind::Eol, "");
        };

        match c {
            '\'' | '"' => self.read_quoted(c, TokenKind::String),
            '`' => self.read_quoted(c, TokenKind::Identifier),
            c if c.is_ascii_digit() || c == '.' => self.read_number(),
            c if is_id_char(c) => self.read_word(),
            _ => self.read_operator(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.get(self.pos) {
            if matches!(c, ' ' | '\t' | '\n' | '\r') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn read_quoted(&mut self, quote: char, kind: TokenKind) -> Token {
        let start = self.pos;
        let body = start + 1;
        match self.chars[body..].iter().position(|&c| c == quote) {
            Some(len) => {
                self.pos = body + len + 1;
                let text: String = self.chars[body..body + len].iter().collect();
                Token::new(start + 1, kind, text)
            }
            None => {
                self.pos = self.chars.len();
                let text: String = self.chars[start..].iter().collect();
                Token::new(start + 1, TokenKind::Error, text)
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::new(start + 1, TokenKind::Number, text)
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while self.chars.get(self.pos).copied().is_some_and(is_id_char) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let lower = text.to_ascii_lowercase();
        match keyword(&lower) {
            Some(kind) => Token::new(start + 1, kind, lower),
            None => Token::new(start + 1, TokenKind::Identifier, text),
        }
    }

    fn read_operator(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;

        if let Some(&second) = self.chars.get(self.pos) {
            let pair: String = [self.chars[start], second].iter().collect();
            if let Some(kind) = keyword(&pair) {
                self.pos += 1;
                return Token::new(start + 1, kind, pair);
            }
        }

        let single = self.chars[start].to_string();
        match keyword(&single) {
            Some(kind) => Token::new(start + 1, kind, single),
            None => Token::new(start + 1, TokenKind::Error, single),
        }
    }
}

/// Tokenize a whole query, ending with a single `Eol` token.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new(input);
    let mut tokens = Vec::new();
    loop {
        let tok = tokenizer.next_token();
        let done = tok.kind == TokenKind::Eol;
        tokens.push(tok);
        if done {
            return tokens;
        }
    }
}
