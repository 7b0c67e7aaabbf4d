//! Tokenizer for the dialect.
//!
//! Identifier tokens are deliberately generous: a word that starts with a
//! letter keeps consuming dots, hyphens and whole glob groups (`{…}`, `[…]`)
//! so a Graphite target such as `a.{b,c}.host-1.*` arrives at the parser as
//! a single token. Two lookaheads resolve the collisions this causes with
//! the base grammar:
//!
//! - a `[…]` whose content reads as a duration (`[5m]`, `[300]`, `[5m:1m]`)
//!   is a rollup window and ends the identifier; anything else (`[0-9]`) is
//!   a character class and stays inside it;
//! - a `{…}` containing only glob runes (`{b,c}`) stays inside the
//!   identifier, while one containing matcher syntax (`{job="x"}`) is a
//!   selector body and ends it.
//!
//! Words that start with a digit stay narrow (digits, dots, letters) so
//! `3-2` still lexes as arithmetic while `5m`, `0.95` and `5xx.count` each
//! stay whole.

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Number(f64),
    Duration(String),
    StringLit(String),
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Op(&'static str),
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(s) => s.clone(),
            Token::Number(n) => n.to_string(),
            Token::Duration(s) => s.clone(),
            Token::StringLit(s) => format!("\"{s}\""),
            Token::LeftParen => "(".to_string(),
            Token::RightParen => ")".to_string(),
            Token::LeftBrace => "{".to_string(),
            Token::RightBrace => "}".to_string(),
            Token::LeftBracket => "[".to_string(),
            Token::RightBracket => "]".to_string(),
            Token::Comma => ",".to_string(),
            Token::Colon => ":".to_string(),
            Token::Op(op) => op.to_string(),
        }
    }
}

pub(crate) type SpannedToken = (usize, Token);

pub(crate) fn tokenize(input: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((i, Token::LeftParen));
                i += 1;
            }
            ')' => {
                tokens.push((i, Token::RightParen));
                i += 1;
            }
            '{' => {
                tokens.push((i, Token::LeftBrace));
                i += 1;
            }
            '}' => {
                tokens.push((i, Token::RightBrace));
                i += 1;
            }
            '[' => {
                tokens.push((i, Token::LeftBracket));
                i += 1;
            }
            ']' => {
                tokens.push((i, Token::RightBracket));
                i += 1;
            }
            ',' => {
                tokens.push((i, Token::Comma));
                i += 1;
            }
            ':' => {
                tokens.push((i, Token::Colon));
                i += 1;
            }
            '"' | '\'' => {
                let (lit, next) = scan_string(&chars, i)?;
                tokens.push((i, Token::StringLit(lit)));
                i = next;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'~') {
                    tokens.push((i, Token::Op("=~")));
                    i += 2;
                } else if chars.get(i + 1) == Some(&'=') {
                    tokens.push((i, Token::Op("==")));
                    i += 2;
                } else {
                    tokens.push((i, Token::Op("=")));
                    i += 1;
                }
            }
            '!' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push((i, Token::Op("!=")));
                    i += 2;
                }
                Some('~') => {
                    tokens.push((i, Token::Op("!~")));
                    i += 2;
                }
                _ => return Err(ParseError::UnexpectedChar { ch: '!', pos: i }),
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((i, Token::Op(">=")));
                    i += 2;
                } else {
                    tokens.push((i, Token::Op(">")));
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((i, Token::Op("<=")));
                    i += 2;
                } else {
                    tokens.push((i, Token::Op("<")));
                    i += 1;
                }
            }
            '+' => {
                tokens.push((i, Token::Op("+")));
                i += 1;
            }
            '-' => {
                tokens.push((i, Token::Op("-")));
                i += 1;
            }
            '*' => {
                tokens.push((i, Token::Op("*")));
                i += 1;
            }
            '/' => {
                tokens.push((i, Token::Op("/")));
                i += 1;
            }
            '%' => {
                tokens.push((i, Token::Op("%")));
                i += 1;
            }
            '^' => {
                tokens.push((i, Token::Op("^")));
                i += 1;
            }
            '0'..='9' => {
                let (token, next) = scan_numeric(&chars, i);
                tokens.push((i, token));
                i = next;
            }
            c if is_ident_start(c) => {
                let (word, next) = scan_ident(&chars, i);
                tokens.push((i, Token::Ident(word)));
                i = next;
            }
            other => return Err(ParseError::UnexpectedChar { ch: other, pos: i }),
        }
    }
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '$')
}

fn is_ident_continuation(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '-' | '$' | '\'' | '|' | '#')
}

// Letter-led words swallow whole glob groups; a comma is part of the word
// only inside such a group.
fn scan_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut word = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => match glob_group_end(chars, i) {
                Some(end) => {
                    word.extend(&chars[i..=end]);
                    i = end + 1;
                }
                None => break,
            },
            '[' => {
                if bracket_is_window(chars, i) {
                    break;
                }
                match glob_group_end(chars, i) {
                    Some(end) => {
                        word.extend(&chars[i..=end]);
                        i = end + 1;
                    }
                    None => break,
                }
            }
            '\\' => {
                word.push(c);
                i += 1;
                if i < chars.len() {
                    word.push(chars[i]);
                    i += 1;
                }
            }
            '*' | '?' => {
                word.push(c);
                i += 1;
            }
            c if is_ident_continuation(c) => {
                word.push(c);
                i += 1;
            }
            _ => break,
        }
    }
    (word, i)
}

// Find the close of the glob group opening at `start`, tolerating nesting
// like `{b[0-2],c}`. None when the group is unbalanced or contains runes a
// glob cannot (matcher syntax, whitespace), meaning the opener belongs to
// the base grammar instead.
fn glob_group_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth: Vec<char> = Vec::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' | '[' => depth.push(c),
            '}' => {
                if depth.pop() != Some('{') {
                    return None;
                }
            }
            ']' => {
                if depth.pop() != Some('[') {
                    return None;
                }
            }
            '\\' => i += 1,
            ',' | '*' | '?' => {}
            c if is_ident_continuation(c) => {}
            _ => return None,
        }
        if depth.is_empty() {
            return Some(i);
        }
        i += 1;
    }
    None
}

// `[5m]`, `[300]` and `[5m:1m]` are rollup windows, not character classes.
fn bracket_is_window(chars: &[char], start: usize) -> bool {
    let close = match chars[start + 1..].iter().position(|&c| c == ']') {
        Some(offset) => start + 1 + offset,
        None => return false,
    };
    let inner: String = chars[start + 1..close].iter().collect();
    if inner.is_empty() {
        return false;
    }
    inner.split(':').all(|part| {
        !part.is_empty() && (is_duration(part) || part.parse::<f64>().is_ok())
    })
}

// A digit-led word is a number (`5`, `0.95`, `1e3`), a duration (`5m`,
// `1h30m`, `300ms`) or, failing both, a plain identifier (`5xx.count`).
fn scan_numeric(chars: &[char], start: usize) -> (Token, usize) {
    let mut word = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_') {
            word.push(c);
            i += 1;
        } else {
            break;
        }
    }
    if let Ok(n) = word.parse::<f64>() {
        return (Token::Number(n), i);
    }
    if is_duration(&word) {
        return (Token::Duration(word), i);
    }
    (Token::Ident(word), i)
}

fn is_duration(word: &str) -> bool {
    let mut rest = word;
    let mut matched = false;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit() || *c == '.').count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        let unit = if rest.starts_with("ms") {
            2
        } else if rest.starts_with(['s', 'm', 'h', 'd', 'w', 'y', 'i']) {
            1
        } else {
            return false;
        };
        rest = &rest[unit..];
        matched = true;
    }
    matched
}

fn scan_string(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((out, i + 1));
        }
        if c == '\\' {
            match chars.get(i + 1) {
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some('\'') => out.push('\''),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                // Unknown escapes (regex classes like \d) pass through intact.
                Some(other) => {
                    out.push('\\');
                    out.push(*other);
                }
                None => break,
            }
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    Err(ParseError::UnterminatedString { pos: start })
}
