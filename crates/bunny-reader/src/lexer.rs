use std::fmt;

use bunny_core::BunnyError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Quote,
    String(String),
    Atom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

fn is_delimiter(ch: char) -> bool {
    is_whitespace(ch) || matches!(ch, '(' | ')' | '"' | ';' | '\'')
}

pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, BunnyError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut line = 1;
    let mut col = 1;

    while i < chars.len() {
        let ch = chars[i];
        let span = Span { line, col };

        match ch {
            '\n' => {
                line += 1;
                col = 1;
                i += 1;
            }
            c if is_whitespace(c) => {
                col += 1;
                i += 1;
            }

            // Comments run to end of line; the newline itself is left for the
            // arm above so line tracking stays right.
            ';' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                    col += 1;
                }
            }

            '(' | ')' | '\'' => {
                let token = match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => Token::Quote,
                };
                tokens.push(SpannedToken { token, span });
                col += 1;
                i += 1;
            }

            // No escape sequences: a string is everything up to the next quote.
            '"' => {
                i += 1;
                col += 1;
                let mut s = String::new();
                loop {
                    let Some(&c) = chars.get(i) else {
                        return Err(BunnyError::eof("string"));
                    };
                    i += 1;
                    if c == '"' {
                        col += 1;
                        break;
                    }
                    if c == '\n' {
                        line += 1;
                        col = 1;
                    } else {
                        col += 1;
                    }
                    s.push(c);
                }
                tokens.push(SpannedToken {
                    token: Token::String(s),
                    span,
                });
            }

            _ => {
                let start = i;
                while i < chars.len() && !is_delimiter(chars[i]) {
                    i += 1;
                }
                col += i - start;
                let atom: String = chars[start..i].iter().collect();
                tokens.push(SpannedToken {
                    token: Token::Atom(atom),
                    span,
                });
            }
        }
    }

    Ok(tokens)
}
