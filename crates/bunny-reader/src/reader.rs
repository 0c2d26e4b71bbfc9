use bunny_core::{BunnyError, Symbol, SymbolTable, Value};

use crate::lexer::{tokenize, Span, SpannedToken, Token};

/// Deepest list or quote nesting the reader accepts. Parsing recurses once
/// per level, so this bounds host stack use.
pub const MAX_READ_DEPTH: usize = 512;

/// Reads Bunny data from source text one form at a time.
pub struct Reader {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Reader {
    pub fn new(input: &str) -> Result<Self, BunnyError> {
        Ok(Reader {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    /// Read the next form, or `None` once the input is exhausted.
    pub fn read(&mut self, symbols: &mut SymbolTable) -> Result<Option<Value>, BunnyError> {
        if self.pos >= self.tokens.len() {
            return Ok(None);
        }
        let quote = symbols.intern("quote");
        let mut parser = Parser {
            reader: self,
            symbols,
            quote,
            depth: 0,
        };
        parser.parse_expr().map(Some)
    }

    /// Read every remaining form.
    pub fn read_all(&mut self, symbols: &mut SymbolTable) -> Result<Vec<Value>, BunnyError> {
        let mut forms = Vec::new();
        while let Some(form) = self.read(symbols)? {
            forms.push(form);
        }
        Ok(forms)
    }

    /// Position of the next unread token, for error reporting.
    pub fn span(&self) -> Option<Span> {
        self.tokens.get(self.pos).map(|t| t.span)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

struct Parser<'a> {
    reader: &'a mut Reader,
    symbols: &'a mut SymbolTable,
    quote: Symbol,
    depth: usize,
}

impl Parser<'_> {
    fn parse_expr(&mut self) -> Result<Value, BunnyError> {
        self.depth += 1;
        if self.depth > MAX_READ_DEPTH {
            self.depth -= 1;
            return Err(BunnyError::resource_exhausted(format!(
                "forms nested more than {MAX_READ_DEPTH} deep"
            )));
        }
        let result = self.parse_expr_inner();
        self.depth -= 1;
        result
    }

    fn parse_expr_inner(&mut self) -> Result<Value, BunnyError> {
        let Some(tok) = self.reader.advance() else {
            return Err(BunnyError::eof("form"));
        };
        let span = tok.span;
        match tok.token.clone() {
            Token::LParen => self.parse_list(),
            Token::RParen => Err(BunnyError::syntax(format!("unexpected ')' at {span}"))),
            Token::Quote => {
                if self.reader.peek().is_none() {
                    return Err(BunnyError::eof("quote"));
                }
                let inner = self.parse_expr()?;
                Ok(Value::list(vec![Value::Symbol(self.quote.clone()), inner]))
            }
            Token::String(s) => Ok(Value::string(&s)),
            Token::Atom(atom) => self.parse_atom(&atom, span),
        }
    }

    fn parse_list(&mut self) -> Result<Value, BunnyError> {
        let mut items = Vec::new();
        loop {
            match self.reader.peek() {
                None => return Err(BunnyError::eof("list")),
                Some(Token::RParen) => {
                    self.reader.advance();
                    return Ok(Value::list(items));
                }
                Some(_) => items.push(self.parse_expr()?),
            }
        }
    }

    fn parse_atom(&mut self, atom: &str, span: Span) -> Result<Value, BunnyError> {
        match atom {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            "nil" => Ok(Value::nil()),
            _ if atom.starts_with('#') => Err(BunnyError::syntax(format!(
                "invalid syntax '{atom}' at {span}"
            ))),
            _ => match parse_number(atom) {
                Some(n) => Ok(Value::Number(n)),
                None => Ok(Value::Symbol(self.symbols.intern(atom))),
            },
        }
    }
}

/// Decimal literals only: `inf` and `nan` stay symbols.
fn parse_number(atom: &str) -> Option<f64> {
    let numeric = atom
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !numeric || !atom.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    atom.parse::<f64>().ok()
}

/// Read exactly one form from `input`.
pub fn read(input: &str, symbols: &mut SymbolTable) -> Result<Value, BunnyError> {
    let mut reader = Reader::new(input)?;
    reader
        .read(symbols)?
        .ok_or_else(|| BunnyError::eof("form"))
}

/// Read every form in `input`.
pub fn read_many(input: &str, symbols: &mut SymbolTable) -> Result<Vec<Value>, BunnyError> {
    Reader::new(input)?.read_all(symbols)
}
