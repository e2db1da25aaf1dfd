use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::symbol::{sym, SymbolTable};
use crate::value::{SymbolId, Value};

/// Recursive-descent reader: parses source text into Value structures,
/// one top-level form at a time.
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str, heap: &'a mut Heap, symbols: &'a mut SymbolTable) -> Self {
        Reader {
            input: input.as_bytes(),
            pos: 0,
            heap,
            symbols,
        }
    }

    /// Read one complete form, advancing past it. Returns None at a clean
    /// EOF; a closing bracket here (rather than inside a list) is a syntax
    /// error.
    pub fn read(&mut self) -> Result<Option<Value>> {
        self.skip_whitespace_and_comments();
        if self.pos >= self.input.len() {
            return Ok(None);
        }
        match self.read_form()? {
            Value::CloseParen => Err(Error::MalformedSyntax("unexpected ')'".into())),
            val => Ok(Some(val)),
        }
    }

    /// Current position in the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read all forms from the input.
    pub fn read_all(&mut self) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        while let Some(val) = self.read()? {
            results.push(val);
        }
        Ok(results)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(ch) = self.peek() {
                if ch.is_ascii_whitespace() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.peek() == Some(b';') {
                while let Some(ch) = self.peek() {
                    self.pos += 1;
                    if ch == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Read one form. A closing bracket yields the internal CloseParen
    /// marker, consumed by read_list and rejected everywhere else.
    fn read_form(&mut self) -> Result<Value> {
        self.skip_whitespace_and_comments();

        let ch = self.peek().ok_or(Error::UnexpectedEof)?;
        match ch {
            b'(' => self.read_list(),
            b')' => {
                self.advance();
                Ok(Value::CloseParen)
            }
            b'\'' => {
                self.advance();
                self.read_prefixed(sym::QUOTE, "'")
            }
            b'`' => {
                self.advance();
                self.read_prefixed(sym::QUASIQUOTE, "`")
            }
            b',' => {
                self.advance();
                // ,@ must be checked before the shorter , prefix.
                if self.peek() == Some(b'@') {
                    self.advance();
                    self.read_prefixed(sym::UNQUOTE_SPLICING, ",@")
                } else {
                    self.read_prefixed(sym::UNQUOTE, ",")
                }
            }
            _ => self.read_word(),
        }
    }

    /// Read a list: (a b c), (a . b), or (a b . c). Each new element is
    /// appended by threading the previous cell, so building is O(1) per
    /// element with no reversal.
    fn read_list(&mut self) -> Result<Value> {
        self.advance(); // consume '('

        let mut head = Value::Nil;
        let mut last = None;

        loop {
            let form = self.read_form()?;

            if form == Value::CloseParen {
                return Ok(head);
            }

            if form == Value::Symbol(sym::DOT) {
                let Some(last_id) = last else {
                    return Err(Error::MalformedSyntax("dot at start of list".into()));
                };
                let tail = self.read_form()?;
                if tail == Value::CloseParen || tail == Value::Symbol(sym::DOT) {
                    return Err(Error::MalformedSyntax("expected one form after dot".into()));
                }
                if self.read_form()? != Value::CloseParen {
                    return Err(Error::MalformedSyntax("expected ')' after dotted tail".into()));
                }
                self.heap.set_cdr(last_id, tail);
                return Ok(head);
            }

            let cell = self.heap.alloc(form, Value::Nil);
            match last {
                None => head = Value::Pair(cell),
                Some(prev) => self.heap.set_cdr(prev, Value::Pair(cell)),
            }
            last = Some(cell);
        }
    }

    /// Desugar a quote-family prefix: 'x, `x, ,x, ,@x become the
    /// two-element list (marker x).
    fn read_prefixed(&mut self, marker: SymbolId, what: &str) -> Result<Value> {
        let expr = self.read_form()?;
        if expr == Value::CloseParen {
            return Err(Error::MalformedSyntax(format!("expected form after {what}")));
        }
        let inner = self.heap.cons(expr, Value::Nil);
        Ok(self.heap.cons(Value::Symbol(marker), inner))
    }

    /// Read a maximal word: an integer if it is a signed digit run, the
    /// Nil sentinel for the word `nil`, otherwise an interned symbol. This
    /// production is tried last because it accepts nearly anything.
    fn read_word(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if is_delimiter(ch) {
                break;
            }
            self.pos += 1;
        }

        let word = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| Error::MalformedSyntax("invalid UTF-8 in word".into()))?;

        if word == "nil" {
            return Ok(Value::Nil);
        }

        if let Some(n) = parse_integer(word) {
            return Ok(Value::Integer(n));
        }

        Ok(Value::Symbol(self.symbols.intern(word)))
    }
}

fn is_delimiter(ch: u8) -> bool {
    ch.is_ascii_whitespace()
        || ch == b'('
        || ch == b')'
        || ch == b'\''
        || ch == b'`'
        || ch == b','
        || ch == b';'
}

/// A word is an integer iff it is an optionally-signed non-empty run of
/// decimal digits. A bare sign is a symbol.
fn parse_integer(word: &str) -> Option<BigInt> {
    let digits = word.strip_prefix(['+', '-']).unwrap_or(word);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigInt::parse_bytes(word.as_bytes(), 10)
}

/// Read a single form from a string.
pub fn read_str(input: &str, heap: &mut Heap, symbols: &mut SymbolTable) -> Result<Value> {
    let mut reader = Reader::new(input, heap, symbols);
    reader.read()?.ok_or(Error::UnexpectedEof)
}

/// Read all forms from a string.
pub fn read_all(input: &str, heap: &mut Heap, symbols: &mut SymbolTable) -> Result<Vec<Value>> {
    let mut reader = Reader::new(input, heap, symbols);
    reader.read_all()
}

/// Read one form starting at byte offset `pos`. Returns the value and the
/// new offset, or None if only whitespace and comments remain.
pub fn read_one_at(
    input: &str,
    pos: usize,
    heap: &mut Heap,
    symbols: &mut SymbolTable,
) -> Result<Option<(Value, usize)>> {
    let mut reader = Reader::new(&input[pos..], heap, symbols);
    match reader.read()? {
        Some(val) => Ok(Some((val, pos + reader.position()))),
        None => Ok(None),
    }
}
