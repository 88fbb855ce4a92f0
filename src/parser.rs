//! PDF object parser.
//!
//! Recursive-descent parsing of PDF values by combining tokens from the
//! lexer: read a token, dispatch on its type, recurse for composites.
//! A [`Reader`] carries the byte offset so every structural error reports
//! where in the file it was detected.
//!
//! Indirect objects (`N G obj ... endobj`) and stream payloads are read by
//! [`read_indirect_at`]; stream `/Length` entries that are themselves
//! indirect references resolve through the [`Resolve`] seam, which the
//! factory implements on top of the reference table.

use crate::error::{Error, Result};
use crate::lexer::{self, Token};
use crate::object::{Dict, ObjectRef, StringFormat, Value};

/// Resolution seam for indirect references encountered mid-parse
/// (stream `/Length` values).
pub trait Resolve {
    /// Resolve a reference to its value.
    fn resolve_ref(&self, r: ObjectRef) -> Result<Value>;
}

/// Resolver that refuses every reference. Used when parsing detached
/// fragments (trailers, xref stream dictionaries).
pub struct NoResolve;

impl Resolve for NoResolve {
    fn resolve_ref(&self, r: ObjectRef) -> Result<Value> {
        Err(Error::Malformed(format!("reference {} cannot be resolved in this context", r)))
    }
}

/// Token reader over a byte buffer, tracking the current offset.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of the buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Create a reader positioned at `offset`.
    pub fn at(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, pos: offset.min(buf.len()) }
    }

    /// Current byte offset into the buffer.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Read the next token, advancing past it.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let rest = self.rest();
        let (remaining, tok) = lexer::token(rest)
            .map_err(|_| Error::corrupted(self.pos, "expected a token"))?;
        self.pos = self.buf.len() - remaining.len();
        Ok(tok)
    }

    /// Read the next token without advancing.
    pub fn peek_token(&self) -> Result<Token<'a>> {
        let (_, tok) = lexer::token(self.rest())
            .map_err(|_| Error::corrupted(self.pos, "expected a token"))?;
        Ok(tok)
    }

    /// Expect a specific token next, or fail with a positioned error.
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let at = self.pos;
        let tok = self.next_token()?;
        if tok != expected {
            return Err(Error::corrupted(at, format!("expected {:?}, found {:?}", expected, tok)));
        }
        Ok(())
    }

    /// Expect a non-negative integer next, returning it.
    pub fn expect_uint(&mut self) -> Result<u64> {
        let at = self.pos;
        match self.next_token()? {
            Token::Integer(i) if i >= 0 => Ok(i as u64),
            tok => Err(Error::corrupted(at, format!("expected unsigned integer, found {:?}", tok))),
        }
    }

    /// Parse a complete PDF value at the current position.
    pub fn parse_value(&mut self) -> Result<Value> {
        let at = self.pos;
        let tok = self.next_token()?;

        match tok {
            Token::Null => Ok(Value::Null),
            Token::True => Ok(Value::Boolean(true)),
            Token::False => Ok(Value::Boolean(false)),
            Token::Real(r) => Ok(Value::Real(r)),
            Token::Name(name) => Ok(Value::Name(name)),

            Token::Integer(i) => {
                // Three-token lookahead: <uint> <uint> R is a reference.
                // Roll back on any mismatch.
                if i >= 0 && i <= u32::MAX as i64 {
                    let saved = self.pos;
                    if let Ok(Token::Integer(gen)) = self.next_token() {
                        if (0..=u16::MAX as i64).contains(&gen)
                            && matches!(self.next_token(), Ok(Token::R))
                        {
                            return Ok(Value::Reference(ObjectRef::new(i as u32, gen as u16)));
                        }
                    }
                    self.pos = saved;
                }
                Ok(Value::Integer(i))
            },

            Token::LiteralString(bytes) => {
                Ok(Value::String(decode_literal_string_escapes(bytes), StringFormat::Literal))
            },

            Token::HexString(bytes) => {
                Ok(Value::String(decode_hex_string(bytes), StringFormat::Hexadecimal))
            },

            Token::ArrayStart => self.parse_array_body(),
            Token::DictStart => Ok(Value::Dictionary(self.parse_dict_body()?)),

            other => {
                Err(Error::corrupted(at, format!("unexpected token {:?} where a value was expected", other)))
            },
        }
    }

    /// Parse array elements up to and including the closing `]`.
    fn parse_array_body(&mut self) -> Result<Value> {
        let mut values = Vec::new();

        loop {
            match self.peek_token()? {
                Token::ArrayEnd => {
                    self.next_token()?;
                    return Ok(Value::Array(values));
                },
                _ => values.push(self.parse_value()?),
            }
        }
    }

    /// Parse dictionary entries up to and including the closing `>>`.
    ///
    /// Keys must be names; duplicate keys keep the first key's position
    /// with the last value.
    fn parse_dict_body(&mut self) -> Result<Dict> {
        let mut dict = Dict::new();

        loop {
            let at = self.pos;
            match self.next_token()? {
                Token::DictEnd => return Ok(dict),
                Token::Name(key) => {
                    let value = self.parse_value()?;
                    dict.insert(key, value);
                },
                tok => {
                    return Err(Error::corrupted(
                        at,
                        format!("dictionary key must be a name, found {:?}", tok),
                    ));
                },
            }
        }
    }
}

/// Parse a standalone PDF value from the start of a buffer.
pub fn parse_value(buf: &[u8]) -> Result<Value> {
    Reader::new(buf).parse_value()
}

/// Read an indirect object (`N G obj <value> endobj`, possibly with a stream
/// payload) at a byte offset.
///
/// Stream `/Length` entries may be indirect references; they resolve through
/// `resolver` (re-entering the table lookup). After the `stream` keyword the
/// file must carry `\r\n` or `\n` — a bare `\r` is a structural error, as is
/// a missing newline.
pub fn read_indirect_at(
    buf: &[u8],
    offset: usize,
    resolver: &dyn Resolve,
) -> Result<(ObjectRef, Value)> {
    if offset >= buf.len() {
        return Err(Error::corrupted(offset, "object offset beyond end of file"));
    }

    let mut reader = Reader::at(buf, offset);
    let num = reader.expect_uint()? as u32;
    let gen = reader.expect_uint()? as u16;
    reader.expect(Token::ObjStart)?;

    let value = reader.parse_value()?;

    let at = reader.pos();
    match reader.next_token()? {
        Token::ObjEnd => Ok((ObjectRef::new(num, gen), value)),

        Token::StreamStart => {
            let dict = match value {
                Value::Dictionary(d) => d,
                other => {
                    return Err(Error::corrupted(
                        at,
                        format!("stream keyword after {}, expected a dictionary", other.type_name()),
                    ));
                },
            };

            let data = read_stream_payload(buf, &mut reader, &dict, resolver)?;
            reader.expect(Token::StreamEnd)?;
            reader.expect(Token::ObjEnd)?;

            Ok((ObjectRef::new(num, gen), Value::Stream { dict, data }))
        },

        tok => Err(Error::corrupted(at, format!("expected endobj or stream, found {:?}", tok))),
    }
}

/// Read the raw payload bytes after a `stream` keyword.
fn read_stream_payload(
    buf: &[u8],
    reader: &mut Reader<'_>,
    dict: &Dict,
    resolver: &dyn Resolve,
) -> Result<bytes::Bytes> {
    let eol_at = reader.pos();
    let rest = &buf[eol_at..];

    // ISO 32000-1:2008, 7.3.8.1: CRLF or LF after "stream", never CR alone.
    let data_start = if rest.starts_with(b"\r\n") {
        eol_at + 2
    } else if rest.starts_with(b"\n") {
        eol_at + 1
    } else if rest.starts_with(b"\r") {
        return Err(Error::corrupted(eol_at, "stream keyword followed by bare CR"));
    } else {
        return Err(Error::corrupted(eol_at, "stream keyword not followed by a newline"));
    };

    let length = stream_length(dict, resolver)
        .map_err(|e| match e {
            Error::Malformed(reason) => Error::corrupted(eol_at, reason),
            other => other,
        })?;

    if data_start + length > buf.len() {
        return Err(Error::corrupted(data_start, "stream payload extends beyond end of file"));
    }

    reader.pos = data_start + length;
    Ok(bytes::Bytes::copy_from_slice(&buf[data_start..data_start + length]))
}

/// Resolve a stream dictionary's `/Length` to a byte count.
fn stream_length(dict: &Dict, resolver: &dyn Resolve) -> Result<usize> {
    let raw = dict
        .get("Length")
        .ok_or_else(|| Error::Malformed("stream dictionary missing /Length".to_string()))?;

    let resolved;
    let length = match raw {
        Value::Reference(r) => {
            resolved = resolver.resolve_ref(*r)?;
            &resolved
        },
        other => other,
    };

    match length.as_integer() {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => Err(Error::Malformed(format!(
            "stream /Length must be a non-negative integer, found {}",
            length.type_name()
        ))),
    }
}

/// Decode escape sequences in PDF literal strings
/// (ISO 32000-1:2008, Section 7.3.4.2).
///
/// Handles `\n \r \t \b \f \( \) \\`, 1-3 digit octal escapes, and
/// line continuations (`\` before a line end drops both). Unknown escapes
/// keep the backslash literal.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            match raw[i + 1] {
                b'n' => {
                    result.push(b'\n');
                    i += 2;
                },
                b'r' => {
                    result.push(b'\r');
                    i += 2;
                },
                b't' => {
                    result.push(b'\t');
                    i += 2;
                },
                b'b' => {
                    result.push(8);
                    i += 2;
                },
                b'f' => {
                    result.push(12);
                    i += 2;
                },
                b'(' => {
                    result.push(b'(');
                    i += 2;
                },
                b')' => {
                    result.push(b')');
                    i += 2;
                },
                b'\\' => {
                    result.push(b'\\');
                    i += 2;
                },
                // Line continuation
                b'\n' => {
                    i += 2;
                },
                b'\r' => {
                    i += 2;
                    if i < raw.len() && raw[i] == b'\n' {
                        i += 1;
                    }
                },
                c if (b'0'..b'8').contains(&c) => {
                    let start = i + 1;
                    let mut octal_value = 0u32;
                    let mut octal_len = 0;

                    for j in 0..3 {
                        match raw.get(start + j) {
                            Some(&d) if (b'0'..b'8').contains(&d) => {
                                octal_value = octal_value * 8 + (d - b'0') as u32;
                                octal_len += 1;
                            },
                            _ => break,
                        }
                    }

                    result.push((octal_value & 0xFF) as u8);
                    i += 1 + octal_len;
                },
                _ => {
                    result.push(b'\\');
                    i += 1;
                },
            }
        } else {
            result.push(raw[i]);
            i += 1;
        }
    }

    result
}

/// Decode the content of a hexadecimal string token.
///
/// Non-hex bytes are skipped; an odd number of digits implies a trailing
/// zero nibble.
pub fn decode_hex_string(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len() / 2);
    let mut high: Option<u8> = None;

    for &b in raw {
        let nibble = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => continue,
        };
        match high.take() {
            None => high = Some(nibble),
            Some(h) => result.push((h << 4) | nibble),
        }
    }

    if let Some(h) = high {
        result.push(h << 4);
    }

    result
}
