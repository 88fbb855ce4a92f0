//! PDF tokenizer.
//!
//! Low-level tokenization of PDF byte streams: numbers, strings, names,
//! keywords and delimiters. Whitespace (space, \t, \r, \n, \0, \f) and
//! comments (% to EOL) are skipped as a unit before every token.
//!
//! The lexer is deliberately thin: literal strings come back as raw bytes
//! (escape decoding happens in the parser), hex strings come back with their
//! whitespace intact, and names are `#XX`-decoded here because the escape is
//! part of name identity, not of name content.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g. 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g. 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes (content of "(Hello)").
    /// Escape sequences are NOT decoded at lexer level.
    LiteralString(&'a [u8]),

    /// Hexadecimal string bytes (content of "<48656C6C6F>").
    /// Whitespace is preserved; decoding happens at parser level.
    HexString(&'a [u8]),

    /// Name ("Type" from "/Type"), with `#XX` escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter `[`
    ArrayStart,

    /// Array end delimiter `]`
    ArrayEnd,

    /// Dictionary start delimiter `<<`
    DictStart,

    /// Dictionary end delimiter `>>`
    DictEnd,

    /// Indirect object start keyword "obj"
    ObjStart,

    /// Indirect object end keyword "endobj"
    ObjEnd,

    /// Stream start keyword "stream"
    StreamStart,

    /// Stream end keyword "endstream"
    StreamEnd,

    /// Reference keyword "R" (used in "10 0 R")
    R,
}

/// Check whether a byte is PDF whitespace (PDF Ref 1.7, Table 3.1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Check whether a byte is a PDF delimiter character.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Parse whitespace characters. Requires at least one.
fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    let (remaining, ws) = take_while(is_whitespace)(input)?;

    if ws.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Space)));
    }

    Ok((remaining, ()))
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments before a token.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut remaining = input;

    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }

        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }

        break;
    }

    Ok((remaining, input))
}

/// Parse an integer or real number.
///
/// PDF numbers allow a leading sign and a leading or trailing decimal point:
/// 42, -123, +17, 3.14, .5, 5., -.002.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(char('.'), opt(digit1)))(rest)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    if let Some(frac) = frac_part {
        let mut num_str = String::new();
        if sign == Some('-') {
            num_str.push('-');
        }
        match int_part {
            Some(int) => num_str.push_str(std::str::from_utf8(int).unwrap_or("0")),
            None => num_str.push('0'),
        }
        num_str.push('.');
        match frac {
            Some(frac) => num_str.push_str(std::str::from_utf8(frac).unwrap_or("0")),
            None => num_str.push('0'),
        }

        let num: f64 = num_str.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Token::Real(num)))
    } else {
        let int_bytes = int_part.ok_or_else(|| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        let int_str = std::str::from_utf8(int_bytes).map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        let mut num: i64 = int_str.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        if sign == Some('-') {
            num = -num;
        }
        Ok((rest, Token::Integer(num)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Handles balanced nested parentheses, backslash escapes (including 1-3
/// digit octal), and line continuations. Content is returned raw; escape
/// decoding happens in the parser.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (mut remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                pos += 1;
                if pos < remaining.len() {
                    if remaining[pos].is_ascii_digit() {
                        // Octal escape, 1-3 digits
                        pos += 1;
                        if pos < remaining.len() && remaining[pos].is_ascii_digit() {
                            pos += 1;
                        }
                        if pos < remaining.len() && remaining[pos].is_ascii_digit() {
                            pos += 1;
                        }
                    } else {
                        pos += 1;
                    }
                }
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => {
                pos += 1;
            },
        }
    }

    if depth != 0 {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    let content = &remaining[..pos - 1];
    remaining = &remaining[pos..];

    Ok((remaining, Token::LiteralString(content)))
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// Non-hex bytes between the brackets are tolerated here and skipped during
/// decoding; an odd digit count implies a trailing `0`.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // Must not be a dictionary start (<<)
    if input.len() >= 2 && input[0] == b'<' && input[1] == b'<' {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(char('<'), map(take_till(|c| c == b'>'), Token::HexString), char('>'))(input)
}

/// Decode `#XX` escape sequences in a raw name token, yielding the name's
/// actual bytes.
///
/// Invalid sequences (`#` followed by fewer than two hex digits) are kept
/// literally, matching common reader behavior for malformed files.
pub fn decode_name_bytes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'#' {
            if let Some(pair) = raw.get(i + 1..i + 3) {
                if let Ok(byte) =
                    u8::from_str_radix(std::str::from_utf8(pair).unwrap_or("zz"), 16)
                {
                    result.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        result.push(raw[i]);
        i += 1;
    }

    result
}

/// Escape name bytes for serialization.
///
/// Bytes outside the visible ASCII range 33-126 and bytes in the reserved
/// set `( ) < > [ ] { } / % \ # and whitespace` render as `#XX` uppercase
/// hex. `decode_name_bytes` reverses this exactly for every byte value.
pub fn encode_name_bytes(name: &[u8]) -> String {
    let mut out = String::with_capacity(name.len());
    for &b in name {
        if (33..=126).contains(&b) && !is_delimiter(b) && b != b'#' && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("#{:02X}", b));
        }
    }
    out
}

/// Parse a name starting with `/`.
///
/// Name content runs until whitespace or a delimiter; `#XX` escapes are
/// decoded here. Non-UTF8 name bytes are mapped through Latin-1 so the
/// `String` representation stays lossless per byte.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |bytes: &[u8]| {
                let decoded = decode_name_bytes(bytes);
                Token::Name(decoded.iter().map(|&b| b as char).collect())
            },
        ),
    )(input)
}

/// Require the next byte after a word keyword to be whitespace, a delimiter,
/// or end of input, so "trailer" never lexes as "true" + garbage.
fn keyword_boundary(input: &[u8]) -> bool {
    match input.first() {
        None => true,
        Some(&c) => is_whitespace(c) || is_delimiter(c),
    }
}

/// Case-insensitive word keyword (the boolean/null literals, which common
/// readers accept in any case).
fn lenient_keyword<'a>(
    word: &'static str,
    token: Token<'static>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Token<'a>> {
    move |input| {
        let (rest, _) = tag_no_case(word)(input)?;
        if !keyword_boundary(rest) {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        Ok((rest, token.clone()))
    }
}

/// Exact-case word keyword (the structural keywords, whose spelling the
/// file format fixes).
fn strict_keyword<'a>(
    word: &'static str,
    token: Token<'static>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Token<'a>> {
    move |input| {
        let (rest, _) = tag(word)(input)?;
        if !keyword_boundary(rest) {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        Ok((rest, token.clone()))
    }
}

/// Parse PDF keywords and delimiters.
///
/// Word keywords must end at a token boundary; only the boolean/null
/// literals match case-insensitively. Multi-character delimiters are
/// checked before single ones.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        lenient_keyword("false", Token::False),
        lenient_keyword("true", Token::True),
        lenient_keyword("null", Token::Null),
        strict_keyword("endstream", Token::StreamEnd), // Check before "endobj"/"stream"
        strict_keyword("endobj", Token::ObjEnd),
        strict_keyword("stream", Token::StreamStart),
        strict_keyword("obj", Token::ObjStart),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        strict_keyword("R", Token::R),
    ))(input)
}

/// Parse a single PDF token, skipping leading whitespace and comments.
///
/// Order of alternatives matters: keywords before names before numbers,
/// and `<<` before hex strings.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;

    alt((parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Number Tests
    // ========================================================================

    #[test]
    fn test_parse_positive_integer() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
    }

    #[test]
    fn test_parse_negative_integer() {
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
    }

    #[test]
    fn test_parse_plus_sign_integer() {
        assert_eq!(token(b"+17"), Ok((&b""[..], Token::Integer(17))));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_parse_real() {
        assert_eq!(token(b"3.14"), Ok((&b""[..], Token::Real(3.14))));
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
    }

    #[test]
    fn test_parse_real_leading_and_trailing_dot() {
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
    }

    // ========================================================================
    // String Tests
    // ========================================================================

    #[test]
    fn test_parse_literal_string() {
        assert_eq!(token(b"(Hello)"), Ok((&b""[..], Token::LiteralString(b"Hello"))));
    }

    #[test]
    fn test_parse_literal_string_nested_parens() {
        assert_eq!(
            token(b"(Hello (nested) World)"),
            Ok((&b""[..], Token::LiteralString(b"Hello (nested) World")))
        );
    }

    #[test]
    fn test_parse_literal_string_escaped_paren() {
        assert_eq!(
            token(b"(Open \\( Close \\))"),
            Ok((&b""[..], Token::LiteralString(b"Open \\( Close \\)")))
        );
    }

    #[test]
    fn test_parse_empty_literal_string() {
        assert_eq!(token(b"()"), Ok((&b""[..], Token::LiteralString(b""))));
    }

    #[test]
    fn test_parse_hex_string() {
        assert_eq!(token(b"<48656C6C6F>"), Ok((&b""[..], Token::HexString(b"48656C6C6F"))));
    }

    #[test]
    fn test_parse_hex_string_with_whitespace() {
        assert_eq!(token(b"<48 65 6C>"), Ok((&b""[..], Token::HexString(b"48 65 6C"))));
    }

    #[test]
    fn test_parse_empty_hex_string() {
        assert_eq!(token(b"<>"), Ok((&b""[..], Token::HexString(b""))));
    }

    // ========================================================================
    // Name Tests
    // ========================================================================

    #[test]
    fn test_parse_name() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
    }

    #[test]
    fn test_parse_name_with_special_chars() {
        assert_eq!(
            token(b"/A;Name_With-Various***Characters"),
            Ok((&b""[..], Token::Name("A;Name_With-Various***Characters".to_string())))
        );
    }

    #[test]
    fn test_parse_name_with_hex_escape() {
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/A#20B#23C"), Ok((&b""[..], Token::Name("A B#C".to_string()))));
    }

    #[test]
    fn test_parse_name_invalid_hex_escape_kept_literal() {
        assert_eq!(token(b"/A#ZZ"), Ok((&b""[..], Token::Name("A#ZZ".to_string()))));
    }

    #[test]
    fn test_name_escape_round_trip() {
        let bytes: Vec<u8> = vec![b'A', 0x00, b' ', b'/', b'#', 0xFF, b'z'];
        let escaped = encode_name_bytes(&bytes);
        assert_eq!(escaped, "A#00#20#2F#23#FFz");
        assert_eq!(decode_name_bytes(escaped.as_bytes()), bytes);
    }

    #[test]
    fn test_encode_name_plain_ascii_untouched() {
        assert_eq!(encode_name_bytes(b"Type"), "Type");
        assert_eq!(encode_name_bytes(b"Font-Bold_1"), "Font-Bold_1");
    }

    #[test]
    fn test_encode_name_escapes_backslash() {
        assert_eq!(encode_name_bytes(b"a\\b"), "a#5Cb");
        assert_eq!(decode_name_bytes(b"a#5Cb"), b"a\\b");
    }

    // ========================================================================
    // Keyword Tests
    // ========================================================================

    #[test]
    fn test_parse_keywords() {
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"false"), Ok((&b""[..], Token::False)));
        assert_eq!(token(b"null"), Ok((&b""[..], Token::Null)));
        assert_eq!(token(b"obj"), Ok((&b""[..], Token::ObjStart)));
        assert_eq!(token(b"endobj"), Ok((&b""[..], Token::ObjEnd)));
        assert_eq!(token(b"stream"), Ok((&b""[..], Token::StreamStart)));
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
        assert_eq!(token(b"R"), Ok((&b""[..], Token::R)));
    }

    #[test]
    fn test_boolean_and_null_keywords_case_insensitive() {
        assert_eq!(token(b"True"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"FALSE"), Ok((&b""[..], Token::False)));
        assert_eq!(token(b"Null"), Ok((&b""[..], Token::Null)));
    }

    #[test]
    fn test_structural_keywords_are_case_sensitive() {
        assert!(!matches!(token(b"OBJ"), Ok((_, Token::ObjStart))));
        assert!(!matches!(token(b"Endobj"), Ok((_, Token::ObjEnd))));
        assert!(!matches!(token(b"ENDSTREAM"), Ok((_, Token::StreamEnd))));
        assert!(!matches!(token(b"r"), Ok((_, Token::R))));
    }

    #[test]
    fn test_keyword_requires_boundary() {
        // "trailer" must not lex as "true" plus junk
        assert!(!matches!(token(b"trailer"), Ok((_, Token::True))));
        // "Root" after a slash is a name, bare "Rx" is not a reference marker
        assert!(!matches!(token(b"Rx"), Ok((_, Token::R))));
    }

    #[test]
    fn test_parse_delimiters() {
        assert_eq!(token(b"["), Ok((&b""[..], Token::ArrayStart)));
        assert_eq!(token(b"]"), Ok((&b""[..], Token::ArrayEnd)));
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b">>"), Ok((&b""[..], Token::DictEnd)));
    }

    // ========================================================================
    // Whitespace and Comment Tests
    // ========================================================================

    #[test]
    fn test_skip_leading_whitespace() {
        assert_eq!(token(b"  \n\t42"), Ok((&b""[..], Token::Integer(42))));
    }

    #[test]
    fn test_skip_comments() {
        assert_eq!(token(b"% comment\n42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"% one\n% two\n  42"), Ok((&b""[..], Token::Integer(42))));
    }

    // ========================================================================
    // Edge Cases
    // ========================================================================

    #[test]
    fn test_dict_vs_hex_string() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b"<ABC>"), Ok((&b""[..], Token::HexString(b"ABC"))));
    }

    #[test]
    fn test_indirect_object_token_sequence() {
        let input = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj";
        let expected = [
            Token::Integer(1),
            Token::Integer(0),
            Token::ObjStart,
            Token::DictStart,
            Token::Name("Type".to_string()),
            Token::Name("Catalog".to_string()),
            Token::Name("Pages".to_string()),
            Token::Integer(2),
            Token::Integer(0),
            Token::R,
            Token::DictEnd,
            Token::ObjEnd,
        ];

        let mut rest: &[u8] = input;
        for want in &expected {
            let (r, tok) = token(rest).unwrap();
            assert_eq!(&tok, want);
            rest = r;
        }
        assert!(rest.is_empty());
    }

    #[test]
    fn test_real_vs_integer_distinction() {
        assert!(matches!(token(b"0").unwrap().1, Token::Integer(0)));
        assert!(matches!(token(b"0.0").unwrap().1, Token::Real(_)));
        assert!(matches!(token(b"5.").unwrap().1, Token::Real(_)));
    }
}
