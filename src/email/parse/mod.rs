use std::borrow::Cow;

use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::bytes::complete::tag;
use nom::bytes::complete::take_while1;
use nom::combinator::map;
use nom::error::Error;
use nom::error::ErrorKind;
use nom::error::ParseError;
use nom::multi::fold_many0;
use nom::sequence::delimited;
use nom::sequence::preceded;
use nom::Err;
use nom::IResult;

use crate::email::bytes::is_email_wsp;
use crate::email::error::{AddressError, Result};

pub mod address;

/// Longest phrase, comment or mailbox the parser will accumulate.
pub const TOKEN_MAX: usize = 1023;

/// A set of specials, as a bitmask over the bytes 32..96.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialMask(u64);

impl SpecialMask {
    /// `"(),.:;<>@[\]`
    pub const ADDRESS: SpecialMask = SpecialMask(0x3800_0001_5c00_5304);
    /// Address specials except `"(.\`
    pub const USER: SpecialMask = SpecialMask(0x2800_0001_5c00_1200);
    /// Address specials except `(.[\]`
    pub const DOMAIN: SpecialMask = SpecialMask(0x0000_0001_5c00_1204);
    /// Address specials except `(,.[\]`
    pub const ROUTE: SpecialMask = SpecialMask(0x0000_0001_5c00_0204);

    pub fn contains(self, ch: u8) -> bool {
        (32..96).contains(&ch) && (self.0 >> (ch - 32)) & 1 == 1
    }
}

pub const ADDRESS_SPECIALS: &[u8] = b"\"(),.:;<>@[\\]";

pub fn is_special(ch: u8) -> bool {
    SpecialMask::ADDRESS.contains(ch)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// Contents of a comment, without the outer parentheses. Nested
    /// comments keep theirs.
    Comment(Vec<u8>),
    /// Contents of a quoted-string with escapes removed.
    Quoted(Vec<u8>),
    Special(u8),
    Atom(&'a [u8]),
}

impl<'a> Token<'a> {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Token::Comment(b) | Token::Quoted(b) => b,
            Token::Special(ch) => std::slice::from_ref(ch),
            Token::Atom(b) => b,
        }
    }
}

fn satisfy_byte<F>(cond: F) -> impl Fn(&[u8]) -> IResult<&[u8], u8>
where
    F: Fn(u8) -> bool,
{
    move |input| {
        if input.is_empty() {
            Err(Err::Error(Error::from_error_kind(input, ErrorKind::Eof)))
        } else {
            let ch = input[0];
            if cond(ch) {
                Ok((&input[1..], input[0]))
            } else {
                Err(Err::Error(Error::from_error_kind(
                    input,
                    ErrorKind::Satisfy,
                )))
            }
        }
    }
}

/// A backslash and the byte after it. The backslash is dropped.
fn quoted_pair(input: &[u8]) -> IResult<&[u8], u8> {
    preceded(tag(b"\\"), satisfy_byte(|_| true))(input)
}

fn append<'a>(mut acc: Vec<u8>, piece: Cow<'a, [u8]>) -> Vec<u8> {
    acc.extend_from_slice(&piece);
    acc
}

fn ccontent(input: &[u8]) -> IResult<&[u8], Cow<'_, [u8]>> {
    alt((
        map(is_not(&b"()\\"[..]), Cow::Borrowed),
        map(quoted_pair, |ch| Cow::Owned(vec![ch])),
        map(comment, |inner| {
            let mut nested = Vec::with_capacity(inner.len() + 2);
            nested.push(b'(');
            nested.extend(inner);
            nested.push(b')');
            Cow::Owned(nested)
        }),
    ))(input)
}

pub fn comment(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    delimited(
        tag(b"("),
        fold_many0(ccontent, Vec::new(), append),
        tag(b")"),
    )(input)
}

fn qcontent(input: &[u8]) -> IResult<&[u8], Cow<'_, [u8]>> {
    alt((
        map(is_not(&b"\"\\"[..]), Cow::Borrowed),
        map(quoted_pair, |ch| Cow::Owned(vec![ch])),
    ))(input)
}

pub fn quoted_string(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    delimited(
        tag(b"\""),
        fold_many0(qcontent, Vec::new(), append),
        tag(b"\""),
    )(input)
}

pub fn atom(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|ch| !is_email_wsp(ch) && !is_special(ch))(input)
}

fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        map(comment, Token::Comment),
        map(quoted_string, Token::Quoted),
        // An opening `(` or `"` that did not parse above is unterminated.
        map(
            satisfy_byte(|ch| is_special(ch) && ch != b'(' && ch != b'"'),
            Token::Special,
        ),
        map(atom, Token::Atom),
    ))(input)
}

/// Output buffer with a fixed capacity. Bytes pushed past the capacity are
/// dropped and the overflow is remembered so that the caller can report it.
#[derive(Clone, Debug)]
pub struct TokenBuf {
    bytes: Vec<u8>,
    max: usize,
    overflowed: bool,
}

impl Default for TokenBuf {
    fn default() -> Self {
        Self::new(TOKEN_MAX)
    }
}

impl TokenBuf {
    pub fn new(max: usize) -> Self {
        Self {
            bytes: Vec::new(),
            max,
            overflowed: false,
        }
    }

    pub fn push(&mut self, ch: u8) {
        if self.bytes.len() < self.max {
            self.bytes.push(ch);
        } else {
            self.overflowed = true;
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        let room = self.max - self.bytes.len();
        if bytes.len() > room {
            self.overflowed = true;
        }
        self.bytes.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Empties the buffer. The overflow flag survives until `check`.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    pub fn check(&self, what: &'static str) -> Result<()> {
        if self.overflowed {
            Err(AddressError::Buffer {
                what,
                max: self.max,
            })
        } else {
            Ok(())
        }
    }
}

/// Cursor over a header value.
#[derive(Clone, Debug)]
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
    ws_pending: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            ws_pending: false,
        }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Whether folding whitespace was skipped after the last token.
    pub fn ws_pending(&self) -> bool {
        self.ws_pending
    }

    pub fn skip_fws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map_or(false, is_email_wsp) {
            self.pos += 1;
        }
        self.ws_pending = self.pos > start;
        self.ws_pending
    }

    /// Consumes one raw byte, without skipping whitespace after it.
    pub fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    /// Reads the token at the cursor: a comment, a quoted-string, one
    /// special byte or an atom. The cursor is left directly after it.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let remaining = self.remaining();
        match token(remaining) {
            Ok((rest, tok)) => {
                self.pos = self.input.len() - rest.len();
                Ok(tok)
            }
            Err(_) => Err(self.scan_error()),
        }
    }

    /// Reads one token, appends its bytes to `out` and skips the folding
    /// whitespace after it.
    pub fn next_token_into(&mut self, out: &mut TokenBuf) -> Result<()> {
        let tok = self.next_token()?;
        out.extend(tok.bytes());
        self.skip_fws();
        Ok(())
    }

    fn scan_error(&self) -> AddressError {
        let what = match self.peek() {
            Some(b'(') => "comment",
            Some(b'"') => "quoted-string",
            _ => "token",
        };
        AddressError::Scan {
            what,
            offset: self.pos,
        }
    }
}
