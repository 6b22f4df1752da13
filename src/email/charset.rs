use std::borrow::Cow;

use encoding_rs::{DecoderResult, EncoderResult, Encoding, UTF_8};

use crate::email::error::{AddressError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvertMode {
    /// Fail on any byte or character the charsets cannot carry.
    Strict,
    /// Replace such bytes or characters with `?`.
    Lossy,
}

/// `encoding_rs` reads both the us-ascii and the iso-8859-1 labels as
/// windows-1252, so those two are mapped by hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Charset {
    Ascii,
    Latin1,
    Other(&'static Encoding),
}

const ASCII_LABELS: &[&str] = &[
    "us-ascii",
    "ascii",
    "us",
    "ansi_x3.4-1968",
    "ansi_x3.4-1986",
    "iso646-us",
    "iso_646.irv:1991",
    "csascii",
];

pub fn is_us_ascii(label: &str) -> bool {
    let label = label.trim();
    ASCII_LABELS.iter().any(|l| l.eq_ignore_ascii_case(label))
}

const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso_8859-1",
    "iso_8859-1:1987",
    "iso88591",
    "iso-ir-100",
    "latin1",
    "l1",
    "csisolatin1",
    "ibm819",
    "cp819",
];

pub fn is_latin1(label: &str) -> bool {
    let label = canonical_name(label);
    LATIN1_LABELS.iter().any(|l| *l == label)
}

pub fn is_utf8(label: &str) -> bool {
    let label = label.trim();
    label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
}

fn lookup(label: &str) -> Result<Charset> {
    if is_us_ascii(label) {
        return Ok(Charset::Ascii);
    }
    if is_latin1(label) {
        return Ok(Charset::Latin1);
    }
    Encoding::for_label(canonical_name(label).as_bytes())
        .map(Charset::Other)
        .ok_or_else(|| AddressError::charset(label, "unknown charset"))
}

/// The spelling used when labelling encoded-words: lowercase, with a few
/// common misspellings repaired.
pub fn canonical_name(label: &str) -> String {
    let label = label.trim();
    if is_utf8(label) {
        return "utf-8".to_string();
    }
    let lower = label.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("8859-") {
        return format!("iso-8859-{}", rest);
    }
    if let Some(rest) = lower.strip_prefix("8859") {
        return format!("iso-8859-{}", rest);
    }
    if let Some(rest) = lower.strip_prefix("iso8859-") {
        return format!("iso-8859-{}", rest);
    }
    if let Some(rest) = lower.strip_prefix("iso8859") {
        return format!("iso-8859-{}", rest);
    }
    lower
}

/// Both labels name the same charset.
pub fn same_charset(a: &str, b: &str) -> bool {
    match (lookup(a), lookup(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => canonical_name(a) == canonical_name(b),
    }
}

fn decode<'a>(
    bytes: &'a [u8],
    cs: Charset,
    label: &str,
    mode: ConvertMode,
) -> Result<Cow<'a, str>> {
    match (cs, mode) {
        (Charset::Ascii, ConvertMode::Strict) => {
            if bytes.is_ascii() {
                // All bytes are ASCII, so this cannot fail.
                Ok(String::from_utf8_lossy(bytes))
            } else {
                Err(AddressError::charset(label, "8-bit data in us-ascii text"))
            }
        }
        (Charset::Ascii, ConvertMode::Lossy) => Ok(Cow::Owned(
            bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
        )),
        (Charset::Latin1, _) => Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
        (Charset::Other(enc), ConvertMode::Strict) => enc
            .decode_without_bom_handling_and_without_replacement(bytes)
            .ok_or_else(|| AddressError::charset(label, "malformed input")),
        (Charset::Other(enc), ConvertMode::Lossy) => {
            let mut decoder = enc.new_decoder_without_bom_handling();
            let mut out = String::with_capacity(bytes.len() + 16);
            let mut src = bytes;
            loop {
                let (result, read) =
                    decoder.decode_to_string_without_replacement(src, &mut out, true);
                src = &src[read..];
                match result {
                    DecoderResult::InputEmpty => break,
                    DecoderResult::OutputFull => out.reserve(src.len() * 3 + 16),
                    DecoderResult::Malformed(_, _) => out.push('?'),
                }
            }
            Ok(Cow::Owned(out))
        }
    }
}

fn latin1_byte(c: char) -> Option<u8> {
    let cp = u32::from(c);
    if cp <= 0xff {
        Some(cp as u8)
    } else {
        None
    }
}

fn encode(text: &str, cs: Charset, label: &str, mode: ConvertMode) -> Result<Vec<u8>> {
    match (cs, mode) {
        (Charset::Ascii, ConvertMode::Strict) => {
            if text.is_ascii() {
                Ok(text.as_bytes().to_vec())
            } else {
                Err(AddressError::charset(label, "unrepresentable character"))
            }
        }
        (Charset::Ascii, ConvertMode::Lossy) => Ok(text
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect()),
        (Charset::Latin1, ConvertMode::Strict) => text
            .chars()
            .map(|c| {
                latin1_byte(c)
                    .ok_or_else(|| AddressError::charset(label, "unrepresentable character"))
            })
            .collect(),
        (Charset::Latin1, ConvertMode::Lossy) => Ok(text
            .chars()
            .map(|c| latin1_byte(c).unwrap_or(b'?'))
            .collect()),
        (Charset::Other(enc), _) if enc == UTF_8 => Ok(text.as_bytes().to_vec()),
        (Charset::Other(enc), _) if enc.output_encoding() != enc => {
            Err(AddressError::charset(label, "cannot encode into this charset"))
        }
        (Charset::Other(enc), ConvertMode::Strict) => {
            let (out, _, had_errors) = enc.encode(text);
            if had_errors {
                Err(AddressError::charset(label, "unrepresentable character"))
            } else {
                Ok(out.into_owned())
            }
        }
        (Charset::Other(enc), ConvertMode::Lossy) => {
            let mut encoder = enc.new_encoder();
            let mut out = Vec::with_capacity(text.len() + 16);
            let mut src = text;
            loop {
                let (result, read) =
                    encoder.encode_from_utf8_to_vec_without_replacement(src, &mut out, true);
                src = &src[read..];
                match result {
                    EncoderResult::InputEmpty => break,
                    EncoderResult::OutputFull => out.reserve(src.len() * 4 + 16),
                    EncoderResult::Unmappable(_) => out.push(b'?'),
                }
            }
            Ok(out)
        }
    }
}

/// Converts `bytes` from charset `from` to charset `to`.
pub fn convert(bytes: &[u8], from: &str, to: &str, mode: ConvertMode) -> Result<Vec<u8>> {
    let src = lookup(from)?;
    let dst = lookup(to)?;
    let text = decode(bytes, src, from, mode)?;
    if src == dst && mode == ConvertMode::Strict {
        return Ok(bytes.to_vec());
    }
    encode(&text, dst, to, mode)
}

/// Tries `fromcodes` in order; the first that converts cleanly wins. If none
/// does, the text is converted lossily from the first.
pub fn convert_nonmime(bytes: &[u8], fromcodes: &[String], to: &str) -> Vec<u8> {
    for from in fromcodes {
        if let Ok(out) = convert(bytes, from, to, ConvertMode::Strict) {
            return out;
        }
    }
    fromcodes
        .first()
        .and_then(|from| convert(bytes, from, to, ConvertMode::Lossy).ok())
        .unwrap_or_else(|| bytes.to_vec())
}

/// The first of `candidates` that can represent `bytes` (in charset
/// `from`) without loss, canonically spelled.
pub fn choose_charset(from: &str, candidates: &[String], bytes: &[u8]) -> Option<String> {
    candidates
        .iter()
        .filter(|c| !c.trim().is_empty())
        .find(|c| convert(bytes, from, c, ConvertMode::Strict).is_ok())
        .map(|c| canonical_name(c))
}

fn is_display_corrupting(c: char) -> bool {
    matches!(
        c,
        '\u{00ad}'
            | '\u{200e}'
            | '\u{200f}'
            | '\u{feff}'
            | '\u{2066}'..='\u{2069}'
            | '\u{202a}'..='\u{202e}'
            | '\u{061c}'
    )
}

/// Replaces unprintable characters with `?`. In UTF-8, invalid sequences
/// become U+FFFD and invisible direction or formatting marks are dropped.
pub fn filter_unprintable(bytes: &[u8], charset: &str) -> Vec<u8> {
    if is_utf8(charset) {
        let mut out = String::with_capacity(bytes.len());
        for c in String::from_utf8_lossy(bytes).chars() {
            if is_display_corrupting(c) {
                continue;
            }
            out.push(if c.is_control() { '?' } else { c });
        }
        out.into_bytes()
    } else {
        bytes
            .iter()
            .map(|&b| if b < 0x20 || b == 0x7f { b'?' } else { b })
            .collect()
    }
}
