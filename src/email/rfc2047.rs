use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use lazy_static::lazy_static;
use log::{debug, trace};
use regex::bytes::Regex;

use crate::config::Config;
use crate::email::bytes::{find, is_email_wsp};
use crate::email::charset::{
    choose_charset, convert, convert_nonmime, filter_unprintable, is_us_ascii, same_charset,
    ConvertMode,
};
use crate::email::error::{AddressError, Result};
use crate::email::headers::address::AddressList;
use crate::email::headers::{AddressHeader, Envelope};
use crate::email::parse::ADDRESS_SPECIALS;

/// Longest encoded-word, delimiters included.
pub const ENCWORD_LEN_MAX: usize = 75;
/// Length of `=?` `?Q?` `?=` plus a single byte of charset and text.
pub const ENCWORD_LEN_MIN: usize = 9;

const MIME_SPECIALS: &[u8] = b"@.,;:<>[]\\\"()?/= \t";

/// Base64 as found in the wild: padding optional, stray trailing bits
/// ignored.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r#"(?-u)=\?([^\]\[()<>@,;:\\"/?. =]+)\?([qQbB])\?([^?]+)\?="#).unwrap();
}

fn is_hspace(ch: u8) -> bool {
    ch == 0 || ch == b' ' || ch == b'\t'
}

fn is_continuation(ch: u8) -> bool {
    ch & 0xc0 == 0x80
}

fn hexval(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

fn decode_q(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        match text[i] {
            b'_' => out.push(b' '),
            b'=' => match (
                text.get(i + 1).copied().and_then(hexval),
                text.get(i + 2).copied().and_then(hexval),
            ) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 2;
                }
                _ => out.push(b'='),
            },
            ch => out.push(ch),
        }
        i += 1;
    }
    out
}

fn decode_word(encoding: u8, text: &[u8]) -> Result<Vec<u8>> {
    if encoding.eq_ignore_ascii_case(&b'q') {
        return Ok(decode_q(text));
    }
    LENIENT_BASE64
        .decode(text)
        .map_err(|_| AddressError::Encoding {
            encoding: 'B',
            text: String::from_utf8_lossy(text).into_owned(),
        })
}

/// Words decoded so far that share a charset. Converting them only once the
/// run ends keeps a character split across two words intact.
#[derive(Default)]
struct Pending {
    charset: Vec<u8>,
    bytes: Vec<u8>,
}

impl Pending {
    fn flush(&mut self, out: &mut Vec<u8>, config: &Config) {
        if self.bytes.is_empty() {
            return;
        }
        let charset = String::from_utf8_lossy(&self.charset);
        let converted = convert(&self.bytes, &charset, &config.charset, ConvertMode::Lossy)
            .unwrap_or_else(|e| {
                debug!("Keeping undecodable text: {}", e);
                self.bytes.clone()
            });
        out.extend(filter_unprintable(&converted, &config.charset));
        self.bytes.clear();
    }
}

/// Decodes every encoded-word in `input` into the local charset. Text
/// outside encoded-words is copied through, or converted from the first
/// fitting assumed charset if any are configured.
///
/// Fails if any word cannot be decoded; nothing is returned in that case.
pub fn decode(input: &[u8], config: &Config) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut pending = Pending::default();
    let mut pos = 0;
    let mut after_word = false;

    for caps in ENCODED_WORD.captures_iter(input) {
        let (word, charset, encoding, text) =
            match (caps.get(0), caps.get(1), caps.get(2), caps.get(3)) {
                (Some(w), Some(c), Some(e), Some(t)) => (w, c, e, t),
                _ => continue,
            };
        let gap = &input[pos..word.start()];
        if !gap.is_empty() && !(after_word && gap.iter().copied().all(is_email_wsp)) {
            pending.flush(&mut out, config);
            push_plain(&mut out, gap, config);
        }

        let decoded = decode_word(encoding.as_bytes()[0], text.as_bytes())?;
        trace!(
            "Decoded {} bytes of {}",
            decoded.len(),
            String::from_utf8_lossy(charset.as_bytes())
        );
        let label = String::from_utf8_lossy(charset.as_bytes());
        if !same_charset(&String::from_utf8_lossy(&pending.charset), &label) {
            pending.flush(&mut out, config);
            pending.charset = charset.as_bytes().to_vec();
        }
        pending.bytes.extend(decoded);
        pos = word.end();
        after_word = true;
    }

    pending.flush(&mut out, config);
    if pos < input.len() {
        push_plain(&mut out, &input[pos..], config);
    }
    Ok(out)
}

fn push_plain(out: &mut Vec<u8>, text: &[u8], config: &Config) {
    if config.assumed_charset.is_empty() {
        out.extend_from_slice(text);
    } else {
        out.extend(convert_nonmime(text, &config.assumed_charset, &config.charset));
    }
}

/// Like [`decode`], but leaves `value` untouched on failure.
pub fn decode_in_place(value: &mut Vec<u8>, config: &Config) -> Result<()> {
    match decode(value, config) {
        Ok(decoded) => {
            *value = decoded;
            Ok(())
        }
        Err(e) => {
            debug!(
                "Leaving '{}' undecoded: {}",
                String::from_utf8_lossy(value),
                e
            );
            Err(e)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WordEncoding {
    B,
    Q,
}

/// A chunk of text ready to be written as one encoded-word.
struct Block {
    encoding: WordEncoding,
    /// Length of the finished encoded-word.
    len: usize,
    /// The text in the target charset.
    data: Vec<u8>,
}

struct Target {
    tocode: String,
    /// The text is UTF-8 and is converted to `tocode`. Otherwise it is
    /// labelled with `tocode` as it is.
    convert: bool,
}

impl Block {
    fn write(&self, tocode: &str, out: &mut Vec<u8>) {
        out.extend_from_slice(b"=?");
        out.extend_from_slice(tocode.as_bytes());
        match self.encoding {
            WordEncoding::B => {
                out.extend_from_slice(b"?B?");
                out.extend(STANDARD.encode(&self.data).into_bytes());
            }
            WordEncoding::Q => {
                out.extend_from_slice(b"?Q?");
                for &ch in &self.data {
                    if ch == b' ' {
                        out.push(b'_');
                    } else if ch >= 0x7f || ch < 0x20 || ch == b'_' || MIME_SPECIALS.contains(&ch)
                    {
                        out.extend(format!("={:02X}", ch).into_bytes());
                    } else {
                        out.push(ch);
                    }
                }
            }
        }
        out.extend_from_slice(b"?=");
    }
}

/// Tries to fit `d` into a single encoded-word. On failure, returns an
/// upper bound on how many bytes of `d` could fit.
fn try_block(d: &[u8], target: &Target) -> std::result::Result<Block, usize> {
    let cap = (ENCWORD_LEN_MAX - ENCWORD_LEN_MIN + 1).saturating_sub(target.tocode.len());
    let data = if target.convert {
        match convert(d, "utf-8", &target.tocode, ConvertMode::Strict) {
            Ok(data) if data.len() <= cap => data,
            _ => return Err(d.len()),
        }
    } else {
        if d.len() > cap {
            return Err(cap + 1);
        }
        d.to_vec()
    };

    let count = data
        .iter()
        .filter(|&&ch| {
            ch >= 0x7f || ch < 0x20 || ch == b'_' || (ch != b' ' && MIME_SPECIALS.contains(&ch))
        })
        .count();
    let len = ENCWORD_LEN_MIN - 2 + target.tocode.len();
    let len_b = len + (data.len() + 2) / 3 * 4;
    let mut len_q = len + data.len() + 2 * count;
    // RFC 1468 wants B for iso-2022-jp.
    if target.tocode.eq_ignore_ascii_case("iso-2022-jp") {
        len_q = ENCWORD_LEN_MAX + 1;
    }

    if len_b < len_q && len_b <= ENCWORD_LEN_MAX {
        Ok(Block {
            encoding: WordEncoding::B,
            len: len_b,
            data,
        })
    } else if len_q <= ENCWORD_LEN_MAX {
        Ok(Block {
            encoding: WordEncoding::Q,
            len: len_q,
            data,
        })
    } else {
        Err(d.len())
    }
}

/// The longest prefix of `d` that fits one encoded-word starting at `col`.
fn choose_block(d: &[u8], col: usize, target: &Target) -> Result<(usize, Block)> {
    let mut n = d.len();
    loop {
        let fits = match try_block(&d[..n], target) {
            Ok(block) if col + block.len <= ENCWORD_LEN_MAX + 1 || n <= 1 => {
                return Ok((n, block))
            }
            Ok(_) => n,
            Err(fits) => fits.min(n),
        };
        n = fits.saturating_sub(1);
        if target.convert {
            while n > 1 && is_continuation(d[n]) {
                n -= 1;
            }
        }
        if n == 0 {
            return Err(AddressError::charset(
                &target.tocode,
                "text does not fit an encoded-word",
            ));
        }
    }
}

/// Encodes the parts of `input` (in the local charset) that cannot appear
/// raw in a header, using the first of `charsets` that can carry them.
/// Bytes in `specials` are encoded too, but only if something else already
/// needs encoding. `col` is the column the value starts at; long values are
/// folded with `"\n\t"` between encoded-words.
pub fn encode(
    input: &[u8],
    specials: Option<&[u8]>,
    col: usize,
    charsets: &[String],
    config: &Config,
) -> Result<Vec<u8>> {
    let fallback = ["utf-8".to_string()];
    let charsets = if charsets.is_empty() {
        &fallback[..]
    } else {
        charsets
    };

    let (u, mut is_utf8) = match convert(input, &config.charset, "utf-8", ConvertMode::Strict) {
        Ok(u) => (u, true),
        Err(e) => {
            debug!("Encoding raw bytes: {}", e);
            (input.to_vec(), false)
        }
    };
    let ulen = u.len();

    let mut must = None;
    let mut special = None;
    for (i, &ch) in u.iter().enumerate() {
        let starts_word = ch == b'='
            && u.get(i + 1) == Some(&b'?')
            && (i == 0 || is_hspace(u[i - 1]));
        if ch & 0x80 != 0 || starts_word {
            must = Some(must.map_or((i, i), |(first, _)| (first, i)));
        } else if ch != 0 && specials.map_or(false, |s| s.contains(&ch)) {
            special = Some(special.map_or((i, i), |(first, _)| (first, i)));
        }
    }
    let (mut t0, mut t1) = match must {
        Some(region) => region,
        None => return Ok(u),
    };
    if let Some((s0, s1)) = special {
        t0 = t0.min(s0);
        t1 = t1.max(s1);
    }

    let mut tocode = config.charset.clone();
    if is_utf8 {
        match choose_charset("utf-8", charsets, &u) {
            Some(cs) => tocode = cs,
            None if charsets.iter().all(|cs| is_us_ascii(cs)) => {
                is_utf8 = false;
                tocode = "unknown-8bit".to_string();
            }
            None => {
                return Err(AddressError::charset(
                    &charsets.join(":"),
                    "no charset can represent the text",
                ))
            }
        }
    }
    if !is_utf8 && is_us_ascii(&tocode) {
        tocode = "unknown-8bit".to_string();
    }
    let target = Target {
        tocode,
        convert: is_utf8,
    };

    // The first encoded-word must start early enough to fit on this line.
    t0 = t0.min((ENCWORD_LEN_MAX + 1).saturating_sub(col + ENCWORD_LEN_MIN));

    // Start encoding after a space.
    while t0 > 0 {
        if is_hspace(u[t0 - 1]) {
            let mut t = t0 + 1;
            if target.convert {
                while t < ulen && is_continuation(u[t]) {
                    t += 1;
                }
            }
            let t = t.min(ulen);
            if let Ok(block) = try_block(&u[t0..t], &target) {
                if col + t0 + block.len <= ENCWORD_LEN_MAX + 1 {
                    break;
                }
            }
        }
        t0 -= 1;
    }

    // Stop encoding before a space.
    while t1 < ulen {
        if is_hspace(u[t1]) {
            let mut t = t1.saturating_sub(1);
            if target.convert {
                while t > 0 && is_continuation(u[t]) {
                    t -= 1;
                }
            }
            if let Ok(block) = try_block(&u[t..t1], &target) {
                if 1 + block.len + (ulen - t1) <= ENCWORD_LEN_MAX + 1 {
                    break;
                }
            }
        }
        t1 += 1;
    }

    // [t0, t1) gets encoded.
    let mut out = Vec::with_capacity(2 * ulen);
    out.extend_from_slice(&u[..t0]);
    let mut col = col + t0;
    let mut t = t0;
    let last = loop {
        let (mut n, mut block) = choose_block(&u[t..t1], col, &target)?;
        if n == t1 - t {
            // Try to fit the plain suffix on the same line.
            if col + block.len + (ulen - t1) <= ENCWORD_LEN_MAX + 1 {
                break block;
            }
            n = (t1 - t).saturating_sub(1);
            if target.convert {
                while n > 0 && is_continuation(u[t + n]) {
                    n -= 1;
                }
            }
            if n == 0 {
                // A single encoded character followed by too much plain
                // text: take in the next word as well.
                if t1 >= ulen {
                    break block;
                }
                t1 += 1;
                while t1 < ulen && !is_hspace(u[t1]) {
                    t1 += 1;
                }
                continue;
            }
            let (m, b) = choose_block(&u[t..t + n], col, &target)?;
            n = m;
            block = b;
        }
        block.write(&target.tocode, &mut out);
        out.extend_from_slice(b"\n\t");
        col = 1;
        t += n;
    };
    last.write(&target.tocode, &mut out);
    out.extend_from_slice(&u[t1..]);
    Ok(out)
}

/// Decodes personal names, and group names that contain encoded-words.
/// Values that fail to decode are kept as they are.
pub fn decode_addrlist(list: &mut AddressList, config: &Config) {
    let assumed = !config.assumed_charset.is_empty();
    for a in list.iter_mut() {
        if let Some(personal) = a.personal.as_mut() {
            if assumed || find(personal, b"=?").is_some() {
                let _ = decode_in_place(personal, config);
            }
        } else if a.group {
            if let Some(name) = a.mailbox.as_mut() {
                if find(name, b"=?").is_some() {
                    let _ = decode_in_place(name, config);
                }
            }
        }
    }
}

/// Encodes personal names and group names for a header named `tag`.
/// Every address is attempted; the first failure is returned and leaves
/// that value unchanged.
pub fn encode_addrlist(list: &mut AddressList, tag: Option<&str>, config: &Config) -> Result<()> {
    let col = tag.map_or(32, |t| t.len() + 2);
    let mut first_err = None;
    for a in list.iter_mut() {
        let value = if a.personal.is_some() {
            a.personal.as_mut()
        } else if a.group {
            a.mailbox.as_mut()
        } else {
            None
        };
        if let Some(value) = value {
            match encode(value, Some(ADDRESS_SPECIALS), col, &config.send_charset, config) {
                Ok(encoded) => *value = encoded,
                Err(e) => {
                    debug!("Cannot encode '{}': {}", String::from_utf8_lossy(value), e);
                    first_err.get_or_insert(e);
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Decodes every address list, the label and the subject. The real subject
/// is worked out again from the decoded text.
pub fn decode_envelope(env: &mut Envelope, config: &Config) {
    for &h in AddressHeader::ALL.iter() {
        decode_addrlist(env.addresses_mut(h), config);
    }
    if let Some(label) = env.x_label.as_mut() {
        let _ = decode_in_place(label, config);
    }
    if let Some(mut subject) = env.subject().map(<[u8]>::to_vec) {
        let _ = decode_in_place(&mut subject, config);
        env.set_subject(Some(&subject[..]), config);
    }
}

/// Encodes an envelope for sending. `Return-Path` is left alone.
pub fn encode_envelope(env: &mut Envelope, config: &Config) -> Result<()> {
    let mut first_err = None;
    for &h in AddressHeader::ALL.iter() {
        if h == AddressHeader::ReturnPath {
            continue;
        }
        if let Err(e) = encode_addrlist(env.addresses_mut(h), Some(h.name()), config) {
            first_err.get_or_insert(e);
        }
    }
    // Both start after "Header:" and a space.
    if let Some(label) = env.x_label.as_mut() {
        match encode(label, None, "X-Label:".len() + 1, &config.send_charset, config) {
            Ok(encoded) => *label = encoded,
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    if let Some(subject) = env.subject().map(<[u8]>::to_vec) {
        match encode(&subject, None, "Subject:".len() + 1, &config.send_charset, config) {
            Ok(encoded) => env.set_subject(Some(&encoded[..]), config),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::error::ErrorKind;
    use crate::email::headers::address::Address;

    fn charsets(list: &str) -> Vec<String> {
        Config::parse_charset_list(list)
    }

    fn dec(s: &str) -> Vec<u8> {
        decode(s.as_bytes(), &Config::default()).unwrap()
    }

    #[test]
    fn split_codepoint() {
        assert_eq!(
            dec("=?utf-8?B?4pi6?= =?utf-8?B?77iP?="),
            b"\xe2\x98\xba\xef\xb8\x8f".to_vec()
        );
        // U+263A split over two words.
        assert_eq!(dec("=?utf-8?B?4pg=?=\r\n =?UTF-8?B?ug==?="), "\u{263a}".as_bytes());
    }

    #[test]
    fn q_words() {
        assert_eq!(dec("=?iso-8859-1?Q?J=F6rg_M=FCller?="), "J\u{f6}rg M\u{fc}ller".as_bytes());
        // Broken escapes are kept literally.
        assert_eq!(dec("=?us-ascii?q?a=4?="), b"a=4");
        assert_eq!(dec("=?us-ascii?Q?a=zz?="), b"a=zz");
    }

    #[test]
    fn plain_text_is_kept() {
        assert_eq!(dec("Re: =?utf-8?Q?caf=C3=A9?= time"), "Re: caf\u{e9} time".as_bytes());
        assert_eq!(dec("no words here"), b"no words here");
        assert_eq!(dec("a =?x?Y?z?= b"), b"a =?x?Y?z?= b");
        // Different charsets are each converted.
        assert_eq!(
            dec("=?iso-8859-1?Q?=E9?= =?utf-8?Q?=C3=A9?="),
            "\u{e9}\u{e9}".as_bytes()
        );
    }

    #[test]
    fn bad_base64_fails() {
        let config = Config::default();
        let e = decode(b"=?utf-8?B?!!!!?= x", &config).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Encoding);

        let mut value = b"ok =?utf-8?Q?=C3=A9?= =?utf-8?B?!!!!?=".to_vec();
        let original = value.clone();
        assert!(decode_in_place(&mut value, &config).is_err());
        assert_eq!(value, original);
    }

    #[test]
    fn charset_aliases_share_a_run() {
        // U+263A split over words labelled with two spellings of UTF-8.
        assert_eq!(dec("=?utf-8?B?4pg=?= =?UTF8?B?ug==?="), "\u{263a}".as_bytes());
    }

    #[test]
    fn control_bytes_are_replaced() {
        assert_eq!(dec("=?utf-8?Q?a=07b?="), b"a?b");
    }

    #[test]
    fn assumed_charset() {
        let config = Config::default().with_assumed_charset("iso-8859-1");
        assert_eq!(
            decode(b"J\xf6rg =?utf-8?Q?=C3=A9?=", &config).unwrap(),
            "J\u{f6}rg \u{e9}".as_bytes()
        );
    }

    #[test]
    fn nothing_to_encode() {
        let config = Config::default();
        let cs = charsets("us-ascii:utf-8");
        assert_eq!(
            encode(b"Smith, John", Some(ADDRESS_SPECIALS), 6, &cs, &config).unwrap(),
            b"Smith, John".to_vec()
        );
        assert_eq!(encode(b"", None, 9, &cs, &config).unwrap(), b"".to_vec());
    }

    #[test]
    fn encode_picks_charset_and_encoding() {
        let config = Config::default();
        let name = "J\u{f6}rg M\u{fc}ller".as_bytes();
        assert_eq!(
            encode(name, Some(ADDRESS_SPECIALS), 8, &config.send_charset, &config).unwrap(),
            b"=?iso-8859-1?Q?J=F6rg_M=FCller?=".to_vec()
        );
        assert_eq!(
            encode(name, Some(ADDRESS_SPECIALS), 8, &charsets("us-ascii:utf-8"), &config).unwrap(),
            b"=?utf-8?B?SsO2cmcgTcO8bGxlcg==?=".to_vec()
        );
    }

    #[test]
    fn encode_budget() {
        let config = Config::default();
        let name = "Customer Support Team \u{d8}\u{e5} Department xx".as_bytes();
        assert_eq!(name.len(), 40);
        let out = encode(name, Some(ADDRESS_SPECIALS), 8, &charsets("us-ascii:utf-8"), &config)
            .unwrap();
        assert_eq!(
            out,
            b"Customer Support Team =?utf-8?B?w5jDpQ==?= Department xx".to_vec()
        );
        assert!(8 + out.len() <= ENCWORD_LEN_MAX);
    }

    #[test]
    fn encode_folds_long_values() {
        let config = Config::default();
        let subject = "Hello w\u{f6}rld, this is a rather long subject line that will need \
                       folding for sure \u{263a} end";
        let out = encode(subject.as_bytes(), None, 9, &config.send_charset, &config).unwrap();
        assert_eq!(
            out,
            b"Hello =?utf-8?Q?w=C3=B6rld=2C_this_is_a_rather_long_subject_line_?=\n\t\
              =?utf-8?Q?that_will_need_folding_for_sure_=E2=98=BA?= end"
                .to_vec()
        );
        let mut lines = out.split(|&ch| ch == b'\n');
        assert!(9 + lines.next().unwrap().len() <= ENCWORD_LEN_MAX + 1);
        assert!(lines.all(|l| l.len() <= ENCWORD_LEN_MAX + 1));
        assert_eq!(decode(&out, &config).unwrap(), subject.as_bytes());
    }

    #[test]
    fn encode_protects_word_starts() {
        let config = Config::default();
        let out = encode(b"a =?b", None, 9, &config.send_charset, &config).unwrap();
        assert_eq!(out, b"a =?us-ascii?B?PT9i?=".to_vec());
        assert_eq!(decode(&out, &config).unwrap(), b"a =?b");
        // Not at a word boundary.
        assert_eq!(
            encode(b"x=?y", None, 9, &config.send_charset, &config).unwrap(),
            b"x=?y".to_vec()
        );
    }

    #[test]
    fn latin1_only_for_latin1_text() {
        let config = Config::default();
        let quoted = "\u{201c}Joe\u{201d}".as_bytes();
        let out = encode(quoted, Some(ADDRESS_SPECIALS), 8, &config.send_charset, &config).unwrap();
        assert_eq!(out, b"=?utf-8?B?4oCcSm9l4oCd?=".to_vec());
        assert_eq!(decode(&out, &config).unwrap(), quoted);

        let price = "Price \u{20ac}5".as_bytes();
        let out = encode(price, None, 9, &config.send_charset, &config).unwrap();
        assert_eq!(out, b"Price =?utf-8?B?4oKsNQ==?=".to_vec());

        // C1 bytes in a real iso-8859-1 word are controls.
        assert_eq!(dec("=?iso-8859-1?Q?=93Joe=94?="), b"?Joe?");
    }

    #[test]
    fn iso_2022_jp_is_always_base64() {
        let config = Config::default();
        let text = "\u{65e5}\u{672c}".as_bytes();
        let out = encode(text, None, 9, &charsets("us-ascii:iso-2022-jp:utf-8"), &config).unwrap();
        assert_eq!(out, b"=?iso-2022-jp?B?GyRCRnxLXBsoQg==?=".to_vec());
        assert_eq!(decode(&out, &config).unwrap(), text);
    }

    #[test]
    fn encode_without_fitting_charset() {
        let config = Config::default();
        let e = encode("\u{263a}".as_bytes(), None, 9, &charsets("iso-8859-1"), &config)
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Charset);

        let out = encode("caf\u{e9}".as_bytes(), None, 9, &charsets("us-ascii"), &config).unwrap();
        assert!(out.starts_with(b"=?unknown-8bit?"));
    }

    #[test]
    fn round_trip() {
        let config = Config::default();
        for text in &[
            "Fran\u{e7}ois \u{201c}Fran\u{7a}\u{201d} Dupont",
            "日本語の件名です、長めの文字列でも大丈夫ですか",
            "plain text",
        ] {
            let encoded = encode(text.as_bytes(), None, 9, &config.send_charset, &config).unwrap();
            assert_eq!(decode(&encoded, &config).unwrap(), text.as_bytes(), "{}", text);
        }
    }

    #[test]
    fn addrlists() {
        let config = Config::default();
        let mut list = AddressList::new();
        list.append(Address::create(
            Some("J\u{f6}rg".as_bytes()),
            Some(&b"j@example.com"[..]),
        ));
        list.append(Address::group_open("Fr\u{e8}res".as_bytes().to_vec()));
        list.append(Address::create(None, Some(&b"a@b.c"[..])));
        list.append(Address::group_close());
        encode_addrlist(&mut list, Some("To"), &config).unwrap();
        assert_eq!(
            list.first().unwrap().personal.as_deref(),
            Some(&b"=?iso-8859-1?Q?J=F6rg?="[..])
        );
        assert_eq!(
            list.get(1).unwrap().mailbox.as_deref(),
            Some(&b"=?iso-8859-1?Q?Fr=E8res?="[..])
        );
        assert_eq!(list.get(2).unwrap().mailbox.as_deref(), Some(&b"a@b.c"[..]));

        decode_addrlist(&mut list, &config);
        assert_eq!(
            list.first().unwrap().personal.as_deref(),
            Some("J\u{f6}rg".as_bytes())
        );
        assert_eq!(
            list.get(1).unwrap().mailbox.as_deref(),
            Some("Fr\u{e8}res".as_bytes())
        );
    }

    #[test]
    fn envelopes() {
        let config = Config::default();
        let mut env = Envelope::new();
        env.set_header("From", "J\u{f6}rg <j@example.com>".as_bytes(), &config)
            .unwrap();
        env.set_header("Return-Path", "J\u{f6}rg <j@example.com>".as_bytes(), &config)
            .unwrap();
        env.set_subject(Some("Re: caf\u{e9}".as_bytes()), &config);
        env.x_label = Some(b"plain".to_vec());
        let original = env.clone();

        encode_envelope(&mut env, &config).unwrap();
        assert_eq!(
            env.from.first().unwrap().personal.as_deref(),
            Some(&b"=?iso-8859-1?Q?J=F6rg?="[..])
        );
        assert_eq!(env.return_path, original.return_path);
        assert_eq!(env.subject(), Some(&b"Re: =?iso-8859-1?Q?caf=E9?="[..]));
        assert_eq!(env.real_subject(), Some(&b"=?iso-8859-1?Q?caf=E9?="[..]));

        decode_envelope(&mut env, &config);
        assert_eq!(env, original);
        assert_eq!(env.real_subject(), Some("caf\u{e9}".as_bytes()));
    }
}
