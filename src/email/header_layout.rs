use itertools::Itertools;

use crate::config::Config;
use crate::email::error::{AddressError, Result};
use crate::email::headers::address::{Address, AddressList};
use crate::email::idn::for_display;
use crate::email::parse::ADDRESS_SPECIALS;

/// Column `write_list_wrap` folds at.
pub const WRAP_COLUMN: usize = 74;
/// Column a continuation line is taken to start at.
const CONTINUATION_COLUMN: usize = 8;

/// `value` as is, or quoted with `"` and `\` escaped if it contains any of
/// `specials`.
pub fn quote_if_special(value: &[u8], specials: &[u8]) -> Vec<u8> {
    if !value.iter().any(|ch| specials.contains(ch)) {
        return value.to_vec();
    }
    let mut out = Vec::with_capacity(value.len() + 2);
    out.push(b'"');
    for &ch in value {
        if ch == b'"' || ch == b'\\' {
            out.push(b'\\');
        }
        out.push(ch);
    }
    out.push(b'"');
    out
}

/// One address. With `display`, the mailbox is shown in its local form even
/// if that cannot be converted back.
pub fn write_address(a: &Address, display: bool, config: &Config) -> Vec<u8> {
    let mut out = vec![];
    if a.is_group_close() {
        out.push(b';');
        return out;
    }
    if let Some(personal) = &a.personal {
        out.extend(quote_if_special(personal, ADDRESS_SPECIALS));
        out.push(b' ');
    }
    let mailbox = match &a.mailbox {
        Some(m) => m,
        None => return out,
    };
    if a.group {
        out.extend(quote_if_special(mailbox, ADDRESS_SPECIALS));
        out.extend_from_slice(b": ");
        return out;
    }
    let angle = a.personal.is_some() || a.has_route();
    if angle {
        out.push(b'<');
    }
    if !a.is_route_sentinel() {
        match display.then(|| for_display(a, config)).flatten() {
            Some(shown) => out.extend(shown),
            None => out.extend_from_slice(mailbox),
        }
    }
    if angle {
        out.push(b'>');
    }
    out
}

/// Whether `a` is followed by `, ` when `next` comes after it.
fn needs_separator(a: &Address, next: Option<&Address>) -> bool {
    !a.is_group_open() && next.map_or(false, |n| !n.is_group_close())
}

fn write_list_inner(
    list: &AddressList,
    display: bool,
    header: Option<&str>,
    wrap: Option<usize>,
    config: &Config,
) -> Vec<u8> {
    let mut out = vec![];
    if list.is_empty() {
        return out;
    }
    if let Some(header) = header {
        out.extend(format!("{}: ", header).into_bytes());
    }
    let mut col = out.len();
    for (i, (a, next)) in list
        .iter()
        .map(Some)
        .chain(std::iter::once(None))
        .tuple_windows()
        .filter_map(|(a, next)| a.map(|a| (a, next)))
        .enumerate()
    {
        let text = write_address(a, display, config);
        col += text.len();
        if let Some(max) = wrap {
            if col > max && i > 0 {
                out.extend_from_slice(b"\n\t");
                col = CONTINUATION_COLUMN + text.len();
            }
        }
        out.extend(text);
        if needs_separator(a, next) {
            out.extend_from_slice(b", ");
            col += 2;
        }
    }
    out
}

/// The whole list on one line.
pub fn write_list(list: &AddressList, display: bool, config: &Config) -> Vec<u8> {
    write_list_inner(list, display, None, None, config)
}

/// The list as it goes into an outgoing message: prefixed with `header: `
/// if given, and folded before any address that would pass column 74, or
/// `wrap_headers` if that is narrower.
pub fn write_list_wrap(list: &AddressList, header: Option<&str>, config: &Config) -> Vec<u8> {
    let wrap = WRAP_COLUMN.min(config.wrap_headers);
    write_list_inner(list, false, header, Some(wrap), config)
}

/// Like [`write_list`], into a caller-provided buffer. Returns the number
/// of bytes written.
pub fn write_list_into(
    list: &AddressList,
    display: bool,
    config: &Config,
    buf: &mut [u8],
) -> Result<usize> {
    let text = write_list(list, display, config);
    if text.len() > buf.len() {
        return Err(AddressError::Buffer {
            what: "address list",
            max: buf.len(),
        });
    }
    buf[..text.len()].copy_from_slice(&text);
    Ok(text.len())
}

/// Each address in display form, one entry per address. Group terminators
/// are skipped.
pub fn write_list_to_vec(list: &AddressList, config: &Config) -> Vec<Vec<u8>> {
    list.iter()
        .filter(|a| !a.is_group_close())
        .map(|a| write_address(a, true, config))
        .filter(|text| !text.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::error::ErrorKind;

    fn list(s: &str) -> AddressList {
        AddressList::parse(s.as_bytes()).unwrap()
    }

    fn written(s: &str) -> String {
        let config = Config::default();
        String::from_utf8(write_list(&list(s), false, &config)).unwrap()
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_if_special(b"Joe", ADDRESS_SPECIALS), b"Joe".to_vec());
        assert_eq!(quote_if_special(b"Q, R", ADDRESS_SPECIALS), b"\"Q, R\"".to_vec());
        assert_eq!(
            quote_if_special(br#"a "b" \c."#, ADDRESS_SPECIALS),
            br#""a \"b\" \\c.""#.to_vec()
        );
    }

    #[test]
    fn single_addresses() {
        let config = Config::default();
        let a = Address::create(Some(&b"Joe"[..]), Some(&b"j@k.l"[..]));
        assert_eq!(write_address(&a, false, &config), b"Joe <j@k.l>".to_vec());
        let bare = Address::create(None, Some(&b"a@b.c"[..]));
        assert_eq!(write_address(&bare, false, &config), b"a@b.c".to_vec());
        let empty = Address::create(None, Some(&b"@"[..]));
        assert_eq!(write_address(&empty, false, &config), b"<>".to_vec());
        assert_eq!(
            write_address(&Address::group_open(b"team".to_vec()), false, &config),
            b"team: ".to_vec()
        );
        assert_eq!(write_address(&Address::group_close(), false, &config), b";".to_vec());
        assert!(write_address(&Address::new(), false, &config).is_empty());
    }

    #[test]
    fn lists() {
        assert_eq!(
            written(r#"a@b.c, Joe <j@k.l>, "Q, R" <q@r.s>"#),
            r#"a@b.c, Joe <j@k.l>, "Q, R" <q@r.s>"#
        );
        assert_eq!(
            written("friends: alice@x (work (old)), bob@y;"),
            r#"friends: "work (old)" <alice@x>, bob@y;"#
        );
        assert_eq!(
            written("undisclosed-recipients:; x@y"),
            "undisclosed-recipients: ;, x@y"
        );
        assert_eq!(written("<@a.b,@c.d:e@f.g>"), "<@a.b:e@f.g>");
        assert_eq!(written(""), "");
    }

    #[test]
    fn display_form() {
        let config = Config::default();
        let l = list("Ivan <user@xn--80akhbyknj4f.xn--p1ai>");
        assert_eq!(
            write_list(&l, true, &config),
            "Ivan <user@испытание.рф>".as_bytes().to_vec()
        );
        assert_eq!(
            write_list(&l, false, &config),
            b"Ivan <user@xn--80akhbyknj4f.xn--p1ai>".to_vec()
        );
    }

    #[test]
    fn wrapping() {
        let config = Config::default();
        let l: AddressList = (0..8)
            .map(|i| {
                let mailbox = format!("recipient{}@example.com", i);
                Address::create(None, Some(mailbox.as_bytes()))
            })
            .collect();
        let out = String::from_utf8(write_list_wrap(&l, Some("To"), &config)).unwrap();
        assert!(out.starts_with("To: recipient0@example.com, "));
        let lines: Vec<&str> = out.split('\n').collect();
        assert!(lines.len() > 1);
        for line in &lines[1..] {
            assert!(line.starts_with('\t'));
        }
        // Only the trailing separator may pass the fold column.
        for line in &lines {
            assert!(line.trim_end().trim_end_matches(',').len() <= WRAP_COLUMN);
        }
        // Unfolding gives the unwrapped list back.
        let unfolded = out.replace("\n\t", "");
        assert_eq!(
            unfolded["To: ".len()..].as_bytes(),
            &write_list(&l, false, &config)[..]
        );

        let narrow = Config::default().with_wrap_headers(40);
        let out = String::from_utf8(write_list_wrap(&l, Some("To"), &narrow)).unwrap();
        assert_eq!(out.split('\n').count(), 8);
    }

    #[test]
    fn into_buffer() {
        let config = Config::default();
        let l = list("a@b.c, d@e.f");
        let mut buf = [0u8; 64];
        let n = write_list_into(&l, false, &config, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"a@b.c, d@e.f");
        let mut small = [0u8; 4];
        let e = write_list_into(&l, false, &config, &mut small).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Buffer);
    }

    #[test]
    fn per_address_strings() {
        let config = Config::default();
        let l = list("team: a@b.c, Joe <j@k.l>;");
        let v: Vec<String> = write_list_to_vec(&l, &config)
            .into_iter()
            .map(|t| String::from_utf8(t).unwrap())
            .collect();
        assert_eq!(v, vec!["team: ", "a@b.c", "Joe <j@k.l>"]);
    }
}
