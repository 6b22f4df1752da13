pub mod bytes;
pub mod charset;
pub mod error;
pub mod header_layout;
pub mod headers;
pub mod idn;
pub mod parse;
pub mod rfc2047;

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let first_non_ws = bytes
        .iter()
        .position(|ch| !ch.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let last_non_ws = bytes
        .iter()
        .rposition(|ch| !ch.is_ascii_whitespace())
        .map_or(first_non_ws, |i| i + 1);
    &bytes[first_non_ws..last_non_ws.max(first_non_ws)]
}

/// Joins folded header lines: each CRLF or LF followed by whitespace
/// becomes a single space.
pub fn unfold(value: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(value.len());
    for (i, line) in value.split(|&ch| ch == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if i > 0 && line.first().map_or(false, u8::is_ascii_whitespace) {
            result.push(b' ');
            result.extend_from_slice(trim_bytes(line));
        } else {
            result.extend_from_slice(line);
        }
    }
    result
}

/// Splits `Name: value` into its name and trimmed, unfolded value.
pub fn split_header(line: &[u8]) -> Option<(&[u8], Vec<u8>)> {
    let pos = line.iter().position(|&ch| ch == b':')?;
    let name = trim_bytes(&line[..pos]);
    if name.is_empty() || name.iter().any(|ch| ch.is_ascii_whitespace()) {
        return None;
    }
    Some((name, trim_bytes(&unfold(&line[pos + 1..])).to_vec()))
}

#[test]
fn test_unfold() {
    assert_eq!(unfold(b"a@b.c,\r\n\td@e.f"), b"a@b.c, d@e.f".to_vec());
    assert_eq!(unfold(b"one\n   two\n three"), b"one two three".to_vec());
    assert_eq!(unfold(b"plain"), b"plain".to_vec());
}

#[test]
fn test_split_header() {
    let (name, value) = split_header(b"To: Joe <j@k.l>,\r\n  a@b.c  ").unwrap();
    assert_eq!(name, b"To");
    assert_eq!(value, b"Joe <j@k.l>, a@b.c".to_vec());
    assert!(split_header(b"no colon here").is_none());
    assert!(split_header(b"Two words: x").is_none());
    let (_, empty) = split_header(b"Cc:").unwrap();
    assert!(empty.is_empty());
}
