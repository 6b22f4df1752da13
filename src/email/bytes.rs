use memmem::{Searcher, TwoWaySearcher};

/// Borrowed header bytes. Header values are not guaranteed to be UTF-8, so
/// they are kept as raw bytes and only rendered lossily for debugging.
#[repr(transparent)]
#[derive(PartialEq, Eq, Hash)]
pub struct ByteStr(pub [u8]);

impl ByteStr {
    pub fn from_slice(slice: &[u8]) -> &Self {
        // Sound because of `repr(transparent)`.
        unsafe { &*(slice as *const [u8] as *const ByteStr) }
    }
}

impl std::fmt::Debug for ByteStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl std::fmt::Display for ByteStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Space, tab, CR and LF: the whitespace allowed to fold a header value.
pub fn is_email_wsp(ch: u8) -> bool {
    ch == b' ' || ch == b'\t' || ch == b'\r' || ch == b'\n'
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    TwoWaySearcher::new(needle).search_in(haystack)
}

pub fn contains_any(haystack: &[u8], set: &[u8]) -> bool {
    haystack.iter().any(|ch| set.contains(ch))
}
