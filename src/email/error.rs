use enum_kinds::EnumKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AddressError>;

/// Everything that can go wrong while scanning, parsing, converting or
/// grouping addresses. `ErrorKind` is the closed set of categories.
#[derive(Debug, Error, EnumKind)]
#[enum_kind(ErrorKind, derive(Hash))]
pub enum AddressError {
    #[error("unterminated {what} at byte {offset}")]
    Scan { what: &'static str, offset: usize },
    #[error("malformed address list: {0}")]
    Syntax(String),
    #[error("{what} exceeds {max} bytes")]
    Buffer { what: &'static str, max: usize },
    #[error("charset {charset}: {reason}")]
    Charset {
        charset: String,
        reason: &'static str,
    },
    #[error("cannot convert {input}: {reason}")]
    Idn { input: String, reason: String },
    #[error("invalid pattern {pattern}: {source}")]
    Regex {
        pattern: String,
        source: regex::Error,
    },
    #[error("undecodable {encoding}-encoded text: {text}")]
    Encoding { encoding: char, text: String },
}

impl AddressError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }

    pub(crate) fn charset(charset: &str, reason: &'static str) -> Self {
        Self::Charset {
            charset: charset.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let e = AddressError::Scan {
            what: "comment",
            offset: 3,
        };
        assert_eq!(e.kind(), ErrorKind::Scan);
        assert_eq!(e.to_string(), "unterminated comment at byte 3");

        let e = AddressError::charset("klingon", "unknown charset");
        assert_eq!(e.kind(), ErrorKind::Charset);
        assert_eq!(e.to_string(), "charset klingon: unknown charset");
    }

    #[test]
    fn regex_error_has_source() {
        use std::error::Error as _;
        let source = regex::Regex::new("(").unwrap_err();
        let e = AddressError::Regex {
            pattern: "(".to_string(),
            source,
        };
        assert_eq!(e.kind(), ErrorKind::Regex);
        assert!(e.source().is_some());
    }
}
