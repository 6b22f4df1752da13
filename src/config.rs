use regex::{Regex, RegexBuilder};

use crate::email::error::{AddressError, Result};

pub const DEFAULT_REPLY_REGEX: &str = r"^((re|aw|sv)(\[[0-9]+\])*:[ \t]*)*";

/// The configuration options the address code consults. Read-only while an
/// operation runs; callers hand it to each entry point.
#[derive(Clone, Debug)]
pub struct Config {
    /// Local display charset.
    pub charset: String,
    /// Candidate charsets for outgoing encoded-words, in order of preference.
    pub send_charset: Vec<String>,
    /// Charsets to try for header text that carries no MIME label.
    pub assumed_charset: Vec<String>,
    /// Show Punycode domains in their Unicode form.
    pub idn_decode: bool,
    /// Send Unicode domains in Punycode form.
    pub idn_encode: bool,
    pub wrap_headers: usize,
    /// Matched against a subject to find where the real subject starts.
    pub reply_regex: Option<Regex>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            charset: "utf-8".to_string(),
            send_charset: Self::parse_charset_list("us-ascii:iso-8859-1:utf-8"),
            assumed_charset: vec![],
            idn_decode: true,
            idn_encode: true,
            wrap_headers: 78,
            reply_regex: compile_reply_regex(DEFAULT_REPLY_REGEX).ok(),
        }
    }
}

fn compile_reply_regex(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| AddressError::Regex {
            pattern: pattern.to_string(),
            source,
        })
}

impl Config {
    /// Splits a colon-separated list, skipping empty entries.
    pub fn parse_charset_list(list: &str) -> Vec<String> {
        list.split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = charset.to_string();
        self
    }

    pub fn with_send_charset(mut self, list: &str) -> Self {
        self.send_charset = Self::parse_charset_list(list);
        self
    }

    pub fn with_assumed_charset(mut self, list: &str) -> Self {
        self.assumed_charset = Self::parse_charset_list(list);
        self
    }

    pub fn with_idn(mut self, decode: bool, encode: bool) -> Self {
        self.idn_decode = decode;
        self.idn_encode = encode;
        self
    }

    pub fn with_wrap_headers(mut self, column: usize) -> Self {
        self.wrap_headers = column;
        self
    }

    /// An empty pattern disables subject stripping.
    pub fn set_reply_regex(&mut self, pattern: &str) -> Result<()> {
        self.reply_regex = if pattern.is_empty() {
            None
        } else {
            Some(compile_reply_regex(pattern)?)
        };
        Ok(())
    }
}
