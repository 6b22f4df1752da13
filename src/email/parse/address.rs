use log::debug;
use log::trace;

use super::Scanner;
use super::SpecialMask;
use super::Token;
use super::TokenBuf;

use crate::email::bytes::{contains_any, is_email_wsp};
use crate::email::error::{AddressError, Result};
use crate::email::headers::address::{Address, AddressList};

/// Reads words into `token` and comments into `comment` until a byte in
/// `mask` or the end of input. Whitespace between words is dropped.
fn mailbox_domain(
    s: &mut Scanner<'_>,
    mask: SpecialMask,
    token: &mut TokenBuf,
    comment: &mut TokenBuf,
) -> Result<()> {
    loop {
        s.skip_fws();
        let ch = match s.peek() {
            Some(ch) => ch,
            None => return Ok(()),
        };
        if mask.contains(ch) {
            return Ok(());
        }
        if ch == b'(' {
            if !comment.is_empty() {
                comment.push(b' ');
            }
            s.next_token_into(comment)?;
        } else {
            s.next_token_into(token)?;
        }
    }
}

/// `local-part [ "@" domain ]`. A pending comment becomes the personal name
/// if the address has none yet.
fn address(
    s: &mut Scanner<'_>,
    token: &mut TokenBuf,
    comment: &mut TokenBuf,
    addr: &mut Address,
) -> Result<()> {
    mailbox_domain(s, SpecialMask::USER, token, comment)?;
    if s.peek() == Some(b'@') {
        s.bump();
        token.push(b'@');
        mailbox_domain(s, SpecialMask::DOMAIN, token, comment)?;
    }
    token.check("mailbox")?;
    comment.check("comment")?;

    if !token.is_empty() {
        addr.mailbox = Some(token.as_bytes().to_vec());
    }
    if !comment.is_empty() && addr.personal.is_none() {
        addr.personal = Some(comment.as_bytes().to_vec());
    }
    Ok(())
}

/// Parses what follows a `<`, up to and including the matching `>`.
///
/// An obsolete source route keeps only its first hop, so
/// `<@a.b,@c.d:e@f.g>` yields the mailbox `@a.b:e@f.g`. An empty `<>`
/// yields the sentinel mailbox `@` (see [`Address::is_route_sentinel`]).
fn route_addr(s: &mut Scanner<'_>, comment: &mut TokenBuf, addr: &mut Address) -> Result<()> {
    let mut token = TokenBuf::default();

    s.skip_fws();
    if s.peek() == Some(b'@') {
        let mut hops = 0;
        while s.peek() == Some(b'@') {
            s.bump();
            let mut hop = TokenBuf::default();
            mailbox_domain(s, SpecialMask::ROUTE, &mut hop, comment)?;
            let host = hop.as_bytes();
            let host = host.strip_suffix(b",").unwrap_or(host);
            if host.is_empty() {
                return Err(AddressError::Syntax(format!(
                    "empty route hop at byte {}",
                    s.offset()
                )));
            }
            if hops == 0 {
                token.push(b'@');
                token.extend(host);
            } else {
                trace!("Dropping route hop @{}", String::from_utf8_lossy(host));
            }
            hops += 1;
        }
        if s.peek() != Some(b':') {
            return Err(AddressError::Syntax(format!(
                "route not terminated by ':' at byte {}",
                s.offset()
            )));
        }
        s.bump();
        token.push(b':');
    }

    address(s, &mut token, comment, addr)?;

    if s.peek() != Some(b'>') {
        return Err(AddressError::Syntax(format!(
            "expected '>' at byte {}",
            s.offset()
        )));
    }
    s.bump();

    if addr.mailbox.is_none() {
        addr.mailbox = Some(b"@".to_vec());
    }
    Ok(())
}

/// A bare addr-spec, as accumulated in the phrase buffer. `None` when the
/// bytes do not form one.
fn addr_spec(phrase: &[u8], comment: &mut TokenBuf) -> Option<Address> {
    let mut s = Scanner::new(phrase);
    let mut token = TokenBuf::default();
    let mut addr = Address::new();
    if let Err(e) = address(&mut s, &mut token, comment, &mut addr) {
        debug!("Skipping {:?}: {}", String::from_utf8_lossy(phrase), e);
        return None;
    }
    match s.peek() {
        None | Some(b',') | Some(b';') => {}
        Some(_) => {
            debug!(
                "Skipping {:?}: trailing garbage",
                String::from_utf8_lossy(phrase)
            );
            return None;
        }
    }
    if addr.mailbox.is_none() && addr.personal.is_none() {
        return None;
    }
    Some(addr)
}

fn attach_comment(list: &mut AddressList, comment: &TokenBuf) {
    if let Some(last) = list.last_mut() {
        let has_personal = last.personal.as_ref().map_or(false, |p| !p.is_empty());
        let has_mailbox = last.mailbox.as_ref().map_or(false, |m| !m.is_empty());
        if !last.group && !has_personal && has_mailbox {
            last.personal = Some(comment.as_bytes().to_vec());
        }
    }
}

struct ListParser<'a> {
    s: Scanner<'a>,
    phrase: TokenBuf,
    comment: TokenBuf,
    in_group: bool,
    parsed: usize,
}

impl<'a> ListParser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            s: Scanner::new(input),
            phrase: TokenBuf::default(),
            comment: TokenBuf::default(),
            in_group: false,
            parsed: 0,
        }
    }

    fn reset(&mut self) {
        self.phrase.clear();
        self.comment.clear();
    }

    fn flush_phrase(&mut self, list: &mut AddressList) -> Result<()> {
        self.phrase.check("phrase")?;
        self.comment.check("comment")?;
        if let Some(addr) = addr_spec(self.phrase.as_bytes(), &mut self.comment) {
            list.append(addr);
            self.parsed += 1;
        }
        Ok(())
    }

    fn separator(&mut self, ch: u8, list: &mut AddressList) -> Result<()> {
        if !self.phrase.is_empty() {
            self.flush_phrase(list)?;
        } else if !self.comment.is_empty() {
            self.comment.check("comment")?;
            attach_comment(list, &self.comment);
        }
        if ch == b';' && self.in_group {
            list.append(Address::group_close());
            self.in_group = false;
        }
        self.reset();
        self.s.bump();
        Ok(())
    }

    fn group_open(&mut self, list: &mut AddressList) -> Result<()> {
        if self.in_group {
            return Err(AddressError::Syntax(format!(
                "nested group at byte {}",
                self.s.offset()
            )));
        }
        self.phrase.check("group name")?;
        list.append(Address::group_open(self.phrase.take()));
        self.in_group = true;
        self.reset();
        self.s.bump();
        Ok(())
    }

    fn angle_addr(&mut self, list: &mut AddressList) -> Result<()> {
        self.phrase.check("phrase")?;
        let mut addr = Address::new();
        if !self.phrase.is_empty() {
            addr.personal = Some(self.phrase.take());
        }
        self.s.bump();
        route_addr(&mut self.s, &mut self.comment, &mut addr)?;
        list.append(addr);
        self.parsed += 1;
        self.reset();
        Ok(())
    }

    fn word(&mut self, ch: u8) -> Result<()> {
        if !self.phrase.is_empty() && self.s.ws_pending() {
            self.phrase.push(b' ');
        }
        if ch == b'\\' {
            self.s.bump();
            if let Some(escaped) = self.s.bump() {
                self.phrase.push(escaped);
            }
        }
        match self.s.peek() {
            Some(ch) if !is_email_wsp(ch) => {
                let tok = self.s.next_token()?;
                self.phrase.extend(tok.bytes());
            }
            _ => {}
        }
        Ok(())
    }

    fn run(&mut self, list: &mut AddressList) -> Result<usize> {
        self.s.skip_fws();
        while let Some(ch) = self.s.peek() {
            match ch {
                b',' | b';' => self.separator(ch, list)?,
                b'(' => {
                    if !self.comment.is_empty() {
                        self.comment.push(b' ');
                    }
                    if let Token::Comment(c) = self.s.next_token()? {
                        self.comment.extend(&c);
                    }
                }
                b'"' => {
                    if !self.phrase.is_empty() {
                        self.phrase.push(b' ');
                    }
                    if let Token::Quoted(q) = self.s.next_token()? {
                        self.phrase.extend(&q);
                    }
                }
                b':' => self.group_open(list)?,
                b'<' => self.angle_addr(list)?,
                _ => self.word(ch)?,
            }
            self.s.skip_fws();
        }

        if !self.phrase.is_empty() {
            self.flush_phrase(list)?;
        } else if !self.comment.is_empty() {
            self.comment.check("comment")?;
            attach_comment(list, &self.comment);
        }
        if self.in_group {
            list.append(Address::group_close());
            self.in_group = false;
        }
        Ok(self.parsed)
    }
}

/// Parses an address-list header value, appending to `list`.
///
/// Returns the number of addresses recognised; group markers are not
/// counted. On error the whole of `list` is cleared.
pub fn parse_list(list: &mut AddressList, input: &[u8]) -> Result<usize> {
    let mut parser = ListParser::new(input);
    match parser.run(list) {
        Ok(n) => Ok(n),
        Err(e) => {
            debug!("Address list rejected: {}", e);
            list.clear();
            Err(e)
        }
    }
}

/// Like [`parse_list`], but a value with none of `"<>():;,\` in it is taken
/// as a whitespace-separated list of bare addresses.
pub fn parse_list2(list: &mut AddressList, input: &[u8]) -> Result<usize> {
    if input.is_empty() {
        return Ok(0);
    }
    if contains_any(input, b"\"<>():;,\\") {
        return parse_list(list, input);
    }
    let mut parsed = 0;
    for word in input
        .split(|ch| *ch == b' ' || *ch == b'\t')
        .filter(|w| !w.is_empty())
    {
        parsed += parse_list(list, word)?;
    }
    Ok(parsed)
}

/// A rough Message-ID check: `<...@...>`, at least five bytes, ASCII only.
pub fn valid_msgid(msgid: &[u8]) -> bool {
    msgid.len() >= 5
        && msgid.first() == Some(&b'<')
        && msgid.last() == Some(&b'>')
        && msgid.contains(&b'@')
        && msgid.is_ascii()
}
