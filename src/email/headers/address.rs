use log::debug;

use crate::email::bytes::ByteStr;
use crate::email::error::Result;
use crate::email::parse::address::parse_list;

/// One node of an address list.
///
/// Besides ordinary recipients, a node may be a group header
/// (`group == true`, `mailbox` holds the group name) or a group terminator
/// (`group == true`, nothing else set).
///
/// A `mailbox` starting with `@` is a source route kept from an obsolete
/// `<@host:user@domain>` form; the bare mailbox `@` stands for an empty `<>`.
/// Neither is a deliverable mailbox.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub personal: Option<Vec<u8>>,
    pub mailbox: Option<Vec<u8>>,
    pub group: bool,
    /// The domain is in Punycode form. Only meaningful with `intl_checked`.
    pub is_intl: bool,
    pub intl_checked: bool,
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Address");
        if let Some(p) = &self.personal {
            d.field("personal", &ByteStr::from_slice(p));
        }
        if let Some(m) = &self.mailbox {
            d.field("mailbox", &ByteStr::from_slice(m));
        }
        if self.group {
            d.field("group", &true);
        }
        if self.intl_checked {
            d.field("is_intl", &self.is_intl);
        }
        d.finish()
    }
}

impl Address {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(personal: Option<&[u8]>, mailbox: Option<&[u8]>) -> Self {
        Self {
            personal: personal.map(<[u8]>::to_vec),
            mailbox: mailbox.map(<[u8]>::to_vec),
            ..Self::default()
        }
    }

    pub fn group_open(name: Vec<u8>) -> Self {
        Self {
            mailbox: Some(name),
            group: true,
            ..Self::default()
        }
    }

    pub fn group_close() -> Self {
        Self {
            group: true,
            ..Self::default()
        }
    }

    pub fn is_group_open(&self) -> bool {
        self.group && self.mailbox.is_some()
    }

    pub fn is_group_close(&self) -> bool {
        self.group && self.mailbox.is_none() && self.personal.is_none()
    }

    /// The `@` placeholder produced by `<>`.
    pub fn is_route_sentinel(&self) -> bool {
        self.mailbox.as_deref() == Some(b"@")
    }

    /// The mailbox carries a source route (or is the `@` placeholder).
    pub fn has_route(&self) -> bool {
        self.mailbox
            .as_ref()
            .map_or(false, |m| m.first() == Some(&b'@'))
    }

    /// Case-insensitive mailbox equality. Never true when either side has
    /// no mailbox.
    pub fn cmp_mailbox(&self, other: &Address) -> bool {
        match (&self.mailbox, &other.mailbox) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    pub fn uses_unicode(&self) -> bool {
        self.mailbox.as_ref().map_or(false, |m| !m.is_ascii())
    }

    /// Splits `user@domain`. `None` if there is no `@`, or nothing on
    /// either side of it.
    pub fn split_mailbox(&self) -> Option<(&[u8], &[u8])> {
        let mailbox = self.mailbox.as_deref()?;
        let at = mailbox.iter().position(|ch| *ch == b'@')?;
        if at == 0 || at + 1 == mailbox.len() {
            return None;
        }
        Some((&mailbox[..at], &mailbox[at + 1..]))
    }
}

/// An ordered sequence of addresses, in wire order.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct AddressList {
    addrs: Vec<Address>,
}

impl AddressList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a header value into a new list.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut list = Self::new();
        parse_list(&mut list, input)?;
        Ok(list)
    }

    pub fn append(&mut self, addr: Address) {
        self.addrs.push(addr);
    }

    pub fn prepend(&mut self, addr: Address) {
        self.addrs.insert(0, addr);
    }

    pub fn clear(&mut self) {
        self.addrs.clear();
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.addrs.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Address> {
        self.addrs.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Address> {
        self.addrs.get(index)
    }

    pub fn first(&self) -> Option<&Address> {
        self.addrs.first()
    }

    pub fn last(&self) -> Option<&Address> {
        self.addrs.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Address> {
        self.addrs.last_mut()
    }

    /// Unlinks the node at `index`.
    pub fn take(&mut self, index: usize) -> Option<Address> {
        if index < self.addrs.len() {
            Some(self.addrs.remove(index))
        } else {
            None
        }
    }

    /// Removes every address whose mailbox matches, ignoring case.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, mailbox: &[u8]) -> bool {
        let before = self.addrs.len();
        self.addrs.retain(|a| {
            !a.mailbox
                .as_ref()
                .map_or(false, |m| m.eq_ignore_ascii_case(mailbox))
        });
        self.addrs.len() != before
    }

    /// Appends deep copies of `src`. With `prune`, groups with no members
    /// are left out.
    pub fn copy_from(&mut self, src: &AddressList, prune: bool) {
        let mut iter = src.addrs.iter().peekable();
        while let Some(a) = iter.next() {
            if prune && a.is_group_open() {
                match iter.peek() {
                    Some(next) if next.is_group_close() => {
                        iter.next();
                        continue;
                    }
                    None => continue,
                    _ => {}
                }
            }
            self.addrs.push(a.clone());
        }
    }

    /// Same personal names and mailboxes, byte for byte, in the same order.
    pub fn equal(&self, other: &AddressList) -> bool {
        self.addrs.len() == other.addrs.len()
            && self
                .addrs
                .iter()
                .zip(other.addrs.iter())
                .all(|(a, b)| a.mailbox == b.mailbox && a.personal == b.personal)
    }

    /// Nodes that name a recipient: a mailbox and not a group marker.
    pub fn count_recipients(&self) -> usize {
        self.addrs
            .iter()
            .filter(|a| !a.group && a.mailbox.as_ref().map_or(false, |m| !m.is_empty()))
            .count()
    }

    pub fn search(&self, needle: &Address) -> bool {
        self.addrs.iter().any(|a| needle.cmp_mailbox(a))
    }

    /// Drops later addresses whose mailbox repeats an earlier one.
    pub fn dedupe(&mut self) {
        let mut kept: Vec<Address> = Vec::with_capacity(self.addrs.len());
        for a in self.addrs.drain(..) {
            let repeated = !a.group && kept.iter().any(|k| !k.group && k.cmp_mailbox(&a));
            if repeated {
                debug!(
                    "Removing {}",
                    String::from_utf8_lossy(a.mailbox.as_deref().unwrap_or_default())
                );
                continue;
            }
            kept.push(a);
        }
        self.addrs = kept;
    }

    /// Removes every address that also appears in `reference`.
    pub fn remove_xrefs(&mut self, reference: &AddressList) {
        self.addrs
            .retain(|a| !reference.addrs.iter().any(|r| r.cmp_mailbox(a)));
    }

    /// Appends `@host` to every bare local-part.
    pub fn qualify(&mut self, host: &[u8]) {
        if host.is_empty() {
            return;
        }
        for a in self.addrs.iter_mut().filter(|a| !a.group) {
            if let Some(m) = a.mailbox.as_mut() {
                if !m.contains(&b'@') {
                    m.push(b'@');
                    m.extend_from_slice(host);
                }
            }
        }
    }

    pub fn uses_unicode(&self) -> bool {
        self.addrs.iter().any(|a| !a.group && a.uses_unicode())
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.iter()
    }
}

impl<'a> IntoIterator for &'a mut AddressList {
    type Item = &'a mut Address;
    type IntoIter = std::slice::IterMut<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.iter_mut()
    }
}

impl IntoIterator for AddressList {
    type Item = Address;
    type IntoIter = std::vec::IntoIter<Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.into_iter()
    }
}

impl std::iter::FromIterator<Address> for AddressList {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}

impl Extend<Address> for AddressList {
    fn extend<I: IntoIterator<Item = Address>>(&mut self, iter: I) {
        self.addrs.extend(iter)
    }
}
