use std::collections::HashMap;

use log::{debug, trace};
use regex::{Regex, RegexBuilder};

use crate::email::error::{AddressError, Result};
use crate::email::headers::address::AddressList;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatternFlags {
    pub icase: bool,
}

#[derive(Clone, Debug)]
pub struct Pattern {
    text: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(text: &str, flags: PatternFlags) -> Result<Self> {
        let regex = RegexBuilder::new(text)
            .case_insensitive(flags.icase)
            .build()
            .map_err(|source| AddressError::Regex {
                pattern: text.to_string(),
                source,
            })?;
        Ok(Self {
            text: text.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

#[derive(Clone, Debug)]
pub struct Group {
    name: String,
    pub addresses: AddressList,
    pub patterns: Vec<Pattern>,
}

impl Group {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            addresses: AddressList::new(),
            patterns: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.patterns.is_empty()
    }

    /// `candidate` matches a pattern, or equals one of the mailboxes
    /// ignoring case.
    pub fn matches(&self, candidate: &str) -> bool {
        if let Some(p) = self.patterns.iter().find(|p| p.is_match(candidate)) {
            trace!("{} matches {}", candidate, p.as_str());
            return true;
        }
        self.addresses.iter().any(|a| {
            a.mailbox
                .as_deref()
                .map_or(false, |m| m.eq_ignore_ascii_case(candidate.as_bytes()))
        })
    }

    /// Appends copies of the addresses in `list` not already present.
    fn add_addresses(&mut self, list: &AddressList) {
        let mut new = AddressList::new();
        new.copy_from(list, false);
        new.remove_xrefs(&self.addresses);
        self.addresses.extend(new);
    }

    /// Returns false if an identical pattern was already there.
    fn add_pattern(&mut self, pattern: &Pattern) -> bool {
        if self
            .patterns
            .iter()
            .any(|p| p.text.eq_ignore_ascii_case(&pattern.text))
        {
            return false;
        }
        self.patterns.push(pattern.clone());
        true
    }

    /// `*` removes every pattern.
    fn remove_pattern(&mut self, text: &str) -> bool {
        let before = self.patterns.len();
        if text == "*" {
            self.patterns.clear();
        } else {
            self.patterns.retain(|p| p.text != text);
        }
        self.patterns.len() != before
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

/// Every known group, by case-insensitive name.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, Group>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The group called `name`, created empty if it does not exist. The
    /// caller is expected to put something in it.
    pub fn get_or_create(&mut self, name: &str) -> &mut Group {
        self.groups.entry(key(name)).or_insert_with(|| {
            debug!("Creating group {}", name);
            Group::new(name)
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&Group> {
        self.groups.get(&key(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Group> {
        let removed = self.groups.remove(&key(name));
        if removed.is_some() {
            debug!("Removing group {}", name);
        }
        removed
    }

    /// False if there is no such group.
    pub fn matches(&self, name: &str, candidate: &str) -> bool {
        self.lookup(name).map_or(false, |g| g.matches(candidate))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.values().map(Group::name).collect();
        names.sort_unstable();
        names
    }

    /// Drops every group.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    fn remove_if_empty(&mut self, name: &str) {
        if self.lookup(name).map_or(false, Group::is_empty) {
            self.remove(name);
        }
    }
}

/// A set of group names that operations are applied to, in the order the
/// names were added.
#[derive(Clone, Debug, Default)]
pub struct GroupList {
    names: Vec<String>,
}

impl GroupList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding a name twice has no effect.
    pub fn add(&mut self, name: &str) {
        if !self.names.iter().any(|n| key(n) == key(name)) {
            self.names.push(name.to_string());
        }
    }

    /// Forgets the names; the groups themselves are left alone.
    pub fn destroy(&mut self) {
        self.names.clear();
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn add_addresses(&self, registry: &mut GroupRegistry, list: &AddressList) {
        for name in &self.names {
            registry.get_or_create(name).add_addresses(list);
            registry.remove_if_empty(name);
        }
    }

    /// Compiles `pattern` and adds it to every group. Nothing is changed if
    /// it does not compile.
    pub fn add_pattern(
        &self,
        registry: &mut GroupRegistry,
        pattern: &str,
        flags: PatternFlags,
    ) -> Result<()> {
        let pattern = Pattern::new(pattern, flags)?;
        for name in &self.names {
            if !registry.get_or_create(name).add_pattern(&pattern) {
                debug!("Group {} already has pattern {}", name, pattern.as_str());
            }
        }
        Ok(())
    }

    /// Removes every mailbox in `list` from every group.
    pub fn remove_addresses(&self, registry: &mut GroupRegistry, list: &AddressList) {
        for name in &self.names {
            if let Some(group) = registry.groups.get_mut(&key(name)) {
                for mailbox in list.iter().filter_map(|a| a.mailbox.as_deref()) {
                    group.addresses.remove(mailbox);
                }
            }
            registry.remove_if_empty(name);
        }
    }

    /// Removes the pattern written exactly as `pattern` (`*` for all) from
    /// every group. Returns whether any group had it.
    pub fn remove_pattern(&self, registry: &mut GroupRegistry, pattern: &str) -> bool {
        let mut removed = false;
        for name in &self.names {
            if let Some(group) = registry.groups.get_mut(&key(name)) {
                removed |= group.remove_pattern(pattern);
            }
            registry.remove_if_empty(name);
        }
        removed
    }

    /// Deletes every group from the registry and empties the list.
    pub fn clear_groups(&mut self, registry: &mut GroupRegistry) {
        for name in self.names.drain(..) {
            registry.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::error::ErrorKind;

    fn addrs(s: &str) -> AddressList {
        AddressList::parse(s.as_bytes()).unwrap()
    }

    fn handle(names: &[&str]) -> GroupList {
        let mut gl = GroupList::new();
        for n in names {
            gl.add(n);
        }
        gl
    }

    #[test]
    fn handle_dedupes_names() {
        let mut gl = handle(&["work", "Friends", "WORK"]);
        assert_eq!(gl.names(), &["work".to_string(), "Friends".to_string()][..]);
        gl.destroy();
        assert!(gl.is_empty());
    }

    #[test]
    fn addresses_fan_out() {
        let mut reg = GroupRegistry::new();
        let gl = handle(&["work", "friends"]);
        gl.add_addresses(&mut reg, &addrs("a@x.org, Bob <b@y.org>"));
        gl.add_addresses(&mut reg, &addrs("B@Y.org, c@z.org"));
        assert_eq!(reg.names(), vec!["friends", "work"]);

        let work = reg.lookup("WORK").unwrap();
        let mailboxes: Vec<&[u8]> = work
            .addresses
            .iter()
            .filter_map(|a| a.mailbox.as_deref())
            .collect();
        assert_eq!(
            mailboxes,
            vec![&b"a@x.org"[..], &b"b@y.org"[..], &b"c@z.org"[..]]
        );
        assert!(reg.matches("friends", "C@z.org"));
        assert!(!reg.matches("friends", "d@z.org"));
        assert!(!reg.matches("nobody", "a@x.org"));
    }

    #[test]
    fn patterns() {
        let mut reg = GroupRegistry::new();
        let gl = handle(&["lists"]);
        gl.add_pattern(&mut reg, r"@lists\.", PatternFlags::default())
            .unwrap();
        gl.add_pattern(&mut reg, r"@LISTS\.", PatternFlags::default())
            .unwrap();
        assert_eq!(reg.lookup("lists").unwrap().patterns.len(), 1);
        assert!(reg.matches("lists", "dev@lists.example.org"));
        assert!(!reg.matches("lists", "dev@LISTS.example.org"));

        gl.add_pattern(&mut reg, "^root@", PatternFlags { icase: true })
            .unwrap();
        assert!(reg.matches("lists", "ROOT@example.org"));

        let e = gl
            .add_pattern(&mut reg, "(", PatternFlags::default())
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Regex);
        assert_eq!(reg.lookup("lists").unwrap().patterns.len(), 2);
    }

    #[test]
    fn bad_pattern_creates_nothing() {
        let mut reg = GroupRegistry::new();
        let gl = handle(&["a", "b"]);
        assert!(gl
            .add_pattern(&mut reg, "[", PatternFlags::default())
            .is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn empty_groups_are_removed() {
        let mut reg = GroupRegistry::new();
        let gl = handle(&["one", "two"]);
        gl.add_addresses(&mut reg, &addrs("a@x.org"));
        gl.add_pattern(&mut reg, "x", PatternFlags::default()).unwrap();
        let only_two = handle(&["two"]);
        only_two.add_addresses(&mut reg, &addrs("b@x.org"));

        gl.remove_addresses(&mut reg, &addrs("A@X.ORG"));
        assert_eq!(reg.len(), 2);
        assert!(gl.remove_pattern(&mut reg, "*"));
        assert_eq!(reg.names(), vec!["two"]);
        assert!(!gl.remove_pattern(&mut reg, "x"));

        only_two.remove_addresses(&mut reg, &addrs("b@x.org"));
        assert!(reg.is_empty());

        // Nothing to add leaves nothing behind.
        gl.add_addresses(&mut reg, &AddressList::new());
        assert!(reg.is_empty());
    }

    #[test]
    fn clear_groups() {
        let mut reg = GroupRegistry::new();
        let mut gl = handle(&["one", "two"]);
        gl.add_addresses(&mut reg, &addrs("a@x.org"));
        handle(&["three"]).add_addresses(&mut reg, &addrs("c@x.org"));
        gl.clear_groups(&mut reg);
        assert!(gl.is_empty());
        assert_eq!(reg.names(), vec!["three"]);
        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn get_or_create_is_case_insensitive() {
        let mut reg = GroupRegistry::new();
        reg.get_or_create("Team")
            .addresses
            .append(crate::email::headers::address::Address::create(
                None,
                Some(&b"t@x.org"[..]),
            ));
        assert_eq!(reg.get_or_create("TEAM").name(), "Team");
        assert_eq!(reg.len(), 1);
        assert!(reg.remove("team").is_some());
        assert!(reg.lookup("Team").is_none());
    }
}
