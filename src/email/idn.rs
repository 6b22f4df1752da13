use log::debug;

use crate::config::Config;
use crate::email::charset::{convert, ConvertMode};
use crate::email::error::{AddressError, Result};
use crate::email::headers::address::{Address, AddressList};

fn idn_error(input: &[u8], reason: impl std::fmt::Display) -> AddressError {
    AddressError::Idn {
        input: String::from_utf8_lossy(input).into_owned(),
        reason: reason.to_string(),
    }
}

/// Some label of `domain` is Punycode.
pub fn check_idn(domain: &[u8]) -> bool {
    domain
        .split(|ch| *ch == b'.')
        .any(|label| label.len() >= 4 && label[..4].eq_ignore_ascii_case(b"xn--"))
}

pub fn to_ascii(domain: &[u8]) -> Result<Vec<u8>> {
    let s = std::str::from_utf8(domain).map_err(|e| idn_error(domain, e))?;
    idna::domain_to_ascii(s)
        .map(String::into_bytes)
        .map_err(|e| idn_error(domain, e))
}

pub fn to_unicode(domain: &[u8]) -> Result<Vec<u8>> {
    let s = std::str::from_utf8(domain).map_err(|e| idn_error(domain, e))?;
    let (unicode, status) = idna::domain_to_unicode(s);
    status.map_err(|e| idn_error(domain, e))?;
    Ok(unicode.into_bytes())
}

fn join(user: &[u8], domain: &[u8]) -> Vec<u8> {
    let mut mailbox = Vec::with_capacity(user.len() + domain.len() + 1);
    mailbox.extend_from_slice(user);
    mailbox.push(b'@');
    mailbox.extend_from_slice(domain);
    mailbox
}

/// `user` and `domain` are in the local charset. Both are converted to
/// UTF-8 and, if `idn_encode` is set, a non-ASCII domain is Punycoded.
pub fn local_to_intl(user: &[u8], domain: &[u8], config: &Config) -> Result<Vec<u8>> {
    let intl_user = convert(user, &config.charset, "utf-8", ConvertMode::Strict)?;
    let mut intl_domain = convert(domain, &config.charset, "utf-8", ConvertMode::Strict)?;
    if config.idn_encode && !intl_domain.is_ascii() {
        intl_domain = to_ascii(&intl_domain)?;
    }
    Ok(join(&intl_user, &intl_domain))
}

/// The inverse of [`local_to_intl`]. Unless `may_be_irreversible`, the
/// result is converted back and must match the input (ignoring case).
pub fn intl_to_local(
    user: &[u8],
    domain: &[u8],
    config: &Config,
    may_be_irreversible: bool,
) -> Result<Vec<u8>> {
    let is_idn = check_idn(domain) && config.idn_decode;
    let mut local_domain = domain.to_vec();
    if is_idn {
        local_domain = to_unicode(&local_domain)?;
    }
    let local_user = convert(user, "utf-8", &config.charset, ConvertMode::Strict)?;
    let local_domain = convert(&local_domain, "utf-8", &config.charset, ConvertMode::Strict)?;

    if !may_be_irreversible {
        let reversed_user = convert(&local_user, &config.charset, "utf-8", ConvertMode::Strict)?;
        if !reversed_user.eq_ignore_ascii_case(user) {
            debug!(
                "Not reversible. orig = '{}', reversed = '{}'",
                String::from_utf8_lossy(user),
                String::from_utf8_lossy(&reversed_user)
            );
            return Err(idn_error(user, "user name does not survive a round trip"));
        }
        let mut reversed_domain =
            convert(&local_domain, &config.charset, "utf-8", ConvertMode::Strict)?;
        if is_idn {
            reversed_domain = to_ascii(&reversed_domain)?;
        }
        if !reversed_domain.eq_ignore_ascii_case(domain) {
            debug!(
                "Not reversible. orig = '{}', reversed = '{}'",
                String::from_utf8_lossy(domain),
                String::from_utf8_lossy(&reversed_domain)
            );
            return Err(idn_error(domain, "domain does not survive a round trip"));
        }
    }

    Ok(join(&local_user, &local_domain))
}

fn is_intl_form(a: &Address) -> bool {
    a.intl_checked && a.is_intl
}

fn is_local_form(a: &Address) -> bool {
    a.intl_checked && !a.is_intl
}

/// Converts the mailbox to its wire form. Mailboxes without a domain are
/// left alone.
pub fn addr_to_intl(a: &mut Address, config: &Config) -> Result<()> {
    if is_intl_form(a) {
        return Ok(());
    }
    let intl = match a.split_mailbox() {
        Some((user, domain)) => local_to_intl(user, domain, config)?,
        None => return Ok(()),
    };
    a.mailbox = Some(intl);
    a.intl_checked = true;
    a.is_intl = true;
    Ok(())
}

/// Converts the mailbox to its display form, keeping it unchanged if that
/// cannot be done reversibly.
pub fn addr_to_local(a: &mut Address, config: &Config) -> Result<()> {
    if is_local_form(a) {
        return Ok(());
    }
    let local = match a.split_mailbox() {
        Some((user, domain)) => intl_to_local(user, domain, config, false)?,
        None => return Ok(()),
    };
    a.mailbox = Some(local);
    a.intl_checked = true;
    a.is_intl = false;
    Ok(())
}

/// Converts every mailbox in the list. Failures do not stop the walk; the
/// first one is returned, naming the mailbox that failed.
pub fn addrlist_to_intl(list: &mut AddressList, config: &Config) -> Result<()> {
    let mut first_err = None;
    for a in list.iter_mut().filter(|a| a.mailbox.is_some()) {
        if let Err(e) = addr_to_intl(a, config) {
            debug!("Cannot convert {:?}: {}", a, e);
            if first_err.is_none() {
                first_err = Some(match e {
                    AddressError::Idn { reason, .. } => {
                        idn_error(a.mailbox.as_deref().unwrap_or_default(), reason)
                    }
                    other => other,
                });
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub fn addrlist_to_local(list: &mut AddressList, config: &Config) {
    for a in list.iter_mut() {
        if let Err(e) = addr_to_local(a, config) {
            debug!("Keeping {:?}: {}", a, e);
        }
    }
}

/// The mailbox as it should be shown to the user. The conversion need not
/// be reversible; if it fails the stored mailbox is returned.
pub fn for_display(a: &Address, config: &Config) -> Option<Vec<u8>> {
    let mailbox = a.mailbox.as_ref()?;
    if is_local_form(a) {
        return Some(mailbox.clone());
    }
    let converted = a
        .split_mailbox()
        .and_then(|(user, domain)| intl_to_local(user, domain, config, true).ok());
    Some(converted.unwrap_or_else(|| mailbox.clone()))
}

/// Local form, lowercased, then back to the wire form.
pub fn normalise(a: &mut Address, config: &Config) -> Result<()> {
    if let Err(e) = addr_to_local(a, config) {
        debug!("Normalising {:?} without local form: {}", a, e);
    }
    if let Some(m) = a.mailbox.as_mut() {
        m.make_ascii_lowercase();
    }
    a.intl_checked = false;
    addr_to_intl(a, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::error::ErrorKind;

    fn addr(mailbox: &str) -> Address {
        Address::create(None, Some(mailbox.as_bytes()))
    }

    #[test]
    fn punycode_labels() {
        assert!(check_idn(b"xn--p1ai"));
        assert!(check_idn(b"mail.XN--80akhbyknj4f.ru"));
        assert!(!check_idn(b"example.com"));
        assert!(!check_idn(b"axn--b.com"));
    }

    #[test]
    fn display_form() {
        let config = Config::default();
        let a = addr("user@xn--80akhbyknj4f.xn--p1ai");
        assert_eq!(
            for_display(&a, &config).unwrap(),
            "user@испытание.рф".as_bytes()
        );
        let config = config.with_idn(false, true);
        assert_eq!(
            for_display(&a, &config).unwrap(),
            b"user@xn--80akhbyknj4f.xn--p1ai".to_vec()
        );
        assert_eq!(for_display(&Address::group_close(), &config), None);
    }

    #[test]
    fn round_trip() {
        let config = Config::default();
        let mut a = addr("user@испытание.рф");
        addr_to_intl(&mut a, &config).unwrap();
        assert_eq!(a.mailbox.as_deref(), Some(&b"user@xn--80akhbyknj4f.xn--p1ai"[..]));
        assert!(a.intl_checked && a.is_intl);
        // Already in wire form.
        addr_to_intl(&mut a, &config).unwrap();

        addr_to_local(&mut a, &config).unwrap();
        assert_eq!(a.mailbox.as_deref(), Some("user@испытание.рф".as_bytes()));
        assert!(a.intl_checked && !a.is_intl);
    }

    #[test]
    fn ascii_domains_untouched() {
        let config = Config::default();
        let mut a = addr("User@Example.COM");
        addr_to_intl(&mut a, &config).unwrap();
        assert_eq!(a.mailbox.as_deref(), Some(&b"User@Example.COM"[..]));
        let mut bare = addr("postmaster");
        addr_to_intl(&mut bare, &config).unwrap();
        assert!(!bare.intl_checked);
    }

    #[test]
    fn irreversible_local_form_is_refused() {
        // The user name cannot be represented in us-ascii.
        let config = Config::default().with_charset("us-ascii");
        let mut a = addr("j\u{f6}rg@xn--p1ai");
        let e = addr_to_local(&mut a, &config).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Charset);
        assert_eq!(a.mailbox.as_deref(), Some("j\u{f6}rg@xn--p1ai".as_bytes()));
    }

    #[test]
    fn list_reports_first_failure() {
        let config = Config::default();
        let mut list =
            AddressList::parse("a@испытание.рф, c@bad\u{ffff}.com, d@b\u{ffff}d.org".as_bytes())
                .unwrap();
        let e = addrlist_to_intl(&mut list, &config).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Idn);
        assert!(e.to_string().contains("c@bad"));
        assert!(list.first().unwrap().is_intl);
        assert!(!list.get(1).unwrap().intl_checked);

        addrlist_to_local(&mut list, &config);
        assert_eq!(
            list.first().unwrap().mailbox.as_deref(),
            Some("a@испытание.рф".as_bytes())
        );
    }

    #[test]
    fn normalise_lowercases() {
        let config = Config::default();
        let mut a = addr("Joe@XN--80AKHBYKNJ4F.XN--P1AI");
        normalise(&mut a, &config).unwrap();
        assert_eq!(a.mailbox.as_deref(), Some(&b"joe@xn--80akhbyknj4f.xn--p1ai"[..]));
        assert!(a.is_intl);
    }
}
