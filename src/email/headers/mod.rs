use enum_kinds::EnumKind;

use crate::config::Config;
use crate::email::bytes::ByteStr;
use crate::email::error::Result;
use crate::email::parse::address::parse_list;

use self::address::AddressList;

pub mod address;

/// The address-list headers an [`Envelope`] keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressHeader {
    From,
    To,
    Cc,
    Bcc,
    ReplyTo,
    MailFollowupTo,
    ReturnPath,
    Sender,
}

impl AddressHeader {
    pub const ALL: [AddressHeader; 8] = [
        AddressHeader::From,
        AddressHeader::To,
        AddressHeader::Cc,
        AddressHeader::Bcc,
        AddressHeader::ReplyTo,
        AddressHeader::MailFollowupTo,
        AddressHeader::ReturnPath,
        AddressHeader::Sender,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AddressHeader::From => "From",
            AddressHeader::To => "To",
            AddressHeader::Cc => "Cc",
            AddressHeader::Bcc => "Bcc",
            AddressHeader::ReplyTo => "Reply-To",
            AddressHeader::MailFollowupTo => "Mail-Followup-To",
            AddressHeader::ReturnPath => "Return-Path",
            AddressHeader::Sender => "Sender",
        }
    }

    /// Header names are matched ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|h| h.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// A header value as stored in an [`Envelope`].
#[derive(Clone, EnumKind)]
#[enum_kind(HeaderFieldKind)]
pub enum HeaderField<'a> {
    Addresses(AddressHeader, &'a AddressList),
    // "Subject:"
    Subject(&'a [u8]),
    // "X-Label:"
    Label(&'a [u8]),
}

impl std::fmt::Debug for HeaderField<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Addresses(h, list) => write!(f, "{}: {:?}", h.name(), list),
            Self::Subject(s) => write!(f, "Subject: {}", ByteStr::from_slice(s)),
            Self::Label(s) => write!(f, "X-Label: {}", ByteStr::from_slice(s)),
        }
    }
}

/// The headers of a message that carry addresses, plus the subject and
/// label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub from: AddressList,
    pub to: AddressList,
    pub cc: AddressList,
    pub bcc: AddressList,
    pub reply_to: AddressList,
    pub mail_followup_to: AddressList,
    pub return_path: AddressList,
    pub sender: AddressList,
    pub x_label: Option<Vec<u8>>,
    subject: Option<Vec<u8>>,
    // Offset into `subject`.
    real_subject: Option<usize>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addresses(&self, header: AddressHeader) -> &AddressList {
        match header {
            AddressHeader::From => &self.from,
            AddressHeader::To => &self.to,
            AddressHeader::Cc => &self.cc,
            AddressHeader::Bcc => &self.bcc,
            AddressHeader::ReplyTo => &self.reply_to,
            AddressHeader::MailFollowupTo => &self.mail_followup_to,
            AddressHeader::ReturnPath => &self.return_path,
            AddressHeader::Sender => &self.sender,
        }
    }

    pub fn addresses_mut(&mut self, header: AddressHeader) -> &mut AddressList {
        match header {
            AddressHeader::From => &mut self.from,
            AddressHeader::To => &mut self.to,
            AddressHeader::Cc => &mut self.cc,
            AddressHeader::Bcc => &mut self.bcc,
            AddressHeader::ReplyTo => &mut self.reply_to,
            AddressHeader::MailFollowupTo => &mut self.mail_followup_to,
            AddressHeader::ReturnPath => &mut self.return_path,
            AddressHeader::Sender => &mut self.sender,
        }
    }

    pub fn subject(&self) -> Option<&[u8]> {
        self.subject.as_deref()
    }

    /// The subject with any reply prefix stripped. `None` if there is no
    /// subject or the prefix is all there is.
    pub fn real_subject(&self) -> Option<&[u8]> {
        let subject = self.subject.as_deref()?;
        self.real_subject.map(|offset| &subject[offset..])
    }

    /// Sets the subject and works out where the real subject starts, using
    /// `reply_regex`.
    pub fn set_subject(&mut self, subject: Option<&[u8]>, config: &Config) {
        self.subject = subject.map(<[u8]>::to_vec);
        self.real_subject = None;
        let subject = match self.subject.as_deref() {
            Some(s) => s,
            None => return,
        };
        let prefix = match (&config.reply_regex, std::str::from_utf8(subject)) {
            (Some(re), Ok(s)) => re.find(s).map(|m| m.end()),
            _ => None,
        };
        self.real_subject = match prefix {
            Some(end) if end == subject.len() => None,
            Some(end) => Some(end),
            None => Some(0),
        };
    }

    /// Stores the value of header `name`. Address headers are parsed and
    /// appended to. Returns false if the envelope does not keep `name`.
    pub fn set_header(&mut self, name: &str, value: &[u8], config: &Config) -> Result<bool> {
        if let Some(h) = AddressHeader::from_name(name) {
            parse_list(self.addresses_mut(h), value)?;
            return Ok(true);
        }
        if name.trim().eq_ignore_ascii_case("subject") {
            self.set_subject(Some(value), config);
        } else if name.trim().eq_ignore_ascii_case("x-label") {
            self.x_label = Some(value.to_vec());
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    /// Every non-empty header, address lists first.
    pub fn fields(&self) -> Vec<HeaderField<'_>> {
        let mut fields: Vec<HeaderField<'_>> = AddressHeader::ALL
            .iter()
            .map(|&h| (h, self.addresses(h)))
            .filter(|(_, list)| !list.is_empty())
            .map(|(h, list)| HeaderField::Addresses(h, list))
            .collect();
        if let Some(s) = self.subject() {
            fields.push(HeaderField::Subject(s));
        }
        if let Some(l) = self.x_label.as_deref() {
            fields.push(HeaderField::Label(l));
        }
        fields
    }
}
