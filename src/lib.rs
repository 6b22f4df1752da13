//! Email address handling for mail clients: parsing and writing RFC 5322
//! address lists, RFC 2047 encoded-words, internationalised domains, and
//! address-book groups.

pub mod config;
pub mod email;
pub mod group;

pub use config::Config;
pub use email::error::{AddressError, ErrorKind, Result};
pub use email::headers::address::{Address, AddressList};
pub use email::headers::{AddressHeader, Envelope};
pub use group::{GroupList, GroupRegistry, PatternFlags};
