//! IMAP message flags
//!
//! System flags have dedicated variants; arbitrary keywords use
//! [`Flag::Keyword`]. Flags serialize as their IMAP wire form so a
//! listing reports `["\\Seen", "$Important"]`.

use serde::{Serialize, Serializer};
use std::fmt;

/// An IMAP message flag.
///
/// # Examples
///
/// ```
/// use mailbox_rpc::Flag;
///
/// assert_eq!(Flag::Seen.as_imap_str(), "\\Seen");
/// assert_eq!(Flag::from("\\flagged"), Flag::Flagged);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Read (`\Seen`).
    Seen,
    /// Replied to (`\Answered`).
    Answered,
    /// Marked for follow-up (`\Flagged`).
    Flagged,
    /// Awaiting expunge (`\Deleted`).
    Deleted,
    /// Not yet sent (`\Draft`).
    Draft,
    /// Session-only `\Recent`; reported, never stored.
    Recent,
    /// A user-defined keyword flag (no `\` prefix).
    Keyword(String),
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub fn as_imap_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(kw) => kw,
        }
    }

    /// Convert a flag reported by `async-imap`.
    #[must_use]
    pub fn from_imap(flag: &async_imap::types::Flag<'_>) -> Self {
        use async_imap::types::Flag as Imap;
        match flag {
            Imap::Seen => Self::Seen,
            Imap::Answered => Self::Answered,
            Imap::Flagged => Self::Flagged,
            Imap::Deleted => Self::Deleted,
            Imap::Draft => Self::Draft,
            Imap::Recent => Self::Recent,
            Imap::MayCreate => Self::Keyword("\\*".to_string()),
            Imap::Custom(kw) => Self::Keyword(kw.to_string()),
        }
    }
}

impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "\\seen" => Self::Seen,
            "\\answered" => Self::Answered,
            "\\flagged" => Self::Flagged,
            "\\deleted" => Self::Deleted,
            "\\draft" => Self::Draft,
            "\\recent" => Self::Recent,
            _ => Self::Keyword(s.to_string()),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_imap_str())
    }
}
