//! Mailbox folder names
//!
//! Requests name folders with plain strings. [`Folder`] keeps the well
//! known ones apart so listings can report a role for them, and
//! serializes back to the plain IMAP name.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An IMAP mailbox folder.
///
/// # Examples
///
/// ```
/// use mailbox_rpc::Folder;
///
/// assert_eq!(Folder::from("inbox"), Folder::Inbox);
/// assert_eq!(Folder::from("Work/2024").as_str(), "Work/2024");
/// assert_eq!(Folder::Trash.role(), Some("trash"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Folder {
    /// The INBOX folder (RFC 3501 required, case-insensitive).
    Inbox,
    Sent,
    Drafts,
    Trash,
    Spam,
    Archive,
    /// A user-defined or server-specific folder.
    Custom(String),
}

impl Folder {
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// The IMAP folder name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Sent => "Sent",
            Self::Drafts => "Drafts",
            Self::Trash => "Trash",
            Self::Spam => "Spam",
            Self::Archive => "Archive",
            Self::Custom(name) => name,
        }
    }

    /// Role of a well-known folder, named after the RFC 6154
    /// special-use attributes. `None` for custom folders.
    #[must_use]
    pub const fn role(&self) -> Option<&'static str> {
        match self {
            Self::Inbox => Some("inbox"),
            Self::Sent => Some("sent"),
            Self::Drafts => Some("drafts"),
            Self::Trash => Some("trash"),
            Self::Spam => Some("junk"),
            Self::Archive => Some("archive"),
            Self::Custom(_) => None,
        }
    }

    /// Role from a `\Sent`-style special-use attribute, if any.
    #[must_use]
    pub fn role_from_attribute(attribute: &str) -> Option<&'static str> {
        match attribute.trim_start_matches('\\').to_ascii_lowercase().as_str() {
            "sent" => Some("sent"),
            "drafts" => Some("drafts"),
            "trash" => Some("trash"),
            "junk" => Some("junk"),
            "archive" | "all" => Some("archive"),
            _ => None,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Folder {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            match s {
                "Sent" => Self::Sent,
                "Drafts" => Self::Drafts,
                "Trash" => Self::Trash,
                "Spam" | "Junk" => Self::Spam,
                "Archive" => Self::Archive,
                other => Self::Custom(other.to_string()),
            }
        }
    }
}

impl From<String> for Folder {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl Serialize for Folder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Folder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}
