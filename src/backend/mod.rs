//! Mail backend adapter
//!
//! Handlers and sync jobs talk to the mail store through these traits.
//! [`MailBackend`] opens a [`MailSession`] per request; [`MailSender`]
//! submits outgoing mail. The IMAP and SMTP implementations live in
//! [`imap`] and [`smtp`].
//!
//! `connect`, `list_containers`, `enumerate_items`, `fetch_item` and
//! `mutate_item` are mandatory. Search, folder management and sending
//! are best-effort: their default bodies return
//! [`Error::Unsupported`].

mod connection;
pub mod imap;
mod message;
mod query;
pub mod smtp;

pub use imap::ImapBackend;
pub use message::{addresses, parse_detail, parse_summary};
pub use query::ItemFilter;
pub use smtp::SmtpSender;

use crate::config::{ImapConfig, SmtpConfig};
use crate::error::{Error, Result};
use crate::flag::Flag;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A folder as reported by `list_containers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub name: String,
    pub delimiter: Option<String>,
    /// `inbox`, `sent`, `drafts`, `trash`, `junk` or `archive`.
    pub role: Option<String>,
    pub messages: u32,
    pub unseen: u32,
    pub recent: u32,
}

impl ContainerInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiter: None,
            role: None,
            messages: 0,
            unseen: 0,
            recent: 0,
        }
    }
}

/// Result of selecting a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerStatus {
    pub folder: String,
    pub exists: u32,
    pub recent: u32,
    pub uid_validity: Option<u32>,
}

/// One page of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: usize,
    pub limit: usize,
    /// Number of matches before paging.
    pub total: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn empty(offset: usize, limit: usize) -> Self {
        Self {
            items: Vec::new(),
            offset,
            limit,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub uid: u32,
    pub message_id: Option<String>,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub size: usize,
    pub flags: Vec<Flag>,
}

impl ItemSummary {
    #[must_use]
    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub summary: ItemSummary,
    pub cc: Vec<String>,
    pub reply_to: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl ItemDetail {
    /// Plain text body, falling back to the HTML body.
    #[must_use]
    pub fn text(&self) -> &str {
        self.body_plain
            .as_deref()
            .or(self.body_html.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// A change applied to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetFlag { flag: Flag, enabled: bool },
    Copy { target: String },
    Move { target: String },
    Delete { expunge: bool },
}

impl Mutation {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetFlag { .. } => "set_flag",
            Self::Copy { .. } => "copy",
            Self::Move { .. } => "move",
            Self::Delete { .. } => "delete",
        }
    }
}

/// A message to submit over SMTP.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Defaults to the SMTP username.
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub attachments: Vec<Attachment>,
}

/// Opens sessions against a mail store.
#[async_trait]
pub trait MailBackend: Send + Sync {
    async fn connect(&self, config: &ImapConfig) -> Result<Box<dyn MailSession>>;
}

/// One logged-in connection to a mail store.
///
/// Callers must call [`MailSession::logout`] when done, on success and
/// error paths alike.
#[async_trait]
pub trait MailSession: Send {
    async fn list_containers(&mut self) -> Result<Vec<ContainerInfo>>;

    async fn select_container(&mut self, name: &str) -> Result<ContainerStatus>;

    /// Matches of `filter` in `container`, newest first. A `limit` of 0
    /// only counts.
    async fn enumerate_items(
        &mut self,
        container: &str,
        filter: &ItemFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<ItemSummary>>;

    async fn fetch_item(&mut self, container: &str, uid: u32) -> Result<Option<ItemDetail>>;

    /// Returns `false` if the message does not exist.
    async fn mutate_item(&mut self, container: &str, uid: u32, mutation: &Mutation)
    -> Result<bool>;

    /// UIDs matching `filter`, newest first.
    async fn search(&mut self, _container: &str, _filter: &ItemFilter) -> Result<Vec<u32>> {
        Err(Error::Unsupported("search"))
    }

    async fn create_container(&mut self, _name: &str) -> Result<()> {
        Err(Error::Unsupported("create_container"))
    }

    async fn delete_container(&mut self, _name: &str) -> Result<()> {
        Err(Error::Unsupported("delete_container"))
    }

    async fn rename_container(&mut self, _from: &str, _to: &str) -> Result<()> {
        Err(Error::Unsupported("rename_container"))
    }

    /// Close the session. Errors are swallowed.
    async fn logout(&mut self);
}

/// Submits outgoing mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, _config: &SmtpConfig, _message: &OutgoingMessage) -> Result<()> {
        Err(Error::Unsupported("send_item"))
    }
}

/// A sender for deployments without outgoing mail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSender;

impl MailSender for NoSender {}
