//! IMAP implementation of the backend adapter

use super::connection::{self, ImapSession};
use super::message::{parse_detail, parse_summary};
use super::{
    ContainerInfo, ContainerStatus, ItemDetail, ItemFilter, ItemSummary, MailBackend, MailSession,
    Mutation, Page,
};
use crate::config::ImapConfig;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::folder::Folder;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

/// Map an `async-imap` failure, keeping connection loss distinguishable.
fn imap_error(context: &str, e: async_imap::error::Error) -> Error {
    match e {
        async_imap::error::Error::Io(io) => Error::ConnectionLost(format!("{context}: {io}")),
        async_imap::error::Error::ConnectionLost => Error::ConnectionLost(context.to_string()),
        other => Error::Imap(format!("{context} failed: {other}")),
    }
}

/// Opens [`ImapMailSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapBackend;

impl ImapBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailBackend for ImapBackend {
    async fn connect(&self, config: &ImapConfig) -> Result<Box<dyn MailSession>> {
        let session = connection::connect(config).await?;
        Ok(Box::new(ImapMailSession {
            session,
            selected: None,
        }))
    }
}

/// A logged-in IMAP session that remembers the selected folder.
pub struct ImapMailSession {
    session: ImapSession,
    selected: Option<String>,
}

impl ImapMailSession {
    async fn ensure_selected(&mut self, folder: &str) -> Result<()> {
        if self.selected.as_deref() != Some(folder) {
            self.select_container(folder).await?;
        }
        Ok(())
    }

    /// UIDs matching `query`, newest first.
    async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        let uids = self
            .session
            .uid_search(query)
            .await
            .map_err(|e| imap_error("Search", e))?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(uids)
    }

    /// Raw body and flags of one message, `None` if it does not exist.
    async fn fetch_raw(&mut self, uid: u32) -> Result<Option<(Vec<u8>, Vec<Flag>)>> {
        let uid_set = uid.to_string();
        let mut messages = self
            .session
            .uid_fetch(&uid_set, "(FLAGS BODY.PEEK[])")
            .await
            .map_err(|e| imap_error("Fetch", e))?;

        let mut found = None;
        while let Some(msg_result) = messages.next().await {
            let msg = msg_result.map_err(|e| imap_error("Fetch", e))?;
            if found.is_none() {
                if let Some(body) = msg.body() {
                    let flags = msg.flags().map(|f| Flag::from_imap(&f)).collect();
                    found = Some((body.to_vec(), flags));
                }
            }
        }
        Ok(found)
    }

    async fn store(&mut self, uid: u32, change: &str) -> Result<()> {
        let uid_set = uid.to_string();
        let updates: Vec<_> = self
            .session
            .uid_store(&uid_set, change)
            .await
            .map_err(|e| imap_error("Store", e))?
            .try_collect()
            .await
            .map_err(|e| imap_error("Store", e))?;
        debug!(uid, change, updated = updates.len(), "Stored flags");
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let expunged: Vec<u32> = self
            .session
            .expunge()
            .await
            .map_err(|e| imap_error("Expunge", e))?
            .try_collect()
            .await
            .map_err(|e| imap_error("Expunge", e))?;
        debug!(count = expunged.len(), "Expunged messages");
        Ok(())
    }

    async fn copy(&mut self, uid: u32, target: &str) -> Result<()> {
        self.session
            .uid_copy(uid.to_string(), target)
            .await
            .map_err(|e| imap_error(&format!("Copy to {target}"), e))
    }

    async fn container_status(&mut self, name: &str) -> Option<(u32, u32, u32)> {
        match self.session.status(name, "(MESSAGES UNSEEN RECENT)").await {
            Ok(mailbox) => Some((
                mailbox.exists,
                mailbox.unseen.unwrap_or(0),
                mailbox.recent,
            )),
            Err(e) => {
                debug!(folder = name, error = %e, "STATUS not available");
                None
            }
        }
    }
}

#[async_trait]
impl MailSession for ImapMailSession {
    async fn list_containers(&mut self) -> Result<Vec<ContainerInfo>> {
        let names: Vec<_> = {
            let mut folder_stream = self
                .session
                .list(Some(""), Some("*"))
                .await
                .map_err(|e| imap_error("List folders", e))?;

            let mut names = Vec::new();
            while let Some(item) = folder_stream.next().await {
                let name = item.map_err(|e| imap_error("List folders", e))?;
                let role = name
                    .attributes()
                    .iter()
                    .find_map(|attr| Folder::role_from_attribute(&format!("{attr:?}")))
                    .or_else(|| Folder::from(name.name()).role());
                names.push((
                    name.name().to_string(),
                    name.delimiter().map(ToString::to_string),
                    role,
                ));
            }
            names
        };

        let mut containers = Vec::with_capacity(names.len());
        for (name, delimiter, role) in names {
            let (messages, unseen, recent) =
                self.container_status(&name).await.unwrap_or_default();
            containers.push(ContainerInfo {
                name,
                delimiter,
                role: role.map(ToString::to_string),
                messages,
                unseen,
                recent,
            });
        }
        info!(count = containers.len(), "Listed folders");
        Ok(containers)
    }

    async fn select_container(&mut self, name: &str) -> Result<ContainerStatus> {
        self.selected = None;
        let mailbox = self
            .session
            .select(name)
            .await
            .map_err(|e| imap_error(&format!("Select {name}"), e))?;
        self.selected = Some(name.to_string());
        Ok(ContainerStatus {
            folder: name.to_string(),
            exists: mailbox.exists,
            recent: mailbox.recent,
            uid_validity: mailbox.uid_validity,
        })
    }

    async fn enumerate_items(
        &mut self,
        container: &str,
        filter: &ItemFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<ItemSummary>> {
        self.ensure_selected(container).await?;
        let uids = self.uid_search(&filter.to_imap_query()).await?;
        let total = uids.len();

        let mut items = Vec::new();
        for uid in uids.into_iter().skip(offset).take(limit) {
            match self.fetch_raw(uid).await {
                Ok(Some((raw, flags))) => match parse_summary(uid, &raw, flags) {
                    Ok(summary) => items.push(summary),
                    Err(e) => warn!(uid, error = %e, "Skipping unparseable message"),
                },
                Ok(None) => debug!(uid, "Message vanished before fetch"),
                Err(e) if e.is_connection_loss() => return Err(e),
                Err(e) => warn!(uid, error = %e, "Failed to fetch message"),
            }
        }

        Ok(Page {
            items,
            offset,
            limit,
            total,
        })
    }

    async fn fetch_item(&mut self, container: &str, uid: u32) -> Result<Option<ItemDetail>> {
        self.ensure_selected(container).await?;
        match self.fetch_raw(uid).await? {
            Some((raw, flags)) => parse_detail(uid, &raw, flags).map(Some),
            None => Ok(None),
        }
    }

    async fn mutate_item(
        &mut self,
        container: &str,
        uid: u32,
        mutation: &Mutation,
    ) -> Result<bool> {
        self.ensure_selected(container).await?;
        if self.uid_search(&format!("UID {uid}")).await?.is_empty() {
            return Ok(false);
        }

        match mutation {
            Mutation::SetFlag { flag, enabled } => {
                let op = if *enabled { '+' } else { '-' };
                self.store(uid, &format!("{op}FLAGS ({flag})")).await?;
            }
            Mutation::Copy { target } => self.copy(uid, target).await?,
            Mutation::Move { target } => {
                self.copy(uid, target).await?;
                self.store(uid, "+FLAGS (\\Deleted)").await?;
                self.expunge().await?;
            }
            Mutation::Delete { expunge } => {
                self.store(uid, "+FLAGS (\\Deleted)").await?;
                if *expunge {
                    self.expunge().await?;
                }
            }
        }
        info!(folder = container, uid, mutation = mutation.name(), "Mutated message");
        Ok(true)
    }

    async fn search(&mut self, container: &str, filter: &ItemFilter) -> Result<Vec<u32>> {
        self.ensure_selected(container).await?;
        self.uid_search(&filter.to_imap_query()).await
    }

    async fn create_container(&mut self, name: &str) -> Result<()> {
        self.session
            .create(name)
            .await
            .map_err(|e| imap_error(&format!("Create {name}"), e))
    }

    async fn delete_container(&mut self, name: &str) -> Result<()> {
        if self.selected.as_deref() == Some(name) {
            self.selected = None;
        }
        self.session
            .delete(name)
            .await
            .map_err(|e| imap_error(&format!("Delete {name}"), e))
    }

    async fn rename_container(&mut self, from: &str, to: &str) -> Result<()> {
        if self.selected.as_deref() == Some(from) {
            self.selected = None;
        }
        self.session
            .rename(from, to)
            .await
            .map_err(|e| imap_error(&format!("Rename {from}"), e))
    }

    async fn logout(&mut self) {
        self.session.logout().await.ok();
    }
}
