//! In-memory mail backend and SMTP sender for handler and job tests.
//!
//! `FakeBackend` keeps folders of parsed messages behind one mutex and
//! counts connects and logouts so tests can check that every session
//! is closed. Individual folders can be made to fail, and an optional
//! semaphore gates `enumerate_items` so a test can hold a sync job
//! mid-flight.

#![allow(dead_code)]

use async_trait::async_trait;
use mailbox_rpc::backend::{
    ContainerInfo, ContainerStatus, ItemDetail, ItemFilter, ItemSummary, MailBackend, MailSender,
    MailSession, Mutation, OutgoingMessage, Page, parse_detail,
};
use mailbox_rpc::{Arguments, Error, Flag, ImapConfig, Result, SmtpConfig};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// A minimal RFC 2822 message.
pub fn raw_email(subject: &str, date: &str, message_id: &str, extra_headers: &str) -> String {
    format!(
        "From: Alice <alice@example.com>\r\n\
         To: bob@example.com\r\n\
         Subject: {subject}\r\n\
         Date: {date}\r\n\
         Message-ID: {message_id}\r\n\
         {extra_headers}\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         Body of {subject}\r\n"
    )
}

pub fn email(uid: u32, subject: &str, date: &str) -> ItemDetail {
    let id = format!("<msg-{uid}@example.com>");
    parse_detail(uid, raw_email(subject, date, &id, "").as_bytes(), Vec::new()).unwrap()
}

/// Request arguments naming an IMAP account.
pub fn imap_args() -> Arguments {
    Arguments::new()
        .with("imap_hostname", "imap.example.com")
        .with("imap_username", "bob@example.com")
        .with("imap_password", "secret")
}

/// IMAP plus SMTP account arguments.
pub fn mail_args() -> Arguments {
    imap_args().with(
        "smtp_config",
        json!({
            "smtp_host": "smtp.example.com",
            "smtp_port": 587,
            "smtp_username": "bob@example.com",
            "smtp_password": "secret",
        }),
    )
}

pub fn imap_config() -> ImapConfig {
    ImapConfig::from_arguments(&imap_args(), None).unwrap()
}

#[derive(Default)]
struct State {
    folders: Vec<(String, Vec<ItemDetail>)>,
    failing: HashSet<String>,
    lost: HashSet<String>,
    fail_connect: bool,
    connects: usize,
    logouts: usize,
    mutations: Vec<(String, u32, Mutation)>,
}

impl State {
    fn folder(&self, name: &str) -> Result<&Vec<ItemDetail>> {
        self.folders
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, items)| items)
            .ok_or_else(|| Error::Imap(format!("Select {name} failed: NO no such folder")))
    }

    fn folder_mut(&mut self, name: &str) -> Result<&mut Vec<ItemDetail>> {
        self.folders
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, items)| items)
            .ok_or_else(|| Error::Imap(format!("NO no such folder {name}")))
    }
}

/// An in-memory [`MailBackend`].
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
    gate: Option<Arc<Semaphore>>,
    without_search: bool,
    panic_on_list: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn folder(self, name: &str, items: Vec<ItemDetail>) -> Self {
        self.state
            .lock()
            .unwrap()
            .folders
            .push((name.to_string(), items));
        self
    }

    /// `enumerate_items` on `name` fails with an ordinary IMAP error.
    #[must_use]
    pub fn failing(self, name: &str) -> Self {
        self.state.lock().unwrap().failing.insert(name.to_string());
        self
    }

    /// `enumerate_items` on `name` reports a lost connection.
    #[must_use]
    pub fn losing_connection_at(self, name: &str) -> Self {
        self.state.lock().unwrap().lost.insert(name.to_string());
        self
    }

    #[must_use]
    pub fn refusing_connections(self) -> Self {
        self.state.lock().unwrap().fail_connect = true;
        self
    }

    /// Each `enumerate_items` call waits for one permit of `gate`.
    #[must_use]
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// `list_containers` panics instead of answering.
    #[must_use]
    pub const fn panicking_on_list(mut self) -> Self {
        self.panic_on_list = true;
        self
    }

    /// Sessions keep the default, unsupported search.
    #[must_use]
    pub const fn without_search(mut self) -> Self {
        self.without_search = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn logouts(&self) -> usize {
        self.state.lock().unwrap().logouts
    }

    pub fn mutations(&self) -> Vec<(String, u32, Mutation)> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn folder_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .folders
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn item(&self, folder: &str, uid: u32) -> Option<ItemDetail> {
        let state = self.state.lock().unwrap();
        state
            .folder(folder)
            .ok()?
            .iter()
            .find(|i| i.summary.uid == uid)
            .cloned()
    }

    pub fn uids(&self, folder: &str) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        state
            .folder(folder)
            .map(|items| items.iter().map(|i| i.summary.uid).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MailBackend for FakeBackend {
    async fn connect(&self, _config: &ImapConfig) -> Result<Box<dyn MailSession>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(Error::Imap("Login failed: NO [AUTHENTICATIONFAILED]".into()));
        }
        state.connects += 1;
        if self.without_search {
            Ok(Box::new(BasicSession(self.clone())))
        } else {
            Ok(Box::new(FakeSession(self.clone())))
        }
    }
}

fn header_matches(item: &ItemDetail, name: &str, value: &str) -> bool {
    match name.to_ascii_lowercase().as_str() {
        "message-id" => item.summary.message_id.as_deref() == Some(value),
        "in-reply-to" => item.in_reply_to.as_deref() == Some(value),
        "references" => item.references.iter().any(|r| r == value),
        _ => false,
    }
}

fn newest_first(items: &[ItemDetail], filter: &ItemFilter) -> Vec<ItemDetail> {
    let mut matched: Vec<ItemDetail> = items
        .iter()
        .filter(|i| {
            filter.since.is_none_or(|since| {
                i.summary.date.is_some_and(|d| d.date_naive() >= since)
            })
        })
        .filter(|i| {
            filter
                .headers
                .iter()
                .all(|(name, value)| header_matches(i, name, value))
        })
        .filter(|i| filter.seen.is_none_or(|seen| i.summary.has_flag(&Flag::Seen) == seen))
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.summary.uid.cmp(&a.summary.uid));
    matched
}

/// Session with every capability.
pub struct FakeSession(FakeBackend);

/// Session with only the mandatory operations.
pub struct BasicSession(FakeBackend);

impl FakeSession {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.0.state.lock().unwrap()
    }
}

async fn enumerate(
    backend: &FakeBackend,
    container: &str,
    filter: &ItemFilter,
    offset: usize,
    limit: usize,
) -> Result<Page<ItemSummary>> {
    if let Some(gate) = &backend.gate {
        gate.acquire()
            .await
            .map_err(|_| Error::ConnectionLost("gate closed".into()))?
            .forget();
    }
    let state = backend.state.lock().unwrap();
    if state.lost.contains(container) {
        return Err(Error::ConnectionLost(format!("Select {container}")));
    }
    if state.failing.contains(container) {
        return Err(Error::Imap(format!("Select {container} failed: NO")));
    }
    let matched = newest_first(state.folder(container)?, filter);
    Ok(Page {
        total: matched.len(),
        items: matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|i| i.summary)
            .collect(),
        offset,
        limit,
    })
}

fn list(backend: &FakeBackend) -> Vec<ContainerInfo> {
    assert!(!backend.panic_on_list, "folder listing exploded");
    let state = backend.state.lock().unwrap();
    state
        .folders
        .iter()
        .map(|(name, items)| ContainerInfo {
            messages: u32::try_from(items.len()).unwrap(),
            ..ContainerInfo::new(name.clone())
        })
        .collect()
}

fn select(backend: &FakeBackend, name: &str) -> Result<ContainerStatus> {
    let state = backend.state.lock().unwrap();
    let items = state.folder(name)?;
    Ok(ContainerStatus {
        folder: name.to_string(),
        exists: u32::try_from(items.len()).unwrap(),
        recent: 0,
        uid_validity: Some(1),
    })
}

fn fetch(backend: &FakeBackend, container: &str, uid: u32) -> Result<Option<ItemDetail>> {
    let state = backend.state.lock().unwrap();
    Ok(state
        .folder(container)?
        .iter()
        .find(|i| i.summary.uid == uid)
        .cloned())
}

fn set_flag(item: &mut ItemDetail, flag: &Flag, enabled: bool) {
    item.summary.flags.retain(|f| f != flag);
    if enabled {
        item.summary.flags.push(flag.clone());
    }
}

fn mutate(backend: &FakeBackend, container: &str, uid: u32, mutation: &Mutation) -> Result<bool> {
    let mut state = backend.state.lock().unwrap();
    if let Mutation::Copy { target } | Mutation::Move { target } = mutation {
        state.folder(target)?;
    }
    let items = state.folder_mut(container)?;
    let Some(pos) = items.iter().position(|i| i.summary.uid == uid) else {
        return Ok(false);
    };
    match mutation {
        Mutation::SetFlag { flag, enabled } => set_flag(&mut items[pos], flag, *enabled),
        Mutation::Delete { expunge: true } => {
            items.remove(pos);
        }
        Mutation::Delete { expunge: false } => set_flag(&mut items[pos], &Flag::Deleted, true),
        Mutation::Copy { target } | Mutation::Move { target } => {
            let mut copy = if matches!(mutation, Mutation::Move { .. }) {
                items.remove(pos)
            } else {
                items[pos].clone()
            };
            let dest = state.folder_mut(target)?;
            copy.summary.uid = dest.iter().map(|i| i.summary.uid).max().unwrap_or(0) + 1;
            dest.push(copy);
        }
    }
    state
        .mutations
        .push((container.to_string(), uid, mutation.clone()));
    Ok(true)
}

#[async_trait]
impl MailSession for FakeSession {
    async fn list_containers(&mut self) -> Result<Vec<ContainerInfo>> {
        Ok(list(&self.0))
    }

    async fn select_container(&mut self, name: &str) -> Result<ContainerStatus> {
        select(&self.0, name)
    }

    async fn enumerate_items(
        &mut self,
        container: &str,
        filter: &ItemFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<ItemSummary>> {
        enumerate(&self.0, container, filter, offset, limit).await
    }

    async fn fetch_item(&mut self, container: &str, uid: u32) -> Result<Option<ItemDetail>> {
        fetch(&self.0, container, uid)
    }

    async fn mutate_item(
        &mut self,
        container: &str,
        uid: u32,
        mutation: &Mutation,
    ) -> Result<bool> {
        mutate(&self.0, container, uid, mutation)
    }

    async fn search(&mut self, container: &str, filter: &ItemFilter) -> Result<Vec<u32>> {
        let state = self.state();
        Ok(newest_first(state.folder(container)?, filter)
            .iter()
            .map(|i| i.summary.uid)
            .collect())
    }

    async fn create_container(&mut self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.folder(name).is_ok() {
            return Err(Error::Imap(format!("Create {name} failed: NO [ALREADYEXISTS]")));
        }
        state.folders.push((name.to_string(), Vec::new()));
        Ok(())
    }

    async fn delete_container(&mut self, name: &str) -> Result<()> {
        let mut state = self.state();
        let before = state.folders.len();
        state.folders.retain(|(n, _)| n != name);
        if state.folders.len() == before {
            return Err(Error::Imap(format!("Delete {name} failed: NO [NONEXISTENT]")));
        }
        Ok(())
    }

    async fn rename_container(&mut self, from: &str, to: &str) -> Result<()> {
        let mut state = self.state();
        match state.folders.iter_mut().find(|(n, _)| n == from) {
            Some((name, _)) => {
                *name = to.to_string();
                Ok(())
            }
            None => Err(Error::Imap(format!("Rename {from} failed: NO [NONEXISTENT]"))),
        }
    }

    async fn logout(&mut self) {
        self.state().logouts += 1;
    }
}

#[async_trait]
impl MailSession for BasicSession {
    async fn list_containers(&mut self) -> Result<Vec<ContainerInfo>> {
        Ok(list(&self.0))
    }

    async fn select_container(&mut self, name: &str) -> Result<ContainerStatus> {
        select(&self.0, name)
    }

    async fn enumerate_items(
        &mut self,
        container: &str,
        filter: &ItemFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<ItemSummary>> {
        enumerate(&self.0, container, filter, offset, limit).await
    }

    async fn fetch_item(&mut self, container: &str, uid: u32) -> Result<Option<ItemDetail>> {
        fetch(&self.0, container, uid)
    }

    async fn mutate_item(
        &mut self,
        container: &str,
        uid: u32,
        mutation: &Mutation,
    ) -> Result<bool> {
        mutate(&self.0, container, uid, mutation)
    }

    async fn logout(&mut self) {
        self.0.state.lock().unwrap().logouts += 1;
    }
}

/// Records every message instead of sending it.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(SmtpConfig, OutgoingMessage)>>,
    fail: bool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose relay rejects everything.
    pub fn rejecting() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(SmtpConfig, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingSender {
    async fn send(&self, config: &SmtpConfig, message: &OutgoingMessage) -> Result<()> {
        if self.fail {
            return Err(Error::Smtp("554 relay rejected".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((config.clone(), message.clone()));
        Ok(())
    }
}
