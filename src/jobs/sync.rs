//! Full and incremental sync loops
//!
//! A full sync treats every folder as one unit and counts its messages;
//! an incremental sync walks the messages of one folder received since
//! a point in time. Both check for cancellation before each unit. Losing
//! the connection ends the job in `Error`; any other failure is recorded
//! against the unit and the loop moves on.

use super::JobHandle;
use crate::backend::{ItemFilter, MailBackend, MailSession};
use crate::config::ImapConfig;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Messages fetched per page during an incremental sync.
const PAGE_SIZE: usize = 50;

async fn open(
    handle: &JobHandle,
    backend: &dyn MailBackend,
    config: &ImapConfig,
) -> Option<Box<dyn MailSession>> {
    match backend.connect(config).await {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(job_id = handle.job_id(), error = %e, "Sync could not connect");
            handle.fail(format!("Connection failed: {e}"));
            None
        }
    }
}

pub(super) async fn run_full(handle: &JobHandle, backend: &dyn MailBackend, config: &ImapConfig) {
    let Some(mut session) = open(handle, backend, config).await else {
        return;
    };

    let folders = match session.list_containers().await {
        Ok(folders) => folders,
        Err(e) => {
            handle.fail(format!("Listing folders failed: {e}"));
            session.logout().await;
            return;
        }
    };
    handle.set_total(folders.len() as u64);
    info!(job_id = handle.job_id(), folders = folders.len(), "Full sync started");

    for folder in &folders {
        if handle.is_cancelled() {
            info!(job_id = handle.job_id(), folder = %folder.name, "Full sync cancelled");
            break;
        }
        match session
            .enumerate_items(&folder.name, &ItemFilter::all(), 0, 0)
            .await
        {
            Ok(page) => {
                debug!(
                    job_id = handle.job_id(),
                    folder = %folder.name,
                    messages = page.total,
                    "Folder synced"
                );
                handle.unit_done(page.total as u64);
            }
            Err(e) if e.is_connection_loss() => {
                handle.fail(format!("{}: {e}", folder.name));
                session.logout().await;
                return;
            }
            Err(e) => {
                warn!(
                    job_id = handle.job_id(),
                    folder = %folder.name,
                    error = %e,
                    "Folder sync failed"
                );
                handle.unit_failed(format!("{}: {e}", folder.name));
            }
        }
    }

    session.logout().await;
    handle.conclude();
}

pub(super) async fn run_incremental(
    handle: &JobHandle,
    backend: &dyn MailBackend,
    config: &ImapConfig,
    folder: &str,
    since: DateTime<Utc>,
) {
    let Some(mut session) = open(handle, backend, config).await else {
        return;
    };

    let filter = ItemFilter::since(since.date_naive());
    let total = match session.enumerate_items(folder, &filter, 0, 0).await {
        Ok(page) => page.total,
        Err(e) => {
            handle.fail(format!("{folder}: {e}"));
            session.logout().await;
            return;
        }
    };
    handle.set_total(total as u64);
    info!(job_id = handle.job_id(), folder, matches = total, %since, "Incremental sync started");

    let mut offset = 0;
    'pages: while offset < total {
        if handle.is_cancelled() {
            break;
        }
        let expected = PAGE_SIZE.min(total - offset);
        let page = match session.enumerate_items(folder, &filter, offset, PAGE_SIZE).await {
            Ok(page) => page,
            Err(e) if e.is_connection_loss() => {
                handle.fail(format!("{folder}: {e}"));
                session.logout().await;
                return;
            }
            Err(e) => {
                warn!(job_id = handle.job_id(), folder, offset, error = %e, "Page failed");
                handle.unit_failed(format!("{folder} [{offset}..{}]: {e}", offset + expected));
                offset += PAGE_SIZE;
                continue;
            }
        };

        for item in &page.items {
            if handle.is_cancelled() {
                break 'pages;
            }
            debug!(job_id = handle.job_id(), uid = item.uid, "Message synced");
            handle.unit_done(1);
        }
        if page.items.len() < expected {
            handle.unit_failed(format!(
                "{folder}: {} of {expected} messages at offset {offset} could not be read",
                expected - page.items.len()
            ));
        }
        if page.total <= offset {
            break;
        }
        offset += PAGE_SIZE;
    }

    session.logout().await;
    handle.conclude();
}
