//! Mail operations exposed over RPC
//!
//! Every handler validates its arguments before touching the backend,
//! and every handler that opens a session logs it out again on both the
//! success and the error path.

mod compose;
mod folders;
mod messages;
mod sync;

use crate::arguments::Arguments;
use crate::backend::{MailBackend, MailSender, MailSession};
use crate::config::ImapConfig;
use crate::error::OperationError;
use crate::jobs::JobManager;
use crate::registry::{OperationRegistry, OperationResult};
use serde::Serialize;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Folder used when a request names none.
const DEFAULT_FOLDER: &str = "INBOX";

/// The collaborators handlers need.
pub struct Operations {
    backend: Arc<dyn MailBackend>,
    sender: Arc<dyn MailSender>,
    jobs: JobManager,
    default_imap: Option<ImapConfig>,
}

impl Operations {
    #[must_use]
    pub fn new(
        backend: Arc<dyn MailBackend>,
        sender: Arc<dyn MailSender>,
        jobs: JobManager,
    ) -> Self {
        Self {
            backend,
            sender,
            jobs,
            default_imap: None,
        }
    }

    /// Account used by requests that carry no IMAP settings.
    #[must_use]
    pub fn with_default_imap(mut self, config: Option<ImapConfig>) -> Self {
        self.default_imap = config;
        self
    }

    /// Build the registry with every mail and sync operation.
    #[must_use]
    pub fn into_registry(self) -> OperationRegistry {
        let ops = Arc::new(self);
        let mut registry = OperationRegistry::new();

        bind(&mut registry, &ops, "list_containers", Self::list_containers);
        bind(&mut registry, &ops, "select_folder", Self::select_folder);
        bind(&mut registry, &ops, "create_folder", Self::create_folder);
        bind(&mut registry, &ops, "delete_folder", Self::delete_folder);
        bind(&mut registry, &ops, "rename_folder", Self::rename_folder);

        bind(&mut registry, &ops, "get_email_list", Self::get_email_list);
        bind(&mut registry, &ops, "get_single_email", Self::get_single_email);
        bind(&mut registry, &ops, "mark_as_read", Self::mark_as_read);
        bind(&mut registry, &ops, "mark_as_flagged", Self::mark_as_flagged);
        bind(&mut registry, &ops, "move_email", Self::move_email);
        bind(&mut registry, &ops, "copy_email", Self::copy_email);
        bind(&mut registry, &ops, "delete_email", Self::delete_email);
        bind(&mut registry, &ops, "advanced_search", Self::advanced_search);
        bind(&mut registry, &ops, "get_email_thread", Self::get_email_thread);

        bind(&mut registry, &ops, "send_email", Self::send_email);
        bind(&mut registry, &ops, "reply_to_email", Self::reply_to_email);
        bind(&mut registry, &ops, "forward_email", Self::forward_email);

        bind(&mut registry, &ops, "start_full_sync", Self::start_full_sync);
        bind(&mut registry, &ops, "start_incremental_sync", Self::start_incremental_sync);
        bind(&mut registry, &ops, "get_sync_status", Self::get_sync_status);
        bind(&mut registry, &ops, "cancel_sync", Self::cancel_sync);

        registry.alias("get_folders", "list_containers");
        registry
    }

    fn imap_config(&self, args: &Arguments) -> Result<ImapConfig, OperationError> {
        ImapConfig::from_arguments(args, self.default_imap.as_ref())
    }

    /// Validate the IMAP settings and log in.
    async fn open(&self, args: &Arguments) -> Result<Box<dyn MailSession>, OperationError> {
        let config = self.imap_config(args)?;
        debug!(host = %config.host, user = %config.username, "Opening mail session");
        Ok(self.backend.connect(&config).await?)
    }
}

fn bind<F, Fut>(registry: &mut OperationRegistry, ops: &Arc<Operations>, name: &str, handler: F)
where
    F: Fn(Arc<Operations>, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationResult> + Send + 'static,
{
    let ops = Arc::clone(ops);
    registry.register(name, move |args| handler(Arc::clone(&ops), args));
}

fn folder_arg(args: &Arguments) -> Result<String, OperationError> {
    args.string_or("folder", DEFAULT_FOLDER)
}

fn to_value<T: Serialize>(value: &T) -> OperationResult {
    serde_json::to_value(value).map_err(|e| OperationError::Internal(e.to_string()))
}

fn message(text: impl Into<String>) -> Value {
    json!({ "message": text.into() })
}
