use super::{DEFAULT_FOLDER, Operations, to_value};
use crate::arguments::Arguments;
use crate::error::OperationError;
use crate::registry::OperationResult;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

impl Operations {
    pub(super) async fn start_full_sync(self: Arc<Self>, args: Arguments) -> OperationResult {
        let config = self.imap_config(&args)?;
        let detach = args.bool_or("detach", false)?;
        let snapshot = if detach {
            self.jobs.spawn_full_sync(config)
        } else {
            self.jobs.start_full_sync(&config).await
        };
        to_value(snapshot.as_ref())
    }

    pub(super) async fn start_incremental_sync(
        self: Arc<Self>,
        args: Arguments,
    ) -> OperationResult {
        let config = self.imap_config(&args)?;
        let folder = args.string_or("folder", DEFAULT_FOLDER)?;
        let since = args
            .timestamp("since")?
            .unwrap_or_else(|| Utc::now() - Duration::hours(24));
        let detach = args.bool_or("detach", false)?;
        let snapshot = if detach {
            self.jobs.spawn_incremental_sync(config, folder, since)
        } else {
            self.jobs.start_incremental_sync(&config, &folder, since).await
        };
        to_value(snapshot.as_ref())
    }

    pub(super) async fn get_sync_status(self: Arc<Self>, args: Arguments) -> OperationResult {
        match args.string("sync_id")? {
            Some(id) => {
                let snapshot = self
                    .jobs
                    .get_status(&id)
                    .ok_or_else(|| OperationError::NotFound(format!("Sync ID '{id}' not found.")))?;
                to_value(snapshot.as_ref())
            }
            None => {
                let all = self.jobs.get_all_statuses();
                let view: BTreeMap<&str, _> = all
                    .iter()
                    .map(|(id, s)| (id.as_str(), s.as_ref()))
                    .collect();
                to_value(&view)
            }
        }
    }

    pub(super) async fn cancel_sync(self: Arc<Self>, args: Arguments) -> OperationResult {
        let id = args.required_string("sync_id")?;
        if !self.jobs.cancel(&id) {
            return Err(OperationError::NotFound(format!(
                "Sync ID '{id}' not found or cannot be cancelled."
            )));
        }
        Ok(json!({
            "sync_id": &id,
            "cancelled": true,
            "message": format!("Sync '{id}' cancellation requested."),
        }))
    }
}
