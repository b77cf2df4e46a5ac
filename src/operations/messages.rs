use super::{Operations, folder_arg, message, to_value};
use crate::arguments::Arguments;
use crate::backend::{ItemDetail, ItemFilter, MailSession, Mutation};
use crate::error::{OperationError, Result};
use crate::flag::Flag;
use crate::registry::OperationResult;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Headers that link the messages of one conversation.
const THREAD_HEADERS: [&str; 3] = ["Message-ID", "References", "In-Reply-To"];

fn not_found(uid: u32, folder: &str) -> OperationError {
    OperationError::NotFound(format!("Email with UID {uid} not found in {folder}."))
}

impl Operations {
    pub(super) async fn get_email_list(self: Arc<Self>, args: Arguments) -> OperationResult {
        let folder = folder_arg(&args)?;
        let criteria = args.string_or("criteria", "ALL")?;
        let offset = args.usize_or("offset", 0)?;
        let limit = args.usize_or("limit", 10)?;
        let filter = ItemFilter::caller_criteria(&criteria)?;

        let mut session = self.open(&args).await?;
        let result = session.enumerate_items(&folder, &filter, offset, limit).await;
        session.logout().await;
        to_value(&result?)
    }

    pub(super) async fn get_single_email(self: Arc<Self>, args: Arguments) -> OperationResult {
        let uid = args.required_u32("uid")?;
        let folder = folder_arg(&args)?;

        let mut session = self.open(&args).await?;
        let result = session.fetch_item(&folder, uid).await;
        session.logout().await;
        match result? {
            Some(detail) => to_value(&detail),
            None => Err(not_found(uid, &folder)),
        }
    }

    pub(super) async fn mark_as_read(self: Arc<Self>, args: Arguments) -> OperationResult {
        let uid = args.required_u32("uid")?;
        let read = args.bool_or("read", true)?;
        let state = if read { "read" } else { "unread" };
        self.mutate(
            &args,
            uid,
            Mutation::SetFlag {
                flag: Flag::Seen,
                enabled: read,
            },
            format!("Email {uid} marked as {state}."),
        )
        .await
    }

    pub(super) async fn mark_as_flagged(self: Arc<Self>, args: Arguments) -> OperationResult {
        let uid = args.required_u32("uid")?;
        let flagged = args.bool_or("flagged", true)?;
        let state = if flagged { "flagged" } else { "unflagged" };
        self.mutate(
            &args,
            uid,
            Mutation::SetFlag {
                flag: Flag::Flagged,
                enabled: flagged,
            },
            format!("Email {uid} marked as {state}."),
        )
        .await
    }

    pub(super) async fn move_email(self: Arc<Self>, args: Arguments) -> OperationResult {
        args.require(&["uid", "target_folder"])?;
        let uid = args.required_u32("uid")?;
        let target = args.required_string("target_folder")?;
        let done = format!("Email {uid} moved to {target}.");
        self.mutate(&args, uid, Mutation::Move { target }, done).await
    }

    pub(super) async fn copy_email(self: Arc<Self>, args: Arguments) -> OperationResult {
        args.require(&["uid", "target_folder"])?;
        let uid = args.required_u32("uid")?;
        let target = args.required_string("target_folder")?;
        let done = format!("Email {uid} copied to {target}.");
        self.mutate(&args, uid, Mutation::Copy { target }, done).await
    }

    pub(super) async fn delete_email(self: Arc<Self>, args: Arguments) -> OperationResult {
        let uid = args.required_u32("uid")?;
        let expunge = args.bool_or("expunge", false)?;
        let done = if expunge {
            format!("Email {uid} deleted and expunged.")
        } else {
            format!("Email {uid} marked for deletion.")
        };
        self.mutate(&args, uid, Mutation::Delete { expunge }, done).await
    }

    /// Shared tail of the single-message mutations.
    async fn mutate(
        &self,
        args: &Arguments,
        uid: u32,
        mutation: Mutation,
        done: String,
    ) -> OperationResult {
        let folder = folder_arg(args)?;
        let mut session = self.open(args).await?;
        let result = session.mutate_item(&folder, uid, &mutation).await;
        session.logout().await;
        debug!(uid, folder = %folder, mutation = mutation.name(), "Mutation finished");
        if result? {
            Ok(message(done))
        } else {
            Err(not_found(uid, &folder))
        }
    }

    pub(super) async fn advanced_search(self: Arc<Self>, args: Arguments) -> OperationResult {
        let params = args
            .object("search_params")?
            .ok_or_else(|| OperationError::Validation("\"search_params\" is required.".into()))?;
        let filter = ItemFilter::from_search_params(&params)?;
        let folder = folder_arg(&args)?;

        let mut session = self.open(&args).await?;
        let result = session.search(&folder, &filter).await;
        session.logout().await;
        to_value(&result?)
    }

    pub(super) async fn get_email_thread(self: Arc<Self>, args: Arguments) -> OperationResult {
        let uid = args.required_u32("uid")?;
        let folder = folder_arg(&args)?;

        let mut session = self.open(&args).await?;
        let result = collect_thread(session.as_mut(), &folder, uid).await;
        session.logout().await;
        match result? {
            Some(thread) => to_value(&thread),
            None => Err(not_found(uid, &folder)),
        }
    }
}

/// Every message in `folder` linked to `uid` through its message IDs,
/// oldest first. `None` if `uid` itself does not exist.
async fn collect_thread(
    session: &mut dyn MailSession,
    folder: &str,
    uid: u32,
) -> Result<Option<Vec<ItemDetail>>> {
    let Some(root) = session.fetch_item(folder, uid).await? else {
        return Ok(None);
    };

    let mut ids: Vec<String> = root.summary.message_id.iter().cloned().collect();
    ids.extend(root.in_reply_to.iter().cloned());
    ids.extend(root.references.iter().cloned());
    ids.sort();
    ids.dedup();

    let mut uids = BTreeSet::from([uid]);
    for id in &ids {
        for header in THREAD_HEADERS {
            let filter = ItemFilter {
                headers: vec![(header.to_string(), id.clone())],
                ..ItemFilter::default()
            };
            uids.extend(session.search(folder, &filter).await?);
        }
    }

    let mut thread = vec![root];
    for other in uids.into_iter().filter(|u| *u != uid) {
        if let Some(detail) = session.fetch_item(folder, other).await? {
            thread.push(detail);
        }
    }
    thread.sort_by(|a, b| {
        a.summary
            .date
            .cmp(&b.summary.date)
            .then(a.summary.uid.cmp(&b.summary.uid))
    });
    Ok(Some(thread))
}
