use super::{Operations, folder_arg, message};
use crate::arguments::Arguments;
use crate::backend::{ItemDetail, Mutation, OutgoingMessage, addresses};
use crate::config::SmtpConfig;
use crate::error::OperationError;
use crate::flag::Flag;
use crate::registry::OperationResult;
use std::sync::Arc;
use tracing::{info, warn};

impl Operations {
    pub(super) async fn send_email(self: Arc<Self>, args: Arguments) -> OperationResult {
        let to = args.string_list("to")?;
        let subject = args.string("subject")?.unwrap_or_default();
        let body = args.string("body")?.unwrap_or_default();
        if to.is_empty() || subject.is_empty() || body.is_empty() {
            return Err(OperationError::Validation(
                "Missing email parameters (to, subject, or body).".into(),
            ));
        }
        let smtp = SmtpConfig::from_arguments(&args)?;
        let outgoing = OutgoingMessage {
            from: args.string("from")?,
            to,
            cc: args.string_list("cc")?,
            subject,
            body,
            ..OutgoingMessage::default()
        };

        self.sender.send(&smtp, &outgoing).await?;
        info!(to = ?outgoing.to, "Email sent");
        Ok(message("Email sent successfully."))
    }

    pub(super) async fn reply_to_email(self: Arc<Self>, args: Arguments) -> OperationResult {
        args.require(&["uid", "reply_body"])?;
        let uid = args.required_u32("uid")?;
        let reply_body = args.required_string("reply_body")?;
        let reply_all = args.bool_or("reply_all", false)?;
        let folder = folder_arg(&args)?;
        let smtp = SmtpConfig::from_arguments(&args)?;

        let mut session = self.open(&args).await?;
        let original = match session.fetch_item(&folder, uid).await {
            Ok(Some(original)) => original,
            Ok(None) => {
                session.logout().await;
                return Err(OperationError::NotFound("Original email not found".into()));
            }
            Err(e) => {
                session.logout().await;
                return Err(e.into());
            }
        };

        let outgoing = build_reply(&original, reply_body, reply_all, &smtp.username);
        if let Err(e) = self.sender.send(&smtp, &outgoing).await {
            session.logout().await;
            return Err(e.into());
        }

        let answered = Mutation::SetFlag {
            flag: Flag::Answered,
            enabled: true,
        };
        if let Err(e) = session.mutate_item(&folder, uid, &answered).await {
            warn!(uid, folder = %folder, error = %e, "Could not mark original as answered");
        }
        session.logout().await;
        info!(uid, to = ?outgoing.to, "Reply sent");
        Ok(message("Reply sent successfully."))
    }

    pub(super) async fn forward_email(self: Arc<Self>, args: Arguments) -> OperationResult {
        args.require(&["uid", "to_email"])?;
        let uid = args.required_u32("uid")?;
        let to = args.string_list("to_email")?;
        let note = args.string_or("forward_message", "")?;
        let folder = folder_arg(&args)?;
        let smtp = SmtpConfig::from_arguments(&args)?;

        let mut session = self.open(&args).await?;
        let result = session.fetch_item(&folder, uid).await;
        session.logout().await;
        let original =
            result?.ok_or_else(|| OperationError::NotFound("Original email not found".into()))?;

        let outgoing = build_forward(original, to, &note);
        self.sender.send(&smtp, &outgoing).await?;
        info!(uid, to = ?outgoing.to, "Email forwarded");
        Ok(message("Email forwarded successfully."))
    }
}

fn original_date(original: &ItemDetail) -> String {
    original
        .summary
        .date
        .map(|d| d.to_rfc2822())
        .unwrap_or_default()
}

fn sender_address(original: &ItemDetail) -> String {
    addresses(&original.summary.from)
        .into_iter()
        .next()
        .unwrap_or_else(|| original.summary.from.clone())
}

fn prefixed(prefix: &str, subject: &str) -> String {
    if subject
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    {
        subject.to_string()
    } else {
        format!("{prefix}{subject}")
    }
}

/// The reply goes to the original sender; with `reply_all` the original
/// CC list is kept, minus our own address.
fn build_reply(
    original: &ItemDetail,
    reply_body: String,
    reply_all: bool,
    own_address: &str,
) -> OutgoingMessage {
    let recipient = sender_address(original);
    let quoted = original.text().replace('\n', "\n> ");
    let body = format!(
        "{reply_body}\n\n--- Original Message ---\n\
         From: {recipient}\nDate: {}\nSubject: {}\n\n> {quoted}",
        original_date(original),
        original.summary.subject,
    );

    let cc = if reply_all {
        original
            .cc
            .iter()
            .filter(|addr| {
                !addr.eq_ignore_ascii_case(own_address) && !addr.eq_ignore_ascii_case(&recipient)
            })
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let mut references = original.references.clone();
    references.extend(original.summary.message_id.iter().cloned());

    OutgoingMessage {
        from: None,
        to: vec![recipient],
        cc,
        subject: prefixed("Re: ", &original.summary.subject),
        body,
        in_reply_to: original.summary.message_id.clone(),
        references,
        attachments: Vec::new(),
    }
}

fn build_forward(original: ItemDetail, to: Vec<String>, note: &str) -> OutgoingMessage {
    let body = format!(
        "{note}\n\n--- Forwarded Message ---\nFrom: {}\nDate: {}\nSubject: {}\n\n{}",
        sender_address(&original),
        original_date(&original),
        original.summary.subject,
        original.text(),
    );
    OutgoingMessage {
        to,
        subject: prefixed("Fwd: ", &original.summary.subject),
        body,
        attachments: original.attachments,
        ..OutgoingMessage::default()
    }
}
