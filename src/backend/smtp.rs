//! SMTP submission with `lettre`

use super::{MailSender, OutgoingMessage};
use crate::config::SmtpConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

fn mailbox(addr: &str) -> Result<Mailbox> {
    addr.trim()
        .parse()
        .map_err(|e| Error::Smtp(format!("Invalid address '{addr}': {e}")))
}

/// Build the MIME message submitted for `message`.
///
/// # Errors
///
/// Returns [`Error::Smtp`] for invalid addresses or content types.
pub fn build_message(config: &SmtpConfig, message: &OutgoingMessage) -> Result<Message> {
    let from = message.from.as_deref().unwrap_or(&config.username);
    let mut builder = Message::builder()
        .from(mailbox(from)?)
        .subject(message.subject.clone());

    for to in &message.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &message.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    if let Some(id) = &message.in_reply_to {
        builder = builder.in_reply_to(id.clone());
    }
    if !message.references.is_empty() {
        builder = builder.references(message.references.join(" "));
    }

    let text = SinglePart::plain(message.body.clone());
    let built = if message.attachments.is_empty() {
        builder.singlepart(text)
    } else {
        let mut parts = MultiPart::mixed().singlepart(text);
        for attachment in &message.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .unwrap_or(ContentType::TEXT_PLAIN);
            parts = parts.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }
        builder.multipart(parts)
    };
    built.map_err(|e| Error::Smtp(format!("Failed to build message: {e}")))
}

/// Sends through an SMTP relay; implicit TLS when `use_ssl` is set,
/// STARTTLS otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpSender;

impl SmtpSender {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| Error::Smtp(format!("SMTP setup failed: {e}")))?;

        Ok(builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build())
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, config: &SmtpConfig, message: &OutgoingMessage) -> Result<()> {
        let email = build_message(config, message)?;
        let transport = Self::transport(config)?;
        transport
            .send(email)
            .await
            .map_err(|e| Error::Smtp(format!("Send failed: {e}")))?;
        info!(
            host = %config.host,
            recipients = message.to.len() + message.cc.len(),
            "Message sent"
        );
        Ok(())
    }
}
