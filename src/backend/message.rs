//! RFC 5322 message parsing with `mailparse`

use super::{Attachment, ItemDetail, ItemSummary};
use crate::error::{Error, Result};
use crate::flag::Flag;
use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};

/// Parse the headers of a raw message into a listing entry.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the message cannot be parsed at all.
pub fn parse_summary(uid: u32, raw: &[u8], flags: Vec<Flag>) -> Result<ItemSummary> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
    Ok(summary_of(uid, raw.len(), &parsed, flags))
}

/// Parse a full message: headers, text bodies and attachments.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the message cannot be parsed at all.
pub fn parse_detail(uid: u32, raw: &[u8], flags: Vec<Flag>) -> Result<ItemDetail> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
    let summary = summary_of(uid, raw.len(), &parsed, flags);
    let headers = &parsed.headers;

    let mut detail = ItemDetail {
        summary,
        cc: headers
            .get_first_value("Cc")
            .map(|v| addresses(&v))
            .unwrap_or_default(),
        reply_to: headers
            .get_first_value("Reply-To")
            .and_then(|v| addresses(&v).into_iter().next()),
        in_reply_to: headers
            .get_first_value("In-Reply-To")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        references: headers
            .get_first_value("References")
            .map(|v| v.split_whitespace().map(ToString::to_string).collect())
            .unwrap_or_default(),
        body_plain: None,
        body_html: None,
        attachments: Vec::new(),
    };
    collect_parts(&parsed, &mut detail);
    Ok(detail)
}

fn summary_of(uid: u32, size: usize, parsed: &ParsedMail<'_>, flags: Vec<Flag>) -> ItemSummary {
    let headers = &parsed.headers;
    ItemSummary {
        uid,
        message_id: headers
            .get_first_value("Message-ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        from: headers.get_first_value("From").unwrap_or_default(),
        to: headers
            .get_first_value("To")
            .map(|v| addresses(&v))
            .unwrap_or_default(),
        date: headers
            .get_first_value("Date")
            .and_then(|v| mailparse::dateparse(&v).ok())
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        size,
        flags,
    }
}

fn collect_parts(part: &ParsedMail<'_>, detail: &mut ItemDetail) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_parts(sub, detail);
        }
        return;
    }

    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned();
    let is_attachment =
        matches!(disposition.disposition, DispositionType::Attachment) || filename.is_some();
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();

    if !is_attachment && mimetype == "text/plain" && detail.body_plain.is_none() {
        detail.body_plain = part.get_body().ok();
    } else if !is_attachment && mimetype == "text/html" && detail.body_html.is_none() {
        detail.body_html = part.get_body().ok();
    } else if is_attachment {
        let data = part.get_body_raw().unwrap_or_default();
        detail.attachments.push(Attachment {
            filename: filename.unwrap_or_else(|| "attachment".to_string()),
            content_type: mimetype,
            size: data.len(),
            data,
        });
    }
}

/// Bare addresses from an address-list header value.
#[must_use]
pub fn addresses(value: &str) -> Vec<String> {
    let Ok(list) = mailparse::addrparse(value) else {
        return value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
    };
    let mut out = Vec::new();
    for addr in list.iter() {
        match addr {
            MailAddr::Single(info) => out.push(info.addr.clone()),
            MailAddr::Group(group) => out.extend(group.addrs.iter().map(|i| i.addr.clone())),
        }
    }
    out
}
