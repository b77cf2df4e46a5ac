//! Shared I/O helpers for the fake IMAP server.
//!
//! Every write is flushed immediately to keep the server deterministic.

use imap_codec::imap_types::core::AString;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Write a string to the stream and flush.
pub async fn write_line<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    line: &str,
) -> std::io::Result<()> {
    stream.get_mut().write_all(line.as_bytes()).await?;
    stream.get_mut().flush().await
}

/// Write raw bytes to the stream and flush.
pub async fn write_bytes<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    data: &[u8],
) -> std::io::Result<()> {
    stream.get_mut().write_all(data).await?;
    stream.get_mut().flush().await
}

/// Folder name of a parsed `imap_types::Mailbox`.
pub fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

pub fn astring(value: &AString<'_>) -> String {
    let bytes: &[u8] = value.as_ref();
    String::from_utf8_lossy(bytes).into_owned()
}

/// Expand a UID set. `*` stands for `max_uid`; ranges may be given in
/// either order.
pub fn expand_uids(seq_set: &SequenceSet, max_uid: u32) -> Vec<u32> {
    let value = |v: &SeqOrUid| match v {
        SeqOrUid::Value(v) => v.get(),
        SeqOrUid::Asterisk => max_uid,
    };
    let mut uids = Vec::new();
    for seq in seq_set.0.as_ref() {
        match seq {
            Sequence::Single(v) => uids.push(value(v)),
            Sequence::Range(a, b) => {
                let (lo, hi) = (value(a).min(value(b)), value(a).max(value(b)));
                uids.extend(lo..=hi);
            }
        }
    }
    uids
}

/// Run a handler against an in-memory stream and return everything it
/// wrote.
#[cfg(test)]
pub async fn capture<F, Fut>(handler: F) -> String
where
    F: FnOnce(BufReader<tokio::io::DuplexStream>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    handler(BufReader::new(server)).await;

    let mut buf = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
        .await
        .unwrap();
    String::from_utf8(buf).unwrap()
}
