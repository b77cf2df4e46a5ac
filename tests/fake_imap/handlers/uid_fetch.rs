//! UID FETCH command handler.
//!
//! Message bodies travel as **counted literals**:
//!
//! ```text
//! * <seq> FETCH (UID <uid> FLAGS (<flags>) BODY[] {<length>}
//! <exactly length bytes of raw RFC 2822 message>
//! )
//! ```
//!
//! The sequence number is the 1-based index of the message within the
//! folder, per RFC 3501 Section 7.4.2. Fetching never sets `\Seen`;
//! the client always asks for `BODY.PEEK[]`.

use crate::fake_imap::io::{expand_uids, write_bytes, write_line};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::SequenceSet;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the UID FETCH command. Returns flags and the full message.
pub async fn handle_uid_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let max_uid = folder.emails.iter().map(|e| e.uid).max().unwrap_or(0);
    for uid in expand_uids(sequence_set, max_uid) {
        let Some((idx, email)) = folder.emails.iter().enumerate().find(|(_, e)| e.uid == uid) else {
            continue;
        };
        let seq = idx + 1;
        let header = format!(
            "* {seq} FETCH (UID {uid} FLAGS ({}) BODY[] {{{}}}\r\n",
            email.flag_list(),
            email.raw.len()
        );
        if write_line(stream, &header).await.is_err()
            || write_bytes(stream, &email.raw).await.is_err()
            || write_line(stream, ")\r\n").await.is_err()
        {
            return;
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use imap_codec::imap_types::sequence::{SeqOrUid, Sequence};
    use std::num::NonZeroU32;

    const RAW: &[u8] = b"From: a@b.com\r\nSubject: Test\r\n\r\nBody";

    fn uid_set(uid: u32) -> SequenceSet {
        SequenceSet(
            vec![Sequence::Single(SeqOrUid::Value(
                NonZeroU32::new(uid).unwrap(),
            ))]
            .try_into()
            .unwrap(),
        )
    }

    async fn run(set: &SequenceSet, mailbox: &Mailbox, selected: Option<&str>) -> String {
        capture(|mut s| async move {
            handle_uid_fetch("A1", set, mailbox, selected, &mut s).await;
        })
        .await
    }

    #[tokio::test]
    async fn fetches_flags_and_literal() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(7, true, RAW)
            .email(42, false, RAW)
            .flagged()
            .build();

        let output = run(&uid_set(42), &mailbox, Some("INBOX")).await;

        let literal = format!("{{{}}}", RAW.len());
        assert!(output.contains(&format!("* 2 FETCH (UID 42 FLAGS (\\Flagged) BODY[] {literal}")));
        assert!(output.contains("From: a@b.com"));
        assert!(output.ends_with("A1 OK FETCH completed\r\n"));
    }

    #[tokio::test]
    async fn missing_uid_returns_only_ok() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let output = run(&uid_set(99), &mailbox, Some("INBOX")).await;
        assert_eq!(output, "A1 OK FETCH completed\r\n");
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let output = run(&uid_set(1), &mailbox, None).await;
        assert!(output.contains("A1 BAD No folder selected"));
    }
}
