//! EXPUNGE command handler.
//!
//! Removes every `\Deleted` message from the selected folder and sends
//! `* N EXPUNGE` for each, where N is the sequence number at the time
//! of that removal.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the EXPUNGE command.
pub async fn handle_expunge<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mutex<Mailbox>,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    // Remove under lock (no await inside).
    let expunged = {
        let mut mb = mailbox.lock().unwrap();
        mb.get_folder_mut(folder_name).map(|folder| {
            let mut seqs = Vec::new();
            let mut idx = 0;
            while idx < folder.emails.len() {
                if folder.emails[idx].deleted {
                    folder.emails.remove(idx);
                    seqs.push(idx + 1);
                } else {
                    idx += 1;
                }
            }
            seqs
        })
    };
    let Some(expunged) = expunged else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    for seq in &expunged {
        let line = format!("* {seq} EXPUNGE\r\n");
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }

    let resp = format!("{tag} OK EXPUNGE completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    const RAW: &[u8] = b"From: a@b.com\r\nSubject: Test\r\n\r\nBody";

    #[tokio::test]
    async fn removes_deleted_emails_with_shifting_sequence_numbers() {
        let mut mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, false, RAW)
            .email(2, false, RAW)
            .email(3, false, RAW)
            .build();
        for email in &mut mailbox.get_folder_mut("INBOX").unwrap().emails {
            email.deleted = email.uid != 2;
        }
        let mb = Mutex::new(mailbox);
        let shared = &mb;

        let output = capture(|mut s| async move {
            handle_expunge("A1", shared, Some("INBOX"), &mut s).await;
        })
        .await;

        assert_eq!(
            output,
            "* 1 EXPUNGE\r\n* 2 EXPUNGE\r\nA1 OK EXPUNGE completed\r\n"
        );
        assert_eq!(mb.lock().unwrap().uids("INBOX"), vec![2]);
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let mb = Mutex::new(MailboxBuilder::new().folder("INBOX").build());
        let shared = &mb;
        let output = capture(|mut s| async move {
            handle_expunge("A1", shared, None, &mut s).await;
        })
        .await;
        assert!(output.contains("A1 BAD No folder selected"));
    }
}
