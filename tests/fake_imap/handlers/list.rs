//! LIST and STATUS command handlers.
//!
//! ```text
//! * LIST (\HasNoChildren) "/" "INBOX"
//! * STATUS "INBOX" (MESSAGES 3 UNSEEN 1 RECENT 0)
//! ```
//!
//! STATUS always reports MESSAGES, UNSEEN and RECENT regardless of the
//! items requested.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the LIST command. Emits one `* LIST` line per folder.
pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    for folder in &mailbox.folders {
        let line = format!("* LIST (\\HasNoChildren) \"/\" \"{}\"\r\n", folder.name);
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let resp = format!("{tag} OK LIST completed\r\n");
    let _ = write_line(stream, &resp).await;
}

/// Handle the STATUS command. Unknown folders get a tagged NO.
pub async fn handle_status<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} NO Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };
    let line = format!(
        "* STATUS \"{}\" (MESSAGES {} UNSEEN {} RECENT 0)\r\n",
        folder.name,
        folder.emails.len(),
        folder.unseen()
    );
    if write_line(stream, &line).await.is_err() {
        return;
    }
    let resp = format!("{tag} OK STATUS completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    const RAW: &[u8] = b"From: a@b.com\r\nSubject: Test\r\n\r\nBody";

    #[tokio::test]
    async fn lists_all_folders_then_ok() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .folder("Sent")
            .folder("Trash")
            .build();
        let mb = &mailbox;

        let output = capture(|mut s| async move { handle_list("T1", mb, &mut s).await }).await;

        assert!(output.contains("(\\HasNoChildren) \"/\" \"INBOX\""));
        assert!(output.contains("\"Sent\""));
        assert!(output.contains("\"Trash\""));
        assert!(output.ends_with("T1 OK LIST completed\r\n"));
    }

    #[tokio::test]
    async fn empty_mailbox_returns_only_ok() {
        let mailbox = MailboxBuilder::new().build();
        let mb = &mailbox;
        let output = capture(|mut s| async move { handle_list("T2", mb, &mut s).await }).await;
        assert_eq!(output, "T2 OK LIST completed\r\n");
    }

    #[tokio::test]
    async fn status_counts_messages_and_unseen() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(1, true, RAW)
            .email(2, false, RAW)
            .email(3, false, RAW)
            .build();
        let mb = &mailbox;

        let output =
            capture(|mut s| async move { handle_status("A1", "INBOX", mb, &mut s).await }).await;

        assert!(output.contains("* STATUS \"INBOX\" (MESSAGES 3 UNSEEN 2 RECENT 0)"));
        assert!(output.contains("A1 OK STATUS completed"));
    }

    #[tokio::test]
    async fn status_of_missing_folder_is_no() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let mb = &mailbox;
        let output =
            capture(|mut s| async move { handle_status("A1", "Gone", mb, &mut s).await }).await;
        assert_eq!(output, "A1 NO Folder not found\r\n");
    }
}
