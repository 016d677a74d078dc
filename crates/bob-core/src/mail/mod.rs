//! Mail collaborator
//!
//! The responder and the email tools only see the [`Mailbox`] trait. The
//! production implementation is [`ImapSmtpMailbox`].

pub mod history;
pub mod imap;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use history::{parse_thread, QuotedMessage, ThreadBody};
pub use imap::ImapSmtpMailbox;

/// A message fetched from the inbox
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundEmail {
    /// Server UID, when the message came from IMAP
    pub uid: Option<u32>,
    /// Raw `From` header, e.g. `Jane Doe <jane@example.com>`
    pub from: String,
    pub subject: String,
    pub body: String,
    pub message_id: Option<String>,
    /// Attachments saved to disk
    pub attachments: Vec<PathBuf>,
}

impl InboundEmail {
    /// Bare sender address taken from the `From` header
    pub fn sender_address(&self) -> String {
        extract_email_address(&self.from)
    }
}

/// A message to send
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
    /// Message-ID this mail answers, for threading
    pub in_reply_to: Option<String>,
}

impl OutboundEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<PathBuf>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Mail transport used by the responder and the email tools
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetch unseen messages and mark them read
    async fn check_new_messages(&self) -> Result<Vec<InboundEmail>>;

    /// Send one message
    async fn send(&self, email: OutboundEmail) -> Result<()>;

    /// Send a reply with optional attachments
    async fn send_reply(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: Vec<PathBuf>,
    ) -> Result<()> {
        self.send(OutboundEmail::new(to, subject, body).with_attachments(attachments))
            .await
    }
}

/// Extract the address from `Name <email@domain>` or plain `email@domain`
pub fn extract_email_address(raw: &str) -> String {
    if let Some(start) = raw.find('<') {
        if let Some(end) = raw[start..].find('>') {
            return raw[start + 1..start + end].trim().to_string();
        }
    }
    raw.trim().to_string()
}

/// Compare two addresses ignoring case and dots, the way Gmail does
pub fn same_address(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.trim().replace('.', "").to_lowercase();
    !a.trim().is_empty() && normalize(a) == normalize(b)
}

/// Subject for a reply, without stacking `Re:` prefixes
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("re:")) {
        trimmed.to_string()
    } else if trimmed.is_empty() {
        "Re: Your message".to_string()
    } else {
        format!("Re: {}", trimmed)
    }
}
