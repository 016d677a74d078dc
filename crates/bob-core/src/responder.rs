//! Email responder
//!
//! Processes one batch of unseen mail: filters senders through the
//! allow-list, turns each message into a prompt, runs a fresh orchestration
//! for it and mails the answer back with any generated files attached.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::allowlist::AllowList;
use crate::error::Result;
use crate::mail::{parse_thread, reply_subject, same_address, InboundEmail, Mailbox, OutboundEmail, ThreadBody};
use crate::orchestration::OrchestrationLoop;

/// Characters of quoted thread history put into a prompt
const HISTORY_CHARS: usize = 2000;

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Replied { artifacts: Vec<PathBuf>, degraded: bool },
    /// Sender was approved by the phrase in this message, then answered
    ApprovedAndReplied { artifacts: Vec<PathBuf>, degraded: bool },
    NotApproved,
    /// Sent by the bot's own address
    OwnMessage,
    Failed(String),
}

impl Disposition {
    pub fn is_reply(&self) -> bool {
        matches!(self, Disposition::Replied { .. } | Disposition::ApprovedAndReplied { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedEmail {
    pub sender: String,
    pub subject: String,
    pub disposition: Disposition,
}

/// Summary of one inbox pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboxReport {
    pub processed: Vec<ProcessedEmail>,
}

impl InboxReport {
    pub fn replied(&self) -> usize {
        self.processed.iter().filter(|p| p.disposition.is_reply()).count()
    }

    pub fn failed(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| matches!(p.disposition, Disposition::Failed(_)))
            .count()
    }
}

pub struct EmailResponder {
    mailbox: Arc<dyn Mailbox>,
    allow_list: Arc<dyn AllowList>,
    orchestration: Arc<OrchestrationLoop>,
    own_address: String,
    approved_phrase: Option<String>,
}

impl EmailResponder {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        allow_list: Arc<dyn AllowList>,
        orchestration: Arc<OrchestrationLoop>,
        own_address: impl Into<String>,
    ) -> Self {
        Self {
            mailbox,
            allow_list,
            orchestration,
            own_address: own_address.into(),
            approved_phrase: None,
        }
    }

    /// Phrase that admits a sender not yet on the allow-list
    pub fn with_approved_phrase(mut self, phrase: Option<String>) -> Self {
        self.approved_phrase = phrase.map(|p| p.trim().to_lowercase()).filter(|p| !p.is_empty());
        self
    }

    /// Fetch unseen mail and answer every approved message. Only a failure
    /// to fetch is an error; per-message failures are reported.
    pub async fn process_inbox(&self) -> Result<InboxReport> {
        let messages = self.mailbox.check_new_messages().await?;
        info!(count = messages.len(), "Checked inbox");

        let mut report = InboxReport::default();
        for email in &messages {
            let disposition = self.handle(email).await;
            report.processed.push(ProcessedEmail {
                sender: email.sender_address(),
                subject: email.subject.clone(),
                disposition,
            });
        }
        Ok(report)
    }

    async fn handle(&self, email: &InboundEmail) -> Disposition {
        let sender = email.sender_address();
        info!(from = %sender, subject = %email.subject, "Processing email");

        if same_address(&self.own_address, &sender) {
            info!(from = %sender, "Skipping message from own address");
            return Disposition::OwnMessage;
        }

        let newly_approved = match self.check_sender(&sender, &email.body) {
            Ok(Some(newly_approved)) => newly_approved,
            Ok(None) => {
                info!(from = %sender, "Sender not approved, ignoring");
                return Disposition::NotApproved;
            }
            Err(e) => {
                error!(from = %sender, "Allow-list lookup failed: {}", e);
                return Disposition::Failed(e.to_string());
            }
        };

        let thread = parse_thread(&email.body);
        let prompt = build_prompt(email, &thread);
        let outcome = self.orchestration.run(&prompt).await;

        let mut reply = OutboundEmail::new(&sender, reply_subject(&email.subject), &outcome.response)
            .with_attachments(outcome.artifacts.clone());
        reply.in_reply_to = email.message_id.clone();

        if let Err(e) = self.mailbox.send(reply).await {
            error!(to = %sender, "Failed to send reply: {}", e);
            return Disposition::Failed(e.to_string());
        }
        info!(to = %sender, attachments = outcome.artifacts.len(), "Reply sent");

        if newly_approved {
            Disposition::ApprovedAndReplied {
                artifacts: outcome.artifacts,
                degraded: outcome.degraded,
            }
        } else {
            Disposition::Replied {
                artifacts: outcome.artifacts,
                degraded: outcome.degraded,
            }
        }
    }

    /// `Some(newly_approved)` when the sender may be answered
    fn check_sender(&self, sender: &str, body: &str) -> Result<Option<bool>> {
        if self.allow_list.is_approved(sender)? {
            return Ok(Some(false));
        }
        match &self.approved_phrase {
            Some(phrase) if body.to_lowercase().contains(phrase.as_str()) => {
                warn!(from = %sender, "Unknown sender used the approval phrase, approving");
                self.allow_list.approve(sender)?;
                Ok(Some(true))
            }
            _ => Ok(None),
        }
    }
}

/// Prompt text for one message: subject, latest message, earlier thread
pub fn build_prompt(email: &InboundEmail, thread: &ThreadBody) -> String {
    let mut prompt = format!("Subject: {}\n\n{}", email.subject.trim(), thread.body);

    let history = thread.condensed_history(HISTORY_CHARS);
    if !history.is_empty() {
        prompt.push_str("\n\nEarlier in this conversation:\n");
        prompt.push_str(&history);
    }

    if !email.attachments.is_empty() {
        let names: Vec<String> = email
            .attachments
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        prompt.push_str(&format!("\n\n(The sender attached: {})", names.join(", ")));
    }

    prompt
}
