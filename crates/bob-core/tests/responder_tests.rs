//! Email responder integration tests
//!
//! A fake mailbox records what would be sent; the model is a fixed reply.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use bob_core::allowlist::{AllowList, MemoryAllowList, SqliteAllowList};
use bob_core::config::Config;
use bob_core::error::{Error, Result};
use bob_core::mail::{InboundEmail, Mailbox, OutboundEmail};
use bob_core::orchestration::OrchestrationLoop;
use bob_core::provider::{GenerationRequest, TextGenerator};
use bob_core::responder::{Disposition, EmailResponder};
use bob_core::tools::ToolRegistry;

const BOT: &str = "bob.the.pi@gmail.com";

#[derive(Default)]
struct FakeMailbox {
    inbox: Mutex<Vec<InboundEmail>>,
    sent: Mutex<Vec<OutboundEmail>>,
    /// Sending to this address fails
    reject: Option<String>,
}

impl FakeMailbox {
    fn with_inbox(messages: Vec<InboundEmail>) -> Arc<Self> {
        Arc::new(Self {
            inbox: Mutex::new(messages),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn check_new_messages(&self) -> Result<Vec<InboundEmail>> {
        Ok(std::mem::take(&mut *self.inbox.lock()))
    }

    async fn send(&self, email: OutboundEmail) -> Result<()> {
        if self.reject.as_deref() == Some(email.to.as_str()) {
            return Err(Error::Mail("550 mailbox unavailable".into()));
        }
        self.sent.lock().push(email);
        Ok(())
    }
}

struct FixedModel;

#[async_trait]
impl TextGenerator for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        assert!(request.prompt.contains("Subject:"));
        Ok("Assistant: Dear friend, happy to help. Sincerely, Bob the Raspberry Pi".into())
    }
}

fn email(from: &str, subject: &str, body: &str) -> InboundEmail {
    InboundEmail {
        from: from.into(),
        subject: subject.into(),
        body: body.into(),
        message_id: Some(format!("<{}@mail>", subject.len())),
        ..Default::default()
    }
}

fn responder(mailbox: Arc<FakeMailbox>, allow_list: Arc<dyn AllowList>) -> EmailResponder {
    let orchestration = Arc::new(OrchestrationLoop::new(
        &Config::default(),
        Arc::new(FixedModel),
        Arc::new(ToolRegistry::new()),
    ));
    EmailResponder::new(mailbox, allow_list, orchestration, BOT)
        .with_approved_phrase(Some("Friend of Nate".into()))
}

#[tokio::test]
async fn test_approved_sender_gets_reply() {
    let mailbox = FakeMailbox::with_inbox(vec![email("Nate <nate@example.com>", "Hello", "How are you?")]);
    let allow_list = Arc::new(MemoryAllowList::with_addresses(["nate@example.com"]));

    let report = responder(mailbox.clone(), allow_list).process_inbox().await.unwrap();

    assert_eq!(report.replied(), 1);
    let sent = mailbox.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "nate@example.com");
    assert_eq!(sent[0].subject, "Re: Hello");
    assert_eq!(sent[0].body, "Dear friend, happy to help. Sincerely, Bob the Raspberry Pi");
    assert_eq!(sent[0].in_reply_to.as_deref(), Some("<5@mail>"));
}

#[tokio::test]
async fn test_unknown_sender_ignored() {
    let mailbox = FakeMailbox::with_inbox(vec![email("stranger@example.com", "Hi", "Buy now")]);
    let allow_list = Arc::new(MemoryAllowList::new());

    let report = responder(mailbox.clone(), allow_list).process_inbox().await.unwrap();

    assert_eq!(report.processed[0].disposition, Disposition::NotApproved);
    assert!(mailbox.sent.lock().is_empty());
}

#[tokio::test]
async fn test_phrase_approves_sender() {
    let mailbox = FakeMailbox::with_inbox(vec![email(
        "Ann <ann@example.com>",
        "Intro",
        "Hi Bob, I'm a FRIEND OF NATE. Can you help?",
    )]);
    let allow_list = Arc::new(MemoryAllowList::new());

    let report = responder(mailbox.clone(), allow_list.clone()).process_inbox().await.unwrap();

    assert!(matches!(
        report.processed[0].disposition,
        Disposition::ApprovedAndReplied { .. }
    ));
    assert!(allow_list.is_approved("ann@example.com").unwrap());
    assert_eq!(mailbox.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_own_messages_skipped() {
    let mailbox = FakeMailbox::with_inbox(vec![email("Bob <bobthepi@gmail.com>", "Loop", "Friend of Nate")]);
    let allow_list = Arc::new(MemoryAllowList::new());

    let report = responder(mailbox.clone(), allow_list.clone()).process_inbox().await.unwrap();

    assert_eq!(report.processed[0].disposition, Disposition::OwnMessage);
    assert!(mailbox.sent.lock().is_empty());
    assert!(!allow_list.is_approved("bobthepi@gmail.com").unwrap());
}

#[tokio::test]
async fn test_send_failure_does_not_stop_batch() {
    let mailbox = Arc::new(FakeMailbox {
        inbox: Mutex::new(vec![
            email("bad@example.com", "First", "hello"),
            email("good@example.com", "Second", "hello"),
        ]),
        reject: Some("bad@example.com".into()),
        ..Default::default()
    });
    let allow_list = Arc::new(MemoryAllowList::with_addresses(["bad@example.com", "good@example.com"]));

    let report = responder(mailbox.clone(), allow_list).process_inbox().await.unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.replied(), 1);
    assert_eq!(mailbox.sent.lock()[0].to, "good@example.com");
}

#[tokio::test]
async fn test_sqlite_allow_list_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("bob.db");

    {
        let list = SqliteAllowList::open(&path).unwrap();
        assert!(list.approve("nate@example.com").unwrap());
    }

    let reopened: Arc<dyn AllowList> = Arc::new(SqliteAllowList::open(&path).unwrap());
    assert!(reopened.is_approved("Nate@Example.com").unwrap());

    let mailbox = FakeMailbox::with_inbox(vec![email("nate@example.com", "Ping", "ping")]);
    let report = responder(mailbox.clone(), reopened).process_inbox().await.unwrap();
    assert_eq!(report.replied(), 1);
}
