//! send_email and schedule_email tools

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde_json::Value;
use tracing::{error, info};

use crate::error::ToolError;
use crate::mail::{Mailbox, OutboundEmail};
use crate::tools::{str_param, BoxFuture, Tool, ToolOutput};

/// Format accepted for `send_time`
pub const SEND_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn outbound_from(params: &Value) -> Result<OutboundEmail, ToolError> {
    let recipient = str_param(params, "recipient")?;
    if !recipient.contains('@') {
        return Err(ToolError::InvalidParams(format!(
            "recipient '{}' is not an email address",
            recipient
        )));
    }
    Ok(OutboundEmail::new(
        recipient,
        str_param(params, "subject")?,
        str_param(params, "body")?,
    ))
}

/// Sends an email immediately
pub struct SendEmail {
    mailbox: Arc<dyn Mailbox>,
}

impl SendEmail {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self { mailbox }
    }
}

impl Tool for SendEmail {
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let email = outbound_from(&params)?;
            let to = email.to.clone();
            self.mailbox.send(email).await?;
            Ok(ToolOutput::text(format!("Email sent to {}.", to)))
        })
    }
}

/// Sends an email at a later local time from a background task
pub struct ScheduleEmail {
    mailbox: Arc<dyn Mailbox>,
}

impl ScheduleEmail {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self { mailbox }
    }
}

/// Parse `send_time` as local time and return how long to wait
pub fn delay_until(send_time: &str, now: DateTime<Local>) -> Result<Duration, ToolError> {
    let naive = NaiveDateTime::parse_from_str(send_time.trim(), SEND_TIME_FORMAT).map_err(|e| {
        ToolError::InvalidParams(format!(
            "invalid send_time '{}', use YYYY-MM-DD HH:MM ({})",
            send_time, e
        ))
    })?;

    let target = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ToolError::InvalidParams(format!("send_time '{}' does not exist locally", send_time)))?;

    (target - now)
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| ToolError::InvalidParams("send_time must be in the future".into()))
}

impl Tool for ScheduleEmail {
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let email = outbound_from(&params)?;
            let send_time = str_param(&params, "send_time")?.to_string();
            let delay = delay_until(&send_time, Local::now())?;

            let mailbox = self.mailbox.clone();
            let to = email.to.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let to = email.to.clone();
                match mailbox.send(email).await {
                    Ok(()) => info!(to = %to, "Scheduled email sent"),
                    Err(e) => error!(to = %to, "Scheduled email failed: {}", e),
                }
            });

            info!(to = %to, send_time = %send_time, "Email scheduled");
            Ok(ToolOutput::text(format!(
                "Email to {} scheduled for {}.",
                to, send_time
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingMailbox {
        sent: Mutex<Vec<OutboundEmail>>,
    }

    #[async_trait]
    impl Mailbox for RecordingMailbox {
        async fn check_new_messages(&self) -> Result<Vec<crate::mail::InboundEmail>> {
            Ok(Vec::new())
        }

        async fn send(&self, email: OutboundEmail) -> Result<()> {
            self.sent.lock().push(email);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_email() {
        let mailbox = Arc::new(RecordingMailbox::default());
        let tool = SendEmail::new(mailbox.clone());

        let output = tool
            .execute(json!({"recipient": "nate@example.com", "subject": "Hi", "body": "Hello"}))
            .await
            .unwrap();
        assert!(output.content.contains("nate@example.com"));

        let sent = mailbox.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Hi");
    }

    #[tokio::test]
    async fn test_send_email_rejects_bad_recipient() {
        let tool = SendEmail::new(Arc::new(RecordingMailbox::default()));
        let err = tool
            .execute(json!({"recipient": "nate", "subject": "Hi", "body": "Hello"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[test]
    fn test_delay_until() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            delay_until("2026-03-10 12:30", now).unwrap(),
            Duration::from_secs(30 * 60)
        );
        assert!(delay_until("2026-03-10 11:59", now).is_err());
        assert!(delay_until("2026-03-10 12:00", now).is_err());
        assert!(delay_until("tomorrow at noon", now).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_email_sends_later() {
        let mailbox = Arc::new(RecordingMailbox::default());
        let tool = ScheduleEmail::new(mailbox.clone());
        let send_time = (Local::now() + chrono::Duration::hours(2))
            .format(SEND_TIME_FORMAT)
            .to_string();

        tool.execute(json!({
            "recipient": "nate@example.com",
            "subject": "Later",
            "body": "Reminder",
            "send_time": send_time,
        }))
        .await
        .unwrap();
        tokio::task::yield_now().await;
        assert!(mailbox.sent.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        assert_eq!(mailbox.sent.lock().len(), 1);
    }
}
