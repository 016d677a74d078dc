//! IMAP polling and SMTP sending
//!
//! Each call opens its own connection and closes it before returning, so no
//! session outlives a single poll or send.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::{Error, Result};

use super::{InboundEmail, Mailbox, OutboundEmail};

/// Mailbox backed by an IMAP server for reading and SMTP for sending
pub struct ImapSmtpMailbox {
    config: MailConfig,
    password: String,
    attachments_dir: PathBuf,
}

impl ImapSmtpMailbox {
    pub fn new(config: MailConfig, password: impl Into<String>) -> Self {
        let attachments_dir = config.attachments_dir();
        Self {
            config,
            password: password.into(),
            attachments_dir,
        }
    }

    /// Build from config, reading the password from its environment variable
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        if config.address.is_empty() {
            return Err(Error::Config("mail.address is not set".into()));
        }
        let password = config.password().ok_or_else(|| {
            Error::Config(format!("mail password not set in ${}", config.password_env))
        })?;
        Ok(Self::new(config.clone(), password))
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    async fn poll_unseen(&self) -> Result<Vec<InboundEmail>> {
        use async_native_tls::TlsConnector;
        use tokio_util::compat::TokioAsyncReadCompatExt;

        let host = self.config.imap_host.as_str();
        debug!("IMAP: connecting to {}:{}", host, self.config.imap_port);
        let tcp = tokio::net::TcpStream::connect((host, self.config.imap_port))
            .await
            .map_err(|e| Error::Mail(format!("IMAP TCP connect failed: {}", e)))?;

        let tls_stream = TlsConnector::new()
            .connect(host, tcp.compat())
            .await
            .map_err(|e| Error::Mail(format!("IMAP TLS handshake failed: {}", e)))?;

        let client = async_imap::Client::new(tls_stream);
        let mut session = client
            .login(&self.config.address, &self.password)
            .await
            .map_err(|e| Error::Mail(format!("IMAP LOGIN failed: {}", e.0)))?;

        session
            .select("INBOX")
            .await
            .map_err(|e| Error::Mail(format!("IMAP SELECT INBOX failed: {}", e)))?;

        let unseen = session
            .uid_search("UNSEEN")
            .await
            .map_err(|e| Error::Mail(format!("IMAP UID SEARCH failed: {}", e)))?;

        if unseen.is_empty() {
            debug!("IMAP: no unseen messages");
            session.logout().await.ok();
            return Ok(Vec::new());
        }

        let mut uids: Vec<u32> = unseen.into_iter().collect();
        uids.sort_unstable();
        let uid_set = uids
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",");

        debug!("IMAP: fetching UIDs {}", uid_set);
        let fetched: Vec<async_imap::types::Fetch> = session
            .uid_fetch(&uid_set, "(RFC822 UID)")
            .await
            .map_err(|e| Error::Mail(format!("IMAP UID FETCH failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| Error::Mail(format!("IMAP UID FETCH failed: {}", e)))?;

        let mut emails = Vec::new();
        for fetch in &fetched {
            let Some(raw) = fetch.body() else {
                continue;
            };
            match parse_message(raw, fetch.uid, &self.attachments_dir).await {
                Some(email) => emails.push(email),
                None => warn!("IMAP: failed to parse message {:?}", fetch.uid),
            }
        }

        let _updates: Vec<async_imap::types::Fetch> = session
            .uid_store(&uid_set, "+FLAGS (\\Seen)")
            .await
            .map_err(|e| Error::Mail(format!("IMAP UID STORE failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| Error::Mail(format!("IMAP UID STORE failed: {}", e)))?;

        session.logout().await.ok();
        info!(count = emails.len(), "Fetched new messages");
        Ok(emails)
    }

    async fn send_smtp(&self, email: OutboundEmail) -> Result<()> {
        use lettre::message::header::ContentType;
        use lettre::message::{Attachment, Mailbox as Address, MultiPart, SinglePart};
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        let from: Address = self
            .config
            .address
            .parse()
            .map_err(|e| Error::Mail(format!("Invalid from address '{}': {}", self.config.address, e)))?;
        let to: Address = email
            .to
            .trim()
            .parse()
            .map_err(|e| Error::Mail(format!("Invalid recipient '{}': {}", email.to, e)))?;

        let mut builder = Message::builder().from(from).to(to).subject(email.subject.clone());
        if let Some(id) = email.in_reply_to.as_deref().filter(|id| !id.is_empty()) {
            builder = builder.in_reply_to(id.to_string()).references(id.to_string());
        }

        let message = if email.attachments.is_empty() {
            builder.body(email.body.clone())
        } else {
            let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone()));
            for path in &email.attachments {
                let bytes = match tokio::fs::read(path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Attachment {} not readable: {}", path.display(), e);
                        continue;
                    }
                };
                let content_type = ContentType::parse(mime_for(path))
                    .map_err(|e| Error::Mail(format!("Bad content type: {}", e)))?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment".to_string());
                parts = parts.singlepart(Attachment::new(filename).body(bytes, content_type));
            }
            builder.multipart(parts)
        }
        .map_err(|e| Error::Mail(format!("Failed to build email: {}", e)))?;

        let creds = Credentials::new(self.config.address.clone(), self.password.clone());
        let host = self.config.smtp_host.as_str();
        let relay = if self.config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| Error::Mail(format!("SMTP setup failed: {}", e)))?;

        let mailer = relay.port(self.config.smtp_port).credentials(creds).build();
        mailer
            .send(message)
            .await
            .map_err(|e| Error::Mail(format!("SMTP send failed: {}", e)))?;

        info!(to = %email.to, attachments = email.attachments.len(), "Email sent");
        Ok(())
    }
}

#[async_trait]
impl Mailbox for ImapSmtpMailbox {
    async fn check_new_messages(&self) -> Result<Vec<InboundEmail>> {
        self.poll_unseen().await
    }

    async fn send(&self, email: OutboundEmail) -> Result<()> {
        self.send_smtp(email).await
    }
}

/// Parse a raw RFC 822 message, saving image attachments under `dir`
async fn parse_message(raw: &[u8], uid: Option<u32>, dir: &Path) -> Option<InboundEmail> {
    use mail_parser::{MessageParser, MimeHeaders};

    let parsed = MessageParser::default().parse(raw)?;

    let from = parsed
        .from()
        .and_then(|addrs| addrs.first())
        .map(|addr| match (addr.name(), addr.address()) {
            (Some(name), Some(address)) => format!("{} <{}>", name, address),
            (None, Some(address)) => address.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => String::new(),
        })
        .unwrap_or_default();

    let body = parsed
        .body_text(0)
        .or_else(|| parsed.body_html(0))
        .map(|t| t.to_string())
        .unwrap_or_default();

    let mut attachments = Vec::new();
    for part in parsed.attachments() {
        let is_image = part
            .content_type()
            .is_some_and(|ct| ct.ctype().eq_ignore_ascii_case("image"));
        if !is_image {
            continue;
        }
        let name = part.attachment_name().unwrap_or("image");
        match save_attachment(dir, name, part.contents()).await {
            Ok(path) => attachments.push(path),
            Err(e) => warn!("Failed to save attachment {}: {}", name, e),
        }
    }

    Some(InboundEmail {
        uid,
        from,
        subject: parsed.subject().unwrap_or("").to_string(),
        body,
        message_id: parsed.message_id().map(|s| s.to_string()),
        attachments,
    })
}

async fn save_attachment(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_{}", stamp, sanitize_filename(name)));
    tokio::fs::write(&path, bytes).await?;
    debug!("Saved attachment to {}", path.display());
    Ok(path)
}

/// Keep only characters that are safe in a file name
pub(crate) fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
