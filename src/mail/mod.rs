//! Mail delivery of finished exports
//!
//! The scheduler hands every completed export to a [`Mailer`]. Delivery is
//! outside this crate: [`SpoolMailer`] writes each message as a JSON document
//! into a spool directory for whatever transport picks it up.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{FormSettings, MailConfig};
use crate::error::{MailError, Result};

/// One outgoing message with file attachments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl Message {
    /// Message announcing a finished export of one form
    ///
    /// Subject and body fall back to the configured defaults when the form
    /// leaves them empty.
    ///
    /// # Arguments
    /// * `settings` - Form settings holding recipients and texts
    /// * `mail` - Sender and fallback texts
    /// * `attachments` - Export files to attach
    pub fn for_export(
        settings: &FormSettings,
        mail: &MailConfig,
        attachments: Vec<PathBuf>,
    ) -> Result<Self> {
        let to = settings.recipients();
        if to.is_empty() {
            return Err(MailError::NoRecipients.into());
        }

        Ok(Self {
            to,
            from: sender_address(&mail.from_name),
            subject: non_empty(settings.email_subject.as_deref())
                .unwrap_or(&mail.default_subject)
                .to_string(),
            body: non_empty(settings.email_content.as_deref())
                .unwrap_or(&mail.default_content)
                .to_string(),
            attachments,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// `Name <name@host>` for the local host
pub fn sender_address(from_name: &str) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    let local_part = from_name.to_lowercase().replace(char::is_whitespace, "");
    format!("{from_name} <{local_part}@{host}>")
}

/// Delivery of export messages
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hand a message over for delivery
    async fn send(&self, message: &Message) -> Result<()>;
}

/// Mailer that writes messages into a spool directory
pub struct SpoolMailer {
    spool_dir: PathBuf,
    sequence: AtomicU64,
}

impl SpoolMailer {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }
}

#[async_trait]
impl Mailer for SpoolMailer {
    async fn send(&self, message: &Message) -> Result<()> {
        for attachment in &message.attachments {
            if !tokio::fs::try_exists(attachment).await.unwrap_or(false) {
                return Err(MailError::AttachmentMissing(attachment.display().to_string()).into());
            }
        }

        tokio::fs::create_dir_all(&self.spool_dir)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!("message-{}-{seq}.json", Utc::now().format("%Y%m%dT%H%M%S%.3f"));
        let path = self.spool_dir.join(name);

        let body = serde_json::to_vec_pretty(message)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| MailError::SendFailed(format!("{}: {e}", path.display())))?;

        debug!("Spooled message to {}", path.display());
        info!(
            "Queued \"{}\" for {} with {} attachment(s)",
            message.subject,
            message.to.join(", "),
            message.attachments.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutoexportError;

    fn settings(address: &str) -> FormSettings {
        FormSettings {
            email_address: address.to_string(),
            ..FormSettings::default()
        }
    }

    #[test]
    fn test_message_defaults() {
        let message = Message::for_export(
            &settings(" a@example.com ,b@example.com,"),
            &MailConfig::default(),
            Vec::new(),
        )
        .unwrap();

        assert_eq!(message.to, vec!["a@example.com", "b@example.com"]);
        assert_eq!(message.subject, "Automatic Form Export");
        assert_eq!(message.body, "CSV export is attached to this message");
        assert!(message.from.starts_with("autoexport <autoexport@"));
    }

    #[test]
    fn test_message_uses_form_texts() {
        let mut form = settings("ops@example.com");
        form.email_subject = Some("Weekly leads".to_string());
        form.email_content = Some("   ".to_string());

        let message = Message::for_export(&form, &MailConfig::default(), Vec::new()).unwrap();
        assert_eq!(message.subject, "Weekly leads");
        assert_eq!(message.body, "CSV export is attached to this message");
    }

    #[test]
    fn test_message_requires_recipients() {
        let result = Message::for_export(&settings(" , "), &MailConfig::default(), Vec::new());
        assert!(matches!(
            result,
            Err(AutoexportError::Mail(MailError::NoRecipients))
        ));
    }

    #[tokio::test]
    async fn test_spool_mailer_writes_message() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = dir.path().join("export-1.csv");
        tokio::fs::write(&attachment, b"data").await.unwrap();

        let mailer = SpoolMailer::new(dir.path().join("outbox"));
        let message = Message::for_export(
            &settings("ops@example.com"),
            &MailConfig::default(),
            vec![attachment.clone()],
        )
        .unwrap();
        mailer.send(&message).await.unwrap();

        let mut entries = tokio::fs::read_dir(mailer.spool_dir()).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let spooled: Message =
            serde_json::from_slice(&tokio::fs::read(entry.path()).await.unwrap()).unwrap();
        assert_eq!(spooled, message);
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spool_mailer_missing_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = SpoolMailer::new(dir.path());
        let message = Message::for_export(
            &settings("ops@example.com"),
            &MailConfig::default(),
            vec![dir.path().join("gone.csv")],
        )
        .unwrap();

        assert!(matches!(
            mailer.send(&message).await,
            Err(AutoexportError::Mail(MailError::AttachmentMissing(_)))
        ));
    }
}
