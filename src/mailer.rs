//! Outgoing mail (temporary passwords).

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
  #[error("SMTP transport error: {0}")]
  Transport(String),

  #[error("Invalid address: {0}")]
  InvalidAddress(String),

  #[error("Failed to build message: {0}")]
  Build(String),

  #[error("Failed to send: {0}")]
  Send(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
  pub to: String,
  pub subject: String,
  pub body: String,
}

/// Delivery backend selected at startup.
#[derive(Clone)]
pub enum Mailer {
  Smtp(SmtpMailer),
  /// Writes the message to the log instead of delivering it
  Log,
  #[cfg(test)]
  Memory(std::sync::Arc<std::sync::Mutex<Vec<OutgoingMail>>>),
}

impl Mailer {
  pub fn from_config(smtp: Option<&SmtpConfig>) -> Result<Self, MailError> {
    match smtp {
      Some(config) => Ok(Self::Smtp(SmtpMailer::new(config)?)),
      None => {
        tracing::warn!("SMTP not configured, outgoing mail will only be logged");
        Ok(Self::Log)
      }
    }
  }

  pub async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
    match self {
      Self::Smtp(smtp) => smtp.send(&mail).await,
      Self::Log => {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "Mail not delivered (log mailer)");
        Ok(())
      }
      #[cfg(test)]
      Self::Memory(outbox) => {
        outbox
          .lock()
          .map_err(|e| MailError::Send(e.to_string()))?
          .push(mail);
        Ok(())
      }
    }
  }
}

#[derive(Clone)]
pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
  from_address: String,
}

impl SmtpMailer {
  pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
    let creds = Credentials::new(config.username.clone(), config.password.clone());

    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
      .map_err(|e| MailError::Transport(e.to_string()))?
      .port(config.port)
      .credentials(creds)
      .build();

    info!(host = %config.host, port = config.port, "Created SMTP mailer");

    Ok(Self {
      transport,
      from_address: config.from.clone(),
    })
  }

  #[instrument(skip(self, mail), fields(to = %mail.to, subject = %mail.subject))]
  async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
    let from = self
      .from_address
      .parse()
      .map_err(|e| MailError::InvalidAddress(format!("From: {}", e)))?;
    let to = mail
      .to
      .parse()
      .map_err(|e| MailError::InvalidAddress(format!("To '{}': {}", mail.to, e)))?;

    let message = Message::builder()
      .from(from)
      .to(to)
      .subject(&mail.subject)
      .header(ContentType::TEXT_PLAIN)
      .body(mail.body.clone())
      .map_err(|e| MailError::Build(e.to_string()))?;

    self
      .transport
      .send(message)
      .await
      .map_err(|e| MailError::Send(e.to_string()))?;

    info!("Mail sent");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  #[tokio::test]
  async fn test_memory_mailer_records() {
    let outbox = Arc::new(Mutex::new(Vec::new()));
    let mailer = Mailer::Memory(outbox.clone());

    mailer
      .send(OutgoingMail {
        to: "ana@example.com".to_string(),
        subject: "Hello".to_string(),
        body: "Body".to_string(),
      })
      .await
      .unwrap();

    let sent = outbox.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");
  }

  #[tokio::test]
  async fn test_log_mailer_accepts_mail() {
    let mailer = Mailer::from_config(None).unwrap();
    assert!(matches!(mailer, Mailer::Log));
    mailer
      .send(OutgoingMail {
        to: "ana@example.com".to_string(),
        subject: "Hello".to_string(),
        body: "Body".to_string(),
      })
      .await
      .unwrap();
  }
}
