//! Mailto channel: sends an unsubscribe mail through a configured SMTP
//! relay. Fire-and-forget by design; list operators rarely acknowledge
//! these, so acceptance by the relay is the only signal reported.

use crate::channels::MailSender;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::MailMessage;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Builds a mailer from configuration. Fails when no relay is set or
    /// the sender address does not parse.
    pub fn new(config: &Config) -> Result<Self> {
        let relay = config.smtp_relay.as_deref().ok_or_else(|| {
            AppError::Config("mailto channel requires an SMTP relay".to_string())
        })?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(relay)?
            .port(config.smtp_port)
            .build();
        let sender: Mailbox = config
            .smtp_sender_email
            .parse()
            .map_err(AppError::MailAddress)?;
        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send_unsubscribe(&self, to: &str, message: &MailMessage) -> Result<bool> {
        // Mailto locators may carry query parts (subject hints); the address
        // is everything before '?'.
        let address = to.split('?').next().unwrap_or(to);
        let recipient: Mailbox = address.parse().map_err(AppError::MailAddress)?;

        let subject = "Unsubscribe";
        let body = format!(
            "Please unsubscribe this recipient from your mailing list.\n\n\
             Original message: {}\nOriginal subject: {}\n",
            message.id,
            message.subject.as_deref().unwrap_or("(none)")
        );
        let mail = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .body(body)?;

        tracing::info!(target: "mailto", to = address, message_id = %message.id, "sending unsubscribe mail");
        self.transport.send(mail).await?;
        Ok(true)
    }
}
