use async_trait::async_trait;

use crate::credential::errors::EmailDeliveryError;
use crate::domain::credential::models::EmailMessage;
use crate::domain::credential::ports::EmailSender;

/// Development email sender that writes messages to the log instead of
/// delivering them. Stands behind the same port as a real SMTP adapter.
pub struct LogEmailSender {
    from: String,
}

impl LogEmailSender {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailDeliveryError> {
        tracing::info!(
            from = %self.from,
            to = %message.to,
            subject = %message.subject,
            "Email sent (log delivery)"
        );
        tracing::debug!(body = %message.body, "Email body");
        Ok(())
    }
}
