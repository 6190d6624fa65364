//! SESv2 implementation of the notification channel.

use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use tracing::info;

use permafrost_core::{Error, Notification, NotificationChannel, Result};

/// Email delivery over AWS SESv2.
pub struct SesNotificationChannel {
    client: SesClient,
    from: String,
}

impl SesNotificationChannel {
    /// Create a channel over an existing client with a sender address.
    pub fn new(client: SesClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }

    /// Create a channel from the default AWS environment configuration.
    pub async fn from_env(from: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(SesClient::new(&config), from)
    }
}

#[async_trait]
impl NotificationChannel for SesNotificationChannel {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let subject = Content::builder()
            .data(&notification.subject)
            .build()
            .map_err(|e| Error::Notification(format!("subject: {}", e)))?;

        let body_text = Content::builder()
            .data(&notification.body)
            .build()
            .map_err(|e| Error::Notification(format!("body: {}", e)))?;
        let body = Body::builder().text(body_text).build();

        let message = Message::builder().subject(subject).body(body).build();

        let mut destination = Destination::builder().to_addresses(&notification.to);
        if let Some(cc) = &notification.cc {
            destination = destination.cc_addresses(cc);
        }
        if let Some(bcc) = &notification.bcc {
            destination = destination.bcc_addresses(bcc);
        }

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination.build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        info!(
            subsystem = "notify",
            component = "ses",
            op = "send",
            to = %notification.to,
            subject = %notification.subject,
            "Notification delivered"
        );
        Ok(())
    }
}
