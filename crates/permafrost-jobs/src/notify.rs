//! Success/failure notification composition.
//!
//! Delivery is best-effort: a notification failure is logged and never
//! fails the run that triggered it. Failure notices carry an engineering
//! cc/bcc, except for filtered (expected, user-caused) errors, which still
//! notify the requester but skip the escalation list.

use std::sync::Arc;

use tracing::warn;

use permafrost_core::{Error, Notification, NotificationChannel, TableRef};

/// Escalation configuration, passed explicitly instead of read from
/// ambient globals.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    /// cc list for unexpected failures.
    pub failure_cc: Option<String>,
    /// bcc list for unexpected failures.
    pub failure_bcc: Option<String>,
}

impl NotifyConfig {
    /// Read the configuration from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `PERMAFROST_FAILURE_CC` | cc list for unexpected failures |
    /// | `PERMAFROST_FAILURE_BCC` | bcc list for unexpected failures |
    pub fn from_env() -> Self {
        Self {
            failure_cc: std::env::var("PERMAFROST_FAILURE_CC").ok(),
            failure_bcc: std::env::var("PERMAFROST_FAILURE_BCC").ok(),
        }
    }
}

/// Composes and delivers archive/restore notices over a channel.
pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    config: NotifyConfig,
}

impl Notifier {
    pub fn new(channel: Arc<dyn NotificationChannel>, config: NotifyConfig) -> Self {
        Self { channel, config }
    }

    /// Notify that an archive run succeeded.
    pub async fn archive_succeeded(&self, to: &str, table: &TableRef) {
        self.deliver(Notification {
            to: to.to_string(),
            subject: "Archive succeeded".to_string(),
            body: format!("Succeeded in archiving {}", table),
            cc: None,
            bcc: None,
        })
        .await;
    }

    /// Notify that an archive run failed.
    pub async fn archive_failed(&self, to: &str, table: &TableRef, error: &Error) {
        self.deliver(self.failure_notice("archive", to, table, error))
            .await;
    }

    /// Notify that a restore run succeeded.
    pub async fn restore_succeeded(&self, to: &str, table: &TableRef) {
        self.deliver(Notification {
            to: to.to_string(),
            subject: "Restore succeeded".to_string(),
            body: format!("Succeeded in restoring {}", table),
            cc: None,
            bcc: None,
        })
        .await;
    }

    /// Notify that a restore run failed.
    pub async fn restore_failed(&self, to: &str, table: &TableRef, error: &Error) {
        self.deliver(self.failure_notice("restore", to, table, error))
            .await;
    }

    fn failure_notice(
        &self,
        operation: &str,
        to: &str,
        table: &TableRef,
        error: &Error,
    ) -> Notification {
        // Filtered errors are user-caused; they skip the escalation list.
        let (cc, bcc) = if error.is_filtered() {
            (None, None)
        } else {
            (self.config.failure_cc.clone(), self.config.failure_bcc.clone())
        };

        let mut subject_op = operation.to_string();
        if let Some(first) = subject_op.get_mut(0..1) {
            first.make_ascii_uppercase();
        }

        Notification {
            to: to.to_string(),
            subject: format!("ERROR: {} failed", subject_op),
            body: format!(
                "Failed to {} {}\nThe following error description might be helpful: '{}'",
                operation, table, error
            ),
            cc,
            bcc,
        }
    }

    async fn deliver(&self, notification: Notification) {
        if let Err(e) = self.channel.send(&notification).await {
            warn!(
                subsystem = "notify",
                component = "notifier",
                op = "send",
                to = %notification.to,
                error = %e,
                "Notification delivery failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use permafrost_core::Result;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn send(&self, notification: &Notification) -> Result<()> {
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }

    fn notifier(channel: Arc<RecordingChannel>) -> Notifier {
        Notifier::new(
            channel,
            NotifyConfig {
                failure_cc: Some("eng@example.com".into()),
                failure_bcc: Some("oncall@example.com".into()),
            },
        )
    }

    #[tokio::test]
    async fn test_success_notice_has_no_escalation() {
        let channel = Arc::new(RecordingChannel::default());
        notifier(channel.clone())
            .archive_succeeded("user@example.com", &TableRef::new("s", "t"))
            .await;

        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Archive succeeded");
        assert_eq!(sent[0].body, "Succeeded in archiving s.t");
        assert!(sent[0].cc.is_none() && sent[0].bcc.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_failure_escalates() {
        let channel = Arc::new(RecordingChannel::default());
        notifier(channel.clone())
            .archive_failed(
                "user@example.com",
                &TableRef::new("s", "t"),
                &Error::Transaction("boom".into()),
            )
            .await;

        let sent = channel.sent.lock().await;
        assert_eq!(sent[0].subject, "ERROR: Archive failed");
        assert!(sent[0].body.contains("Failed to archive s.t"));
        assert!(sent[0].body.contains("boom"));
        assert_eq!(sent[0].cc.as_deref(), Some("eng@example.com"));
        assert_eq!(sent[0].bcc.as_deref(), Some("oncall@example.com"));
    }

    #[tokio::test]
    async fn test_filtered_failure_skips_escalation() {
        let channel = Arc::new(RecordingChannel::default());
        notifier(channel.clone())
            .restore_failed(
                "user@example.com",
                &TableRef::new("s", "t"),
                &Error::ArtifactMissing("S3 manifest_file b/p/manifest does not exist!".into()),
            )
            .await;

        let sent = channel.sent.lock().await;
        assert_eq!(sent[0].subject, "ERROR: Restore failed");
        assert!(sent[0].cc.is_none() && sent[0].bcc.is_none());
        // The requester is still notified.
        assert_eq!(sent[0].to, "user@example.com");
    }
}
