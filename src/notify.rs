//! Outbound e-mail notifications.
//!
//! Notifications are best-effort: [`dispatch`] hands the message to a
//! background task and returns immediately, and a failed send is only
//! logged. Nothing a request does depends on delivery.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::MailConfig;

const GRAPH_API_URL: &str = "https://graph.microsoft.com/v1.0";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Send `notification` in the background, logging the outcome.
pub fn dispatch(notifier: &SharedNotifier, notification: Notification) {
    if notification.recipients.is_empty() {
        tracing::info!(subject = %notification.subject, "No e-mail recipients specified");
        return;
    }

    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        match notifier.send(&notification).await {
            Ok(()) => tracing::info!(
                "Notification sent to: {}",
                notification.recipients.join(", ")
            ),
            Err(e) => tracing::warn!(
                subject = %notification.subject,
                error = %e,
                "Failed to send notification"
            ),
        }
    });
}

/// Used when no mail account is configured: the message is only logged.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            to = %notification.recipients.join(", "),
            subject = %notification.subject,
            "Mail delivery disabled; notification not sent"
        );
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Microsoft Graph `sendMail` with an app-only client-credential token.
pub struct GraphMailer {
    client: Client,
    config: MailConfig,
}

impl GraphMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        let url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.config.tenant_id
        );
        let response = self
            .client
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("token request failed ({}): {}", status, body);
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

fn mail_payload(notification: &Notification) -> serde_json::Value {
    let recipients: Vec<serde_json::Value> = notification
        .recipients
        .iter()
        .map(|address| json!({ "emailAddress": { "address": address } }))
        .collect();
    json!({
        "message": {
            "subject": notification.subject,
            "body": { "contentType": "Text", "content": notification.body },
            "toRecipients": recipients,
        },
        "saveToSentItems": "true",
    })
}

#[async_trait]
impl Notifier for GraphMailer {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let token = self.access_token().await?;
        let url = format!("{}/users/{}/sendMail", GRAPH_API_URL, self.config.sender);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&mail_payload(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("sendMail failed ({}): {}", status, body);
        }
        Ok(())
    }
}

/// Pick the mailer for the given configuration.
pub fn from_config(mail: Option<MailConfig>) -> SharedNotifier {
    match mail {
        Some(config) => {
            tracing::info!("Mail notifications enabled (sender {})", config.sender);
            Arc::new(GraphMailer::new(config))
        }
        None => {
            tracing::info!("Mail notifications disabled (no mail account configured)");
            Arc::new(LogNotifier)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Collects notifications instead of sending them.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }

    pub(crate) struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
            anyhow::bail!("smtp unreachable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingNotifier, RecordingNotifier};
    use super::*;
    use std::time::Duration;

    fn note(recipients: &[&str]) -> Notification {
        Notification {
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            subject: "New Document Submission: qap.pdf".to_string(),
            body: "Customer: Acme".to_string(),
        }
    }

    #[test]
    fn test_mail_payload_shape() {
        let payload = mail_payload(&note(&["a@example.com", "b@example.com"]));
        assert_eq!(payload["message"]["toRecipients"][1]["emailAddress"]["address"], "b@example.com");
        assert_eq!(payload["message"]["body"]["contentType"], "Text");
        assert_eq!(payload["saveToSentItems"], "true");
    }

    #[tokio::test]
    async fn test_dispatch_delivers_in_background() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notifier: SharedNotifier = recorder.clone();

        dispatch(&notifier, note(&["m@example.com"]));
        for _ in 0..50 {
            if !recorder.sent.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(recorder.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_skips_empty_and_swallows_failure() {
        let recorder = Arc::new(RecordingNotifier::default());
        let notifier: SharedNotifier = recorder.clone();
        dispatch(&notifier, note(&[]));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(recorder.sent.lock().await.is_empty());

        let failing: SharedNotifier = Arc::new(FailingNotifier);
        dispatch(&failing, note(&["m@example.com"]));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
