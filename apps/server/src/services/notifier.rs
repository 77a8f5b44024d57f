//! Outbound chat notifications.
//!
//! Handlers hand a [`NotificationEvent`] and its audience to the [`NotificationHub`].
//! The hub resolves recipients, renders the message and delivers it in a
//! background task. Failures are logged and dropped; nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MessagingSettings;
use crate::db::DbPool;

/// HTTP connect timeout for the messaging API.
const HTTP_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
/// HTTP total timeout for the messaging API.
const HTTP_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Delivery failure reported by a [`Notifier`].
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("messaging API returned {0}")]
    Rejected(u16),
}

/// A card with a title, label/value rows and an action link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlexCard {
    pub title: String,
    pub details: Vec<(String, String)>,
    pub action_label: String,
    pub action_url: String,
}

/// Outbound message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Flex(FlexCard),
}

impl Message {
    /// Plain-text rendering, also used as the card's alt text.
    pub fn summary(&self) -> String {
        match self {
            Message::Text(text) => text.clone(),
            Message::Flex(card) => card.title.clone(),
        }
    }

    /// Wire payload for the push endpoint.
    pub fn to_payload(&self, to: &str) -> serde_json::Value {
        let message = match self {
            Message::Text(text) => serde_json::json!({ "type": "text", "text": text }),
            Message::Flex(card) => {
                let rows: Vec<serde_json::Value> = card
                    .details
                    .iter()
                    .map(|(label, value)| {
                        serde_json::json!({
                            "type": "box",
                            "layout": "baseline",
                            "contents": [
                                { "type": "text", "text": label, "size": "sm", "color": "#888888", "flex": 2 },
                                { "type": "text", "text": value, "size": "sm", "wrap": true, "flex": 5 }
                            ]
                        })
                    })
                    .collect();
                serde_json::json!({
                    "type": "flex",
                    "altText": card.title,
                    "contents": {
                        "type": "bubble",
                        "body": {
                            "type": "box",
                            "layout": "vertical",
                            "contents": [
                                { "type": "text", "text": card.title, "weight": "bold", "size": "md", "wrap": true },
                                { "type": "box", "layout": "vertical", "margin": "md", "contents": rows }
                            ]
                        },
                        "footer": {
                            "type": "box",
                            "layout": "vertical",
                            "contents": [{
                                "type": "button",
                                "style": "primary",
                                "action": { "type": "uri", "label": card.action_label, "uri": card.action_url }
                            }]
                        }
                    }
                })
            }
        };
        serde_json::json!({ "to": to, "messages": [message] })
    }
}

/// Port for sending one message to one recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, message: &Message) -> Result<(), NotifyError>;
}

/// Push client for a LINE-style messaging API.
pub struct MessagingClient {
    http: reqwest::Client,
    push_url: String,
    access_token: SecretString,
}

impl MessagingClient {
    pub fn new(api_url: &str, access_token: SecretString) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        Ok(Self {
            http,
            push_url: format!("{}/v2/bot/message/push", api_url.trim_end_matches('/')),
            access_token,
        })
    }
}

#[async_trait]
impl Notifier for MessagingClient {
    async fn send(&self, to: &str, message: &Message) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.push_url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&message.to_payload(to))
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Notifier used when messaging is not configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, to: &str, message: &Message) -> Result<(), NotifyError> {
        debug!(to = %to, "Messaging disabled, dropping: {}", message.summary());
        Ok(())
    }
}

/// Something worth telling people about.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    TechnicianAssigned {
        job_item_id: Uuid,
        work_order_number: String,
        asset_name: String,
        site_name: String,
        technician_name: String,
    },
    JobStarted {
        job_item_id: Uuid,
        work_order_number: String,
        asset_name: String,
        site_name: String,
        technician_name: String,
    },
    JobCompleted {
        job_item_id: Uuid,
        work_order_number: String,
        asset_name: String,
        site_name: String,
        technician_name: String,
    },
    WorkOrderCompleted {
        work_order_id: Uuid,
        work_order_number: String,
        site_name: String,
        total_items: u64,
    },
    RepairRequested {
        message_id: Uuid,
        client_name: String,
        site_name: String,
        asset_name: Option<String>,
        description: String,
    },
}

impl NotificationEvent {
    /// Stable name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TechnicianAssigned { .. } => "technician_assigned",
            Self::JobStarted { .. } => "job_started",
            Self::JobCompleted { .. } => "job_completed",
            Self::WorkOrderCompleted { .. } => "work_order_completed",
            Self::RepairRequested { .. } => "repair_requested",
        }
    }

    /// Render the message; `base_url` is used for action links.
    pub fn to_message(&self, base_url: &str) -> Message {
        let base = base_url.trim_end_matches('/');
        match self {
            Self::TechnicianAssigned {
                job_item_id,
                work_order_number,
                asset_name,
                site_name,
                technician_name,
            } => Message::Flex(FlexCard {
                title: format!("Technician assigned: {}", work_order_number),
                details: vec![
                    ("Site".to_string(), site_name.clone()),
                    ("Unit".to_string(), asset_name.clone()),
                    ("Technician".to_string(), technician_name.clone()),
                ],
                action_label: "Open job".to_string(),
                action_url: format!("{}/jobs/{}", base, job_item_id),
            }),
            Self::JobStarted {
                job_item_id,
                work_order_number,
                asset_name,
                site_name,
                technician_name,
            } => Message::Flex(FlexCard {
                title: format!("Work started: {}", work_order_number),
                details: vec![
                    ("Site".to_string(), site_name.clone()),
                    ("Unit".to_string(), asset_name.clone()),
                    ("Technician".to_string(), technician_name.clone()),
                ],
                action_label: "Open job".to_string(),
                action_url: format!("{}/jobs/{}", base, job_item_id),
            }),
            Self::JobCompleted {
                job_item_id,
                work_order_number,
                asset_name,
                site_name,
                technician_name,
            } => Message::Flex(FlexCard {
                title: format!("Job done: {}", work_order_number),
                details: vec![
                    ("Site".to_string(), site_name.clone()),
                    ("Unit".to_string(), asset_name.clone()),
                    ("Technician".to_string(), technician_name.clone()),
                ],
                action_label: "View report".to_string(),
                action_url: format!("{}/jobs/{}", base, job_item_id),
            }),
            Self::WorkOrderCompleted {
                work_order_id,
                work_order_number,
                site_name,
                total_items,
            } => Message::Flex(FlexCard {
                title: format!("All work finished: {}", work_order_number),
                details: vec![
                    ("Site".to_string(), site_name.clone()),
                    ("Units serviced".to_string(), total_items.to_string()),
                ],
                action_label: "View work order".to_string(),
                action_url: format!("{}/work-orders/{}", base, work_order_id),
            }),
            Self::RepairRequested {
                message_id,
                client_name,
                site_name,
                asset_name,
                description,
            } => {
                let mut details = vec![
                    ("Client".to_string(), client_name.clone()),
                    ("Site".to_string(), site_name.clone()),
                ];
                if let Some(asset_name) = asset_name {
                    details.push(("Unit".to_string(), asset_name.clone()));
                }
                details.push(("Problem".to_string(), description.clone()));
                Message::Flex(FlexCard {
                    title: format!("New repair request from {}", client_name),
                    details,
                    action_label: "Open inbox".to_string(),
                    action_url: format!("{}/messages#message-{}", base, message_id),
                })
            }
        }
    }
}

/// Who should hear about an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// CLIENT users of the site's client organisation
    SiteClients(Uuid),
    /// One user, typically the assigned technician
    User(Uuid),
    /// The configured admin channel
    AdminChannel,
}

/// Fan-out of events to chat recipients.
#[derive(Clone)]
pub struct NotificationHub {
    notifier: Arc<dyn Notifier>,
    admin_channel: Option<String>,
    base_url: String,
}

impl NotificationHub {
    pub fn new(notifier: Arc<dyn Notifier>, admin_channel: Option<String>, base_url: String) -> Self {
        Self {
            notifier,
            admin_channel,
            base_url,
        }
    }

    /// Hub backed by the messaging API when configured, otherwise a no-op.
    pub fn from_settings(settings: &MessagingSettings, base_url: &str) -> Self {
        let notifier: Arc<dyn Notifier> = match (&settings.api_url, &settings.access_token) {
            (Some(url), Some(token)) => match MessagingClient::new(url, token.clone()) {
                Ok(client) => {
                    info!("Chat notifications enabled via {}", url);
                    Arc::new(client)
                }
                Err(e) => {
                    warn!("Chat notifications disabled, client setup failed: {}", e);
                    Arc::new(NoopNotifier)
                }
            },
            _ => {
                info!("Chat notifications disabled (MESSAGING_API_URL or token not set)");
                Arc::new(NoopNotifier)
            }
        };
        Self::new(notifier, settings.admin_channel.clone(), base_url.to_string())
    }

    /// Resolve the audience and deliver in the background.
    ///
    /// Never fails; recipient lookup and delivery errors are only logged.
    pub async fn notify(&self, db: &DbPool, event: NotificationEvent, audience: &[Audience]) {
        let recipients = self.resolve(db, audience).await;
        if recipients.is_empty() {
            debug!(event = event.kind(), "No recipients for notification");
            return;
        }

        let message = event.to_message(&self.base_url);
        let notifier = Arc::clone(&self.notifier);
        let kind = event.kind();
        tokio::spawn(async move {
            let delivered = deliver(notifier.as_ref(), &recipients, &message).await;
            info!(
                event = kind,
                delivered,
                recipients = recipients.len(),
                "Notification fan-out finished"
            );
        });
    }

    async fn resolve(&self, db: &DbPool, audience: &[Audience]) -> Vec<String> {
        let mut recipients: Vec<String> = Vec::new();
        for target in audience {
            let found = match target {
                Audience::AdminChannel => Ok(self.admin_channel.iter().cloned().collect()),
                Audience::SiteClients(site_id) => db.client_chat_ids_for_site(*site_id).await,
                Audience::User(user_id) => db
                    .user_chat_id(*user_id)
                    .await
                    .map(|id| id.into_iter().collect()),
            };
            match found {
                Ok(ids) => {
                    for id in ids {
                        if !recipients.contains(&id) {
                            recipients.push(id);
                        }
                    }
                }
                Err(e) => warn!(audience = ?target, "Failed to resolve notification recipients: {}", e),
            }
        }
        recipients
    }
}

/// Send one message to every recipient, returning how many succeeded.
pub async fn deliver(notifier: &dyn Notifier, recipients: &[String], message: &Message) -> usize {
    let mut delivered = 0;
    for to in recipients {
        match notifier.send(to, message).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(to = %to, "Notification delivery failed: {}", e),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, to: &str, _message: &Message) -> Result<(), NotifyError> {
            if to == "broken" {
                return Err(NotifyError::Rejected(500));
            }
            self.sent.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivery_failures_are_swallowed() {
        let notifier = Recording::default();
        let recipients = vec!["U1".to_string(), "broken".to_string(), "U2".to_string()];
        let delivered = deliver(&notifier, &recipients, &Message::Text("hi".to_string())).await;
        assert_eq!(delivered, 2);
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["U1", "U2"]);
    }

    #[test]
    fn test_completed_card_links_to_job() {
        let id = Uuid::nil();
        let message = NotificationEvent::JobCompleted {
            job_item_id: id,
            work_order_number: "WO-202610-0001".to_string(),
            asset_name: "Lobby cassette".to_string(),
            site_name: "HQ".to_string(),
            technician_name: "Somchai".to_string(),
        }
        .to_message("https://acs.example.com/");

        match message {
            Message::Flex(card) => {
                assert_eq!(card.title, "Job done: WO-202610-0001");
                assert_eq!(
                    card.action_url,
                    format!("https://acs.example.com/jobs/{}", id)
                );
            }
            Message::Text(_) => panic!("expected a card"),
        }
    }

    #[test]
    fn test_flex_payload_shape() {
        let payload = Message::Flex(FlexCard {
            title: "T".to_string(),
            details: vec![("Site".to_string(), "HQ".to_string())],
            action_label: "Open".to_string(),
            action_url: "https://x/y".to_string(),
        })
        .to_payload("U1");

        assert_eq!(payload["to"], "U1");
        assert_eq!(payload["messages"][0]["type"], "flex");
        assert_eq!(payload["messages"][0]["altText"], "T");
        assert_eq!(
            payload["messages"][0]["contents"]["footer"]["contents"][0]["action"]["uri"],
            "https://x/y"
        );
    }

    #[test]
    fn test_repair_request_links_to_the_inbox_entry() {
        let id = Uuid::nil();
        let message = NotificationEvent::RepairRequested {
            message_id: id,
            client_name: "Acme".to_string(),
            site_name: "HQ".to_string(),
            asset_name: Some("Unit 3".to_string()),
            description: "Leaking water".to_string(),
        }
        .to_message("https://acs.example.com");

        let Message::Flex(card) = message else {
            panic!("expected a card");
        };
        assert_eq!(card.title, "New repair request from Acme");
        assert_eq!(
            card.action_url,
            format!("https://acs.example.com/messages#message-{}", id)
        );
        assert!(card.details.contains(&("Unit".to_string(), "Unit 3".to_string())));
        assert!(card.details.contains(&("Problem".to_string(), "Leaking water".to_string())));
    }
}
