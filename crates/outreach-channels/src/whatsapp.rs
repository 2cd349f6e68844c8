//! WhatsApp Business Cloud API channel.
//!
//! Uses the official WhatsApp Business Platform (Cloud API) for messaging.
//! Requires: Access Token + Phone Number ID from Meta Business Suite.
//! Inbound messages arrive via the Cloud webhook, served locally on the
//! configured port and bridged into the `Transport::listen` stream.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use outreach_core::error::{OutreachError, Result};
use outreach_core::traits::Transport;
use outreach_core::types::{IncomingMessage, ThreadType};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// WhatsApp Business channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Facebook Graph API access token
    pub access_token: String,
    /// WhatsApp Phone Number ID
    pub phone_number_id: String,
    /// Webhook verify token (for incoming messages)
    #[serde(default)]
    pub webhook_verify_token: String,
    /// Local port for the webhook receiver
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,
    /// Operator phone address (digits, no `+`). Commands are only honored
    /// from this sender.
    #[serde(default)]
    pub operator_number: String,
}

fn default_webhook_port() -> u16 { 8090 }

/// WhatsApp Business channel implementation.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
    connected: bool,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            connected: false,
        }
    }

    /// Cloud API addresses are bare digits; canonical contact phones carry
    /// a leading `+`.
    fn wire_address(phone: &str) -> &str {
        phone.strip_prefix('+').unwrap_or(phone)
    }

    /// Send a text message via WhatsApp Cloud API.
    async fn send_text_message(&self, to: &str, text: &str) -> Result<String> {
        let url = format!("{GRAPH_API_BASE}/{}/messages", self.config.phone_number_id);

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": Self::wire_address(to),
            "type": "text",
            "text": {
                "preview_url": false,
                "body": text
            }
        });

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OutreachError::Channel(format!("WhatsApp API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OutreachError::Channel(format!(
                "WhatsApp API error {}: {}", status, error_text
            )));
        }

        let result: serde_json::Value = response.json().await
            .map_err(|e| OutreachError::Channel(format!("Invalid WhatsApp response: {e}")))?;

        let msg_id = result["messages"][0]["id"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!("WhatsApp message sent: {} → {}", msg_id, to);
        Ok(msg_id)
    }

    /// Look a phone number up on the platform.
    ///
    /// An address the lookup does not return as `valid` is treated as not
    /// registered; campaign sends to it are skipped.
    async fn check_contact(&self, phone: &str) -> Result<bool> {
        let url = format!("{GRAPH_API_BASE}/{}/contacts", self.config.phone_number_id);

        let body = serde_json::json!({
            "blocking": "wait",
            "contacts": [format!("+{}", Self::wire_address(phone))],
            "force_check": true
        });

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| OutreachError::Channel(format!("WhatsApp contact check failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OutreachError::Channel(format!(
                "WhatsApp contact check error {}: {}", status, error_text
            )));
        }

        let result: serde_json::Value = response.json().await
            .map_err(|e| OutreachError::Channel(format!("Invalid contact check response: {e}")))?;

        Ok(result["contacts"][0]["status"].as_str() == Some("valid"))
    }
}

#[async_trait]
impl Transport for WhatsAppChannel {
    fn name(&self) -> &str { "whatsapp" }

    async fn connect(&mut self) -> Result<()> {
        if self.config.access_token.is_empty() {
            return Err(OutreachError::Config(
                "WhatsApp access_token not configured".into()
            ));
        }
        if self.config.phone_number_id.is_empty() {
            return Err(OutreachError::Config(
                "WhatsApp phone_number_id not configured".into()
            ));
        }

        // Verify token by checking phone number
        let url = format!("{GRAPH_API_BASE}/{}", self.config.phone_number_id);

        let response = self.client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .send()
            .await
            .map_err(|e| OutreachError::Channel(format!("WhatsApp verification failed: {e}")))?;

        if response.status().is_success() {
            self.connected = true;
            tracing::info!("WhatsApp Business: connected (phone_id={})", self.config.phone_number_id);
        } else {
            let text = response.text().await.unwrap_or_default();
            return Err(OutreachError::AuthFailed(format!(
                "WhatsApp token verification failed: {}", text
            )));
        }

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        tracing::info!("WhatsApp Business: disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool { self.connected }

    async fn listen(&self) -> Result<Box<dyn Stream<Item = IncomingMessage> + Send + Unpin>> {
        let (tx, rx) = mpsc::channel::<IncomingMessage>(64);

        let state = Arc::new(WebhookState {
            tx,
            verify_token: self.config.webhook_verify_token.clone(),
            operator_number: self.config.operator_number.clone(),
        });

        let router = Router::new()
            .route("/webhook", get(webhook_verify).post(webhook_receive))
            .with_state(state);

        let addr = format!("0.0.0.0:{}", self.config.webhook_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| OutreachError::Channel(format!("Webhook bind on {addr} failed: {e}")))?;

        tracing::info!("WhatsApp: listening for webhooks on {addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::warn!("⚠️ Webhook server exited: {e}");
            }
        });

        Ok(Box::new(ReceiverStream::new(rx)))
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.send_text_message(to, body).await?;
        Ok(())
    }

    async fn exists_on_network(&self, phone: &str) -> Result<bool> {
        self.check_contact(phone).await
    }
}

struct WebhookState {
    tx: mpsc::Sender<IncomingMessage>,
    verify_token: String,
    operator_number: String,
}

/// Webhook subscription handshake: echo `hub.challenge` when the verify
/// token matches.
async fn webhook_verify(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);

    if mode == Some("subscribe") && token == Some(state.verify_token.as_str()) {
        let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
        (StatusCode::OK, challenge)
    } else {
        tracing::warn!("⚠️ Webhook verification rejected (bad token)");
        (StatusCode::FORBIDDEN, String::new())
    }
}

/// Inbound message delivery from the platform.
async fn webhook_receive(
    State(state): State<Arc<WebhookState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    for message in parse_webhook(&payload, &state.operator_number) {
        if state.tx.send(message).await.is_err() {
            tracing::warn!("⚠️ Inbound queue closed, dropping webhook message");
        }
    }
    StatusCode::OK
}

/// Parse a Cloud API webhook payload into incoming messages.
///
/// Only plain text messages are surfaced; status updates and media are
/// ignored.
pub fn parse_webhook(payload: &serde_json::Value, operator_number: &str) -> Vec<IncomingMessage> {
    let mut messages = Vec::new();

    let entries = payload["entry"].as_array().cloned().unwrap_or_default();
    for entry in &entries {
        let changes = entry["changes"].as_array().cloned().unwrap_or_default();
        for change in &changes {
            let value = &change["value"];

            // Map wa_id -> profile name from the contacts block
            let mut names: HashMap<&str, &str> = HashMap::new();
            if let Some(contacts) = value["contacts"].as_array() {
                for c in contacts {
                    if let (Some(id), Some(name)) =
                        (c["wa_id"].as_str(), c["profile"]["name"].as_str())
                    {
                        names.insert(id, name);
                    }
                }
            }

            let Some(msgs) = value["messages"].as_array() else { continue };
            for msg in msgs {
                if msg["type"].as_str() != Some("text") {
                    continue;
                }
                let Some(from) = msg["from"].as_str() else { continue };
                let Some(text) = msg["text"]["body"].as_str() else { continue };

                messages.push(IncomingMessage {
                    channel: "whatsapp".into(),
                    sender_id: from.to_string(),
                    sender_name: names.get(from).map(|n| n.to_string()),
                    content: text.to_string(),
                    from_operator: !operator_number.is_empty() && from == operator_number,
                    thread_type: ThreadType::Direct,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(from: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "contacts": [{"profile": {"name": "Acme"}, "wa_id": from}],
                        "messages": [{
                            "from": from,
                            "id": "wamid.x",
                            "type": "text",
                            "text": {"body": text}
                        }]
                    }
                }]
            }]
        })
    }

    #[test]
    fn test_parse_webhook_text_message() {
        let messages = parse_webhook(&sample_payload("77012345678", "!stats"), "77012345678");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_id, "77012345678");
        assert_eq!(messages[0].content, "!stats");
        assert_eq!(messages[0].sender_name.as_deref(), Some("Acme"));
        assert!(messages[0].from_operator);
    }

    #[test]
    fn test_parse_webhook_non_operator() {
        let messages = parse_webhook(&sample_payload("79161234567", "!help"), "77012345678");
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].from_operator);
    }

    #[test]
    fn test_parse_webhook_no_operator_configured() {
        // Nobody is the operator when no number is configured
        let messages = parse_webhook(&sample_payload("77012345678", "hi"), "");
        assert!(!messages[0].from_operator);
    }

    #[test]
    fn test_parse_webhook_ignores_status_updates() {
        let payload = serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "statuses": [{"id": "wamid.x", "status": "delivered"}]
                    }
                }]
            }]
        });
        assert!(parse_webhook(&payload, "77012345678").is_empty());
    }

    #[test]
    fn test_parse_webhook_ignores_media() {
        let payload = serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{"from": "77012345678", "type": "image", "image": {"id": "1"}}]
                    }
                }]
            }]
        });
        assert!(parse_webhook(&payload, "77012345678").is_empty());
    }

    #[test]
    fn test_wire_address_strips_plus() {
        assert_eq!(WhatsAppChannel::wire_address("+77012345678"), "77012345678");
        assert_eq!(WhatsAppChannel::wire_address("77012345678"), "77012345678");
    }
}
