//! Google Gemini provider — `generateContent` with conversation history.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use outreach_core::config::OutreachConfig;
use outreach_core::error::{OutreachError, Result};
use outreach_core::traits::Provider;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// History cap per conversation (user + model turns). Old turns fall off the
/// front so long chats stay inside the model context.
const MAX_HISTORY_TURNS: usize = 20;

/// Gemini chat provider with per-conversation history.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    pre_prompt: String,
    client: reqwest::Client,
    /// conversation key -> alternating user/model turns in wire format.
    conversations: Mutex<HashMap<String, Vec<Value>>>,
}

impl GeminiProvider {
    /// API key resolution: config first, `GEMINI_API_KEY` env second.
    pub fn new(config: &OutreachConfig) -> Self {
        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("GEMINI_API_KEY").unwrap_or_default()
        };

        Self {
            api_key,
            model: config.model.clone(),
            pre_prompt: config.pre_prompt.clone(),
            client: reqwest::Client::new(),
            conversations: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str, conversation_key: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(OutreachError::ApiKeyMissing("gemini".into()));
        }

        let full_prompt = if self.pre_prompt.trim().is_empty() {
            prompt.to_string()
        } else {
            format!("{}\n\n{}", self.pre_prompt, prompt)
        };

        let user_turn = json!({
            "role": "user",
            "parts": [{"text": full_prompt}]
        });

        let contents: Vec<Value> = {
            let conversations = self.conversations.lock().await;
            let mut contents = conversations
                .get(conversation_key)
                .cloned()
                .unwrap_or_default();
            contents.push(user_turn.clone());
            contents
        };

        let url = format!(
            "{GEMINI_API_BASE}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self.client
            .post(&url)
            .json(&json!({ "contents": contents }))
            .send()
            .await
            .map_err(|e| OutreachError::Provider(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OutreachError::Provider(format!(
                "Gemini API error {status}: {error_text}"
            )));
        }

        let body: Value = response.json().await
            .map_err(|e| OutreachError::Provider(format!("Invalid Gemini response: {e}")))?;

        let text = extract_text(&body)?;

        {
            let mut conversations = self.conversations.lock().await;
            let history = conversations
                .entry(conversation_key.to_string())
                .or_default();
            history.push(user_turn);
            history.push(json!({
                "role": "model",
                "parts": [{"text": text}]
            }));
            trim_history(history);
        }

        tracing::debug!("Gemini answered {} chars for {conversation_key}", text.len());
        Ok(text)
    }

    async fn reset(&self, conversation_key: &str) {
        self.conversations.lock().await.remove(conversation_key);
    }
}

/// Pull the answer text out of a `generateContent` response.
fn extract_text(body: &Value) -> Result<String> {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(OutreachError::Provider(format!(
            "Gemini blocked the prompt: {reason}"
        )));
    }

    body["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OutreachError::Provider("Gemini returned no text candidate".into()))
}

/// Keep only the newest turns, always an even count so user/model pairing is
/// preserved.
fn trim_history(history: &mut Vec<Value>) {
    if history.len() > MAX_HISTORY_TURNS {
        let excess = history.len() - MAX_HISTORY_TURNS;
        history.drain(..excess);
    }
}
