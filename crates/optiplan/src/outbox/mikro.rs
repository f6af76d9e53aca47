use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::db::outbox_repo::OutboxItem;

use super::handler::{
    OutboxError, SyncHandler, SyncResult, E_QUOTA_EXCEEDED, E_REMOTE_REJECTED,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shape of the accounting bridge's reply. Every field is optional; a bare
/// 2xx with no body counts as accepted.
#[derive(Debug, Default, Deserialize)]
struct BridgeReply {
    ok: Option<bool>,
    code: Option<String>,
    message: Option<String>,
}

/// Posts outbox items to the Mikro accounting bridge at
/// `{base_url}/sync/{entity_type}`.
#[derive(Debug, Clone)]
pub struct MikroHttpHandler {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl MikroHttpHandler {
    pub fn new(base_url: &str) -> Result<Self, OutboxError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OutboxError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    fn endpoint(&self, entity_type: &str) -> String {
        format!("{}/sync/{}", self.base_url, entity_type)
    }
}

#[async_trait]
impl SyncHandler for MikroHttpHandler {
    async fn sync(&self, item: &OutboxItem) -> Result<SyncResult, OutboxError> {
        let body = json!({
            "entity_type": item.entity_type,
            "entity_id": item.entity_id,
            "operation": item.operation.as_str(),
            "payload": item.payload,
        });

        let mut request = self.client.post(self.endpoint(&item.entity_type)).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| OutboxError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OutboxError::Transport(e.to_string()))?;
        let reply: BridgeReply = serde_json::from_str(&text).unwrap_or_default();

        if status.as_u16() == 429 {
            return Ok(SyncResult::failure(
                E_QUOTA_EXCEEDED,
                reply.message.unwrap_or_else(|| "rate limited".to_string()),
            ));
        }

        if status.is_success() {
            return Ok(match (reply.ok, reply.code) {
                (Some(false), Some(code)) => {
                    SyncResult::failure(code, reply.message.unwrap_or_default())
                }
                (Some(false), None) => SyncResult::failure(
                    E_REMOTE_REJECTED,
                    reply.message.unwrap_or_else(|| "rejected without a code".to_string()),
                ),
                _ => SyncResult::Success,
            });
        }

        if let Some(code) = reply.code {
            return Ok(SyncResult::failure(code, reply.message.unwrap_or_default()));
        }

        Err(OutboxError::Http {
            status: status.as_u16(),
            body: text,
        })
    }
}
