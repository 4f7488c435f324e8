use std::collections::HashMap;
use std::time::Duration;

use alerta_config::PushSettings;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{PushError, PushGateway, PushMessage, PushReceipt, PushTicket};

#[derive(Debug, Deserialize)]
struct ExpoEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ExpoRequestError>,
}

#[derive(Debug, Deserialize)]
struct ExpoRequestError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Expo push HTTP API (`/send`, `/getReceipts`).
pub struct ExpoGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    send_batch_size: usize,
    receipt_batch_size: usize,
}

impl ExpoGateway {
    pub fn new(settings: &PushSettings) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
            send_batch_size: settings.send_batch_size.max(1),
            receipt_batch_size: settings.receipt_batch_size.max(1),
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, PushError>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PushError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope = resp.json::<ExpoEnvelope<T>>().await?;
        if let Some(err) = envelope.errors.into_iter().next() {
            let code = err.code.unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(PushError::Rejected(format!("{code}: {}", err.message)));
        }
        envelope
            .data
            .ok_or_else(|| PushError::Rejected("response carried no data".to_string()))
    }
}

#[async_trait]
impl PushGateway for ExpoGateway {
    fn send_batch_limit(&self) -> usize {
        self.send_batch_size
    }

    fn receipt_batch_limit(&self) -> usize {
        self.receipt_batch_size
    }

    async fn send(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, PushError> {
        let tickets: Vec<PushTicket> = self.post("send", messages).await?;
        debug!(sent = messages.len(), tickets = tickets.len(), "Push batch sent");
        Ok(tickets)
    }

    async fn get_receipts(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, PushReceipt>, PushError> {
        self.post("getReceipts", &serde_json::json!({ "ids": ids }))
            .await
    }
}
