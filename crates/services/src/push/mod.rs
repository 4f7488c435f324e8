pub mod expo;
pub mod recording;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use expo::ExpoGateway;
pub use recording::RecordingGateway;

/// One message as accepted by the push provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// Per-message acknowledgement returned by a send call, in message order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushTicket {
    Ok {
        id: String,
    },
    Error {
        message: String,
        #[serde(default)]
        details: Option<PushErrorDetails>,
    },
}

impl PushTicket {
    pub fn receipt_id(&self) -> Option<&str> {
        match self {
            PushTicket::Ok { id } => Some(id),
            PushTicket::Error { .. } => None,
        }
    }
}

/// Final delivery outcome for a ticket, queried after the send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushReceipt {
    Ok,
    Error {
        message: String,
        #[serde(default)]
        details: Option<PushErrorDetails>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushErrorDetails {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expo_push_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFailureKind {
    /// The token will never work again and should be dropped.
    PermanentToken,
    /// Worth retrying later.
    Transient,
    /// Server-side setup problem, not specific to the recipient.
    Configuration,
}

impl PushErrorDetails {
    pub fn kind(&self) -> PushFailureKind {
        match self.error.as_deref() {
            Some("DeviceNotRegistered") => PushFailureKind::PermanentToken,
            Some("MessageTooBig" | "InvalidCredentials" | "MismatchSenderId") => {
                PushFailureKind::Configuration
            }
            _ => PushFailureKind::Transient,
        }
    }
}

pub fn failure_kind(details: Option<&PushErrorDetails>) -> PushFailureKind {
    details.map_or(PushFailureKind::Transient, PushErrorDetails::kind)
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("push provider rejected the request: {0}")]
    Rejected(String),
}

/// Outbound push provider. Implementations must not retry on their own;
/// callers decide how failures are isolated.
#[async_trait]
pub trait PushGateway: Send + Sync {
    fn is_valid_token(&self, token: &str) -> bool {
        is_expo_push_token(token)
    }

    /// Maximum messages per `send` call.
    fn send_batch_limit(&self) -> usize;

    /// Maximum ids per `get_receipts` call.
    fn receipt_batch_limit(&self) -> usize;

    async fn send(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, PushError>;

    async fn get_receipts(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, PushReceipt>, PushError>;
}

/// Accepts `ExponentPushToken[...]`, `ExpoPushToken[...]` and bare
/// 8-4-4-4-12 alphanumeric device ids.
pub fn is_expo_push_token(token: &str) -> bool {
    let bracketed = (token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken["))
        && token.ends_with(']');
    bracketed || is_device_id(token)
}

fn is_device_id(token: &str) -> bool {
    let groups: Vec<&str> = token.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.bytes().all(|b| b.is_ascii_alphanumeric()))
}
