pub mod auth;
pub mod notification;
pub mod panic_alert;

use alerta_db::models::Category;
use bson::{DateTime, oid::ObjectId};
use serde::Deserialize;

use crate::error::ApiError;

/// Query string shared by the list endpoints. Without `limit` the whole
/// scoped feed is returned.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

impl FeedQuery {
    pub fn category(&self) -> Result<Option<Category>, ApiError> {
        self.category
            .as_deref()
            .map(|c| c.parse::<Category>())
            .transpose()
            .map_err(|e| ApiError::Validation(e.to_string()))
    }
}

pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {what}")))
}

pub fn timestamp(at: DateTime) -> String {
    at.to_chrono().to_rfc3339()
}
