use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    /// Unique, case-sensitive.
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Device push token as last reported by the client. Not validated on write.
    pub push_token: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub const COLLECTION: &'static str = "users";
}
