use std::fmt;
use std::str::FromStr;

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::category::Category;
use super::role::Role;

/// Structured citizen report addressed to one responder category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub attachment_url: Option<String>,
    pub user_id: ObjectId,
    pub user_name: String,
    pub email: String,
    pub created_at: DateTime,
    #[serde(default)]
    pub status: NotificationStatus,
    pub status_updated_at: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum NotificationStatus {
    #[default]
    #[serde(rename = "Pendiente")]
    Pendiente,
    #[serde(rename = "En Proceso")]
    EnProceso,
    #[serde(rename = "Resuelto")]
    Resuelto,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pendiente => "Pendiente",
            NotificationStatus::EnProceso => "En Proceso",
            NotificationStatus::Resuelto => "Resuelto",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pendiente" => Ok(NotificationStatus::Pendiente),
            "En Proceso" => Ok(NotificationStatus::EnProceso),
            "Resuelto" => Ok(NotificationStatus::Resuelto),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

/// One entry of a notification's append-only response thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationResponse {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub notification_id: ObjectId,
    pub text: String,
    pub user_id: ObjectId,
    pub user_name: String,
    pub role: Role,
    pub created_at: DateTime,
}

impl Notification {
    pub const COLLECTION: &'static str = "notifications";
}

impl NotificationResponse {
    pub const COLLECTION: &'static str = "notification_responses";
}
