use std::fmt;
use std::str::FromStr;

use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::category::Category;

/// One-tap emergency alert carrying the reporter's location snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanicAlert {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub user_name_panic: String,
    pub category: Category,
    /// Absent when the device could not produce a fix.
    pub location: Option<GeoPoint>,
    pub address: String,
    pub created_at: DateTime,
    #[serde(default)]
    pub status: PanicStatus,
    pub status_updated_at: Option<DateTime>,
    /// Set exactly when `status` has left `Recibida`.
    pub responder_username: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Linear lifecycle; declaration order is lifecycle order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PanicStatus {
    #[default]
    #[serde(rename = "Recibida")]
    Recibida,
    #[serde(rename = "En Camino")]
    EnCamino,
    #[serde(rename = "Finalizado")]
    Finalizado,
}

impl PanicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanicStatus::Recibida => "Recibida",
            PanicStatus::EnCamino => "En Camino",
            PanicStatus::Finalizado => "Finalizado",
        }
    }
}

impl fmt::Display for PanicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanicStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Recibida" => Ok(PanicStatus::Recibida),
            "En Camino" => Ok(PanicStatus::EnCamino),
            "Finalizado" => Ok(PanicStatus::Finalizado),
            other => Err(format!("unknown panic alert status: {other}")),
        }
    }
}

impl PanicAlert {
    pub const COLLECTION: &'static str = "panic_alerts";
}
