use alerta_config::PushSettings;
use alerta_db::models::{PanicAlert, PanicStatus};
use serde_json::json;

use crate::push::PushMessage;

pub const UNKNOWN_REPORTER: &str = "Usuario desconocido";

/// Delivery options shared by every outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOptions {
    pub sound: String,
    pub priority: String,
    pub channel_id: String,
}

impl From<&PushSettings> for MessageOptions {
    fn from(settings: &PushSettings) -> Self {
        Self {
            sound: settings.sound.clone(),
            priority: settings.priority.clone(),
            channel_id: settings.android_channel_id.clone(),
        }
    }
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            sound: "default".to_string(),
            priority: "high".to_string(),
            channel_id: "default".to_string(),
        }
    }
}

impl MessageOptions {
    fn build(&self, to: &str, title: String, body: String, data: serde_json::Value) -> PushMessage {
        PushMessage {
            to: to.to_string(),
            title,
            body,
            data,
            sound: Some(self.sound.clone()),
            priority: Some(self.priority.clone()),
            channel_id: Some(self.channel_id.clone()),
        }
    }

    /// Message sent to each responder when a panic alert is raised.
    pub fn panic_alert(&self, alert: &PanicAlert, alert_id: &str, to: &str) -> PushMessage {
        let reporter = match alert.user_name_panic.trim() {
            "" => UNKNOWN_REPORTER,
            name => name,
        };
        self.build(
            to,
            format!("🚨 Alerta de Pánico: {} 🚨", alert.category.title()),
            format!("Nueva alerta recibida de {reporter}. Toca para ver detalles."),
            json!({ "alertId": alert_id, "type": "panicAlert" }),
        )
    }

    /// Message sent to the reporter when their alert advances. Only
    /// `En Camino` and `Finalizado` are worth a push.
    pub fn status_update(
        &self,
        alert_id: &str,
        status: PanicStatus,
        responder: &str,
        to: &str,
    ) -> Option<PushMessage> {
        let (title, body) = match status {
            PanicStatus::EnCamino => (
                "¡Ayuda en Camino! 🚓🚒".to_string(),
                format!("Un equipo de {responder} está yendo a tu ubicación."),
            ),
            PanicStatus::Finalizado => (
                "Alerta Finalizada ✅".to_string(),
                format!("Tu alerta ha sido marcada como finalizada por {responder}."),
            ),
            PanicStatus::Recibida => return None,
        };
        Some(self.build(
            to,
            title,
            body,
            json!({ "alertId": alert_id, "type": "statusUpdate" }),
        ))
    }
}
