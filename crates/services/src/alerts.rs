use std::sync::Arc;

use alerta_db::models::{
    Category, GeoPoint, Notification, NotificationResponse, PanicAlert,
};
use bson::oid::ObjectId;
use thiserror::Error;
use tracing::info;

use crate::dao::base::DaoError;
use crate::session::SessionContext;
use crate::store::{
    AlertFilter, AlertStore, NewNotification, NewPanicAlert, NewResponse, UserRepository,
};

pub const UNKNOWN_ADDRESS: &str = "Ubicación aproximada no disponible";
pub const UNKNOWN_PANIC_NAME: &str = "Desconocido";

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(DaoError),
}

impl From<DaoError> for AlertError {
    fn from(e: DaoError) -> Self {
        match e {
            DaoError::NotFound => AlertError::NotFound,
            other => AlertError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub category: String,
    pub title: String,
    pub description: String,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePanicAlert {
    pub category: String,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
}

pub fn parse_category(raw: &str) -> Result<Category, AlertError> {
    raw.trim()
        .parse()
        .map_err(|e: alerta_db::models::UnknownCategory| AlertError::Validation(e.to_string()))
}

/// Trims and collapses inner whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn check_location(location: &GeoPoint) -> Result<(), AlertError> {
    let valid = location.latitude.is_finite()
        && location.longitude.is_finite()
        && (-90.0..=90.0).contains(&location.latitude)
        && (-180.0..=180.0).contains(&location.longitude);
    if valid {
        Ok(())
    } else {
        Err(AlertError::Validation("location out of range".to_string()))
    }
}

/// What a session may see: responders their category, citizens their own
/// records (optionally narrowed to one category). A window of zero records
/// is refused; MongoDB would read `limit(0)` as no limit at all.
pub fn scope_for(
    actor: &SessionContext,
    category: Option<Category>,
    limit: Option<usize>,
) -> Result<AlertFilter, AlertError> {
    if limit == Some(0) {
        return Err(AlertError::Validation(
            "limit must be at least 1".to_string(),
        ));
    }
    let filter = match actor.responder_category() {
        Some(own) => {
            if category.is_some_and(|c| c != own) {
                return Err(AlertError::Unauthorized(format!(
                    "responders of {own} cannot list {}",
                    category.map(|c| c.as_str()).unwrap_or_default()
                )));
            }
            AlertFilter::by_category(own)
        }
        None => AlertFilter {
            category,
            ..AlertFilter::by_reporter(actor.user_id)
        },
    };
    Ok(filter.with_limit(limit))
}

fn can_view(actor: &SessionContext, category: Category, reporter: ObjectId) -> bool {
    actor.role.responds_to(category) || actor.user_id == reporter
}

/// Citizen and responder operations on alert records.
pub struct AlertService {
    store: Arc<AlertStore>,
    users: Arc<dyn UserRepository>,
}

impl AlertService {
    pub fn new(store: Arc<AlertStore>, users: Arc<dyn UserRepository>) -> Self {
        Self { store, users }
    }

    pub fn store(&self) -> &Arc<AlertStore> {
        &self.store
    }

    pub async fn create_notification(
        &self,
        actor: &SessionContext,
        req: CreateNotification,
    ) -> Result<Notification, AlertError> {
        if !actor.is_citizen() {
            return Err(AlertError::Unauthorized(
                "only citizens can create notifications".to_string(),
            ));
        }
        let category = parse_category(&req.category)?;
        let title = req.title.trim().to_string();
        let description = req.description.trim().to_string();
        if title.is_empty() || description.is_empty() {
            return Err(AlertError::Validation(
                "title and description are required".to_string(),
            ));
        }
        let attachment_url = req
            .attachment_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let user = self.users.find_by_id(actor.user_id).await?;
        let notification = self
            .store
            .create_notification(NewNotification {
                category,
                title,
                description,
                attachment_url,
                user_id: actor.user_id,
                user_name: user.username,
                email: user.email,
            })
            .await?;
        info!(notification_id = ?notification.id, %category, user_id = %actor.user_id, "Notification submitted");
        Ok(notification)
    }

    pub async fn create_panic_alert(
        &self,
        actor: &SessionContext,
        req: CreatePanicAlert,
    ) -> Result<PanicAlert, AlertError> {
        if !actor.is_citizen() {
            return Err(AlertError::Unauthorized(
                "only citizens can raise panic alerts".to_string(),
            ));
        }
        let category = parse_category(&req.category)?;
        if let Some(location) = &req.location {
            check_location(location)?;
        }
        let address = req
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());
        let user_name_panic = match actor.username.trim() {
            "" => UNKNOWN_PANIC_NAME.to_string(),
            name => name.to_string(),
        };

        let alert = self
            .store
            .create_panic_alert(NewPanicAlert {
                user_id: actor.user_id,
                user_name_panic,
                category,
                location: req.location,
                address,
            })
            .await?;
        info!(alert_id = ?alert.id, %category, user_id = %actor.user_id, has_location = alert.location.is_some(), "Panic alert raised");
        Ok(alert)
    }

    pub async fn add_response(
        &self,
        actor: &SessionContext,
        notification_id: ObjectId,
        text: &str,
    ) -> Result<NotificationResponse, AlertError> {
        let text = normalize_text(text);
        if text.is_empty() {
            return Err(AlertError::Validation("response text is required".to_string()));
        }
        let notification = self.store.get_notification(notification_id).await?;
        if !actor.role.is_responder() && actor.user_id != notification.user_id {
            return Err(AlertError::Unauthorized(
                "only responders or the reporter can reply".to_string(),
            ));
        }
        Ok(self
            .store
            .add_response(NewResponse {
                notification_id,
                text,
                user_id: actor.user_id,
                user_name: actor.username.clone(),
                role: actor.role,
            })
            .await?)
    }

    pub async fn list_responses(
        &self,
        actor: &SessionContext,
        notification_id: ObjectId,
    ) -> Result<Vec<NotificationResponse>, AlertError> {
        self.check_thread_access(actor, notification_id).await?;
        Ok(self.store.list_responses(notification_id).await?)
    }

    /// Responders of any category and the reporter may follow a thread.
    pub async fn check_thread_access(
        &self,
        actor: &SessionContext,
        notification_id: ObjectId,
    ) -> Result<Notification, AlertError> {
        let notification = self.store.get_notification(notification_id).await?;
        if !actor.role.is_responder() && actor.user_id != notification.user_id {
            return Err(AlertError::NotFound);
        }
        Ok(notification)
    }

    pub async fn get_notification(
        &self,
        actor: &SessionContext,
        id: ObjectId,
    ) -> Result<Notification, AlertError> {
        let notification = self.store.get_notification(id).await?;
        if !can_view(actor, notification.category, notification.user_id) {
            return Err(AlertError::NotFound);
        }
        Ok(notification)
    }

    pub async fn get_panic_alert(
        &self,
        actor: &SessionContext,
        id: ObjectId,
    ) -> Result<PanicAlert, AlertError> {
        let alert = self.store.get_panic_alert(id).await?;
        if !can_view(actor, alert.category, alert.user_id) {
            return Err(AlertError::NotFound);
        }
        Ok(alert)
    }

    pub async fn list_notifications(
        &self,
        actor: &SessionContext,
        category: Option<Category>,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>, AlertError> {
        let filter = scope_for(actor, category, limit)?;
        Ok(self.store.list_notifications(&filter).await?)
    }

    pub async fn list_panic_alerts(
        &self,
        actor: &SessionContext,
        category: Option<Category>,
        limit: Option<usize>,
    ) -> Result<Vec<PanicAlert>, AlertError> {
        let filter = scope_for(actor, category, limit)?;
        Ok(self.store.list_panic_alerts(&filter).await?)
    }
}
