use std::sync::Arc;

use alerta_db::models::{Notification, NotificationStatus, PanicAlert, PanicStatus};
use bson::oid::ObjectId;
use thiserror::Error;
use tracing::{info, warn};

use crate::dao::base::DaoError;
use crate::dispatch::{Dispatcher, NotifyOutcome};
use crate::session::SessionContext;
use crate::store::AlertStore;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("alert not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(DaoError),
}

impl From<DaoError> for TransitionError {
    fn from(e: DaoError) -> Self {
        match e {
            DaoError::NotFound => TransitionError::NotFound,
            other => TransitionError::Store(other),
        }
    }
}

/// The only status a panic alert may move to next, `None` once finished.
pub fn next_panic_status(current: PanicStatus) -> Option<PanicStatus> {
    match current {
        PanicStatus::Recibida => Some(PanicStatus::EnCamino),
        PanicStatus::EnCamino => Some(PanicStatus::Finalizado),
        PanicStatus::Finalizado => None,
    }
}

pub fn check_panic_transition(from: PanicStatus, to: PanicStatus) -> Result<(), TransitionError> {
    if next_panic_status(from) == Some(to) {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

pub fn check_notification_transition(
    from: NotificationStatus,
    to: NotificationStatus,
) -> Result<(), TransitionError> {
    use NotificationStatus::*;
    match (from, to) {
        (Pendiente, EnProceso) | (Pendiente, Resuelto) | (EnProceso, Resuelto) => Ok(()),
        _ => Err(TransitionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// A committed panic status change and what happened to the reporter push.
#[derive(Debug, Clone)]
pub struct PanicTransition {
    pub alert: PanicAlert,
    pub notification: NotifyOutcome,
}

/// Authorizes, validates and commits status changes.
pub struct LifecycleService {
    store: Arc<AlertStore>,
    dispatcher: Arc<Dispatcher>,
}

impl LifecycleService {
    pub fn new(store: Arc<AlertStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Advances a panic alert one step and then notifies its reporter.
    /// The write is conditional on the status that was validated, so two
    /// racing responders cannot both win. Write and push run on their own
    /// task: once the write is issued, dropping the caller cannot skip the
    /// push.
    pub async fn apply_panic_transition(
        &self,
        alert_id: ObjectId,
        requested: PanicStatus,
        actor: &SessionContext,
        responder_username: &str,
    ) -> Result<PanicTransition, TransitionError> {
        let Some(category) = actor.responder_category() else {
            return Err(TransitionError::Unauthorized(
                "only responders can update panic alerts".to_string(),
            ));
        };

        let current = self.store.get_panic_alert(alert_id).await?;
        if current.category != category {
            warn!(%alert_id, actor = %actor.username, alert_category = %current.category, "Responder outside alert category");
            return Err(TransitionError::Unauthorized(format!(
                "alert belongs to {}",
                current.category
            )));
        }
        check_panic_transition(current.status, requested)?;

        let responder = match responder_username.trim() {
            "" => actor.username.clone(),
            name => name.to_string(),
        };
        let store = self.store.clone();
        let dispatcher = self.dispatcher.clone();
        let from = current.status;
        let committed = tokio::spawn(async move {
            let Some(alert) = store
                .update_panic_status(alert_id, from, requested, &responder)
                .await?
            else {
                return Ok(None);
            };
            info!(%alert_id, %from, to = %alert.status, responder = %responder, "Panic alert status updated");
            let notification = dispatcher.notify_status_change(&alert).await;
            Ok::<_, TransitionError>(Some(PanicTransition { alert, notification }))
        })
        .await
        .map_err(|e| TransitionError::Store(DaoError::WriteTask(e.to_string())))??;

        match committed {
            Some(transition) => Ok(transition),
            None => {
                let now = self.store.get_panic_alert(alert_id).await?;
                Err(TransitionError::InvalidTransition {
                    from: now.status.to_string(),
                    to: requested.to_string(),
                })
            }
        }
    }

    pub async fn apply_notification_transition(
        &self,
        notification_id: ObjectId,
        requested: NotificationStatus,
        actor: &SessionContext,
    ) -> Result<Notification, TransitionError> {
        let Some(category) = actor.responder_category() else {
            return Err(TransitionError::Unauthorized(
                "only responders can update notifications".to_string(),
            ));
        };

        let current = self.store.get_notification(notification_id).await?;
        if current.category != category {
            return Err(TransitionError::Unauthorized(format!(
                "notification belongs to {}",
                current.category
            )));
        }
        check_notification_transition(current.status, requested)?;

        match self
            .store
            .update_notification_status(notification_id, current.status, requested)
            .await?
        {
            Some(updated) => {
                info!(%notification_id, from = %current.status, to = %updated.status, "Notification status updated");
                Ok(updated)
            }
            None => {
                let now = self.store.get_notification(notification_id).await?;
                Err(TransitionError::InvalidTransition {
                    from: now.status.to_string(),
                    to: requested.to_string(),
                })
            }
        }
    }
}
