use std::sync::Arc;

use alerta_db::models::{
    Category, GeoPoint, Notification, NotificationResponse, NotificationStatus, PanicAlert,
    PanicStatus, Role,
};
use bson::{DateTime, oid::ObjectId};
use tokio::sync::Mutex;
use tracing::debug;

use super::feed::{ChangeFeed, FeedReceiver, StoreEvent};
use super::live::LiveQuery;
use super::repository::{AlertFilter, AlertRepository, PanicStatusUpdate};
use crate::dao::base::{DaoError, DaoResult};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub category: Category,
    pub title: String,
    pub description: String,
    pub attachment_url: Option<String>,
    pub user_id: ObjectId,
    pub user_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct NewPanicAlert {
    pub user_id: ObjectId,
    pub user_name_panic: String,
    pub category: Category,
    pub location: Option<GeoPoint>,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct NewResponse {
    pub notification_id: ObjectId,
    pub text: String,
    pub user_id: ObjectId,
    pub user_name: String,
    pub role: Role,
}

/// Durable alert records plus the change feed that live queries and the
/// creation trigger are built on.
///
/// Every write is committed and published while the commit lock is held,
/// and live queries snapshot under the same lock. A subscriber therefore
/// sees exactly the writes after its snapshot, in commit order. The lock
/// is held across repository I/O, so all writes in the process queue
/// behind one another; write throughput is bounded by one round trip to
/// the backend at a time.
///
/// Writes run on a task of their own. A caller that is dropped mid-write
/// only stops waiting; the write and its event still land together.
pub struct AlertStore {
    repo: Arc<dyn AlertRepository>,
    feed: Arc<ChangeFeed>,
    /// Last timestamp handed out, in millis.
    commit: Arc<Mutex<i64>>,
}

impl AlertStore {
    pub fn new(repo: Arc<dyn AlertRepository>) -> Self {
        Self {
            repo,
            feed: Arc::new(ChangeFeed::new()),
            commit: Arc::new(Mutex::new(0)),
        }
    }

    /// Server clock, bumped so timestamps strictly increase within the process.
    fn next_timestamp(last: &mut i64) -> DateTime {
        let now = DateTime::now().timestamp_millis();
        *last = now.max(*last + 1);
        DateTime::from_millis(*last)
    }

    /// Raw change events, starting from the next commit.
    pub fn changes(&self) -> FeedReceiver {
        self.feed.subscribe()
    }

    /// Runs `write` under the commit lock and publishes the event it
    /// returns before the lock is released.
    async fn commit<T, F, Fut>(&self, write: F) -> DaoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn AlertRepository>, DateTime) -> Fut + Send + 'static,
        Fut: Future<Output = DaoResult<(T, Option<StoreEvent>)>> + Send + 'static,
    {
        let repo = self.repo.clone();
        let feed = self.feed.clone();
        let commit = self.commit.clone();
        tokio::spawn(async move {
            let mut last = commit.lock().await;
            let at = Self::next_timestamp(&mut last);
            let (value, event) = write(repo, at).await?;
            if let Some(event) = event {
                feed.publish(event);
            }
            Ok::<T, DaoError>(value)
        })
        .await
        .map_err(|e| DaoError::WriteTask(e.to_string()))?
    }

    pub async fn create_notification(&self, draft: NewNotification) -> DaoResult<Notification> {
        self.commit(move |repo, at| async move {
            let mut notification = Notification {
                id: None,
                category: draft.category,
                title: draft.title,
                description: draft.description,
                attachment_url: draft.attachment_url,
                user_id: draft.user_id,
                user_name: draft.user_name,
                email: draft.email,
                created_at: at,
                status: NotificationStatus::Pendiente,
                status_updated_at: None,
            };
            notification.id = Some(repo.insert_notification(&notification).await?);
            debug!(notification_id = ?notification.id, category = %notification.category, "Notification created");
            let event = StoreEvent::NotificationCreated(notification.clone());
            Ok((notification, Some(event)))
        })
        .await
    }

    pub async fn create_panic_alert(&self, draft: NewPanicAlert) -> DaoResult<PanicAlert> {
        self.commit(move |repo, at| async move {
            let mut alert = PanicAlert {
                id: None,
                user_id: draft.user_id,
                user_name_panic: draft.user_name_panic,
                category: draft.category,
                location: draft.location,
                address: draft.address,
                created_at: at,
                status: PanicStatus::Recibida,
                status_updated_at: None,
                responder_username: None,
            };
            alert.id = Some(repo.insert_panic_alert(&alert).await?);
            debug!(alert_id = ?alert.id, category = %alert.category, "Panic alert created");
            let event = StoreEvent::PanicAlertCreated(alert.clone());
            Ok((alert, Some(event)))
        })
        .await
    }

    pub async fn add_response(&self, draft: NewResponse) -> DaoResult<NotificationResponse> {
        self.commit(move |repo, at| async move {
            let mut response = NotificationResponse {
                id: None,
                notification_id: draft.notification_id,
                text: draft.text,
                user_id: draft.user_id,
                user_name: draft.user_name,
                role: draft.role,
                created_at: at,
            };
            response.id = Some(repo.insert_response(&response).await?);
            let event = StoreEvent::ResponseAdded(response.clone());
            Ok((response, Some(event)))
        })
        .await
    }

    pub async fn get_notification(&self, id: ObjectId) -> DaoResult<Notification> {
        self.repo.find_notification(id).await
    }

    pub async fn get_panic_alert(&self, id: ObjectId) -> DaoResult<PanicAlert> {
        self.repo.find_panic_alert(id).await
    }

    pub async fn list_notifications(&self, filter: &AlertFilter) -> DaoResult<Vec<Notification>> {
        self.repo.list_notifications(filter).await
    }

    pub async fn list_panic_alerts(&self, filter: &AlertFilter) -> DaoResult<Vec<PanicAlert>> {
        self.repo.list_panic_alerts(filter).await
    }

    pub async fn list_responses(
        &self,
        notification_id: ObjectId,
    ) -> DaoResult<Vec<NotificationResponse>> {
        self.repo.list_responses(notification_id).await
    }

    /// Moves a notification from `expected` to `status`. `None` when the
    /// stored status was no longer `expected`.
    pub async fn update_notification_status(
        &self,
        id: ObjectId,
        expected: NotificationStatus,
        status: NotificationStatus,
    ) -> DaoResult<Option<Notification>> {
        self.commit(move |repo, at| async move {
            let notification = repo
                .update_notification_status(id, expected, status, at)
                .await?;
            let event = notification.clone().map(StoreEvent::NotificationUpdated);
            Ok((notification, event))
        })
        .await
    }

    /// Moves a panic alert from `expected` to `status`, recording the
    /// responder. `None` when the stored status was no longer `expected`.
    pub async fn update_panic_status(
        &self,
        id: ObjectId,
        expected: PanicStatus,
        status: PanicStatus,
        responder_username: &str,
    ) -> DaoResult<Option<PanicAlert>> {
        let responder_username = responder_username.to_string();
        self.commit(move |repo, at| async move {
            let update = PanicStatusUpdate {
                status,
                status_updated_at: at,
                responder_username,
            };
            let alert = repo.update_panic_status(id, expected, &update).await?;
            let event = alert.clone().map(StoreEvent::PanicAlertUpdated);
            Ok((alert, event))
        })
        .await
    }

    pub async fn subscribe_notifications(
        &self,
        filter: AlertFilter,
    ) -> DaoResult<LiveQuery<Notification>> {
        let _commit = self.commit.lock().await;
        let rx = self.feed.subscribe();
        let items = self.repo.list_notifications(&filter).await?;
        Ok(LiveQuery::new(rx, filter, filter.limit, items))
    }

    pub async fn subscribe_panic_alerts(
        &self,
        filter: AlertFilter,
    ) -> DaoResult<LiveQuery<PanicAlert>> {
        let _commit = self.commit.lock().await;
        let rx = self.feed.subscribe();
        let items = self.repo.list_panic_alerts(&filter).await?;
        Ok(LiveQuery::new(rx, filter, filter.limit, items))
    }

    pub async fn subscribe_responses(
        &self,
        notification_id: ObjectId,
    ) -> DaoResult<LiveQuery<NotificationResponse>> {
        let _commit = self.commit.lock().await;
        let rx = self.feed.subscribe();
        let items = self.repo.list_responses(notification_id).await?;
        Ok(LiveQuery::new(rx, notification_id, None, items))
    }
}
