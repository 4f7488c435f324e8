use alerta_db::models::{
    Notification, NotificationResponse, NotificationStatus, PanicAlert, PanicStatus,
};
use async_trait::async_trait;
use bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::Database;

use super::base::{BaseDao, DaoResult};
use crate::store::repository::{AlertFilter, AlertRepository, PanicStatusUpdate};

/// MongoDB backend for notifications, their responses and panic alerts.
pub struct AlertDao {
    pub notifications: BaseDao<Notification>,
    pub responses: BaseDao<NotificationResponse>,
    pub panic_alerts: BaseDao<PanicAlert>,
}

impl AlertDao {
    pub fn new(db: &Database) -> Self {
        Self {
            notifications: BaseDao::new(db, Notification::COLLECTION),
            responses: BaseDao::new(db, NotificationResponse::COLLECTION),
            panic_alerts: BaseDao::new(db, PanicAlert::COLLECTION),
        }
    }
}

fn feed_filter(filter: &AlertFilter) -> Document {
    let mut query = Document::new();
    if let Some(category) = filter.category {
        query.insert("category", category.as_str());
    }
    if let Some(reporter) = filter.reporter {
        query.insert("user_id", reporter);
    }
    query
}

fn newest_first() -> Document {
    doc! { "created_at": -1, "_id": -1 }
}

#[async_trait]
impl AlertRepository for AlertDao {
    async fn insert_notification(&self, notification: &Notification) -> DaoResult<ObjectId> {
        self.notifications.insert(notification).await
    }

    async fn find_notification(&self, id: ObjectId) -> DaoResult<Notification> {
        self.notifications.find_by_id(id).await
    }

    async fn list_notifications(&self, filter: &AlertFilter) -> DaoResult<Vec<Notification>> {
        self.notifications
            .find_sorted(feed_filter(filter), newest_first(), filter.limit)
            .await
    }

    async fn update_notification_status(
        &self,
        id: ObjectId,
        expected: NotificationStatus,
        status: NotificationStatus,
        at: DateTime,
    ) -> DaoResult<Option<Notification>> {
        self.notifications
            .update_returning(
                doc! { "_id": id, "status": expected.as_str() },
                doc! { "status": status.as_str(), "status_updated_at": at },
            )
            .await
    }

    async fn insert_response(&self, response: &NotificationResponse) -> DaoResult<ObjectId> {
        self.responses.insert(response).await
    }

    async fn list_responses(
        &self,
        notification_id: ObjectId,
    ) -> DaoResult<Vec<NotificationResponse>> {
        self.responses
            .find_sorted(
                doc! { "notification_id": notification_id },
                doc! { "created_at": 1, "_id": 1 },
                None,
            )
            .await
    }

    async fn insert_panic_alert(&self, alert: &PanicAlert) -> DaoResult<ObjectId> {
        self.panic_alerts.insert(alert).await
    }

    async fn find_panic_alert(&self, id: ObjectId) -> DaoResult<PanicAlert> {
        self.panic_alerts.find_by_id(id).await
    }

    async fn list_panic_alerts(&self, filter: &AlertFilter) -> DaoResult<Vec<PanicAlert>> {
        self.panic_alerts
            .find_sorted(feed_filter(filter), newest_first(), filter.limit)
            .await
    }

    async fn update_panic_status(
        &self,
        id: ObjectId,
        expected: PanicStatus,
        update: &PanicStatusUpdate,
    ) -> DaoResult<Option<PanicAlert>> {
        self.panic_alerts
            .update_returning(
                doc! { "_id": id, "status": expected.as_str() },
                doc! {
                    "status": update.status.as_str(),
                    "status_updated_at": update.status_updated_at,
                    "responder_username": &update.responder_username,
                },
            )
            .await
    }
}
