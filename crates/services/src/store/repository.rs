use alerta_db::models::{
    Category, Notification, NotificationResponse, NotificationStatus, PanicAlert, PanicStatus,
    Role, User,
};
use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};

use crate::dao::base::DaoResult;

/// Feed selection shared by notifications and panic alerts. Results are
/// always newest first (`created_at` desc, id desc as tie-break).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub category: Option<Category>,
    pub reporter: Option<ObjectId>,
    pub limit: Option<usize>,
}

impl AlertFilter {
    pub fn by_category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn by_reporter(reporter: ObjectId) -> Self {
        Self {
            reporter: Some(reporter),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, category: Category, reporter: ObjectId) -> bool {
        self.category.is_none_or(|c| c == category) && self.reporter.is_none_or(|r| r == reporter)
    }
}

/// Fields written together when a panic alert advances.
#[derive(Debug, Clone, PartialEq)]
pub struct PanicStatusUpdate {
    pub status: PanicStatus,
    pub status_updated_at: DateTime,
    pub responder_username: String,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> DaoResult<ObjectId>;
    async fn find_by_id(&self, id: ObjectId) -> DaoResult<User>;
    async fn find_by_email(&self, email: &str) -> DaoResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> DaoResult<Option<User>>;
    async fn find_by_role(&self, role: Role) -> DaoResult<Vec<User>>;
    async fn set_push_token(&self, id: ObjectId, token: Option<String>) -> DaoResult<bool>;
}

/// Durable record of notifications, their response threads and panic
/// alerts. Status updates are conditional on the `expected` current status
/// and return the record as stored after the write, or `None` when the
/// guard did not hold. Write and read-back are one call.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> DaoResult<ObjectId>;
    async fn find_notification(&self, id: ObjectId) -> DaoResult<Notification>;
    async fn list_notifications(&self, filter: &AlertFilter) -> DaoResult<Vec<Notification>>;
    async fn update_notification_status(
        &self,
        id: ObjectId,
        expected: NotificationStatus,
        status: NotificationStatus,
        at: DateTime,
    ) -> DaoResult<Option<Notification>>;

    async fn insert_response(&self, response: &NotificationResponse) -> DaoResult<ObjectId>;
    async fn list_responses(&self, notification_id: ObjectId)
    -> DaoResult<Vec<NotificationResponse>>;

    async fn insert_panic_alert(&self, alert: &PanicAlert) -> DaoResult<ObjectId>;
    async fn find_panic_alert(&self, id: ObjectId) -> DaoResult<PanicAlert>;
    async fn list_panic_alerts(&self, filter: &AlertFilter) -> DaoResult<Vec<PanicAlert>>;
    async fn update_panic_status(
        &self,
        id: ObjectId,
        expected: PanicStatus,
        update: &PanicStatusUpdate,
    ) -> DaoResult<Option<PanicAlert>>;
}
