use std::cmp::Reverse;
use std::collections::HashMap;

use alerta_db::models::{
    Notification, NotificationResponse, NotificationStatus, PanicAlert, PanicStatus, Role, User,
};
use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use parking_lot::RwLock;

use super::repository::{AlertFilter, AlertRepository, PanicStatusUpdate, UserRepository};
use crate::dao::base::{DaoError, DaoResult};

/// Process-local backend with the same semantics as the MongoDB one:
/// unique email/username, conditional status updates, identical ordering.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<ObjectId, User>>,
    notifications: RwLock<HashMap<ObjectId, Notification>>,
    responses: RwLock<HashMap<ObjectId, NotificationResponse>>,
    panic_alerts: RwLock<HashMap<ObjectId, PanicAlert>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (i64, Option<ObjectId>)) {
    items.sort_by_key(|item| Reverse(key(item)));
}

fn take_limit<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &User) -> DaoResult<ObjectId> {
        let mut users = self.users.write();
        if let Some(existing) = users
            .values()
            .find(|u| u.email == user.email || u.username == user.username)
        {
            let key = if existing.email == user.email {
                format!("email: {}", user.email)
            } else {
                format!("username: {}", user.username)
            };
            return Err(DaoError::DuplicateKey(key));
        }
        let id = user.id.unwrap_or_else(ObjectId::new);
        let mut stored = user.clone();
        stored.id = Some(id);
        users.insert(id, stored);
        Ok(id)
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<User> {
        self.users.read().get(&id).cloned().ok_or(DaoError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> DaoResult<Option<User>> {
        Ok(self.users.read().values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DaoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_role(&self, role: Role) -> DaoResult<Vec<User>> {
        let mut found: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        found.sort_by_key(|u| u.id);
        Ok(found)
    }

    async fn set_push_token(&self, id: ObjectId, token: Option<String>) -> DaoResult<bool> {
        Ok(match self.users.write().get_mut(&id) {
            Some(user) => {
                user.push_token = token;
                user.updated_at = DateTime::now();
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> DaoResult<ObjectId> {
        let id = notification.id.unwrap_or_else(ObjectId::new);
        let mut stored = notification.clone();
        stored.id = Some(id);
        self.notifications.write().insert(id, stored);
        Ok(id)
    }

    async fn find_notification(&self, id: ObjectId) -> DaoResult<Notification> {
        self.notifications
            .read()
            .get(&id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    async fn list_notifications(&self, filter: &AlertFilter) -> DaoResult<Vec<Notification>> {
        let mut items: Vec<Notification> = self
            .notifications
            .read()
            .values()
            .filter(|n| filter.matches(n.category, n.user_id))
            .cloned()
            .collect();
        newest_first(&mut items, |n| (n.created_at.timestamp_millis(), n.id));
        Ok(take_limit(items, filter.limit))
    }

    async fn update_notification_status(
        &self,
        id: ObjectId,
        expected: NotificationStatus,
        status: NotificationStatus,
        at: DateTime,
    ) -> DaoResult<Option<Notification>> {
        let mut notifications = self.notifications.write();
        Ok(match notifications.get_mut(&id) {
            Some(n) if n.status == expected => {
                n.status = status;
                n.status_updated_at = Some(at);
                Some(n.clone())
            }
            _ => None,
        })
    }

    async fn insert_response(&self, response: &NotificationResponse) -> DaoResult<ObjectId> {
        let id = response.id.unwrap_or_else(ObjectId::new);
        let mut stored = response.clone();
        stored.id = Some(id);
        self.responses.write().insert(id, stored);
        Ok(id)
    }

    async fn list_responses(
        &self,
        notification_id: ObjectId,
    ) -> DaoResult<Vec<NotificationResponse>> {
        let mut items: Vec<NotificationResponse> = self
            .responses
            .read()
            .values()
            .filter(|r| r.notification_id == notification_id)
            .cloned()
            .collect();
        items.sort_by_key(|r| (r.created_at.timestamp_millis(), r.id));
        Ok(items)
    }

    async fn insert_panic_alert(&self, alert: &PanicAlert) -> DaoResult<ObjectId> {
        let id = alert.id.unwrap_or_else(ObjectId::new);
        let mut stored = alert.clone();
        stored.id = Some(id);
        self.panic_alerts.write().insert(id, stored);
        Ok(id)
    }

    async fn find_panic_alert(&self, id: ObjectId) -> DaoResult<PanicAlert> {
        self.panic_alerts
            .read()
            .get(&id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    async fn list_panic_alerts(&self, filter: &AlertFilter) -> DaoResult<Vec<PanicAlert>> {
        let mut items: Vec<PanicAlert> = self
            .panic_alerts
            .read()
            .values()
            .filter(|a| filter.matches(a.category, a.user_id))
            .cloned()
            .collect();
        newest_first(&mut items, |a| (a.created_at.timestamp_millis(), a.id));
        Ok(take_limit(items, filter.limit))
    }

    async fn update_panic_status(
        &self,
        id: ObjectId,
        expected: PanicStatus,
        update: &PanicStatusUpdate,
    ) -> DaoResult<Option<PanicAlert>> {
        let mut alerts = self.panic_alerts.write();
        Ok(match alerts.get_mut(&id) {
            Some(alert) if alert.status == expected => {
                alert.status = update.status;
                alert.status_updated_at = Some(update.status_updated_at);
                alert.responder_username = Some(update.responder_username.clone());
                Some(alert.clone())
            }
            _ => None,
        })
    }
}

/// Memory backend whose status writes land only after `delay`, leaving a
/// window in which the caller can be dropped mid-write.
#[cfg(test)]
pub(crate) struct SlowStatusWrites {
    inner: std::sync::Arc<MemoryStore>,
    delay: std::time::Duration,
}

#[cfg(test)]
impl SlowStatusWrites {
    pub(crate) fn new(inner: std::sync::Arc<MemoryStore>, delay: std::time::Duration) -> Self {
        Self { inner, delay }
    }
}

#[cfg(test)]
#[async_trait]
impl AlertRepository for SlowStatusWrites {
    async fn insert_notification(&self, notification: &Notification) -> DaoResult<ObjectId> {
        self.inner.insert_notification(notification).await
    }

    async fn find_notification(&self, id: ObjectId) -> DaoResult<Notification> {
        self.inner.find_notification(id).await
    }

    async fn list_notifications(&self, filter: &AlertFilter) -> DaoResult<Vec<Notification>> {
        self.inner.list_notifications(filter).await
    }

    async fn update_notification_status(
        &self,
        id: ObjectId,
        expected: NotificationStatus,
        status: NotificationStatus,
        at: DateTime,
    ) -> DaoResult<Option<Notification>> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .update_notification_status(id, expected, status, at)
            .await
    }

    async fn insert_response(&self, response: &NotificationResponse) -> DaoResult<ObjectId> {
        self.inner.insert_response(response).await
    }

    async fn list_responses(
        &self,
        notification_id: ObjectId,
    ) -> DaoResult<Vec<NotificationResponse>> {
        self.inner.list_responses(notification_id).await
    }

    async fn insert_panic_alert(&self, alert: &PanicAlert) -> DaoResult<ObjectId> {
        self.inner.insert_panic_alert(alert).await
    }

    async fn find_panic_alert(&self, id: ObjectId) -> DaoResult<PanicAlert> {
        self.inner.find_panic_alert(id).await
    }

    async fn list_panic_alerts(&self, filter: &AlertFilter) -> DaoResult<Vec<PanicAlert>> {
        self.inner.list_panic_alerts(filter).await
    }

    async fn update_panic_status(
        &self,
        id: ObjectId,
        expected: PanicStatus,
        update: &PanicStatusUpdate,
    ) -> DaoResult<Option<PanicAlert>> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_panic_status(id, expected, update).await
    }
}
