use std::cmp::Ordering;

use alerta_db::models::{Notification, NotificationResponse, PanicAlert};
use bson::oid::ObjectId;

use super::feed::{FeedReceiver, StoreEvent};
use super::repository::AlertFilter;

/// A record type that can be watched through a [`LiveQuery`].
pub trait LiveRecord: Clone + PartialEq + Send + Sync + 'static {
    type Scope: Send + Sync;

    /// `true` when the feed is ordered newest first.
    const NEWEST_FIRST: bool;

    fn record_id(&self) -> Option<ObjectId>;
    fn sort_key(&self) -> (i64, Option<ObjectId>);
    fn in_scope(&self, scope: &Self::Scope) -> bool;
    fn from_event(event: &StoreEvent) -> Option<&Self>;
}

impl LiveRecord for Notification {
    type Scope = AlertFilter;
    const NEWEST_FIRST: bool = true;

    fn record_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn sort_key(&self) -> (i64, Option<ObjectId>) {
        (self.created_at.timestamp_millis(), self.id)
    }

    fn in_scope(&self, scope: &AlertFilter) -> bool {
        scope.matches(self.category, self.user_id)
    }

    fn from_event(event: &StoreEvent) -> Option<&Self> {
        match event {
            StoreEvent::NotificationCreated(n) | StoreEvent::NotificationUpdated(n) => Some(n),
            _ => None,
        }
    }
}

impl LiveRecord for PanicAlert {
    type Scope = AlertFilter;
    const NEWEST_FIRST: bool = true;

    fn record_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn sort_key(&self) -> (i64, Option<ObjectId>) {
        (self.created_at.timestamp_millis(), self.id)
    }

    fn in_scope(&self, scope: &AlertFilter) -> bool {
        scope.matches(self.category, self.user_id)
    }

    fn from_event(event: &StoreEvent) -> Option<&Self> {
        match event {
            StoreEvent::PanicAlertCreated(a) | StoreEvent::PanicAlertUpdated(a) => Some(a),
            _ => None,
        }
    }
}

impl LiveRecord for NotificationResponse {
    /// Parent notification id.
    type Scope = ObjectId;
    const NEWEST_FIRST: bool = false;

    fn record_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn sort_key(&self) -> (i64, Option<ObjectId>) {
        (self.created_at.timestamp_millis(), self.id)
    }

    fn in_scope(&self, scope: &ObjectId) -> bool {
        self.notification_id == *scope
    }

    fn from_event(event: &StoreEvent) -> Option<&Self> {
        match event {
            StoreEvent::ResponseAdded(r) => Some(r),
            _ => None,
        }
    }
}

/// Pull-based live query. The first call to [`LiveQuery::next`] yields the
/// snapshot taken at registration; every later call waits for a change
/// that alters the result set and yields the new snapshot. Dropping the
/// handle unsubscribes from the feed.
///
/// `next` is cancel-safe: events are folded only after they are received,
/// so a cancelled call never loses one.
pub struct LiveQuery<T: LiveRecord> {
    rx: FeedReceiver,
    scope: T::Scope,
    limit: Option<usize>,
    items: Vec<T>,
    initial_pending: bool,
}

impl<T: LiveRecord> LiveQuery<T> {
    pub(crate) fn new(rx: FeedReceiver, scope: T::Scope, limit: Option<usize>, items: Vec<T>) -> Self {
        Self {
            rx,
            scope,
            limit,
            items,
            initial_pending: true,
        }
    }

    pub fn snapshot(&self) -> &[T] {
        &self.items
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Next result set, or `None` once the feed has shut down.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        if self.initial_pending {
            self.initial_pending = false;
            return Some(self.items.clone());
        }
        loop {
            let event = self.rx.recv().await?;
            if let Some(record) = T::from_event(&event) {
                if self.apply(record) {
                    return Some(self.items.clone());
                }
            }
        }
    }

    fn compare(a: &T, b: &T) -> Ordering {
        let ord = a.sort_key().cmp(&b.sort_key());
        if T::NEWEST_FIRST { ord.reverse() } else { ord }
    }

    /// Folds one record into the window. Returns whether the result set changed.
    fn apply(&mut self, record: &T) -> bool {
        if !record.in_scope(&self.scope) {
            return false;
        }

        let id = record.record_id();
        if let Some(pos) = self.items.iter().position(|i| i.record_id() == id) {
            if self.items[pos] == *record {
                return false;
            }
            self.items[pos] = record.clone();
            return true;
        }

        let window_full = self.limit.is_some_and(|l| self.items.len() >= l);
        if window_full {
            match self.items.last() {
                Some(last) if Self::compare(record, last) == Ordering::Greater => return false,
                None => return false,
                _ => {}
            }
        }

        let pos = self
            .items
            .iter()
            .position(|i| Self::compare(record, i) == Ordering::Less)
            .unwrap_or(self.items.len());
        self.items.insert(pos, record.clone());
        if let Some(limit) = self.limit {
            self.items.truncate(limit);
        }
        true
    }
}
