use std::sync::Arc;

use alerta_db::models::{Notification, NotificationResponse, PanicAlert};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A committed write, carrying the full record as stored after the write.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    NotificationCreated(Notification),
    NotificationUpdated(Notification),
    ResponseAdded(NotificationResponse),
    PanicAlertCreated(PanicAlert),
    PanicAlertUpdated(PanicAlert),
}

pub type FeedReceiver = mpsc::UnboundedReceiver<Arc<StoreEvent>>;

/// In-process fan-out of committed writes. Publishing happens while the
/// store's commit lock is held, so every subscriber receives events in
/// commit order. Subscribers whose receiver was dropped are pruned on the
/// next publish.
#[derive(Default)]
pub struct ChangeFeed {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Arc<StoreEvent>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> FeedReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: StoreEvent) {
        let event = Arc::new(event);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(Arc::clone(&event)).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}
