use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Dispatcher;
use crate::store::{AlertStore, StoreEvent};

/// Runs the creation fan-out exactly once for every panic alert committed
/// after [`CreationTrigger::spawn`] returns. Each fan-out gets its own task
/// so a slow provider never holds back the next alert.
pub struct CreationTrigger;

impl CreationTrigger {
    pub fn spawn(store: &AlertStore, dispatcher: Arc<Dispatcher>) -> JoinHandle<()> {
        let mut changes = store.changes();
        tokio::spawn(async move {
            info!("Panic alert creation trigger started");
            while let Some(event) = changes.recv().await {
                if let StoreEvent::PanicAlertCreated(alert) = &*event {
                    debug!(alert_id = ?alert.id, "Creation trigger fired");
                    let dispatcher = Arc::clone(&dispatcher);
                    let alert = alert.clone();
                    tokio::spawn(async move {
                        dispatcher.handle_created(&alert).await;
                    });
                }
            }
            info!("Panic alert creation trigger stopped");
        })
    }
}
