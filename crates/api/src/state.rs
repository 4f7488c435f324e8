use std::sync::Arc;
use std::time::Duration;

use alerta_config::Settings;
use alerta_services::{
    AlertService, AlertStore, AuthService, CreationTrigger, Dispatcher, LifecycleService,
    PushGateway, RecipientDirectory,
    dispatch::{MessageOptions, ReceiptAuditor},
    store::{AlertRepository, UserRepository},
};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserRepository>,
    pub store: Arc<AlertStore>,
    pub alerts: Arc<AlertService>,
    pub lifecycle: Arc<LifecycleService>,
    pub dispatcher: Arc<Dispatcher>,
    pub gateway: Arc<dyn PushGateway>,
}

impl AppState {
    /// Wires the services over the given backends. Call [`start_triggers`]
    /// before serving so panic alerts fan out.
    ///
    /// [`start_triggers`]: AppState::start_triggers
    pub fn new(
        settings: Settings,
        users: Arc<dyn UserRepository>,
        alert_repo: Arc<dyn AlertRepository>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let store = Arc::new(AlertStore::new(alert_repo));
        let auditor = Arc::new(ReceiptAuditor::new(
            gateway.clone(),
            Duration::from_secs(settings.push.receipt_delay_secs),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            RecipientDirectory::new(users.clone(), gateway.clone()),
            gateway.clone(),
            auditor,
            MessageOptions::from(&settings.push),
        ));
        let alerts = Arc::new(AlertService::new(store.clone(), users.clone()));
        let lifecycle = Arc::new(LifecycleService::new(store.clone(), dispatcher.clone()));

        Self {
            settings,
            auth,
            users,
            store,
            alerts,
            lifecycle,
            dispatcher,
            gateway,
        }
    }

    pub fn start_triggers(&self) -> JoinHandle<()> {
        CreationTrigger::spawn(&self.store, self.dispatcher.clone())
    }
}
