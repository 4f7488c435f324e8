use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alerta_config::AlertSettings;
use alerta_db::models::{
    Category, GeoPoint, Notification, NotificationResponse, PanicAlert, PanicStatus,
};
use bson::oid::ObjectId;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::alerts::{scope_for, AlertError, AlertService, CreatePanicAlert};
use crate::lifecycle::{LifecycleService, PanicTransition, TransitionError};
use crate::session::SessionContext;
use crate::store::LiveQuery;

#[derive(Debug, Error)]
pub enum ProjectorError {
    #[error("{category} is cooling down for another {remaining_secs}s")]
    CoolingDown {
        category: Category,
        remaining_secs: u64,
    },
    #[error("a status change is already in progress")]
    Busy,
    #[error(transparent)]
    Alert(#[from] AlertError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardLimits {
    pub notifications: usize,
    pub panic_alerts: usize,
}

impl From<&AlertSettings> for DashboardLimits {
    fn from(settings: &AlertSettings) -> Self {
        Self {
            notifications: settings.dashboard_notification_limit,
            panic_alerts: settings.dashboard_panic_limit,
        }
    }
}

/// Per-category panic button state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    pub category: Category,
    pub enabled: bool,
    pub remaining_secs: u64,
}

/// Local throttle on the panic buttons. After a successful raise the
/// category stays disabled for `window`. Not persisted and not enforced
/// anywhere else.
#[derive(Debug, Clone)]
pub struct PanicCooldown {
    window: Duration,
    started: HashMap<Category, Instant>,
}

impl PanicCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            started: HashMap::new(),
        }
    }

    pub fn start(&mut self, category: Category, now: Instant) {
        self.started.insert(category, now);
    }

    pub fn remaining(&self, category: Category, now: Instant) -> Option<Duration> {
        let started = self.started.get(&category)?;
        let elapsed = now.saturating_duration_since(*started);
        self.window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub fn is_enabled(&self, category: Category, now: Instant) -> bool {
        self.remaining(category, now).is_none()
    }

    pub fn button_states(&self, now: Instant) -> Vec<ButtonState> {
        Category::ALL
            .into_iter()
            .map(|category| {
                let remaining = self.remaining(category, now);
                ButtonState {
                    category,
                    enabled: remaining.is_none(),
                    remaining_secs: remaining.map_or(0, |d| d.as_secs_f64().ceil() as u64),
                }
            })
            .collect()
    }
}

/// Transitions currently awaiting the state machine. While one is in
/// flight the session may not submit another.
#[derive(Debug, Default)]
pub struct PendingTransitions {
    in_flight: HashSet<ObjectId>,
}

impl PendingTransitions {
    pub fn begin(&mut self, alert_id: ObjectId) -> bool {
        self.in_flight.is_empty() && self.in_flight.insert(alert_id)
    }

    pub fn finish(&mut self, alert_id: ObjectId) {
        self.in_flight.remove(&alert_id);
    }

    pub fn is_pending(&self, alert_id: ObjectId) -> bool {
        self.in_flight.contains(&alert_id)
    }

    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }
}

/// Locally applied results of successful transitions. Advisory: the next
/// snapshot from the live subscription replaces it.
#[derive(Debug, Default)]
pub struct StatusOverlay {
    updated: HashMap<ObjectId, PanicAlert>,
}

impl StatusOverlay {
    pub fn record(&mut self, alert: PanicAlert) {
        if let Some(id) = alert.id {
            self.updated.insert(id, alert);
        }
    }

    pub fn apply(&self, items: &[PanicAlert]) -> Vec<PanicAlert> {
        items
            .iter()
            .map(|item| {
                item.id
                    .and_then(|id| self.updated.get(&id))
                    .filter(|local| local.status > item.status)
                    .unwrap_or(item)
                    .clone()
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.updated.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }
}

/// A status change the user has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    pub alert_id: ObjectId,
    pub status: PanicStatus,
}

/// Proof that the user confirmed a [`TransitionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedTransition(TransitionRequest);

impl TransitionRequest {
    pub fn new(alert_id: ObjectId, status: PanicStatus) -> Self {
        Self { alert_id, status }
    }

    pub fn confirm(self) -> ConfirmedTransition {
        ConfirmedTransition(self)
    }
}

impl ConfirmedTransition {
    pub fn alert_id(&self) -> ObjectId {
        self.0.alert_id
    }

    pub fn status(&self) -> PanicStatus {
        self.0.status
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardUpdate {
    Notifications(Vec<Notification>),
    PanicAlerts(Vec<PanicAlert>),
}

/// The two capped feeds of a dashboard screen.
pub struct Dashboard {
    pub notifications: LiveQuery<Notification>,
    pub panic_alerts: LiveQuery<PanicAlert>,
}

impl Dashboard {
    /// Next change from either feed, `None` once both have ended.
    pub async fn next(&mut self) -> Option<DashboardUpdate> {
        tokio::select! {
            Some(items) = self.notifications.next() => Some(DashboardUpdate::Notifications(items)),
            Some(items) = self.panic_alerts.next() => Some(DashboardUpdate::PanicAlerts(items)),
            else => None,
        }
    }
}

/// What one signed-in user sees: role-scoped live feeds, the panic
/// buttons and their cooldowns, and in-flight status changes.
pub struct LiveViewProjector {
    alerts: Arc<AlertService>,
    lifecycle: Arc<LifecycleService>,
    session: SessionContext,
    limits: DashboardLimits,
    cooldown: PanicCooldown,
    pending: PendingTransitions,
    overlay: StatusOverlay,
    last_panic_view: Vec<PanicAlert>,
}

impl LiveViewProjector {
    pub fn new(
        alerts: Arc<AlertService>,
        lifecycle: Arc<LifecycleService>,
        session: SessionContext,
        settings: &AlertSettings,
    ) -> Self {
        Self {
            alerts,
            lifecycle,
            session,
            limits: DashboardLimits::from(settings),
            cooldown: PanicCooldown::new(Duration::from_secs(settings.panic_cooldown_secs)),
            pending: PendingTransitions::default(),
            overlay: StatusOverlay::default(),
            last_panic_view: Vec::new(),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleService> {
        &self.lifecycle
    }

    pub async fn dashboard(&self) -> Result<Dashboard, AlertError> {
        Ok(Dashboard {
            notifications: self
                .notifications_feed(None, Some(self.limits.notifications))
                .await?,
            panic_alerts: self
                .panic_feed(None, Some(self.limits.panic_alerts))
                .await?,
        })
    }

    /// Role-scoped notification feed; `limit: None` is the "view all" list.
    pub async fn notifications_feed(
        &self,
        category: Option<Category>,
        limit: Option<usize>,
    ) -> Result<LiveQuery<Notification>, AlertError> {
        let filter = scope_for(&self.session, category, limit)?;
        Ok(self.alerts.store().subscribe_notifications(filter).await?)
    }

    pub async fn panic_feed(
        &self,
        category: Option<Category>,
        limit: Option<usize>,
    ) -> Result<LiveQuery<PanicAlert>, AlertError> {
        let filter = scope_for(&self.session, category, limit)?;
        Ok(self.alerts.store().subscribe_panic_alerts(filter).await?)
    }

    pub async fn response_thread(
        &self,
        notification_id: ObjectId,
    ) -> Result<LiveQuery<NotificationResponse>, AlertError> {
        self.alerts
            .check_thread_access(&self.session, notification_id)
            .await?;
        Ok(self
            .alerts
            .store()
            .subscribe_responses(notification_id)
            .await?)
    }

    pub fn button_states(&self, now: Instant) -> Vec<ButtonState> {
        self.cooldown.button_states(now)
    }

    /// One-tap panic. The category's button is disabled only once the
    /// alert has been stored.
    pub async fn raise_panic(
        &mut self,
        category: Category,
        location: Option<GeoPoint>,
        address: Option<String>,
        now: Instant,
    ) -> Result<PanicAlert, ProjectorError> {
        if let Some(remaining) = self.cooldown.remaining(category, now) {
            return Err(ProjectorError::CoolingDown {
                category,
                remaining_secs: remaining.as_secs_f64().ceil() as u64,
            });
        }
        let alert = self
            .alerts
            .create_panic_alert(
                &self.session,
                CreatePanicAlert {
                    category: category.as_str().to_string(),
                    location,
                    address,
                },
            )
            .await?;
        self.cooldown.start(category, now);
        Ok(alert)
    }

    /// Marks a confirmed transition as in flight. Fails with `Busy` while
    /// another one is pending.
    pub fn begin_transition(&mut self, request: ConfirmedTransition) -> Result<(), ProjectorError> {
        if !self.pending.begin(request.alert_id()) {
            return Err(ProjectorError::Busy);
        }
        Ok(())
    }

    /// Clears the in-flight mark. On success the new status is overlaid on
    /// the last panic snapshot and the overlaid view is returned.
    pub fn finish_transition(
        &mut self,
        alert_id: ObjectId,
        result: &Result<PanicTransition, TransitionError>,
    ) -> Option<Vec<PanicAlert>> {
        self.pending.finish(alert_id);
        let transition = result.as_ref().ok()?;
        self.overlay.record(transition.alert.clone());
        Some(self.overlay.apply(&self.last_panic_view))
    }

    pub async fn submit_transition(
        &mut self,
        request: ConfirmedTransition,
        responder_username: &str,
    ) -> Result<PanicTransition, ProjectorError> {
        self.begin_transition(request)?;
        let result = self
            .lifecycle
            .apply_panic_transition(
                request.alert_id(),
                request.status(),
                &self.session,
                responder_username,
            )
            .await;
        self.finish_transition(request.alert_id(), &result);
        Ok(result?)
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_busy()
    }

    /// Records an authoritative panic snapshot, dropping any local overlay.
    pub fn observe_panic_snapshot(&mut self, items: &[PanicAlert]) {
        if !self.overlay.is_empty() {
            debug!(user_id = %self.session.user_id, "Live snapshot replaces local status overlay");
        }
        self.overlay.clear();
        self.last_panic_view = items.to_vec();
    }
}
