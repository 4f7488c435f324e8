pub mod messages;
pub mod receipts;
pub mod trigger;

use std::sync::Arc;

use alerta_db::models::{PanicAlert, PanicStatus};
use tracing::{error, info, warn};

use crate::directory::RecipientDirectory;
use crate::push::{PushFailureKind, PushGateway, PushTicket, failure_kind};

pub use messages::MessageOptions;
pub use receipts::{AuditReport, DeliveryTicket, ReceiptAuditor};
pub use trigger::CreationTrigger;

/// Why a fan-out ended without sending anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    DirectoryUnavailable(String),
    NoRecipients,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    /// Messages handed to the gateway, including those in failed batches.
    pub attempted: usize,
    pub tickets: Vec<DeliveryTicket>,
    /// One entry per batch whose send call failed.
    pub batch_errors: Vec<String>,
    pub skipped: Option<SkipReason>,
}

impl FanOutReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

/// Result of the reporter notification that follows a status change. The
/// status itself is already persisted whatever this says.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    Sent(PushTicket),
    /// The new status is not one the reporter is told about.
    NotApplicable,
    /// Best-effort delivery did not happen.
    Degraded(String),
}

/// Turns store events into push messages.
pub struct Dispatcher {
    directory: RecipientDirectory,
    gateway: Arc<dyn PushGateway>,
    auditor: Arc<ReceiptAuditor>,
    options: MessageOptions,
}

impl Dispatcher {
    pub fn new(
        directory: RecipientDirectory,
        gateway: Arc<dyn PushGateway>,
        auditor: Arc<ReceiptAuditor>,
        options: MessageOptions,
    ) -> Self {
        Self {
            directory,
            gateway,
            auditor,
            options,
        }
    }

    /// Sends one message per responder of the alert's category, batch by
    /// batch. A failed batch is logged and the remaining ones still go out.
    pub async fn fan_out_panic_alert(&self, alert: &PanicAlert) -> FanOutReport {
        let Some(alert_id) = alert.id else {
            error!("Panic alert without id, not notifying");
            return FanOutReport::skipped(SkipReason::MissingId);
        };
        let category = alert.category;
        info!(%alert_id, %category, reporter = %alert.user_name_panic, "Fanning out panic alert");

        let recipients = match self.directory.resolve_recipients(category).await {
            Ok(recipients) => recipients,
            Err(e) => {
                error!(%alert_id, %category, error = %e, "Could not resolve recipients");
                return FanOutReport::skipped(SkipReason::DirectoryUnavailable(e.to_string()));
            }
        };
        if recipients.is_empty() {
            info!(%alert_id, %category, "No reachable responders for category");
            return FanOutReport::skipped(SkipReason::NoRecipients);
        }

        let alert_key = alert_id.to_hex();
        let mut report = FanOutReport::default();
        for (index, batch) in recipients
            .chunks(self.gateway.send_batch_limit().max(1))
            .enumerate()
        {
            let messages: Vec<_> = batch
                .iter()
                .map(|r| self.options.panic_alert(alert, &alert_key, &r.token))
                .collect();
            report.attempted += messages.len();

            match self.gateway.send(&messages).await {
                Ok(tickets) => {
                    if tickets.len() != batch.len() {
                        warn!(%alert_id, batch = index, sent = batch.len(), tickets = tickets.len(), "Ticket count mismatch");
                    }
                    report
                        .tickets
                        .extend(batch.iter().zip(tickets).map(|(r, ticket)| DeliveryTicket {
                            token: r.token.clone(),
                            user_id: r.user_id,
                            ticket,
                        }));
                }
                Err(e) => {
                    error!(%alert_id, batch = index, size = batch.len(), error = %e, "Push batch failed");
                    report.batch_errors.push(e.to_string());
                }
            }
        }

        info!(
            %alert_id,
            attempted = report.attempted,
            tickets = report.tickets.len(),
            failed_batches = report.batch_errors.len(),
            "Panic alert fan-out complete"
        );
        report
    }

    /// Fan-out followed by a background receipt audit.
    pub async fn handle_created(&self, alert: &PanicAlert) -> FanOutReport {
        let report = self.fan_out_panic_alert(alert).await;
        if !report.tickets.is_empty() {
            self.auditor.spawn(report.tickets.clone());
        }
        report
    }

    /// Tells the reporter that their alert moved to `alert.status`.
    pub async fn notify_status_change(&self, alert: &PanicAlert) -> NotifyOutcome {
        let Some(alert_id) = alert.id else {
            return NotifyOutcome::Degraded("alert has no id".to_string());
        };
        if !matches!(alert.status, PanicStatus::EnCamino | PanicStatus::Finalizado) {
            info!(%alert_id, status = %alert.status, "Status not configured for notification");
            return NotifyOutcome::NotApplicable;
        }
        let responder = alert.responder_username.as_deref().unwrap_or_default();

        let target = match self.directory.resolve_user(alert.user_id).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!(%alert_id, user_id = %alert.user_id, "Reporter not found or without valid token");
                return NotifyOutcome::Degraded("reporter has no valid push token".to_string());
            }
            Err(e) => {
                error!(%alert_id, user_id = %alert.user_id, error = %e, "Could not load reporter");
                return NotifyOutcome::Degraded(e.to_string());
            }
        };

        let Some(message) =
            self.options
                .status_update(&alert_id.to_hex(), alert.status, responder, &target.token)
        else {
            return NotifyOutcome::NotApplicable;
        };

        match self.gateway.send(std::slice::from_ref(&message)).await {
            Ok(mut tickets) if !tickets.is_empty() => match tickets.swap_remove(0) {
                PushTicket::Error { message, details } => {
                    if failure_kind(details.as_ref()) == PushFailureKind::PermanentToken {
                        warn!(%alert_id, user_id = %alert.user_id, token = %target.token, "Device not registered, token should be removed");
                    }
                    error!(%alert_id, user_id = %alert.user_id, error = %message, "Status notification refused");
                    NotifyOutcome::Degraded(message)
                }
                ticket => {
                    info!(%alert_id, user_id = %alert.user_id, ?ticket, "Status notification sent");
                    NotifyOutcome::Sent(ticket)
                }
            },
            Ok(_) => NotifyOutcome::Degraded("provider returned no ticket".to_string()),
            Err(e) => {
                error!(%alert_id, user_id = %alert.user_id, error = %e, "Status notification failed");
                NotifyOutcome::Degraded(e.to_string())
            }
        }
    }
}
