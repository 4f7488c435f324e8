use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::push::{failure_kind, PushFailureKind, PushGateway, PushReceipt, PushTicket};

/// A send acknowledgement tied back to the device it was addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryTicket {
    pub token: String,
    pub user_id: ObjectId,
    pub ticket: PushTicket,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Receipt ids looked up.
    pub checked: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Ids the provider had no receipt for yet.
    pub pending: usize,
    /// Ids whose lookup batch failed.
    pub lookup_errors: usize,
    /// Messages refused at send time.
    pub ticket_errors: usize,
    /// Tokens reported as permanently unregistered. Only logged, never
    /// removed from the user record.
    pub flagged_tokens: Vec<String>,
}

impl AuditReport {
    fn flag(&mut self, token: &str) {
        if !self.flagged_tokens.iter().any(|t| t == token) {
            self.flagged_tokens.push(token.to_string());
        }
    }
}

/// Polls delivery receipts for a fan-out and reports per-ticket outcomes.
/// Observational only: nothing is retried or written back.
pub struct ReceiptAuditor {
    gateway: Arc<dyn PushGateway>,
    delay: Duration,
}

impl ReceiptAuditor {
    pub fn new(gateway: Arc<dyn PushGateway>, delay: Duration) -> Self {
        Self { gateway, delay }
    }

    pub async fn audit(&self, tickets: &[DeliveryTicket]) -> AuditReport {
        let mut report = AuditReport::default();
        let mut by_receipt: HashMap<String, &DeliveryTicket> = HashMap::new();
        let mut ids = Vec::new();

        for delivery in tickets {
            match &delivery.ticket {
                PushTicket::Ok { id } => {
                    if by_receipt.insert(id.clone(), delivery).is_none() {
                        ids.push(id.clone());
                    }
                }
                PushTicket::Error { message, details } => {
                    report.ticket_errors += 1;
                    error!(user_id = %delivery.user_id, ?details, "Push refused at send: {message}");
                    if failure_kind(details.as_ref()) == PushFailureKind::PermanentToken {
                        warn!(user_id = %delivery.user_id, token = %delivery.token, "Device not registered, token should be removed");
                        report.flag(&delivery.token);
                    }
                }
            }
        }

        for chunk in ids.chunks(self.gateway.receipt_batch_limit().max(1)) {
            report.checked += chunk.len();
            let receipts = match self.gateway.get_receipts(chunk).await {
                Ok(receipts) => receipts,
                Err(e) => {
                    error!(error = %e, ids = chunk.len(), "Failed to fetch push receipts");
                    report.lookup_errors += chunk.len();
                    continue;
                }
            };

            for id in chunk {
                match receipts.get(id) {
                    None => report.pending += 1,
                    Some(PushReceipt::Ok) => report.delivered += 1,
                    Some(PushReceipt::Error { message, details }) => {
                        report.failed += 1;
                        error!(ticket_id = %id, ?details, "Push delivery failed: {message}");
                        if failure_kind(details.as_ref()) == PushFailureKind::PermanentToken {
                            if let Some(delivery) = by_receipt.get(id) {
                                warn!(ticket_id = %id, user_id = %delivery.user_id, "Device not registered, token should be removed");
                                report.flag(&delivery.token);
                            }
                        }
                    }
                }
            }
        }

        info!(
            checked = report.checked,
            delivered = report.delivered,
            failed = report.failed,
            pending = report.pending,
            "Receipt audit complete"
        );
        report
    }

    /// Runs the audit in the background after the configured delay.
    pub fn spawn(self: &Arc<Self>, tickets: Vec<DeliveryTicket>) -> JoinHandle<AuditReport> {
        let auditor = Arc::clone(self);
        tokio::spawn(async move {
            if !auditor.delay.is_zero() {
                tokio::time::sleep(auditor.delay).await;
            }
            auditor.audit(&tickets).await
        })
    }
}
