use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{PushError, PushErrorDetails, PushGateway, PushMessage, PushReceipt, PushTicket};

#[derive(Default)]
struct Recorded {
    messages: Vec<PushMessage>,
    batches: Vec<usize>,
    send_calls: usize,
    failing_batches: HashSet<usize>,
    rejected_tokens: HashMap<String, String>,
    receipts: HashMap<String, PushReceipt>,
    receipt_queries: Vec<Vec<String>>,
    next_ticket: usize,
}

/// In-process gateway that records every message instead of delivering it.
/// Used by the in-memory deployment and by tests.
pub struct RecordingGateway {
    state: Mutex<Recorded>,
    notify: Notify,
    send_batch_size: usize,
    receipt_batch_size: usize,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::with_batch_limits(100, 300)
    }

    pub fn with_batch_limits(send_batch_size: usize, receipt_batch_size: usize) -> Self {
        Self {
            state: Mutex::new(Recorded::default()),
            notify: Notify::new(),
            send_batch_size: send_batch_size.max(1),
            receipt_batch_size: receipt_batch_size.max(1),
        }
    }

    /// Makes the `index`-th send call (0-based) fail at transport level.
    pub fn fail_batch(&self, index: usize) {
        self.state.lock().failing_batches.insert(index);
    }

    /// Answers messages to `token` with an error ticket carrying `error`.
    pub fn reject_token(&self, token: &str, error: &str) {
        self.state
            .lock()
            .rejected_tokens
            .insert(token.to_string(), error.to_string());
    }

    pub fn set_receipt(&self, ticket_id: &str, receipt: PushReceipt) {
        self.state
            .lock()
            .receipts
            .insert(ticket_id.to_string(), receipt);
    }

    /// Messages accepted by successful send calls, in send order.
    pub fn messages(&self) -> Vec<PushMessage> {
        self.state.lock().messages.clone()
    }

    /// Size of every send call, including failed ones.
    pub fn batches(&self) -> Vec<usize> {
        self.state.lock().batches.clone()
    }

    pub fn receipt_queries(&self) -> Vec<Vec<String>> {
        self.state.lock().receipt_queries.clone()
    }

    /// Waits until at least `count` messages were accepted. Returns `false`
    /// on timeout.
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state.lock().messages.len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }

    /// Waits until at least `count` receipt lookups were made.
    pub async fn wait_for_receipt_queries(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state.lock().receipt_queries.len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    fn send_batch_limit(&self) -> usize {
        self.send_batch_size
    }

    fn receipt_batch_limit(&self) -> usize {
        self.receipt_batch_size
    }

    async fn send(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, PushError> {
        let result = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let call = state.send_calls;
            state.send_calls += 1;
            state.batches.push(messages.len());
            if state.failing_batches.contains(&call) {
                Err(PushError::Status {
                    status: 503,
                    body: format!("batch {call} unavailable"),
                })
            } else {
                let mut tickets = Vec::with_capacity(messages.len());
                for message in messages {
                    match state.rejected_tokens.get(&message.to) {
                        Some(error) => tickets.push(PushTicket::Error {
                            message: format!("{} is not a registered push notification recipient", message.to),
                            details: Some(PushErrorDetails {
                                error: Some(error.clone()),
                                expo_push_token: Some(message.to.clone()),
                            }),
                        }),
                        None => {
                            state.next_ticket += 1;
                            tickets.push(PushTicket::Ok {
                                id: format!("ticket-{}", state.next_ticket),
                            });
                        }
                    }
                }
                state.messages.extend_from_slice(messages);
                Ok(tickets)
            }
        };
        self.notify.notify_waiters();
        result
    }

    async fn get_receipts(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, PushReceipt>, PushError> {
        let receipts = {
            let mut state = self.state.lock();
            state.receipt_queries.push(ids.to_vec());
            ids.iter()
                .filter_map(|id| state.receipts.get(id).map(|r| (id.clone(), r.clone())))
                .collect()
        };
        self.notify.notify_waiters();
        Ok(receipts)
    }
}
