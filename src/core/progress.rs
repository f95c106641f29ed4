use crate::core::events::WorkflowEvent;
use crate::core::model::RequestId;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// `round(sent * 100 / total)`, halves rounding up. `None` when the total is unknown.
pub fn upload_percent(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let sent = sent.min(total) as u128;
    let total = total as u128;
    Some(((sent * 200 + total) / (total * 2)) as u8)
}

/// Publishes upload progress for one request into the workflow's shared percentage.
///
/// The published value never decreases while a request is in flight; the owning
/// workflow resets it to 0 at the start and end of each request.
#[derive(Clone)]
pub struct ProgressReporter {
    request_id: RequestId,
    current: Arc<AtomicU8>,
    event_tx: broadcast::Sender<WorkflowEvent>,
}

impl ProgressReporter {
    pub fn new(request_id: RequestId, current: Arc<AtomicU8>, event_tx: broadcast::Sender<WorkflowEvent>) -> Self {
        Self { request_id, current, event_tx }
    }

    pub fn report(&self, sent: u64, total: Option<u64>) {
        let Some(total) = total else { return };
        let Some(percent) = upload_percent(sent, total) else { return };

        let prev = self.current.fetch_max(percent, Ordering::SeqCst);
        if percent > prev {
            let _ = self.event_tx.send(WorkflowEvent::Progress {
                request_id: self.request_id,
                percent,
                sent: sent.min(total),
                total,
            });
        }
    }

    pub fn current(&self) -> u8 {
        self.current.load(Ordering::SeqCst)
    }
}
