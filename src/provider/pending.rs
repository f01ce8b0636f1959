//! 待处理交易槽位
//!
//! Wallet callbacks carry no request id, so a provider can only have one transaction in
//! flight. The slot hands out a ticket backed by a oneshot channel; whichever of callback,
//! timeout, disconnect or caller drop gets there first resolves it, every later attempt is a
//! logged no-op.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::domain::TransactionResult;
use crate::core::errors::WalletProviderError;

struct PendingEntry {
    id: u64,
    tx: oneshot::Sender<TransactionResult>,
    timer: Option<JoinHandle<()>>,
}

type SlotCell = Arc<Mutex<Option<PendingEntry>>>;

pub struct PendingSlot {
    label: &'static str,
    cell: SlotCell,
    next_id: AtomicU64,
}

/// Held by the suspended caller.
#[must_use = "a pending ticket resolves nothing unless awaited"]
pub struct PendingTicket {
    id: u64,
    label: &'static str,
    rx: oneshot::Receiver<TransactionResult>,
    cell: SlotCell,
}

impl PendingSlot {
    pub fn new(label: &'static str) -> Self {
        Self { label, cell: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(1) }
    }

    pub fn is_pending(&self) -> bool {
        self.cell.lock().is_some()
    }

    /// Claims the slot, or fails if another transaction is still waiting.
    pub fn begin(&self) -> Result<PendingTicket, WalletProviderError> {
        let mut cell = self.cell.lock();
        if cell.is_some() {
            warn!(provider = self.label, "rejecting overlapping transaction request");
            return Err(WalletProviderError::TransactionFailed(
                "another transaction is already pending".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        *cell = Some(PendingEntry { id, tx, timer: None });
        debug!(provider = self.label, request = id, "pending slot claimed");
        Ok(PendingTicket { id, label: self.label, rx, cell: self.cell.clone() })
    }

    /// Resolves request `id` with `Failed(Timeout)` once `after` elapses.
    pub fn arm_timeout(&self, id: u64, after: Duration) {
        let cell = self.cell.clone();
        let label = self.label;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if resolve_cell(&cell, Some(id), TransactionResult::Failed(WalletProviderError::Timeout), label) {
                warn!(provider = label, request = id, timeout_secs = after.as_secs(), "transaction timed out");
            }
        });
        let mut guard = self.cell.lock();
        match guard.as_mut() {
            Some(entry) if entry.id == id => entry.timer = Some(timer),
            _ => timer.abort(),
        }
    }

    /// Resolves whatever request is pending. Returns false if nothing was waiting.
    pub fn resolve(&self, result: TransactionResult) -> bool {
        resolve_cell(&self.cell, None, result, self.label)
    }

    /// Resolves request `id` only if it is still the pending one.
    pub fn resolve_id(&self, id: u64, result: TransactionResult) -> bool {
        resolve_cell(&self.cell, Some(id), result, self.label)
    }
}

fn resolve_cell(cell: &SlotCell, id: Option<u64>, result: TransactionResult, label: &'static str) -> bool {
    let entry = {
        let mut guard = cell.lock();
        match guard.as_ref() {
            Some(entry) if id.map_or(true, |id| id == entry.id) => guard.take(),
            _ => None,
        }
    };
    let Some(entry) = entry else {
        debug!(provider = label, ?result, "no matching pending transaction, result discarded");
        return false;
    };
    if let Some(timer) = entry.timer {
        timer.abort();
    }
    if entry.tx.send(result).is_err() {
        warn!(provider = label, request = entry.id, "caller went away before the result arrived");
    }
    true
}

impl PendingTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn wait(mut self) -> TransactionResult {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => TransactionResult::Failed(WalletProviderError::TransactionFailed(
                "pending request was abandoned".to_string(),
            )),
        }
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        let mut guard = self.cell.lock();
        if guard.as_ref().is_some_and(|entry| entry.id == self.id) {
            if let Some(PendingEntry { timer: Some(timer), .. }) = guard.take() {
                timer.abort();
            }
            debug!(provider = self.label, request = self.id, "pending slot released by caller");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_exactly_once() {
        let slot = PendingSlot::new("test");
        let ticket = slot.begin().unwrap();
        assert!(slot.is_pending());

        assert!(slot.resolve(TransactionResult::Success("0xaa".into())));
        assert!(!slot.resolve(TransactionResult::Rejected));
        assert_eq!(ticket.wait().await, TransactionResult::Success("0xaa".into()));
        assert!(!slot.is_pending());
    }

    #[tokio::test]
    async fn test_second_request_is_rejected() {
        let slot = PendingSlot::new("test");
        let _first = slot.begin().unwrap();
        assert!(matches!(slot.begin(), Err(WalletProviderError::TransactionFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_callback() {
        let slot = PendingSlot::new("test");
        let ticket = slot.begin().unwrap();
        slot.arm_timeout(ticket.id(), Duration::from_secs(300));

        let result = ticket.wait().await;
        assert_eq!(result, TransactionResult::Failed(WalletProviderError::Timeout));
        assert!(!slot.resolve(TransactionResult::Success("late".into())));
    }

    #[tokio::test]
    async fn test_stale_id_does_not_resolve_newer_request() {
        let slot = PendingSlot::new("test");
        let first = slot.begin().unwrap();
        let first_id = first.id();
        drop(first);
        assert!(!slot.is_pending());

        let second = slot.begin().unwrap();
        assert!(!slot.resolve_id(first_id, TransactionResult::Rejected));
        assert!(slot.resolve_id(second.id(), TransactionResult::Rejected));
        assert_eq!(second.wait().await, TransactionResult::Rejected);
    }
}
