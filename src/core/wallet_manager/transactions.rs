//! USDT transfer and approval through the active provider.

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::WalletManager;
use crate::core::domain::{ApproveAmount, ApproveRequest, TransactionRequest, TransactionResult};
use crate::core::errors::WalletProviderError;
use crate::network::Network;
use crate::provider::ProviderKind;

const TRANSFER_REJECTED: &str = "Transaction was cancelled by the user";
const APPROVE_REJECTED: &str = "Approval was cancelled by the user";
const CANCELLED_BY_CALLER: &str = "cancelled by caller";

#[derive(Debug, Clone, Copy)]
enum Operation {
    Transfer,
    Approve,
}

impl Operation {
    fn label(self) -> &'static str {
        match self {
            Operation::Transfer => "transfer",
            Operation::Approve => "approve",
        }
    }

    fn rejected_message(self) -> &'static str {
        match self {
            Operation::Transfer => TRANSFER_REJECTED,
            Operation::Approve => APPROVE_REJECTED,
        }
    }
}

impl WalletManager {
    /// Sends `amount` USDT to `to_address` on the current network.
    ///
    /// Suspends until the wallet answers or the request times out. Exactly one result is
    /// returned and broadcast per call; dropping the future broadcasts a cancellation instead.
    pub async fn send_usdt_transfer(&self, to_address: &str, amount: Decimal) -> TransactionResult {
        let Ok(_gate) = self.transaction_gate.try_lock() else {
            return self.refuse(Operation::Transfer);
        };
        let in_flight = match self.prepare(Operation::Transfer) {
            Ok(in_flight) => in_flight,
            Err(result) => return self.publish(result),
        };
        let request = TransactionRequest::new(to_address, amount, in_flight.network);
        let result = self.provider(in_flight.kind).send_transaction(request).await;
        in_flight.finish(result)
    }

    /// Grants `spender_address` an allowance on the USDT contract of the current network.
    pub async fn approve_usdt(&self, spender_address: &str, amount: ApproveAmount) -> TransactionResult {
        let Ok(_gate) = self.transaction_gate.try_lock() else {
            return self.refuse(Operation::Approve);
        };
        let in_flight = match self.prepare(Operation::Approve) {
            Ok(in_flight) => in_flight,
            Err(result) => return self.publish(result),
        };
        let request = ApproveRequest::new(spender_address, amount, in_flight.network);
        let result = self.provider(in_flight.kind).approve(request).await;
        in_flight.finish(result)
    }

    fn refuse(&self, operation: Operation) -> TransactionResult {
        warn!(operation = operation.label(), "transaction already pending, request refused");
        self.publish(TransactionResult::Failed(WalletProviderError::TransactionFailed(
            "another transaction is already pending".to_string(),
        )))
    }

    /// Picks the connected provider and marks the request in flight.
    fn prepare(&self, operation: Operation) -> Result<InFlight<'_>, TransactionResult> {
        let mut status = self.shared.status.write();
        status.last_transaction_hash = None;
        let Some(kind) = status.active_provider.filter(|_| status.is_connected()) else {
            status.error_message = Some(WalletProviderError::NotConnected.to_string());
            return Err(TransactionResult::Failed(WalletProviderError::NotConnected));
        };
        status.error_message = None;
        status.is_transaction_pending = true;
        info!(operation = operation.label(), provider = kind.name(), network = %status.current_network, "submitting to wallet");
        Ok(InFlight { manager: self, operation, kind, network: status.current_network, finished: false })
    }

    fn publish(&self, result: TransactionResult) -> TransactionResult {
        let _ = self.shared.result_tx.send(result.clone());
        result
    }
}

/// A request handed to a provider. Clears the pending flag and publishes exactly once, either
/// through [`InFlight::finish`] or on drop when the caller abandons the future.
struct InFlight<'a> {
    manager: &'a WalletManager,
    operation: Operation,
    kind: ProviderKind,
    network: Network,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self, result: TransactionResult) -> TransactionResult {
        self.finished = true;
        let operation = self.operation;
        {
            let mut status = self.manager.shared.status.write();
            status.is_transaction_pending = false;
            // a disconnect already reset the view; do not write into it
            let connected = status.active_provider.is_some();
            match &result {
                TransactionResult::Success(hash) => {
                    info!(operation = operation.label(), tx_hash = %hash, "transaction submitted");
                    if connected {
                        status.last_transaction_hash = Some(hash.clone());
                    }
                }
                TransactionResult::Rejected => {
                    info!(operation = operation.label(), "user rejected the request");
                    if connected {
                        status.error_message = Some(operation.rejected_message().to_string());
                    }
                }
                TransactionResult::Failed(e) => {
                    warn!(operation = operation.label(), error = %e, "transaction failed");
                    if connected {
                        status.error_message = Some(e.to_string());
                    }
                }
            }
        }
        self.manager.publish(result)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(operation = self.operation.label(), "caller dropped the request before the wallet answered");
        self.manager.shared.status.write().is_transaction_pending = false;
        self.manager.publish(TransactionResult::Failed(WalletProviderError::TransactionFailed(
            CANCELLED_BY_CALLER.to_string(),
        )));
    }
}
