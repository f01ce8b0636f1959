//! TronLink 超时与迟到回调
//! Paused clock: a transfer nobody answers fails after the configured window, and the
//! callback that arrives afterwards is discarded.

mod util;

use rust_decimal::Decimal;
use std::time::Duration;
use usdt_wallet_link::core::domain::ConnectionState;
use usdt_wallet_link::{Network, TransactionResult, WalletProviderError};
use util::{harness, TRON_MERCHANT};

async fn connected_tron(h: &util::Harness) {
    h.manager.connect_wallet(Some(Network::Tron)).await.unwrap();
    let callback = format!("epusdtpay://tronlink/connect?result=success&address={TRON_MERCHANT}");
    assert!(h.manager.handle_deep_link_callback(&callback).await);
    assert!(h.manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn unanswered_transfer_times_out_and_late_callback_is_dropped() {
    let h = harness();
    connected_tron(&h).await;

    let manager = h.manager.clone();
    let task = tokio::spawn(async move { manager.send_usdt_transfer(TRON_MERCHANT, Decimal::ONE).await });
    while !h.manager.deep_link_provider().has_pending_request() {
        tokio::task::yield_now().await;
    }

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(task.await.unwrap(), TransactionResult::Failed(WalletProviderError::Timeout));
    assert_eq!(
        h.manager.error_message().as_deref(),
        Some("Operation timed out, please retry")
    );

    // consumed by the provider, but nothing was waiting for it
    assert!(h.manager.handle_deep_link_callback("epusdtpay://tronlink/transfer?result=success&txHash=late").await);
    assert_eq!(h.manager.last_transaction_hash(), None);
    assert!(h.manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn unanswered_authorization_times_out() {
    let h = harness();
    h.manager.connect_wallet(Some(Network::Tron)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(121)).await;

    assert!(matches!(h.manager.connection_state(), ConnectionState::Error(_)));
    assert_eq!(h.manager.current_session(), None);

    // the callback arrives after the window and must not resurrect the attempt
    let callback = format!("epusdtpay://tronlink/connect?result=success&address={TRON_MERCHANT}");
    h.manager.handle_deep_link_callback(&callback).await;
    assert!(!h.manager.is_connected());
}

#[tokio::test]
async fn user_cancel_in_tronlink() {
    let h = harness();
    connected_tron(&h).await;

    let manager = h.manager.clone();
    let task = tokio::spawn(async move { manager.send_usdt_transfer(TRON_MERCHANT, Decimal::ONE).await });
    while !h.manager.deep_link_provider().has_pending_request() {
        tokio::task::yield_now().await;
    }
    assert!(h.manager.handle_deep_link_callback("epusdtpay://tronlink/transfer?result=cancel").await);

    assert_eq!(task.await.unwrap(), TransactionResult::Rejected);
    assert_eq!(h.manager.error_message().as_deref(), Some("Transaction was cancelled by the user"));
}

#[tokio::test]
async fn transfer_to_evm_address_on_tron_is_invalid() {
    let h = harness();
    connected_tron(&h).await;
    let result = h.manager.send_usdt_transfer(util::ALICE, Decimal::ONE).await;
    assert_eq!(result, TransactionResult::Failed(WalletProviderError::InvalidAddress));
    assert!(!h.manager.deep_link_provider().has_pending_request());
}
