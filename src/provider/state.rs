//! 连接状态发布
//!
//! Single writer per provider, many readers. Observers are called while the state lock is
//! held, so every observer sees transitions in the order they happened.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::ProviderKind;
use crate::core::domain::ConnectionState;

const CHANNEL_CAPACITY: usize = 64;

/// Synchronous state listener, registered once and called for every transition.
pub trait StateObserver: Send + Sync {
    fn on_state_changed(&self, source: ProviderKind, state: &ConnectionState);
}

struct PublisherInner {
    state: ConnectionState,
    /// Bumped on every transition; lets a timer detect that its attempt is stale.
    generation: u64,
    observers: Vec<Arc<dyn StateObserver>>,
}

pub struct StatePublisher {
    kind: ProviderKind,
    inner: Mutex<PublisherInner>,
    tx: broadcast::Sender<ConnectionState>,
}

impl StatePublisher {
    pub fn new(kind: ProviderKind) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            kind,
            inner: Mutex::new(PublisherInner {
                state: ConnectionState::Disconnected,
                generation: 0,
                observers: Vec::new(),
            }),
            tx,
        }
    }

    pub fn current(&self) -> ConnectionState {
        self.inner.lock().state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn StateObserver>) {
        self.inner.lock().observers.push(observer);
    }

    /// Hands the current state to `observer` under the state lock, so it cannot interleave
    /// with a concurrent transition.
    pub fn replay(&self, observer: &dyn StateObserver) {
        let inner = self.inner.lock();
        observer.on_state_changed(self.kind, &inner.state);
    }

    /// Publishes `next` and returns the new generation.
    pub fn transition(&self, next: ConnectionState) -> u64 {
        let mut inner = self.inner.lock();
        self.apply(&mut inner, next)
    }

    /// Publishes `next` only if the current state satisfies `guard`.
    pub fn transition_if(
        &self,
        guard: impl FnOnce(&ConnectionState) -> bool,
        next: ConnectionState,
    ) -> Option<u64> {
        let mut inner = self.inner.lock();
        if !guard(&inner.state) {
            return None;
        }
        Some(self.apply(&mut inner, next))
    }

    /// Publishes `next` only if nothing has transitioned since `generation`.
    pub fn transition_from(&self, generation: u64, next: ConnectionState) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        self.apply(&mut inner, next);
        true
    }

    fn apply(&self, inner: &mut PublisherInner, next: ConnectionState) -> u64 {
        debug!(
            provider = self.kind.name(),
            from = state_label(&inner.state),
            to = state_label(&next),
            "state transition"
        );
        inner.state = next;
        inner.generation += 1;
        for observer in &inner.observers {
            observer.on_state_changed(self.kind, &inner.state);
        }
        // no receivers is fine
        let _ = self.tx.send(inner.state.clone());
        inner.generation
    }
}

fn state_label(state: &ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::WaitingForApproval(_) => "waiting_for_approval",
        ConnectionState::Connected(_) => "connected",
        ConnectionState::Error(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ConnectionState>>);

    impl StateObserver for Recorder {
        fn on_state_changed(&self, _source: ProviderKind, state: &ConnectionState) {
            self.0.lock().push(state.clone());
        }
    }

    #[tokio::test]
    async fn test_observers_and_subscribers_see_transition_order() {
        let publisher = StatePublisher::new(ProviderKind::Pairing);
        let recorder = Arc::new(Recorder::default());
        publisher.add_observer(recorder.clone());
        let mut rx = publisher.subscribe();

        publisher.transition(ConnectionState::Connecting);
        publisher.transition(ConnectionState::WaitingForApproval("wc:abc".into()));
        publisher.transition(ConnectionState::Disconnected);

        let seen = recorder.0.lock().clone();
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::WaitingForApproval("wc:abc".into()),
                ConnectionState::Disconnected,
            ]
        );
        assert_eq!(rx.recv().await.unwrap(), ConnectionState::Connecting);
        assert!(matches!(rx.recv().await.unwrap(), ConnectionState::WaitingForApproval(_)));
        assert_eq!(rx.recv().await.unwrap(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let publisher = StatePublisher::new(ProviderKind::DeepLink);
        let attempt = publisher.transition(ConnectionState::WaitingForApproval("link".into()));
        publisher.transition(ConnectionState::Disconnected);

        assert!(!publisher.transition_from(attempt, ConnectionState::Error("timeout".into())));
        assert_eq!(publisher.current(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_guarded_transition() {
        let publisher = StatePublisher::new(ProviderKind::Pairing);
        assert!(publisher
            .transition_if(ConnectionState::is_pending, ConnectionState::Disconnected)
            .is_none());
        publisher.transition(ConnectionState::Connecting);
        assert!(publisher
            .transition_if(ConnectionState::is_pending, ConnectionState::Disconnected)
            .is_some());
    }
}
