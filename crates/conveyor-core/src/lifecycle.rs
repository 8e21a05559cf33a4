//! Run-state machine shared by every graph participant
//!
//! Each node and the adaptor itself own a [`Lifecycle`]: a state holder with
//! listener notification and an awaitable wait-for-state. Transitions notify
//! listeners exactly once; no-op transitions notify nobody. Notification
//! iterates a snapshot copy of the listener list taken under a lock and
//! invoked outside it, so listeners may be added or removed concurrently
//! with a notification in flight.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Run state of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Constructed but not yet started
    Created,
    /// Actively participating in a run
    Running,
    /// Stopped; terminal for this run
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Observer of lifecycle transitions
pub trait StateListener: Send + Sync {
    /// Called once per actual transition, outside the lifecycle's locks
    fn on_transition(&self, from: RunState, to: RunState);
}

/// Token returned by [`Lifecycle::add_listener`], used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// State holder with listener notification and awaitable state waits
pub struct Lifecycle {
    state: Mutex<RunState>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn StateListener>)>>,
    tx: watch::Sender<RunState>,
    next_listener: AtomicU64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a lifecycle in the `Created` state
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RunState::Created);
        Self {
            state: Mutex::new(RunState::Created),
            listeners: Mutex::new(Vec::new()),
            tx,
            next_listener: AtomicU64::new(0),
        }
    }

    /// Current state
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Check the current state
    pub fn is_state(&self, state: RunState) -> bool {
        self.state() == state
    }

    /// Move to `Running`. Idempotent when already running; a logged no-op
    /// once stopped.
    pub fn start(&self) -> bool {
        self.transition(RunState::Running)
    }

    /// Move to `Stopped`. A no-op when already stopped; listeners are not
    /// notified twice.
    pub fn stop(&self) -> bool {
        self.transition(RunState::Stopped)
    }

    /// Await until the state equals `target`.
    ///
    /// Re-checks after every change notification, so spurious wakeups are
    /// harmless. Returns immediately if the state already matches.
    pub async fn wait_for_state(&self, target: RunState) {
        let mut rx = self.tx.subscribe();
        while *rx.borrow_and_update() != target {
            // the sender lives inside self, so changed() only fails once
            // the lifecycle itself is gone
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Register a transition listener
    pub fn add_listener(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Remove a previously registered listener
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn transition(&self, to: RunState) -> bool {
        let (from, snapshot) = {
            let mut state = self.state.lock();
            let from = *state;
            if from == to {
                return false;
            }
            if from == RunState::Stopped {
                warn!(from = %from, to = %to, "ignoring transition out of stopped state");
                return false;
            }
            *state = to;
            self.tx.send_replace(to);
            (from, self.listeners.lock().clone())
        };
        for (_, listener) in snapshot {
            listener.on_transition(from, to);
        }
        true
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingListener {
        transitions: Mutex<Vec<(RunState, RunState)>>,
        calls: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                transitions: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl StateListener for CountingListener {
        fn on_transition(&self, from: RunState, to: RunState) {
            self.transitions.lock().push((from, to));
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_start_notifies_exactly_once() {
        let lifecycle = Lifecycle::new();
        let listener = CountingListener::new();
        lifecycle.add_listener(listener.clone());

        assert!(lifecycle.start());
        assert!(lifecycle.is_state(RunState::Running));
        // idempotent restart notifies nobody
        assert!(!lifecycle.start());
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            listener.transitions.lock()[0],
            (RunState::Created, RunState::Running)
        );
    }

    #[test]
    fn test_stop_on_stopped_is_noop() {
        let lifecycle = Lifecycle::new();
        let listener = CountingListener::new();
        lifecycle.add_listener(listener.clone());

        assert!(lifecycle.stop());
        assert!(!lifecycle.stop());
        assert!(lifecycle.is_state(RunState::Stopped));
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let lifecycle = Lifecycle::new();
        lifecycle.stop();
        assert!(!lifecycle.start());
        assert!(lifecycle.is_state(RunState::Stopped));
    }

    #[test]
    fn test_remove_listener() {
        let lifecycle = Lifecycle::new();
        let listener = CountingListener::new();
        let id = lifecycle.add_listener(listener.clone());

        assert!(lifecycle.remove_listener(id));
        assert!(!lifecycle.remove_listener(id));

        lifecycle.start();
        assert_eq!(listener.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wait_for_state_returns_immediately_on_match() {
        let lifecycle = Lifecycle::new();
        lifecycle.start();
        // already running, must not hang
        tokio::time::timeout(
            Duration::from_millis(100),
            lifecycle.wait_for_state(RunState::Running),
        )
        .await
        .expect("wait_for_state should return immediately");
    }

    #[tokio::test]
    async fn test_wait_for_state_observes_transition() {
        let lifecycle = Arc::new(Lifecycle::new());
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.wait_for_state(RunState::Stopped).await })
        };

        // let the waiter subscribe before transitioning
        tokio::task::yield_now().await;
        lifecycle.start();
        lifecycle.stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should observe the stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_skips_intermediate_states() {
        // a waiter for Stopped must re-check after the Running notification
        let lifecycle = Arc::new(Lifecycle::new());
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.wait_for_state(RunState::Stopped).await })
        };
        tokio::task::yield_now().await;

        lifecycle.start();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        lifecycle.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish after stop")
            .unwrap();
    }
}
