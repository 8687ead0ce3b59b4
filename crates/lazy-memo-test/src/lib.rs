//! Helpers for testing memoizers.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - Computations run as spawned tasks. After resolving one, call [`settle`] so the task gets a
//!    chance to publish its outcome before the next assertion.

use std::fmt::Display;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `lazy_memo` crate and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("lazy_memo=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Yields to the runtime often enough for woken computation tasks to finish.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Records the notifications passed to completion callbacks.
#[derive(Clone, Debug, Default)]
pub struct CallbackLog {
    entries: Arc<Mutex<Vec<(&'static str, Result<(), String>)>>>,
}

impl CallbackLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a callback that appends its notification to the log under `label`.
    pub fn callback<E: Display>(
        &self,
        label: &'static str,
    ) -> impl FnOnce(Result<(), E>) + Send + use<E> {
        let entries = Arc::clone(&self.entries);
        move |result| {
            let result = result.map_err(|err| err.to_string());
            entries.lock().unwrap().push((label, result));
        }
    }

    /// Returns all notifications recorded so far, in order.
    pub fn entries(&self) -> Vec<(&'static str, Result<(), String>)> {
        self.entries.lock().unwrap().clone()
    }
}

/// Computations that complete only when the test says so.
///
/// Every call to [`computation`](Self::computation) registers a pending computation. The test
/// resolves them in order with [`resolve`](Self::resolve).
pub struct Deferred<T> {
    pending: Arc<Mutex<Vec<oneshot::Sender<Result<T, String>>>>>,
}

impl<T: Send + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T: Send + 'static> Deferred<T> {
    /// Creates a new set of deferred computations.
    pub fn new() -> Self {
        Self {
            pending: Default::default(),
        }
    }

    /// Registers a computation and returns a future waiting for its outcome.
    pub fn computation(&self) -> impl Future<Output = Result<T, String>> + Send + use<T> {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().unwrap().push(sender);
        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err("computation dropped".to_owned()))
        }
    }

    /// Returns the number of computations registered so far.
    pub fn started(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Completes the `index`-th registered computation with `outcome`.
    ///
    /// # Panics
    ///
    /// Panics if there is no such computation, or it was already resolved.
    pub fn resolve(&self, index: usize, outcome: Result<T, String>) {
        let sender = {
            let mut pending = self.pending.lock().unwrap();
            let (sender, _) = oneshot::channel();
            std::mem::replace(&mut pending[index], sender)
        };
        assert!(
            sender.send(outcome).is_ok(),
            "computation {index} is no longer awaited"
        );
    }
}
