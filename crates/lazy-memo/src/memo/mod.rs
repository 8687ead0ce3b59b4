use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tracing::Instrument;

use crate::config::LazyMemoConfig;
use crate::error::{ComputationError, MemoError};
use crate::memoize_one::{Equality, MemoizeOne, default_equality};

mod builder;

pub use builder::LazyMemoBuilder;


/// The notification sent once the computation started by a call settles.
///
/// Receives `Ok(())` when the value became available, or the reason it did not.
pub type Callback<E> = Box<dyn FnOnce(Result<(), ComputationError<E>>) + Send + 'static>;

type WrappedFn<A, T, E> = Box<dyn FnMut(A) -> BoxFuture<'static, Result<T, E>> + Send>;

/// Identifies one invocation of the wrapped function.
///
/// Ids are handed out in increasing order, so an id is never reused for a different computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ComputationId(u64);

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The computation the memoizer currently answers for.
struct Current<T> {
    /// `None` until the first call.
    id: Option<ComputationId>,
    /// The value of `id`, once it succeeded.
    value: Option<T>,
}

struct Inner<A, T, E> {
    function: WrappedFn<A, T, E>,
    slot: MemoizeOne<A, ComputationId>,
    current: Current<T>,
    next_id: u64,
}

struct Shared<A, T, E> {
    config: LazyMemoConfig,
    runtime: Option<Handle>,
    inner: Mutex<Inner<A, T, E>>,
}

/// Memoizes the latest invocation of an async function, answering synchronously.
///
/// Every call returns right away:
///
/// - With arguments equal to the previous call, it returns the value of the computation that
///   call selected, or `None` if that computation has not succeeded (yet).
/// - With new arguments, it invokes the wrapped function, spawns the resulting future and
///   returns `None`. The previous computation is not cancelled, but whatever it produces from now
///   on is discarded.
///
/// A completion callback can be attached with [`call_with`](Self::call_with). It fires once the
/// computation started by that call settles, unless a call with different arguments came in
/// first. Calls that reuse a running computation do not replace its callback.
///
/// NOTE: The wrapped function runs while the memoizer is locked, so it must not call back into
/// the same memoizer synchronously. Callbacks are invoked without holding the lock.
pub struct LazyMemo<A, T, E> {
    shared: Arc<Shared<A, T, E>>,
}

impl<A, T, E> Clone for LazyMemo<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, T, E> LazyMemo<A, T, E>
where
    A: PartialEq + Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    /// Wraps `function` with the default configuration.
    ///
    /// Arguments are compared with [`PartialEq`], and computations are spawned on the runtime
    /// the call is made from.
    pub fn new<F, Fut>(function: F) -> Self
    where
        F: FnMut(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::builder(function).build()
    }

    /// Starts building a memoizer for `function`.
    pub fn builder<F, Fut>(function: F) -> LazyMemoBuilder<A, T, E>
    where
        F: FnMut(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        LazyMemoBuilder::with_equality(function, default_equality())
    }
}

impl<A, T, E> LazyMemo<A, T, E>
where
    A: Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    fn from_parts(
        function: WrappedFn<A, T, E>,
        equality: Equality<A>,
        config: LazyMemoConfig,
        runtime: Option<Handle>,
    ) -> Self {
        let inner = Inner {
            function,
            slot: MemoizeOne::with_equality(equality),
            current: Current {
                id: None,
                value: None,
            },
            next_id: 0,
        };
        Self {
            shared: Arc::new(Shared {
                config,
                runtime,
                inner: Mutex::new(inner),
            }),
        }
    }

    /// Returns the memoized value for `args`, starting a computation if needed.
    ///
    /// See [`call_with`](Self::call_with) for details.
    pub fn call(&self, args: A) -> Result<Option<T>, MemoError> {
        self.invoke(args, Box::new(|_| ()))
    }

    /// Returns the memoized value for `args`, starting a computation if needed.
    ///
    /// If this call starts a new computation, `callback` is invoked once it settles, provided no
    /// call with different arguments happened in the meantime. Otherwise `callback` is dropped
    /// without being called. A computation that panics, or whose task is dropped by a shutting
    /// down runtime, settles with [`ComputationError::Aborted`].
    ///
    /// # Errors
    ///
    /// Fails with [`MemoError::InvalidResultFunction`] if a new computation has to be started but
    /// cannot be spawned. Failures of the computation itself are only passed to `callback`.
    pub fn call_with<C>(&self, args: A, callback: C) -> Result<Option<T>, MemoError>
    where
        C: FnOnce(Result<(), ComputationError<E>>) + Send + 'static,
    {
        self.invoke(args, Box::new(callback))
    }

    /// Delegates to the single-slot memoizer and spawns the computation if it is a new one.
    ///
    /// NOTE: This function itself is *not* `async`, because it should eagerly spawn the
    /// computation on an executor, even if nobody waits for its result.
    fn invoke(&self, args: A, callback: Callback<E>) -> Result<Option<T>, MemoError> {
        let name = &self.shared.config.name;
        let (id, computation, runtime) = {
            let mut guard = self.shared.lock();
            let Inner {
                function,
                slot,
                current,
                next_id,
            } = &mut *guard;

            let mut computation = None;
            let id = *slot.get_or_call(args, |args| {
                let id = ComputationId(*next_id);
                *next_id += 1;
                computation = Some((*function)(args.clone()));
                id
            });

            let Some(computation) = computation else {
                // Equal arguments always select the tracked computation.
                debug_assert_eq!(current.id, Some(id));
                tracing::trace!(memo = %name, computation = %id, "reusing computation");
                return Ok(current.value.clone());
            };

            let runtime = match self.shared.runtime.clone() {
                Some(runtime) => runtime,
                None => Handle::try_current().map_err(|err| {
                    // The arguments must not select a computation that never runs.
                    slot.clear();
                    MemoError::InvalidResultFunction(Some(err))
                })?,
            };

            current.id = Some(id);
            current.value = None;
            (id, computation, runtime)
        };
        tracing::debug!(memo = %name, computation = %id, "starting computation");

        // The lock is released at this point: a runtime that is shutting down drops the task
        // right inside `spawn`, which settles it.
        let settlement = Settlement::new(Arc::clone(&self.shared), id, callback);
        let spawn_state = Arc::clone(&settlement.spawn_state);
        let span = tracing::debug_span!("lazy_memo.computation", memo = %name, computation = %id);
        runtime.spawn(
            async move {
                let settlement = settlement.running();
                let outcome = computation.await;
                settlement.complete(outcome);
            }
            .instrument(span),
        );

        let spawned = spawn_state
            .compare_exchange(SPAWNING, SPAWNED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if spawned {
            Ok(None)
        } else {
            tracing::debug!(memo = %name, computation = %id, "runtime rejected computation");
            Err(MemoError::InvalidResultFunction(None))
        }
    }
}

/// `spawn` has not returned yet.
const SPAWNING: u8 = 0;
/// The task was handed to the runtime.
const SPAWNED: u8 = 1;
/// The task was dropped unpolled before `spawn` returned.
const REJECTED: u8 = 2;

/// Publishes the outcome of one computation, also when its task never completes.
///
/// The settlement is owned by the spawned task. If the task is dropped before
/// [`complete`](Self::complete) is reached, because the future panicked or the runtime shut down,
/// the computation settles as [`ComputationError::Aborted`].
struct Settlement<A, T, E> {
    shared: Arc<Shared<A, T, E>>,
    id: ComputationId,
    callback: Option<Callback<E>>,
    spawn_state: Arc<AtomicU8>,
    /// Set once the task is first polled.
    running: bool,
}

impl<A, T, E> Settlement<A, T, E> {
    fn new(shared: Arc<Shared<A, T, E>>, id: ComputationId, callback: Callback<E>) -> Self {
        Self {
            shared,
            id,
            callback: Some(callback),
            spawn_state: Arc::new(AtomicU8::new(SPAWNING)),
            running: false,
        }
    }

    fn running(mut self) -> Self {
        self.running = true;
        self
    }

    fn complete(mut self, outcome: Result<T, E>) {
        if let Some(callback) = self.callback.take() {
            let outcome = outcome.map_err(ComputationError::Failed);
            self.shared.settle(self.id, outcome, callback);
        }
    }
}

impl<A, T, E> Drop for Settlement<A, T, E> {
    fn drop(&mut self) {
        let Some(callback) = self.callback.take() else {
            return;
        };

        let rejected = !self.running
            && self
                .spawn_state
                .compare_exchange(SPAWNING, REJECTED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        if rejected {
            // The call itself reports the failure, so the callback is not invoked.
            self.shared.forget(self.id);
        } else {
            self.shared.settle(self.id, Err(ComputationError::Aborted), callback);
        }
    }
}

impl<A, T, E> Shared<A, T, E> {
    fn lock(&self) -> MutexGuard<'_, Inner<A, T, E>> {
        // The state is updated in single assignments, so it is consistent even after a panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the outcome of computation `id`, unless a newer computation took over.
    ///
    /// The staleness check covers both the value write and the callback.
    fn settle(
        &self,
        id: ComputationId,
        outcome: Result<T, ComputationError<E>>,
        callback: Callback<E>,
    ) {
        let notification = {
            let mut inner = self.lock();
            if inner.current.id != Some(id) {
                tracing::debug!("discarding outcome of superseded computation");
                return;
            }

            match outcome {
                Ok(value) => {
                    inner.current.value = Some(value);
                    tracing::debug!("computation succeeded");
                    Ok(())
                }
                Err(err) => {
                    if self.config.retry_failed {
                        inner.slot.clear();
                    }
                    tracing::debug!(
                        aborted = matches!(err, ComputationError::Aborted),
                        "computation failed"
                    );
                    Err(err)
                }
            }
        };

        callback(notification);
    }

    /// Makes the arguments of computation `id` select nothing, if it is still current.
    fn forget(&self, id: ComputationId) {
        let mut inner = self.lock();
        if inner.current.id == Some(id) {
            inner.slot.clear();
        }
    }
}

impl<A, T, E> fmt::Debug for LazyMemo<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("LazyMemo");
        debug.field("config", &self.shared.config);
        if let Ok(inner) = self.shared.inner.try_lock() {
            debug
                .field("computation", &inner.current.id.map(|id| id.0))
                .field("settled", &inner.current.value.is_some());
        }
        debug.finish()
    }
}
