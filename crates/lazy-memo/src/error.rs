use thiserror::Error;
use tokio::runtime::TryCurrentError;

/// An error returned synchronously from a [`LazyMemo`](crate::LazyMemo) call.
///
/// Failures of the wrapped computation itself never show up here. They are only reported to the
/// completion callback of the call that started the computation, as a [`ComputationError`].
#[derive(Debug, Error)]
pub enum MemoError {
    /// The wrapped function produced a future that cannot be driven as a background computation.
    ///
    /// This happens when no runtime was configured for the memoizer and the call was made outside
    /// of a tokio runtime context, or when the runtime refused the computation because it is
    /// shutting down. The call is aborted; the memoizer itself stays usable.
    #[error("wrapped function did not produce a runnable computation")]
    InvalidResultFunction(#[source] Option<TryCurrentError>),
}

/// The reason a computation did not produce a value, as passed to completion callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputationError<E> {
    /// The wrapped future resolved to an error.
    #[error("{0}")]
    Failed(E),
    /// The wrapped future panicked, or its task was dropped before the future resolved.
    #[error("computation aborted before completion")]
    Aborted,
}
