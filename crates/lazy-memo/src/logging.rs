//! Logging setup for applications embedding memoizers.
//!
//! Memoizers report through [`tracing`]. Every computation runs inside a
//! `lazy_memo.computation` span carrying the memoizer name and the computation id.

use tracing::Subscriber;
use tracing_subscriber::fmt::fmt;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Creates a `fmt` subscriber filtered by `env_filter`.
///
/// The filter uses the [`EnvFilter`](tracing_subscriber::EnvFilter) directive syntax, for
/// example `"lazy_memo=debug"`.
pub fn subscriber(env_filter: &str) -> impl Subscriber + Send + Sync + use<> {
    fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_env_filter(env_filter)
        .finish()
}

/// Installs [`subscriber`] as the global default.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(env_filter: &str) -> Result<(), TryInitError> {
    subscriber(env_filter).try_init()
}
