use std::fmt;
use std::future::Future;

use futures::future::FutureExt;
use tokio::runtime::Handle;

use super::{LazyMemo, WrappedFn};
use crate::config::LazyMemoConfig;
use crate::memoize_one::Equality;

/// Configures a [`LazyMemo`] before it is created.
pub struct LazyMemoBuilder<A, T, E> {
    function: WrappedFn<A, T, E>,
    equality: Equality<A>,
    config: LazyMemoConfig,
    runtime: Option<Handle>,
}

impl<A, T, E> LazyMemoBuilder<A, T, E>
where
    A: Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    /// Starts building a memoizer for `function` that compares arguments with `equality`.
    ///
    /// Unlike [`LazyMemo::builder`], this does not require the arguments to implement
    /// [`PartialEq`].
    pub fn with_equality<F, Fut>(mut function: F, equality: Equality<A>) -> Self
    where
        F: FnMut(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            function: Box::new(move |args| function(args).boxed()),
            equality,
            config: LazyMemoConfig::default(),
            runtime: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: LazyMemoConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the name used in log events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets whether a failed computation is retried by the next call with equal arguments.
    pub fn retry_failed(mut self, retry_failed: bool) -> Self {
        self.config.retry_failed = retry_failed;
        self
    }

    /// Spawns computations on `runtime` instead of the runtime the call is made from.
    ///
    /// This allows calling the memoizer from threads outside of any runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replaces the function used to compare arguments.
    pub fn equality(mut self, equality: Equality<A>) -> Self {
        self.equality = equality;
        self
    }

    /// Creates the memoizer.
    pub fn build(self) -> LazyMemo<A, T, E> {
        LazyMemo::from_parts(self.function, self.equality, self.config, self.runtime)
    }
}

impl<A, T, E> fmt::Debug for LazyMemoBuilder<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyMemoBuilder")
            .field("config", &self.config)
            .field("runtime", &self.runtime.is_some())
            .finish()
    }
}
