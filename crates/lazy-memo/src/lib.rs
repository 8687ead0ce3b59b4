//! Synchronous memoization of the most recent asynchronous computation.
//!
//! A [`LazyMemo`] wraps an async function and answers every call immediately. The first call with
//! a new argument tuple starts the computation in the background and returns `None`. Once the
//! computation succeeds, calls with equal arguments return its value. Only the latest argument
//! tuple is remembered; a call with different arguments discards whatever came before.
//!
//! ```no_run
//! # async fn run() -> Result<(), lazy_memo::MemoError> {
//! use lazy_memo::LazyMemo;
//!
//! let add = LazyMemo::new(|(a, b): (u32, u32)| async move { Ok::<_, String>(a + b) });
//!
//! assert_eq!(add.call((1, 2))?, None);
//! tokio::task::yield_now().await;
//! assert_eq!(add.call((1, 2))?, Some(3));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
pub mod logging;
mod memo;
mod memoize_one;

pub use config::*;
pub use error::*;
pub use memo::*;
pub use memoize_one::*;
