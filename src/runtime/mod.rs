//! Timers and deadlines for the browser event loop
//!
//! Everything here runs on the single-threaded cooperative scheduler of
//! `wasm-bindgen-futures`. A deadline never cancels the raced future from
//! the outside: losing the race simply drops it, which runs its destructors
//! and releases whatever browser objects it held.

mod sleep;
mod time;

use std::future::Future;
use std::time::Duration;

use futures::future::{self, Either};

pub use sleep::{sleep, WasmSleep};
pub use time::{now_ms, Stopwatch};

/// Result of racing a future against a deadline.
#[derive(Debug, Clone, PartialEq)]
pub enum Deadline<T> {
    Completed(T),
    Expired,
}

impl<T> Deadline<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Deadline::Completed(value) => Some(value),
            Deadline::Expired => None,
        }
    }
}

/// Race `work` against an arbitrary `deadline` future. Ties go to `work`.
pub async fn race_deadline<F, D>(work: F, deadline: D) -> Deadline<F::Output>
where
    F: Future,
    D: Future,
{
    futures::pin_mut!(work);
    futures::pin_mut!(deadline);

    match future::select(work, deadline).await {
        Either::Left((value, _)) => Deadline::Completed(value),
        Either::Right(_) => Deadline::Expired,
    }
}

/// Race `work` against a browser timer.
pub async fn with_timeout<F: Future>(work: F, timeout: Duration) -> Deadline<F::Output> {
    race_deadline(work, WasmSleep::new(timeout)).await
}
