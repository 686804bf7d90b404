//! Sleep provider implementation using browser timers

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use gloo_timers::future::TimeoutFuture;

/// A future that resolves after a specified duration
pub struct WasmSleep {
    timer: TimeoutFuture,
}

impl WasmSleep {
    /// Create a new sleep future. Durations beyond `u32::MAX` ms are clamped.
    pub fn new(duration: Duration) -> Self {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        Self {
            timer: TimeoutFuture::new(millis),
        }
    }
}

impl Future for WasmSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.timer).poll(cx)
    }
}

/// Sleep for the specified duration
pub async fn sleep(duration: Duration) {
    WasmSleep::new(duration).await
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use crate::runtime::Stopwatch;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    async fn test_sleep() {
        let watch = Stopwatch::start();

        sleep(Duration::from_millis(10)).await;

        // Should have slept at least 10ms (with some tolerance)
        assert!(watch.elapsed_ms() >= 8.0);
    }
}
