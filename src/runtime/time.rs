//! Wall-clock and elapsed time

use web_time::Instant;

/// Milliseconds since the Unix epoch (WASM-compatible)
pub fn now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or_default()
    }
}

/// Measures elapsed time with `performance.now()` resolution in browsers.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000.0);
    }

    #[test]
    fn test_stopwatch_is_monotonic() {
        let watch = Stopwatch::start();
        let first = watch.elapsed_ms();
        let second = watch.elapsed_ms();
        assert!(first >= 0.0);
        assert!(second >= first);
    }
}
