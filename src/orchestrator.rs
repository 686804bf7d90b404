//! Collection Orchestrator
//!
//! Runs every enabled collector concurrently, each raced against its own
//! copy of the outer budget, and folds the outcomes into a total
//! [`FingerprintData`]. Nothing here can fail: errors and expired budgets
//! become unavailable readings, and no collector is ever retried.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};

use crate::collectors::{browser_collectors, Collector};
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::fingerprint::{FingerprintData, Layer, LayerReading, UnavailableReason};
use crate::runtime::{now_ms, race_deadline, Deadline, Stopwatch, WasmSleep};

/// Reported after each collector resolves, in completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    /// `completed / total`
    pub fraction: f64,
    /// The layer that just resolved
    pub layer: Layer,
    pub available: bool,
}

pub struct Orchestrator {
    config: ScanConfig,
    collectors: Vec<Box<dyn Collector>>,
}

impl Orchestrator {
    /// Orchestrator over the browser collectors.
    pub fn new(config: ScanConfig) -> Self {
        Self::with_collectors(config, browser_collectors())
    }

    pub fn with_collectors(config: ScanConfig, collectors: Vec<Box<dyn Collector>>) -> Self {
        Self { config, collectors }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Collect with the configured budget as a browser timer.
    pub async fn collect<P>(&self, on_progress: P) -> FingerprintData
    where
        P: FnMut(&ScanProgress),
    {
        let budget = self.config.collector_budget();
        self.gather(|| WasmSleep::new(budget), on_progress).await
    }

    /// Collect with a caller-supplied deadline. `deadline` is called once
    /// per collector; a collector loses its layer when its deadline
    /// resolves first.
    pub async fn gather<D, F, P>(&self, deadline: D, mut on_progress: P) -> FingerprintData
    where
        D: Fn() -> F,
        F: Future<Output = ()>,
        P: FnMut(&ScanProgress),
    {
        let stopwatch = Stopwatch::start();
        let mut builder = FingerprintData::builder(now_ms());
        let budget_ms = self.config.collector_budget_ms;

        let mut pending = FuturesUnordered::new();
        for collector in &self.collectors {
            let layer = collector.layer();
            if !self.config.layers.is_enabled(layer) {
                builder.insert(
                    layer,
                    LayerReading::unavailable(UnavailableReason::Disabled, "disabled in scan configuration"),
                );
                continue;
            }
            let work = collector.collect(&self.config);
            let expiry = deadline();
            pending.push(async move {
                let outcome = match race_deadline(work, expiry).await {
                    Deadline::Completed(outcome) => outcome,
                    Deadline::Expired => Err(ScanError::Timeout(budget_ms)),
                };
                (layer, outcome)
            });
        }

        let total = pending.len();
        log::info!("🔍 Scanning {} layer(s)", total);

        let mut completed = 0;
        while let Some((layer, outcome)) = pending.next().await {
            completed += 1;
            let available = matches!(&outcome, Ok(signal) if signal.layer() == layer);
            if let Err(err) = &outcome {
                log::warn!("{} layer unavailable: {}", layer, err);
            }
            builder.record(layer, outcome);

            on_progress(&ScanProgress {
                completed,
                total,
                fraction: completed as f64 / total as f64,
                layer,
                available,
            });
        }

        let data = builder.build();
        log::info!(
            "✅ Scan finished in {:.0} ms: {}/{} layer(s) available",
            stopwatch.elapsed_ms(),
            data.available_layers().len(),
            Layer::ALL.len()
        );
        data
    }
}
