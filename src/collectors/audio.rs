//! Audio fingerprinting (audio layer)
//!
//! Runs a muted oscillator -> compressor -> analyser chain, then samples the
//! frequency bins. The float output depends on the browser's DSP code and the
//! platform's math libraries, which makes it a stable fingerprint. Browsers
//! that stub the analyser return near-uniform data, which is what the
//! protection heuristic looks for.

use std::collections::BTreeSet;

use async_trait::async_trait;
use web_sys::{AudioContext, AudioContextState, OscillatorNode, OscillatorType};

use super::js_helpers::{self, js_err};
use super::Collector;
use crate::config::ScanConfig;
use crate::crypto::hash_f32_sample;
use crate::error::{Result, ScanError};
use crate::fingerprint::{AudioSignal, Layer, RawLayerSignal};
use crate::runtime::sleep;

/// Frequency bins kept in the signal
pub const SAMPLE_LEN: usize = 64;

const OSCILLATOR_FREQUENCY: f32 = 10_000.0;

/// Count distinct finite values. `-0.0` and `0.0` count as one value.
pub fn distinct_finite_values(sample: &[f32]) -> usize {
    sample
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| if *v == 0.0 { 0u32 } else { v.to_bits() })
        .collect::<BTreeSet<u32>>()
        .len()
}

/// Fewer distinct values than `threshold` means uniform or stubbed output.
pub fn is_protected(distinct: usize, threshold: usize) -> bool {
    distinct < threshold
}

/// Collector for the audio layer.
pub struct AudioCollector;

#[async_trait(?Send)]
impl Collector for AudioCollector {
    fn layer(&self) -> Layer {
        Layer::Audio
    }

    async fn collect(&self, config: &ScanConfig) -> Result<RawLayerSignal> {
        if !js_helpers::has_global("AudioContext") {
            return Err(ScanError::CapabilityMissing("AudioContext".into()));
        }

        let ctx = AudioContextGuard::new()?;
        let oscillator = build_chain(&ctx.0)?;
        let analyser = oscillator.1;
        start_oscillator(&oscillator.0)?;

        // Autoplay policy may hold the context suspended; resume is
        // best-effort and bounded by the settle time.
        if let Ok(promise) = ctx.0.resume() {
            let _ = crate::runtime::with_timeout(
                wasm_bindgen_futures::JsFuture::from(promise),
                config.audio_settle(),
            )
            .await;
        }
        sleep(config.audio_settle()).await;

        if ctx.0.state() != AudioContextState::Running {
            return Err(ScanError::CapabilityMissing(
                "AudioContext suspended by autoplay policy".into(),
            ));
        }

        let mut bins = vec![0f32; analyser.frequency_bin_count() as usize];
        analyser.get_float_frequency_data(&mut bins);
        bins.truncate(SAMPLE_LEN);
        if let Err(e) = stop_oscillator(&oscillator.0) {
            log::debug!("oscillator stop failed, context close still releases it: {}", e);
        }

        let distinct = distinct_finite_values(&bins);
        let protected = is_protected(distinct, config.audio_distinct_threshold);
        log::debug!("audio sample has {} distinct value(s), protected: {}", distinct, protected);

        let destination = ctx.0.destination();
        let base_latency = js_helpers::get_f64(ctx.0.as_ref(), "baseLatency");

        Ok(RawLayerSignal::Audio(AudioSignal {
            hash: hash_f32_sample(&bins),
            sample: bins,
            distinct_values: distinct,
            is_protected: protected,
            sample_rate: ctx.0.sample_rate(),
            max_channel_count: destination.max_channel_count(),
            channel_count: destination.channel_count(),
            base_latency,
        }))
    }
}

/// Closes the audio context on every exit path.
struct AudioContextGuard(AudioContext);

impl AudioContextGuard {
    fn new() -> Result<Self> {
        AudioContext::new()
            .map(Self)
            .map_err(js_err("new AudioContext"))
    }
}

impl Drop for AudioContextGuard {
    fn drop(&mut self) {
        let _ = self.0.close();
    }
}

/// oscillator -> compressor -> analyser -> muted gain -> destination
fn build_chain(ctx: &AudioContext) -> Result<(OscillatorNode, web_sys::AnalyserNode)> {
    let oscillator = ctx.create_oscillator().map_err(js_err("createOscillator"))?;
    oscillator.set_type(OscillatorType::Triangle);
    oscillator.frequency().set_value(OSCILLATOR_FREQUENCY);

    let compressor = ctx
        .create_dynamics_compressor()
        .map_err(js_err("createDynamicsCompressor"))?;
    compressor.threshold().set_value(-50.0);
    compressor.knee().set_value(40.0);
    compressor.ratio().set_value(12.0);
    compressor.attack().set_value(0.0);
    compressor.release().set_value(0.25);

    let analyser = ctx.create_analyser().map_err(js_err("createAnalyser"))?;
    analyser.set_fft_size(2048);

    let mute = ctx.create_gain().map_err(js_err("createGain"))?;
    mute.gain().set_value(0.0);

    oscillator
        .connect_with_audio_node(&compressor)
        .map_err(js_err("connect"))?;
    compressor
        .connect_with_audio_node(&analyser)
        .map_err(js_err("connect"))?;
    analyser
        .connect_with_audio_node(&mute)
        .map_err(js_err("connect"))?;
    mute.connect_with_audio_node(&ctx.destination())
        .map_err(js_err("connect"))?;

    Ok((oscillator, analyser))
}

#[allow(deprecated)]
fn start_oscillator(oscillator: &OscillatorNode) -> Result<()> {
    oscillator.start().map_err(js_err("oscillator.start"))
}

#[allow(deprecated)]
fn stop_oscillator(oscillator: &OscillatorNode) -> Result<()> {
    oscillator.stop().map_err(js_err("oscillator.stop"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_ignores_non_finite() {
        let sample = [
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
            f32::NAN,
            -100.0,
            -100.0,
            -99.5,
        ];
        assert_eq!(distinct_finite_values(&sample), 2);
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        assert_eq!(distinct_finite_values(&[0.0, -0.0]), 1);
    }

    #[test]
    fn test_stubbed_output_is_protected() {
        let stubbed = vec![f32::NEG_INFINITY; SAMPLE_LEN];
        assert!(is_protected(distinct_finite_values(&stubbed), 5));

        let real: Vec<f32> = (0..SAMPLE_LEN).map(|i| -140.0 + i as f32 * 0.37).collect();
        assert_eq!(distinct_finite_values(&real), SAMPLE_LEN);
        assert!(!is_protected(SAMPLE_LEN, 5));
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(is_protected(4, 5));
        assert!(!is_protected(5, 5));
    }
}
