//! Signal collectors, one per detection layer.
//!
//! Each collector probes one part of the browser and returns its layer's
//! [`RawLayerSignal`]. Collectors share no state and release every browser
//! object they create (peer connections, audio contexts, canvases) through
//! drop guards, so a timed-out or failed probe leaves nothing behind.
//!
//! Errors returned here never reach the page: the orchestrator turns them
//! into "unavailable" readings.
//!
//! | Layer       | Module         | Browser APIs                                |
//! |-------------|----------------|---------------------------------------------|
//! | network     | [`network`]    | RTCPeerConnection, STUN                     |
//! | graphics    | [`graphics`]   | 2D canvas, WebGL debug renderer info        |
//! | audio       | [`audio`]      | AudioContext, AnalyserNode                  |
//! | fonts       | [`fonts`]      | CanvasRenderingContext2D.measureText        |
//! | navigator   | [`navigator`]  | navigator, screen                           |
//! | locale      | [`locale`]     | Date, Intl.DateTimeFormat                   |
//! | automation  | [`automation`] | navigator.webdriver, driver globals         |

use async_trait::async_trait;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::fingerprint::{Layer, RawLayerSignal};

pub mod audio;
pub mod automation;
pub mod fonts;
pub mod graphics;
pub mod js_helpers;
pub mod locale;
pub mod navigator;
pub mod network;

/// A probe for one layer.
///
/// `?Send` because browser handles are `!Send`; everything runs on the page's
/// event loop.
#[async_trait(?Send)]
pub trait Collector {
    fn layer(&self) -> Layer;

    async fn collect(&self, config: &ScanConfig) -> Result<RawLayerSignal>;
}

/// The browser collectors for every layer, in layer order.
pub fn browser_collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(network::NetworkCollector),
        Box::new(graphics::GraphicsCollector),
        Box::new(audio::AudioCollector),
        Box::new(fonts::FontsCollector),
        Box::new(navigator::NavigatorCollector),
        Box::new(locale::LocaleCollector),
        Box::new(automation::AutomationCollector),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_collector_per_layer() {
        let layers: Vec<Layer> = browser_collectors().iter().map(|c| c.layer()).collect();
        assert_eq!(layers, Layer::ALL.to_vec());
    }
}
