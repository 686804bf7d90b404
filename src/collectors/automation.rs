//! Automation framework markers (automation layer)
//!
//! Looks for traces that WebDriver, headless Chrome, PhantomJS, Nightmare and
//! Selenium leave in the page. A single marker is enough for bot detection
//! services to flag the session.

use async_trait::async_trait;
use js_sys::Object;
use wasm_bindgen::JsCast;

use super::js_helpers::{get_bool, get_global, get_string, has_global};
use super::Collector;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::fingerprint::{AutomationSignal, Layer, RawLayerSignal};

const PHANTOM_GLOBALS: &[&str] = &["callPhantom", "_phantom"];
const NIGHTMARE_GLOBALS: &[&str] = &["__nightmare"];
const SELENIUM_GLOBALS: &[&str] = &[
    "_selenium",
    "callSelenium",
    "_Selenium_IDE_Recorder",
    "__webdriver_evaluate",
    "__selenium_evaluate",
    "__webdriver_script_fn",
    "__driver_evaluate",
    "__fxdriver_evaluate",
    "__fxdriver_unwrapped",
    "__webdriver_unwrapped",
    "__selenium_unwrapped",
];

pub fn is_headless_user_agent(user_agent: &str) -> bool {
    user_agent.contains("HeadlessChrome") || user_agent.contains("PhantomJS")
}

/// ChromeDriver injects `$cdc_…` (or `$wdc_…` in older builds) keys into
/// `document`.
pub fn has_driver_document_key<S: AsRef<str>>(keys: &[S]) -> bool {
    keys.iter().any(|key| {
        let key = key.as_ref();
        key.starts_with("$cdc_") || key.starts_with("$wdc_") || key.starts_with("cdc_")
    })
}

fn any_global(names: &[&str]) -> bool {
    names.iter().any(|name| has_global(name))
}

/// Collector for the automation layer.
pub struct AutomationCollector;

#[async_trait(?Send)]
impl Collector for AutomationCollector {
    fn layer(&self) -> Layer {
        Layer::Automation
    }

    async fn collect(&self, _config: &ScanConfig) -> Result<RawLayerSignal> {
        let navigator = get_global("navigator");
        let webdriver = navigator
            .as_ref()
            .and_then(|nav| get_bool(nav, "webdriver"))
            .unwrap_or(false);
        let user_agent = navigator
            .as_ref()
            .and_then(|nav| get_string(nav, "userAgent"))
            .unwrap_or_default();

        let document_keys: Vec<String> = get_global("document")
            .map(|doc| {
                Object::keys(doc.unchecked_ref::<Object>())
                    .iter()
                    .filter_map(|key| key.as_string())
                    .collect()
            })
            .unwrap_or_default();

        let signal = AutomationSignal {
            webdriver,
            headless_user_agent: is_headless_user_agent(&user_agent),
            phantom: any_global(PHANTOM_GLOBALS),
            nightmare: any_global(NIGHTMARE_GLOBALS),
            selenium_globals: any_global(SELENIUM_GLOBALS),
            cdc_document_key: has_driver_document_key(&document_keys),
        };
        if signal.any() {
            log::info!("automation markers present: {:?}", signal.markers());
        }
        Ok(RawLayerSignal::Automation(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_user_agent() {
        let headless = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                        (KHTML, like Gecko) HeadlessChrome/120.0.0.0 Safari/537.36";
        let regular = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                       (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        assert!(is_headless_user_agent(headless));
        assert!(!is_headless_user_agent(regular));
    }

    #[test]
    fn test_driver_document_key() {
        assert!(has_driver_document_key(&["location", "$cdc_asdjflasutopfhvcZLmcfl_"]));
        assert!(has_driver_document_key(&["$wdc_"]));
        assert!(!has_driver_document_key(&["location", "cookie", "title"]));
        assert!(!has_driver_document_key::<&str>(&[]));
    }
}
