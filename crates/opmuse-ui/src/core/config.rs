//! Page configuration and runtime capabilities.
//!
//! # Design
//! - The server embeds one JSON object in the page; everything that used to live in
//!   ambient globals is read from it once at startup and passed to constructors.
//! - Capabilities are detected explicitly by the wasm layer and handed in as plain data.

use crate::core::error::{UiError, UiResult};
use serde::Deserialize;

/// Element id of the embedded JSON configuration block.
pub const CONFIG_ELEMENT_ID: &str = "opmuse-config";

/// Startup configuration for every controller.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Whether the page was rendered for a logged-in session.
    pub authenticated: bool,
    /// Port override for the event bus endpoint.
    pub ws_port: Option<u16>,
    /// Region selectors swapped on navigation, in document order.
    pub regions: Vec<String>,
    /// Selector of the element whose text becomes the document title.
    pub title_selector: String,
    /// Maximum number of concurrent upload requests.
    pub upload_concurrency: usize,
    /// Base delay before reconnecting the event bus.
    pub reconnect_delay_ms: u32,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_delay_ms: u32,
    /// Period of the initial connect watchdog.
    pub connect_watchdog_ms: u32,
    /// Lifetime of transient notifications.
    pub message_timeout_ms: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            authenticated: false,
            ws_port: None,
            regions: vec!["#navbar".into(), "#main".into(), "#panel".into()],
            title_selector: "title".into(),
            upload_concurrency: 4,
            reconnect_delay_ms: 5_000,
            reconnect_max_delay_ms: 30_000,
            connect_watchdog_ms: 1_000,
            message_timeout_ms: 5_000,
        }
    }
}

impl AppConfig {
    /// Decode the embedded configuration block.
    ///
    /// # Errors
    /// Returns [`UiError::Config`] when the JSON is malformed.
    pub fn from_json(raw: &str) -> UiResult<Self> {
        let mut config: Self =
            serde_json::from_str(raw).map_err(|source| UiError::Config { source })?;
        config.upload_concurrency = config.upload_concurrency.max(1);
        if config.regions.is_empty() {
            config.regions = Self::default().regions;
        }
        Ok(config)
    }
}

/// Browser features the controllers depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// `history.pushState` and `popstate` are usable.
    pub history: bool,
    /// `WebSocket` constructor is present.
    pub websocket: bool,
    /// `localStorage` is accessible.
    pub local_storage: bool,
    /// CSS transitions fire `transitionend`.
    pub transitions: bool,
}

impl Capabilities {
    /// Capabilities of a fully featured browser.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            history: true,
            websocket: true,
            local_storage: true,
            transitions: true,
        }
    }
}
