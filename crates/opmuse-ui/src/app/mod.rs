//! Application root: owns one instance of every controller.

use crate::core::config::{AppConfig, CONFIG_ELEMENT_ID, Capabilities};
use crate::core::prefs::{KeyValueBackend, MemoryBackend, PreferenceStore};
use crate::core::signals::{InitScope, SignalHub};
use crate::features;
use crate::services::storage::LocalStorageBackend;
use gloo::console;
use gloo::utils::{document, window};
use js_sys::Reflect;
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlElement;

pub(crate) mod bus;
pub(crate) mod dom;
pub(crate) mod navigator;
pub(crate) mod reloader;

use bus::BusClient;
use navigator::Navigator;
use reloader::Reloader;

/// Shared controller context handed to every feature.
pub(crate) struct App {
    pub(crate) config: Rc<AppConfig>,
    pub(crate) prefs: PreferenceStore<Box<dyn KeyValueBackend>>,
    pub(crate) init: Rc<SignalHub<InitScope>>,
    pub(crate) navigator: Rc<Navigator>,
    pub(crate) reloader: Rc<Reloader>,
    pub(crate) bus: Option<Rc<BusClient>>,
}

impl App {
    fn new(config: AppConfig, capabilities: Capabilities) -> Rc<Self> {
        let config = Rc::new(config);
        let init = Rc::new(SignalHub::default());
        let backend: Box<dyn KeyValueBackend> = if capabilities.local_storage {
            Box::new(LocalStorageBackend)
        } else {
            console::warn!("localStorage unavailable; preferences last for this page only");
            Box::new(MemoryBackend::default())
        };
        Rc::new(Self {
            prefs: PreferenceStore::new(backend),
            navigator: Navigator::new(Rc::clone(&config), Rc::clone(&init), capabilities.history),
            reloader: Reloader::new(Rc::clone(&init), capabilities.transitions),
            bus: BusClient::start(&config, capabilities.websocket),
            init,
            config,
        })
    }
}

fn load_config() -> AppConfig {
    let Some(raw) = document()
        .get_element_by_id(CONFIG_ELEMENT_ID)
        .and_then(|element| element.text_content())
    else {
        console::warn!(format!("#{CONFIG_ELEMENT_ID} missing; using defaults"));
        return AppConfig::default();
    };
    AppConfig::from_json(&raw).unwrap_or_else(|err| {
        console::warn!(format!("{err}; using defaults"));
        AppConfig::default()
    })
}

fn has_property(target: &JsValue, name: &str) -> bool {
    Reflect::has(target, &JsValue::from_str(name)).unwrap_or(false)
}

fn detect_capabilities() -> Capabilities {
    let win: JsValue = window().into();
    let transitions = document()
        .document_element()
        .and_then(|root| root.dyn_into::<HtmlElement>().ok())
        .is_some_and(|root| has_property(&root.style().into(), "transition"));
    Capabilities {
        history: window().history().is_ok() && has_property(&win, "history"),
        websocket: has_property(&win, "WebSocket"),
        local_storage: LocalStorageBackend::available(),
        transitions,
    }
}

/// Browser entry point: read the page configuration, wire every controller and run the
/// first page initialization.
pub fn run_app() {
    console_error_panic_hook::set_once();
    let app = App::new(load_config(), detect_capabilities());
    features::install(&app);
    app.navigator.install();
    app.init.publish(&InitScope::Page);
}
