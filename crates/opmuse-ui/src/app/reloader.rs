//! Partial reloads of reload-eligible regions for live updates.
//!
//! # Design
//! - All eligible selectors of one call share a single fetch of the current URL.
//! - Each region fades out (`reloading` class) and is swapped on its own `transitionend`
//!   (bubbled child transitions are ignored); a fallback timer covers regions without a
//!   transition.

use crate::app::dom::{parse_html, query, set_class};
use crate::core::regions::{RELOAD_ATTRIBUTE, RegionLookup, plan_reload};
use crate::core::signals::{InitScope, SignalHub};
use crate::services::http;
use gloo::console;
use gloo::events::EventListener;
use gloo::utils::window;
use gloo_timers::callback::Timeout;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Node};

const FADE_CLASS: &str = "reloading";
const FADE_FALLBACK_MS: u32 = 400;

struct LiveDocument;

impl RegionLookup for LiveDocument {
    fn matches(&self, selector: &str) -> bool {
        query(selector).is_some()
    }

    fn reload_eligible(&self, selector: &str) -> bool {
        query(selector).is_some_and(|element| element.has_attribute(RELOAD_ATTRIBUTE))
    }
}

/// Region reloader shared by live-update consumers.
pub(crate) struct Reloader {
    init: Rc<SignalHub<InitScope>>,
    transitions: bool,
}

impl Reloader {
    pub(crate) fn new(init: Rc<SignalHub<InitScope>>, transitions: bool) -> Rc<Self> {
        Rc::new(Self { init, transitions })
    }

    /// Re-fetch the current page and swap every eligible selector.
    pub(crate) fn reload<S: AsRef<str>>(self: &Rc<Self>, selectors: &[S]) {
        let plan = plan_reload(&LiveDocument, selectors);
        for selector in &plan.ineligible {
            console::warn!(format!(
                "{selector} is not marked {RELOAD_ATTRIBUTE}; skipping reload"
            ));
        }
        if !plan.needs_fetch() {
            return;
        }
        let url = window().location().href().unwrap_or_default();
        let this = Rc::clone(self);
        spawn_local(async move {
            let response = match http::fetch_page(&url, None).await {
                Ok(response) => response,
                Err(err) => {
                    console::error!(format!("reload of {url} failed: {err:#}"));
                    return;
                }
            };
            let Some(parsed) = parse_html(&response.body) else {
                return;
            };
            for selector in plan.eligible {
                let incoming = parsed.query_selector(&selector).ok().flatten();
                match (query(&selector), incoming) {
                    (Some(live), Some(incoming)) => {
                        this.swap(live, incoming.inner_html(), selector);
                    }
                    _ => console::warn!(format!("{selector} missing after reload")),
                }
            }
        });
    }

    fn swap(self: &Rc<Self>, live: Element, html: String, selector: String) {
        if !self.transitions {
            live.set_inner_html(&html);
            self.init.publish(&InitScope::Region(selector));
            return;
        }
        let pending = Rc::new(RefCell::new(Some((html, selector))));
        let apply: Rc<dyn Fn()> = {
            let (this, live, pending) = (Rc::clone(self), live.clone(), Rc::clone(&pending));
            Rc::new(move || {
                let Some((html, selector)) = pending.borrow_mut().take() else {
                    return;
                };
                live.set_inner_html(&html);
                set_class(&live, FADE_CLASS, false);
                this.init.publish(&InitScope::Region(selector));
            })
        };
        set_class(&live, FADE_CLASS, true);
        let on_end = Rc::clone(&apply);
        let target = live.clone();
        EventListener::new(&live, "transitionend", move |event| {
            let own = event
                .target()
                .and_then(|origin| origin.dyn_into::<Node>().ok())
                .is_some_and(|origin| target.is_same_node(Some(&origin)));
            if own {
                on_end();
            }
        })
        .forget();
        Timeout::new(FADE_FALLBACK_MS, move || apply()).forget();
    }
}
