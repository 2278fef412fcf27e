//! Partial page navigation ("ajaxify").
//!
//! # Design
//! - One navigation at a time: a new request aborts the previous one through its
//!   `AbortController`, and the ticket check drops any completion that raced the abort.
//! - Responses are installed by swapping the configured regions; when none are present
//!   the whole document is replaced.
//! - Every installed response ends with an [`InitScope::Page`] signal.

use crate::app::dom::{attributes, parse_html, query, show_message};
use crate::core::config::AppConfig;
use crate::core::headers::{ResponseAction, ResponseDirectives};
use crate::core::nav::{
    ClickContext, LinkTarget, NavTicket, NavigationSession, PopStateGate, classify_link,
    failure_body, should_intercept,
};
use crate::core::regions::{SwapPlan, attribute_patch, plan_swap};
use crate::core::signals::{InitScope, SignalHub};
use crate::services::http::{self, PageResponse};
use gloo::console;
use gloo::events::{EventListener, EventListenerOptions};
use gloo::utils::{document, window};
use gloo_timers::callback::Timeout;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{AbortController, AbortSignal, Document, HtmlFormElement, MouseEvent};

/// Link-click and history driven navigation controller.
pub(crate) struct Navigator {
    config: Rc<AppConfig>,
    init: Rc<SignalHub<InitScope>>,
    session: RefCell<NavigationSession>,
    controller: RefCell<Option<AbortController>>,
    popstate: Rc<RefCell<PopStateGate>>,
    history: bool,
}

fn current_href() -> String {
    window().location().href().unwrap_or_default()
}

impl Navigator {
    pub(crate) fn new(
        config: Rc<AppConfig>,
        init: Rc<SignalHub<InitScope>>,
        history: bool,
    ) -> Rc<Self> {
        Rc::new(Self {
            config,
            init,
            session: RefCell::new(NavigationSession::new(current_href())),
            controller: RefCell::new(None),
            popstate: Rc::new(RefCell::new(PopStateGate::default())),
            history,
        })
    }

    /// Install the click and history listeners. Without the history API links keep
    /// their default full-page behaviour.
    pub(crate) fn install(self: &Rc<Self>) {
        if !self.history {
            console::warn!("history API unavailable; using full page loads");
            return;
        }
        let this = Rc::clone(self);
        EventListener::new_with_options(
            &document(),
            "click",
            EventListenerOptions::enable_prevent_default(),
            move |event| this.on_click(event),
        )
        .forget();

        let this = Rc::clone(self);
        EventListener::new(&window(), "popstate", move |_| {
            if this.popstate.borrow().accepts() {
                this.navigate(current_href(), false);
            }
        })
        .forget();

        let gate = Rc::clone(&self.popstate);
        Timeout::new(0, move || gate.borrow_mut().arm()).forget();
    }

    fn on_click(self: &Rc<Self>, event: &web_sys::Event) {
        if event.default_prevented() {
            return;
        }
        let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        let Some(anchor) = crate::app::dom::event_closest(event, "a[href]") else {
            return;
        };
        let click = ClickContext {
            button: mouse.button(),
            modified: mouse.ctrl_key() || mouse.meta_key() || mouse.shift_key() || mouse.alt_key(),
            target: anchor.get_attribute("target"),
            download: anchor.has_attribute("download"),
            opted_out: anchor.get_attribute("data-ajaxify").as_deref() == Some("false"),
            href: anchor.get_attribute("href"),
        };
        let page = current_href();
        if !should_intercept(&click, &page) {
            return;
        }
        let href = click.href.unwrap_or_default();
        match classify_link(&page, &href) {
            Ok(LinkTarget::InApp(url)) => {
                event.prevent_default();
                self.navigate(url, true);
            }
            Ok(LinkTarget::External(url)) => {
                event.prevent_default();
                if let Err(err) = window().open_with_url_and_target(&url, "_blank") {
                    console::error!(format!("cannot open {url}: {err:?}"));
                }
            }
            Err(err) => console::warn!(err.to_string()),
        }
    }

    /// Fetch `url` and install it; `push` adds a history entry.
    pub(crate) fn navigate(self: &Rc<Self>, url: String, push: bool) {
        if !self.history {
            let _ = window().location().set_href(&url);
            return;
        }
        let (ticket, signal) = self.begin_request();
        let this = Rc::clone(self);
        spawn_local(async move {
            let result = http::fetch_page(&url, signal.as_ref()).await;
            if this.is_stale(ticket, signal.as_ref()) {
                return;
            }
            match result {
                Ok(response) => this.handle_response(Some(ticket), &url, response, push),
                Err(err) => {
                    console::error!(format!("navigation to {url} failed: {err:#}"));
                    let _ = window().location().set_href(&url);
                }
            }
        });
    }

    /// POST a `form[data-ajaxify]` and handle the response like a navigation.
    pub(crate) fn submit(self: &Rc<Self>, form: HtmlFormElement) {
        let (ticket, signal) = self.begin_request();
        let this = Rc::clone(self);
        spawn_local(async move {
            let result = http::submit_form(&form, signal.as_ref()).await;
            if this.is_stale(ticket, signal.as_ref()) {
                return;
            }
            match result {
                Ok(response) => {
                    let url = response.url.clone();
                    this.handle_response(Some(ticket), &url, response, false);
                }
                Err(err) => console::error!(format!("form submission failed: {err:#}")),
            }
        });
    }

    /// Take a fresh ticket and abort whatever request it supersedes.
    fn begin_request(&self) -> (NavTicket, Option<AbortSignal>) {
        let start = self.session.borrow_mut().begin();
        if start.superseded.is_some() {
            if let Some(previous) = self.controller.borrow_mut().take() {
                previous.abort();
            }
        }
        let controller = AbortController::new().ok();
        let signal = controller.as_ref().map(AbortController::signal);
        *self.controller.borrow_mut() = controller;
        (start.ticket, signal)
    }

    fn is_stale(&self, ticket: NavTicket, signal: Option<&AbortSignal>) -> bool {
        signal.is_some_and(AbortSignal::aborted) || !self.session.borrow().is_current(ticket)
    }

    /// Apply steering headers; returns `true` when the body should still be rendered.
    pub(crate) fn follow_directives(self: &Rc<Self>, directives: &ResponseDirectives) -> bool {
        if let Some(message) = &directives.message {
            show_message(message, self.config.message_timeout_ms);
        }
        match directives.action(self.config.authenticated) {
            ResponseAction::HardReload(url) => {
                let _ = window().location().set_href(&url);
                false
            }
            ResponseAction::SoftNavigate(url) => {
                let resolved = classify_link(&current_href(), &url).map_or(url, |target| {
                    match target {
                        LinkTarget::InApp(url) | LinkTarget::External(url) => url,
                    }
                });
                self.navigate(resolved, true);
                false
            }
            ResponseAction::Render => true,
        }
    }

    fn handle_response(
        self: &Rc<Self>,
        ticket: Option<NavTicket>,
        requested: &str,
        response: PageResponse,
        push: bool,
    ) {
        if !self.follow_directives(&response.directives) {
            return;
        }
        let url = if response.url.is_empty() {
            requested.to_string()
        } else {
            response.url.clone()
        };
        if let Some(ticket) = ticket {
            if !self.session.borrow_mut().complete(ticket, &url) {
                return;
            }
        }
        let body = if response.ok {
            response.body
        } else {
            failure_body(response.content_type.as_deref(), &response.body)
        };
        self.replace_regions(&body);
        if push {
            if let Ok(history) = window().history() {
                if let Err(err) = history.push_state_with_url(&JsValue::NULL, "", Some(&url)) {
                    console::warn!(format!("history push failed: {err:?}"));
                }
            }
        }
        window().scroll_to_with_x_and_y(0.0, 0.0);
        self.init.publish(&InitScope::Page);
    }

    /// Install `html` into the tracked regions, or the whole document when none match.
    pub(crate) fn replace_regions(&self, html: &str) {
        let Some(parsed) = parse_html(html) else {
            return;
        };
        let plan = plan_swap(&self.config.regions, |selector| {
            parsed.query_selector(selector).ok().flatten().is_some()
        });
        match plan {
            SwapPlan::Regions(selectors) => {
                for selector in selectors {
                    swap_region(&parsed, &selector);
                }
                self.update_title(&parsed);
            }
            SwapPlan::WholeDocument => {
                if let Some(root) = document().document_element() {
                    root.set_inner_html(html);
                }
            }
        }
    }

    fn update_title(&self, parsed: &Document) {
        let title = parsed
            .query_selector(&self.config.title_selector)
            .ok()
            .flatten()
            .and_then(|element| element.text_content());
        if let Some(title) = title {
            document().set_title(title.trim());
        }
    }
}

fn swap_region(parsed: &Document, selector: &str) {
    let (Some(live), Some(incoming)) = (
        query(selector),
        parsed.query_selector(selector).ok().flatten(),
    ) else {
        return;
    };
    for (name, value) in attribute_patch(&attributes(&live), &attributes(&incoming)) {
        let _ = live.set_attribute(&name, &value);
    }
    live.set_inner_html(&incoming.inner_html());
}
