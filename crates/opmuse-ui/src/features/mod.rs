//! Feature controllers bound to server-rendered markup.
//!
//! Every controller installs document-level delegated listeners once and, where an
//! element needs preparation, subscribes to the init signal.

use crate::app::App;
use crate::services::http;
use gloo::console;
use gloo::events::{EventListener, EventListenerOptions};
use gloo::utils::{document, window};
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use web_sys::Event;

mod forms;
mod layout;
mod live;
mod queue;
mod search;
mod torrents;
mod upload;
mod widgets;

/// Install every feature controller.
pub(crate) fn install(app: &Rc<App>) {
    widgets::install(app);
    layout::install(app);
    forms::install(app);
    search::install(app);
    torrents::install(app);
    live::install(app);
    queue::install(app);
    upload::install(app);
}

/// Delegated document listener that may cancel the default action.
pub(crate) fn delegate(event_type: &'static str, handler: impl FnMut(&Event) + 'static) {
    EventListener::new_with_options(
        &document(),
        event_type,
        EventListenerOptions::enable_prevent_default(),
        handler,
    )
    .forget();
}

/// Random cache-busting value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn nonce() -> u32 {
    (js_sys::Math::random() * f64::from(u32::MAX)) as u32
}

/// What to refresh after a successful POST.
pub(crate) enum After {
    /// Nothing; a bus event will follow.
    Nothing,
    /// Partially reload these regions.
    Reload(Vec<String>),
    /// Re-request the images matching a selector.
    RefreshImages(String),
    /// Re-navigate to the current page without a history entry.
    Revisit,
}

/// POST an urlencoded `body`, apply the response headers, then refresh.
pub(crate) fn post_then(app: &Rc<App>, url: String, body: String, after: After) {
    let app = Rc::clone(app);
    spawn_local(async move {
        let response = match http::post_urlencoded(&url, body).await {
            Ok(response) => response,
            Err(err) => {
                console::error!(format!("{err:#}"));
                return;
            }
        };
        if !app.navigator.follow_directives(&response.directives) {
            return;
        }
        if !response.ok {
            console::warn!(format!("POST {url} answered {}", response.status));
        }
        match after {
            After::Nothing => {}
            After::Reload(selectors) => app.reloader.reload(&selectors),
            After::RefreshImages(selector) => live::refresh_images(&selector),
            After::Revisit => {
                let href = window().location().href().unwrap_or_default();
                app.navigator.navigate(href, false);
            }
        }
    });
}
