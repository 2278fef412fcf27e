//! Live updates pushed over the bus plus the actions that trigger them (love button,
//! remote metadata refresh, cover removal).

use crate::app::App;
use crate::app::dom::{event_closest, query_all};
use crate::core::live::{LIVE_EVENTS, LiveAction, refreshed_image_url, route};
use crate::features::{After, delegate, nonce, post_then};
use std::rc::Rc;

pub(crate) fn install(app: &Rc<App>) {
    if let Some(bus) = &app.bus {
        let live_app = Rc::clone(app);
        for event in LIVE_EVENTS {
            let live_app = Rc::clone(&live_app);
            bus.on([event], move |args| match route(event, args) {
                Some(LiveAction::Reload(selectors)) => live_app.reloader.reload(&selectors),
                Some(LiveAction::RefreshImages(selector)) => refresh_images(&selector),
                None => {}
            });
        }
    }

    let app = Rc::clone(app);
    delegate("click", move |event| {
        let Some(trigger) =
            event_closest(event, "[data-love-url], [data-remotes-refresh], [data-cover-remove]")
        else {
            return;
        };
        event.prevent_default();
        if let Some(url) = trigger.get_attribute("data-love-url") {
            post_then(&app, url, String::new(), After::Nothing);
        } else if let Some(url) = trigger.get_attribute("data-remotes-refresh") {
            post_then(&app, url, String::new(), After::Nothing);
        } else if let Some(url) = trigger.get_attribute("data-cover-remove") {
            let after = trigger
                .get_attribute("data-cover-target")
                .map_or(After::Nothing, After::RefreshImages);
            post_then(&app, url, String::new(), after);
        }
    });
}

/// Re-request every image matching `selector`.
pub(crate) fn refresh_images(selector: &str) {
    let stamp = nonce();
    for image in query_all(selector) {
        if let Some(src) = image.get_attribute("src") {
            let _ = image.set_attribute("src", &refreshed_image_url(&src, stamp));
        }
    }
}
