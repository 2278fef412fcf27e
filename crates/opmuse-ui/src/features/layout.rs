//! Persisted layout toggles (side panel, off-screen navigation).

use crate::app::App;
use crate::app::dom::{event_closest, set_class};
use crate::core::prefs::{LAYOUT_TOGGLES, layout_toggle};
use crate::core::signals::InitScope;
use crate::features::delegate;
use gloo::console;
use gloo::utils::body;
use std::rc::Rc;

pub(crate) fn install(app: &Rc<App>) {
    let prefs_app = Rc::clone(app);
    app.init.subscribe(move |scope| {
        if *scope == InitScope::Page {
            for toggle in LAYOUT_TOGGLES {
                set_class(&body(), toggle.class, prefs_app.prefs.get_bool(toggle.key, false));
            }
        }
    });

    let app = Rc::clone(app);
    delegate("click", move |event| {
        let Some(trigger) = event_closest(event, "[data-layout-toggle]") else {
            return;
        };
        let name = trigger.get_attribute("data-layout-toggle").unwrap_or_default();
        let Some(toggle) = layout_toggle(&name) else {
            console::warn!(format!("unknown layout toggle `{name}`"));
            return;
        };
        event.prevent_default();
        let on = !body().class_list().contains(toggle.class);
        set_class(&body(), toggle.class, on);
        if let Err(err) = app.prefs.set(toggle.key, on) {
            console::warn!(err.to_string());
        }
    });
}
