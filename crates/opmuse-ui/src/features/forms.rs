//! Ajax form submission and the edit lock switch.

use crate::app::App;
use crate::app::dom::event_closest;
use crate::features::{After, delegate, post_then};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys::{HtmlFormElement, HtmlInputElement};

pub(crate) fn install(app: &Rc<App>) {
    let submit_app = Rc::clone(app);
    delegate("submit", move |event| {
        let Some(form) = event_closest(event, "form[data-ajaxify]")
            .and_then(|form| form.dyn_into::<HtmlFormElement>().ok())
        else {
            return;
        };
        if form.get_attribute("data-ajaxify").as_deref() == Some("false") {
            return;
        }
        event.prevent_default();
        submit_app.navigator.submit(form);
    });

    let app = Rc::clone(app);
    delegate("change", move |event| {
        let Some(input) = event_closest(event, "input[data-edit-lock]")
            .and_then(|input| input.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        let Some(url) = input.get_attribute("data-url") else {
            return;
        };
        let name = input.name();
        let name = if name.is_empty() { "locked".to_string() } else { name };
        let body = format!(
            "{}={}",
            urlencoding::encode(&name),
            if input.checked() { "true" } else { "false" }
        );
        post_then(&app, url, body, After::Revisit);
    });
}
