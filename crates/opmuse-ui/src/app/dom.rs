//! Small DOM helpers shared by controllers.

use crate::core::headers::FlashMessage;
use gloo::console;
use gloo_timers::callback::Timeout;
use gloo::utils::document;
use wasm_bindgen::JsCast;
use web_sys::{Document, DomParser, Element, Event, SupportedType};

const MESSAGES_ID: &str = "messages";

/// Every element matching `selector` in the document.
pub(crate) fn query_all(selector: &str) -> Vec<Element> {
    query_all_in(&document(), selector)
}

/// Every element matching `selector` under `root` (a document or element).
pub(crate) fn query_all_in(root: &web_sys::Node, selector: &str) -> Vec<Element> {
    let list = if let Some(element) = root.dyn_ref::<Element>() {
        element.query_selector_all(selector)
    } else if let Some(doc) = root.dyn_ref::<Document>() {
        doc.query_selector_all(selector)
    } else {
        return Vec::new();
    };
    let Ok(list) = list else {
        console::warn!(format!("invalid selector `{selector}`"));
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|index| list.item(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

/// Elements matching `selector` inside the scope of an init signal.
pub(crate) fn query_scoped(scope: Option<&str>, selector: &str) -> Vec<Element> {
    match scope.and_then(|scope| document().query_selector(scope).ok().flatten()) {
        Some(root) => {
            let mut found = Vec::new();
            if root.matches(selector).unwrap_or(false) {
                found.push(root.clone());
            }
            found.extend(query_all_in(&root, selector));
            found
        }
        None => query_all(selector),
    }
}

/// First element matching `selector`.
pub(crate) fn query(selector: &str) -> Option<Element> {
    document().query_selector(selector).ok().flatten()
}

/// Closest ancestor-or-self of the event target matching `selector`.
pub(crate) fn event_closest(event: &Event, selector: &str) -> Option<Element> {
    event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .and_then(|element| element.closest(selector).ok().flatten())
}

/// Parse an HTML string into a detached document.
pub(crate) fn parse_html(html: &str) -> Option<Document> {
    DomParser::new()
        .and_then(|parser| parser.parse_from_string(html, SupportedType::TextHtml))
        .map_err(|err| console::error!(format!("cannot parse response: {err:?}")))
        .ok()
}

/// `(name, value)` pairs of an element's attributes.
pub(crate) fn attributes(element: &Element) -> Vec<(String, String)> {
    let map = element.attributes();
    (0..map.length())
        .filter_map(|index| map.item(index))
        .map(|attr| (attr.name(), attr.value()))
        .collect()
}

/// Toggle a class, ignoring DOM errors.
pub(crate) fn set_class(element: &Element, class: &str, on: bool) {
    let _ = element.class_list().toggle_with_force(class, on);
}

/// Show a transient notification in `#messages` for `timeout_ms`.
pub(crate) fn show_message(message: &FlashMessage, timeout_ms: u32) {
    let doc = document();
    let Some(container) = doc.get_element_by_id(MESSAGES_ID) else {
        console::log!(format!("message: {}", message.text));
        return;
    };
    let Ok(alert) = doc.create_element("div") else {
        return;
    };
    let _ = alert.set_attribute("class", &format!("alert {}", message.kind.css_class()));
    let _ = alert.set_attribute("role", "alert");
    alert.set_text_content(Some(&message.text));
    if container.append_child(&alert).is_err() {
        return;
    }
    Timeout::new(timeout_ms, move || alert.remove()).forget();
}
