//! Search box, typeahead suggestions and client-side list filtering.

use crate::app::App;
use crate::app::dom::{event_closest, query, query_all_in};
use crate::core::search::{
    Suggestion, TYPEAHEAD_DEBOUNCE_MS, TypeaheadKind, filter_matches, search_path, typeahead_path,
};
use crate::features::delegate;
use crate::services::http;
use gloo::console;
use gloo::utils::{document, window};
use gloo_timers::callback::Timeout;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlInputElement};

const RESULTS_CLASS: &str = "typeahead-results";

pub(crate) fn install(app: &Rc<App>) {
    let nav_app = Rc::clone(app);
    delegate("submit", move |event| {
        let Some(form) = event_closest(event, "form#search") else {
            return;
        };
        let Some(input) = form
            .query_selector("input[name=query]")
            .ok()
            .flatten()
            .and_then(|input| input.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        event.prevent_default();
        let value = input.value();
        if value.trim().is_empty() {
            return;
        }
        let origin = window().location().origin().unwrap_or_default();
        nav_app
            .navigator
            .navigate(format!("{origin}{}", search_path(&value)), true);
    });

    let pending: Rc<RefCell<Option<Timeout>>> = Rc::new(RefCell::new(None));
    delegate("input", move |event| {
        let Some(input) = event_closest(event, "input[data-typeahead], input[data-filter-target]")
            .and_then(|input| input.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        if let Some(target) = input.get_attribute("data-filter-target") {
            apply_filter(&target, &input.value());
        }
        let Some(kind) = input
            .get_attribute("data-typeahead")
            .and_then(|raw| TypeaheadKind::parse(&raw))
        else {
            return;
        };
        let timer = Timeout::new(TYPEAHEAD_DEBOUNCE_MS, move || lookup(input, kind));
        *pending.borrow_mut() = Some(timer);
    });
}

fn apply_filter(target: &str, filter: &str) {
    let Some(container) = query(target) else {
        return;
    };
    for item in query_all_in(&container, "[data-filter-text]") {
        let text = item.get_attribute("data-filter-text").unwrap_or_default();
        if filter_matches(&text, filter) {
            let _ = item.remove_attribute("hidden");
        } else {
            let _ = item.set_attribute("hidden", "");
        }
    }
}

fn lookup(input: HtmlInputElement, kind: TypeaheadKind) {
    let Some(path) = typeahead_path(kind, &input.value()) else {
        if let Some(list) = results_list(&input) {
            list.set_inner_html("");
        }
        return;
    };
    spawn_local(async move {
        match http::get_json::<Vec<Suggestion>>(&path).await {
            Ok(suggestions) => render(&input, &suggestions),
            Err(err) => console::warn!(format!("typeahead failed: {err:#}")),
        }
    });
}

fn results_list(input: &HtmlInputElement) -> Option<Element> {
    if let Some(next) = input.next_element_sibling() {
        if next.class_list().contains(RESULTS_CLASS) {
            return Some(next);
        }
    }
    let list = document().create_element("ul").ok()?;
    list.set_class_name(RESULTS_CLASS);
    input.after_with_node_1(&list).ok()?;
    Some(list)
}

fn render(input: &HtmlInputElement, suggestions: &[Suggestion]) {
    let Some(list) = results_list(input) else {
        return;
    };
    list.set_inner_html("");
    let doc = document();
    for suggestion in suggestions {
        let (Ok(item), Ok(link)) = (doc.create_element("li"), doc.create_element("a")) else {
            return;
        };
        let _ = link.set_attribute("href", &suggestion.url);
        link.set_text_content(Some(&suggestion.name));
        if item.append_child(&link).is_ok() {
            let _ = list.append_child(&item);
        }
    }
}
