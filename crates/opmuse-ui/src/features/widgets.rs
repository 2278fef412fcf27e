//! Native replacements for tooltip, popover, tab, collapse, dropdown and modal widgets.
//!
//! Popovers open on click, or on hover when the trigger carries `data-trigger="hover"`.
//!
//! # Design
//! - One delegated listener per event type handles every widget, so swapped markup
//!   works without rebinding.
//! - Per-element preparation (moving `title` out of the way of native tooltips) runs on
//!   every init signal, scoped to the swapped region.

use crate::app::App;
use crate::app::dom::{event_closest, query, query_all, query_all_in, query_scoped, set_class};
use crate::features::delegate;
use gloo::utils::{body, document};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys::{Element, MouseEvent, Node};

const TOOLTIP_ID: &str = "widget-tooltip";
const POPOVER_CLASS: &str = "popover";
const HOVER_POPOVER: &str = "[data-toggle=\"popover\"][data-trigger=\"hover\"]";

pub(crate) fn install(app: &Rc<App>) {
    app.init.subscribe(|scope| {
        for element in query_scoped(scope.selector(), "[data-toggle=\"tooltip\"][title]") {
            if let Some(title) = element.get_attribute("title") {
                let _ = element.set_attribute("data-original-title", &title);
                let _ = element.remove_attribute("title");
            }
        }
    });

    delegate("mouseover", |event| {
        if let Some(trigger) = event_closest(event, "[data-toggle=\"tooltip\"]") {
            show_tooltip(&trigger);
        }
        if let Some(trigger) = event_closest(event, HOVER_POPOVER) {
            if open_popover(&trigger).is_none() {
                let _ = show_popover(&trigger);
            }
        }
    });
    delegate("mouseout", |event| {
        if event_closest(event, "[data-toggle=\"tooltip\"]").is_some() {
            if let Some(tooltip) = document().get_element_by_id(TOOLTIP_ID) {
                tooltip.remove();
            }
        }
        if let Some(trigger) = event_closest(event, HOVER_POPOVER) {
            let inside = event
                .dyn_ref::<MouseEvent>()
                .and_then(MouseEvent::related_target)
                .and_then(|related| related.dyn_into::<Node>().ok())
                .is_some_and(|related| trigger.contains(Some(&related)));
            if !inside {
                if let Some(popover) = open_popover(&trigger) {
                    popover.remove();
                }
            }
        }
    });

    delegate("click", |event| {
        if let Some(trigger) = event_closest(event, "[data-toggle]") {
            let handled = match trigger.get_attribute("data-toggle").as_deref() {
                Some("popover") if !trigger.matches(HOVER_POPOVER).unwrap_or(false) => {
                    toggle_popover(&trigger)
                }
                Some("tab") => show_tab(&trigger),
                Some("collapse") => toggle_target(&trigger, "in"),
                Some("dropdown") => toggle_dropdown(&trigger),
                Some("modal") => target_of(&trigger).is_some_and(|modal| {
                    set_modal(&modal, true);
                    true
                }),
                _ => false,
            };
            if handled {
                event.prevent_default();
            }
            return;
        }
        if let Some(dismiss) = event_closest(event, "[data-dismiss=\"modal\"]") {
            if let Ok(Some(modal)) = dismiss.closest(".modal") {
                set_modal(&modal, false);
            }
            event.prevent_default();
            return;
        }
        close_dropdowns(None);
    });
}

fn target_of(trigger: &Element) -> Option<Element> {
    let selector = trigger
        .get_attribute("data-target")
        .or_else(|| trigger.get_attribute("href"))?;
    if selector.is_empty() || selector == "#" {
        return None;
    }
    query(&selector)
}

fn show_tooltip(trigger: &Element) {
    let Some(text) = trigger
        .get_attribute("data-original-title")
        .or_else(|| trigger.get_attribute("title"))
    else {
        return;
    };
    let doc = document();
    let tooltip = match doc.get_element_by_id(TOOLTIP_ID) {
        Some(existing) => existing,
        None => {
            let Ok(created) = doc.create_element("div") else {
                return;
            };
            created.set_id(TOOLTIP_ID);
            created.set_class_name("tooltip in");
            if body().append_child(&created).is_err() {
                return;
            }
            created
        }
    };
    tooltip.set_text_content(Some(&text));
    let rect = trigger.get_bounding_client_rect();
    let window = gloo::utils::window();
    let top = rect.bottom() + window.scroll_y().unwrap_or(0.0);
    let left = rect.left() + window.scroll_x().unwrap_or(0.0);
    let _ = tooltip.set_attribute(
        "style",
        &format!("position: absolute; top: {top}px; left: {left}px"),
    );
}

/// The popover currently shown for `trigger`, if any.
fn open_popover(trigger: &Element) -> Option<Element> {
    trigger
        .next_element_sibling()
        .filter(|next| next.class_list().contains(POPOVER_CLASS))
}

fn toggle_popover(trigger: &Element) -> bool {
    if let Some(popover) = open_popover(trigger) {
        popover.remove();
        return true;
    }
    show_popover(trigger)
}

fn show_popover(trigger: &Element) -> bool {
    let Ok(popover) = document().create_element("div") else {
        return false;
    };
    popover.set_class_name("popover in");
    let content = trigger.get_attribute("data-content").unwrap_or_default();
    if trigger.get_attribute("data-html").as_deref() == Some("true") {
        popover.set_inner_html(&content);
    } else {
        popover.set_text_content(Some(&content));
    }
    trigger.after_with_node_1(&popover).is_ok()
}

fn show_tab(trigger: &Element) -> bool {
    let Some(pane) = target_of(trigger) else {
        return false;
    };
    if let Ok(Some(nav)) = trigger.closest(".nav") {
        for active in query_all_in(&nav, ".active") {
            set_class(&active, "active", false);
        }
    }
    let tab = trigger
        .closest("li")
        .ok()
        .flatten()
        .unwrap_or_else(|| trigger.clone());
    set_class(&tab, "active", true);
    if let Some(parent) = pane.parent_element() {
        let children = parent.children();
        for index in 0..children.length() {
            if let Some(sibling) = children.item(index) {
                set_class(&sibling, "active", false);
            }
        }
    }
    set_class(&pane, "active", true);
    true
}

fn toggle_target(trigger: &Element, class: &str) -> bool {
    let Some(target) = target_of(trigger) else {
        return false;
    };
    let on = !target.class_list().contains(class);
    set_class(&target, class, on);
    set_class(trigger, "collapsed", !on);
    true
}

fn toggle_dropdown(trigger: &Element) -> bool {
    let Some(group) = trigger
        .closest(".dropdown, .btn-group")
        .ok()
        .flatten()
        .or_else(|| trigger.parent_element())
    else {
        return false;
    };
    let open = !group.class_list().contains("open");
    close_dropdowns(Some(&group));
    set_class(&group, "open", open);
    true
}

fn close_dropdowns(except: Option<&Element>) {
    for group in query_all(".dropdown.open, .btn-group.open") {
        if except.is_some_and(|keep| keep.is_same_node(Some(&group))) {
            continue;
        }
        set_class(&group, "open", false);
    }
}

fn set_modal(modal: &Element, open: bool) {
    set_class(modal, "in", open);
    let style = if open { "display: block" } else { "display: none" };
    let _ = modal.set_attribute("style", style);
    set_class(&body(), "modal-open", open);
}
