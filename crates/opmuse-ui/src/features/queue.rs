//! Queue & player controller.
//!
//! # Design
//! - The audio element is created once and never attached to swapped regions, so
//!   playback survives navigation.
//! - Bus events and transport clicks go through [`QueuePlayer`]; this module executes
//!   its effects and renders [`PlayerView`] into whatever player markup is present.
//! - Reordering posts the full id order; the server answers with `queue.update`.

use crate::app::App;
use crate::app::dom::{event_closest, query, query_all, set_class};
use crate::core::player::{
    PLAYER_EVENTS, PlayerEffect, PlayerEvent, PlayerView, QUEUE_CLEAR_PATH, QUEUE_COVER_PATH,
    QUEUE_LIST_PATH, QUEUE_OPEN_EVENT, QUEUE_SHUFFLE_PATH, QUEUE_UPDATE_PATH, QueuePlayer,
    STREAM_PATH, queue_order_body,
};
use crate::core::signals::{BusStatus, InitScope};
use crate::features::{After, delegate, nonce, post_then};
use crate::services::http;
use gloo::console;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{DragEvent, Element, HtmlAudioElement};

const LIST_SELECTOR: &str = "#queue-list";
const ITEM_SELECTOR: &str = "#queue [data-queue-id]";
const ACTION_SELECTOR: &str = "[data-queue-action]";

struct QueueController {
    app: Rc<App>,
    player: RefCell<QueuePlayer>,
    audio: Option<HtmlAudioElement>,
    dragged: RefCell<Option<Element>>,
}

pub(crate) fn install(app: &Rc<App>) {
    let audio = HtmlAudioElement::new()
        .map_err(|err| console::error!(format!("audio unavailable: {err:?}")))
        .ok();
    let controller = Rc::new(QueueController {
        app: Rc::clone(app),
        player: RefCell::new(QueuePlayer::new(STREAM_PATH)),
        audio,
        dragged: RefCell::new(None),
    });

    if let Some(bus) = &app.bus {
        let on_event = Rc::clone(&controller);
        for event in PLAYER_EVENTS {
            let on_event = Rc::clone(&on_event);
            bus.on([event], move |args| {
                if let Some(parsed) = PlayerEvent::from_bus(event, args) {
                    on_event.apply(parsed);
                }
            });
        }
        let weak_bus = Rc::downgrade(bus);
        bus.on_status(move |status| {
            if *status == BusStatus::Open {
                if let Some(bus) = weak_bus.upgrade() {
                    bus.emit(QUEUE_OPEN_EVENT, Vec::new());
                }
            }
        });
    }

    let render = Rc::clone(&controller);
    app.init.subscribe(move |scope| {
        for item in query_all(ITEM_SELECTOR) {
            let _ = item.set_attribute("draggable", "true");
        }
        if *scope == InitScope::Page {
            render.render();
        }
    });

    let clicks = Rc::clone(&controller);
    delegate("click", move |event| {
        let Some(button) = event_closest(event, ACTION_SELECTOR) else {
            return;
        };
        event.prevent_default();
        if button.has_attribute("disabled") {
            return;
        }
        match button.get_attribute("data-queue-action").as_deref() {
            Some("play") => clicks.apply(PlayerEvent::PlayPressed),
            Some("pause") => clicks.apply(PlayerEvent::PausePressed),
            Some("clear") => post_then(
                &clicks.app,
                QUEUE_CLEAR_PATH.to_string(),
                String::new(),
                After::Nothing,
            ),
            Some("shuffle") => post_then(
                &clicks.app,
                QUEUE_SHUFFLE_PATH.to_string(),
                String::new(),
                After::Nothing,
            ),
            other => console::warn!(format!("unknown queue action {other:?}")),
        }
    });

    install_drag_and_drop(&controller);
}

impl QueueController {
    fn apply(&self, event: PlayerEvent) {
        let refresh_cover = matches!(event, PlayerEvent::Start(_));
        let effects = self.player.borrow_mut().apply(event, nonce());
        for effect in effects {
            match effect {
                PlayerEffect::LoadSource(url) => self.load(&url),
                PlayerEffect::UnloadSource => self.unload(),
                PlayerEffect::RefreshQueue => self.refresh_list(),
            }
        }
        if refresh_cover {
            if let Some(cover) = query("#queue-cover") {
                let _ = cover.set_attribute("src", &format!("{QUEUE_COVER_PATH}?{}", nonce()));
            }
        }
        self.render();
    }

    fn load(&self, url: &str) {
        let Some(audio) = &self.audio else {
            return;
        };
        audio.set_src(url);
        match audio.play() {
            Ok(promise) => spawn_local(async move {
                if let Err(err) = JsFuture::from(promise).await {
                    console::warn!(format!("playback refused: {err:?}"));
                }
            }),
            Err(err) => console::error!(format!("playback failed: {err:?}")),
        }
    }

    fn unload(&self) {
        let Some(audio) = &self.audio else {
            return;
        };
        let _ = audio.pause();
        let _ = audio.remove_attribute("src");
        audio.load();
    }

    fn refresh_list(&self) {
        let app = Rc::clone(&self.app);
        spawn_local(async move {
            match http::fetch_page(QUEUE_LIST_PATH, None).await {
                Ok(response) if response.ok => {
                    if let Some(list) = query(LIST_SELECTOR) {
                        list.set_inner_html(&response.body);
                        app.init.publish(&InitScope::Region(LIST_SELECTOR.to_string()));
                    }
                }
                Ok(response) => console::warn!(format!("queue list answered {}", response.status)),
                Err(err) => console::error!(format!("{err:#}")),
            }
        });
    }

    fn render(&self) {
        let view = self.player.borrow().view();
        render_view(&view);
    }
}

fn set_hidden(selector: &str, hidden: bool) {
    if let Some(element) = query(selector) {
        if hidden {
            let _ = element.set_attribute("hidden", "");
        } else {
            let _ = element.remove_attribute("hidden");
        }
    }
}

fn set_text(selector: &str, text: &str) {
    if let Some(element) = query(selector) {
        element.set_text_content(Some(text));
    }
}

fn set_width(selector: &str, fraction: f64) {
    if let Some(element) = query(selector) {
        let _ = element.set_attribute("style", &format!("width: {:.2}%", fraction * 100.0));
    }
}

fn render_view(view: &PlayerView) {
    set_hidden("#queue-play", !view.play_visible);
    set_hidden("#queue-pause", !view.pause_visible);
    for button in query_all(ACTION_SELECTOR) {
        if view.controls_enabled {
            let _ = button.remove_attribute("disabled");
        } else {
            let _ = button.set_attribute("disabled", "");
        }
    }
    set_text("#queue-title", view.title.as_deref().unwrap_or_default());
    set_text("#queue-elapsed", &view.elapsed_label);
    set_text("#queue-duration", &view.duration_label);
    set_width("#queue-progress-played", view.played_fraction);
    set_width("#queue-progress-buffered", view.buffered_fraction);
}

fn install_drag_and_drop(controller: &Rc<QueueController>) {
    let start = Rc::clone(controller);
    delegate("dragstart", move |event| {
        let Some(item) = event_closest(event, ITEM_SELECTOR) else {
            return;
        };
        if let Some(transfer) = event.dyn_ref::<DragEvent>().and_then(DragEvent::data_transfer) {
            let id = item.get_attribute("data-queue-id").unwrap_or_default();
            let _ = transfer.set_data("text/plain", &id);
        }
        set_class(&item, "dragging", true);
        *start.dragged.borrow_mut() = Some(item);
    });

    let over = Rc::clone(controller);
    delegate("dragover", move |event| {
        let Some(target) = event_closest(event, ITEM_SELECTOR) else {
            return;
        };
        let dragged = over.dragged.borrow();
        let Some(dragged) = dragged.as_ref() else {
            return;
        };
        event.prevent_default();
        if dragged.is_same_node(Some(&target)) {
            return;
        }
        if let Some(parent) = target.parent_node() {
            let _ = parent.insert_before(dragged, Some(&target));
        }
    });

    let dropped = Rc::clone(controller);
    delegate("drop", move |event| {
        if dropped.dragged.borrow().is_none() || event_closest(event, "#queue").is_none() {
            return;
        }
        event.prevent_default();
        let ids: Vec<String> = query_all(ITEM_SELECTOR)
            .iter()
            .filter_map(|item| item.get_attribute("data-queue-id"))
            .collect();
        post_then(
            &dropped.app,
            QUEUE_UPDATE_PATH.to_string(),
            queue_order_body(&ids),
            After::Nothing,
        );
    });

    let end = Rc::clone(controller);
    delegate("dragend", move |_| {
        if let Some(item) = end.dragged.borrow_mut().take() {
            set_class(&item, "dragging", false);
        }
    });
}
