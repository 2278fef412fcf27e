//! Event bus client: socket ownership, listener dispatch and reconnects.
//!
//! # Design
//! - Connection decisions come from [`BusLifecycle`]; this module only executes the
//!   effects it returns (timers, the `#bus-status` indicator, local signals).
//! - Listeners live in the client, not the socket, so they survive reconnects.
//! - Socket callbacks hold a weak reference to the client.

use crate::app::dom::query;
use crate::core::bus::{
    BUS_PATH, BusEffect, BusLifecycle, BusMessage, ListenerRegistry, ReconnectPolicy, bus_url,
};
use crate::core::config::AppConfig;
use crate::core::signals::{BusStatus, SignalHub};
use crate::services::socket::{Socket, SocketEvent};
use gloo::console;
use gloo::events::EventListener;
use gloo::utils::window;
use gloo_timers::callback::Timeout;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

const STATUS_SELECTOR: &str = "#bus-status";

/// Persistent push connection to the server.
pub(crate) struct BusClient {
    url: String,
    watchdog_ms: u32,
    lifecycle: RefCell<BusLifecycle>,
    socket: RefCell<Option<Socket>>,
    listeners: RefCell<ListenerRegistry>,
    status: SignalHub<BusStatus>,
    attempt: Cell<u32>,
}

impl BusClient {
    /// Connect when the session is authenticated and WebSocket is available.
    pub(crate) fn start(config: &AppConfig, websocket: bool) -> Option<Rc<Self>> {
        if !config.authenticated {
            return None;
        }
        if !websocket {
            console::warn!("WebSocket unavailable; live updates disabled");
            return None;
        }
        let page = window().location().href().ok()?;
        let url = match bus_url(&page, config.ws_port) {
            Ok(url) => url,
            Err(err) => {
                console::error!(format!("cannot derive {BUS_PATH} endpoint: {err}"));
                return None;
            }
        };
        let policy = ReconnectPolicy {
            base_ms: config.reconnect_delay_ms,
            max_ms: config.reconnect_max_delay_ms,
        };
        let client = Rc::new(Self {
            url,
            watchdog_ms: config.connect_watchdog_ms,
            lifecycle: RefCell::new(BusLifecycle::new(policy)),
            socket: RefCell::new(None),
            listeners: RefCell::new(ListenerRegistry::default()),
            status: SignalHub::default(),
            attempt: Cell::new(0),
        });
        let weak = Rc::downgrade(&client);
        EventListener::new(&window(), "beforeunload", move |_| {
            if let Some(client) = weak.upgrade() {
                client.shutdown();
            }
        })
        .forget();
        client.connect();
        Some(client)
    }

    /// Register `callback` for each of `names`.
    pub(crate) fn on<I, S>(&self, names: I, callback: impl Fn(&[Value]) + 'static)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listeners.borrow_mut().on(names, callback);
    }

    /// Observe local open/closed notifications.
    pub(crate) fn on_status(&self, listener: impl Fn(&BusStatus) + 'static) {
        self.status.subscribe(listener);
    }

    /// Send `{event, args}`; dropped with a warning while disconnected.
    pub(crate) fn emit(&self, event: &str, args: Vec<Value>) {
        let socket = self.socket.borrow();
        let Some(socket) = socket.as_ref().filter(|socket| socket.is_open()) else {
            console::warn!(format!("bus not open; dropping {event}"));
            return;
        };
        if let Err(err) = socket.send(&BusMessage::new(event, args).encode()) {
            console::error!(format!("{err:#}"));
        }
    }

    fn connect(self: &Rc<Self>) {
        if self.lifecycle.borrow().is_shut_down() {
            return;
        }
        self.lifecycle.borrow_mut().connecting();
        let attempt = self.attempt.get().wrapping_add(1);
        self.attempt.set(attempt);
        let weak: Weak<Self> = Rc::downgrade(self);
        let socket = Socket::connect(&self.url, move |event| {
            if let Some(client) = weak.upgrade() {
                client.handle(event);
            }
        });
        match socket {
            Ok(socket) => {
                *self.socket.borrow_mut() = Some(socket);
                self.arm_watchdog(attempt, 0);
            }
            Err(err) => {
                console::error!(format!("{err:#}"));
                let effects = self.lifecycle.borrow_mut().closed();
                self.apply(effects);
            }
        }
    }

    /// Timers are never cancelled; callbacks of an older attempt bail out instead.
    fn arm_watchdog(self: &Rc<Self>, attempt: u32, tick: u32) {
        let delay = self.watchdog_ms.saturating_mul(1 << tick.min(8));
        let weak = Rc::downgrade(self);
        Timeout::new(delay, move || {
            let Some(client) = weak.upgrade() else {
                return;
            };
            if client.attempt.get() != attempt {
                return;
            }
            let effect = client.lifecycle.borrow_mut().watchdog_tick();
            if let Some(effect) = effect {
                client.apply(vec![effect]);
            }
            if client.lifecycle.borrow().watchdog_active() {
                client.arm_watchdog(attempt, tick + 1);
            }
        })
        .forget();
    }

    fn handle(self: &Rc<Self>, event: SocketEvent) {
        let effects = match event {
            SocketEvent::Open => self.lifecycle.borrow_mut().opened(),
            SocketEvent::Message(raw) => {
                self.dispatch(&raw);
                return;
            }
            SocketEvent::Error => self.lifecycle.borrow_mut().errored(),
            SocketEvent::Close => self.lifecycle.borrow_mut().closed(),
        };
        self.apply(effects);
    }

    fn dispatch(&self, raw: &str) {
        let message = match BusMessage::decode(raw) {
            Ok(message) => message,
            Err(err) => {
                console::warn!(err.to_string());
                return;
            }
        };
        let listeners = self.listeners.borrow().listeners_for(&message.event);
        for listener in listeners {
            listener(&message.args);
        }
    }

    fn apply(self: &Rc<Self>, effects: Vec<BusEffect>) {
        for effect in effects {
            match effect {
                BusEffect::ClearError => show_status(None),
                BusEffect::ShowError(fault) => show_status(Some(fault.message())),
                BusEffect::LogStillConnecting => console::log!("event bus still connecting"),
                BusEffect::AnnounceOpen => self.status.publish(&BusStatus::Open),
                BusEffect::AnnounceClosed => self.status.publish(&BusStatus::Closed),
                BusEffect::ScheduleReconnect { delay_ms } => {
                    let weak = Rc::downgrade(self);
                    Timeout::new(delay_ms, move || {
                        if let Some(client) = weak.upgrade() {
                            client.connect();
                        }
                    })
                    .forget();
                }
            }
        }
    }

    /// Close intentionally; the close that follows does not reconnect.
    pub(crate) fn shutdown(&self) {
        self.lifecycle.borrow_mut().shutdown();
        if let Some(socket) = self.socket.borrow().as_ref() {
            socket.close();
        }
    }
}

fn show_status(message: Option<&str>) {
    let Some(indicator) = query(STATUS_SELECTOR) else {
        if let Some(message) = message {
            console::error!(message);
        }
        return;
    };
    match message {
        Some(message) => {
            indicator.set_text_content(Some(message));
            let _ = indicator.remove_attribute("hidden");
        }
        None => {
            indicator.set_text_content(None);
            let _ = indicator.set_attribute("hidden", "");
        }
    }
}
