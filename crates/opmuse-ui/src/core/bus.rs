//! Event bus protocol, listener registry and connection lifecycle.
//!
//! # Design
//! - Frames are JSON `{event, args}` in both directions.
//! - Listeners accumulate per event name and survive reconnects; dispatch is in
//!   registration order and unknown names are ignored.
//! - [`BusLifecycle`] is a pure state machine: the wasm client feeds it socket events
//!   and timer ticks and executes the returned [`BusEffect`]s.

use crate::core::error::{UiError, UiResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

/// Path of the push endpoint.
pub const BUS_PATH: &str = "/ws";
/// Watchdog ticks before a pending connect is reported to the user.
pub const WATCHDOG_ERROR_TICK: u32 = 3;

/// One frame on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Event name, e.g. `queue.start`.
    pub event: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl BusMessage {
    /// Build an outbound frame.
    #[must_use]
    pub fn new(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }

    /// Serialize for sending.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"event":{},"args":[]}}"#, Value::String(self.event.clone()))
        })
    }

    /// Parse an inbound frame.
    ///
    /// # Errors
    /// Returns [`UiError::BusMessage`] when the payload is not an `{event, args}` object.
    pub fn decode(raw: &str) -> UiResult<Self> {
        serde_json::from_str(raw).map_err(|source| UiError::BusMessage { source })
    }
}

/// Derive the push endpoint from the page URL.
///
/// The scheme is `wss` exactly when the page was served over `https`; `port_override`
/// replaces the page port when given.
///
/// # Errors
/// Returns [`UiError::Url`] when the page URL cannot be parsed.
pub fn bus_url(page_url: &str, port_override: Option<u16>) -> UiResult<String> {
    let page = Url::parse(page_url).map_err(|source| UiError::Url {
        url: page_url.to_string(),
        source,
    })?;
    let scheme = if page.scheme() == "https" { "wss" } else { "ws" };
    let host = page.host_str().unwrap_or("localhost");
    let port = port_override.or_else(|| page.port());
    Ok(match port {
        Some(port) => format!("{scheme}://{host}:{port}{BUS_PATH}"),
        None => format!("{scheme}://{host}{BUS_PATH}"),
    })
}

type BusListener = Rc<dyn Fn(&[Value])>;

/// Event name to ordered listener list.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Vec<BusListener>>,
}

impl ListenerRegistry {
    /// Register `callback` under every name in `names`.
    pub fn on<I, S>(&mut self, names: I, callback: impl Fn(&[Value]) + 'static)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let callback: BusListener = Rc::new(callback);
        for name in names {
            self.listeners
                .entry(name.into())
                .or_default()
                .push(Rc::clone(&callback));
        }
    }

    /// Listeners registered for `event`, in registration order.
    #[must_use]
    pub fn listeners_for(&self, event: &str) -> Vec<BusListener> {
        self.listeners.get(event).cloned().unwrap_or_default()
    }

    /// Invoke every listener of `message.event`; returns how many ran.
    #[must_use]
    pub fn dispatch(&self, message: &BusMessage) -> usize {
        let listeners = self.listeners_for(&message.event);
        for listener in &listeners {
            listener(&message.args);
        }
        listeners.len()
    }
}

/// Socket state for the current attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake pending.
    Connecting,
    /// Messages flow.
    Open,
    /// Socket closed; a reconnect may be scheduled.
    Closed,
}

/// User-visible connectivity problems.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusFault {
    /// The handshake never completed.
    ConnectTimeout,
    /// An open connection dropped.
    LostConnection,
    /// The transport reported an error.
    Transport,
}

impl BusFault {
    /// Text shown in the connectivity indicator.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConnectTimeout => "Unable to connect to the server.",
            Self::LostConnection => "Lost connection to the server, reconnecting.",
            Self::Transport => "Connection error.",
        }
    }
}

/// Side effects requested by [`BusLifecycle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusEffect {
    /// Hide the connectivity indicator.
    ClearError,
    /// Publish the local "open" signal.
    AnnounceOpen,
    /// Publish the local "closed" signal.
    AnnounceClosed,
    /// Log that the handshake is slow.
    LogStillConnecting,
    /// Show the connectivity indicator.
    ShowError(BusFault),
    /// Open a new socket after `delay_ms`.
    ScheduleReconnect {
        /// Delay before reconnecting.
        delay_ms: u32,
    },
}

/// Delay between reconnect attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay of the first reconnect after a drop.
    pub base_ms: u32,
    /// Upper bound for doubled delays.
    pub max_ms: u32,
}

impl ReconnectPolicy {
    /// Delay for the `failures`-th consecutive failed attempt (0 = first reconnect).
    #[must_use]
    pub fn delay_ms(self, failures: u32) -> u32 {
        let factor = 2u32.saturating_pow(failures.min(16));
        self.base_ms.saturating_mul(factor).min(self.max_ms.max(self.base_ms))
    }
}

/// Connection state machine of the event bus client.
#[derive(Debug)]
pub struct BusLifecycle {
    state: ConnectionState,
    policy: ReconnectPolicy,
    failures: u32,
    watchdog_ticks: u32,
    reconnect_pending: bool,
    suppress_reconnect: bool,
}

impl BusLifecycle {
    /// Lifecycle positioned at the first connect attempt.
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            policy,
            failures: 0,
            watchdog_ticks: 0,
            reconnect_pending: false,
            suppress_reconnect: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether an intentional shutdown suppressed reconnects.
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        self.suppress_reconnect
    }

    /// A new socket is being opened (initial connect or scheduled reconnect).
    pub const fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
        self.watchdog_ticks = 0;
        self.reconnect_pending = false;
    }

    /// Handshake completed.
    pub fn opened(&mut self) -> Vec<BusEffect> {
        self.state = ConnectionState::Open;
        self.failures = 0;
        self.watchdog_ticks = 0;
        vec![BusEffect::ClearError, BusEffect::AnnounceOpen]
    }

    /// Watchdog fired; `None` once the connection left `Connecting`.
    pub fn watchdog_tick(&mut self) -> Option<BusEffect> {
        if self.state != ConnectionState::Connecting {
            return None;
        }
        self.watchdog_ticks = self.watchdog_ticks.saturating_add(1);
        match self.watchdog_ticks {
            WATCHDOG_ERROR_TICK => Some(BusEffect::ShowError(BusFault::ConnectTimeout)),
            tick if tick < WATCHDOG_ERROR_TICK => Some(BusEffect::LogStillConnecting),
            _ => None,
        }
    }

    /// Whether the watchdog should be polled again.
    #[must_use]
    pub const fn watchdog_active(&self) -> bool {
        matches!(self.state, ConnectionState::Connecting) && self.watchdog_ticks < WATCHDOG_ERROR_TICK
    }

    /// Transport error; reconnecting is left to the close that follows.
    pub fn errored(&mut self) -> Vec<BusEffect> {
        if self.suppress_reconnect {
            return Vec::new();
        }
        vec![BusEffect::ShowError(BusFault::Transport)]
    }

    /// Socket closed.
    pub fn closed(&mut self) -> Vec<BusEffect> {
        let was_open = self.state == ConnectionState::Open;
        self.state = ConnectionState::Closed;
        if self.suppress_reconnect {
            return vec![BusEffect::AnnounceClosed];
        }
        let mut effects = vec![BusEffect::AnnounceClosed];
        if was_open {
            effects.push(BusEffect::ShowError(BusFault::LostConnection));
        } else {
            self.failures = self.failures.saturating_add(1);
        }
        if !self.reconnect_pending {
            self.reconnect_pending = true;
            let delay_ms = self.policy.delay_ms(self.failures);
            effects.push(BusEffect::ScheduleReconnect { delay_ms });
        }
        effects
    }

    /// Intentional teardown (tab unloading): later closes must not reconnect.
    pub const fn shutdown(&mut self) {
        self.suppress_reconnect = true;
        self.reconnect_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    const POLICY: ReconnectPolicy = ReconnectPolicy {
        base_ms: 5_000,
        max_ms: 30_000,
    };

    #[test]
    fn messages_use_event_args_shape() -> UiResult<()> {
        let message = BusMessage::new("queue.open", vec![json!(1)]);
        assert_eq!(message.encode(), r#"{"event":"queue.open","args":[1]}"#);
        let decoded = BusMessage::decode(r#"{"event":"queue.reset"}"#)?;
        assert!(decoded.args.is_empty());
        assert!(matches!(
            BusMessage::decode("[1,2]"),
            Err(UiError::BusMessage { .. })
        ));
        Ok(())
    }

    #[test]
    fn bus_url_follows_page_scheme_and_port() -> UiResult<()> {
        assert_eq!(
            bus_url("https://music.example/library", None)?,
            "wss://music.example/ws"
        );
        assert_eq!(
            bus_url("http://127.0.0.1:8080/", Some(8081))?,
            "ws://127.0.0.1:8081/ws"
        );
        assert_eq!(bus_url("http://box:8080/", None)?, "ws://box:8080/ws");
        Ok(())
    }

    #[test]
    fn listeners_accumulate_and_run_in_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ListenerRegistry::default();
        for tag in ["first", "second"] {
            let calls = Rc::clone(&calls);
            registry.on(["queue.start"], move |args: &[Value]| {
                calls.borrow_mut().push((tag, args.to_vec()));
            });
        }
        let message = BusMessage::new("queue.start", vec![json!({"title": "x"}), json!("agent")]);
        assert_eq!(registry.dispatch(&message), 2);
        let calls = calls.borrow();
        assert_eq!(calls[0].0, "first");
        assert_eq!(calls[1].0, "second");
        assert_eq!(calls[1].1, message.args);
    }

    #[test]
    fn one_callback_can_serve_many_names() {
        let count = Rc::new(RefCell::new(0));
        let mut registry = ListenerRegistry::default();
        {
            let count = Rc::clone(&count);
            registry.on(["queue.reset", "queue.next.none"], move |_: &[Value]| {
                *count.borrow_mut() += 1;
            });
        }
        assert_eq!(registry.dispatch(&BusMessage::new("queue.reset", vec![])), 1);
        assert_eq!(registry.dispatch(&BusMessage::new("queue.next.none", vec![])), 1);
        assert_eq!(registry.dispatch(&BusMessage::new("unknown.event", vec![])), 0);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn open_clears_error_and_announces() {
        let mut lifecycle = BusLifecycle::new(POLICY);
        assert_eq!(
            lifecycle.opened(),
            vec![BusEffect::ClearError, BusEffect::AnnounceOpen]
        );
        assert_eq!(lifecycle.state(), ConnectionState::Open);
    }

    #[test]
    fn watchdog_escalates_then_stops() {
        let mut lifecycle = BusLifecycle::new(POLICY);
        assert_eq!(lifecycle.watchdog_tick(), Some(BusEffect::LogStillConnecting));
        assert_eq!(lifecycle.watchdog_tick(), Some(BusEffect::LogStillConnecting));
        assert!(lifecycle.watchdog_active());
        assert_eq!(
            lifecycle.watchdog_tick(),
            Some(BusEffect::ShowError(BusFault::ConnectTimeout))
        );
        assert!(!lifecycle.watchdog_active());
        assert_eq!(lifecycle.watchdog_tick(), None);
    }

    #[test]
    fn watchdog_is_silent_once_open() {
        let mut lifecycle = BusLifecycle::new(POLICY);
        lifecycle.opened();
        assert_eq!(lifecycle.watchdog_tick(), None);
    }

    #[test]
    fn unexpected_close_reports_and_schedules_one_reconnect() {
        let mut lifecycle = BusLifecycle::new(POLICY);
        lifecycle.opened();
        assert_eq!(
            lifecycle.closed(),
            vec![
                BusEffect::AnnounceClosed,
                BusEffect::ShowError(BusFault::LostConnection),
                BusEffect::ScheduleReconnect { delay_ms: 5_000 }
            ]
        );
        assert_eq!(lifecycle.closed(), vec![BusEffect::AnnounceClosed]);
    }

    #[test]
    fn failed_attempts_back_off_until_open() {
        let mut lifecycle = BusLifecycle::new(POLICY);
        lifecycle.opened();
        let mut delays = Vec::new();
        let mut record = |effects: Vec<BusEffect>| {
            for effect in effects {
                if let BusEffect::ScheduleReconnect { delay_ms } = effect {
                    delays.push(delay_ms);
                }
            }
        };
        record(lifecycle.closed());
        for _ in 0..4 {
            lifecycle.connecting();
            record(lifecycle.closed());
        }
        assert_eq!(delays, vec![5_000, 10_000, 20_000, 30_000, 30_000]);
        lifecycle.connecting();
        lifecycle.opened();
        let effects = lifecycle.closed();
        assert!(effects.contains(&BusEffect::ScheduleReconnect { delay_ms: 5_000 }));
    }

    #[test]
    fn shutdown_suppresses_reconnect_and_errors() {
        let mut lifecycle = BusLifecycle::new(POLICY);
        lifecycle.opened();
        lifecycle.shutdown();
        assert!(lifecycle.errored().is_empty());
        assert_eq!(lifecycle.closed(), vec![BusEffect::AnnounceClosed]);
        assert!(lifecycle.is_shut_down());
    }

    #[test]
    fn transport_error_does_not_reconnect_by_itself() {
        let mut lifecycle = BusLifecycle::new(POLICY);
        assert_eq!(
            lifecycle.errored(),
            vec![BusEffect::ShowError(BusFault::Transport)]
        );
    }
}
