//! WebSocket transport for the event bus.

use gloo::events::EventListener;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, WebSocket};

/// Transport notifications.
#[derive(Debug)]
pub(crate) enum SocketEvent {
    Open,
    Message(String),
    Error,
    Close,
}

/// One connection attempt; dropping it detaches the listeners.
pub(crate) struct Socket {
    ws: WebSocket,
    _listeners: Vec<EventListener>,
}

impl Socket {
    pub(crate) fn connect(url: &str, on_event: impl Fn(SocketEvent) + 'static) -> anyhow::Result<Self> {
        let ws = WebSocket::new(url)
            .map_err(|err| anyhow::anyhow!("cannot open socket to {url}: {err:?}"))?;
        let on_event: Rc<dyn Fn(SocketEvent)> = Rc::new(on_event);
        let listen = |name: &'static str, map: fn(&web_sys::Event) -> Option<SocketEvent>| {
            let on_event = Rc::clone(&on_event);
            EventListener::new(&ws, name, move |event| {
                if let Some(event) = map(event) {
                    on_event(event);
                }
            })
        };
        let listeners = vec![
            listen("open", |_| Some(SocketEvent::Open)),
            listen("message", |event| {
                event
                    .dyn_ref::<MessageEvent>()
                    .and_then(|message| message.data().as_string())
                    .map(SocketEvent::Message)
            }),
            listen("error", |_| Some(SocketEvent::Error)),
            listen("close", |_| Some(SocketEvent::Close)),
        ];
        Ok(Self {
            ws,
            _listeners: listeners,
        })
    }

    pub(crate) fn is_open(&self) -> bool {
        self.ws.ready_state() == WebSocket::OPEN
    }

    pub(crate) fn send(&self, text: &str) -> anyhow::Result<()> {
        self.ws
            .send_with_str(text)
            .map_err(|err| anyhow::anyhow!("socket send failed: {err:?}"))
    }

    pub(crate) fn close(&self) {
        let _ = self.ws.close();
    }
}
