//! Multipart uploads over `XMLHttpRequest`, which unlike `fetch` reports send progress.

use crate::core::headers::ResponseDirectives;
use gloo::events::EventListener;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{FormData, ProgressEvent, XmlHttpRequest};

/// Completed upload request.
#[derive(Debug)]
pub(crate) struct UploadOutcome {
    /// Transport succeeded and the status was 2xx.
    pub(crate) ok: bool,
    /// Response body (rendered tracks on success, an error page otherwise).
    pub(crate) body: String,
    /// Decoded steering headers.
    pub(crate) directives: ResponseDirectives,
}

/// In-flight upload; dropping it detaches the listeners.
pub(crate) struct UploadRequest {
    _xhr: XmlHttpRequest,
    _listeners: Vec<EventListener>,
}

type DoneSlot = Rc<RefCell<Option<Box<dyn FnOnce(UploadOutcome)>>>>;

fn finish(slot: &DoneSlot, xhr: &XmlHttpRequest, transport_ok: bool) {
    let Some(done) = slot.borrow_mut().take() else {
        return;
    };
    let status = xhr.status().unwrap_or(0);
    let body = xhr.response_text().ok().flatten().unwrap_or_default();
    let directives =
        ResponseDirectives::from_lookup(|name| xhr.get_response_header(name).ok().flatten());
    done(UploadOutcome {
        ok: transport_ok && (200..300).contains(&status),
        body,
        directives,
    });
}

/// POST `form` to `url`; `on_progress` receives bytes sent, `on_done` fires exactly once.
pub(crate) fn send(
    url: &str,
    form: &FormData,
    on_progress: impl Fn(f64) + 'static,
    on_done: impl FnOnce(UploadOutcome) + 'static,
) -> anyhow::Result<UploadRequest> {
    let js = |err: JsValue| anyhow::anyhow!("upload request failed: {err:?}");
    let xhr = XmlHttpRequest::new().map_err(js)?;
    xhr.open("POST", url).map_err(js)?;
    xhr.set_request_header("X-Requested-With", "XMLHttpRequest")
        .map_err(js)?;
    let done: Box<dyn FnOnce(UploadOutcome)> = Box::new(on_done);
    let slot: DoneSlot = Rc::new(RefCell::new(Some(done)));

    let upload = xhr.upload().map_err(js)?;
    let progress = EventListener::new(&upload, "progress", move |event| {
        if let Some(event) = event.dyn_ref::<ProgressEvent>() {
            on_progress(event.loaded());
        }
    });
    let load = {
        let (slot, target) = (Rc::clone(&slot), xhr.clone());
        EventListener::new(&xhr, "load", move |_| finish(&slot, &target, true))
    };
    let error = {
        let (slot, target) = (Rc::clone(&slot), xhr.clone());
        EventListener::new(&xhr, "error", move |_| finish(&slot, &target, false))
    };

    xhr.send_with_opt_form_data(Some(form)).map_err(js)?;
    Ok(UploadRequest {
        _xhr: xhr,
        _listeners: vec![progress, load, error],
    })
}
