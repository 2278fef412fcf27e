//! Batch upload controller.
//!
//! # Design
//! - Selecting files renders one row per file with its classification; sidecars get an
//!   editable association field pre-filled with the best audio match.
//! - Starting the batch opens a server session, then [`UploadPool`] keeps at most
//!   `uploadConcurrency` requests in flight.
//! - Callbacks carry the session id so a replaced batch ignores late completions.

use crate::app::App;
use crate::app::dom::{event_closest, query, query_all, set_class};
use crate::core::nav::escape_html;
use crate::core::signals::InitScope;
use crate::core::upload::{
    BatchEntry, FileKind, ProgressTracker, UPLOAD_PATH, UPLOAD_START_PATH, UploadPool,
    failure_popover, plan_batch, suggestions,
};
use crate::features::{delegate, nonce};
use crate::services::http;
use crate::services::upload::{self, UploadOutcome, UploadRequest};
use gloo::console;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{File, FormData, HtmlInputElement};

const FILES_SELECTOR: &str = "#upload-files";
const RESULTS_SELECTOR: &str = "#upload-results";
const PROGRESS_SELECTOR: &str = "#upload-progress";
const AUDIO_LIST_ID: &str = "upload-audio-names";

struct Batch {
    session: u32,
    files: Vec<File>,
    audio_names: Vec<String>,
    pool: UploadPool,
    progress: ProgressTracker,
    requests: Vec<UploadRequest>,
    started: bool,
}

struct UploadController {
    app: Rc<App>,
    batch: RefCell<Option<Batch>>,
}

pub(crate) fn install(app: &Rc<App>) {
    let controller = Rc::new(UploadController {
        app: Rc::clone(app),
        batch: RefCell::new(None),
    });

    let select = Rc::clone(&controller);
    delegate("change", move |event| {
        let Some(input) = event_closest(event, "input[type=file][data-upload]")
            .and_then(|input| input.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        let Some(list) = input.files() else {
            return;
        };
        let files: Vec<File> = (0..list.length()).filter_map(|index| list.get(index)).collect();
        select.prepare(files);
    });

    let clicks = Rc::clone(&controller);
    delegate("click", move |event| {
        if let Some(button) = event_closest(event, "[data-upload-remove]") {
            event.prevent_default();
            let row = button.closest("[data-upload-row]").ok().flatten();
            if let Some(row) = row {
                clicks.remove(&row);
            }
        } else if event_closest(event, "[data-upload-start]").is_some() {
            event.prevent_default();
            clicks.start();
        }
    });

    let typing = Rc::clone(&controller);
    delegate("input", move |event| {
        let Some(field) = event_closest(event, "input[data-upload-associate]")
            .and_then(|field| field.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        if let Some(batch) = typing.batch.borrow().as_ref() {
            render_suggestions(&suggestions(&field.value(), &batch.audio_names));
        }
    });
}

fn row_selector(id: usize) -> String {
    format!("[data-upload-row=\"{id}\"]")
}

fn kind_label(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Archive => "archive",
        FileKind::Audio => "audio",
        FileKind::Sidecar => "other",
    }
}

fn row_html(id: usize, entry: &BatchEntry) -> String {
    let associate = if entry.kind == FileKind::Sidecar {
        format!(
            "<input type=\"text\" data-upload-associate list=\"{AUDIO_LIST_ID}\" value=\"{}\">",
            escape_html(entry.associate.as_deref().unwrap_or_default())
        )
    } else {
        String::new()
    };
    format!(
        "<li class=\"upload-file upload-{kind}\" data-upload-row=\"{id}\">\
         <span class=\"name\">{name}</span> <span class=\"kind\">{kind}</span>{associate}\
         <button type=\"button\" data-upload-remove>&times;</button></li>",
        kind = kind_label(entry.kind),
        name = escape_html(&entry.name),
    )
}

fn render_suggestions(names: &[&str]) {
    let Some(list) = query(&format!("#{AUDIO_LIST_ID}")) else {
        return;
    };
    let options: String = names
        .iter()
        .map(|name| format!("<option value=\"{}\">", escape_html(name)))
        .collect();
    list.set_inner_html(&options);
}

impl UploadController {
    fn prepare(&self, files: Vec<File>) {
        let described: Vec<(String, String)> =
            files.iter().map(|file| (file.name(), file.type_())).collect();
        let entries = plan_batch(&described);
        let audio_names: Vec<String> = entries
            .iter()
            .filter(|entry| entry.kind == FileKind::Audio)
            .map(|entry| entry.name.clone())
            .collect();
        if let Some(container) = query(FILES_SELECTOR) {
            let mut html: String = entries
                .iter()
                .enumerate()
                .map(|(id, entry)| row_html(id, entry))
                .collect();
            html.push_str(&format!("<datalist id=\"{AUDIO_LIST_ID}\"></datalist>"));
            container.set_inner_html(&html);
        }
        let names: Vec<&str> = audio_names.iter().map(String::as_str).collect();
        render_suggestions(&names);
        set_progress(0.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sizes = files.iter().map(|file| file.size() as u64).collect();
        *self.batch.borrow_mut() = Some(Batch {
            session: nonce(),
            pool: UploadPool::new(files.len(), self.app.config.upload_concurrency),
            progress: ProgressTracker::new(sizes),
            files,
            audio_names,
            requests: Vec::new(),
            started: false,
        });
    }

    fn remove(&self, row: &web_sys::Element) {
        let Some(id) = row
            .get_attribute("data-upload-row")
            .and_then(|raw| raw.parse::<usize>().ok())
        else {
            return;
        };
        let mut batch = self.batch.borrow_mut();
        let Some(batch) = batch.as_mut() else {
            return;
        };
        match batch.pool.remove(id) {
            Ok(()) => {
                batch.progress.forget(id);
                row.remove();
            }
            Err(err) => console::warn!(err.to_string()),
        }
    }

    fn start(self: &Rc<Self>) {
        let session = {
            let mut batch = self.batch.borrow_mut();
            let Some(batch) = batch.as_mut().filter(|batch| !batch.started) else {
                return;
            };
            batch.started = true;
            batch.session
        };
        for button in query_all("[data-upload-start]") {
            let _ = button.set_attribute("disabled", "");
        }
        let this = Rc::clone(self);
        spawn_local(async move {
            let body = format!("session={session}");
            match http::post_urlencoded(UPLOAD_START_PATH, body).await {
                Ok(response) if response.ok => {}
                Ok(response) => {
                    console::error!(format!("upload session refused: {}", response.status));
                    this.app.navigator.follow_directives(&response.directives);
                    this.reset_start(session);
                    return;
                }
                Err(err) => {
                    console::error!(format!("{err:#}"));
                    this.reset_start(session);
                    return;
                }
            }
            let (ids, complete) = match this.batch.borrow_mut().as_mut() {
                Some(batch) if batch.session == session => {
                    (batch.pool.start(), batch.pool.is_complete())
                }
                _ => return,
            };
            if complete {
                console::log!(format!("upload session {session} complete"));
                enable_start_buttons();
                return;
            }
            for id in ids {
                this.send(session, id);
            }
        });
    }

    /// Lets a batch whose session could not be opened be started again.
    fn reset_start(&self, session: u32) {
        if let Some(batch) = self
            .batch
            .borrow_mut()
            .as_mut()
            .filter(|batch| batch.session == session)
        {
            batch.started = false;
        }
        enable_start_buttons();
    }

    fn send(self: &Rc<Self>, session: u32, id: usize) {
        let Some(file) = self
            .batch
            .borrow()
            .as_ref()
            .filter(|batch| batch.session == session)
            .and_then(|batch| batch.files.get(id).cloned())
        else {
            return;
        };
        let associate = query(&row_selector(id))
            .and_then(|row| row.query_selector("input[data-upload-associate]").ok().flatten())
            .and_then(|field| field.dyn_into::<HtmlInputElement>().ok())
            .map(|field| field.value())
            .unwrap_or_default();
        let form = match build_form(&file, session, &associate) {
            Ok(form) => form,
            Err(err) => {
                console::error!(format!("{err:#}"));
                self.finished(session, id, None);
                return;
            }
        };

        let progress = Rc::clone(self);
        let done = Rc::clone(self);
        let request = upload::send(
            UPLOAD_PATH,
            &form,
            move |loaded| progress.progressed(session, id, loaded),
            move |outcome| done.finished(session, id, Some(outcome)),
        );
        match request {
            Ok(request) => {
                if let Some(batch) = self.batch.borrow_mut().as_mut() {
                    batch.requests.push(request);
                }
            }
            Err(err) => {
                console::error!(format!("{err:#}"));
                self.finished(session, id, None);
            }
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn progressed(&self, session: u32, id: usize, loaded: f64) {
        let fraction = match self.batch.borrow_mut().as_mut() {
            Some(batch) if batch.session == session => batch.progress.update(id, loaded as u64),
            _ => return,
        };
        set_progress(fraction);
    }

    fn finished(self: &Rc<Self>, session: u32, id: usize, outcome: Option<UploadOutcome>) {
        let row = query(&row_selector(id));
        match &outcome {
            Some(outcome) if outcome.ok => {
                if let Some(results) = query(RESULTS_SELECTOR) {
                    let _ = results.insert_adjacent_html("beforeend", &outcome.body);
                }
                if let Some(row) = &row {
                    row.remove();
                }
            }
            failed => {
                if let Some(row) = &row {
                    set_class(row, "danger", true);
                    let detail = failed.as_ref().map(|outcome| outcome.body.as_str());
                    for (name, value) in failure_popover(detail) {
                        let _ = row.set_attribute(name, &value);
                    }
                }
            }
        }
        if let Some(outcome) = &outcome {
            self.app.navigator.follow_directives(&outcome.directives);
        }

        let (next, complete, fraction) = {
            let mut batch = self.batch.borrow_mut();
            let Some(batch) = batch.as_mut().filter(|batch| batch.session == session) else {
                return;
            };
            let fraction = batch.progress.complete(id);
            let next = match batch.pool.finish(id) {
                Ok(next) => next,
                Err(err) => {
                    console::warn!(err.to_string());
                    None
                }
            };
            (next, batch.pool.is_complete(), fraction)
        };
        set_progress(fraction);
        if let Some(next) = next {
            self.send(session, next);
        }
        if complete {
            console::log!(format!("upload session {session} complete"));
            enable_start_buttons();
        }
        self.app
            .init
            .publish(&InitScope::Region(RESULTS_SELECTOR.to_string()));
    }
}

fn enable_start_buttons() {
    for button in query_all("[data-upload-start]") {
        let _ = button.remove_attribute("disabled");
    }
}

fn build_form(file: &File, session: u32, associate: &str) -> anyhow::Result<FormData> {
    let js = |err: wasm_bindgen::JsValue| anyhow::anyhow!("cannot build upload form: {err:?}");
    let form = FormData::new().map_err(js)?;
    form.append_with_blob_and_filename("file", file, &file.name())
        .map_err(js)?;
    form.append_with_str("session", &session.to_string())
        .map_err(js)?;
    form.append_with_str("associate", associate).map_err(js)?;
    Ok(form)
}

fn set_progress(fraction: f64) {
    if let Some(bar) = query(PROGRESS_SELECTOR) {
        let _ = bar.set_attribute("style", &format!("width: {:.1}%", fraction * 100.0));
    }
}
