//! Torrent search, import and mark-done actions.

use crate::app::App;
use crate::app::dom::{event_closest, query};
use crate::core::search::{torrent_done_path, torrent_import_path, torrent_search_path};
use crate::core::signals::InitScope;
use crate::features::{After, delegate, post_then};
use crate::services::http;
use gloo::console;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;

const RESULTS_SELECTOR: &str = "#torrent-results";
const LIST_SELECTOR: &str = "#torrents";

pub(crate) fn install(app: &Rc<App>) {
    let search_app = Rc::clone(app);
    delegate("submit", move |event| {
        let Some(form) = event_closest(event, "form#torrent-search") else {
            return;
        };
        event.prevent_default();
        let value = form
            .query_selector("input[name=query]")
            .ok()
            .flatten()
            .and_then(|input| input.dyn_into::<HtmlInputElement>().ok())
            .map(|input| input.value())
            .unwrap_or_default();
        let app = Rc::clone(&search_app);
        spawn_local(async move {
            let path = torrent_search_path(&value);
            match http::fetch_page(&path, None).await {
                Ok(response) => {
                    if !app.navigator.follow_directives(&response.directives) {
                        return;
                    }
                    if let Some(results) = query(RESULTS_SELECTOR) {
                        results.set_inner_html(&response.body);
                        app.init
                            .publish(&InitScope::Region(RESULTS_SELECTOR.to_string()));
                    }
                }
                Err(err) => console::error!(format!("torrent search failed: {err:#}")),
            }
        });
    });

    let app = Rc::clone(app);
    delegate("click", move |event| {
        let Some(trigger) = event_closest(event, "[data-torrent-import], [data-torrent-done]")
        else {
            return;
        };
        event.prevent_default();
        let url = if let Some(id) = trigger.get_attribute("data-torrent-import") {
            torrent_import_path(&id)
        } else {
            torrent_done_path(&trigger.get_attribute("data-torrent-done").unwrap_or_default())
        };
        post_then(
            &app,
            url,
            String::new(),
            After::Reload(vec![LIST_SELECTOR.to_string()]),
        );
    });
}
