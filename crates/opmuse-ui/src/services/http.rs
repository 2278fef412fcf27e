//! Fetch helpers for server-rendered HTML and small JSON APIs.
//!
//! # Design
//! - Every request is marked as an XHR so the server can pick its partial templates.
//! - Steering headers are decoded here; callers decide what to do with them.

use crate::core::headers::ResponseDirectives;
use anyhow::Context;
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use web_sys::{AbortSignal, FormData, HtmlFormElement};

const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// A fully read HTML response.
#[derive(Debug)]
pub(crate) struct PageResponse {
    /// Final URL after redirects.
    pub(crate) url: String,
    /// HTTP status.
    pub(crate) status: u16,
    /// Whether the status was 2xx.
    pub(crate) ok: bool,
    /// `Content-Type` header.
    pub(crate) content_type: Option<String>,
    /// Decoded steering headers.
    pub(crate) directives: ResponseDirectives,
    /// Response body.
    pub(crate) body: String,
}

async fn read_page(response: Response) -> anyhow::Result<PageResponse> {
    let headers = response.headers();
    let directives = ResponseDirectives::from_lookup(|name| headers.get(name));
    Ok(PageResponse {
        url: response.url(),
        status: response.status(),
        ok: response.ok(),
        content_type: headers.get("content-type"),
        directives,
        body: response.text().await?,
    })
}

/// GET an HTML page; `signal` aborts it when a newer navigation starts.
pub(crate) async fn fetch_page(
    url: &str,
    signal: Option<&AbortSignal>,
) -> anyhow::Result<PageResponse> {
    let response = Request::get(url)
        .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
        .abort_signal(signal)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    read_page(response).await
}

/// POST a form element as multipart data to its `action` (or the current page).
pub(crate) async fn submit_form(
    form: &HtmlFormElement,
    signal: Option<&AbortSignal>,
) -> anyhow::Result<PageResponse> {
    let action = form.action();
    let data = FormData::new_with_form(form)
        .map_err(|err| anyhow::anyhow!("form data unavailable: {err:?}"))?;
    let response = Request::post(&action)
        .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
        .abort_signal(signal)
        .body(data)
        .send()
        .await
        .with_context(|| format!("POST {action}"))?;
    read_page(response).await
}

/// POST an urlencoded body.
pub(crate) async fn post_urlencoded(url: &str, body: String) -> anyhow::Result<PageResponse> {
    let response = Request::post(url)
        .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
        .header("Content-Type", FORM_URLENCODED)
        .body(body)
        .send()
        .await
        .with_context(|| format!("POST {url}"))?;
    read_page(response).await
}

/// GET and decode a JSON document.
pub(crate) async fn get_json<T: DeserializeOwned>(url: &str) -> anyhow::Result<T> {
    let response = Request::get(url)
        .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if !response.ok() {
        anyhow::bail!("GET {url} failed with status {}", response.status());
    }
    Ok(response.json::<T>().await?)
}
