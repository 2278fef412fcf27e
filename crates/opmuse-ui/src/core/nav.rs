//! Navigation bookkeeping for partial page loads.
//!
//! # Design
//! - At most one full-page navigation is in flight; each request carries a ticket and
//!   only the newest ticket may apply its response.
//! - Link classification and failure rendering stay DOM-free so they can be tested
//!   natively; the wasm navigator only wires them to browser events.

use crate::core::error::{UiError, UiResult};
use url::Url;

/// Identifies one navigation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NavTicket(u64);

/// Outcome of starting a navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavStart {
    /// Ticket of the new request.
    pub ticket: NavTicket,
    /// Request that must be aborted because it was superseded.
    pub superseded: Option<NavTicket>,
}

/// Tab-lifetime navigation state.
#[derive(Debug, Default)]
pub struct NavigationSession {
    current_url: Option<String>,
    next_id: u64,
    in_flight: Option<NavTicket>,
}

impl NavigationSession {
    /// Session seeded with the URL the page was loaded from.
    #[must_use]
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            current_url: Some(initial_url.into()),
            ..Self::default()
        }
    }

    /// Register a new request, superseding any in-flight one.
    pub fn begin(&mut self) -> NavStart {
        self.next_id = self.next_id.wrapping_add(1);
        let ticket = NavTicket(self.next_id);
        let superseded = self.in_flight.replace(ticket);
        NavStart { ticket, superseded }
    }

    /// Whether `ticket` is still the request allowed to apply its response.
    #[must_use]
    pub fn is_current(&self, ticket: NavTicket) -> bool {
        self.in_flight == Some(ticket)
    }

    /// Finish a request. Returns `false` (and changes nothing) for stale tickets.
    pub fn complete(&mut self, ticket: NavTicket, url: &str) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.in_flight = None;
        self.current_url = Some(url.to_string());
        true
    }

    /// Currently displayed URL.
    #[must_use]
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// Ticket of the request in flight, if any.
    #[must_use]
    pub const fn in_flight(&self) -> Option<NavTicket> {
        self.in_flight
    }
}

/// Where a link should be opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    /// Same origin: navigate in place.
    InApp(String),
    /// Other origin: open in a new browsing context.
    External(String),
}

/// Resolve `href` against the page URL and decide how to open it.
///
/// # Errors
/// Returns [`UiError::Url`] when either URL is malformed.
pub fn classify_link(page_url: &str, href: &str) -> UiResult<LinkTarget> {
    let page = parse_url(page_url)?;
    let target = page.join(href).map_err(|source| UiError::Url {
        url: href.to_string(),
        source,
    })?;
    let resolved = target.to_string();
    if target.origin() == page.origin() {
        Ok(LinkTarget::InApp(resolved))
    } else {
        Ok(LinkTarget::External(resolved))
    }
}

/// Whether two URLs differ only by fragment.
#[must_use]
pub fn is_fragment_only(page_url: &str, href: &str) -> bool {
    if href.starts_with('#') {
        return true;
    }
    let Ok(page) = Url::parse(page_url) else {
        return false;
    };
    let Ok(target) = page.join(href) else {
        return false;
    };
    target.fragment().is_some() && strip_fragment(&page) == strip_fragment(&target)
}

fn strip_fragment(url: &Url) -> Url {
    let mut clone = url.clone();
    clone.set_fragment(None);
    clone
}

fn parse_url(raw: &str) -> UiResult<Url> {
    Url::parse(raw).map_err(|source| UiError::Url {
        url: raw.to_string(),
        source,
    })
}

/// Facts about a click that decide whether it is intercepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickContext {
    /// `MouseEvent.button`.
    pub button: i16,
    /// Any of ctrl/meta/shift/alt held.
    pub modified: bool,
    /// Value of the anchor's `target` attribute.
    pub target: Option<String>,
    /// Anchor carries a `download` attribute.
    pub download: bool,
    /// Anchor opted out with `data-ajaxify="false"`.
    pub opted_out: bool,
    /// Raw `href` attribute.
    pub href: Option<String>,
}

/// Decide whether a click on an anchor should become a partial navigation.
#[must_use]
pub fn should_intercept(click: &ClickContext, page_url: &str) -> bool {
    if click.button != 0 || click.modified || click.download || click.opted_out {
        return false;
    }
    if click
        .target
        .as_deref()
        .is_some_and(|target| !target.is_empty() && target != "_self")
    {
        return false;
    }
    let Some(href) = click.href.as_deref() else {
        return false;
    };
    if href.is_empty() || is_fragment_only(page_url, href) {
        return false;
    }
    parse_url(page_url)
        .and_then(|page| {
            page.join(href).map_err(|source| UiError::Url {
                url: href.to_string(),
                source,
            })
        })
        .is_ok_and(|target| matches!(target.scheme(), "http" | "https"))
}

/// Ignores history events until the listener is armed.
///
/// Some engines fire a spurious `popstate` right after load; arming from a zero-delay
/// timer skips it.
#[derive(Debug, Default)]
pub struct PopStateGate {
    armed: bool,
}

impl PopStateGate {
    /// Start accepting events.
    pub const fn arm(&mut self) {
        self.armed = true;
    }

    /// Whether an incoming history event should be handled.
    #[must_use]
    pub const fn accepts(&self) -> bool {
        self.armed
    }
}

/// Body to install when a navigation request failed at the HTTP level.
///
/// Plain text responses are wrapped in a preformatted block; everything else is assumed
/// to be an HTML error page and passed through.
#[must_use]
pub fn failure_body(content_type: Option<&str>, body: &str) -> String {
    let is_plain = content_type.is_some_and(|value| {
        value
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/plain"))
    });
    if is_plain {
        format!("<pre>{}</pre>", escape_html(body))
    } else {
        body.to_string()
    }
}

/// Escape text for safe insertion as HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://music.example/library/albums";

    #[test]
    fn newer_navigation_supersedes_older() {
        let mut session = NavigationSession::new(PAGE);
        let first = session.begin();
        assert_eq!(first.superseded, None);
        let second = session.begin();
        assert_eq!(second.superseded, Some(first.ticket));
        assert!(!session.is_current(first.ticket));
        assert!(!session.complete(first.ticket, "https://music.example/stale"));
        assert_eq!(session.current_url(), Some(PAGE));
        assert!(session.complete(second.ticket, "https://music.example/fresh"));
        assert_eq!(session.current_url(), Some("https://music.example/fresh"));
        assert_eq!(session.in_flight(), None);
    }

    #[test]
    fn completed_ticket_cannot_apply_twice() {
        let mut session = NavigationSession::default();
        let start = session.begin();
        assert!(session.complete(start.ticket, "/a"));
        assert!(!session.complete(start.ticket, "/a"));
    }

    #[test]
    fn links_are_classified_by_origin() -> UiResult<()> {
        assert_eq!(
            classify_link(PAGE, "/queue")?,
            LinkTarget::InApp("https://music.example/queue".into())
        );
        assert_eq!(
            classify_link(PAGE, "tracks?page=2")?,
            LinkTarget::InApp("https://music.example/library/tracks?page=2".into())
        );
        assert_eq!(
            classify_link(PAGE, "https://www.last.fm/music/x")?,
            LinkTarget::External("https://www.last.fm/music/x".into())
        );
        assert_eq!(
            classify_link(PAGE, "http://music.example/queue")?,
            LinkTarget::External("http://music.example/queue".into())
        );
        Ok(())
    }

    #[test]
    fn malformed_page_url_is_an_error() {
        assert!(matches!(
            classify_link("not a url", "/x"),
            Err(UiError::Url { .. })
        ));
    }

    #[test]
    fn interception_respects_modifiers_and_opt_outs() {
        let plain = ClickContext {
            href: Some("/library".into()),
            ..ClickContext::default()
        };
        assert!(should_intercept(&plain, PAGE));
        assert!(!should_intercept(
            &ClickContext {
                modified: true,
                ..plain.clone()
            },
            PAGE
        ));
        assert!(!should_intercept(
            &ClickContext {
                button: 1,
                ..plain.clone()
            },
            PAGE
        ));
        assert!(!should_intercept(
            &ClickContext {
                target: Some("_blank".into()),
                ..plain.clone()
            },
            PAGE
        ));
        assert!(should_intercept(
            &ClickContext {
                target: Some("_self".into()),
                ..plain.clone()
            },
            PAGE
        ));
        assert!(!should_intercept(
            &ClickContext {
                opted_out: true,
                ..plain.clone()
            },
            PAGE
        ));
        assert!(!should_intercept(
            &ClickContext {
                href: Some("mailto:me@example.com".into()),
                ..plain.clone()
            },
            PAGE
        ));
        assert!(!should_intercept(
            &ClickContext {
                href: Some("#tracks".into()),
                ..plain
            },
            PAGE
        ));
    }

    #[test]
    fn download_links_are_left_to_the_browser() {
        let download = ClickContext {
            href: Some("/download/album/7".into()),
            download: true,
            ..ClickContext::default()
        };
        assert!(!should_intercept(&download, PAGE));
        assert!(should_intercept(
            &ClickContext {
                download: false,
                ..download
            },
            PAGE
        ));
    }

    #[test]
    fn fragment_detection() {
        assert!(is_fragment_only(PAGE, "#top"));
        assert!(is_fragment_only(PAGE, "/library/albums#top"));
        assert!(!is_fragment_only(PAGE, "/library/artists#top"));
        assert!(!is_fragment_only(PAGE, "/library/albums"));
    }

    #[test]
    fn popstate_gate_starts_closed() {
        let mut gate = PopStateGate::default();
        assert!(!gate.accepts());
        gate.arm();
        assert!(gate.accepts());
    }

    #[test]
    fn plain_text_failures_are_preformatted() {
        assert_eq!(
            failure_body(Some("text/plain; charset=utf-8"), "Traceback <module>"),
            "<pre>Traceback &lt;module&gt;</pre>"
        );
        assert_eq!(
            failure_body(Some("text/html"), "<h1>500</h1>"),
            "<h1>500</h1>"
        );
        assert_eq!(failure_body(None, "oops"), "oops");
    }
}
