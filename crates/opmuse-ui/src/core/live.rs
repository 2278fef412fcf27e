//! Routing of server-pushed events to page updates.

use serde_json::Value;

/// Page update triggered by a bus event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveAction {
    /// Partially reload these selectors.
    Reload(Vec<String>),
    /// Re-request images matching this selector.
    RefreshImages(String),
}

/// Bus events handled by [`route`].
pub const LIVE_EVENTS: [&str; 10] = [
    "dashboard.recent_tracks.fetched",
    "dashboard.listening_now.update",
    "covers.album.update",
    "covers.artist.update",
    "remotes.artist.fetched",
    "remotes.album.fetched",
    "remotes.track.fetched",
    "remotes.tag.fetched",
    "database_events.userandalbum.update",
    "database_events.userandalbum.insert",
];

fn first_id(args: &[Value]) -> Option<String> {
    match args.first()? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect()
}

/// Map one bus event to its page update.
#[must_use]
pub fn route(event: &str, args: &[Value]) -> Option<LiveAction> {
    let reload = |selector: String| Some(LiveAction::Reload(vec![selector]));
    match event {
        "dashboard.recent_tracks.fetched" => reload("#dashboard-recent-tracks".into()),
        "dashboard.listening_now.update" => reload("#dashboard-listening-now".into()),
        "covers.album.update" | "covers.artist.update" => {
            let kind = if event == "covers.album.update" {
                "album"
            } else {
                "artist"
            };
            let id = sanitize(&first_id(args)?);
            Some(LiveAction::RefreshImages(format!(
                "img[data-cover-{kind}=\"{id}\"]"
            )))
        }
        "remotes.artist.fetched"
        | "remotes.album.fetched"
        | "remotes.track.fetched"
        | "remotes.tag.fetched" => {
            let kind = event
                .strip_prefix("remotes.")
                .and_then(|rest| rest.strip_suffix(".fetched"))?;
            let id = sanitize(&first_id(args)?);
            reload(format!("#remotes-{kind}-{id}"))
        }
        "database_events.userandalbum.update" | "database_events.userandalbum.insert" => {
            let id = sanitize(&first_id(args)?);
            reload(format!("#love-album-{id}"))
        }
        _ => None,
    }
}

/// Image URL with a cache-busting `refresh` parameter.
#[must_use]
pub fn refreshed_image_url(src: &str, nonce: u32) -> String {
    let (base, fragment) = src.split_once('#').map_or((src, None), |(b, f)| (b, Some(f)));
    let kept: Vec<&str> = base
        .split_once('?')
        .map(|(_, query)| {
            query
                .split('&')
                .filter(|pair| !pair.is_empty() && !pair.starts_with("refresh="))
                .collect()
        })
        .unwrap_or_default();
    let path = base.split_once('?').map_or(base, |(path, _)| path);
    let mut url = path.to_string();
    url.push('?');
    for pair in kept {
        url.push_str(pair);
        url.push('&');
    }
    url.push_str(&format!("refresh={nonce}"));
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dashboard_events_reload_panels() {
        assert_eq!(
            route("dashboard.listening_now.update", &[]),
            Some(LiveAction::Reload(vec!["#dashboard-listening-now".into()]))
        );
    }

    #[test]
    fn id_events_target_specific_elements() {
        assert_eq!(
            route("remotes.tag.fetched", &[json!("rock")]),
            Some(LiveAction::Reload(vec!["#remotes-tag-rock".into()]))
        );
        assert_eq!(
            route("database_events.userandalbum.insert", &[json!(17)]),
            Some(LiveAction::Reload(vec!["#love-album-17".into()]))
        );
        assert_eq!(
            route("covers.artist.update", &[json!("a\"b9")]),
            Some(LiveAction::RefreshImages("img[data-cover-artist=\"ab9\"]".into()))
        );
        assert_eq!(route("covers.album.update", &[]), None);
        assert_eq!(route("queue.start", &[]), None);
    }

    #[test]
    fn every_live_event_routes_with_an_id() {
        for event in LIVE_EVENTS {
            assert!(route(event, &[json!("1")]).is_some(), "{event}");
        }
    }

    #[test]
    fn refresh_param_is_replaced() {
        assert_eq!(refreshed_image_url("/cover/1", 5), "/cover/1?refresh=5");
        assert_eq!(
            refreshed_image_url("/cover/1?size=small&refresh=4#x", 5),
            "/cover/1?size=small&refresh=5#x"
        );
    }
}
