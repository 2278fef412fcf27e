//! Response headers the server uses to steer the client.
//!
//! # Design
//! - Headers are read through a lookup closure so the same logic serves `fetch`
//!   responses and `XMLHttpRequest` uploads.
//! - Malformed values are ignored rather than failing the response.

use serde::Deserialize;

/// JSON array whose first element is a URL to soft-navigate to.
pub const LOCATION_HEADER: &str = "X-Opmuse-Location";
/// JSON `{type, text}` notification.
pub const MESSAGE_HEADER: &str = "X-Opmuse-Message";
/// Boolean authentication state of the responding session.
pub const AUTHENTICATED_HEADER: &str = "X-Opmuse-Authenticated";

/// Severity of a server notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MessageKind {
    /// Positive confirmation.
    Success,
    /// Neutral information (also used for unknown kinds).
    Info,
    /// Something needs attention.
    Warning,
    /// Failure.
    Danger,
}

impl From<String> for MessageKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "danger" | "error" => Self::Danger,
            _ => Self::Info,
        }
    }
}

impl MessageKind {
    /// CSS modifier used by the notification area.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "alert-success",
            Self::Info => "alert-info",
            Self::Warning => "alert-warning",
            Self::Danger => "alert-danger",
        }
    }
}

/// Transient notification carried by [`MESSAGE_HEADER`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FlashMessage {
    /// Severity.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Plain text body.
    pub text: String,
}

/// What the client should do with a response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseAction {
    /// Authentication changed underneath the page; reload from scratch.
    HardReload(String),
    /// Follow the server-provided location without rendering the body.
    SoftNavigate(String),
    /// Render the body.
    Render,
}

/// Decoded steering headers of one response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseDirectives {
    /// First entry of [`LOCATION_HEADER`].
    pub location: Option<String>,
    /// Decoded [`MESSAGE_HEADER`].
    pub message: Option<FlashMessage>,
    /// Decoded [`AUTHENTICATED_HEADER`].
    pub authenticated: Option<bool>,
}

impl ResponseDirectives {
    /// Decode directives using a case-insensitive header lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let location = lookup(LOCATION_HEADER)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .and_then(|urls| urls.into_iter().next())
            .filter(|url| !url.is_empty());
        let message = lookup(MESSAGE_HEADER)
            .and_then(|raw| serde_json::from_str::<FlashMessage>(&raw).ok());
        let authenticated =
            lookup(AUTHENTICATED_HEADER).and_then(|raw| serde_json::from_str::<bool>(&raw).ok());
        Self {
            location,
            message,
            authenticated,
        }
    }

    /// Decide how to handle the body given the page's initial authentication flag.
    #[must_use]
    pub fn action(&self, page_authenticated: bool) -> ResponseAction {
        if self
            .authenticated
            .is_some_and(|authenticated| authenticated != page_authenticated)
        {
            return ResponseAction::HardReload("/".to_string());
        }
        match &self.location {
            Some(location) => ResponseAction::SoftNavigate(location.clone()),
            None => ResponseAction::Render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn directives(pairs: &[(&str, &str)]) -> ResponseDirectives {
        let headers: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), (*v).to_string()))
            .collect();
        ResponseDirectives::from_lookup(|name| headers.get(&name.to_ascii_lowercase()).cloned())
    }

    #[test]
    fn location_header_triggers_soft_navigation() {
        let parsed = directives(&[(LOCATION_HEADER, r#"["/library"]"#)]);
        assert_eq!(parsed.action(false), ResponseAction::SoftNavigate("/library".into()));
    }

    #[test]
    fn authentication_mismatch_wins() {
        let parsed = directives(&[
            (LOCATION_HEADER, r#"["/library"]"#),
            (AUTHENTICATED_HEADER, "true"),
        ]);
        assert_eq!(parsed.action(false), ResponseAction::HardReload("/".into()));
        assert_eq!(parsed.action(true), ResponseAction::SoftNavigate("/library".into()));
    }

    #[test]
    fn message_header_is_decoded() {
        let parsed = directives(&[(MESSAGE_HEADER, r#"{"type":"success","text":"Saved"}"#)]);
        assert_eq!(
            parsed.message,
            Some(FlashMessage {
                kind: MessageKind::Success,
                text: "Saved".into()
            })
        );
        assert_eq!(parsed.action(true), ResponseAction::Render);
    }

    #[test]
    fn unknown_message_kind_falls_back_to_info() {
        let parsed = directives(&[(MESSAGE_HEADER, r#"{"type":"notice","text":"Hi"}"#)]);
        assert_eq!(parsed.message.map(|m| m.kind), Some(MessageKind::Info));
    }

    #[test]
    fn malformed_headers_are_ignored() {
        let parsed = directives(&[
            (LOCATION_HEADER, "/library"),
            (MESSAGE_HEADER, "saved"),
            (AUTHENTICATED_HEADER, "yes"),
        ]);
        assert_eq!(parsed, ResponseDirectives::default());
        assert_eq!(directives(&[(LOCATION_HEADER, "[]")]).location, None);
    }
}
