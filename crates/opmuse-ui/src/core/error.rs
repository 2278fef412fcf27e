//! Error primitives for the DOM-free core.

use thiserror::Error;

/// Failures surfaced by core helpers.
#[derive(Debug, Error)]
pub enum UiError {
    /// Page configuration could not be decoded.
    #[error("invalid page configuration")]
    Config {
        /// Underlying JSON decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// A URL could not be parsed or resolved against the page.
    #[error("invalid url `{url}`")]
    Url {
        /// Offending input.
        url: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// An event bus frame was not a `{event, args}` object.
    #[error("malformed event bus message")]
    BusMessage {
        /// Underlying JSON decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// A preference value could not be persisted.
    #[error("storage write failed for `{key}`: {detail}")]
    Storage {
        /// Key being written.
        key: String,
        /// Backend-provided detail.
        detail: String,
    },
    /// An upload slot was finished or removed twice.
    #[error("upload {id} is not tracked by the pool")]
    UnknownUpload {
        /// Upload identifier.
        id: usize,
    },
}

/// Result alias for core helpers.
pub type UiResult<T> = Result<T, UiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = UiError::Storage {
            key: "layout.panel.open".to_string(),
            detail: "quota".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "storage write failed for `layout.panel.open`: quota"
        );
        assert_eq!(
            UiError::UnknownUpload { id: 3 }.to_string(),
            "upload 3 is not tracked by the pool"
        );
    }
}
