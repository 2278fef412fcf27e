//! Typed key/value preferences over string storage.
//!
//! # Design
//! - Browser storage only holds strings, so every write also records a type tag under
//!   a sibling key and reads rebuild the original primitive from it.
//! - A missing tag means the value was written by something else; it is returned as
//!   raw text.

use crate::core::error::UiResult;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Side panel open/closed preference.
pub const LAYOUT_PANEL_OPEN: &str = "layout.panel.open";
/// Off-screen navigation visibility preference.
pub const OFFSCREEN_NAV_SHOWN: &str = "offscreennav.shown";

const TYPE_SUFFIX: &str = ".type";

/// A persisted layout switch: the preference key and the `<body>` class it drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutToggle {
    /// Preference key.
    pub key: &'static str,
    /// Body class applied while the toggle is on.
    pub class: &'static str,
}

/// Every layout toggle, for restoring state on page init.
pub const LAYOUT_TOGGLES: [LayoutToggle; 2] = [
    LayoutToggle {
        key: LAYOUT_PANEL_OPEN,
        class: "panel-open",
    },
    LayoutToggle {
        key: OFFSCREEN_NAV_SHOWN,
        class: "offscreennav-shown",
    },
];

/// Resolve a `data-layout-toggle` value.
#[must_use]
pub fn layout_toggle(name: &str) -> Option<LayoutToggle> {
    match name {
        "panel" => Some(LAYOUT_TOGGLES[0]),
        "offscreennav" => Some(LAYOUT_TOGGLES[1]),
        _ => None,
    }
}

/// String storage used by [`PreferenceStore`].
pub trait KeyValueBackend {
    /// Read a raw value.
    fn read(&self, key: &str) -> Option<String>;
    /// Write a raw value.
    ///
    /// # Errors
    /// Returns [`crate::core::error::UiError::Storage`] when the backend rejects the write.
    fn write(&self, key: &str, value: &str) -> UiResult<()>;
    /// Remove a value if present.
    fn remove(&self, key: &str);
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Box<B> {
    fn read(&self, key: &str) -> Option<String> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> UiResult<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key);
    }
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for &B {
    fn read(&self, key: &str) -> Option<String> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> UiResult<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key);
    }
}

/// In-memory backend for tests and browsers without storage.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<BTreeMap<String, String>>,
}

impl KeyValueBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> UiResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// A stored preference value with its primitive type.
#[derive(Clone, Debug, PartialEq)]
pub enum PrefValue {
    /// `true` / `false`.
    Bool(bool),
    /// Any finite number.
    Number(f64),
    /// Free text (also used for untagged values).
    Text(String),
}

impl PrefValue {
    const fn type_tag(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }

    fn decode(tag: Option<&str>, raw: String) -> Self {
        match tag {
            Some("boolean") => Self::Bool(raw == "true"),
            Some("number") => raw.parse::<f64>().map_or(Self::Text(raw), Self::Number),
            _ => Self::Text(raw),
        }
    }

    /// Boolean view of the value, if it is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view of the value, if it is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for PrefValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Typed preference facade over a [`KeyValueBackend`].
#[derive(Debug)]
pub struct PreferenceStore<B> {
    backend: B,
}

impl<B: KeyValueBackend> PreferenceStore<B> {
    /// Wrap a backend.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Store a value together with its type tag.
    ///
    /// # Errors
    /// Propagates backend write failures.
    pub fn set(&self, key: &str, value: impl Into<PrefValue>) -> UiResult<()> {
        let value = value.into();
        self.backend.write(key, &value.encode())?;
        self.backend.write(&tag_key(key), value.type_tag())
    }

    /// Read a value, rebuilding its primitive type from the tag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<PrefValue> {
        let raw = self.backend.read(key)?;
        let tag = self.backend.read(&tag_key(key));
        Some(PrefValue::decode(tag.as_deref(), raw))
    }

    /// Read a boolean preference, falling back to `default`.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|value| value.as_bool())
            .unwrap_or(default)
    }

    /// Remove a value and its tag.
    pub fn remove(&self, key: &str) {
        self.backend.remove(key);
        self.backend.remove(&tag_key(key));
    }
}

fn tag_key(key: &str) -> String {
    format!("{key}{TYPE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PreferenceStore<MemoryBackend> {
        PreferenceStore::new(MemoryBackend::default())
    }

    #[test]
    fn booleans_round_trip_as_booleans() -> UiResult<()> {
        let prefs = store();
        prefs.set("k", true)?;
        assert_eq!(prefs.get("k"), Some(PrefValue::Bool(true)));
        prefs.set("k", false)?;
        assert_eq!(prefs.get("k"), Some(PrefValue::Bool(false)));
        Ok(())
    }

    #[test]
    fn numbers_round_trip_as_numbers() -> UiResult<()> {
        let prefs = store();
        prefs.set("n", 3.5)?;
        assert_eq!(prefs.get("n").and_then(|v| v.as_number()), Some(3.5));
        prefs.set("n", 3.0)?;
        assert_eq!(prefs.backend.read("n").as_deref(), Some("3"));
        assert_eq!(prefs.get("n"), Some(PrefValue::Number(3.0)));
        Ok(())
    }

    #[test]
    fn untagged_values_pass_through_raw() -> UiResult<()> {
        let prefs = store();
        prefs.backend.write("legacy", "true")?;
        assert_eq!(prefs.get("legacy"), Some(PrefValue::Text("true".into())));
        assert!(!prefs.get_bool("legacy", false));
        Ok(())
    }

    #[test]
    fn tag_is_rewritten_when_type_changes() -> UiResult<()> {
        let prefs = store();
        prefs.set(LAYOUT_PANEL_OPEN, 1.0)?;
        prefs.set(LAYOUT_PANEL_OPEN, "open")?;
        assert_eq!(
            prefs.backend.read("layout.panel.open.type").as_deref(),
            Some("string")
        );
        assert_eq!(prefs.get(LAYOUT_PANEL_OPEN), Some(PrefValue::Text("open".into())));
        Ok(())
    }

    #[test]
    fn layout_toggles_resolve_by_name() {
        assert_eq!(layout_toggle("panel").map(|t| t.class), Some("panel-open"));
        assert_eq!(
            layout_toggle("offscreennav").map(|t| t.key),
            Some(OFFSCREEN_NAV_SHOWN)
        );
        assert_eq!(layout_toggle("sidebar"), None);
    }

    #[test]
    fn remove_clears_value_and_tag() -> UiResult<()> {
        let prefs = store();
        prefs.set(OFFSCREEN_NAV_SHOWN, true)?;
        prefs.remove(OFFSCREEN_NAV_SHOWN);
        assert_eq!(prefs.get(OFFSCREEN_NAV_SHOWN), None);
        assert_eq!(prefs.backend.read("offscreennav.shown.type"), None);
        assert!(prefs.get_bool(OFFSCREEN_NAV_SHOWN, true));
        Ok(())
    }
}
