//! `localStorage` backend for the preference store.

use crate::core::error::{UiError, UiResult};
use crate::core::prefs::KeyValueBackend;
use gloo::storage::{LocalStorage, Storage};
use gloo::utils::window;

/// Raw string access to `window.localStorage`.
pub(crate) struct LocalStorageBackend;

impl LocalStorageBackend {
    /// Check for a usable storage area.
    pub(crate) fn available() -> bool {
        let key = "opmuse.storage-check";
        let Some(storage) = window().local_storage().ok().flatten() else {
            return false;
        };
        let writable = storage.set_item(key, "1").is_ok();
        let _ = storage.remove_item(key);
        writable
    }
}

impl KeyValueBackend for LocalStorageBackend {
    fn read(&self, key: &str) -> Option<String> {
        LocalStorage::raw().get_item(key).ok().flatten()
    }

    fn write(&self, key: &str, value: &str) -> UiResult<()> {
        LocalStorage::raw()
            .set_item(key, value)
            .map_err(|err| UiError::Storage {
                key: key.to_string(),
                detail: format!("{err:?}"),
            })
    }

    fn remove(&self, key: &str) {
        let _ = LocalStorage::raw().remove_item(key);
    }
}
