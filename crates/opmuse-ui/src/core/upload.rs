//! Upload batch planning: file classification, sidecar association and the bounded pool.
//!
//! # Design
//! - Files are addressed by their index in the batch; the wasm controller owns the
//!   `File` handles and the XHRs.
//! - The pool hands out the next pending file exactly once per finished slot, so the
//!   active count never exceeds the limit and never drops to zero while work remains.

use crate::core::error::{UiError, UiResult};
use std::collections::{BTreeSet, VecDeque};

/// Starts an upload session.
pub const UPLOAD_START_PATH: &str = "/upload/start";
/// Accepts one file of a session.
pub const UPLOAD_PATH: &str = "/upload";

const ARCHIVE_TYPES: [&str; 11] = [
    "application/zip",
    "application/x-zip-compressed",
    "application/x-rar-compressed",
    "application/vnd.rar",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/gzip",
    "application/x-gzip",
    "application/x-bzip2",
    "application/x-bzip",
    "application/x-compressed",
];
const ARCHIVE_EXTENSIONS: [&str; 8] = ["zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "tbz2"];
const AUDIO_EXTENSIONS: [&str; 10] = [
    "mp3", "ogg", "oga", "opus", "flac", "m4a", "aac", "wav", "wma", "mpc",
];

/// How a file is treated by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// Unpacked server-side.
    Archive,
    /// Imported as a track.
    Audio,
    /// Stored next to an audio file (cover art, cue sheets...).
    Sidecar,
}

fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Classify by declared media type, falling back to the extension.
#[must_use]
pub fn classify(media_type: &str, name: &str) -> FileKind {
    let media_type = media_type.trim().to_ascii_lowercase();
    if ARCHIVE_TYPES.contains(&media_type.as_str()) {
        return FileKind::Archive;
    }
    if media_type.starts_with("audio/") {
        return FileKind::Audio;
    }
    let ext = extension(name);
    let ext = ext.as_deref().unwrap_or_default();
    if media_type.is_empty() || media_type == "application/octet-stream" {
        if ARCHIVE_EXTENSIONS.contains(&ext) {
            return FileKind::Archive;
        }
        if AUDIO_EXTENSIONS.contains(&ext) {
            return FileKind::Audio;
        }
    }
    FileKind::Sidecar
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count()
}

/// Best guess of the audio file a sidecar belongs to.
///
/// Prefers the longest shared name stem; falls back to the first audio file.
#[must_use]
pub fn guess_association<'a, S: AsRef<str>>(sidecar: &str, audio_names: &'a [S]) -> Option<&'a str> {
    let sidecar_stem = stem(sidecar);
    let mut best: Option<(&str, usize)> = None;
    for name in audio_names {
        let name = name.as_ref();
        let shared = common_prefix_len(sidecar_stem, stem(name));
        if shared > 0 && best.is_none_or(|(_, len)| shared > len) {
            best = Some((name, shared));
        }
    }
    best.map(|(name, _)| name)
        .or_else(|| audio_names.first().map(AsRef::as_ref))
}

/// Audio names offered by the association autocomplete for `typed`.
#[must_use]
pub fn suggestions<'a, S: AsRef<str>>(typed: &str, audio_names: &'a [S]) -> Vec<&'a str> {
    let needle = typed.trim().to_lowercase();
    audio_names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| needle.is_empty() || name.to_lowercase().contains(&needle))
        .collect()
}

/// One file entry of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    /// File name.
    pub name: String,
    /// Classification.
    pub kind: FileKind,
    /// Pre-filled association for sidecars.
    pub associate: Option<String>,
}

/// Classify a batch of `(name, media_type)` pairs and pre-fill sidecar associations.
#[must_use]
pub fn plan_batch(files: &[(String, String)]) -> Vec<BatchEntry> {
    let kinds: Vec<FileKind> = files
        .iter()
        .map(|(name, media_type)| classify(media_type, name))
        .collect();
    let audio: Vec<&str> = files
        .iter()
        .zip(&kinds)
        .filter(|(_, kind)| **kind == FileKind::Audio)
        .map(|((name, _), _)| name.as_str())
        .collect();
    files
        .iter()
        .zip(kinds)
        .map(|((name, _), kind)| BatchEntry {
            name: name.clone(),
            kind,
            associate: (kind == FileKind::Sidecar)
                .then(|| guess_association(name, &audio).map(str::to_string))
                .flatten(),
        })
        .collect()
}

/// Bounded-concurrency scheduler over batch indices.
#[derive(Debug)]
pub struct UploadPool {
    limit: usize,
    pending: VecDeque<usize>,
    active: BTreeSet<usize>,
    done: usize,
    total: usize,
}

impl UploadPool {
    /// Pool over `total` files with at most `limit` (min 1) in flight.
    #[must_use]
    pub fn new(total: usize, limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            pending: (0..total).collect(),
            active: BTreeSet::new(),
            done: 0,
            total,
        }
    }

    /// Fill free slots; returns the indices to start now.
    pub fn start(&mut self) -> Vec<usize> {
        let mut started = Vec::new();
        while self.active.len() < self.limit {
            let Some(next) = self.pending.pop_front() else {
                break;
            };
            self.active.insert(next);
            started.push(next);
        }
        started
    }

    /// Mark `id` finished (success or failure) and return its replacement, if any.
    ///
    /// # Errors
    /// Returns [`UiError::UnknownUpload`] when `id` is not in flight.
    pub fn finish(&mut self, id: usize) -> UiResult<Option<usize>> {
        if !self.active.remove(&id) {
            return Err(UiError::UnknownUpload { id });
        }
        self.done += 1;
        let next = self.pending.pop_front();
        if let Some(next) = next {
            self.active.insert(next);
        }
        Ok(next)
    }

    /// Drop a file that has not started yet.
    ///
    /// # Errors
    /// Returns [`UiError::UnknownUpload`] when `id` is not pending.
    pub fn remove(&mut self, id: usize) -> UiResult<()> {
        let position = self
            .pending
            .iter()
            .position(|pending| *pending == id)
            .ok_or(UiError::UnknownUpload { id })?;
        self.pending.remove(position);
        self.total -= 1;
        Ok(())
    }

    /// Requests in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.active.len()
    }

    /// Files not started yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether every file has finished.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

/// Aggregated byte progress of a batch.
#[derive(Clone, Debug, Default)]
pub struct ProgressTracker {
    loaded: Vec<u64>,
    sizes: Vec<u64>,
}

impl ProgressTracker {
    /// Tracker over files of the given sizes.
    #[must_use]
    pub fn new(sizes: Vec<u64>) -> Self {
        Self {
            loaded: vec![0; sizes.len()],
            sizes,
        }
    }

    /// Record `loaded` bytes sent for file `id` and return the batch fraction.
    pub fn update(&mut self, id: usize, loaded: u64) -> f64 {
        if let (Some(slot), Some(size)) = (self.loaded.get_mut(id), self.sizes.get(id)) {
            *slot = loaded.min(*size);
        }
        self.fraction()
    }

    /// Mark file `id` fully sent.
    pub fn complete(&mut self, id: usize) -> f64 {
        let size = self.sizes.get(id).copied().unwrap_or_default();
        self.update(id, size)
    }

    /// Exclude file `id` from the totals (removed before it started).
    pub fn forget(&mut self, id: usize) {
        if let (Some(slot), Some(size)) = (self.loaded.get_mut(id), self.sizes.get_mut(id)) {
            *slot = 0;
            *size = 0;
        }
    }

    /// Fraction of all bytes sent (0..=1).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        let total: u64 = self.sizes.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let loaded: u64 = self.loaded.iter().sum();
        loaded as f64 / total as f64
    }
}

/// Row attributes for a failed upload: a popover with the server's HTML `detail` that
/// opens on hover.
#[must_use]
pub fn failure_popover(detail: Option<&str>) -> [(&'static str, String); 4] {
    [
        ("data-toggle", "popover".to_string()),
        ("data-trigger", "hover".to_string()),
        ("data-html", "true".to_string()),
        ("data-content", detail.unwrap_or("Upload failed.").to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_by_type_then_extension() {
        assert_eq!(classify("application/zip", "a.zip"), FileKind::Archive);
        assert_eq!(classify("", "Album.RAR"), FileKind::Archive);
        assert_eq!(classify("audio/flac", "01.flac"), FileKind::Audio);
        assert_eq!(classify("", "01.opus"), FileKind::Audio);
        assert_eq!(classify("image/jpeg", "cover.jpg"), FileKind::Sidecar);
        assert_eq!(classify("text/plain", "notes.mp3"), FileKind::Sidecar);
        assert_eq!(classify("", "README"), FileKind::Sidecar);
    }

    #[test]
    fn sidecar_prefers_shared_stem() {
        let audio = ["01 Intro.mp3", "02 Hazey Jane.mp3"];
        assert_eq!(
            guess_association("02 Hazey Jane.lrc", &audio),
            Some("02 Hazey Jane.mp3")
        );
        assert_eq!(guess_association("cover.jpg", &audio), Some("01 Intro.mp3"));
        assert_eq!(guess_association::<&str>("cover.jpg", &[]), None);
    }

    #[test]
    fn batch_plan_fills_sidecar_association() {
        let plan = plan_batch(&[
            ("track.flac".into(), "audio/flac".into()),
            ("track.cue".into(), String::new()),
        ]);
        assert_eq!(plan[0].associate, None);
        assert_eq!(plan[1].kind, FileKind::Sidecar);
        assert_eq!(plan[1].associate.as_deref(), Some("track.flac"));
    }

    #[test]
    fn suggestions_filter_case_insensitively() {
        let audio = ["Alpha.mp3", "beta.ogg"];
        assert_eq!(suggestions("BET", &audio), vec!["beta.ogg"]);
        assert_eq!(suggestions("", &audio).len(), 2);
    }

    #[test]
    fn pool_never_exceeds_limit() -> UiResult<()> {
        let mut pool = UploadPool::new(6, 4);
        assert_eq!(pool.start(), vec![0, 1, 2, 3]);
        assert_eq!(pool.in_flight(), 4);
        assert_eq!(pool.finish(2)?, Some(4));
        assert_eq!(pool.in_flight(), 4);
        assert_eq!(pool.finish(0)?, Some(5));
        for id in [1, 3, 4] {
            assert_eq!(pool.finish(id)?, None);
            assert!(pool.in_flight() > 0);
        }
        assert!(!pool.is_complete());
        assert_eq!(pool.finish(5)?, None);
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.is_complete());
        Ok(())
    }

    #[test]
    fn finishing_twice_is_rejected() -> UiResult<()> {
        let mut pool = UploadPool::new(1, 4);
        pool.start();
        pool.finish(0)?;
        assert!(matches!(pool.finish(0), Err(UiError::UnknownUpload { id: 0 })));
        Ok(())
    }

    #[test]
    fn pending_files_can_be_removed_once() -> UiResult<()> {
        let mut pool = UploadPool::new(3, 1);
        pool.remove(2)?;
        assert!(pool.remove(2).is_err());
        assert_eq!(pool.start(), vec![0]);
        assert!(pool.remove(0).is_err());
        assert_eq!(pool.finish(0)?, Some(1));
        pool.finish(1)?;
        assert!(pool.is_complete());
        Ok(())
    }

    #[test]
    fn empty_or_emptied_batch_is_complete_before_any_upload() -> UiResult<()> {
        let mut empty = UploadPool::new(0, 4);
        assert!(empty.start().is_empty());
        assert!(empty.is_complete());

        let mut emptied = UploadPool::new(2, 4);
        emptied.remove(0)?;
        emptied.remove(1)?;
        assert!(emptied.start().is_empty());
        assert!(emptied.is_complete());
        assert_eq!(emptied.in_flight(), 0);
        Ok(())
    }

    #[test]
    fn removed_files_leave_the_progress_totals() {
        let mut tracker = ProgressTracker::new(vec![100, 300, 600]);
        tracker.update(2, 300);
        tracker.forget(2);
        assert!(tracker.fraction().abs() < 1e-9);
        assert!((tracker.complete(0) - 0.25).abs() < 1e-9);
        assert!((tracker.complete(1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn failed_rows_show_their_detail_on_hover() {
        let attributes = failure_popover(Some("<b>disk full</b>"));
        assert!(attributes.contains(&("data-trigger", "hover".to_string())));
        assert!(attributes.contains(&("data-toggle", "popover".to_string())));
        assert!(attributes.contains(&("data-content", "<b>disk full</b>".to_string())));

        let fallback = failure_popover(None);
        assert!(fallback.contains(&("data-content", "Upload failed.".to_string())));
    }

    #[test]
    fn progress_aggregates_bytes() {
        let mut tracker = ProgressTracker::new(vec![100, 300]);
        assert!((tracker.update(0, 50) - 0.125).abs() < 1e-9);
        assert!((tracker.update(1, 1_000) - 350.0 / 400.0).abs() < 1e-9);
        assert!((tracker.complete(0) - 1.0).abs() < 1e-9);
        assert!(ProgressTracker::default().fraction().abs() < 1e-9);
    }
}
