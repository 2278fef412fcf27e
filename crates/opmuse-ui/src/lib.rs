#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]
//! Opmuse browser client.
//!
//! Partial page navigation, region reloads, the event bus, the queue player and batch
//! uploads for the server-rendered opmuse web app. DOM-free logic lives in [`core`] and
//! is tested natively; browser wiring is only compiled for wasm32.

pub mod core;

#[cfg(target_arch = "wasm32")]
mod services;

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
mod features;

#[cfg(target_arch = "wasm32")]
pub use app::run_app;
