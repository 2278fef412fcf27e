//! Core, DOM-free state machines and helpers for the browser client.
pub mod bus;
pub mod config;
pub mod error;
pub mod headers;
pub mod live;
pub mod nav;
pub mod player;
pub mod prefs;
pub mod regions;
pub mod search;
pub mod signals;
pub mod upload;
