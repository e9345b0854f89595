//! Terminal movie & TV recommendation browser for Douban-style feeds.
//!
//! The binary in `main.rs` is thin glue; everything it wires together is
//! exported here so integration tests can drive the same code paths:
//!
//! - [`douban`] - the feed pipeline (proxy chain, pages, cursor, covers)
//! - [`storage`] - SQLite-backed settings and per-category tag lists
//! - [`app`] - application state mutated by the event loop
//! - [`ui`] - ratatui rendering, input handling, and the run loop
//! - [`config`] - the optional `config.toml`
//! - [`util`] - text scrubbing and remote-URL validation

pub mod app;
pub mod config;
pub mod douban;
pub mod storage;
pub mod ui;
pub mod util;
