//! Terminal user interface.
//!
//! Everything the browser draws and reacts to lives here:
//! - The event loop (`run`) multiplexing input, task results, and ticks
//! - Keyboard handling for the browse and detail views plus the overlays
//! - Widgets for the tag panel, card grid, detail card, and status line
//!
//! # Module Structure
//!
//! - `loop_runner` - Event loop and terminal setup/restore
//! - `input` - Keyboard dispatch
//! - `events` - Background task completion handling
//! - `render` - Frame assembly and overlays
//! - `helpers` - Task spawning and panic capture
//! - `grid` - Card grid widget
//! - `tagbar` - Tag list widget
//! - `detail` - Detail card widget
//! - `status` - Status bar widget

mod detail;
mod events;
mod grid;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod render;
mod status;
mod tagbar;

pub use loop_runner::{run, Action};
