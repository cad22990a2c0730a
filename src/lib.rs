//! # chatgpt-md-export
//!
//! Converts a [ChatGPT](https://chatgpt.com) data export into local Markdown files.
//!
//! ## What it does
//!
//! The export ZIP from *Settings → Data controls → Export data* contains
//! `conversations.json` and the images attached to or generated in your chats.
//! This tool reads that file, walks every conversation's message tree and writes one
//! Markdown file per conversation, with optional YAML frontmatter for Obsidian,
//! collapsible sections for long messages, `$…$` math and copied or embedded images.
//!
//! The export folder is only read. Nothing but the output folder is written.
//!
//! ## Incremental export
//!
//! With frontmatter enabled, each file records its conversation id and last update
//! time. Re-running over the same output folder skips conversations that have not
//! changed since they were written; `--force` rewrites everything.
//!
//! ## Usage
//!
//! ```sh
//! # Convert an unpacked export
//! chatgpt-md-export ~/Downloads/chatgpt-export ~/notes/chatgpt
//!
//! # Edit settings and run from a window
//! chatgpt-md-export --gui
//! ```
//!
//! Settings are persisted in `~/.config/chatgpt-md-export/config.toml`.
pub mod assets;
pub mod config;
pub mod export;
#[cfg(feature = "gui")]
pub mod gui;
pub mod importer;
pub mod latex;
pub mod renderer;
pub mod utils;

pub use config::{ConfigStore, ExportConfig};
pub use export::{ExportSummary, execute};
