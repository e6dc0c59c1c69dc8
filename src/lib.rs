//! A small text-templating engine.
//!
//! Templates mix literal text with `[[ … ]]` markers:
//! - `[[= expr ]]` writes `expr` HTML-escaped,
//! - `[[- expr ]]` writes `expr` as is,
//! - `[[ stmt ]]` runs a statement (blocks may open in one marker and
//!   close in a later one).
//!
//! ```
//! use serde_json::json;
//! use tinplate::Engine;
//!
//! let engine = Engine::new();
//! let template = "[[ for (const n of items) { ]]<li>[[= n ]]</li>[[ } ]]";
//! let out = engine.render(template, &json!({ "items": ["a", "<b>"] })).unwrap();
//! assert_eq!(out, "<li>a</li><li>&lt;b&gt;</li>");
//! ```
//!
//! Optional features are plugins installed with [`Engine::use_plugin`]; see
//! [`plugin`].

/// Bounded cache of compiled routines.
pub mod cache;

/// Handles argument parsing and the command line runner.
pub mod cli;

/// Engine configuration files.
pub mod config;

/// Constants shared across the crate.
pub mod constants;

/// The render driver.
pub mod engine;

/// Defines custom error types.
pub mod error;

/// HTML escaping of rendered values.
pub mod escape;

/// Extension traits for standard library types.
pub mod ext;

/// Rendering files and loading fragments and data from disk.
pub mod loader;

/// The plugin protocol and bundled plugins.
pub mod plugin;

/// The routine language: parser and interpreter.
pub mod script;

/// Marker tokenizing and routine code generation.
pub mod template;

pub use engine::Engine;
pub use error::{Error, Result};
pub use plugin::{compose, Plugin, PluginContext};
