//! MEI importer WASM API
//!
//! The JavaScript-facing entry points of the importer.
//!
//! # Module Structure
//!
//! - `helpers`: Shared utilities for serialization, option parsing, error handling, and logging
//! - `import`: MEI conversion entry points

pub mod helpers;
pub mod import;

// Re-export all public functions to keep a flat JavaScript API
pub use import::{import_mei, import_mei_json, mei_summary};
