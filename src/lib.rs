//! MEI Import WASM Module
//!
//! Converts Music Encoding Initiative documents into a multi-part score
//! model, usable natively or from JavaScript.

pub mod mei_import;
pub mod api;

// Re-export commonly used types
pub use mei_import::{convert_str, ConverterOptions, MeiConverter, MeiError, MeiResult, Score};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    if console_log::init_with_level(log::Level::Debug).is_err() {
        return;
    }

    log::info!("MEI import WASM module initialized");
}
