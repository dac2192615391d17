//! MEI import entry points
//!
//! Each function runs a full conversion of the given document. Nothing is
//! kept between calls.

use crate::api::helpers::{conversion_error, options_error, parse_options, serialize, to_json};
use crate::mei_import::MeiConverter;
use crate::{wasm_error, wasm_info, wasm_log};
use wasm_bindgen::prelude::*;

fn converter(options_json: Option<String>) -> Result<MeiConverter, JsValue> {
    let options = parse_options(options_json.as_deref()).map_err(options_error)?;
    wasm_log!("  Options: {:?}", options);
    Ok(MeiConverter::with_options(options))
}

/// Import an MEI document
///
/// # Parameters
/// * `mei` - The MEI document as a string
/// * `options_json` - Optional JSON object of converter options
///
/// # Returns
/// The converted score as a JavaScript object
#[wasm_bindgen(js_name = importMEI)]
pub fn import_mei(mei: &str, options_json: Option<String>) -> Result<JsValue, JsValue> {
    wasm_info!("importMEI called ({} bytes)", mei.len());

    let score = converter(options_json)?
        .convert(mei)
        .map_err(conversion_error)?;

    wasm_info!("  {}", score);
    serialize(&score, "Score serialization error")
}

/// Import an MEI document and return the score as a JSON string
#[wasm_bindgen(js_name = importMEIJson)]
pub fn import_mei_json(mei: &str, options_json: Option<String>) -> Result<String, JsValue> {
    wasm_info!("importMEIJson called ({} bytes)", mei.len());

    let score = converter(options_json)?
        .convert(mei)
        .map_err(conversion_error)?;

    let json = to_json(&score, "Score serialization error")?;
    wasm_info!("  JSON generated: {} bytes", json.len());
    Ok(json)
}

/// One-line description of an MEI document ("Score: 2 part(s), ...")
#[wasm_bindgen(js_name = meiSummary)]
pub fn mei_summary(mei: &str) -> Result<String, JsValue> {
    match MeiConverter::new().convert(mei) {
        Ok(score) => Ok(score.to_string()),
        Err(err) => {
            wasm_error!("Summary failed: {}", err);
            Err(conversion_error(err))
        }
    }
}
