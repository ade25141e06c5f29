// JavaScript entry point of the WASM module.

use wasm_bindgen::prelude::*;

/// Compile one schema file. Returns `Ok\n<base64url request>` or
/// `Err\n<line:col message>...`.
#[wasm_bindgen(js_name = compileSingleFile)]
pub fn compile_single_file(file_content: &str) -> String {
    crate::single_file::compile_single_file(file_content)
}
