//! wash compiler as a WASM module for browser environments.
//!
//! This crate exposes the wash compilation pipeline via `wasm-bindgen`, so the
//! in-browser shell can turn its parser's syntax tree into a runnable module.
//!
//! # Usage (JavaScript)
//!
//! ```js
//! import init, { compile } from 'wash-wasm';
//!
//! await init();
//!
//! const result = JSON.parse(compile(JSON.stringify(ast)));
//! // { success: true, wat: "(module ...)", wasm: [0, 97, 115, 109, ...], hash: "…", errors: [] }
//! ```

use wasm_bindgen::prelude::*;

/// Compile a syntax tree (the parser's JSON output) to WASM.
///
/// Returns a JSON string containing a `CompileResult`.  On failure `success`
/// is `false`, `wat`/`wasm`/`hash` are `null` and `errors` lists the stage
/// and message of the failure.
#[wasm_bindgen]
pub fn compile(ast_json: &str) -> String {
    let result = wash_compiler::compile_json(ast_json);
    serde_json::to_string(&result).unwrap_or_else(|e| {
        format!(
            r#"{{"success":false,"wat":null,"wasm":null,"hash":null,"data_end":null,"errors":[{{"stage":"serialize","message":"Serialization error: {}"}}]}}"#,
            e
        )
    })
}

/// Return the compiler version string.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
