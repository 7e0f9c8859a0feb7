//! wash compiler: orchestrates the full compilation pipeline.
//!
//! ```text
//! syntax tree JSON → Program → WAT (wash-codegen) → .wasm (wat) → validation (wasmparser)
//! ```
//!
//! [`compile`] works on an in-memory [`Program`]; [`compile_source`] starts
//! from the parser's JSON; [`compile_json`] additionally folds the outcome
//! into a serializable [`CompileResult`] for callers across a JSON boundary.

pub mod error;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use wash_codegen::{CodegenOptions, Dependencies};
use wash_types::Program;

pub use error::{CompileError, PipelineResult};

/// A compiled, validated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub wat: String,
    pub wasm: Vec<u8>,
    pub dependencies: Dependencies,
    /// First byte after constant data; the heap base for processes.
    pub data_end: u32,
    pub memory_pages: u32,
    /// Lowercase hex SHA-256 of `wasm`.
    pub hash: String,
}

/// Parse the parser's JSON output.
pub fn parse_program(json: &str) -> PipelineResult<Program> {
    Ok(serde_json::from_str(json)?)
}

/// Compile a program with default options.
pub fn compile(program: &Program) -> PipelineResult<CompileOutput> {
    compile_with_options(program, CodegenOptions::default())
}

/// Lower, assemble and validate a program.
pub fn compile_with_options(
    program: &Program,
    options: CodegenOptions,
) -> PipelineResult<CompileOutput> {
    let module = wash_codegen::compile_with_options(program, options)?;
    let wat = module.wat();

    let wasm = wat::parse_str(&wat).map_err(|e| CompileError::Wat(e.to_string()))?;
    wasmparser::validate(&wasm).map_err(|e| CompileError::ValidationFailed(e.to_string()))?;

    let hash = sha256_hex(&wasm);
    debug!(
        wat_len = wat.len(),
        wasm_len = wasm.len(),
        hash = %hash,
        "compiled module"
    );

    Ok(CompileOutput {
        wat,
        wasm,
        dependencies: module.dependencies,
        data_end: module.data_end,
        memory_pages: module.memory_pages,
        hash,
    })
}

/// Compile the parser's JSON output.
pub fn compile_source(json: &str) -> PipelineResult<CompileOutput> {
    let program = parse_program(json)?;
    compile(&program)
}

// ══════════════════════════════════════════════════════════════════════════════
// Structured result
// ══════════════════════════════════════════════════════════════════════════════

/// One failure, tagged with the pipeline stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDiagnostic {
    pub stage: String,
    pub message: String,
}

impl From<&CompileError> for CompileDiagnostic {
    fn from(err: &CompileError) -> Self {
        Self {
            stage: err.stage().to_string(),
            message: err.to_string(),
        }
    }
}

/// Serializable outcome of [`compile_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    pub wat: Option<String>,
    pub wasm: Option<Vec<u8>>,
    pub hash: Option<String>,
    pub data_end: Option<u32>,
    pub errors: Vec<CompileDiagnostic>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl From<PipelineResult<CompileOutput>> for CompileResult {
    fn from(result: PipelineResult<CompileOutput>) -> Self {
        match result {
            Ok(output) => Self {
                success: true,
                wat: Some(output.wat),
                wasm: Some(output.wasm),
                hash: Some(output.hash),
                data_end: Some(output.data_end),
                errors: Vec::new(),
            },
            Err(err) => {
                warn!(stage = err.stage(), %err, "compilation failed");
                Self {
                    success: false,
                    wat: None,
                    wasm: None,
                    hash: None,
                    data_end: None,
                    errors: vec![CompileDiagnostic::from(&err)],
                }
            }
        }
    }
}

/// Compile the parser's JSON output into a [`CompileResult`].
pub fn compile_json(json: &str) -> CompileResult {
    compile_source(json).into()
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_error_stages() {
        let syntax = parse_program("[{\"type\": \"nope\"}]").unwrap_err();
        assert_eq!(syntax.stage(), "syntax");
        let codegen = CompileError::from(wash_codegen::CodegenError::Unsupported("x".into()));
        assert_eq!(codegen.stage(), "codegen");
        assert_eq!(codegen.to_string(), "unsupported feature: x");
    }
}
