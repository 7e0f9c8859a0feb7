//! Pipeline error types.

use thiserror::Error;
use wash_codegen::CodegenError;

/// Errors from any stage of the pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The syntax tree JSON is malformed or names an unknown node kind.
    #[error("invalid syntax tree: {0}")]
    Syntax(#[from] serde_json::Error),

    /// Lowering failed.
    #[error(transparent)]
    Codegen(#[from] CodegenError),

    /// The generated text did not assemble.
    #[error("WAT assembly failed: {0}")]
    Wat(String),

    /// The assembled module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),
}

impl CompileError {
    /// Stable stage name used in structured output.
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Syntax(_) => "syntax",
            CompileError::Codegen(_) => "codegen",
            CompileError::Wat(_) => "assemble",
            CompileError::ValidationFailed(_) => "validate",
        }
    }
}

/// Pipeline result type alias.
pub type PipelineResult<T> = Result<T, CompileError>;
