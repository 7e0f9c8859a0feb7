//! Codegen error types.

use thiserror::Error;
use wash_types::Operator;

/// Errors that abort code generation.
///
/// Lowering stops at the first error; no partial module is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// A node kind the code generator does not implement (command invocation).
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// An operand (or condition) whose type cannot be coerced to `i32`.
    #[error("cannot apply `{operator}` to an operand of type {found}")]
    InvalidOperand { operator: String, found: String },

    /// An operator applied to the wrong number of operands.
    #[error("operator `{operator}` expects {expected} operand(s), found {found}")]
    OperandCount {
        operator: Operator,
        expected: usize,
        found: usize,
    },

    /// The two arms of a conditional leave different values.
    #[error("conditional arms disagree: then yields {then_ty}, else yields {else_ty}")]
    MismatchedArms { then_ty: String, else_ty: String },

    /// Constant data would extend past the addressable range of a pointer.
    #[error("constant data of {len} byte(s) at offset {offset} does not fit in linear memory")]
    DataOverflow { offset: u32, len: usize },

    /// A name that cannot be used as a WAT identifier.
    #[error("invalid name {name:?} in `{node}` node")]
    InvalidName { node: String, name: String },

    /// An internal consistency check failed.
    #[error("internal codegen error: {0}")]
    Internal(String),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
