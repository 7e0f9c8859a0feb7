//! Runtime error types.

use thiserror::Error;
use wash_types::abi::{STATUS_NOT_FOUND, STATUS_OUT_OF_BOUNDS, STATUS_TOO_LARGE};

/// Errors raised by process memory, string marshalling and syscalls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OsError {
    /// A pointer or byte range falls outside process memory.
    #[error("access of {len} byte(s) at {addr} is outside memory of {size} bytes")]
    OutOfBounds { addr: u32, len: u32, size: u32 },

    /// A string runs off the end of memory (or of its buffer) without a NUL.
    #[error("string at {addr} is not NUL-terminated")]
    Unterminated { addr: u32 },

    /// The bump allocator ran out of memory.
    #[error("cannot allocate {requested} byte(s): {available} available")]
    OutOfMemory { requested: u32, available: u32 },

    /// A path or variable does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// The argument vector does not fit into a new process.
    #[error("arguments need {needed} byte(s) but the new process has {available}")]
    ArgumentsTooLarge { needed: u32, available: u32 },

    /// The engine called an import the table does not provide.
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),

    /// The engine called a syscall with the wrong number of arguments.
    #[error("syscall `{name}` takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    /// No hosted process has the pid.
    #[error("no such process: {0}")]
    NoSuchProcess(u32),
}

impl OsError {
    /// The negative status code reported to generated code.
    ///
    /// `None` for errors that are traps rather than statuses.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            OsError::OutOfBounds { .. } | OsError::Unterminated { .. } => {
                Some(STATUS_OUT_OF_BOUNDS)
            }
            OsError::NotFound(_) => Some(STATUS_NOT_FOUND),
            OsError::ArgumentsTooLarge { .. } | OsError::OutOfMemory { .. } => {
                Some(STATUS_TOO_LARGE)
            }
            OsError::UnknownSyscall(_) | OsError::Arity { .. } | OsError::NoSuchProcess(_) => {
                None
            }
        }
    }
}

/// Runtime result type alias.
pub type OsResult<T> = Result<T, OsError>;
