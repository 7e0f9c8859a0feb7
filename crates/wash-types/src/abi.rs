//! The process/syscall ABI shared by the code generator and the runtime.
//!
//! Generated modules import syscalls from the [`SYSCALL_MODULE`] namespace.
//! Every parameter and result is an `i32`; failures are reported as negative
//! status codes rather than traps.
//!
//! | name     | params                              | result |
//! |----------|-------------------------------------|--------|
//! | `fork`   | `path_ptr, arg_buf_ptr, arg_buf_len` | pid or status |
//! | `print`  | `channel, addr, len`                | chars written or status |
//! | `getenv` | `pid, name_ptr`                     | value pointer or status |
//! | `setenv` | `pid, name_ptr, value_ptr`          | `0` or status |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Import namespace for the linear memory and host globals.
pub const ENV_MODULE: &str = "env";
/// Import namespace for syscalls.
pub const SYSCALL_MODULE: &str = "syscall";
/// Import namespace for corelib intrinsics.
pub const CORELIB_MODULE: &str = "corelib";
/// Name of the imported linear memory.
pub const MEMORY_NAME: &str = "memory";
/// Name of the host global holding the running process id.
pub const PID_GLOBAL: &str = "pid";
/// Name of the single exported entry point.
pub const ENTRY_POINT: &str = "main";

// ── Status codes ─────────────────────────────────────────────────────────────

/// Unresolved executable path or unset variable.
pub const STATUS_NOT_FOUND: i32 = -1;
/// A pointer or range falls outside the caller's memory.
pub const STATUS_OUT_OF_BOUNDS: i32 = -2;
/// The argument buffer does not fit into the new process.
pub const STATUS_TOO_LARGE: i32 = -3;
/// Success for syscalls without a meaningful result.
pub const STATUS_OK: i32 = 0;

/// A host-implemented operation callable from generated code.
///
/// Variant order is the order imports are declared in a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syscall {
    Fork,
    Print,
    Getenv,
    Setenv,
}

impl Syscall {
    pub const ALL: [Syscall; 4] = [
        Syscall::Fork,
        Syscall::Print,
        Syscall::Getenv,
        Syscall::Setenv,
    ];

    /// Import name.
    pub fn name(self) -> &'static str {
        match self {
            Syscall::Fork => "fork",
            Syscall::Print => "print",
            Syscall::Getenv => "getenv",
            Syscall::Setenv => "setenv",
        }
    }

    /// Number of `i32` parameters.
    pub fn arity(self) -> usize {
        match self {
            Syscall::Getenv => 2,
            Syscall::Fork | Syscall::Print | Syscall::Setenv => 3,
        }
    }

    /// Whether the result is a pointer into the caller's memory on success.
    pub fn returns_pointer(self) -> bool {
        matches!(self, Syscall::Getenv)
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a name that is not part of the ABI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown syscall: {0}")]
pub struct UnknownSyscall(pub String);

impl FromStr for Syscall {
    type Err = UnknownSyscall;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Syscall::ALL
            .into_iter()
            .find(|sc| sc.name() == s)
            .ok_or_else(|| UnknownSyscall(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syscall_names_round_trip() {
        for sc in Syscall::ALL {
            assert_eq!(sc.name().parse::<Syscall>(), Ok(sc));
        }
    }

    #[test]
    fn test_unknown_syscall() {
        let err = "exit".parse::<Syscall>().unwrap_err();
        assert_eq!(err.to_string(), "unknown syscall: exit");
    }

    #[test]
    fn test_import_order_follows_declaration() {
        let mut sorted = vec![Syscall::Setenv, Syscall::Fork, Syscall::Getenv];
        sorted.sort();
        assert_eq!(sorted, vec![Syscall::Fork, Syscall::Getenv, Syscall::Setenv]);
    }

    #[test]
    fn test_signatures() {
        assert_eq!(Syscall::Fork.arity(), 3);
        assert_eq!(Syscall::Print.arity(), 3);
        assert_eq!(Syscall::Getenv.arity(), 2);
        assert_eq!(Syscall::Setenv.arity(), 3);
        assert!(Syscall::Getenv.returns_pointer());
        assert!(!Syscall::Setenv.returns_pointer());
    }
}
