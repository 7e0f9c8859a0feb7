//! wash process model and syscall runtime.
//!
//! Generated modules call back into the host through the syscalls declared in
//! [`wash_types::abi`].  This crate implements them against an in-memory
//! process model:
//!
//! - [`ProcessMemory`]: linear memory with a bump allocator
//! - [`MemoryView`]: the same allocator over bytes an engine owns
//! - [`Process`]: memory, environment and argument vector
//! - [`SyscallTable`]: the syscalls bound to one calling process
//! - [`host`]: registry, process manager and output traits, with in-memory
//!   implementations
//!
//! The runtime never trusts a pointer: every access is range-checked against
//! the caller's memory and reported as a status code.

pub mod error;
pub mod host;
pub mod memory;
pub mod process;
pub mod strings;
pub mod syscalls;

pub use error::{OsError, OsResult};
pub use host::{
    CapturedOutput, Executable, ExecutableRegistry, ExecutableTable, OutputSink, ProcessManager,
    ProcessTable, StdStreams, STDERR, STDOUT,
};
pub use memory::{Heap, MemoryView, ProcessMemory, PAGE_SIZE};
pub use process::{Environment, Pid, Process};
pub use strings::{load_str, write_str};
pub use syscalls::SyscallTable;
