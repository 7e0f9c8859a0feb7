//! The syscall table bound to one calling process.
//!
//! Every entry takes and returns `i32`s exactly as the engine passes them.
//! Pointers are reinterpreted as unsigned addresses, so a negative pointer is
//! simply out of bounds.  Recoverable failures come back as the negative
//! status codes in [`wash_types::abi`]; only engine-level misuse (an unknown
//! import, wrong arity) is an `Err`.

use tracing::{trace, warn};
use wash_types::abi::STATUS_OK;
use wash_types::Syscall;

use crate::error::{OsError, OsResult};
use crate::host::{OutputSink, ProcessManager};
use crate::memory::MemoryView;
use crate::process::Process;
use crate::strings::{load_str, split_packed, write_str};

/// Syscalls as seen by one process.
pub struct SyscallTable<'p> {
    process: &'p mut Process,
    /// Linear memory owned by an engine, used in place of the process's own.
    memory: Option<&'p mut [u8]>,
    manager: &'p mut dyn ProcessManager,
    sink: &'p mut dyn OutputSink,
}

impl<'p> SyscallTable<'p> {
    pub fn new(
        process: &'p mut Process,
        manager: &'p mut dyn ProcessManager,
        sink: &'p mut dyn OutputSink,
    ) -> Self {
        Self {
            process,
            memory: None,
            manager,
            sink,
        }
    }

    /// Bind to linear memory owned by an engine.
    ///
    /// Pointers resolve into `memory`; allocations still advance the
    /// process's heap.
    pub fn with_memory(
        process: &'p mut Process,
        memory: &'p mut [u8],
        manager: &'p mut dyn ProcessManager,
        sink: &'p mut dyn OutputSink,
    ) -> Self {
        Self {
            process,
            memory: Some(memory),
            manager,
            sink,
        }
    }

    /// The calling process's linear memory.
    pub fn memory(&mut self) -> MemoryView<'_> {
        match self.memory.as_deref_mut() {
            Some(bytes) => MemoryView::new(bytes, self.process.memory_mut().heap_mut()),
            None => self.process.memory_mut().view(),
        }
    }

    pub fn process(&self) -> &Process {
        &*self.process
    }

    pub fn process_mut(&mut self) -> &mut Process {
        &mut *self.process
    }

    /// Invoke a syscall by import name.
    pub fn dispatch(&mut self, name: &str, args: &[i32]) -> OsResult<i32> {
        let syscall: Syscall = name
            .parse()
            .map_err(|_| OsError::UnknownSyscall(name.to_string()))?;
        if args.len() != syscall.arity() {
            return Err(OsError::Arity {
                name: name.to_string(),
                expected: syscall.arity(),
                found: args.len(),
            });
        }
        match syscall {
            Syscall::Fork => self.fork(args[0], args[1], args[2]),
            Syscall::Print => self.print(args[0], args[1], args[2]),
            Syscall::Getenv => self.getenv(args[0], args[1]),
            Syscall::Setenv => self.setenv(args[0], args[1], args[2]),
        }
    }

    // ── fork ─────────────────────────────────────────────────────────────

    /// `fork(path_ptr, arg_buf_ptr, arg_buf_len) -> pid`
    ///
    /// Starts the executable at the NUL-terminated path with the packed
    /// arguments.  The child inherits a copy of the caller's environment.
    pub fn fork(&mut self, path_ptr: i32, arg_buf: i32, arg_buf_len: i32) -> OsResult<i32> {
        let result = self.try_fork(addr(path_ptr), addr(arg_buf), addr(arg_buf_len));
        self.finish(Syscall::Fork, result)
    }

    fn try_fork(&mut self, path_ptr: u32, arg_buf: u32, arg_buf_len: u32) -> OsResult<i32> {
        let (path, args) = {
            let memory = self.memory();
            memory.check_range(path_ptr, 1)?;
            memory.check_range(arg_buf, arg_buf_len)?;
            let path = load_str(&memory, path_ptr)?;
            let args = split_packed(memory.read(arg_buf, arg_buf_len)?, arg_buf)?;
            (path, args)
        };

        let executable = self
            .process
            .registry()
            .lookup(&path)
            .ok_or(OsError::NotFound(path))?;
        let env = self.process.env().clone();
        let pid = self.manager.exec(executable, args, env)?;
        Ok(pid as i32)
    }

    // ── print ────────────────────────────────────────────────────────────

    /// `print(channel, addr, len) -> chars written`
    pub fn print(&mut self, channel: i32, byte_addr: i32, byte_len: i32) -> OsResult<i32> {
        let result = self.try_print(channel, addr(byte_addr), addr(byte_len));
        self.finish(Syscall::Print, result)
    }

    fn try_print(&mut self, channel: i32, byte_addr: u32, byte_len: u32) -> OsResult<i32> {
        let text = {
            let memory = self.memory();
            String::from_utf8_lossy(memory.read(byte_addr, byte_len)?).into_owned()
        };
        self.sink.write(channel, &text);
        Ok(text.chars().count() as i32)
    }

    // ── environment ──────────────────────────────────────────────────────

    /// `getenv(pid, name_ptr) -> value_ptr`
    ///
    /// The value is copied into newly allocated memory of the caller.  An
    /// unset variable touches no memory.
    pub fn getenv(&mut self, pid: i32, name_ptr: i32) -> OsResult<i32> {
        self.check_pid(Syscall::Getenv, pid);
        let result = self.try_getenv(addr(name_ptr));
        self.finish(Syscall::Getenv, result)
    }

    fn try_getenv(&mut self, name_ptr: u32) -> OsResult<i32> {
        let name = load_str(&self.memory(), name_ptr)?;
        let value = self
            .process
            .getenv(&name)
            .ok_or_else(|| OsError::NotFound(name.clone()))?
            .to_string();
        let ptr = write_str(&mut self.memory(), &value)?;
        Ok(ptr as i32)
    }

    /// `setenv(pid, name_ptr, value_ptr) -> 0`
    pub fn setenv(&mut self, pid: i32, name_ptr: i32, value_ptr: i32) -> OsResult<i32> {
        self.check_pid(Syscall::Setenv, pid);
        let result = self.try_setenv(addr(name_ptr), addr(value_ptr));
        self.finish(Syscall::Setenv, result)
    }

    fn try_setenv(&mut self, name_ptr: u32, value_ptr: u32) -> OsResult<i32> {
        let name = load_str(&self.memory(), name_ptr)?;
        let value = load_str(&self.memory(), value_ptr)?;
        self.process.setenv(name, value);
        Ok(STATUS_OK)
    }

    // ── helpers ──────────────────────────────────────────────────────────

    fn check_pid(&self, syscall: Syscall, pid: i32) {
        if pid as u32 != self.process.pid() {
            warn!(
                %syscall,
                requested = pid,
                bound = self.process.pid(),
                "pid does not match the calling process"
            );
        }
    }

    /// Fold status-bearing errors into their code.
    fn finish(&self, syscall: Syscall, result: OsResult<i32>) -> OsResult<i32> {
        let status = match result {
            Ok(value) => value,
            Err(err) => match err.status_code() {
                Some(code) => {
                    trace!(pid = self.process.pid(), %syscall, %err, "syscall failed");
                    code
                }
                None => return Err(err),
            },
        };
        trace!(pid = self.process.pid(), %syscall, status, "syscall returned");
        Ok(status)
    }
}

fn addr(value: i32) -> u32 {
    value as u32
}
