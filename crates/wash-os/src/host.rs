//! Host collaborators: executable lookup, process creation and output.
//!
//! The syscall table only sees these through traits.  The in-memory
//! implementations here back the tests and simple embedders.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{OsError, OsResult};
use crate::process::{Environment, Pid, Process};
use crate::syscalls::SyscallTable;

/// Output channel for standard output.
pub const STDOUT: i32 = 1;
/// Output channel for standard error.
pub const STDERR: i32 = 2;

/// A runnable program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executable {
    pub path: String,
    /// The compiled WebAssembly module.
    pub module: Vec<u8>,
    /// First byte after the module's constant data.
    pub heap_base: u32,
    /// Initial memory size in pages.
    pub memory_pages: u32,
}

/// Resolves executable paths.
pub trait ExecutableRegistry: Send + Sync {
    fn lookup(&self, path: &str) -> Option<Arc<Executable>>;
}

/// Creates processes.
pub trait ProcessManager {
    /// Start `executable` with `args` and an initial environment.
    ///
    /// Fails with [`OsError::ArgumentsTooLarge`] when the arguments do not fit
    /// into the new process's memory.
    fn exec(
        &mut self,
        executable: Arc<Executable>,
        args: Vec<String>,
        env: Environment,
    ) -> OsResult<Pid>;
}

/// Receives text printed by processes.
pub trait OutputSink {
    fn write(&mut self, channel: i32, text: &str);
}

// ══════════════════════════════════════════════════════════════════════════════
// Executable registry
// ══════════════════════════════════════════════════════════════════════════════

/// In-memory path → executable map.
#[derive(Debug, Default)]
pub struct ExecutableTable {
    entries: BTreeMap<String, Arc<Executable>>,
}

impl ExecutableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executable under its path, replacing any previous entry.
    pub fn register(&mut self, executable: Executable) -> Arc<Executable> {
        let executable = Arc::new(executable);
        self.entries
            .insert(executable.path.clone(), Arc::clone(&executable));
        executable
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ExecutableRegistry for ExecutableTable {
    fn lookup(&self, path: &str) -> Option<Arc<Executable>> {
        self.entries.get(path).cloned()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Process table
// ══════════════════════════════════════════════════════════════════════════════

/// Hosts processes and hands out pids from 1.
pub struct ProcessTable {
    registry: Arc<dyn ExecutableRegistry>,
    processes: BTreeMap<Pid, Process>,
    next_pid: Pid,
}

impl ProcessTable {
    pub fn new(registry: Arc<dyn ExecutableRegistry>) -> Self {
        Self {
            registry,
            processes: BTreeMap::new(),
            next_pid: 1,
        }
    }

    /// Look up `path` and start it with an empty environment.
    pub fn spawn(&mut self, path: &str, args: Vec<String>) -> OsResult<Pid> {
        let executable = self
            .registry
            .lookup(path)
            .ok_or_else(|| OsError::NotFound(path.to_string()))?;
        self.exec(executable, args, Environment::new())
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.processes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Remove a terminated process.
    pub fn reap(&mut self, pid: Pid) -> Option<Process> {
        self.processes.remove(&pid)
    }

    /// Run `f` against a syscall table bound to process `pid`.
    ///
    /// The process is taken out of the table for the duration of the call so
    /// that the table itself can serve as the process manager for `fork`.
    pub fn with_syscalls<R>(
        &mut self,
        pid: Pid,
        sink: &mut dyn OutputSink,
        f: impl FnOnce(&mut SyscallTable<'_>) -> R,
    ) -> OsResult<R> {
        self.bind(pid, None, sink, f)
    }

    /// Like [`with_syscalls`](Self::with_syscalls), with pointers resolved
    /// against `memory`, the linear memory of the engine running `pid`.
    pub fn with_engine_memory<R>(
        &mut self,
        pid: Pid,
        memory: &mut [u8],
        sink: &mut dyn OutputSink,
        f: impl FnOnce(&mut SyscallTable<'_>) -> R,
    ) -> OsResult<R> {
        self.bind(pid, Some(memory), sink, f)
    }

    fn bind<R>(
        &mut self,
        pid: Pid,
        memory: Option<&mut [u8]>,
        sink: &mut dyn OutputSink,
        f: impl FnOnce(&mut SyscallTable<'_>) -> R,
    ) -> OsResult<R> {
        let mut process = self
            .processes
            .remove(&pid)
            .ok_or(OsError::NoSuchProcess(pid))?;
        let result = {
            let mut table = match memory {
                Some(memory) => SyscallTable::with_memory(&mut process, memory, self, sink),
                None => SyscallTable::new(&mut process, self, sink),
            };
            f(&mut table)
        };
        self.processes.insert(pid, process);
        Ok(result)
    }
}

impl ProcessManager for ProcessTable {
    fn exec(
        &mut self,
        executable: Arc<Executable>,
        args: Vec<String>,
        env: Environment,
    ) -> OsResult<Pid> {
        let pid = self.next_pid;
        let process = Process::spawn(pid, &executable, args, env, Arc::clone(&self.registry))?;
        self.next_pid += 1;
        self.processes.insert(pid, process);
        Ok(pid)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Output sinks
// ══════════════════════════════════════════════════════════════════════════════

/// Records everything printed, per channel.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOutput {
    pub writes: Vec<(i32, String)>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to `channel`, concatenated.
    pub fn channel(&self, channel: i32) -> String {
        self.writes
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

impl OutputSink for CapturedOutput {
    fn write(&mut self, channel: i32, text: &str) {
        self.writes.push((channel, text.to_string()));
    }
}

/// Forwards [`STDERR`] to the host's stderr and every other channel to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdStreams;

impl OutputSink for StdStreams {
    fn write(&mut self, channel: i32, text: &str) {
        let result = if channel == STDERR {
            std::io::stderr().write_all(text.as_bytes())
        } else {
            std::io::stdout().write_all(text.as_bytes())
        };
        match result {
            Ok(()) => debug!(channel, bytes = text.len(), "wrote output"),
            Err(err) => warn!(channel, %err, "dropped process output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(paths: &[&str]) -> Arc<ExecutableTable> {
        let mut table = ExecutableTable::new();
        for path in paths {
            table.register(Executable {
                path: path.to_string(),
                module: Vec::new(),
                heap_base: 16,
                memory_pages: 1,
            });
        }
        Arc::new(table)
    }

    #[test]
    fn test_registry_lookup() {
        let registry = table_with(&["/bin/ls"]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("/bin/ls").unwrap().path, "/bin/ls");
        assert!(registry.lookup("/bin/cat").is_none());
    }

    #[test]
    fn test_pids_start_at_one() {
        let mut procs = ProcessTable::new(table_with(&["/bin/ls"]));
        assert_eq!(procs.spawn("/bin/ls", vec![]).unwrap(), 1);
        assert_eq!(procs.spawn("/bin/ls", vec!["-l".into()]).unwrap(), 2);
        assert_eq!(procs.pids(), vec![1, 2]);
        assert_eq!(procs.get(2).unwrap().argv(), ["-l".to_string()]);
    }

    #[test]
    fn test_failed_exec_does_not_consume_pid() {
        let mut procs = ProcessTable::new(table_with(&["/bin/ls"]));
        assert!(procs.spawn("/bin/ls", vec!["x".repeat(70_000)]).is_err());
        assert_eq!(procs.spawn("/bin/ls", vec![]).unwrap(), 1);
    }

    #[test]
    fn test_spawn_unknown_path() {
        let mut procs = ProcessTable::new(table_with(&[]));
        assert_eq!(
            procs.spawn("/bin/nope", vec![]),
            Err(OsError::NotFound("/bin/nope".into()))
        );
    }

    #[test]
    fn test_with_syscalls_restores_process() {
        let mut procs = ProcessTable::new(table_with(&["/bin/sh"]));
        let pid = procs.spawn("/bin/sh", vec![]).unwrap();
        let mut out = CapturedOutput::new();
        let seen = procs
            .with_syscalls(pid, &mut out, |table| table.process().pid())
            .unwrap();
        assert_eq!(seen, pid);
        assert!(procs.get(pid).is_some());
        assert_eq!(
            procs.with_syscalls(99, &mut out, |_| ()).unwrap_err(),
            OsError::NoSuchProcess(99)
        );
    }

    #[test]
    fn test_with_engine_memory_reads_engine_bytes() {
        let mut procs = ProcessTable::new(table_with(&["/bin/sh"]));
        let pid = procs.spawn("/bin/sh", vec![]).unwrap();
        let mut engine = vec![0u8; 64];
        engine[20..22].copy_from_slice(b"hi");
        let mut out = CapturedOutput::new();
        let status = procs
            .with_engine_memory(pid, &mut engine, &mut out, |table| table.print(STDOUT, 20, 2))
            .unwrap();
        assert_eq!(status, Ok(2));
        assert_eq!(out.channel(STDOUT), "hi");
        assert!(procs.get(pid).is_some());
    }

    #[test]
    fn test_executable_serializes() {
        let exe = Executable {
            path: "/bin/true".into(),
            module: vec![0, 97, 115, 109],
            heap_base: 16,
            memory_pages: 1,
        };
        let json = serde_json::to_value(&exe).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "path": "/bin/true",
                "module": [0, 97, 115, 109],
                "heap_base": 16,
                "memory_pages": 1
            })
        );
        let back: Executable = serde_json::from_value(json).unwrap();
        assert_eq!(back, exe);
    }

    #[test]
    fn test_captured_output_serializes_as_pairs() {
        let mut out = CapturedOutput::new();
        out.write(STDERR, "oops");
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"writes":[[2,"oops"]]}"#
        );
    }

    #[test]
    fn test_captured_output_by_channel() {
        let mut out = CapturedOutput::new();
        out.write(STDOUT, "a");
        out.write(STDERR, "oops");
        out.write(STDOUT, "b");
        assert_eq!(out.channel(STDOUT), "ab");
        assert_eq!(out.channel(STDERR), "oops");
    }
}
