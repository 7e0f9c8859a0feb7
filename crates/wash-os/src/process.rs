//! Processes: memory, environment and argument vector.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{OsError, OsResult};
use crate::host::{Executable, ExecutableRegistry};
use crate::memory::ProcessMemory;
use crate::strings::pack;

/// Process identifier.  Pids start at 1.
pub type Pid = u32;

/// Environment variables: name → value.
pub type Environment = BTreeMap<String, String>;

/// One running instance of an executable.
pub struct Process {
    pid: Pid,
    memory: ProcessMemory,
    env: Environment,
    argv: Vec<String>,
    /// Address of the packed argument buffer.
    argv_ptr: u32,
    registry: Arc<dyn ExecutableRegistry>,
}

impl Process {
    /// Create a process with fresh memory and write its argument vector into
    /// the heap.
    pub fn spawn(
        pid: Pid,
        executable: &Executable,
        argv: Vec<String>,
        env: Environment,
        registry: Arc<dyn ExecutableRegistry>,
    ) -> OsResult<Self> {
        let mut memory = ProcessMemory::new(executable.memory_pages, executable.heap_base);
        let packed = pack(&argv);
        let needed = u32::try_from(packed.len()).unwrap_or(u32::MAX);
        let argv_ptr = if packed.is_empty() {
            0
        } else {
            let ptr = memory.alloc(needed).map_err(|_| OsError::ArgumentsTooLarge {
                needed,
                available: memory.available(),
            })?;
            memory.write(ptr, &packed)?;
            ptr
        };

        debug!(pid, path = %executable.path, argc = argv.len(), "spawned process");
        Ok(Self {
            pid,
            memory,
            env,
            argv,
            argv_ptr,
            registry,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn memory(&self) -> &ProcessMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut ProcessMemory {
        &mut self.memory
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn getenv(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn setenv(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The `(argc, argv)` pair passed to the entry point.
    pub fn main_args(&self) -> (i32, i32) {
        (self.argv.len() as i32, self.argv_ptr as i32)
    }

    pub fn registry(&self) -> &Arc<dyn ExecutableRegistry> {
        &self.registry
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("memory_size", &self.memory.size())
            .field("heap_top", &self.memory.heap_top())
            .field("env", &self.env)
            .field("argv", &self.argv)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ExecutableTable;
    use crate::strings::load_str;

    fn executable(pages: u32, heap_base: u32) -> Executable {
        Executable {
            path: "/bin/test".into(),
            module: Vec::new(),
            heap_base,
            memory_pages: pages,
        }
    }

    #[test]
    fn test_spawn_writes_argv_at_heap_base() {
        let registry = Arc::new(ExecutableTable::new());
        let proc = Process::spawn(
            7,
            &executable(1, 64),
            vec!["echo".into(), "hi".into()],
            Environment::new(),
            registry,
        )
        .unwrap();
        assert_eq!(proc.main_args(), (2, 64));
        assert_eq!(load_str(proc.memory(), 64).unwrap(), "echo");
        assert_eq!(load_str(proc.memory(), 69).unwrap(), "hi");
        assert_eq!(proc.memory().heap_top(), 72);
    }

    #[test]
    fn test_spawn_without_args() {
        let proc = Process::spawn(
            1,
            &executable(1, 16),
            Vec::new(),
            Environment::new(),
            Arc::new(ExecutableTable::new()),
        )
        .unwrap();
        assert_eq!(proc.main_args(), (0, 0));
        assert_eq!(proc.memory().heap_top(), 16);
    }

    #[test]
    fn test_spawn_rejects_oversized_args() {
        let big = "x".repeat(70_000);
        let err = Process::spawn(
            1,
            &executable(1, 16),
            vec![big],
            Environment::new(),
            Arc::new(ExecutableTable::new()),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), Some(-3));
    }

    #[test]
    fn test_environment() {
        let mut env = Environment::new();
        env.insert("HOME".into(), "/home/wash".into());
        let mut proc = Process::spawn(
            1,
            &executable(1, 16),
            Vec::new(),
            env,
            Arc::new(ExecutableTable::new()),
        )
        .unwrap();
        assert_eq!(proc.getenv("HOME"), Some("/home/wash"));
        proc.setenv("HOME", "/tmp");
        assert_eq!(proc.getenv("HOME"), Some("/tmp"));
        assert_eq!(proc.getenv("PATH"), None);
    }
}
