//! Compile context: dependency tracking, constant data and loop labels.
//!
//! Compilation is two-phase.  Lowering mutates a [`CompileContext`]; once the
//! whole tree is lowered, [`CompileContext::finish`] consumes it and yields a
//! [`Linkage`], the only place import declarations can be produced from.  The
//! import list therefore always reflects the complete traversal.

use std::collections::BTreeSet;

use serde::Serialize;
use wash_types::abi::{ENV_MODULE, MEMORY_NAME};
use wash_types::Syscall;

use crate::corelib::Corelib;
use crate::error::{CodegenError, CodegenResult};
use crate::node::WatNode;
use crate::syscall;
use crate::types::{CodegenOptions, LOOP_LABEL_PREFIX, MAX_DATA_END, WASM_PAGE_SIZE};

/// A constant byte blob placed at a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

/// Mutable state threaded through every lowering call.
#[derive(Debug)]
pub struct CompileContext {
    options: CodegenOptions,
    globals: BTreeSet<String>,
    syscalls: BTreeSet<Syscall>,
    corelib: BTreeSet<Corelib>,
    data: Vec<DataItem>,
    /// Next free data offset.
    next_offset: u32,
    /// In-flight loop labels, innermost last.
    branches: Vec<u32>,
    /// Next label to hand out; labels are never reused within a compilation.
    next_branch: u32,
}

impl CompileContext {
    pub fn new(options: CodegenOptions) -> Self {
        Self {
            options,
            globals: BTreeSet::new(),
            syscalls: BTreeSet::new(),
            corelib: BTreeSet::new(),
            data: Vec::new(),
            next_offset: options.data_base,
            branches: Vec::new(),
            next_branch: 0,
        }
    }

    // ── Dependencies ─────────────────────────────────────────────────────

    pub fn add_global_dependency(&mut self, name: &str) {
        if !self.globals.contains(name) {
            self.globals.insert(name.to_string());
        }
    }

    pub fn add_syscall_dependency(&mut self, syscall: Syscall) {
        self.syscalls.insert(syscall);
    }

    pub fn add_corelib_dependency(&mut self, intrinsic: Corelib) {
        self.corelib.insert(intrinsic);
    }

    pub fn uses_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn uses_syscall(&self, syscall: Syscall) -> bool {
        self.syscalls.contains(&syscall)
    }

    pub fn uses_corelib(&self, intrinsic: Corelib) -> bool {
        self.corelib.contains(&intrinsic)
    }

    // ── Constant data ────────────────────────────────────────────────────

    /// Register a constant blob and return its offset.
    ///
    /// Offsets are strictly increasing.  An empty blob still reserves one
    /// byte so that no two items share an offset.
    ///
    /// Fails when the item would end past [`MAX_DATA_END`].
    pub fn add_data_item(&mut self, bytes: Vec<u8>) -> CodegenResult<u32> {
        let offset = self.next_offset;
        let end = u32::try_from(bytes.len().max(1))
            .ok()
            .and_then(|footprint| offset.checked_add(footprint))
            .filter(|end| *end <= MAX_DATA_END)
            .ok_or(CodegenError::DataOverflow {
                offset,
                len: bytes.len(),
            })?;
        self.next_offset = end;
        self.data.push(DataItem { offset, bytes });
        Ok(offset)
    }

    /// Register `text` as a NUL-terminated string.
    pub fn add_string(&mut self, text: &str) -> CodegenResult<u32> {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        self.add_data_item(bytes)
    }

    pub fn data_items(&self) -> &[DataItem] {
        &self.data
    }

    // ── Branch labels ────────────────────────────────────────────────────

    /// Allocate a label for a loop about to be lowered.
    pub fn alloc_branch_identifier(&mut self) -> u32 {
        let id = self.next_branch;
        self.next_branch += 1;
        self.branches.push(id);
        id
    }

    /// Release the innermost label.
    pub fn dealloc_branch_identifier(&mut self) -> CodegenResult<u32> {
        self.branches.pop().ok_or_else(|| {
            CodegenError::Internal("branch identifier released with none in flight".into())
        })
    }

    /// Number of labels currently in flight.
    pub fn branch_depth(&self) -> usize {
        self.branches.len()
    }

    // ── Phase transition ─────────────────────────────────────────────────

    /// End the lowering phase.
    pub fn finish(self) -> CodegenResult<Linkage> {
        if !self.branches.is_empty() {
            return Err(CodegenError::Internal(format!(
                "{} branch identifier(s) still in flight after lowering",
                self.branches.len()
            )));
        }
        let data_pages = self.next_offset.div_ceil(WASM_PAGE_SIZE);
        Ok(Linkage {
            options: self.options,
            memory_pages: self.options.memory_pages.max(data_pages),
            globals: self.globals,
            syscalls: self.syscalls,
            corelib: self.corelib,
            data: self.data,
            data_end: self.next_offset,
        })
    }
}

/// `$l<id>`
pub fn loop_label(id: u32) -> String {
    format!("{LOOP_LABEL_PREFIX}{id}")
}

/// The frozen result of lowering: everything needed to declare imports and
/// data segments.
#[derive(Debug)]
pub struct Linkage {
    options: CodegenOptions,
    memory_pages: u32,
    globals: BTreeSet<String>,
    syscalls: BTreeSet<Syscall>,
    corelib: BTreeSet<Corelib>,
    data: Vec<DataItem>,
    data_end: u32,
}

impl Linkage {
    /// `(import "env" "memory" (memory <pages>))`
    pub fn memory_import_node(&self) -> WatNode {
        WatNode::list(vec![
            WatNode::atom("import"),
            WatNode::atom(format!("\"{ENV_MODULE}\"")),
            WatNode::atom(format!("\"{MEMORY_NAME}\"")),
            WatNode::list(vec![
                WatNode::atom("memory"),
                WatNode::atom(self.memory_pages.to_string()),
            ]),
        ])
    }

    /// `(import "env" "<name>" (global $<name> i32))` per used global.
    pub fn global_import_nodes(&self) -> Vec<WatNode> {
        self.globals
            .iter()
            .map(|name| {
                WatNode::list(vec![
                    WatNode::atom("import"),
                    WatNode::atom(format!("\"{ENV_MODULE}\"")),
                    WatNode::atom(format!("\"{name}\"")),
                    WatNode::list(vec![
                        WatNode::atom("global"),
                        WatNode::atom(format!("${name}")),
                        WatNode::atom("i32"),
                    ]),
                ])
            })
            .collect()
    }

    pub fn syscall_import_nodes(&self) -> Vec<WatNode> {
        self.syscalls.iter().map(|sc| syscall::import_node(*sc)).collect()
    }

    pub fn corelib_import_nodes(&self) -> Vec<WatNode> {
        self.corelib.iter().map(|c| c.import_node()).collect()
    }

    /// `(data (i32.const <offset>) "<bytes>")` per data item.
    pub fn data_nodes(&self) -> Vec<WatNode> {
        self.data
            .iter()
            .map(|item| {
                let offset = item.offset.to_string();
                WatNode::list(vec![
                    WatNode::atom("data"),
                    WatNode::tokens(&["i32.const", offset.as_str()]),
                    WatNode::bytes(&item.bytes),
                ])
            })
            .collect()
    }

    /// First byte past the constant data; the process heap starts here.
    pub fn data_end(&self) -> u32 {
        self.data_end
    }

    /// Declared page count: the requested minimum, or enough pages to hold
    /// the constant data if that is more.
    pub fn memory_pages(&self) -> u32 {
        self.memory_pages
    }

    pub fn summary(&self) -> Dependencies {
        Dependencies {
            globals: self.globals.iter().cloned().collect(),
            syscalls: self.syscalls.iter().copied().collect(),
            corelib: self.corelib.iter().copied().collect(),
            data_items: self.data.len(),
        }
    }
}

/// What a compiled module imports, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    pub globals: Vec<String>,
    pub syscalls: Vec<Syscall>,
    pub corelib: Vec<Corelib>,
    pub data_items: usize,
}
