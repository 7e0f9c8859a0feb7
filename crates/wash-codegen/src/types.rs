//! Value types, memory layout constants and code generator options.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::WatNode;

/// The inferred type of a lowered fragment.
///
/// Both variants are represented as a machine `i32`; they differ in how
/// consumers coerce them.  A fragment without a type leaves nothing on the
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// A plain integer.
    I32,
    /// A pointer to a NUL-terminated byte string in linear memory.
    BytePtr,
}

impl ValueType {
    /// The WebAssembly value type used to represent this type.
    pub fn wasm_type(self) -> &'static str {
        match self {
            ValueType::I32 | ValueType::BytePtr => "i32",
        }
    }

    /// A typed fragment yielding the zero value of this type.
    pub fn zero(self) -> WatNode {
        WatNode::typed(vec![WatNode::atom("i32.const"), WatNode::atom("0")], self)
    }

    /// `(result <type>)` block signature.
    pub fn result_clause(self) -> WatNode {
        WatNode::list(vec![WatNode::atom("result"), WatNode::atom(self.wasm_type())])
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::I32 => f.write_str("i32"),
            ValueType::BytePtr => f.write_str("*u8"),
        }
    }
}

/// Human-readable form of an optional type, for diagnostics.
pub fn describe(ty: Option<ValueType>) -> String {
    match ty {
        Some(ty) => ty.to_string(),
        None => "none".to_string(),
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

/// Default first data offset.  Address 0 stays free as a null pointer.
pub const DEFAULT_DATA_BASE: u32 = 16;
/// Default minimum size of the imported memory, in 64 KiB pages.
pub const DEFAULT_MEMORY_PAGES: u32 = 1;
/// Size of one WebAssembly page.
pub const WASM_PAGE_SIZE: u32 = 65_536;
/// Exclusive upper bound of constant data.  Offsets travel as `i32.const`
/// pointers, so every offset must stay non-negative.
pub const MAX_DATA_END: u32 = 1 << 31;

// ── Labels ───────────────────────────────────────────────────────────────────

/// Prefix for loop labels: `$l0`, `$l1`, …
pub const LOOP_LABEL_PREFIX: &str = "$l";
/// Prefix for syscall function identifiers: `$sys_getenv`, …
pub const SYSCALL_FUNC_PREFIX: &str = "$sys_";

/// Options accepted by [`crate::compile_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Offset of the first constant data item.
    pub data_base: u32,
    /// Minimum page count declared on the memory import.  Raised as needed
    /// so the constant data always fits.
    pub memory_pages: u32,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            data_base: DEFAULT_DATA_BASE,
            memory_pages: DEFAULT_MEMORY_PAGES,
        }
    }
}
