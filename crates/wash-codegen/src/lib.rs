//! wash code generator: lowers a syntax tree to a WebAssembly text module.
//!
//! # Architecture
//!
//! Each syntax node lowers to one [`WatNode`] fragment tagged with the
//! [`ValueType`] it leaves on the stack.  Lowering records which globals,
//! syscalls and corelib intrinsics are referenced; only those are imported.
//!
//! ## Imports
//! - `env.memory`: the process's linear memory
//! - `env.<global>`: host globals such as `pid`
//! - `syscall.<name>`: see [`wash_types::abi`]
//! - `corelib.itoa`, `corelib.atoi`, `corelib.print`
//!
//! ## Exports
//! - `main(argc, argv) -> status`: runs the program and prints the value of
//!   its last statement
//!
//! ## Constant data
//!
//! String literals and variable names are NUL-terminated byte strings placed
//! in active data segments starting at [`types::DEFAULT_DATA_BASE`].

pub mod compiler;
pub mod context;
pub mod corelib;
pub mod error;
pub mod expr;
pub mod node;
pub mod stmt;
pub mod syscall;
pub mod types;

pub use compiler::{build_main, compile, compile_with_options, CompiledModule};
pub use context::{CompileContext, Dependencies, Linkage};
pub use corelib::Corelib;
pub use error::{CodegenError, CodegenResult};
pub use expr::convert_node;
pub use node::WatNode;
pub use types::{CodegenOptions, ValueType};
