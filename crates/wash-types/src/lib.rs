//! Shared types for wash.
//!
//! This crate defines the syntax tree handed to the code generator and the
//! syscall ABI that both the generated code and the runtime agree on.

pub mod abi;
pub mod ast;

pub use abi::{Syscall, UnknownSyscall};
pub use ast::{ElseBranch, IfNode, Node, Operator, Program, WhileNode};
