//! Top-level module assembly.
//!
//! 1. Lower every top-level statement into the body of `main`, recording
//!    dependencies and constant data in the [`CompileContext`]
//! 2. Freeze the context into a [`Linkage`](crate::context::Linkage)
//! 3. Assemble imports, `main` and data segments into one module

use tracing::debug;
use wash_types::abi::ENTRY_POINT;
use wash_types::{Node, Program};

use crate::context::{CompileContext, Dependencies};
use crate::corelib::Corelib;
use crate::error::CodegenResult;
use crate::node::WatNode;
use crate::stmt::lower_block;
use crate::types::{CodegenOptions, ValueType};

/// The product of one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// The complete `(module ...)` tree.
    pub module: WatNode,
    /// Imports and constant data the module ended up needing.
    pub dependencies: Dependencies,
    /// First byte past the constant data.
    pub data_end: u32,
    /// Minimum page count of the imported memory; always large enough to
    /// hold the constant data.
    pub memory_pages: u32,
}

impl CompiledModule {
    /// The module as WebAssembly text.
    pub fn wat(&self) -> String {
        self.module.to_string()
    }
}

/// Compile a program with default options.
pub fn compile(program: &Program) -> CodegenResult<CompiledModule> {
    compile_with_options(program, CodegenOptions::default())
}

/// Compile a program into a WAT module.
///
/// The first error aborts compilation; nothing partial is returned.
pub fn compile_with_options(
    program: &Program,
    options: CodegenOptions,
) -> CodegenResult<CompiledModule> {
    debug!(
        statements = program.statements.len(),
        data_base = options.data_base,
        "lowering program"
    );

    let mut ctx = CompileContext::new(options);
    let main = build_main(&program.statements, &mut ctx)?;
    let linkage = ctx.finish()?;

    let mut children = vec![WatNode::atom("module"), linkage.memory_import_node()];
    children.extend(linkage.global_import_nodes());
    children.extend(linkage.syscall_import_nodes());
    children.extend(linkage.corelib_import_nodes());
    children.push(main);
    children.extend(linkage.data_nodes());

    let dependencies = linkage.summary();
    debug!(
        globals = dependencies.globals.len(),
        syscalls = dependencies.syscalls.len(),
        corelib = dependencies.corelib.len(),
        data_items = dependencies.data_items,
        data_end = linkage.data_end(),
        memory_pages = linkage.memory_pages(),
        "module assembled"
    );

    Ok(CompiledModule {
        module: WatNode::list(children),
        dependencies,
        data_end: linkage.data_end(),
        memory_pages: linkage.memory_pages(),
    })
}

/// Build `(func $main (export "main") (param i32) (param i32) (result i32) ...)`.
///
/// The value of the final statement is printed: integers through `itoa`
/// then `print`, byte strings through `print` directly.  `main` itself
/// always returns status `0`.
pub fn build_main(statements: &[Node], ctx: &mut CompileContext) -> CodegenResult<WatNode> {
    let block = lower_block(statements, ctx)?;
    let mut body = block.nodes;

    match block.ty {
        Some(ValueType::I32) => {
            ctx.add_corelib_dependency(Corelib::Itoa);
            ctx.add_corelib_dependency(Corelib::Print);
            body.push(Corelib::Itoa.call(None));
            body.push(Corelib::Print.call(None));
        }
        Some(ValueType::BytePtr) => {
            ctx.add_corelib_dependency(Corelib::Print);
            body.push(Corelib::Print.call(None));
        }
        None => {}
    }
    body.push(WatNode::i32_const(0));

    let mut children = vec![
        WatNode::atom("func"),
        WatNode::atom(format!("${ENTRY_POINT}")),
        WatNode::list(vec![
            WatNode::atom("export"),
            WatNode::atom(format!("\"{ENTRY_POINT}\"")),
        ]),
        WatNode::tokens(&["param", "i32"]),
        WatNode::tokens(&["param", "i32"]),
        WatNode::tokens(&["result", "i32"]),
    ];
    children.extend(body);
    Ok(WatNode::list(children))
}
