//! Syscall call sites and import declarations.

use wash_types::abi::SYSCALL_MODULE;
use wash_types::Syscall;

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::node::WatNode;
use crate::types::{ValueType, SYSCALL_FUNC_PREFIX};

/// `$sys_<name>`
pub fn func_id(syscall: Syscall) -> String {
    format!("{SYSCALL_FUNC_PREFIX}{}", syscall.name())
}

/// Type of the value a syscall leaves on the stack.
pub fn result_type(syscall: Syscall) -> ValueType {
    if syscall.returns_pointer() {
        ValueType::BytePtr
    } else {
        ValueType::I32
    }
}

/// Lower a syscall invocation over already-lowered arguments, recording the
/// dependency.
pub fn lower_syscall(
    syscall: Syscall,
    args: Vec<WatNode>,
    ctx: &mut CompileContext,
) -> CodegenResult<WatNode> {
    if args.len() != syscall.arity() {
        return Err(CodegenError::Internal(format!(
            "syscall `{syscall}` takes {} argument(s), got {}",
            syscall.arity(),
            args.len()
        )));
    }
    ctx.add_syscall_dependency(syscall);

    let mut children = Vec::with_capacity(args.len() + 2);
    children.push(WatNode::atom("call"));
    children.push(WatNode::atom(func_id(syscall)));
    children.extend(args);
    Ok(WatNode::typed(children, result_type(syscall)))
}

/// `(import "syscall" "<name>" (func $sys_<name> (param i32 ...) (result i32)))`
pub fn import_node(syscall: Syscall) -> WatNode {
    let mut params = vec![WatNode::atom("param")];
    params.extend((0..syscall.arity()).map(|_| WatNode::atom("i32")));

    WatNode::list(vec![
        WatNode::atom("import"),
        WatNode::atom(format!("\"{SYSCALL_MODULE}\"")),
        WatNode::atom(format!("\"{}\"", syscall.name())),
        WatNode::list(vec![
            WatNode::atom("func"),
            WatNode::atom(func_id(syscall)),
            WatNode::list(params),
            result_type(syscall).result_clause(),
        ]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CodegenOptions;

    #[test]
    fn test_every_syscall_declares_a_result() {
        assert_eq!(
            import_node(Syscall::Setenv).to_string(),
            r#"(import "syscall" "setenv" (func $sys_setenv (param i32 i32 i32) (result i32)))"#
        );
        assert_eq!(
            import_node(Syscall::Getenv).to_string(),
            r#"(import "syscall" "getenv" (func $sys_getenv (param i32 i32) (result i32)))"#
        );
    }

    #[test]
    fn test_lower_records_dependency() {
        let mut ctx = CompileContext::new(CodegenOptions::default());
        let node = lower_syscall(
            Syscall::Getenv,
            vec![WatNode::i32_const(1), WatNode::i32_const(16)],
            &mut ctx,
        )
        .unwrap();
        assert_eq!(node.ty(), Some(ValueType::BytePtr));
        assert!(ctx.uses_syscall(Syscall::Getenv));
    }

    #[test]
    fn test_wrong_argument_count_is_internal_error() {
        let mut ctx = CompileContext::new(CodegenOptions::default());
        let err = lower_syscall(Syscall::Setenv, vec![], &mut ctx).unwrap_err();
        assert!(matches!(err, CodegenError::Internal(_)));
        assert!(!ctx.uses_syscall(Syscall::Setenv));
    }
}
