//! Statement blocks and structured control flow.
//!
//! A block leaves at most one value: every statement except the last has its
//! value discarded.  Conditionals and loops take their result type from the
//! last statement of their body.

use wash_types::{ElseBranch, IfNode, Node, WhileNode};

use crate::context::{loop_label, CompileContext};
use crate::error::{CodegenError, CodegenResult};
use crate::expr::{coerce_operand, convert_node};
use crate::node::WatNode;
use crate::types::{describe, ValueType};

/// A lowered statement sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub nodes: Vec<WatNode>,
    /// Type of the value left by the final statement.
    pub ty: Option<ValueType>,
}

/// Lower statements in order, discarding every value but the last.
pub fn lower_block(stmts: &[Node], ctx: &mut CompileContext) -> CodegenResult<Block> {
    let mut nodes = Vec::with_capacity(stmts.len() * 2);
    let mut ty = None;
    for stmt in stmts {
        if ty.is_some() {
            nodes.push(WatNode::instr("drop"));
        }
        let lowered = convert_node(stmt, ctx)?;
        ty = lowered.ty();
        nodes.push(lowered);
    }
    Ok(Block { nodes, ty })
}

// ══════════════════════════════════════════════════════════════════════════════
// Conditionals
// ══════════════════════════════════════════════════════════════════════════════

/// `(if [(result T)] cond (then ...) [(else ...)])`
///
/// When the body yields a value and no else arm is given, an else arm yielding
/// the zero constant of the same type is synthesized so both arms agree.
pub fn lower_if(if_node: &IfNode, ctx: &mut CompileContext) -> CodegenResult<WatNode> {
    let condition = convert_node(&if_node.condition, ctx)?;
    let condition = coerce_operand(condition, "if", ctx)?;

    let body = lower_block(&if_node.body, ctx)?;
    let result_ty = body.ty;

    let else_arm = match &if_node.else_block {
        ElseBranch::Inline(node) => {
            let lowered = convert_node(node, ctx)?;
            let else_ty = lowered.ty();
            Some(balance_arm(vec![lowered], result_ty, else_ty)?)
        }
        ElseBranch::Block(stmts) if !stmts.is_empty() => {
            let block = lower_block(stmts, ctx)?;
            Some(balance_arm(block.nodes, result_ty, block.ty)?)
        }
        ElseBranch::Block(_) => result_ty.map(|ty| vec![ty.zero()]),
    };

    let mut children = vec![WatNode::atom("if")];
    if let Some(ty) = result_ty {
        children.push(ty.result_clause());
    }
    children.push(condition);
    children.push(arm("then", body.nodes));
    if let Some(nodes) = else_arm {
        children.push(arm("else", nodes));
    }
    Ok(WatNode::list(children).with_type(result_ty))
}

/// Make an explicit else arm agree with the then arm's result.
fn balance_arm(
    mut nodes: Vec<WatNode>,
    then_ty: Option<ValueType>,
    else_ty: Option<ValueType>,
) -> CodegenResult<Vec<WatNode>> {
    match (then_ty, else_ty) {
        (None, None) => Ok(nodes),
        (None, Some(_)) => {
            nodes.push(WatNode::instr("drop"));
            Ok(nodes)
        }
        (Some(t), Some(e)) if t == e => Ok(nodes),
        (Some(_), _) => Err(CodegenError::MismatchedArms {
            then_ty: describe(then_ty),
            else_ty: describe(else_ty),
        }),
    }
}

fn arm(keyword: &str, nodes: Vec<WatNode>) -> WatNode {
    let mut children = Vec::with_capacity(nodes.len() + 1);
    children.push(WatNode::atom(keyword));
    children.extend(nodes);
    WatNode::list(children)
}

// ══════════════════════════════════════════════════════════════════════════════
// Loops
// ══════════════════════════════════════════════════════════════════════════════

/// Lower `while cond { body }` with pre-test semantics:
///
/// ```text
/// (if [(result T)] cond
///   (then (loop $lN [(result T)] body... (br_if $lN cond)))
///   [(else (i32.const 0))])
/// ```
///
/// The loop core re-tests after each iteration; the guard skips it entirely
/// when the condition is false on entry.
pub fn lower_while(while_node: &WhileNode, ctx: &mut CompileContext) -> CodegenResult<WatNode> {
    let id = ctx.alloc_branch_identifier();
    let parts = lower_loop_parts(while_node, ctx);
    ctx.dealloc_branch_identifier()?;
    let (body, condition) = parts?;

    let label = loop_label(id);
    let result_ty = body.ty;

    let mut core = vec![WatNode::atom("loop"), WatNode::atom(label.clone())];
    if let Some(ty) = result_ty {
        core.push(ty.result_clause());
    }
    core.extend(body.nodes);
    core.push(WatNode::list(vec![
        WatNode::atom("br_if"),
        WatNode::atom(label),
        condition.clone(),
    ]));
    let core = WatNode::list(core).with_type(result_ty);

    let mut guard = vec![WatNode::atom("if")];
    if let Some(ty) = result_ty {
        guard.push(ty.result_clause());
    }
    guard.push(condition);
    guard.push(arm("then", vec![core]));
    if let Some(ty) = result_ty {
        guard.push(arm("else", vec![ty.zero()]));
    }
    Ok(WatNode::list(guard).with_type(result_ty))
}

fn lower_loop_parts(
    while_node: &WhileNode,
    ctx: &mut CompileContext,
) -> CodegenResult<(Block, WatNode)> {
    let body = lower_block(&while_node.body, ctx)?;
    let condition = convert_node(&while_node.condition, ctx)?;
    let condition = coerce_operand(condition, "while", ctx)?;
    Ok((body, condition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corelib::Corelib;
    use crate::types::CodegenOptions;
    use wash_types::Operator;

    fn ctx() -> CompileContext {
        CompileContext::new(CodegenOptions::default())
    }

    fn if_node(body: Vec<Node>, else_block: ElseBranch) -> IfNode {
        IfNode {
            condition: Box::new(Node::Bool { value: true }),
            body,
            else_block,
        }
    }

    #[test]
    fn test_block_discards_intermediate_values() {
        let block = lower_block(
            &[Node::number(1), Node::assign("x", Node::number(2)), Node::number(3)],
            &mut ctx(),
        )
        .unwrap();
        let heads: Vec<_> = block.nodes.iter().map(|n| n.head().unwrap_or("")).collect();
        assert_eq!(heads, vec!["i32.const", "drop", "drop", "i32.const"]);
        assert_eq!(block.ty, Some(ValueType::I32));
    }

    #[test]
    fn test_balanced_arm_is_synthesized() {
        let node = lower_if(&if_node(vec![Node::number(5)], ElseBranch::default()), &mut ctx())
            .unwrap();
        assert_eq!(
            node.to_string(),
            "(if (result i32) (i32.const 1) (then (i32.const 5)) (else (i32.const 0)))"
        );
        assert_eq!(node.ty(), Some(ValueType::I32));
    }

    #[test]
    fn test_balanced_arm_keeps_pointer_type() {
        let node = lower_if(
            &if_node(vec![Node::string("yes")], ElseBranch::Block(vec![])),
            &mut ctx(),
        )
        .unwrap();
        assert_eq!(node.ty(), Some(ValueType::BytePtr));
        assert!(node.to_string().ends_with("(else (i32.const 0)))"));
    }

    #[test]
    fn test_untyped_if_has_no_else() {
        let node = lower_if(
            &if_node(vec![Node::assign("x", Node::number(1))], ElseBranch::default()),
            &mut ctx(),
        )
        .unwrap();
        assert_eq!(node.ty(), None);
        assert_eq!(node.children().len(), 3);
    }

    #[test]
    fn test_inline_else_is_not_wrapped_in_a_block() {
        let nested = Node::If(if_node(vec![Node::number(2)], ElseBranch::default()));
        let node = lower_if(
            &if_node(vec![Node::number(1)], ElseBranch::Inline(Box::new(nested))),
            &mut ctx(),
        )
        .unwrap();
        let else_arm = node.children().last().unwrap();
        assert_eq!(else_arm.head(), Some("else"));
        assert_eq!(else_arm.children().len(), 2);
        assert_eq!(else_arm.children()[1].head(), Some("if"));
    }

    #[test]
    fn test_untyped_body_drops_else_value() {
        let node = lower_if(
            &if_node(vec![], ElseBranch::Block(vec![Node::number(6)])),
            &mut ctx(),
        )
        .unwrap();
        assert_eq!(
            node.to_string(),
            "(if (i32.const 1) (then) (else (i32.const 6) (drop)))"
        );
    }

    #[test]
    fn test_mismatched_arms_are_rejected() {
        let err = lower_if(
            &if_node(
                vec![Node::number(1)],
                ElseBranch::Block(vec![Node::string("one")]),
            ),
            &mut ctx(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CodegenError::MismatchedArms {
                then_ty: "i32".into(),
                else_ty: "*u8".into(),
            }
        );
    }

    #[test]
    fn test_while_is_guarded_post_test_loop() {
        let mut c = ctx();
        let node = lower_while(
            &WhileNode {
                condition: Box::new(Node::unary(Operator::UnaryNot, Node::number(0))),
                body: vec![Node::number(7)],
            },
            &mut c,
        )
        .unwrap();
        assert_eq!(
            node.to_string(),
            "(if (result i32) (i32.eqz (i32.const 0)) \
             (then (loop $l0 (result i32) (i32.const 7) (br_if $l0 (i32.eqz (i32.const 0))))) \
             (else (i32.const 0)))"
        );
        assert_eq!(c.branch_depth(), 0);
    }

    #[test]
    fn test_string_condition_is_parsed_as_number() {
        let mut c = ctx();
        let node = lower_if(
            &IfNode {
                condition: Box::new(Node::string("1")),
                body: vec![Node::number(5)],
                else_block: ElseBranch::default(),
            },
            &mut c,
        )
        .unwrap();
        assert_eq!(
            node.to_string(),
            "(if (result i32) (call $atoi (i32.const 16)) (then (i32.const 5)) (else (i32.const 0)))"
        );
        assert!(c.uses_corelib(Corelib::Atoi));
    }

    #[test]
    fn test_string_loop_condition_is_parsed_on_every_test() {
        let mut c = ctx();
        let node = lower_while(
            &WhileNode {
                condition: Box::new(Node::string("0")),
                body: vec![],
            },
            &mut c,
        )
        .unwrap();
        assert_eq!(
            node.to_string(),
            "(if (call $atoi (i32.const 16)) \
             (then (loop $l0 (br_if $l0 (call $atoi (i32.const 16))))))"
        );
        assert!(c.uses_corelib(Corelib::Atoi));
    }

    #[test]
    fn test_nested_loops_release_labels() {
        let inner = Node::While(WhileNode {
            condition: Box::new(Node::Bool { value: false }),
            body: vec![],
        });
        let outer = WhileNode {
            condition: Box::new(Node::Bool { value: false }),
            body: vec![inner.clone(), inner],
        };
        let mut c = ctx();
        let node = lower_while(&outer, &mut c).unwrap();
        let wat = node.to_string();
        assert!(wat.contains("(loop $l0"));
        assert!(wat.contains("(loop $l1"));
        assert!(wat.contains("(loop $l2"));
        assert_eq!(c.branch_depth(), 0);
    }

    #[test]
    fn test_failed_body_still_releases_label() {
        let mut c = ctx();
        let result = lower_while(
            &WhileNode {
                condition: Box::new(Node::Bool { value: true }),
                body: vec![Node::Command {
                    name: "ls".into(),
                    args: vec![],
                }],
            },
            &mut c,
        );
        assert!(result.is_err());
        assert_eq!(c.branch_depth(), 0);
    }
}
