//! Node lowering: the converter dispatch plus literals, operators, globals and
//! variables.
//!
//! Every function returns one [`WatNode`] fragment whose type tag tells the
//! caller whether it leaves a value on the stack.

use wash_types::abi::PID_GLOBAL;
use wash_types::{Node, Operator, Syscall};

use crate::context::CompileContext;
use crate::corelib::Corelib;
use crate::error::{CodegenError, CodegenResult};
use crate::node::WatNode;
use crate::stmt::{lower_if, lower_while};
use crate::syscall::lower_syscall;
use crate::types::{describe, ValueType};

/// Lower one syntax node.
pub fn convert_node(node: &Node, ctx: &mut CompileContext) -> CodegenResult<WatNode> {
    match node {
        // ── Literals ──────────────────────────────────────────────────────
        Node::Bool { value } => Ok(WatNode::i32_const(i32::from(*value))),
        Node::Number { value } => Ok(WatNode::i32_const(*value)),
        Node::String { value } => convert_string(value, ctx),

        // ── Operators ────────────────────────────────────────────────────
        Node::Operator { operator, operands } => convert_operator(*operator, operands, ctx),

        // ── Variables & globals ──────────────────────────────────────────
        Node::GlobalGet { name } => convert_global_get(name, ctx),
        Node::VarAccess { variable } => convert_var_access(variable, ctx),
        Node::VarAssign { variable, value } => convert_var_assign(variable, value, ctx),

        // ── Control flow ─────────────────────────────────────────────────
        Node::If(if_node) => lower_if(if_node, ctx),
        Node::While(while_node) => lower_while(while_node, ctx),

        Node::Command { name, .. } => Err(CodegenError::Unsupported(format!(
            "command invocation `{name}`"
        ))),
    }
}

/// Coerce a lowered operand to `i32`.
///
/// Byte pointers are parsed with `atoi`; untyped fragments are rejected.
/// `site` names the consumer for diagnostics.
pub fn coerce_operand(
    operand: WatNode,
    site: &str,
    ctx: &mut CompileContext,
) -> CodegenResult<WatNode> {
    match operand.ty() {
        Some(ValueType::I32) => Ok(operand),
        Some(ValueType::BytePtr) => {
            ctx.add_corelib_dependency(Corelib::Atoi);
            Ok(Corelib::Atoi.call(Some(operand)))
        }
        None => Err(CodegenError::InvalidOperand {
            operator: site.to_string(),
            found: describe(None),
        }),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Literals
// ══════════════════════════════════════════════════════════════════════════════

fn convert_string(value: &str, ctx: &mut CompileContext) -> CodegenResult<WatNode> {
    let ptr = data_pointer(ctx.add_string(value)?)?;
    Ok(WatNode::i32_const(ptr).with_type(Some(ValueType::BytePtr)))
}

/// A data offset as an `i32.const` operand.
fn data_pointer(offset: u32) -> CodegenResult<i32> {
    i32::try_from(offset)
        .map_err(|_| CodegenError::Internal(format!("data offset {offset} is not a valid pointer")))
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

fn convert_operator(
    operator: Operator,
    operands: &[Node],
    ctx: &mut CompileContext,
) -> CodegenResult<WatNode> {
    if operands.len() != operator.arity() {
        return Err(CodegenError::OperandCount {
            operator,
            expected: operator.arity(),
            found: operands.len(),
        });
    }

    let mut lowered = Vec::with_capacity(operands.len());
    for operand in operands {
        let node = convert_node(operand, ctx)?;
        lowered.push(coerce_operand(node, operator.symbol(), ctx)?);
    }
    let mut lowered = lowered.into_iter();

    let node = match operator {
        Operator::Add => binary("i32.add", &mut lowered)?,
        Operator::Subtract => binary("i32.sub", &mut lowered)?,
        Operator::Multiply => binary("i32.mul", &mut lowered)?,
        Operator::Divide => binary("i32.div_s", &mut lowered)?,
        Operator::Equal => eqz(binary("i32.sub", &mut lowered)?),
        Operator::NotEqual => eqz(eqz(binary("i32.sub", &mut lowered)?)),
        Operator::UnaryNot => eqz(next_operand(&mut lowered)?),
        Operator::UnaryNegate => WatNode::typed(
            vec![
                WatNode::atom("i32.mul"),
                WatNode::i32_const(-1),
                next_operand(&mut lowered)?,
            ],
            ValueType::I32,
        ),
    };
    Ok(node)
}

fn next_operand(operands: &mut impl Iterator<Item = WatNode>) -> CodegenResult<WatNode> {
    operands
        .next()
        .ok_or_else(|| CodegenError::Internal("operand list exhausted".into()))
}

fn binary(
    instr: &str,
    operands: &mut impl Iterator<Item = WatNode>,
) -> CodegenResult<WatNode> {
    let left = next_operand(operands)?;
    let right = next_operand(operands)?;
    Ok(WatNode::typed(
        vec![WatNode::atom(instr), left, right],
        ValueType::I32,
    ))
}

fn eqz(operand: WatNode) -> WatNode {
    WatNode::typed(vec![WatNode::atom("i32.eqz"), operand], ValueType::I32)
}

// ══════════════════════════════════════════════════════════════════════════════
// Globals & variables
// ══════════════════════════════════════════════════════════════════════════════

fn convert_global_get(name: &str, ctx: &mut CompileContext) -> CodegenResult<WatNode> {
    if !is_identifier(name) {
        return Err(CodegenError::InvalidName {
            node: "global_get".to_string(),
            name: name.to_string(),
        });
    }
    ctx.add_global_dependency(name);
    Ok(WatNode::typed(
        vec![WatNode::atom("global.get"), WatNode::atom(format!("${name}"))],
        ValueType::I32,
    ))
}

/// Whether `name` is usable after `$` as a WAT identifier.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-./:<=>?@\\^_`|~".contains(&b)
        })
}

/// `$name` → `getenv(pid, "name")`
fn convert_var_access(variable: &str, ctx: &mut CompileContext) -> CodegenResult<WatNode> {
    let name_ptr = data_pointer(ctx.add_string(variable)?)?;

    let pid = convert_node(&Node::global(PID_GLOBAL), ctx)?;
    let name = convert_node(&Node::number(name_ptr), ctx)?;
    lower_syscall(Syscall::Getenv, vec![pid, name], ctx)
}

/// `name = value` → `setenv(pid, "name", value)`, status discarded.
///
/// Variables are string-valued at rest: integer values go through `itoa`.
fn convert_var_assign(
    variable: &str,
    value: &Node,
    ctx: &mut CompileContext,
) -> CodegenResult<WatNode> {
    let name_ptr = data_pointer(ctx.add_string(variable)?)?;

    let value = convert_node(value, ctx)?;
    let value = match value.ty() {
        Some(ValueType::BytePtr) => value,
        Some(ValueType::I32) => {
            ctx.add_corelib_dependency(Corelib::Itoa);
            Corelib::Itoa.call(Some(value))
        }
        None => {
            return Err(CodegenError::InvalidOperand {
                operator: "=".to_string(),
                found: describe(None),
            })
        }
    };

    let pid = convert_node(&Node::global(PID_GLOBAL), ctx)?;
    let name = convert_node(&Node::number(name_ptr), ctx)?;
    let call = lower_syscall(Syscall::Setenv, vec![pid, name, value], ctx)?;
    Ok(WatNode::list(vec![WatNode::atom("drop"), call]))
}
