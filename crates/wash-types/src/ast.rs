//! Syntax tree node types for the wash shell language.
//!
//! The tree is produced by the external parser and arrives as JSON: every node
//! is an object carrying a `type` tag (see [`Node`]).  A [`Program`] is the
//! ordered list of top-level statements.  Large recursive fields are boxed.

use serde::{Deserialize, Serialize};
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// A complete wash program: top-level statements in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    pub statements: Vec<Node>,
}

impl Program {
    pub fn new(statements: Vec<Node>) -> Self {
        Self { statements }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Nodes
// ══════════════════════════════════════════════════════════════════════════════

/// A single syntax tree node.
///
/// The set of kinds is closed: adding a variant is a compile error in every
/// consumer until it handles the new kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    /// `true` / `false`
    #[serde(rename = "bool")]
    Bool { value: bool },

    /// Integer literal: `42`
    #[serde(rename = "number")]
    Number { value: i32 },

    /// String literal: `"hello"`
    #[serde(rename = "string")]
    String { value: String },

    /// Operator application: `a + b`, `!a`, `-a`
    #[serde(rename = "op")]
    Operator {
        operator: Operator,
        operands: Vec<Node>,
    },

    /// Variable read: `$name`
    #[serde(rename = "access")]
    VarAccess { variable: String },

    /// Variable write: `name = value`
    #[serde(rename = "assign")]
    VarAssign { variable: String, value: Box<Node> },

    /// `if cond { body } else { ... }`
    #[serde(rename = "if")]
    If(IfNode),

    /// `while cond { body }`
    #[serde(rename = "while")]
    While(WhileNode),

    /// Command invocation: `ls -l`.  Reserved; the code generator rejects it.
    #[serde(rename = "command")]
    Command {
        name: String,
        #[serde(default)]
        args: Vec<Node>,
    },

    /// Read of a host-provided global such as `pid`.
    #[serde(rename = "global_get")]
    GlobalGet { name: String },
}

impl Node {
    /// Integer literal shorthand.
    pub fn number(value: i32) -> Self {
        Node::Number { value }
    }

    /// String literal shorthand.
    pub fn string(value: impl Into<String>) -> Self {
        Node::String {
            value: value.into(),
        }
    }

    /// Binary operator shorthand.
    pub fn binary(operator: Operator, left: Node, right: Node) -> Self {
        Node::Operator {
            operator,
            operands: vec![left, right],
        }
    }

    /// Unary operator shorthand.
    pub fn unary(operator: Operator, operand: Node) -> Self {
        Node::Operator {
            operator,
            operands: vec![operand],
        }
    }

    /// Variable read shorthand.
    pub fn access(variable: impl Into<String>) -> Self {
        Node::VarAccess {
            variable: variable.into(),
        }
    }

    /// Variable write shorthand.
    pub fn assign(variable: impl Into<String>, value: Node) -> Self {
        Node::VarAssign {
            variable: variable.into(),
            value: Box::new(value),
        }
    }

    /// Global read shorthand.
    pub fn global(name: impl Into<String>) -> Self {
        Node::GlobalGet { name: name.into() }
    }

    /// The wire tag of this node kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Bool { .. } => "bool",
            Node::Number { .. } => "number",
            Node::String { .. } => "string",
            Node::Operator { .. } => "op",
            Node::VarAccess { .. } => "access",
            Node::VarAssign { .. } => "assign",
            Node::If(_) => "if",
            Node::While(_) => "while",
            Node::Command { .. } => "command",
            Node::GlobalGet { .. } => "global_get",
        }
    }
}

/// `if condition { body } else { else_block }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfNode {
    pub condition: Box<Node>,
    pub body: Vec<Node>,
    #[serde(rename = "elseBlock", default)]
    pub else_block: ElseBranch,
}

/// The else slot of a conditional.
///
/// Either a statement block (possibly empty, meaning "no else"), or a single
/// inlined node as produced for `else if` chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElseBranch {
    Block(Vec<Node>),
    Inline(Box<Node>),
}

impl Default for ElseBranch {
    fn default() -> Self {
        ElseBranch::Block(Vec::new())
    }
}

/// `while condition { body }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileNode {
    pub condition: Box<Node>,
    pub body: Vec<Node>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

/// The fixed operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "u!")]
    UnaryNot,
    #[serde(rename = "u-")]
    UnaryNegate,
}

impl Operator {
    /// Number of operands the operator takes.
    pub fn arity(self) -> usize {
        match self {
            Operator::UnaryNot | Operator::UnaryNegate => 1,
            _ => 2,
        }
    }

    /// Source-level symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::UnaryNot => "!",
            Operator::UnaryNegate => "-",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_node_from_json() {
        let json = r#"{"type":"op","operator":"+","operands":[
            {"type":"number","value":3},{"type":"number","value":4}]}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(
            node,
            Node::binary(Operator::Add, Node::number(3), Node::number(4))
        );
    }

    #[test]
    fn test_unary_operators_from_json() {
        let not: Operator = serde_json::from_str(r#""u!""#).unwrap();
        let neg: Operator = serde_json::from_str(r#""u-""#).unwrap();
        assert_eq!(not, Operator::UnaryNot);
        assert_eq!(neg, Operator::UnaryNegate);
        assert_eq!(not.arity(), 1);
        assert_eq!(Operator::Divide.arity(), 2);
    }

    #[test]
    fn test_if_without_else_defaults_to_empty_block() {
        let json = r#"{"type":"if","condition":{"type":"bool","value":true},
            "body":[{"type":"number","value":5}]}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        match node {
            Node::If(if_node) => assert_eq!(if_node.else_block, ElseBranch::Block(vec![])),
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn test_if_with_inline_else() {
        let json = r#"{"type":"if","condition":{"type":"bool","value":false},
            "body":[],
            "elseBlock":{"type":"if","condition":{"type":"bool","value":true},"body":[]}}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        let Node::If(if_node) = node else {
            panic!("expected if");
        };
        assert!(matches!(if_node.else_block, ElseBranch::Inline(ref n) if n.kind() == "if"));
    }

    #[test]
    fn test_program_is_a_plain_array() {
        let json = r#"[{"type":"assign","variable":"x","value":{"type":"number","value":1}},
            {"type":"access","variable":"x"}]"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(
            program.statements,
            vec![Node::assign("x", Node::number(1)), Node::access("x")]
        );
    }

    #[test]
    fn test_unknown_node_kind_is_rejected() {
        let json = r#"{"type":"pipe","left":[],"right":[]}"#;
        assert!(serde_json::from_str::<Node>(json).is_err());
    }

    #[test]
    fn test_round_trip_preserves_wire_tags() {
        let node = Node::While(WhileNode {
            condition: Box::new(Node::global("pid")),
            body: vec![Node::Command {
                name: "ls".into(),
                args: vec![],
            }],
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "while");
        assert_eq!(json["condition"]["type"], "global_get");
        assert_eq!(json["body"][0]["type"], "command");
    }
}
