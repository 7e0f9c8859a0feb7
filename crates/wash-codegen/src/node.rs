//! The S-expression tree used for lowered fragments and the final module.
//!
//! Atoms render verbatim; lists render parenthesized with space-separated
//! children.  A list may carry the [`ValueType`] it leaves on the stack.

use std::fmt;

use crate::types::ValueType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatNode {
    Atom(String),
    List {
        children: Vec<WatNode>,
        ty: Option<ValueType>,
    },
}

impl WatNode {
    pub fn atom(token: impl Into<String>) -> Self {
        WatNode::Atom(token.into())
    }

    /// An untyped list.
    pub fn list(children: Vec<WatNode>) -> Self {
        WatNode::List { children, ty: None }
    }

    /// A list leaving one value of type `ty` on the stack.
    pub fn typed(children: Vec<WatNode>, ty: ValueType) -> Self {
        WatNode::List {
            children,
            ty: Some(ty),
        }
    }

    /// A list built from plain tokens, e.g. `(i32.const 0)`.
    pub fn tokens(tokens: &[&str]) -> Self {
        WatNode::list(tokens.iter().map(|t| WatNode::atom(*t)).collect())
    }

    /// `(i32.const <value>)` typed `i32`.
    pub fn i32_const(value: i32) -> Self {
        WatNode::typed(
            vec![WatNode::atom("i32.const"), WatNode::atom(value.to_string())],
            ValueType::I32,
        )
    }

    /// A bare instruction consuming its operands from the stack: `(drop)`.
    pub fn instr(name: &str) -> Self {
        WatNode::list(vec![WatNode::atom(name)])
    }

    /// A WAT string literal for arbitrary bytes.
    pub fn bytes(data: &[u8]) -> Self {
        WatNode::Atom(escape_bytes(data))
    }

    /// The inferred type.  Atoms are never typed.
    pub fn ty(&self) -> Option<ValueType> {
        match self {
            WatNode::Atom(_) => None,
            WatNode::List { ty, .. } => *ty,
        }
    }

    /// Replace the inferred type of a list.
    pub fn with_type(self, new_ty: Option<ValueType>) -> Self {
        match self {
            WatNode::List { children, .. } => WatNode::List {
                children,
                ty: new_ty,
            },
            atom => atom,
        }
    }

    pub fn children(&self) -> &[WatNode] {
        match self {
            WatNode::Atom(_) => &[],
            WatNode::List { children, .. } => children,
        }
    }

    /// The leading atom of a list, i.e. its instruction or keyword.
    pub fn head(&self) -> Option<&str> {
        match self.children().first() {
            Some(WatNode::Atom(token)) => Some(token),
            _ => None,
        }
    }
}

impl fmt::Display for WatNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatNode::Atom(token) => f.write_str(token),
            WatNode::List { children, .. } => {
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Quote bytes as a WAT string literal.
fn escape_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() + 2);
    out.push('"');
    for &b in data {
        match b {
            b'"' | b'\\' => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{b:02x}")),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_renders_verbatim() {
        assert_eq!(WatNode::atom("i32.add").to_string(), "i32.add");
    }

    #[test]
    fn test_nested_lists_render_parenthesized() {
        let node = WatNode::list(vec![
            WatNode::atom("i32.add"),
            WatNode::i32_const(3),
            WatNode::i32_const(4),
        ]);
        assert_eq!(node.to_string(), "(i32.add (i32.const 3) (i32.const 4))");
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(WatNode::list(vec![]).to_string(), "()");
    }

    #[test]
    fn test_type_tag_does_not_affect_rendering() {
        let plain = WatNode::tokens(&["i32.const", "7"]);
        let typed = plain.clone().with_type(Some(ValueType::I32));
        assert_eq!(plain.to_string(), typed.to_string());
        assert_eq!(plain.ty(), None);
        assert_eq!(typed.ty(), Some(ValueType::I32));
    }

    #[test]
    fn test_bytes_escaping() {
        assert_eq!(WatNode::bytes(b"hi\0").to_string(), r#""hi\00""#);
        assert_eq!(WatNode::bytes(b"a\"b\\c").to_string(), r#""a\"b\\c""#);
        assert_eq!(WatNode::bytes("é".as_bytes()).to_string(), r#""\c3\a9""#);
        assert_eq!(WatNode::bytes(b"\n").to_string(), r#""\0a""#);
    }

    #[test]
    fn test_head() {
        let node = WatNode::tokens(&["call", "$itoa"]);
        assert_eq!(node.head(), Some("call"));
        assert_eq!(WatNode::atom("x").head(), None);
    }
}
