//! Corelib intrinsics: small helpers imported only when lowering needs them.
//!
//! The intrinsics themselves live outside this crate; the code generator only
//! records which ones are referenced and emits calls and imports for them.

use std::fmt;

use serde::{Deserialize, Serialize};
use wash_types::abi::CORELIB_MODULE;

use crate::node::WatNode;
use crate::types::ValueType;

/// A corelib intrinsic.  Variant order is import declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corelib {
    /// `itoa(i32) -> *u8`
    Itoa,
    /// `atoi(*u8) -> i32`
    Atoi,
    /// `print(*u8)`
    Print,
}

impl Corelib {
    pub fn name(self) -> &'static str {
        match self {
            Corelib::Itoa => "itoa",
            Corelib::Atoi => "atoi",
            Corelib::Print => "print",
        }
    }

    /// `$itoa`, `$atoi`, `$print`
    pub fn func_id(self) -> String {
        format!("${}", self.name())
    }

    /// Type of the value the intrinsic returns.
    pub fn result(self) -> Option<ValueType> {
        match self {
            Corelib::Itoa => Some(ValueType::BytePtr),
            Corelib::Atoi => Some(ValueType::I32),
            Corelib::Print => None,
        }
    }

    /// `(call $name <arg>)`.  With no argument, the call consumes the value
    /// already on the stack.
    pub fn call(self, arg: Option<WatNode>) -> WatNode {
        let mut children = vec![WatNode::atom("call"), WatNode::atom(self.func_id())];
        children.extend(arg);
        WatNode::list(children).with_type(self.result())
    }

    /// `(import "corelib" "<name>" (func $<name> (param i32) [(result i32)]))`
    pub fn import_node(self) -> WatNode {
        let mut func = vec![
            WatNode::atom("func"),
            WatNode::atom(self.func_id()),
            WatNode::tokens(&["param", "i32"]),
        ];
        if let Some(ty) = self.result() {
            func.push(ty.result_clause());
        }
        WatNode::list(vec![
            WatNode::atom("import"),
            WatNode::atom(format!("\"{CORELIB_MODULE}\"")),
            WatNode::atom(format!("\"{}\"", self.name())),
            WatNode::list(func),
        ])
    }
}

impl fmt::Display for Corelib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_nodes() {
        assert_eq!(
            Corelib::Itoa.import_node().to_string(),
            r#"(import "corelib" "itoa" (func $itoa (param i32) (result i32)))"#
        );
        assert_eq!(
            Corelib::Print.import_node().to_string(),
            r#"(import "corelib" "print" (func $print (param i32)))"#
        );
    }

    #[test]
    fn test_call_types() {
        let call = Corelib::Atoi.call(Some(WatNode::i32_const(16)));
        assert_eq!(call.to_string(), "(call $atoi (i32.const 16))");
        assert_eq!(call.ty(), Some(ValueType::I32));
        assert_eq!(Corelib::Itoa.call(None).ty(), Some(ValueType::BytePtr));
        assert_eq!(Corelib::Print.call(None).ty(), None);
    }
}
