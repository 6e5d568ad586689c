use std::fmt;

use crate::core::Value;

/// Parsed IF-condition expression. The grammar is deliberately small:
/// dotted variable references, zero-argument method calls, comparisons,
/// boolean connectives, and literals. No assignment, no arithmetic, no
/// loops.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Literal(Value),

    /// Dotted variable reference, e.g. `pmb.memberName`.
    Path {
        expression: String,
        names: Vec<String>,
    },

    /// Zero-argument method call on a resolved variable, e.g.
    /// `pmb.memberList.isEmpty()`.
    MethodCall {
        expression: String,
        names: Vec<String>,
        method: String,
    },

    Comparison {
        left: Box<ExprNode>,
        op: CompOp,
        right: Box<ExprNode>,
    },

    Logical {
        left: Box<ExprNode>,
        op: LogicOp,
        right: Box<ExprNode>,
    },

    Not(Box<ExprNode>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Value::Text(s)) => write!(f, "'{}'", s),
            Self::Literal(Value::Null) => write!(f, "null"),
            Self::Literal(value) => write!(f, "{}", value),
            Self::Path { expression, .. } => write!(f, "{}", expression),
            Self::MethodCall {
                expression, method, ..
            } => write!(f, "{}.{}()", expression, method),
            Self::Comparison { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Self::Logical { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Self::Not(inner) => write!(f, "!{}", inner),
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "=="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::LtEq => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtEq => write!(f, ">="),
        }
    }
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
        }
    }
}
