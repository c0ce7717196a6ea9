use crate::ast::{ArithOp, CompareOp, LogicOp};
use std::fmt;

/// An expression node.
///
/// `Display` renders the canonical surface form, which is what function
/// values and diagnostics show back to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal, from digits or from compound number words
    Integer(i64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// "hello"
    /// ```
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// Variable or function name
    Identifier(String),

    /// List literal
    ///
    /// # Example
    /// ```text
    /// a list of 1 and 2 and 3
    /// ```
    List(Vec<Expr>),

    /// Unary negation: `minus 5`
    Negative(Box<Expr>),

    /// `x plus y`, `x minus y`, `x times y`, `x divided by y`
    Arithmetic {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `x equals y`, `x is greater than y`, `x is less than y`
    Comparison {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `x and y`, `x or y`, `not x` (no left operand for `not`)
    Logical {
        op: LogicOp,
        left: Option<Box<Expr>>,
        right: Box<Expr>,
    },

    /// Function call: `greet with name and greeting`
    Call {
        function: String,
        arguments: Vec<Expr>,
    },

    /// `length of items`
    Length(Box<Expr>),

    /// 1-based indexing: `item 2 from items`
    Index { index: Box<Expr>, list: Box<Expr> },

    /// `body of response` (also accepts a request)
    BodyOf(Box<Expr>),

    /// `status of response`
    StatusOf(Box<Expr>),

    /// `header "Content-Type" from response`
    HeaderFrom { name: Box<Expr>, source: Box<Expr> },

    /// Dotted-path JSON access: `field "a.b.c" from data`
    FieldFrom { name: Box<Expr>, source: Box<Expr> },

    /// `method of req`
    MethodOf(Box<Expr>),

    /// `path of req`
    PathOf(Box<Expr>),

    /// `query "name" from req`
    QueryFrom { name: Box<Expr>, request: Box<Expr> },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(n) => write!(f, "{}", n),
            Expr::String(s) => write!(f, "\"{}\"", s),
            Expr::Boolean(b) => write!(f, "{}", b),
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::List(elements) => {
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "a list of {}", parts.join(" and "))
            }
            Expr::Negative(value) => write!(f, "minus {}", value),
            Expr::Arithmetic { op, left, right } => {
                if *op == ArithOp::Divided {
                    write!(f, "{} divided by {}", left, right)
                } else {
                    write!(f, "{} {} {}", left, op, right)
                }
            }
            Expr::Comparison { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Logical { op, left, right } => match left {
                Some(left) => write!(f, "{} {} {}", left, op, right),
                None => write!(f, "{} {}", op, right),
            },
            Expr::Call {
                function,
                arguments,
            } => {
                write!(f, "{}", function)?;
                if !arguments.is_empty() {
                    let parts: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                    write!(f, " with {}", parts.join(" and "))?;
                }
                Ok(())
            }
            Expr::Length(list) => write!(f, "length of {}", list),
            Expr::Index { index, list } => write!(f, "item {} from {}", index, list),
            Expr::BodyOf(response) => write!(f, "body of {}", response),
            Expr::StatusOf(response) => write!(f, "status of {}", response),
            Expr::HeaderFrom { name, source } => write!(f, "header {} from {}", name, source),
            Expr::FieldFrom { name, source } => write!(f, "field {} from {}", name, source),
            Expr::MethodOf(request) => write!(f, "method of {}", request),
            Expr::PathOf(request) => write!(f, "path of {}", request),
            Expr::QueryFrom { name, request } => write!(f, "query {} from {}", name, request),
        }
    }
}
