use std::fmt;

/// Arithmetic operators spelled as words in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `plus` - addition, or string concatenation when either side is a string
    Plus,
    /// `minus`
    Minus,
    /// `times`
    Times,
    /// `divided by`
    Divided,
}

/// Comparison operators. At most one comparison appears per expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `equals`
    Equals,
    /// `is greater than`
    Greater,
    /// `is less than`
    Less,
}

/// Logical operators. `not` is unary; the parser leaves its left side empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Not,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            ArithOp::Plus => "plus",
            ArithOp::Minus => "minus",
            ArithOp::Times => "times",
            ArithOp::Divided => "divided",
        };
        write!(f, "{}", word)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            CompareOp::Equals => "equals",
            CompareOp::Greater => "greater",
            CompareOp::Less => "less",
        };
        write!(f, "{}", word)
    }
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            LogicOp::And => "and",
            LogicOp::Or => "or",
            LogicOp::Not => "not",
        };
        write!(f, "{}", word)
    }
}
