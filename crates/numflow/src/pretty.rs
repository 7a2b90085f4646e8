//! Pretty printing for numflow AST
//!
//! Output is single-line and re-parses to the same tree. Chains print flat
//! (`a + b * c`); only `Paren` nodes produce parentheses.

use crate::ast::{Expression, FunctionCall, Identifier, Literal, Operand, Operator, PrimaryExpr};
use std::fmt::{self, Display};

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Literal::Int(n) => write!(f, "{n}"),
            // Debug keeps a `.0` or an exponent, so the text re-parses as a float
            Literal::Float(n) => write!(f, "{n:?}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

impl Display for PrimaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryExpr::Literal(lit) => write!(f, "{lit}"),
            PrimaryExpr::Identifier(ident) => write!(f, "{ident}"),
            PrimaryExpr::Call(call) => write!(f, "{call}"),
            PrimaryExpr::Paren(inner) => write!(f, "({inner})"),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Primary(primary) => write!(f, "{primary}"),
            Operand::Unary(unary) => write!(f, "{}{}", unary.op, unary.operand),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for operation in &self.rest {
            write!(f, " {} {}", operation.op, operation.operand)?;
        }
        Ok(())
    }
}

fn escape_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\0' => escaped.push_str("\\0"),
            c => escaped.push(c),
        }
    }
    escaped
}
