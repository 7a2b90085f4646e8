//! AST types for numflow
//!
//! The parser produces *flat* operator chains: `a + b * c` is a single
//! [`Expression`] whose `rest` holds `[+ b, * c]`. Precedence is not applied
//! while parsing; it is resolved during pattern matching (see
//! `crate::precedence`), which lets one textual pattern such as `_1 + _2`
//! recognise `x * y + z` without the grammar committing to a tree shape.
//!
//! Nodes are immutable once built. Recursive edges go through `Box`
//! (`UnaryExpr::operand`, `PrimaryExpr::Paren`) or `Vec` (`rest`, `args`).

mod placeholder;

pub use placeholder::{Placeholder, PlaceholderKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Classify this identifier as a pattern placeholder, if it is one.
    pub fn placeholder(&self) -> Option<Placeholder<'_>> {
        Placeholder::classify(&self.name)
    }
}

/// Operator tokens. `Sub` doubles as unary negation, `Not` is unary only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Not,
}

impl Operator {
    /// Binary precedence; higher binds tighter. Defined once for every token.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge => 3,
            Operator::Add | Operator::Sub => 4,
            Operator::Mul | Operator::Div | Operator::Mod => 5,
            Operator::Pow => 6,
            // never appears between operands
            Operator::Not => 0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Or => "||",
            Operator::And => "&&",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Pow => "^",
            Operator::Not => "!",
        }
    }
}

/// Prefix operator applied to an operand: `-x`, `!flag`
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: Operator,
    pub operand: Box<Operand>,
}

/// One `op operand` link of an operator chain
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: Operator,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Primary(PrimaryExpr),
    Unary(UnaryExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryExpr {
    Literal(Literal),
    Identifier(Identifier),
    Call(FunctionCall),
    /// Parenthesised sub-expression
    Paren(Box<Expression>),
}

/// `first (op operand)*`
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub first: Operand,
    pub rest: Vec<Operation>,
}

/// `name(arg, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: Identifier,
    pub args: Vec<Expression>,
}

impl Operand {
    /// Strip parentheses that wrap a single operand: `((x))` is `x`.
    pub fn normalized(&self) -> &Operand {
        match self {
            Operand::Primary(PrimaryExpr::Paren(inner)) if inner.rest.is_empty() => {
                inner.first.normalized()
            }
            other => other,
        }
    }

    pub fn placeholder(&self) -> Option<Placeholder<'_>> {
        match self.normalized() {
            Operand::Primary(PrimaryExpr::Identifier(ident)) => ident.placeholder(),
            _ => None,
        }
    }

    /// Wrap as a primary operand, parenthesising chains.
    pub fn grouped(expr: Expression) -> Operand {
        if expr.rest.is_empty() {
            expr.first
        } else {
            Operand::Primary(PrimaryExpr::Paren(Box::new(expr)))
        }
    }
}

impl Expression {
    pub fn new(first: Operand, rest: Vec<Operation>) -> Self {
        Self { first, rest }
    }

    /// Collapse single-operand wrapping introduced by the grammar.
    ///
    /// An expression with no `rest` whose operand is a parenthesised
    /// expression is replaced by that expression, recursively.
    pub fn normalized(&self) -> &Expression {
        if !self.rest.is_empty() {
            return self;
        }
        match &self.first {
            Operand::Primary(PrimaryExpr::Paren(inner)) => inner.normalized(),
            _ => self,
        }
    }

    pub fn into_normalized(self) -> Expression {
        if !self.rest.is_empty() {
            return self;
        }
        match self.first {
            Operand::Primary(PrimaryExpr::Paren(inner)) => inner.into_normalized(),
            first => Expression::from(first),
        }
    }

    /// The placeholder this whole expression consists of, if any.
    pub fn placeholder(&self) -> Option<Placeholder<'_>> {
        let expr = self.normalized();
        if expr.rest.is_empty() {
            expr.first.placeholder()
        } else {
            None
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        let expr = self.normalized();
        match (expr.first.normalized(), expr.rest.is_empty()) {
            (Operand::Primary(PrimaryExpr::Identifier(ident)), true) => Some(ident),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&FunctionCall> {
        let expr = self.normalized();
        match (expr.first.normalized(), expr.rest.is_empty()) {
            (Operand::Primary(PrimaryExpr::Call(call)), true) => Some(call),
            _ => None,
        }
    }

    /// Number of operands in the chain
    pub fn len(&self) -> usize {
        self.rest.len() + 1
    }

    pub fn is_chain(&self) -> bool {
        !self.rest.is_empty()
    }

    // ============ Builders ============

    pub fn identifier(name: impl Into<String>) -> Self {
        PrimaryExpr::Identifier(Identifier::new(name)).into()
    }

    pub fn literal(lit: Literal) -> Self {
        PrimaryExpr::Literal(lit).into()
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        PrimaryExpr::Call(FunctionCall {
            name: Identifier::new(name),
            args,
        })
        .into()
    }

    pub fn unary(op: Operator, operand: Expression) -> Self {
        Operand::Unary(UnaryExpr {
            op,
            operand: Box::new(Operand::grouped(operand)),
        })
        .into()
    }

    /// Append `op rhs` to this chain without regrouping.
    pub fn then(mut self, op: Operator, rhs: Expression) -> Self {
        self.rest.push(Operation {
            op,
            operand: Operand::grouped(rhs),
        });
        self
    }

    pub fn binary(lhs: Expression, op: Operator, rhs: Expression) -> Self {
        Expression::new(Operand::grouped(lhs), Vec::new()).then(op, rhs)
    }
}

impl From<Operand> for Expression {
    fn from(first: Operand) -> Self {
        Expression {
            first,
            rest: Vec::new(),
        }
    }
}

impl From<PrimaryExpr> for Expression {
    fn from(primary: PrimaryExpr) -> Self {
        Operand::Primary(primary).into()
    }
}

impl From<Literal> for Expression {
    fn from(lit: Literal) -> Self {
        Expression::literal(lit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paren(expr: Expression) -> Expression {
        PrimaryExpr::Paren(Box::new(expr)).into()
    }

    #[test]
    fn normalization_strips_nested_parens() {
        let x = Expression::identifier("x");
        let wrapped = paren(paren(x.clone()));
        assert_eq!(wrapped.normalized(), &x);
        assert_eq!(wrapped.into_normalized(), x);
    }

    #[test]
    fn normalization_keeps_chains() {
        let chain = Expression::binary(
            Expression::identifier("a"),
            Operator::Add,
            Expression::identifier("b"),
        );
        let wrapped = paren(chain.clone());
        assert_eq!(wrapped.normalized(), &chain);
        assert!(chain.normalized().is_chain());
    }

    #[test]
    fn grouped_operand_parenthesises_chains_only() {
        let x = Expression::identifier("x");
        assert!(matches!(
            Operand::grouped(x),
            Operand::Primary(PrimaryExpr::Identifier(_))
        ));
        let chain = Expression::binary(
            Expression::identifier("a"),
            Operator::Mul,
            Expression::identifier("b"),
        );
        assert!(matches!(
            Operand::grouped(chain),
            Operand::Primary(PrimaryExpr::Paren(_))
        ));
    }

    #[test]
    fn precedence_table_orders_tokens() {
        assert!(Operator::Mul.precedence() > Operator::Add.precedence());
        assert!(Operator::Pow.precedence() > Operator::Mul.precedence());
        assert_eq!(Operator::Add.precedence(), Operator::Sub.precedence());
        assert!(Operator::And.precedence() > Operator::Or.precedence());
    }

    #[test]
    fn call_and_identifier_accessors() {
        let call = Expression::call("f", vec![Expression::identifier("x")]);
        assert_eq!(paren(call.clone()).as_call().map(|c| c.name.name.as_str()), Some("f"));
        assert!(call.as_identifier().is_none());
        assert_eq!(
            Expression::identifier("y").as_identifier(),
            Some(&Identifier::new("y"))
        );
    }
}
