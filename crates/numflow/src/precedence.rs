//! Precedence-aware matching of flat operator chains
//!
//! Chains arrive flat from the parser. When a placeholder sits at operand
//! `k` of one chain, it captures a *segment* of the other chain: the operand
//! at the cursor plus every following `op operand` pair whose operator binds
//! strictly tighter than the operators around the placeholder. Equal
//! precedence stops the segment, so ties group to the left.
//!
//! `_1 + __rest` against `a + b * c` captures `b * c`; `_1 * __rest` against
//! `a * b + c` captures `b` and then fails on the unmatched `+ c`.

use log::trace;

use crate::ast::{Expression, Operand, Operation, Operator};
use crate::matcher::Matcher;

/// Read-only view over an expression as `operand (op operand)*`.
#[derive(Clone, Copy)]
struct Chain<'a> {
    expr: &'a Expression,
}

impl<'a> Chain<'a> {
    fn new(expr: &'a Expression) -> Self {
        Self { expr }
    }

    fn len(&self) -> usize {
        self.expr.len()
    }

    fn operand(&self, k: usize) -> &'a Operand {
        match k {
            0 => &self.expr.first,
            _ => &self.expr.rest[k - 1].operand,
        }
    }

    /// Operator joining operand `k - 1` to operand `k`.
    fn op(&self, k: usize) -> Option<Operator> {
        k.checked_sub(1)
            .and_then(|idx| self.expr.rest.get(idx))
            .map(|operation| operation.op)
    }

    /// Binding strength around operand `k`: a segment captured here may only
    /// extend over operators tighter than this.
    fn floor(&self, k: usize) -> u8 {
        let before = self.op(k).map_or(0, Operator::precedence);
        let after = self.op(k + 1).map_or(0, Operator::precedence);
        before.max(after)
    }

    /// Last operand of the segment starting at `start`.
    fn segment_end(&self, start: usize, floor: u8) -> usize {
        let mut end = start;
        while let Some(op) = self.op(end + 1) {
            if op.precedence() <= floor {
                break;
            }
            end += 1;
        }
        end
    }

    /// Operands `start..=end` as a standalone expression.
    fn slice(&self, start: usize, end: usize) -> Expression {
        Expression::new(
            self.operand(start).clone(),
            self.expr.rest[start..end].to_vec(),
        )
        .into_normalized()
    }

    fn is_ellipsis(&self, k: usize) -> bool {
        self.operand(k)
            .placeholder()
            .is_some_and(|holder| holder.is_ellipsis())
    }

    /// Operand `k` is the last one and an ellipsis, so it may capture nothing.
    fn trailing_ellipsis(&self, k: usize) -> bool {
        k + 1 == self.len() && self.is_ellipsis(k)
    }
}

pub(crate) fn match_chains(m: &mut Matcher<'_>, pattern: &Expression, candidate: &Expression) -> bool {
    let p = Chain::new(pattern);
    let c = Chain::new(candidate);
    let (mut i, mut j) = (0, 0);

    loop {
        let p_operand = p.operand(i);
        let c_operand = c.operand(j);
        let matched = if let Some(holder) = p_operand.placeholder() {
            let end = c.segment_end(j, p.floor(i));
            let ok = m.bind(holder.name, c.slice(j, end));
            j = end;
            ok
        } else if let Some(holder) = c_operand.placeholder() {
            let end = p.segment_end(i, c.floor(j));
            let ok = m.bind(holder.name, p.slice(i, end));
            i = end;
            ok
        } else {
            m.operand(p_operand, c_operand)
        };
        if !matched {
            return false;
        }

        match (p.op(i + 1), c.op(j + 1)) {
            (None, None) => return true,
            (Some(a), Some(b)) if a == b => {
                i += 1;
                j += 1;
            }
            // an ellipsis repeats over further operands joined by its own operator
            (_, Some(b)) if p.is_ellipsis(i) && p.op(i) == Some(b) => j += 1,
            (Some(a), _) if c.is_ellipsis(j) && c.op(j) == Some(a) => i += 1,
            (Some(_), None) => return p.trailing_ellipsis(i + 1),
            (None, Some(_)) => return c.trailing_ellipsis(j + 1),
            (Some(a), Some(b)) => {
                trace!("operator mismatch: {a} vs {b}");
                return false;
            }
        }
    }
}

/// Split a chain at its last lowest-precedence operator into
/// `(lhs) op (rhs)`, which groups equal-precedence operators to the left.
///
/// Returns `None` when the chain already has at most two operands.
pub fn regroup(expr: &Expression) -> Option<Expression> {
    let expr = expr.normalized();
    if expr.rest.len() < 2 {
        return None;
    }
    let split = expr
        .rest
        .iter()
        .enumerate()
        .rev()
        .min_by_key(|(_, operation)| operation.op.precedence())
        .map(|(idx, _)| idx)?;

    let lhs = Expression::new(expr.first.clone(), expr.rest[..split].to_vec());
    let Operation { op, operand } = expr.rest[split].clone();
    let rhs = Expression::new(operand, expr.rest[split + 1..].to_vec());
    let grouped = Expression::binary(lhs, op, rhs);
    trace!("regrouped {expr} as {grouped}");
    Some(grouped)
}
