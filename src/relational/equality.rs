//! Equalities between variables.

use std::iter;

use log::debug;

use crate::domain::{assume_boolean, Lattice, ValueDomain};
use crate::error::Result;
use crate::expr::{BinaryOp, Identifier, ProgramPoint, UnaryOp, ValueExpr};
use crate::relational::{ConstraintSet, Relational, RelationalMap, RelationKind};
use crate::satisfiability::Satisfiability;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Equality;

impl RelationKind for Equality {
    type Target = Identifier;

    const NAME: &'static str = "equality";

    fn line(id: &Identifier, targets: &ConstraintSet<Identifier>) -> String {
        format!("{} == {}", id, targets.compact())
    }
}

/// Tracks, for every variable, the variables known to hold the same value.
pub type EqualityDomain = Relational<Equality>;

impl EqualityDomain {
    /// Whether `a` and `b` are known to be equal.
    pub fn are_equal(&self, a: &Identifier, b: &Identifier) -> bool {
        a == b || self.get(a).contains(b) || self.get(b).contains(a)
    }

    fn assign_identifier(&self, x: &Identifier, y: &Identifier) -> Self {
        let base = self.scrub(x);
        let peers = base
            .map()
            .iter()
            .filter(|(_, targets)| targets.contains(y))
            .map(|(k, _)| k.clone())
            .chain(iter::once(y.clone()))
            .collect::<Vec<_>>();

        let mut next = base.with(x, ConstraintSet::singleton(y.clone()));
        for peer in &peers {
            next = next.with(peer, next.get(peer).with(x.clone()));
        }
        next.closure()
    }
}

impl ValueDomain for EqualityDomain {
    fn assign(&self, id: &Identifier, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assign {} := {}", pp, Equality::NAME, id, expr);
        if self.is_bottom() {
            return Ok(self.clone());
        }
        Self::check_tracked(iter::once(id).chain(expr.identifiers()))?;
        Ok(match expr.as_identifier() {
            Some(y) if y == id => self.clone(),
            Some(y) => self.assign_identifier(id, y),
            None => self.scrub(id),
        })
    }

    fn assume(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assume {}", pp, Equality::NAME, expr);
        Self::check_tracked(expr.identifiers())?;
        let refined = assume_boolean(
            self.map(),
            expr,
            &|env: &RelationalMap<Identifier>, atom: &ValueExpr| -> Result<RelationalMap<Identifier>> {
                match Self::from_map(env.clone()).satisfies(atom, pp)? {
                    Satisfiability::NotSatisfied | Satisfiability::Bottom => Ok(RelationalMap::Bottom),
                    _ => Ok(env.clone()),
                }
            },
        )?;
        Ok(Self::from_map(refined))
    }

    fn satisfies(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Satisfiability> {
        if self.is_bottom() {
            return Ok(Satisfiability::Bottom);
        }
        Ok(match expr {
            ValueExpr::Unary(UnaryOp::Not, e) => self.satisfies(e, pp)?.negate(),
            ValueExpr::Binary(BinaryOp::And, l, r) => self.satisfies(l, pp)?.and(self.satisfies(r, pp)?),
            ValueExpr::Binary(BinaryOp::Or, l, r) => self.satisfies(l, pp)?.or(self.satisfies(r, pp)?),
            ValueExpr::Binary(op, l, r) => match (l.as_identifier(), r.as_identifier()) {
                (Some(a), Some(b)) if self.are_equal(a, b) => match op {
                    BinaryOp::Eq | BinaryOp::Le | BinaryOp::Ge | BinaryOp::StrEq => Satisfiability::Satisfied,
                    BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt => Satisfiability::NotSatisfied,
                    _ => Satisfiability::Unknown,
                },
                _ => Satisfiability::Unknown,
            },
            _ => Satisfiability::Unknown,
        })
    }

    fn forget_identifier(&self, id: &Identifier) -> Result<Self> {
        Ok(self.scrub(id))
    }

    fn representation(&self) -> String {
        self.render()
    }
}
