//! Strict upper bounds: `x < y` relations between integer variables.

use std::iter;

use log::debug;

use crate::domain::{assume_boolean, Lattice, ValueDomain};
use crate::error::Result;
use crate::expr::{BinaryOp, Constant, Identifier, ProgramPoint, UnaryOp, ValueExpr};
use crate::relational::{ConstraintSet, Relational, RelationalMap, RelationKind};
use crate::satisfiability::Satisfiability;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UpperBounds;

impl RelationKind for UpperBounds {
    type Target = Identifier;

    const NAME: &'static str = "strict-upper-bounds";

    /// A cycle `a < … < a` has no solution.
    fn is_contradictory(map: &RelationalMap<Identifier>) -> bool {
        map.iter()
            .any(|(a, bounds)| bounds.iter().any(|b| b == a || map.get(b).contains(a)))
    }

    fn line(id: &Identifier, targets: &ConstraintSet<Identifier>) -> String {
        format!("{} < {}", id, targets.compact())
    }
}

/// Tracks, for every variable, the variables whose value is strictly greater.
pub type StrictUpperBounds = Relational<UpperBounds>;

/// Matches `y + c`, `c + y` and `y - c`, returning `y` and the signed offset.
fn offset_of(expr: &ValueExpr) -> Option<(&Identifier, i64)> {
    let ValueExpr::Binary(op, l, r) = expr else {
        return None;
    };
    match (op, l.as_ref(), r.as_ref()) {
        (BinaryOp::Add, ValueExpr::Identifier(y), ValueExpr::Constant(Constant::Int(c)))
        | (BinaryOp::Add, ValueExpr::Constant(Constant::Int(c)), ValueExpr::Identifier(y)) => Some((y, *c)),
        (BinaryOp::Sub, ValueExpr::Identifier(y), ValueExpr::Constant(Constant::Int(c))) => {
            c.checked_neg().map(|c| (y, c))
        }
        _ => None,
    }
}

impl StrictUpperBounds {
    /// Whether `a < b` is known.
    pub fn is_below(&self, a: &Identifier, b: &Identifier) -> bool {
        self.get(a).contains(b)
    }

    fn satisfies_comparison(&self, op: BinaryOp, a: &Identifier, b: &Identifier) -> Satisfiability {
        let verdict = |holds: bool, fails: bool| {
            if holds {
                Satisfiability::Satisfied
            } else if fails {
                Satisfiability::NotSatisfied
            } else {
                Satisfiability::Unknown
            }
        };
        let same = a == b;
        match op {
            BinaryOp::Lt => verdict(self.is_below(a, b), same || self.is_below(b, a)),
            BinaryOp::Gt => verdict(self.is_below(b, a), same || self.is_below(a, b)),
            BinaryOp::Le => verdict(same || self.is_below(a, b), self.is_below(b, a)),
            BinaryOp::Ge => verdict(same || self.is_below(b, a), self.is_below(a, b)),
            BinaryOp::Eq => verdict(same, self.is_below(a, b) || self.is_below(b, a)),
            BinaryOp::Ne => self.satisfies_comparison(BinaryOp::Eq, a, b).negate(),
            _ => Satisfiability::Unknown,
        }
    }

    /// Records `a < b`.
    fn add_bound(&self, a: &Identifier, b: &Identifier) -> Self {
        self.with(a, self.get(a).with(b.clone()))
    }
}

impl ValueDomain for StrictUpperBounds {
    fn assign(&self, id: &Identifier, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assign {} := {}", pp, UpperBounds::NAME, id, expr);
        if self.is_bottom() {
            return Ok(self.clone());
        }
        Self::check_tracked(iter::once(id).chain(expr.identifiers()))?;
        let base = self.scrub(id);
        Ok(match offset_of(expr) {
            Some((y, c)) if y != id && c < 0 => base.with(id, base.get(y).with(y.clone())).closure(),
            Some((y, c)) if y != id && c > 0 => base.add_bound(y, id).closure(),
            _ => base,
        })
    }

    fn assume(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assume {}", pp, UpperBounds::NAME, expr);
        Self::check_tracked(expr.identifiers())?;
        let refined = assume_boolean(
            self.map(),
            expr,
            &|env: &RelationalMap<Identifier>, atom: &ValueExpr| -> Result<RelationalMap<Identifier>> {
                let state = Self::from_map(env.clone());
                let refined = match state.satisfies(atom, pp)? {
                    Satisfiability::NotSatisfied | Satisfiability::Bottom => return Ok(RelationalMap::Bottom),
                    Satisfiability::Satisfied => return Ok(env.clone()),
                    Satisfiability::Unknown => match atom {
                        ValueExpr::Binary(op @ (BinaryOp::Lt | BinaryOp::Gt), l, r) => {
                            match (l.as_identifier(), r.as_identifier()) {
                                (Some(a), Some(b)) if *op == BinaryOp::Lt => state.add_bound(a, b),
                                (Some(a), Some(b)) => state.add_bound(b, a),
                                _ => state,
                            }
                        }
                        _ => state,
                    },
                };
                Ok(refined.closure().map().clone())
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
                (Some(a), Some(b)) => self.satisfies_comparison(*op, a, b),
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

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::domain::tests::check_lattice_laws;

    fn var(name: &str) -> (Identifier, ValueExpr) {
        let id = Identifier::int(name);
        (id.clone(), ValueExpr::var(id))
    }

    #[test]
    fn test_increment_records_bound() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");

        let state = StrictUpperBounds::top()
            .assign(&x, &ValueExpr::int(5), pp)?
            .assign(&y, &ex.clone().add(ValueExpr::int(3)), pp)?;
        assert_eq!(state.representation(), "x < y");
        assert!(state.is_below(&x, &y));
        assert_eq!(state.satisfies(&ex.clone().less(ey.clone()), pp)?, Satisfiability::Satisfied);
        assert_eq!(state.satisfies(&ey.clone().less(ex.clone()), pp)?, Satisfiability::NotSatisfied);
        assert_eq!(state.satisfies(&ey.clone().greater_eq(ex.clone()), pp)?, Satisfiability::Satisfied);
        assert_eq!(state.satisfies(&ey.clone().not_equal(ex.clone()), pp)?, Satisfiability::Satisfied);
        assert_eq!(state.satisfies(&ex.clone().equal(ex.clone()), pp)?, Satisfiability::Satisfied);
        assert_eq!(state.satisfies(&ex.clone().less(ex), pp)?, Satisfiability::NotSatisfied);
        Ok(())
    }

    #[test]
    fn test_offset_forms() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, _) = var("x");
        let (y, ey) = var("y");

        let below = |e: ValueExpr| StrictUpperBounds::top().assign(&x, &e, pp);
        assert!(below(ey.clone().add(ValueExpr::int(-2)))?.is_below(&x, &y));
        assert!(below(ey.clone().sub(ValueExpr::int(2)))?.is_below(&x, &y));
        assert!(below(ValueExpr::int(1).add(ey.clone()))?.is_below(&y, &x));
        assert!(below(ey.clone().sub(ValueExpr::int(-1)))?.is_below(&y, &x));
        assert!(below(ey.clone().add(ValueExpr::int(0)))?.is_top());
        assert!(below(ey.clone().mul(ValueExpr::int(2)))?.is_top());
        Ok(())
    }

    #[test]
    fn test_chain_closure() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");
        let (z, ez) = var("z");

        let state = StrictUpperBounds::top()
            .assign(&y, &ex.clone().add(ValueExpr::int(1)), pp)?
            .assign(&z, &ey.add(ValueExpr::int(1)), pp)?;
        assert_eq!(state.representation(), "x < {y, z}\ny < z");
        assert_eq!(state.satisfies(&ex.clone().less(ez.clone()), pp)?, Satisfiability::Satisfied);
        assert_eq!(state.satisfies(&ex.clone().greater_eq(ez.clone()), pp)?, Satisfiability::NotSatisfied);
        assert_eq!(state.satisfies(&ex.equal(ez), pp)?, Satisfiability::NotSatisfied);
        assert_eq!(state.closure(), state);
        assert_eq!(state.get(&x), ConstraintSet::new([y, z]));
        Ok(())
    }

    #[test]
    fn test_self_increment_forgets() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");

        let state = StrictUpperBounds::top().assign(&x, &ey.sub(ValueExpr::int(1)), pp)?;
        assert!(state.is_below(&x, &y));
        let state = state.assign(&x, &ex.add(ValueExpr::int(1)), pp)?;
        assert!(!state.is_below(&x, &y));
        assert!(state.is_top());
        Ok(())
    }

    #[test]
    fn test_assume_contradiction() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");

        let state = StrictUpperBounds::top().assume(&ex.clone().greater(ey.clone()), pp)?;
        assert!(state.is_below(&y, &x));
        assert!(state.assume(&ex.clone().less(ey.clone()), pp)?.is_bottom());
        assert!(state.assume(&ex.clone().equal(ey.clone()), pp)?.is_bottom());
        assert_eq!(state.assume(&ex.clone().greater_eq(ey.clone()), pp)?, state);
        Ok(())
    }

    #[test]
    fn test_assume_connectives() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");
        let (z, ez) = var("z");

        let both = StrictUpperBounds::top().assume(&ex.clone().less(ey.clone()).and(ey.clone().less(ez.clone())), pp)?;
        assert!(both.is_below(&x, &z));

        let either = StrictUpperBounds::top().assume(&ex.clone().less(ey.clone()).or(ex.clone().less(ez)), pp)?;
        assert!(either.is_top());

        // !(x >= y) is x < y
        let negated = StrictUpperBounds::top().assume(&ex.greater_eq(ey).not(), pp)?;
        assert!(negated.is_below(&x, &y));
        Ok(())
    }

    #[test]
    fn test_forget_round_trip() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");
        let (z, _) = var("z");

        let state = StrictUpperBounds::top()
            .assign(&y, &ex.add(ValueExpr::int(1)), pp)?
            .assign(&z, &ey.add(ValueExpr::int(1)), pp)?;
        let forgotten = state.forget_identifier(&y)?;
        assert!(!forgotten.map().contains_key(&y));
        assert!(forgotten.map().iter().all(|(_, bounds)| !bounds.contains(&y)));
        assert!(forgotten.is_below(&x, &z));
        assert_eq!(forgotten.forget_identifier(&y)?, forgotten);
        Ok(())
    }

    #[test]
    fn test_lattice() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");
        let (_, ez) = var("z");

        let xy = StrictUpperBounds::top().assume(&ex.clone().less(ey.clone()), pp)?;
        let yx = StrictUpperBounds::top().assume(&ey.less(ex.clone()), pp)?;
        let xz = StrictUpperBounds::top().assume(&ex.less(ez), pp)?;

        assert!(xy.lub(&yx).is_top());
        assert!(xy.glb(&yx).is_bottom());
        assert!(xy.glb(&xz).is_below(&x, &y));
        assert!(xy.widening(&xy).equivalent(&xy));

        check_lattice_laws(&[xy, xz, StrictUpperBounds::top(), StrictUpperBounds::bottom()]);
        Ok(())
    }
}
