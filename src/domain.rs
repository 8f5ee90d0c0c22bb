//! Core lattice and domain traits.
//!
//! Every abstract domain in this crate is a [`Lattice`]. Domains that can be plugged into
//! an analysis implement [`ValueDomain`]; non-relational domains implement
//! [`NonRelationalValueDomain`] and obtain a [`ValueDomain`] by being lifted point-wise
//! into a [`ValueEnvironment`].

use std::fmt::Debug;

use crate::error::Result;
use crate::expr::{BinaryOp, Constant, Identifier, ProgramPoint, Type, UnaryOp, ValueExpr};
use crate::functional::ValueEnvironment;
use crate::satisfiability::Satisfiability;

pub const TOP_REPR: &str = "TOP";
pub const BOTTOM_REPR: &str = "BOTTOM";

/// Lattice structure shared by all abstract values.
///
/// # Lattice Properties
///
/// An implementation must satisfy:
/// - Reflexivity: `∀a. a ⊑ a`
/// - Transitivity: `∀a,b,c. a ⊑ b ∧ b ⊑ c ⇒ a ⊑ c`
/// - `⊥ ⊑ a ⊑ ⊤` for every `a`
/// - `a ⊔ b` is an upper bound of both `a` and `b`, `a ⊓ b` a lower bound
pub trait Lattice: Clone + Debug + PartialEq + Sized {
    /// The top element (`⊤`): no information.
    fn top() -> Self;

    /// The bottom element (`⊥`): unreachable.
    fn bottom() -> Self;

    fn is_top(&self) -> bool;

    fn is_bottom(&self) -> bool;

    /// Partial order: `self ⊑ other`, i.e. `self` is at least as precise as `other`.
    fn less_or_equal(&self, other: &Self) -> bool;

    /// Least upper bound (`⊔`), used at control-flow merges.
    fn lub(&self, other: &Self) -> Self;

    /// Greatest lower bound (`⊓`).
    fn glb(&self, other: &Self) -> Self;

    /// Widening (`∇`), used at loop heads.
    ///
    /// Must satisfy `self ⊑ self ∇ other` and `other ⊑ self ∇ other`, and every sequence
    /// `a₀, a₁ = a₀ ∇ b₀, a₂ = a₁ ∇ b₁, …` must stabilize after finitely many steps.
    /// There is no default: lattices of infinite height have to extrapolate.
    fn widening(&self, other: &Self) -> Self;

    /// Both `self ⊑ other` and `other ⊑ self`.
    fn equivalent(&self, other: &Self) -> bool {
        self.less_or_equal(other) && other.less_or_equal(self)
    }

    /// Join of many elements, starting from bottom.
    fn lub_many<I>(elems: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        elems.into_iter().fold(Self::bottom(), |acc, e| acc.lub(&e))
    }
}

/// A domain the analysis driver can run: it abstracts a whole program state.
pub trait ValueDomain: Lattice {
    /// Abstract semantics of `id := expr`.
    fn assign(&self, id: &Identifier, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self>;

    /// Abstract semantics of evaluating `expr` for its side effects only.
    fn small_step_semantics(&self, _expr: &ValueExpr, _pp: ProgramPoint) -> Result<Self> {
        Ok(self.clone())
    }

    /// Restricts the state to the concrete states where `expr` may hold.
    fn assume(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self>;

    /// Checks whether `expr` holds in every, none, or some of the concrete states.
    fn satisfies(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Satisfiability>;

    /// Drops everything known about `id`.
    fn forget_identifier(&self, id: &Identifier) -> Result<Self>;

    fn forget_identifiers<'a, I>(&self, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Identifier>,
    {
        ids.into_iter().try_fold(self.clone(), |acc, id| acc.forget_identifier(id))
    }

    /// Human-readable dump of the state.
    fn representation(&self) -> String;
}

/// A domain abstracting a single value, independently of other variables.
pub trait NonRelationalValueDomain: Lattice {
    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Whether values of `id` can be abstracted by this domain.
    fn tracks_identifier(id: &Identifier) -> bool {
        id.ty() != Type::Pointer
    }

    /// Abstract evaluation of `expr` in `env`.
    fn eval(expr: &ValueExpr, env: &ValueEnvironment<Self>, pp: ProgramPoint) -> Result<Self>;

    /// Three-valued truth of the boolean expression `expr` in `env`.
    fn satisfies(expr: &ValueExpr, env: &ValueEnvironment<Self>, pp: ProgramPoint) -> Result<Satisfiability>;

    /// Refines `env` assuming `expr` holds.
    ///
    /// The default only discards environments where `expr` definitely does not hold.
    fn assume(env: &ValueEnvironment<Self>, expr: &ValueExpr, pp: ProgramPoint) -> Result<ValueEnvironment<Self>> {
        match Self::satisfies(expr, env, pp)? {
            Satisfiability::NotSatisfied | Satisfiability::Bottom => Ok(ValueEnvironment::Bottom),
            _ => Ok(env.clone()),
        }
    }

    /// Human-readable form of a single value.
    fn representation(&self) -> String;
}

/// Assumes a boolean condition on `env`, splitting `&&`/`||` and pushing `!` inward.
///
/// Atomic conditions (comparisons and anything that is not a connective) are handed
/// to `atom`. `a && b` assumes both in sequence, `a || b` joins the two refinements.
pub(crate) fn assume_boolean<V, F>(env: &ValueEnvironment<V>, expr: &ValueExpr, atom: &F) -> Result<ValueEnvironment<V>>
where
    V: Lattice,
    F: Fn(&ValueEnvironment<V>, &ValueExpr) -> Result<ValueEnvironment<V>>,
{
    if env.is_bottom() {
        return Ok(ValueEnvironment::Bottom);
    }
    match expr {
        ValueExpr::Constant(Constant::Bool(true)) => Ok(env.clone()),
        ValueExpr::Constant(Constant::Bool(false)) => Ok(ValueEnvironment::Bottom),
        ValueExpr::Binary(BinaryOp::And, l, r) => {
            let first = assume_boolean(env, l, atom)?;
            assume_boolean(&first, r, atom)
        }
        ValueExpr::Binary(BinaryOp::Or, l, r) => {
            let left = assume_boolean(env, l, atom)?;
            let right = assume_boolean(env, r, atom)?;
            Ok(left.lub(&right))
        }
        ValueExpr::Unary(UnaryOp::Not, inner) => match inner.as_ref() {
            ValueExpr::Unary(UnaryOp::Not, e) => assume_boolean(env, e, atom),
            ValueExpr::Constant(Constant::Bool(b)) => assume_boolean(env, &ValueExpr::bool(!b), atom),
            // De Morgan
            ValueExpr::Binary(BinaryOp::And, l, r) => {
                let pushed = (**l).clone().not().or((**r).clone().not());
                assume_boolean(env, &pushed, atom)
            }
            ValueExpr::Binary(BinaryOp::Or, l, r) => {
                let pushed = (**l).clone().not().and((**r).clone().not());
                assume_boolean(env, &pushed, atom)
            }
            ValueExpr::Binary(op, l, r) => match op.negate_comparison() {
                Some(negated) => atom(env, &ValueExpr::Binary(negated, l.clone(), r.clone())),
                None => atom(env, expr),
            },
            _ => atom(env, expr),
        },
        _ => atom(env, expr),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Test helper: validate basic lattice axioms over a set of sample elements.
    pub fn check_lattice_laws<L: Lattice>(samples: &[L]) {
        let top = L::top();
        let bottom = L::bottom();
        assert!(top.is_top());
        assert!(bottom.is_bottom());

        for a in samples {
            // Reflexivity: a ⊑ a
            assert!(a.less_or_equal(a), "Reflexivity failed for {:?}", a);

            // Idempotence: a ⊔ a = a
            assert!(a.lub(a).equivalent(a), "Join idempotence failed for {:?}", a);

            // Identity: ⊥ ⊔ a = a
            assert!(bottom.lub(a).equivalent(a), "Join with bottom failed for {:?}", a);

            // Absorption: ⊤ ⊔ a = ⊤
            assert!(top.lub(a).is_top(), "Join with top failed for {:?}", a);

            // Identity: a ⊓ ⊤ = a
            assert!(a.glb(&top).equivalent(a), "Meet with top failed for {:?}", a);

            assert!(bottom.less_or_equal(a));
            assert!(a.less_or_equal(&top));
        }

        for a in samples {
            for b in samples {
                // Commutativity: a ⊔ b = b ⊔ a
                assert!(a.lub(b).equivalent(&b.lub(a)), "Join commutativity failed for {:?}, {:?}", a, b);

                // Join upper bound: a ⊑ (a ⊔ b)
                let joined = a.lub(b);
                assert!(a.less_or_equal(&joined), "Join is not upper bound of {:?}", a);
                assert!(b.less_or_equal(&joined), "Join is not upper bound of {:?}", b);

                // Meet lower bound: (a ⊓ b) ⊑ a
                let met = a.glb(b);
                assert!(met.less_or_equal(a), "Meet is not lower bound of {:?}", a);
                assert!(met.less_or_equal(b), "Meet is not lower bound of {:?}", b);

                // Widening is an upper bound
                let widened = a.widening(b);
                assert!(a.less_or_equal(&widened), "Widening lost {:?}", a);
                assert!(b.less_or_equal(&widened), "Widening lost {:?}", b);
            }
        }
    }
}
