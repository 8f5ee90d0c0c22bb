//! Substring relations between string variables.
//!
//! The targets of `x` are expressions whose value is known to occur inside the value
//! of `x`: other variables, concatenations of them, and pieces of string literals.
//! `x := y + "ab"` records `y`, `"a"`, `"b"`, `"ab"` and `y + "ab"` as substrings of
//! `x`. Absence of a target says nothing, so this domain never proves a `contains`
//! false.

use std::collections::BTreeSet;
use std::iter;

use log::debug;

use crate::domain::{Lattice, ValueDomain};
use crate::error::Result;
use crate::expr::{BinaryOp, Constant, Identifier, ProgramPoint, ValueExpr};
use crate::relational::{ConstraintSet, Relational, RelationKind};
use crate::satisfiability::Satisfiability;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Substring;

impl RelationKind for Substring {
    type Target = ValueExpr;

    const NAME: &'static str = "relational-substring";

    fn line(id: &Identifier, targets: &ConstraintSet<ValueExpr>) -> String {
        format!("{}: {}", id, targets)
    }
}

/// Tracks, for every string variable, the expressions it contains as substrings.
pub type RelationalSubstringDomain = Relational<Substring>;

/// Operands of a chain of concatenations, left to right.
fn flatten(expr: &ValueExpr) -> Vec<&ValueExpr> {
    match expr {
        ValueExpr::Binary(BinaryOp::Concat, l, r) => {
            let mut parts = flatten(l);
            parts.extend(flatten(r));
            parts
        }
        other => vec![other],
    }
}

/// Whether the value of `expr` is not a function of the program state.
fn is_opaque(expr: &ValueExpr) -> bool {
    match expr {
        ValueExpr::PushAny | ValueExpr::Skip => true,
        ValueExpr::Identifier(_) | ValueExpr::Constant(_) => false,
        ValueExpr::Unary(_, e) => is_opaque(e),
        ValueExpr::Binary(_, l, r) => is_opaque(l) || is_opaque(r),
        ValueExpr::Ternary(_, l, m, r) => is_opaque(l) || is_opaque(m) || is_opaque(r),
    }
}

/// Every non-empty substring of `s`, as string constants.
fn literal_substrings(s: &str, out: &mut BTreeSet<ValueExpr>) {
    let chars = s.chars().collect::<Vec<_>>();
    for i in 0..chars.len() {
        for j in i + 1..=chars.len() {
            out.insert(ValueExpr::string(chars[i..j].iter().collect::<String>()));
        }
    }
}

/// Expressions a string built by `expr` is known to contain.
///
/// These are the operands of the concatenation, every contiguous run of operands,
/// and every substring of a literal operand.
pub fn relations(expr: &ValueExpr) -> BTreeSet<ValueExpr> {
    let parts = flatten(expr);
    let mut out = BTreeSet::new();
    for (i, &part) in parts.iter().enumerate() {
        match part {
            ValueExpr::Constant(Constant::Str(s)) => literal_substrings(s, &mut out),
            _ if is_opaque(part) => continue,
            _ => {
                out.insert(part.clone());
            }
        }
        let mut fragment = part.clone();
        for &next in &parts[i + 1..] {
            if is_opaque(next) {
                break;
            }
            fragment = fragment.concat(next.clone());
            out.insert(fragment.clone());
        }
    }
    out
}

/// `expr` rebuilt as the left-nested concatenation `relations` records.
fn whole(expr: &ValueExpr) -> ValueExpr {
    let mut parts = flatten(expr).into_iter().cloned();
    let first = parts.next().unwrap_or(ValueExpr::Skip);
    parts.fold(first, ValueExpr::concat)
}

impl RelationalSubstringDomain {
    /// Whether `expr` is known to occur inside the value of `x`.
    pub fn is_substring_of(&self, expr: &ValueExpr, x: &Identifier) -> bool {
        if expr.as_identifier() == Some(x) {
            return true;
        }
        if is_opaque(expr) {
            return false;
        }
        self.get(x).contains_all(&ConstraintSet::new(relations(expr)))
    }

    /// Adds the relations of `expr` to the targets of `x`.
    fn merge(&self, x: &Identifier, expr: &ValueExpr) -> Self {
        let found = relations(expr).into_iter().filter(|r| !r.mentions(x));
        let merged = self.get(x).union(&ConstraintSet::new(found));
        self.with(x, merged).closure()
    }

    fn refine(&self, expr: &ValueExpr) -> Self {
        if self.is_bottom() {
            return self.clone();
        }
        match expr {
            ValueExpr::Binary(BinaryOp::And, l, r) => self.refine(l).glb(&self.refine(r)),
            ValueExpr::Binary(BinaryOp::Or, l, r) => self.refine(l).lub(&self.refine(r)),
            ValueExpr::Binary(BinaryOp::Eq | BinaryOp::StrEq, l, r) if l.ty().is_string() && r.ty().is_string() => {
                match (l.as_identifier(), r.as_identifier()) {
                    (Some(a), Some(b)) => self.merge(a, r).merge(b, l),
                    (Some(a), None) => self.merge(a, r),
                    (None, Some(b)) => self.merge(b, l),
                    (None, None) => self.clone(),
                }
            }
            ValueExpr::Binary(BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith, l, r) => {
                match l.as_identifier() {
                    Some(x) => self.merge(x, r),
                    None => self.clone(),
                }
            }
            _ => self.clone(),
        }
    }
}

impl ValueDomain for RelationalSubstringDomain {
    fn assign(&self, id: &Identifier, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assign {} := {}", pp, Substring::NAME, id, expr);
        if self.is_bottom() {
            return Ok(self.clone());
        }
        Self::check_tracked(iter::once(id).chain(expr.identifiers()))?;
        if !id.ty().is_string() || matches!(expr, ValueExpr::PushAny) {
            return Ok(self.scrub(id));
        }

        let at_top_level = flatten(expr).contains(&&ValueExpr::Identifier(id.clone()));
        let kept = if at_top_level { self.get(id) } else { ConstraintSet::top() };
        let base = self.scrub(id);

        let found = relations(expr).into_iter().filter(|r| !r.mentions(id));
        let targets = kept.union(&ConstraintSet::new(found));
        let mut next = base.with(id, targets.clone());

        // `y` contains `x` only if it contains the whole new value of `x`.
        if !expr.mentions(id) && !is_opaque(expr) && targets.contains(&whole(expr)) {
            let containing = base
                .map()
                .iter()
                .filter(|(_, t)| t.contains_all(&targets))
                .map(|(y, _)| y.clone())
                .chain(expr.as_identifier().cloned())
                .collect::<Vec<_>>();
            for y in &containing {
                next = next.with(y, next.get(y).with(ValueExpr::var(id.clone())));
            }
        }
        Ok(next.closure())
    }

    fn assume(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assume {}", pp, Substring::NAME, expr);
        Self::check_tracked(expr.identifiers())?;
        Ok(self.refine(expr))
    }

    fn satisfies(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Satisfiability> {
        if self.is_bottom() {
            return Ok(Satisfiability::Bottom);
        }
        if self.is_top() {
            return Ok(Satisfiability::Unknown);
        }
        let known = |holds: bool| {
            if holds {
                Satisfiability::Satisfied
            } else {
                Satisfiability::Unknown
            }
        };
        Ok(match expr {
            ValueExpr::Binary(BinaryOp::And, l, r) => self.satisfies(l, pp)?.and(self.satisfies(r, pp)?),
            ValueExpr::Binary(BinaryOp::Or, l, r) => self.satisfies(l, pp)?.or(self.satisfies(r, pp)?),
            ValueExpr::Binary(BinaryOp::Contains, l, r) => match l.as_identifier() {
                Some(x) => known(self.is_substring_of(r, x)),
                None => Satisfiability::Unknown,
            },
            ValueExpr::Binary(BinaryOp::Eq | BinaryOp::StrEq, l, r) => match (l.as_identifier(), r.as_identifier()) {
                (Some(a), Some(b)) if a.ty().is_string() && b.ty().is_string() => {
                    known(self.is_substring_of(l, b) && self.is_substring_of(r, a))
                }
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
        let id = Identifier::string(name);
        (id.clone(), ValueExpr::var(id))
    }

    fn lit(s: &str) -> ValueExpr {
        ValueExpr::string(s)
    }

    #[test]
    fn test_relations() {
        let (_, ey) = var("y");
        let found = relations(&ey.clone().concat(lit("ab")));
        let expected = [ey.clone(), lit("a"), lit("b"), lit("ab"), ey.clone().concat(lit("ab"))];
        assert_eq!(found, expected.into_iter().collect::<BTreeSet<_>>());

        assert!(relations(&lit("")).is_empty());
        assert_eq!(relations(&ValueExpr::PushAny.concat(lit("c"))), BTreeSet::from([lit("c")]));
    }

    #[test]
    fn test_assign_literal() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, _) = var("x");

        let state = RelationalSubstringDomain::top().assign(&x, &lit("ab"), pp)?;
        assert_eq!(state.representation(), r#"x: {"a", "ab", "b"}"#);
        Ok(())
    }

    #[test]
    fn test_assign_concat() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (_, ey) = var("y");

        let state = RelationalSubstringDomain::top().assign(&x, &ey.clone().concat(lit("ab")), pp)?;
        let holds = |e: ValueExpr| state.satisfies(&ex.clone().contains(e), pp);
        assert_eq!(holds(ey.clone())?, Satisfiability::Satisfied);
        assert_eq!(holds(lit("ab"))?, Satisfiability::Satisfied);
        assert_eq!(holds(ey.clone().concat(lit("ab")))?, Satisfiability::Satisfied);
        assert_eq!(holds(ey.clone().concat(lit("a")))?, Satisfiability::Unknown);
        assert_eq!(holds(lit("c"))?, Satisfiability::Unknown);
        assert_eq!(holds(lit("ab").concat(ey.clone()))?, Satisfiability::Unknown);
        assert_eq!(holds(ValueExpr::PushAny)?, Satisfiability::Unknown);
        Ok(())
    }

    #[test]
    fn test_reassignment_removes_relations() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, _) = var("x");
        let (y, ey) = var("y");

        let state = RelationalSubstringDomain::top()
            .assign(&x, &ey.clone().concat(lit("ab")), pp)?
            .assign(&y, &lit("q"), pp)?;
        assert!(!state.is_substring_of(&ey, &x));
        assert!(state.is_substring_of(&lit("ab"), &x));
        assert!(state.get(&x).iter().all(|t| !t.mentions(&y)));
        Ok(())
    }

    #[test]
    fn test_top_level_self_reference() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");

        let state = RelationalSubstringDomain::top()
            .assign(&x, &lit("ab"), pp)?
            .assign(&x, &ex.clone().concat(lit("c")), pp)?;
        assert_eq!(state.representation(), r#"x: {"a", "ab", "b", "c"}"#);

        let state = state.assign(&x, &ex.substring(ValueExpr::int(0), ValueExpr::int(1)), pp)?;
        assert!(state.is_top());
        Ok(())
    }

    #[test]
    fn test_inter_assignment() -> Result<()> {
        let pp = ProgramPoint::default();
        let (w, ew) = var("w");
        let (x, ex) = var("x");
        let (y, ey) = var("y");

        let state = RelationalSubstringDomain::top()
            .assign(&w, &ey.clone().concat(lit("!")), pp)?
            .assign(&x, &ey, pp)?;
        assert_eq!(state.satisfies(&ew.contains(ex.clone()), pp)?, Satisfiability::Satisfied);
        assert!(state.is_substring_of(&ex, &y));
        assert!(state.is_substring_of(&ValueExpr::var(y.clone()), &x));
        assert!(state.get(&w).contains(&ValueExpr::var(x)));
        assert_eq!(state.satisfies(&ex.str_equals(ValueExpr::var(y)), pp)?, Satisfiability::Satisfied);
        Ok(())
    }

    #[test]
    fn test_inter_assignment_needs_whole_value() -> Result<()> {
        let pp = ProgramPoint::default();
        let (w, ew) = var("w");
        let (x, ex) = var("x");
        let (_, ey) = var("y");
        let (_, ez) = var("z");

        // x may be "zzc": knowing w is "c" says nothing about x
        let state = RelationalSubstringDomain::top()
            .assign(&w, &lit("c"), pp)?
            .assign(&x, &ValueExpr::PushAny.concat(lit("c")), pp)?;
        assert_eq!(state.satisfies(&ew.clone().contains(ex.clone()), pp)?, Satisfiability::Unknown);
        assert!(!state.get(&w).contains(&ex));
        assert_eq!(state.satisfies(&ex.clone().contains(lit("c")), pp)?, Satisfiability::Satisfied);

        let state = RelationalSubstringDomain::top()
            .assign(&w, &ey.clone().concat(ez.clone()), pp)?
            .assign(&x, &ey.clone().concat(ValueExpr::PushAny).concat(ez.clone()), pp)?;
        assert_eq!(state.satisfies(&ew.clone().contains(ex.clone()), pp)?, Satisfiability::Unknown);
        assert_eq!(state.satisfies(&ex.clone().contains(ey.clone()), pp)?, Satisfiability::Satisfied);
        assert_eq!(state.satisfies(&ex.clone().contains(ez.clone()), pp)?, Satisfiability::Satisfied);
        assert_eq!(state.satisfies(&ex.clone().contains(ey.clone().concat(ez.clone())), pp)?, Satisfiability::Unknown);

        // right-nested concatenation still matches the recorded value
        let state = RelationalSubstringDomain::top()
            .assign(&w, &ey.clone().concat(lit("-")).concat(ez.clone()).concat(lit("!")), pp)?
            .assign(&x, &ey.clone().concat(lit("-").concat(ez.clone())), pp)?;
        assert_eq!(state.satisfies(&ew.contains(ex), pp)?, Satisfiability::Satisfied);
        assert!(state.is_substring_of(&ez, &x) && state.is_substring_of(&ey, &x));
        Ok(())
    }

    #[test]
    fn test_push_any_forgets() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, _) = var("x");

        let state = RelationalSubstringDomain::top().assign(&x, &lit("ab"), pp)?;
        assert!(state.assign(&x, &ValueExpr::PushAny, pp)?.is_top());
        Ok(())
    }

    #[test]
    fn test_assume() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");

        let state = RelationalSubstringDomain::top().assume(&ex.clone().contains(lit("abc")), pp)?;
        assert!(state.is_substring_of(&lit("bc"), &x));

        let either = ex.clone().contains(lit("ab")).or(ex.clone().contains(lit("abc")));
        let state = RelationalSubstringDomain::top().assume(&either, pp)?;
        assert_eq!(state.representation(), r#"x: {"a", "ab", "b"}"#);

        let disjoint = ex.clone().contains(lit("a")).or(ex.clone().contains(lit("b")));
        assert!(RelationalSubstringDomain::top().assume(&disjoint, pp)?.is_top());

        let both = ex.clone().starts_with(lit("a")).and(ex.clone().ends_with(lit("b")));
        let state = RelationalSubstringDomain::top().assume(&both, pp)?;
        assert!(state.is_substring_of(&lit("a"), &x) && state.is_substring_of(&lit("b"), &x));

        let state = RelationalSubstringDomain::top().assume(&ex.clone().str_equals(ey.clone()), pp)?;
        assert_eq!(state.satisfies(&ex.clone().str_equals(ey.clone()), pp)?, Satisfiability::Satisfied);
        assert!(state.is_substring_of(&ex, &y));

        // absence of a relation is never a refutation
        let state = RelationalSubstringDomain::top().assign(&x, &lit("ab"), pp)?;
        assert_eq!(state.satisfies(&ex.clone().contains(lit("z")), pp)?, Satisfiability::Unknown);
        assert!(!state.assume(&ex.contains(lit("z")), pp)?.is_bottom());
        assert!(RelationalSubstringDomain::bottom().assume(&ey.contains(lit("a")), pp)?.is_bottom());
        Ok(())
    }

    #[test]
    fn test_closure_and_forget() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (y, ey) = var("y");
        let (z, _) = var("z");

        let state = RelationalSubstringDomain::top()
            .assign(&x, &lit("ab"), pp)?
            .assign(&y, &ex.clone().concat(lit("c")), pp)?
            .assign(&z, &ey.concat(lit("d")), pp)?;
        assert!(state.is_substring_of(&lit("ab"), &z));
        assert!(state.is_substring_of(&ex, &z));
        assert_eq!(state.closure(), state);

        let forgotten = state.forget_identifier(&x)?;
        assert!(!forgotten.map().contains_key(&x));
        assert!(forgotten.map().iter().all(|(_, t)| t.iter().all(|e| !e.mentions(&x))));
        assert!(forgotten.is_substring_of(&lit("ab"), &z));
        Ok(())
    }

    #[test]
    fn test_non_string_target_is_forgotten() -> Result<()> {
        let pp = ProgramPoint::default();
        let n = Identifier::int("n");
        let state = RelationalSubstringDomain::top().assign(&n, &lit("ab"), pp)?;
        assert!(state.is_top());
        Ok(())
    }

    #[test]
    fn test_lattice() -> Result<()> {
        let pp = ProgramPoint::default();
        let (x, ex) = var("x");
        let (_, ey) = var("y");

        let ab = RelationalSubstringDomain::top().assign(&x, &lit("ab"), pp)?;
        let bc = RelationalSubstringDomain::top().assign(&x, &lit("bc"), pp)?;
        let xy = RelationalSubstringDomain::top().assume(&ex.contains(ey), pp)?;
        assert_eq!(ab.lub(&bc).representation(), r#"x: {"b"}"#);
        assert!(ab.glb(&bc).is_substring_of(&lit("c"), &x));

        check_lattice_laws(&[ab, bc, xy, RelationalSubstringDomain::top(), RelationalSubstringDomain::bottom()]);
        Ok(())
    }
}
