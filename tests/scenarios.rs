//! End-to-end checks of the domains through the public API.

use strdom::*;

fn int(name: &str) -> (Identifier, ValueExpr) {
    let id = Identifier::int(name);
    (id.clone(), ValueExpr::var(id))
}

fn string(name: &str) -> (Identifier, ValueExpr) {
    let id = Identifier::string(name);
    (id.clone(), ValueExpr::var(id))
}

fn assert_lattice<L: Lattice>(samples: &[L]) {
    for a in samples {
        assert!(a.less_or_equal(a), "{:?} is not below itself", a);
        assert!(L::bottom().less_or_equal(a));
        assert!(a.less_or_equal(&L::top()));
        for b in samples {
            let joined = a.lub(b);
            assert!(a.less_or_equal(&joined) && b.less_or_equal(&joined), "lub of {:?} and {:?}", a, b);
            let met = a.glb(b);
            assert!(met.less_or_equal(a) && met.less_or_equal(b), "glb of {:?} and {:?}", a, b);
            let widened = a.widening(b);
            assert!(a.less_or_equal(&widened) && b.less_or_equal(&widened), "widening of {:?} and {:?}", a, b);
        }
    }
}

// ============================================================================
// Intervals
// ============================================================================

#[test]
fn interval_addition() {
    let sum = Interval::new(1, 3).add(&Interval::new(2, 4));
    assert_eq!(sum, Interval::new(3, 7));
    assert_eq!(sum.to_string(), "[3, 7]");
}

#[test]
fn interval_widening_stabilizes() {
    let mut current = Interval::singleton(0);
    let mut steps = 0;
    for k in 1..=10 {
        let next = current.widening(&Interval::new(0, k));
        if next == current {
            break;
        }
        current = next;
        steps += 1;
    }
    assert_eq!(current, Interval::at_least(0));
    assert!(steps <= 2);
}

#[test]
fn interval_arithmetic_is_sound() {
    let samples = [Interval::new(-3, 2), Interval::new(0, 5), Interval::new(-7, -1), Interval::singleton(0)];
    for a in &samples {
        for b in &samples {
            for x in -7..=5 {
                for y in -7..=5 {
                    if !a.contains(x) || !b.contains(y) {
                        continue;
                    }
                    assert!(a.add(b).contains(x + y));
                    assert!(a.sub(b).contains(x - y));
                    assert!(a.mul(b).contains(x * y));
                    if y != 0 {
                        assert!(a.div(b).contains(x / y), "{} / {} not in {} / {}", x, y, a, b);
                    }
                }
            }
        }
    }
}

#[test]
fn contradictory_comparisons_are_unreachable() -> Result<()> {
    let pp = ProgramPoint::default();
    let (x, ex) = int("x");
    let (y, ey) = int("y");

    let state = IntervalEnvironment::from_entries([(x.clone(), Interval::new(0, 10)), (y, Interval::singleton(5))]);
    let state = state.assume(&ex.clone().greater(ey.clone()), pp)?;
    assert_eq!(state.get(&x), Interval::new(6, 10));
    let state = state.assume(&ex.less(ey), pp)?;
    assert!(state.is_bottom());
    Ok(())
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn string_concatenation() -> Result<()> {
    let pp = ProgramPoint::default();
    let (s, _) = string("s");

    let state = StringNumericEnvironment::top().assign(&s, &ValueExpr::string("ab").concat(ValueExpr::string("c")), pp)?;
    assert_eq!(state.get(&s), StringNumeric::from_literal("abc"));
    assert_eq!(state.representation(), r#"s: {"abc"}"#);
    Ok(())
}

#[test]
fn string_branches_merge() -> Result<()> {
    let pp = ProgramPoint::default();
    let (s, es) = string("s");
    let (n, _) = int("n");

    let then = StringNumericEnvironment::top().assign(&s, &ValueExpr::string("hello"), pp)?;
    let other = StringNumericEnvironment::top().assign(&s, &ValueExpr::string("help"), pp)?;
    let merged = then.lub(&other);

    assert_eq!(merged.satisfies(&es.clone().starts_with(ValueExpr::string("hel")), pp)?, Satisfiability::Satisfied);
    assert_eq!(merged.satisfies(&es.clone().contains(ValueExpr::string("lo")), pp)?, Satisfiability::Unknown);
    assert_eq!(merged.satisfies(&es.clone().ends_with(ValueExpr::string("x")), pp)?, Satisfiability::NotSatisfied);

    let merged = merged.assign(&n, &es.length(), pp)?;
    assert_eq!(merged.get(&n), StringNumeric::Num(Interval::new(4, 5)));
    Ok(())
}

#[test]
fn string_lattice() {
    let samples = [
        StringNumeric::from_literal("a"),
        StringNumeric::from_literal("ab"),
        StringNumeric::Num(Interval::new(0, 3)),
        StringNumeric::Top,
        StringNumeric::Bottom,
    ];
    assert_lattice(&samples);
}

// ============================================================================
// Relational domains
// ============================================================================

#[test]
fn upper_bound_after_increment() -> Result<()> {
    let pp = ProgramPoint::default();
    let (x, ex) = int("x");
    let (y, _) = int("y");

    let state = StrictUpperBounds::top()
        .assign(&x, &ValueExpr::int(5), pp)?
        .assign(&y, &ex.add(ValueExpr::int(3)), pp)?;
    assert!(state.representation().contains("x < y"));
    assert!(state.is_below(&x, &y));
    Ok(())
}

#[test]
fn upper_bounds_contradiction() -> Result<()> {
    let pp = ProgramPoint::default();
    let (_, ex) = int("x");
    let (_, ey) = int("y");

    let state = StrictUpperBounds::top()
        .assume(&ex.clone().greater(ey.clone()), pp)?
        .assume(&ex.less(ey), pp)?;
    assert!(state.is_bottom());
    Ok(())
}

#[test]
fn equality_is_transitive() -> Result<()> {
    let pp = ProgramPoint::default();
    let (x, ex) = int("x");
    let (_, ey) = int("y");
    let (z, ez) = int("z");

    let state = EqualityDomain::top().assign(&x, &ey, pp)?.assign(&z, &ex, pp)?;
    assert_eq!(state.satisfies(&ez.equal(ey), pp)?, Satisfiability::Satisfied);
    Ok(())
}

#[test]
fn substring_tracks_concatenation() -> Result<()> {
    let pp = ProgramPoint::default();
    let (x, ex) = string("x");
    let (y, ey) = string("y");

    let state = RelationalSubstringDomain::top()
        .assign(&y, &ValueExpr::string("key"), pp)?
        .assign(&x, &ey.clone().concat(ValueExpr::string("=1")), pp)?;
    assert_eq!(state.satisfies(&ex.clone().contains(ey), pp)?, Satisfiability::Satisfied);
    assert_eq!(state.satisfies(&ex.clone().contains(ValueExpr::string("ke")), pp)?, Satisfiability::Satisfied);
    assert_eq!(state.satisfies(&ex.contains(ValueExpr::string("zz")), pp)?, Satisfiability::Unknown);
    assert!(state.forget_identifier(&y)?.get(&x).iter().all(|t| !t.mentions(&y)));
    Ok(())
}

#[test]
fn forgetting_leaves_no_trace() -> Result<()> {
    let pp = ProgramPoint::default();
    let (a, ea) = int("a");
    let (b, eb) = int("b");
    let (c, _) = int("c");

    let equal = EqualityDomain::top().assign(&b, &ea, pp)?.assign(&c, &eb, pp)?;
    let ordered = StrictUpperBounds::top()
        .assign(&b, &ea.add(ValueExpr::int(1)), pp)?
        .assign(&c, &eb.add(ValueExpr::int(1)), pp)?;

    let forgotten = equal.forget_identifier(&b)?;
    assert!(!forgotten.map().contains_key(&b));
    assert!(forgotten.map().iter().all(|(_, t)| !t.contains(&b)));
    assert!(forgotten.are_equal(&a, &c));
    assert!(equal.forget_identifiers([&a, &c])?.is_top());

    let forgotten = ordered.forget_identifier(&b)?;
    assert!(!forgotten.map().contains_key(&b));
    assert!(forgotten.map().iter().all(|(_, t)| !t.contains(&b)));
    assert!(forgotten.is_below(&a, &c));
    Ok(())
}

#[test]
fn relational_lattices() -> Result<()> {
    let pp = ProgramPoint::default();
    let (x, ex) = int("x");
    let (y, ey) = int("y");

    let eq = EqualityDomain::top().assign(&x, &ey, pp)?;
    let ub = StrictUpperBounds::top().assign(&y, &ex.add(ValueExpr::int(1)), pp)?;
    let ub2 = StrictUpperBounds::top().assign(&x, &ey.sub(ValueExpr::int(1)), pp)?;
    assert_eq!(ub, ub2);
    assert!(eq.get(&y).contains(&x));

    assert_lattice(&[eq, EqualityDomain::top(), EqualityDomain::bottom()]);
    assert_lattice(&[ub, StrictUpperBounds::top(), StrictUpperBounds::bottom()]);
    Ok(())
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn loop_head_invariant() -> Result<()> {
    let pp = ProgramPoint::default();
    let (i, ei) = int("i");
    let guard = ei.clone().less(ValueExpr::int(100));

    let entry = IntervalEnvironment::top().assign(&i, &ValueExpr::int(0), pp)?;
    let result = FixpointEngine::default().loop_head(&entry, |s| {
        s.assume(&guard, pp)?.assign(&i, &ei.clone().add(ValueExpr::int(1)), pp)
    })?;
    assert!(result.converged);
    assert_eq!(result.head.get(&i), Interval::at_least(0));
    assert_eq!(result.head.assume(&guard.not(), pp)?.get(&i), Interval::at_least(100));
    Ok(())
}
