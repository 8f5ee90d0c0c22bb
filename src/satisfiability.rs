//! Three-valued satisfiability verdicts.
//!
//! Every domain answers "does this condition hold here?" with a [`Satisfiability`]
//! rather than a `bool`, because an abstraction cannot always decide the concrete truth.

use std::fmt;

/// Outcome of checking a condition against an abstract state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Satisfiability {
    /// The condition holds in every concrete state.
    Satisfied,
    /// The condition holds in no concrete state.
    NotSatisfied,
    /// The condition may or may not hold.
    Unknown,
    /// The condition was checked in an unreachable state.
    Bottom,
}

impl Satisfiability {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Satisfiability::Satisfied
        } else {
            Satisfiability::NotSatisfied
        }
    }

    /// Swaps `Satisfied` and `NotSatisfied`; `Unknown` and `Bottom` are fixed points.
    pub fn negate(self) -> Self {
        match self {
            Satisfiability::Satisfied => Satisfiability::NotSatisfied,
            Satisfiability::NotSatisfied => Satisfiability::Satisfied,
            other => other,
        }
    }

    /// Conjunction: `Bottom` absorbs, then `NotSatisfied` absorbs.
    pub fn and(self, other: Self) -> Self {
        use Satisfiability::*;
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (NotSatisfied, _) | (_, NotSatisfied) => NotSatisfied,
            (Satisfied, Satisfied) => Satisfied,
            _ => Unknown,
        }
    }

    /// Disjunction: `Bottom` absorbs, then `Satisfied` absorbs.
    pub fn or(self, other: Self) -> Self {
        use Satisfiability::*;
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (Satisfied, _) | (_, Satisfied) => Satisfied,
            (NotSatisfied, NotSatisfied) => NotSatisfied,
            _ => Unknown,
        }
    }

    /// Join of two verdicts obtained on different paths.
    ///
    /// `Bottom` is neutral (an unreachable path says nothing), equal verdicts are kept,
    /// anything else collapses to `Unknown`.
    pub fn lub(self, other: Self) -> Self {
        use Satisfiability::*;
        match (self, other) {
            (Bottom, x) | (x, Bottom) => x,
            (a, b) if a == b => a,
            _ => Unknown,
        }
    }

    /// Whether the verdict is `Satisfied` or `NotSatisfied`.
    pub fn is_definite(self) -> bool {
        matches!(self, Satisfiability::Satisfied | Satisfiability::NotSatisfied)
    }
}

impl fmt::Display for Satisfiability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Satisfiability::Satisfied => "satisfied",
            Satisfiability::NotSatisfied => "not satisfied",
            Satisfiability::Unknown => "unknown",
            Satisfiability::Bottom => "bottom",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::Satisfiability::*;
    use super::*;

    const ALL: [Satisfiability; 4] = [Satisfied, NotSatisfied, Unknown, Bottom];

    #[test]
    fn test_negate() {
        assert_eq!(Satisfied.negate(), NotSatisfied);
        assert_eq!(NotSatisfied.negate(), Satisfied);
        assert_eq!(Unknown.negate(), Unknown);
        assert_eq!(Bottom.negate(), Bottom);
        for s in ALL {
            assert_eq!(s.negate().negate(), s);
        }
    }

    #[test]
    fn test_and() {
        assert_eq!(Satisfied.and(Satisfied), Satisfied);
        assert_eq!(Satisfied.and(Unknown), Unknown);
        assert_eq!(Unknown.and(NotSatisfied), NotSatisfied);
        assert_eq!(NotSatisfied.and(Bottom), Bottom);
        for s in ALL {
            assert_eq!(Bottom.and(s), Bottom);
            assert_eq!(s.and(Satisfied), s);
        }
    }

    #[test]
    fn test_or() {
        assert_eq!(NotSatisfied.or(NotSatisfied), NotSatisfied);
        assert_eq!(NotSatisfied.or(Unknown), Unknown);
        assert_eq!(Unknown.or(Satisfied), Satisfied);
        assert_eq!(Satisfied.or(Bottom), Bottom);
        for s in ALL {
            assert_eq!(s.or(NotSatisfied), s);
        }
    }

    #[test]
    fn test_de_morgan() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.and(b).negate(), a.negate().or(b.negate()), "{} {}", a, b);
            }
        }
    }

    #[test]
    fn test_lub() {
        assert_eq!(Satisfied.lub(Satisfied), Satisfied);
        assert_eq!(Satisfied.lub(NotSatisfied), Unknown);
        assert_eq!(Bottom.lub(NotSatisfied), NotSatisfied);
        assert!(Satisfied.is_definite());
        assert!(!Unknown.is_definite());
    }
}
