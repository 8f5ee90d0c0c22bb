//! Loop-head fixpoint iteration.
//!
//! The analysis driver proper lives outside this crate. [`FixpointEngine`] covers the
//! one place where a domain's widening matters on its own: stabilizing the state at the
//! head of a single loop.

use log::{debug, trace, warn};

use crate::domain::Lattice;
use crate::error::Result;

/// Iteration policy at a loop head.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixpointEngine {
    /// Number of iterations that join instead of widening.
    pub widening_delay: usize,
    /// Iterations after which the engine gives up and reports no convergence.
    pub max_iterations: usize,
}

impl Default for FixpointEngine {
    fn default() -> Self {
        FixpointEngine {
            widening_delay: 1,
            max_iterations: 100,
        }
    }
}

/// Outcome of [`FixpointEngine::loop_head`].
#[derive(Debug, Clone, PartialEq)]
pub struct Fixpoint<D> {
    /// Invariant at the loop head.
    pub head: D,
    pub iterations: usize,
    pub converged: bool,
}

impl FixpointEngine {
    pub fn new(widening_delay: usize, max_iterations: usize) -> Self {
        FixpointEngine {
            widening_delay,
            max_iterations,
        }
    }

    pub fn with_widening_delay(mut self, widening_delay: usize) -> Self {
        self.widening_delay = widening_delay;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Computes a post-fixpoint of `head = entry ⊔ body(head)`.
    ///
    /// `body` maps the state at the loop head to the state flowing back along the
    /// back-edge.
    pub fn loop_head<D, F>(&self, entry: &D, mut body: F) -> Result<Fixpoint<D>>
    where
        D: Lattice,
        F: FnMut(&D) -> Result<D>,
    {
        let mut head = entry.clone();
        for iteration in 1..=self.max_iterations {
            let next = entry.lub(&body(&head)?);
            if next.less_or_equal(&head) {
                debug!("loop head stable after {} iterations", iteration);
                return Ok(Fixpoint {
                    head,
                    iterations: iteration,
                    converged: true,
                });
            }
            head = if iteration <= self.widening_delay {
                head.lub(&next)
            } else {
                head.widening(&next)
            };
            trace!("iteration {}: {:?}", iteration, head);
        }
        warn!("loop head not stable after {} iterations", self.max_iterations);
        Ok(Fixpoint {
            head,
            iterations: self.max_iterations,
            converged: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::automata::AutomatonString;
    use crate::domain::ValueDomain;
    use crate::expr::{Identifier, ProgramPoint, ValueExpr};
    use crate::interval::{Interval, IntervalEnvironment};
    use crate::tarsis::{StringNumeric, StringNumericEnvironment};

    #[test]
    fn test_counting_loop() -> Result<()> {
        let pp = ProgramPoint::default();
        let x = Identifier::int("x");
        let ex = ValueExpr::var(x.clone());
        let guard = ex.clone().less(ValueExpr::int(10));

        let entry = IntervalEnvironment::top().assign(&x, &ValueExpr::int(0), pp)?;
        let body = |s: &IntervalEnvironment| s.assume(&guard, pp)?.assign(&x, &ex.clone().add(ValueExpr::int(1)), pp);

        let result = FixpointEngine::default().with_widening_delay(0).loop_head(&entry, body)?;
        assert!(result.converged);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.head.get(&x), Interval::at_least(0));

        let exit = result.head.assume(&guard.not(), pp)?;
        assert_eq!(exit.get(&x), Interval::at_least(10));
        Ok(())
    }

    #[test]
    fn test_widening_delay() -> Result<()> {
        let pp = ProgramPoint::default();
        let x = Identifier::int("x");
        let ex = ValueExpr::var(x.clone());
        let guard = ex.clone().less(ValueExpr::int(3));

        let entry = IntervalEnvironment::top().assign(&x, &ValueExpr::int(0), pp)?;
        let body = |s: &IntervalEnvironment| s.assume(&guard, pp)?.assign(&x, &ex.clone().add(ValueExpr::int(1)), pp);

        // joining long enough reaches the exact bound
        let result = FixpointEngine::new(10, 100).loop_head(&entry, body)?;
        assert!(result.converged);
        assert_eq!(result.head.get(&x), Interval::new(0, 3));
        Ok(())
    }

    #[test]
    fn test_string_loop() -> Result<()> {
        let pp = ProgramPoint::default();
        let s = Identifier::string("s");
        let es = ValueExpr::var(s.clone());

        let entry = StringNumericEnvironment::top().assign(&s, &ValueExpr::string(""), pp)?;
        let body = |st: &StringNumericEnvironment| st.assign(&s, &es.clone().concat(ValueExpr::string("a")), pp);

        let result = FixpointEngine::default().loop_head(&entry, body)?;
        assert!(result.converged);
        let StringNumeric::Str(value) = result.head.get(&s) else {
            panic!("expected a string value, got {:?}", result.head.get(&s));
        };
        assert!(value.accepts("aaaaaaaaaaaa"));
        assert!(!value.accepts("b"));
        assert_eq!(value, AutomatonString::star(value.alphabet()));
        Ok(())
    }

    #[test]
    fn test_gives_up() -> Result<()> {
        let pp = ProgramPoint::default();
        let x = Identifier::int("x");
        let ex = ValueExpr::var(x.clone());

        let entry = IntervalEnvironment::top().assign(&x, &ValueExpr::int(0), pp)?;
        let body = |s: &IntervalEnvironment| s.assign(&x, &ex.clone().add(ValueExpr::int(1)), pp);

        let result = FixpointEngine::new(1000, 5).loop_head(&entry, body)?;
        assert!(!result.converged);
        assert_eq!(result.iterations, 5);
        assert_eq!(result.head.get(&x), Interval::new(0, 5));
        Ok(())
    }
}
