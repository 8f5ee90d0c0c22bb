//! # strdom: abstract domains for string and numeric analysis
//!
//! **`strdom`** is the semantic core of a static analyzer: a collection of abstract
//! domains that over-approximate the values program variables may hold. Each domain
//! answers the questions an analysis driver asks at every program point: what is the
//! value of this expression, what does the state look like after this assignment, does
//! this condition hold, and how do two states merge.
//!
//! ## Domains
//!
//! - **Intervals** ([`interval`]): integer ranges `[a, b]` with infinite bounds.
//! - **String/numeric** ([`tarsis`]): a string variable is abstracted by a finite
//!   automaton recognizing every string it may hold, an integer one by an interval.
//! - **Relational** ([`relational`]): equalities, strict upper bounds, and substring
//!   relations *between* variables, kept transitively closed.
//!
//! Non-relational domains implement [`NonRelationalValueDomain`] and are lifted to whole
//! states by [`ValueEnvironment`]. Every state implements [`ValueDomain`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use strdom::{Identifier, Interval, IntervalEnvironment, Lattice, ProgramPoint, ValueDomain, ValueExpr};
//!
//! let pp = ProgramPoint::default();
//! let x = Identifier::int("x");
//!
//! // x := 0
//! let state = IntervalEnvironment::top().assign(&x, &ValueExpr::int(0), pp).unwrap();
//!
//! // x := x + 1, joined with the previous state
//! let next = state.assign(&x, &ValueExpr::var(x.clone()).add(ValueExpr::int(1)), pp).unwrap();
//! let joined = state.lub(&next);
//! assert_eq!(joined.get(&x), Interval::new(0, 1));
//!
//! // widening extrapolates the growing bound
//! assert_eq!(state.widening(&joined).get(&x), Interval::at_least(0));
//! ```
//!
//! ## Termination
//!
//! Intervals and automata have infinite ascending chains, so loops must be iterated
//! with [`Lattice::widening`]. [`FixpointEngine`] does this for a single loop head.
//! The relational domains only ever relate finitely many expressions, and their
//! widening is the join.

pub mod automata;
pub mod domain;
pub mod error;
pub mod expr;
pub mod fixpoint;
pub mod functional;
pub mod interval;
pub mod relational;
pub mod satisfiability;
pub mod tarsis;

pub use crate::automata::AutomatonString;
pub use crate::domain::{Lattice, NonRelationalValueDomain, ValueDomain};
pub use crate::error::{Result, SemanticError};
pub use crate::expr::{BinaryOp, Constant, Identifier, ProgramPoint, TernaryOp, Type, UnaryOp, ValueExpr};
pub use crate::fixpoint::{Fixpoint, FixpointEngine};
pub use crate::functional::{FunctionalLattice, ValueEnvironment};
pub use crate::interval::{Bound, Interval, IntervalEnvironment};
pub use crate::relational::{ConstraintSet, EqualityDomain, RelationalSubstringDomain, StrictUpperBounds};
pub use crate::satisfiability::Satisfiability;
pub use crate::tarsis::{StringNumeric, StringNumericEnvironment};
