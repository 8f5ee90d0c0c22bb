//! Interval abstract domain.
//!
//! The interval domain tracks lower and upper bounds for integer variables.
//! It is cheap and non-relational: relations between variables are lost.

use std::cmp::{max, min};
use std::fmt;

use log::trace;

use crate::domain::{assume_boolean, Lattice, NonRelationalValueDomain};
use crate::error::Result;
use crate::expr::{BinaryOp, Constant, ProgramPoint, UnaryOp, ValueExpr};
use crate::functional::ValueEnvironment;
use crate::satisfiability::Satisfiability;

/// Bound of an interval: -∞, finite value, or +∞.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    NegInf,
    Finite(i64),
    PosInf,
}

impl Bound {
    pub fn as_finite(&self) -> Option<i64> {
        match self {
            Bound::Finite(n) => Some(*n),
            _ => None,
        }
    }

    /// Exact result pushed to the matching infinity when it leaves the `i64` range.
    fn from_i128(n: i128) -> Bound {
        if n > i64::MAX as i128 {
            Bound::PosInf
        } else if n < i64::MIN as i128 {
            Bound::NegInf
        } else {
            Bound::Finite(n as i64)
        }
    }

    fn signum(&self) -> i8 {
        match self {
            Bound::NegInf => -1,
            Bound::Finite(n) => n.signum() as i8,
            Bound::PosInf => 1,
        }
    }

    fn infinity(sign: i8) -> Bound {
        if sign < 0 {
            Bound::NegInf
        } else {
            Bound::PosInf
        }
    }

    pub fn add(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::from_i128(*a as i128 + *b as i128),
            // Only reachable for opposite bounds of empty intervals.
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => Bound::PosInf,
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
        }
    }

    pub fn sub(&self, other: &Bound) -> Bound {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::from_i128(*a as i128 * *b as i128),
            (Bound::Finite(0), _) | (_, Bound::Finite(0)) => Bound::Finite(0),
            _ => Bound::infinity(self.signum() * other.signum()),
        }
    }

    /// Floor and ceiling of the real quotient `self / other`, for a non-zero divisor.
    fn div_rounded(&self, other: &Bound) -> (Bound, Bound) {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => {
                let (a, b) = (*a as i128, *b as i128);
                let q = a / b;
                let inexact = a % b != 0;
                let positive = (a < 0) == (b < 0);
                let floor = if inexact && !positive { q - 1 } else { q };
                let ceil = if inexact && positive { q + 1 } else { q };
                (Bound::from_i128(floor), Bound::from_i128(ceil))
            }
            (Bound::Finite(_), _) => (Bound::Finite(0), Bound::Finite(0)),
            _ => {
                let inf = Bound::infinity(self.signum() * other.signum());
                (inf, inf)
            }
        }
    }

    pub fn neg(&self) -> Bound {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::Finite(n) => Bound::from_i128(-(*n as i128)),
            Bound::PosInf => Bound::NegInf,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-Inf"),
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::PosInf => write!(f, "+Inf"),
        }
    }
}

/// Interval: `[low, high]`. The empty interval is the bottom element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    low: Bound,
    high: Bound,
}

impl Interval {
    /// Finite interval `[low, high]`; empty when `low > high`.
    pub fn new(low: i64, high: i64) -> Self {
        Self::from_bounds(Bound::Finite(low), Bound::Finite(high))
    }

    pub fn from_bounds(low: Bound, high: Bound) -> Self {
        if low > high || low == Bound::PosInf || high == Bound::NegInf {
            Self::bottom()
        } else {
            Self { low, high }
        }
    }

    /// Result of bound arithmetic: a bound that overflowed past the opposite end is
    /// clamped to the last representable value.
    fn from_arith(low: Bound, high: Bound) -> Self {
        let low = if low == Bound::PosInf { Bound::Finite(i64::MAX) } else { low };
        let high = if high == Bound::NegInf { Bound::Finite(i64::MIN) } else { high };
        Self::from_bounds(low, high)
    }

    pub fn singleton(value: i64) -> Self {
        Self::new(value, value)
    }

    /// `[low, +Inf]`
    pub fn at_least(low: i64) -> Self {
        Self::from_bounds(Bound::Finite(low), Bound::PosInf)
    }

    /// `[-Inf, high]`
    pub fn at_most(high: i64) -> Self {
        Self::from_bounds(Bound::NegInf, Bound::Finite(high))
    }

    pub fn low(&self) -> Bound {
        self.low
    }

    pub fn high(&self) -> Bound {
        self.high
    }

    /// Both bounds are finite.
    pub fn is_finite(&self) -> bool {
        !self.is_bottom() && self.low.as_finite().is_some() && self.high.as_finite().is_some()
    }

    pub fn as_singleton(&self) -> Option<i64> {
        match (self.low, self.high) {
            (Bound::Finite(l), Bound::Finite(h)) if l == h => Some(l),
            _ => None,
        }
    }

    /// The interval is exactly `[n, n]`.
    pub fn is(&self, n: i64) -> bool {
        self.as_singleton() == Some(n)
    }

    pub fn contains(&self, value: i64) -> bool {
        !self.is_bottom() && self.low <= Bound::Finite(value) && Bound::Finite(value) <= self.high
    }

    pub fn add(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        Interval::from_arith(self.low.add(&other.low), self.high.add(&other.high))
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        Interval::from_arith(self.low.sub(&other.high), self.high.sub(&other.low))
    }

    pub fn neg(&self) -> Interval {
        if self.is_bottom() {
            return Interval::bottom();
        }
        Interval::from_arith(self.high.neg(), self.low.neg())
    }

    pub fn mul(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        if self.is(0) || other.is(0) {
            return Interval::singleton(0);
        }
        let corners = [
            self.low.mul(&other.low),
            self.low.mul(&other.high),
            self.high.mul(&other.low),
            self.high.mul(&other.high),
        ];
        Self::hull(&corners)
    }

    /// Quotient interval. Division by exactly zero has no result.
    pub fn div(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() || other.is(0) {
            return Interval::bottom();
        }
        if self.is(0) {
            return Interval::singleton(0);
        }
        // Zero is removed from the divisor, and a divisor straddling it is split in two.
        let negative = other.glb(&Interval::at_most(-1));
        let positive = other.glb(&Interval::at_least(1));
        self.div_same_sign(&negative).lub(&self.div_same_sign(&positive))
    }

    fn div_same_sign(&self, divisor: &Interval) -> Interval {
        if divisor.is_bottom() {
            return Interval::bottom();
        }
        let mut bounds = Vec::with_capacity(8);
        for a in [self.low, self.high] {
            for b in [divisor.low, divisor.high] {
                let (floor, ceil) = a.div_rounded(&b);
                bounds.push(floor);
                bounds.push(ceil);
            }
        }
        Self::hull(&bounds)
    }

    fn hull(bounds: &[Bound]) -> Interval {
        let low = bounds.iter().min().copied().unwrap_or(Bound::NegInf);
        let high = bounds.iter().max().copied().unwrap_or(Bound::PosInf);
        Interval::from_arith(low, high)
    }

    /// Three-valued comparison `self op other`.
    pub fn compare(&self, op: BinaryOp, other: &Interval) -> Satisfiability {
        if self.is_bottom() || other.is_bottom() {
            return Satisfiability::Bottom;
        }
        if self.is_top() || other.is_top() {
            return Satisfiability::Unknown;
        }
        match op {
            BinaryOp::Eq => {
                if self.glb(other).is_bottom() {
                    Satisfiability::NotSatisfied
                } else if self.as_singleton().is_some() && self == other {
                    Satisfiability::Satisfied
                } else {
                    Satisfiability::Unknown
                }
            }
            BinaryOp::Ne => self.compare(BinaryOp::Eq, other).negate(),
            BinaryOp::Ge => other.compare(BinaryOp::Le, self),
            BinaryOp::Gt => other.compare(BinaryOp::Lt, self),
            BinaryOp::Le if self.high <= other.low => Satisfiability::Satisfied,
            BinaryOp::Le if self.low > other.high => Satisfiability::NotSatisfied,
            BinaryOp::Lt if self.high < other.low => Satisfiability::Satisfied,
            BinaryOp::Lt if self.low >= other.high => Satisfiability::NotSatisfied,
            _ => Satisfiability::Unknown,
        }
    }

    /// For `left op right` with `op` one of `<`, `<=`: the half-line `left` must lie in,
    /// and the half-line `right` must lie in.
    fn comparison_bounds(op: BinaryOp, left: &Interval, right: &Interval) -> (Interval, Interval) {
        let strict = Bound::Finite(if op == BinaryOp::Lt { 1 } else { 0 });
        let upper = Interval::from_bounds(Bound::NegInf, right.high.sub(&strict));
        let lower = Interval::from_bounds(left.low.add(&strict), Bound::PosInf);
        (upper, lower)
    }

    /// Narrows both operands of `left op right` to the values that can make the
    /// comparison true.
    pub fn refine(op: BinaryOp, left: &Interval, right: &Interval) -> (Interval, Interval) {
        if left.is_bottom() || right.is_bottom() {
            return (Interval::bottom(), Interval::bottom());
        }
        match op {
            BinaryOp::Lt | BinaryOp::Le => {
                let (upper, lower) = Self::comparison_bounds(op, left, right);
                (left.glb(&upper), right.glb(&lower))
            }
            BinaryOp::Gt | BinaryOp::Ge => {
                let (r, l) = Self::refine(op.flip(), right, left);
                (l, r)
            }
            BinaryOp::Eq => {
                let both = left.glb(right);
                (both, both)
            }
            BinaryOp::Ne => (left.exclude(right), right.exclude(left)),
            _ => (*left, *right),
        }
    }

    /// Removes `other` from `self` when `other` is a singleton at one of its ends.
    fn exclude(&self, other: &Interval) -> Interval {
        match other.as_singleton() {
            Some(n) if self.is(n) => Interval::bottom(),
            Some(n) if self.low == Bound::Finite(n) => Interval::from_bounds(Bound::Finite(n).add(&Bound::Finite(1)), self.high),
            Some(n) if self.high == Bound::Finite(n) => Interval::from_bounds(self.low, Bound::Finite(n).sub(&Bound::Finite(1))),
            _ => *self,
        }
    }
}

impl Lattice for Interval {
    fn top() -> Self {
        Self {
            low: Bound::NegInf,
            high: Bound::PosInf,
        }
    }

    fn bottom() -> Self {
        Self {
            low: Bound::PosInf,
            high: Bound::NegInf,
        }
    }

    fn is_top(&self) -> bool {
        self.low == Bound::NegInf && self.high == Bound::PosInf
    }

    fn is_bottom(&self) -> bool {
        self.low > self.high
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other.low <= self.low && self.high <= other.high
    }

    fn lub(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return *other;
        }
        if other.is_bottom() {
            return *self;
        }
        Interval {
            low: min(self.low, other.low),
            high: max(self.high, other.high),
        }
    }

    fn glb(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        Interval::from_bounds(max(self.low, other.low), min(self.high, other.high))
    }

    fn widening(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return *other;
        }
        if other.is_bottom() {
            return *self;
        }
        let low = if other.low < self.low { Bound::NegInf } else { self.low };
        let high = if other.high > self.high { Bound::PosInf } else { self.high };
        Interval { low, high }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "_|_")
        } else if self.is_top() {
            write!(f, "#TOP#")
        } else {
            write!(f, "[{}, {}]", self.low, self.high)
        }
    }
}

/// Narrows the identifier operands of the comparison `left op right` in `env`.
///
/// `eval` computes the numeric value of an operand; `lift` turns a refined interval
/// back into the environment's value type.
pub(crate) fn refine_comparison<V, E, L>(
    env: &ValueEnvironment<V>,
    op: BinaryOp,
    left: &ValueExpr,
    right: &ValueExpr,
    eval: E,
    lift: L,
) -> Result<ValueEnvironment<V>>
where
    V: Lattice,
    E: Fn(&ValueExpr) -> Result<Interval>,
    L: Fn(Interval) -> V,
{
    let left_value = eval(left)?;
    let right_value = eval(right)?;
    let (new_left, new_right) = Interval::refine(op, &left_value, &right_value);
    trace!("refine {} {:?} {}: {} -> {}, {} -> {}", left, op, right, left_value, new_left, right_value, new_right);
    if new_left.is_bottom() || new_right.is_bottom() {
        return Ok(ValueEnvironment::Bottom);
    }
    let mut result = env.clone();
    for (side, refined) in [(left, new_left), (right, new_right)] {
        if let Some(id) = side.as_identifier() {
            let current = env.get(id);
            result = result.with(id, current.glb(&lift(refined)));
        }
    }
    Ok(result)
}

impl Interval {
    /// Abstract arithmetic `left op right`; non-arithmetic operators give top.
    pub fn arithmetic(op: BinaryOp, left: &Interval, right: &Interval) -> Interval {
        if left.is_bottom() || right.is_bottom() {
            return Interval::bottom();
        }
        match op {
            BinaryOp::Add => left.add(right),
            BinaryOp::Sub => left.sub(right),
            BinaryOp::Mul => left.mul(right),
            BinaryOp::Div => left.div(right),
            _ => Interval::top(),
        }
    }
}

impl NonRelationalValueDomain for Interval {
    const NAME: &'static str = "interval";

    fn eval(expr: &ValueExpr, env: &ValueEnvironment<Self>, pp: ProgramPoint) -> Result<Self> {
        let value = match expr {
            ValueExpr::Identifier(id) => env.get(id),
            ValueExpr::Constant(Constant::Int(n)) => Interval::singleton(*n),
            ValueExpr::Constant(_) => Interval::top(),
            ValueExpr::Unary(op, e) => {
                let arg = Self::eval(e, env, pp)?;
                if arg.is_bottom() {
                    return Ok(Interval::bottom());
                }
                match op {
                    UnaryOp::Neg => arg.neg(),
                    UnaryOp::StrLen => Interval::at_least(0),
                    UnaryOp::Not => Interval::top(),
                }
            }
            ValueExpr::Binary(op, l, r) => {
                let left = Self::eval(l, env, pp)?;
                let right = Self::eval(r, env, pp)?;
                Self::arithmetic(*op, &left, &right)
            }
            ValueExpr::Ternary(..) => Interval::top(),
            ValueExpr::Skip => Interval::bottom(),
            ValueExpr::PushAny => Interval::top(),
        };
        Ok(value)
    }

    fn satisfies(expr: &ValueExpr, env: &ValueEnvironment<Self>, pp: ProgramPoint) -> Result<Satisfiability> {
        match expr {
            ValueExpr::Constant(Constant::Bool(b)) => Ok(Satisfiability::from_bool(*b)),
            ValueExpr::Unary(UnaryOp::Not, e) => Ok(Self::satisfies(e, env, pp)?.negate()),
            ValueExpr::Binary(BinaryOp::And, l, r) => Ok(Self::satisfies(l, env, pp)?.and(Self::satisfies(r, env, pp)?)),
            ValueExpr::Binary(BinaryOp::Or, l, r) => Ok(Self::satisfies(l, env, pp)?.or(Self::satisfies(r, env, pp)?)),
            ValueExpr::Binary(op, l, r) if op.is_comparison() => {
                let left = Self::eval(l, env, pp)?;
                let right = Self::eval(r, env, pp)?;
                Ok(left.compare(*op, &right))
            }
            _ => Ok(Satisfiability::Unknown),
        }
    }

    fn assume(env: &ValueEnvironment<Self>, expr: &ValueExpr, pp: ProgramPoint) -> Result<ValueEnvironment<Self>> {
        assume_boolean(env, expr, &|env: &ValueEnvironment<Self>, atom: &ValueExpr| -> Result<ValueEnvironment<Self>> {
            match atom {
                ValueExpr::Binary(op, l, r) if op.is_comparison() => {
                    refine_comparison(env, *op, l, r, |e| Self::eval(e, env, pp), |i| i)
                }
                _ => match Self::satisfies(atom, env, pp)? {
                    Satisfiability::NotSatisfied | Satisfiability::Bottom => Ok(ValueEnvironment::Bottom),
                    _ => Ok(env.clone()),
                },
            }
        })
    }

    fn representation(&self) -> String {
        self.to_string()
    }
}

/// Environment of intervals, one per integer variable.
pub type IntervalEnvironment = ValueEnvironment<Interval>;
