//! Composite string/numeric domain.
//!
//! A [`StringNumeric`] value is either a string language ([`AutomatonString`]) or an
//! integer range ([`Interval`]), never both: string operations produce strings, numeric
//! operations produce numbers, and mixing the two loses all information.

use std::fmt;

use log::trace;

use crate::automata::AutomatonString;
use crate::domain::{assume_boolean, Lattice, NonRelationalValueDomain, BOTTOM_REPR};
use crate::error::Result;
use crate::expr::{BinaryOp, Constant, ProgramPoint, TernaryOp, UnaryOp, ValueExpr};
use crate::functional::ValueEnvironment;
use crate::interval::{refine_comparison, Bound, Interval};
use crate::satisfiability::Satisfiability;

/// Maximum number of `(begin, end)` pairs enumerated by `substring` before falling back
/// to all factors of the string.
pub const SUBSTRING_ENUMERATION_LIMIT: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringNumeric {
    Top,
    Bottom,
    /// Non-empty string language.
    Str(AutomatonString),
    /// Non-empty integer range.
    Num(Interval),
}

/// Environment of the composite domain.
pub type StringNumericEnvironment = ValueEnvironment<StringNumeric>;

impl StringNumeric {
    pub fn string(a: AutomatonString) -> Self {
        if a.is_empty_language() {
            StringNumeric::Bottom
        } else {
            StringNumeric::Str(a)
        }
    }

    pub fn number(i: Interval) -> Self {
        if i.is_bottom() {
            StringNumeric::Bottom
        } else {
            StringNumeric::Num(i)
        }
    }

    pub fn from_literal(s: &str) -> Self {
        StringNumeric::Str(AutomatonString::from_literal(s))
    }

    /// The value as a string language; `Top` stands for all strings.
    pub fn as_string(&self) -> Option<AutomatonString> {
        match self {
            StringNumeric::Top => Some(AutomatonString::top()),
            StringNumeric::Str(a) => Some(a.clone()),
            _ => None,
        }
    }

    /// The value as an integer range; `Top` stands for all integers.
    pub fn as_number(&self) -> Option<Interval> {
        match self {
            StringNumeric::Top => Some(Interval::top()),
            StringNumeric::Num(i) => Some(*i),
            _ => None,
        }
    }

    fn is_unconstrained_string(&self) -> bool {
        match self {
            StringNumeric::Top => true,
            StringNumeric::Str(a) => a.is_top(),
            _ => false,
        }
    }

    fn eval_unary(op: UnaryOp, arg: &StringNumeric) -> StringNumeric {
        match op {
            UnaryOp::Neg => arg.as_number().map_or(StringNumeric::Top, |i| Self::number(i.neg())),
            UnaryOp::StrLen => arg.as_string().map_or(StringNumeric::Top, |a| Self::number(a.length())),
            UnaryOp::Not => StringNumeric::Top,
        }
    }

    fn eval_binary(op: BinaryOp, left: &StringNumeric, right: &StringNumeric) -> StringNumeric {
        match op {
            op if op.is_arithmetic() => match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => Self::number(Interval::arithmetic(op, &l, &r)),
                _ => StringNumeric::Top,
            },
            BinaryOp::Concat => match (left.as_string(), right.as_string()) {
                (Some(l), Some(r)) => Self::string(l.concat(&r)),
                _ => StringNumeric::Top,
            },
            BinaryOp::IndexOf => match (left.as_string(), right.as_string()) {
                (Some(_), Some(_)) if left.is_unconstrained_string() => {
                    Self::number(Interval::from_bounds(Bound::Finite(-1), Bound::PosInf))
                }
                (Some(l), Some(_)) if right.is_unconstrained_string() => {
                    Self::number(Interval::from_bounds(Bound::Finite(-1), l.length().high()))
                }
                (Some(l), Some(r)) => Self::number(l.index_of(&r)),
                _ => StringNumeric::Top,
            },
            _ => StringNumeric::Top,
        }
    }

    fn eval_ternary(op: TernaryOp, left: &StringNumeric, middle: &StringNumeric, right: &StringNumeric) -> StringNumeric {
        match op {
            TernaryOp::Replace => match (left.as_string(), middle.as_string(), right.as_string()) {
                (Some(s), Some(a), Some(b)) => Self::string(s.replace(&a, &b)),
                _ => StringNumeric::Top,
            },
            TernaryOp::Substring => match (left.as_string(), middle.as_number(), right.as_number()) {
                (Some(s), Some(i), Some(j)) => Self::string(Self::substrings(&s, &i, &j)),
                _ => StringNumeric::Top,
            },
        }
    }

    /// Join of `s.substring(b, e)` over all `b ∈ begin`, `e ∈ end` with `0 ≤ b ≤ e`.
    fn substrings(s: &AutomatonString, begin: &Interval, end: &Interval) -> AutomatonString {
        let bounds = (
            begin.low().as_finite(),
            begin.high().as_finite(),
            end.low().as_finite(),
            end.high().as_finite(),
        );
        let (Some(b_lo), Some(b_hi), Some(e_lo), Some(e_hi)) = bounds else {
            return s.factors();
        };
        let b_lo = b_lo.max(0);
        let e_lo = e_lo.max(0);
        if b_hi < b_lo || e_hi < e_lo {
            return AutomatonString::empty();
        }
        let width = |lo: i64, hi: i64| (i128::from(hi) - i128::from(lo) + 1) as u128;
        let pairs = width(b_lo, b_hi) * width(e_lo, e_hi);
        if pairs > SUBSTRING_ENUMERATION_LIMIT as u128 {
            trace!("substring: {} index pairs, using factors", pairs);
            return s.factors();
        }
        let mut result = AutomatonString::empty();
        for b in b_lo..=b_hi {
            for e in e_lo.max(b)..=e_hi {
                result = result.union(&s.substring(b as usize, e as usize));
            }
        }
        result
    }

    fn satisfies_binary(op: BinaryOp, left: &StringNumeric, right: &StringNumeric) -> Satisfiability {
        if op.is_comparison() {
            return match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => l.compare(op, &r),
                _ => Satisfiability::Unknown,
            };
        }
        let (Some(l), Some(r)) = (left.as_string(), right.as_string()) else {
            return Satisfiability::Unknown;
        };
        let definite_then_may = |definite: bool, may: bool| {
            if definite {
                Satisfiability::Satisfied
            } else if may {
                Satisfiability::Unknown
            } else {
                Satisfiability::NotSatisfied
            }
        };
        match op {
            BinaryOp::Contains => definite_then_may(l.contains(&r), l.may_contain(&r)),
            BinaryOp::StartsWith => definite_then_may(l.starts_with(&r), l.may_start_with(&r)),
            BinaryOp::EndsWith => definite_then_may(l.ends_with(&r), l.may_end_with(&r)),
            BinaryOp::StrEq => match (l.single_string(), r.single_string()) {
                (Some(a), Some(b)) if a == b => Satisfiability::Satisfied,
                _ if l.intersection(&r).is_empty_language() => Satisfiability::NotSatisfied,
                _ => Satisfiability::Unknown,
            },
            _ => Satisfiability::Unknown,
        }
    }
}

impl Lattice for StringNumeric {
    fn top() -> Self {
        StringNumeric::Top
    }

    fn bottom() -> Self {
        StringNumeric::Bottom
    }

    fn is_top(&self) -> bool {
        matches!(self, StringNumeric::Top)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, StringNumeric::Bottom)
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (StringNumeric::Bottom, _) | (_, StringNumeric::Top) => true,
            (StringNumeric::Str(a), StringNumeric::Str(b)) => a.less_or_equal(b),
            (StringNumeric::Num(a), StringNumeric::Num(b)) => a.less_or_equal(b),
            _ => false,
        }
    }

    fn lub(&self, other: &Self) -> Self {
        match (self, other) {
            (StringNumeric::Bottom, x) | (x, StringNumeric::Bottom) => x.clone(),
            (StringNumeric::Str(a), StringNumeric::Str(b)) => Self::string(a.lub(b)),
            (StringNumeric::Num(a), StringNumeric::Num(b)) => Self::number(a.lub(b)),
            _ => StringNumeric::Top,
        }
    }

    fn glb(&self, other: &Self) -> Self {
        match (self, other) {
            (StringNumeric::Top, x) | (x, StringNumeric::Top) => x.clone(),
            (StringNumeric::Str(a), StringNumeric::Str(b)) => Self::string(a.glb(b)),
            (StringNumeric::Num(a), StringNumeric::Num(b)) => Self::number(a.glb(b)),
            _ => StringNumeric::Bottom,
        }
    }

    fn widening(&self, other: &Self) -> Self {
        match (self, other) {
            (StringNumeric::Bottom, x) | (x, StringNumeric::Bottom) => x.clone(),
            (StringNumeric::Str(a), StringNumeric::Str(b)) => Self::string(a.widening(b)),
            (StringNumeric::Num(a), StringNumeric::Num(b)) => Self::number(a.widening(b)),
            _ => StringNumeric::Top,
        }
    }
}

impl NonRelationalValueDomain for StringNumeric {
    const NAME: &'static str = "string-numeric";

    fn eval(expr: &ValueExpr, env: &ValueEnvironment<Self>, pp: ProgramPoint) -> Result<Self> {
        let value = match expr {
            ValueExpr::Identifier(id) => env.get(id),
            ValueExpr::Constant(Constant::Str(s)) => Self::from_literal(s),
            ValueExpr::Constant(Constant::Int(n)) => StringNumeric::Num(Interval::singleton(*n)),
            ValueExpr::Constant(_) => StringNumeric::Top,
            ValueExpr::Skip => StringNumeric::Bottom,
            ValueExpr::PushAny => StringNumeric::Top,
            ValueExpr::Unary(op, e) => {
                let arg = Self::eval(e, env, pp)?;
                if arg.is_bottom() {
                    return Ok(StringNumeric::Bottom);
                }
                Self::eval_unary(*op, &arg)
            }
            ValueExpr::Binary(op, l, r) => {
                let left = Self::eval(l, env, pp)?;
                let right = Self::eval(r, env, pp)?;
                if left.is_bottom() || right.is_bottom() {
                    return Ok(StringNumeric::Bottom);
                }
                Self::eval_binary(*op, &left, &right)
            }
            ValueExpr::Ternary(op, l, m, r) => {
                let left = Self::eval(l, env, pp)?;
                let middle = Self::eval(m, env, pp)?;
                let right = Self::eval(r, env, pp)?;
                if left.is_bottom() || middle.is_bottom() || right.is_bottom() {
                    return Ok(StringNumeric::Bottom);
                }
                Self::eval_ternary(*op, &left, &middle, &right)
            }
        };
        Ok(value)
    }

    fn satisfies(expr: &ValueExpr, env: &ValueEnvironment<Self>, pp: ProgramPoint) -> Result<Satisfiability> {
        match expr {
            ValueExpr::Constant(Constant::Bool(b)) => Ok(Satisfiability::from_bool(*b)),
            ValueExpr::Unary(UnaryOp::Not, e) => Ok(Self::satisfies(e, env, pp)?.negate()),
            ValueExpr::Binary(BinaryOp::And, l, r) => Ok(Self::satisfies(l, env, pp)?.and(Self::satisfies(r, env, pp)?)),
            ValueExpr::Binary(BinaryOp::Or, l, r) => Ok(Self::satisfies(l, env, pp)?.or(Self::satisfies(r, env, pp)?)),
            ValueExpr::Binary(op, l, r) => {
                let left = Self::eval(l, env, pp)?;
                let right = Self::eval(r, env, pp)?;
                if left.is_bottom() || right.is_bottom() {
                    return Ok(Satisfiability::Bottom);
                }
                Ok(Self::satisfies_binary(*op, &left, &right))
            }
            _ => Ok(Satisfiability::Unknown),
        }
    }

    fn assume(env: &ValueEnvironment<Self>, expr: &ValueExpr, pp: ProgramPoint) -> Result<ValueEnvironment<Self>> {
        assume_boolean(env, expr, &|env: &ValueEnvironment<Self>, atom: &ValueExpr| -> Result<ValueEnvironment<Self>> {
            match Self::satisfies(atom, env, pp)? {
                Satisfiability::NotSatisfied | Satisfiability::Bottom => return Ok(ValueEnvironment::Bottom),
                Satisfiability::Satisfied => return Ok(env.clone()),
                Satisfiability::Unknown => {}
            }
            let ValueExpr::Binary(op, l, r) = atom else {
                return Ok(env.clone());
            };
            if !op.is_comparison() {
                return Ok(env.clone());
            }
            let numeric = |e: &ValueExpr| -> Result<Option<Interval>> { Ok(Self::eval(e, env, pp)?.as_number()) };
            if numeric(l)?.is_none() || numeric(r)?.is_none() {
                return Ok(env.clone());
            }
            refine_comparison(
                env,
                *op,
                l,
                r,
                |e| Ok(numeric(e)?.unwrap_or_else(Interval::top)),
                StringNumeric::Num,
            )
        })
    }

    fn representation(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StringNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringNumeric::Top => write!(f, "#TOP#"),
            StringNumeric::Bottom => write!(f, "{}", BOTTOM_REPR),
            StringNumeric::Str(a) => write!(f, "{}", a),
            StringNumeric::Num(i) => write!(f, "{}", i),
        }
    }
}
