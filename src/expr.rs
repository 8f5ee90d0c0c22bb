//! Symbolic value expressions handed to the domains by the front end.
//!
//! The front end resolves program text into these expressions; the domains only
//! pattern-match on them. Identifiers carry their static type so that a domain can
//! refuse identifiers it cannot track.

use std::collections::BTreeSet;
use std::fmt;

/// Static type of an identifier or expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Int,
    Bool,
    String,
    /// The front end could not determine the type.
    Untyped,
    /// A reference into the heap. Value domains do not track these.
    Pointer,
}

impl Type {
    pub fn is_string(self) -> bool {
        matches!(self, Type::String | Type::Untyped)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Untyped)
    }
}

/// A program variable together with its static type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    name: String,
    ty: Type,
}

impl Identifier {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Identifier { name: name.into(), ty }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Identifier::new(name, Type::Int)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Identifier::new(name, Type::String)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Type {
        self.ty
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Literal value of a constant expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    Int(i64),
    Str(String),
    Bool(bool),
    Null,
}

impl Constant {
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int(_) => Type::Int,
            Constant::Str(_) => Type::String,
            Constant::Bool(_) => Type::Bool,
            Constant::Null => Type::Untyped,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Str(s) => write!(f, "{:?}", s),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation: `-e`
    Neg,
    /// Logical negation: `!e`
    Not,
    /// String length: `len(e)`
    StrLen,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// String concatenation.
    Concat,
    /// `contains(haystack, needle)`
    Contains,
    StartsWith,
    EndsWith,
    /// String equality (as opposed to numeric `Eq`).
    StrEq,
    /// `index_of(haystack, needle)`
    IndexOf,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// The comparison obtained by swapping operands: `a < b` iff `b > a`.
    pub fn flip(self) -> Self {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => other,
        }
    }

    /// The comparison denoting the logical negation: `!(a < b)` iff `a >= b`.
    pub fn negate_comparison(self) -> Option<Self> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Ne),
            BinaryOp::Ne => Some(BinaryOp::Eq),
            BinaryOp::Lt => Some(BinaryOp::Ge),
            BinaryOp::Le => Some(BinaryOp::Gt),
            BinaryOp::Gt => Some(BinaryOp::Le),
            BinaryOp::Ge => Some(BinaryOp::Lt),
            _ => None,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Concat => "concat",
            BinaryOp::Contains => "contains",
            BinaryOp::StartsWith => "starts_with",
            BinaryOp::EndsWith => "ends_with",
            BinaryOp::StrEq => "equals",
            BinaryOp::IndexOf => "index_of",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TernaryOp {
    /// `substring(s, i, j)`: characters `i..j` of `s`.
    Substring,
    /// `replace(s, search, replacement)`: all occurrences.
    Replace,
}

/// A side-effect free expression over program values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueExpr {
    Identifier(Identifier),
    Constant(Constant),
    Unary(UnaryOp, Box<ValueExpr>),
    Binary(BinaryOp, Box<ValueExpr>, Box<ValueExpr>),
    Ternary(TernaryOp, Box<ValueExpr>, Box<ValueExpr>, Box<ValueExpr>),
    /// Evaluation never reaches this point.
    Skip,
    /// Any value of any type.
    PushAny,
}

impl ValueExpr {
    pub fn var(id: Identifier) -> Self {
        ValueExpr::Identifier(id)
    }

    pub fn int(n: i64) -> Self {
        ValueExpr::Constant(Constant::Int(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        ValueExpr::Constant(Constant::Str(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        ValueExpr::Constant(Constant::Bool(b))
    }

    pub fn unary(op: UnaryOp, e: ValueExpr) -> Self {
        ValueExpr::Unary(op, Box::new(e))
    }

    pub fn binary(op: BinaryOp, left: ValueExpr, right: ValueExpr) -> Self {
        ValueExpr::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn ternary(op: TernaryOp, left: ValueExpr, middle: ValueExpr, right: ValueExpr) -> Self {
        ValueExpr::Ternary(op, Box::new(left), Box::new(middle), Box::new(right))
    }

    pub fn add(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Add, self, other)
    }

    pub fn sub(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Sub, self, other)
    }

    pub fn mul(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Mul, self, other)
    }

    pub fn div(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Div, self, other)
    }

    pub fn neg(self) -> Self {
        ValueExpr::unary(UnaryOp::Neg, self)
    }

    pub fn not(self) -> Self {
        ValueExpr::unary(UnaryOp::Not, self)
    }

    pub fn equal(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Eq, self, other)
    }

    pub fn not_equal(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Ne, self, other)
    }

    pub fn less(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Lt, self, other)
    }

    pub fn less_eq(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Le, self, other)
    }

    pub fn greater(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Gt, self, other)
    }

    pub fn greater_eq(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Ge, self, other)
    }

    pub fn and(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::And, self, other)
    }

    pub fn or(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Or, self, other)
    }

    pub fn concat(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Concat, self, other)
    }

    pub fn contains(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::Contains, self, other)
    }

    pub fn starts_with(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::StartsWith, self, other)
    }

    pub fn ends_with(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::EndsWith, self, other)
    }

    pub fn str_equals(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::StrEq, self, other)
    }

    pub fn index_of(self, other: Self) -> Self {
        ValueExpr::binary(BinaryOp::IndexOf, self, other)
    }

    pub fn length(self) -> Self {
        ValueExpr::unary(UnaryOp::StrLen, self)
    }

    pub fn substring(self, begin: Self, end: Self) -> Self {
        ValueExpr::ternary(TernaryOp::Substring, self, begin, end)
    }

    pub fn replace(self, search: Self, replacement: Self) -> Self {
        ValueExpr::ternary(TernaryOp::Replace, self, search, replacement)
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            ValueExpr::Identifier(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            ValueExpr::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Static type of the expression.
    pub fn ty(&self) -> Type {
        match self {
            ValueExpr::Identifier(id) => id.ty(),
            ValueExpr::Constant(c) => c.ty(),
            ValueExpr::Unary(op, _) => match op {
                UnaryOp::Neg | UnaryOp::StrLen => Type::Int,
                UnaryOp::Not => Type::Bool,
            },
            ValueExpr::Binary(op, _, _) => match op {
                BinaryOp::Concat => Type::String,
                BinaryOp::IndexOf => Type::Int,
                op if op.is_arithmetic() => Type::Int,
                _ => Type::Bool,
            },
            ValueExpr::Ternary(_, _, _, _) => Type::String,
            ValueExpr::Skip | ValueExpr::PushAny => Type::Untyped,
        }
    }

    /// Whether `id` occurs anywhere inside this expression.
    pub fn mentions(&self, id: &Identifier) -> bool {
        match self {
            ValueExpr::Identifier(x) => x == id,
            ValueExpr::Constant(_) | ValueExpr::Skip | ValueExpr::PushAny => false,
            ValueExpr::Unary(_, e) => e.mentions(id),
            ValueExpr::Binary(_, l, r) => l.mentions(id) || r.mentions(id),
            ValueExpr::Ternary(_, l, m, r) => l.mentions(id) || m.mentions(id) || r.mentions(id),
        }
    }

    /// All identifiers occurring in this expression.
    pub fn identifiers(&self) -> BTreeSet<&Identifier> {
        let mut out = BTreeSet::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut BTreeSet<&'a Identifier>) {
        match self {
            ValueExpr::Identifier(x) => {
                out.insert(x);
            }
            ValueExpr::Constant(_) | ValueExpr::Skip | ValueExpr::PushAny => {}
            ValueExpr::Unary(_, e) => e.collect_identifiers(out),
            ValueExpr::Binary(_, l, r) => {
                l.collect_identifiers(out);
                r.collect_identifiers(out);
            }
            ValueExpr::Ternary(_, l, m, r) => {
                l.collect_identifiers(out);
                m.collect_identifiers(out);
                r.collect_identifiers(out);
            }
        }
    }
}

impl From<Identifier> for ValueExpr {
    fn from(id: Identifier) -> Self {
        ValueExpr::Identifier(id)
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Identifier(id) => write!(f, "{}", id),
            ValueExpr::Constant(c) => write!(f, "{}", c),
            ValueExpr::Unary(UnaryOp::Neg, e) => write!(f, "-{}", e),
            ValueExpr::Unary(UnaryOp::Not, e) => write!(f, "!{}", e),
            ValueExpr::Unary(UnaryOp::StrLen, e) => write!(f, "len({})", e),
            ValueExpr::Binary(op, l, r) if op.is_comparison() || op.is_arithmetic() => {
                write!(f, "{} {} {}", l, op.symbol(), r)
            }
            ValueExpr::Binary(op @ (BinaryOp::And | BinaryOp::Or), l, r) => write!(f, "({} {} {})", l, op.symbol(), r),
            ValueExpr::Binary(op, l, r) => write!(f, "{}({}, {})", op.symbol(), l, r),
            ValueExpr::Ternary(TernaryOp::Substring, s, i, j) => write!(f, "substring({}, {}, {})", s, i, j),
            ValueExpr::Ternary(TernaryOp::Replace, s, a, b) => write!(f, "replace({}, {}, {})", s, a, b),
            ValueExpr::Skip => write!(f, "skip"),
            ValueExpr::PushAny => write!(f, "*"),
        }
    }
}

/// Opaque location token threaded through every transfer function.
///
/// Domains never inspect it; it only shows up in log messages.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramPoint(u32);

impl ProgramPoint {
    pub fn new(id: u32) -> Self {
        ProgramPoint(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pp{}", self.0)
    }
}
