//! Functional lattices: maps from identifiers to lattice elements, ordered point-wise.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::domain::{Lattice, NonRelationalValueDomain, ValueDomain, BOTTOM_REPR, TOP_REPR};
use crate::error::{Result, SemanticError};
use crate::expr::{Identifier, ProgramPoint, ValueExpr};
use crate::satisfiability::Satisfiability;

/// Map from identifiers to values of `V`, lifted point-wise.
///
/// Keys missing from the map are implicitly mapped to `V::top()`, so the map only
/// stores informative entries. A single bottom value collapses the whole map to
/// [`FunctionalLattice::Bottom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionalLattice<V> {
    Top,
    Bottom,
    /// Non-empty map of non-top, non-bottom values.
    Map(BTreeMap<Identifier, V>),
}

/// The environment a non-relational domain is lifted into.
pub type ValueEnvironment<V> = FunctionalLattice<V>;

impl<V: Lattice> FunctionalLattice<V> {
    /// Builds a map from entries, dropping top values.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Identifier, V)>,
    {
        let mut map = BTreeMap::new();
        for (id, v) in entries {
            if v.is_bottom() {
                return FunctionalLattice::Bottom;
            }
            if !v.is_top() {
                map.insert(id, v);
            }
        }
        Self::normalize(map)
    }

    fn normalize(map: BTreeMap<Identifier, V>) -> Self {
        if map.is_empty() {
            FunctionalLattice::Top
        } else {
            FunctionalLattice::Map(map)
        }
    }

    /// The value associated with `id`.
    pub fn get(&self, id: &Identifier) -> V {
        match self {
            FunctionalLattice::Top => V::top(),
            FunctionalLattice::Bottom => V::bottom(),
            FunctionalLattice::Map(map) => map.get(id).cloned().unwrap_or_else(V::top),
        }
    }

    /// Returns a copy of this map where `id` is bound to `value`.
    ///
    /// Binding into `Bottom` stays `Bottom`.
    pub fn with(&self, id: &Identifier, value: V) -> Self {
        if value.is_bottom() {
            return FunctionalLattice::Bottom;
        }
        let mut map = match self {
            FunctionalLattice::Bottom => return FunctionalLattice::Bottom,
            FunctionalLattice::Top => BTreeMap::new(),
            FunctionalLattice::Map(map) => map.clone(),
        };
        if value.is_top() {
            map.remove(id);
        } else {
            map.insert(id.clone(), value);
        }
        Self::normalize(map)
    }

    /// Returns a copy of this map without an entry for `id`.
    pub fn without(&self, id: &Identifier) -> Self {
        match self {
            FunctionalLattice::Map(map) if map.contains_key(id) => {
                let mut map = map.clone();
                map.remove(id);
                Self::normalize(map)
            }
            _ => self.clone(),
        }
    }

    /// Applies `f` to every stored value.
    pub fn map_values<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&Identifier, &V) -> V,
    {
        match self {
            FunctionalLattice::Map(map) => Self::from_entries(map.iter().map(|(k, v)| (k.clone(), f(k, v)))),
            other => other.clone(),
        }
    }

    /// Stored entries, in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &V)> {
        let map = match self {
            FunctionalLattice::Map(map) => Some(map),
            _ => None,
        };
        map.into_iter().flat_map(|m| m.iter())
    }

    pub fn keys(&self) -> impl Iterator<Item = &Identifier> {
        self.iter().map(|(k, _)| k)
    }

    pub fn contains_key(&self, id: &Identifier) -> bool {
        matches!(self, FunctionalLattice::Map(map) if map.contains_key(id))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        match self {
            FunctionalLattice::Map(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-wise combination over the keys stored in both maps.
    ///
    /// Keys present in only one map pair with top, which `op` must absorb.
    fn combine_common<F>(a: &BTreeMap<Identifier, V>, b: &BTreeMap<Identifier, V>, op: F) -> Self
    where
        F: Fn(&V, &V) -> V,
    {
        let entries = a
            .iter()
            .filter_map(|(k, va)| b.get(k).map(|vb| (k.clone(), op(va, vb))))
            .collect::<Vec<_>>();
        Self::from_entries(entries)
    }
}

impl<V: Lattice> Lattice for FunctionalLattice<V> {
    fn top() -> Self {
        FunctionalLattice::Top
    }

    fn bottom() -> Self {
        FunctionalLattice::Bottom
    }

    fn is_top(&self) -> bool {
        matches!(self, FunctionalLattice::Top)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, FunctionalLattice::Bottom)
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (FunctionalLattice::Bottom, _) => true,
            (_, FunctionalLattice::Top) => true,
            (_, FunctionalLattice::Bottom) => false,
            (FunctionalLattice::Top, FunctionalLattice::Map(_)) => false,
            (FunctionalLattice::Map(_), FunctionalLattice::Map(b)) => {
                b.iter().all(|(k, vb)| self.get(k).less_or_equal(vb))
            }
        }
    }

    fn lub(&self, other: &Self) -> Self {
        match (self, other) {
            (FunctionalLattice::Bottom, x) | (x, FunctionalLattice::Bottom) => x.clone(),
            (FunctionalLattice::Top, _) | (_, FunctionalLattice::Top) => FunctionalLattice::Top,
            (FunctionalLattice::Map(a), FunctionalLattice::Map(b)) => Self::combine_common(a, b, V::lub),
        }
    }

    fn glb(&self, other: &Self) -> Self {
        match (self, other) {
            (FunctionalLattice::Bottom, _) | (_, FunctionalLattice::Bottom) => FunctionalLattice::Bottom,
            (FunctionalLattice::Top, x) | (x, FunctionalLattice::Top) => x.clone(),
            (FunctionalLattice::Map(a), FunctionalLattice::Map(b)) => {
                let mut entries = a.clone();
                for (k, vb) in b {
                    let v = match a.get(k) {
                        Some(va) => va.glb(vb),
                        None => vb.clone(),
                    };
                    entries.insert(k.clone(), v);
                }
                Self::from_entries(entries)
            }
        }
    }

    fn widening(&self, other: &Self) -> Self {
        match (self, other) {
            (FunctionalLattice::Bottom, x) | (x, FunctionalLattice::Bottom) => x.clone(),
            (FunctionalLattice::Top, _) | (_, FunctionalLattice::Top) => FunctionalLattice::Top,
            (FunctionalLattice::Map(a), FunctionalLattice::Map(b)) => Self::combine_common(a, b, V::widening),
        }
    }
}

impl<V: NonRelationalValueDomain> FunctionalLattice<V> {
    fn check_tracked(id: &Identifier) -> Result<()> {
        if V::tracks_identifier(id) {
            Ok(())
        } else {
            Err(SemanticError::untrackable(V::NAME, id))
        }
    }

    fn check_expr(expr: &ValueExpr) -> Result<()> {
        expr.identifiers().into_iter().try_for_each(Self::check_tracked)
    }

    /// Evaluates `expr` in this environment.
    pub fn eval(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<V> {
        if self.is_bottom() {
            return Ok(V::bottom());
        }
        Self::check_expr(expr)?;
        V::eval(expr, self, pp)
    }
}

impl<V: NonRelationalValueDomain> ValueDomain for FunctionalLattice<V> {
    fn assign(&self, id: &Identifier, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assign {} := {}", pp, V::NAME, id, expr);
        Self::check_tracked(id)?;
        if self.is_bottom() {
            return Ok(FunctionalLattice::Bottom);
        }
        let value = self.eval(expr, pp)?;
        Ok(self.with(id, value))
    }

    fn assume(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Self> {
        debug!("{}: {} assume {}", pp, V::NAME, expr);
        if self.is_bottom() {
            return Ok(FunctionalLattice::Bottom);
        }
        Self::check_expr(expr)?;
        V::assume(self, expr, pp)
    }

    fn satisfies(&self, expr: &ValueExpr, pp: ProgramPoint) -> Result<Satisfiability> {
        if self.is_bottom() {
            return Ok(Satisfiability::Bottom);
        }
        Self::check_expr(expr)?;
        V::satisfies(expr, self, pp)
    }

    fn forget_identifier(&self, id: &Identifier) -> Result<Self> {
        Ok(self.without(id))
    }

    fn representation(&self) -> String {
        match self {
            FunctionalLattice::Top => TOP_REPR.to_string(),
            FunctionalLattice::Bottom => BOTTOM_REPR.to_string(),
            FunctionalLattice::Map(map) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.representation()))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl<V: NonRelationalValueDomain> fmt::Display for FunctionalLattice<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.representation())
    }
}
