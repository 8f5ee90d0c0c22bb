//! Relational domains: for every variable, a set of expressions it is related to.
//!
//! All three domains share the same shape. A state maps each identifier to a
//! [`ConstraintSet`] (the relation targets of that identifier) and keeps the map
//! transitively closed: if `z` is related to `y` and `y` is related to `x`, then `z`
//! is related to `x`. What "related" means is up to the domain: equal to, strictly
//! less than, or contains as a substring.

pub mod equality;
pub mod substring;
pub mod upper_bounds;

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use log::{trace, warn};

use crate::domain::{Lattice, BOTTOM_REPR, TOP_REPR};
use crate::error::{Result, SemanticError};
use crate::expr::{Identifier, Type, ValueExpr};
use crate::functional::FunctionalLattice;

pub use self::equality::EqualityDomain;
pub use self::substring::RelationalSubstringDomain;
pub use self::upper_bounds::StrictUpperBounds;

/// Something an identifier can be related to.
pub trait RelationTarget: Ord + Clone + fmt::Debug + fmt::Display {
    fn from_identifier(id: &Identifier) -> Self;

    /// The identifier this target denotes, if it is a bare identifier.
    fn as_identifier(&self) -> Option<&Identifier>;

    /// Whether the value of this target depends on `id`.
    fn mentions(&self, id: &Identifier) -> bool;
}

impl RelationTarget for Identifier {
    fn from_identifier(id: &Identifier) -> Self {
        id.clone()
    }

    fn as_identifier(&self) -> Option<&Identifier> {
        Some(self)
    }

    fn mentions(&self, id: &Identifier) -> bool {
        self == id
    }
}

impl RelationTarget for ValueExpr {
    fn from_identifier(id: &Identifier) -> Self {
        ValueExpr::Identifier(id.clone())
    }

    fn as_identifier(&self) -> Option<&Identifier> {
        ValueExpr::as_identifier(self)
    }

    fn mentions(&self, id: &Identifier) -> bool {
        ValueExpr::mentions(self, id)
    }
}

/// A set of relation targets, ordered by reverse inclusion.
///
/// More targets means more knowledge: the empty set is top, `lub` intersects and
/// `glb` unites. Bottom is a separate element, since no set of targets denotes an
/// unreachable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintSet<T> {
    Bottom,
    Set(BTreeSet<T>),
}

impl<T: RelationTarget> ConstraintSet<T> {
    pub fn new<I>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        ConstraintSet::Set(targets.into_iter().collect())
    }

    pub fn singleton(target: T) -> Self {
        ConstraintSet::new([target])
    }

    pub fn contains(&self, target: &T) -> bool {
        match self {
            ConstraintSet::Bottom => true,
            ConstraintSet::Set(set) => set.contains(target),
        }
    }

    pub fn contains_identifier(&self, id: &Identifier) -> bool {
        self.contains(&T::from_identifier(id))
    }

    /// Whether every target of `other` is also in `self`.
    pub fn contains_all(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstraintSet::Bottom, _) => true,
            (ConstraintSet::Set(_), ConstraintSet::Bottom) => false,
            (ConstraintSet::Set(a), ConstraintSet::Set(b)) => b.is_subset(a),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let set = match self {
            ConstraintSet::Set(set) => Some(set),
            ConstraintSet::Bottom => None,
        };
        set.into_iter().flat_map(|s| s.iter())
    }

    pub fn len(&self) -> usize {
        match self {
            ConstraintSet::Set(set) => set.len(),
            ConstraintSet::Bottom => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ConstraintSet::Set(set) if set.is_empty())
    }

    pub fn with(&self, target: T) -> Self {
        match self {
            ConstraintSet::Bottom => ConstraintSet::Bottom,
            ConstraintSet::Set(set) => {
                let mut set = set.clone();
                set.insert(target);
                ConstraintSet::Set(set)
            }
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstraintSet::Set(a), ConstraintSet::Set(b)) => ConstraintSet::Set(a.union(b).cloned().collect()),
            _ => ConstraintSet::Bottom,
        }
    }

    /// Drops every target whose value depends on `id`.
    pub fn without_mentions(&self, id: &Identifier) -> Self {
        match self {
            ConstraintSet::Bottom => ConstraintSet::Bottom,
            ConstraintSet::Set(set) => ConstraintSet::Set(set.iter().filter(|t| !t.mentions(id)).cloned().collect()),
        }
    }

    /// `y` for a single target, `{y, z}` otherwise.
    pub fn compact(&self) -> String {
        match self {
            ConstraintSet::Set(set) if set.len() == 1 => self.iter().map(|t| t.to_string()).collect(),
            _ => self.to_string(),
        }
    }
}

impl<T: RelationTarget> Lattice for ConstraintSet<T> {
    fn top() -> Self {
        ConstraintSet::Set(BTreeSet::new())
    }

    fn bottom() -> Self {
        ConstraintSet::Bottom
    }

    fn is_top(&self) -> bool {
        self.is_empty()
    }

    fn is_bottom(&self) -> bool {
        matches!(self, ConstraintSet::Bottom)
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self.contains_all(other)
    }

    fn lub(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstraintSet::Bottom, x) | (x, ConstraintSet::Bottom) => x.clone(),
            (ConstraintSet::Set(a), ConstraintSet::Set(b)) => ConstraintSet::Set(a.intersection(b).cloned().collect()),
        }
    }

    fn glb(&self, other: &Self) -> Self {
        self.union(other)
    }

    fn widening(&self, other: &Self) -> Self {
        self.lub(other)
    }
}

impl<T: RelationTarget> fmt::Display for ConstraintSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintSet::Bottom => write!(f, "{}", BOTTOM_REPR),
            ConstraintSet::Set(set) => {
                write!(f, "{{")?;
                for (i, t) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Map from identifiers to their relation targets.
pub type RelationalMap<T> = FunctionalLattice<ConstraintSet<T>>;

/// What a relational domain relates identifiers to, and how it prints.
pub trait RelationKind: Clone + fmt::Debug + PartialEq {
    type Target: RelationTarget;

    /// Name used in diagnostics.
    const NAME: &'static str;

    fn tracks_identifier(id: &Identifier) -> bool {
        id.ty() != Type::Pointer
    }

    /// Whether a closed map describes no concrete state at all.
    fn is_contradictory(_map: &RelationalMap<Self::Target>) -> bool {
        false
    }

    /// One line of the representation.
    fn line(id: &Identifier, targets: &ConstraintSet<Self::Target>) -> String;
}

/// A relational state of kind `K`, always kept transitively closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Relational<K: RelationKind> {
    map: RelationalMap<K::Target>,
    kind: PhantomData<K>,
}

impl<K: RelationKind> Relational<K> {
    pub(crate) fn from_map(map: RelationalMap<K::Target>) -> Self {
        Relational { map, kind: PhantomData }
    }

    /// Builds a state from explicit relations and closes it.
    pub fn from_relations<I>(relations: I) -> Self
    where
        I: IntoIterator<Item = (Identifier, ConstraintSet<K::Target>)>,
    {
        Self::from_map(FunctionalLattice::from_entries(relations)).closure()
    }

    pub fn map(&self) -> &RelationalMap<K::Target> {
        &self.map
    }

    /// The targets `id` is related to.
    pub fn get(&self, id: &Identifier) -> ConstraintSet<K::Target> {
        self.map.get(id)
    }

    pub(crate) fn with(&self, id: &Identifier, targets: ConstraintSet<K::Target>) -> Self {
        Self::from_map(self.map.with(id, targets))
    }

    pub(crate) fn check_tracked<'a, I>(ids: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Identifier>,
    {
        match ids.into_iter().find(|id| !K::tracks_identifier(id)) {
            Some(id) => Err(SemanticError::untrackable(K::NAME, id)),
            None => Ok(()),
        }
    }

    /// Removes `id` as a key and as a target of every other identifier.
    pub(crate) fn scrub(&self, id: &Identifier) -> Self {
        Self::from_map(self.map.without(id).map_values(|_, targets| targets.without_mentions(id)))
    }

    /// Transitive closure of the relation.
    ///
    /// Every step unites the targets of `z` with the targets of each identifier `y`
    /// that `z` is related to, leaving out `z` itself. The number of distinct targets
    /// bounds the number of steps. A contradictory result collapses to bottom.
    pub(crate) fn closure(&self) -> Self {
        let closed = self.transitive_closure();
        if K::is_contradictory(&closed) {
            Self::bottom()
        } else {
            Self::from_map(closed)
        }
    }

    fn transitive_closure(&self) -> RelationalMap<K::Target> {
        if !matches!(self.map, FunctionalLattice::Map(_)) {
            return self.map.clone();
        }
        let universe = self
            .map
            .iter()
            .flat_map(|(k, targets)| targets.iter().cloned().chain([K::Target::from_identifier(k)]))
            .collect::<BTreeSet<_>>();
        let cap = universe.len() + 1;

        let mut current = self.map.clone();
        for iteration in 0..cap {
            let next = Self::closure_step(&current);
            if next == current {
                return current;
            }
            trace!("{} closure step {}: {} relations", K::NAME, iteration, next.iter().map(|(_, t)| t.len()).sum::<usize>());
            current = next;
        }
        warn!("{} closure did not stabilize after {} steps", K::NAME, cap);
        current
    }

    fn closure_step(map: &RelationalMap<K::Target>) -> RelationalMap<K::Target> {
        map.map_values(|z, targets| {
            let mut closed = targets.clone();
            for y in targets.iter().filter_map(|t| t.as_identifier()) {
                if y == z {
                    continue;
                }
                for x in map.get(y).iter() {
                    if x.as_identifier() != Some(z) {
                        closed = closed.with(x.clone());
                    }
                }
            }
            closed
        })
    }

    pub(crate) fn render(&self) -> String {
        match &self.map {
            FunctionalLattice::Top => TOP_REPR.to_string(),
            FunctionalLattice::Bottom => BOTTOM_REPR.to_string(),
            FunctionalLattice::Map(map) => map.iter().map(|(id, targets)| K::line(id, targets)).collect::<Vec<_>>().join("\n"),
        }
    }
}

impl<K: RelationKind> Lattice for Relational<K> {
    fn top() -> Self {
        Self::from_map(FunctionalLattice::Top)
    }

    fn bottom() -> Self {
        Self::from_map(FunctionalLattice::Bottom)
    }

    fn is_top(&self) -> bool {
        self.map.is_top()
    }

    fn is_bottom(&self) -> bool {
        self.map.is_bottom()
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self.map.less_or_equal(&other.map)
    }

    fn lub(&self, other: &Self) -> Self {
        Self::from_map(self.map.lub(&other.map))
    }

    fn glb(&self, other: &Self) -> Self {
        Self::from_map(self.map.glb(&other.map)).closure()
    }

    fn widening(&self, other: &Self) -> Self {
        self.lub(other)
    }
}

impl<K: RelationKind> Default for Relational<K> {
    fn default() -> Self {
        Self::top()
    }
}

impl<K: RelationKind> fmt::Display for Relational<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
