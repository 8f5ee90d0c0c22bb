//! Automaton-based string abstraction.
//!
//! An [`AutomatonString`] abstracts a set of strings by the regular language of a
//! canonical symbolic DFA. All operations are sound over-approximations of the
//! corresponding concrete string operations, and exact whenever the involved
//! languages are small enough to enumerate.

mod charclass;
mod dfa;

use std::collections::BTreeSet;
use std::fmt;

use log::trace;
use num_bigint::BigUint;

pub use self::charclass::{build_minterms, CharClass};
pub use self::dfa::{Dfa, Nfa, StateId, SymbolicTransition};
use crate::domain::Lattice;
use crate::interval::{Bound, Interval};

/// A regular set of strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AutomatonString {
    // invariant: canonical (trimmed, minimal, breadth-first numbered)
    dfa: Dfa,
}

impl AutomatonString {
    /// State count above which widening collapses a language to `C*`, where `C` is the
    /// set of characters it uses.
    pub const WIDENING_THRESHOLD: usize = 5;

    /// Maximum number of strings enumerated by the exact index-of and replace
    /// computations before falling back to a coarser answer.
    pub const ENUMERATION_LIMIT: usize = 64;

    /// Maximum substring length built layer by layer over a cyclic language.
    const SUBSTRING_LAYER_LIMIT: usize = 256;

    fn from_dfa(dfa: Dfa) -> Self {
        AutomatonString { dfa: dfa.minimize() }
    }

    /// The language `{s}`.
    pub fn from_literal(s: &str) -> Self {
        Self::from_dfa(Dfa::literal(s))
    }

    /// The language containing exactly the given strings.
    pub fn from_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        strings
            .into_iter()
            .fold(Self::empty(), |acc, s| acc.union(&Self::from_literal(s.as_ref())))
    }

    /// `C*` for a character class `C`.
    pub fn star(chars: CharClass) -> Self {
        Self::from_dfa(Dfa::star(chars))
    }

    /// All strings.
    pub fn top() -> Self {
        Self::from_dfa(Dfa::universal())
    }

    /// No strings.
    pub fn empty() -> Self {
        Self::from_dfa(Dfa::empty())
    }

    pub fn is_top(&self) -> bool {
        self.dfa == Self::top().dfa
    }

    pub fn is_empty_language(&self) -> bool {
        self.dfa.is_empty_lang()
    }

    pub fn accepts(&self, s: &str) -> bool {
        self.dfa.accepts(s)
    }

    /// Number of states of the canonical automaton.
    pub fn states(&self) -> usize {
        self.dfa.states()
    }

    /// Characters occurring in some string of the language.
    pub fn alphabet(&self) -> CharClass {
        self.dfa.alphabet()
    }

    pub fn union(&self, other: &Self) -> Self {
        AutomatonString {
            dfa: self.dfa.union(&other.dfa),
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        AutomatonString {
            dfa: self.dfa.intersection(&other.dfa),
        }
    }

    pub fn complement(&self) -> Self {
        AutomatonString {
            dfa: self.dfa.complement(),
        }
    }

    /// Language inclusion.
    pub fn is_contained_in(&self, other: &Self) -> bool {
        self.dfa.is_subset_of(&other.dfa)
    }

    /// `{ st | s ∈ self, t ∈ other }`
    pub fn concat(&self, other: &Self) -> Self {
        if self.is_empty_language() || other.is_empty_language() {
            return Self::empty();
        }
        let mut nfa = Nfa::from_dfa(&self.dfa);
        let offset = nfa.embed(&other.dfa);
        for s in 0..self.dfa.states() {
            if !self.dfa.accepting[s] {
                continue;
            }
            for tr in &other.dfa.transitions[0] {
                nfa.add_transition(s, tr.label.clone(), offset + tr.target);
            }
            nfa.accepting[s] = other.dfa.accepting[0];
        }
        Self::from_dfa(nfa.determinize())
    }

    /// An NFA over the states of `self` with a fresh start state that may begin
    /// anywhere.
    fn start_anywhere(&self, accept_all: bool) -> Nfa {
        let mut nfa = Nfa::from_dfa(&self.dfa);
        if accept_all {
            nfa.accepting.iter_mut().for_each(|a| *a = true);
        }
        let any_accepting = nfa.accepting.iter().any(|&a| a);
        let start = nfa.add_state(any_accepting);
        for s in 0..self.dfa.states() {
            for tr in &self.dfa.transitions[s] {
                nfa.add_transition(start, tr.label.clone(), tr.target);
            }
        }
        nfa.start = start;
        nfa
    }

    /// All substrings of all strings of the language.
    pub fn factors(&self) -> Self {
        if self.is_empty_language() {
            return Self::empty();
        }
        Self::from_dfa(self.start_anywhere(true).determinize())
    }

    /// All prefixes of all strings of the language.
    pub fn prefixes(&self) -> Self {
        if self.is_empty_language() {
            return Self::empty();
        }
        let mut nfa = Nfa::from_dfa(&self.dfa);
        nfa.accepting.iter_mut().for_each(|a| *a = true);
        Self::from_dfa(nfa.determinize())
    }

    /// All suffixes of all strings of the language.
    pub fn suffixes(&self) -> Self {
        if self.is_empty_language() {
            return Self::empty();
        }
        Self::from_dfa(self.start_anywhere(false).determinize())
    }

    /// `{ s[begin..end] | s ∈ self, end ≤ |s| }`, counting characters.
    pub fn substring(&self, begin: usize, end: usize) -> Self {
        if begin > end || self.is_empty_language() || self.max_length().is_some_and(|m| end > m) {
            return Self::empty();
        }
        let len = end - begin;
        let starts = self.dfa.states_after(begin);
        if starts.is_empty() {
            return Self::empty();
        }
        if len > Self::SUBSTRING_LAYER_LIMIT && self.dfa.has_cycle() {
            trace!("substring({}, {}) over a cyclic language: using factors", begin, end);
            return self.factors();
        }

        // Layer k holds the states reached after reading k characters of the substring.
        let n = self.dfa.states();
        let id = |layer: usize, state: StateId| 1 + (layer - 1) * n + state;
        let mut nfa = Nfa::new();
        nfa.accepting[0] = len == 0;
        for layer in 1..=len {
            for _ in 0..n {
                nfa.add_state(layer == len);
            }
        }
        for &q in &starts {
            if len > 0 {
                for tr in &self.dfa.transitions[q] {
                    nfa.add_transition(0, tr.label.clone(), id(1, tr.target));
                }
            }
        }
        for layer in 1..len {
            for q in 0..n {
                for tr in &self.dfa.transitions[q] {
                    nfa.add_transition(id(layer, q), tr.label.clone(), id(layer + 1, tr.target));
                }
            }
        }
        Self::from_dfa(nfa.determinize())
    }

    /// Bounds on the length (in characters) of the strings of the language.
    pub fn length(&self) -> Interval {
        if self.is_empty_language() {
            return Interval::bottom();
        }
        let min = self.min_length();
        let max = self.max_length();
        Interval::from_bounds(Bound::Finite(min as i64), max.map_or(Bound::PosInf, |m| Bound::Finite(m as i64)))
    }

    fn min_length(&self) -> usize {
        let n = self.dfa.states();
        let mut dist = vec![usize::MAX; n];
        dist[0] = 0;
        let mut queue = std::collections::VecDeque::from([0]);
        while let Some(s) = queue.pop_front() {
            if self.dfa.accepting[s] {
                return dist[s];
            }
            for tr in &self.dfa.transitions[s] {
                if dist[tr.target] == usize::MAX {
                    dist[tr.target] = dist[s] + 1;
                    queue.push_back(tr.target);
                }
            }
        }
        0
    }

    /// Length of the longest string, or `None` for infinite languages.
    fn max_length(&self) -> Option<usize> {
        if self.dfa.has_cycle() {
            return None;
        }
        fn longest(dfa: &Dfa, s: StateId, memo: &mut Vec<Option<usize>>) -> usize {
            if let Some(v) = memo[s] {
                return v;
            }
            let v = dfa.transitions[s]
                .iter()
                .map(|tr| 1 + longest(dfa, tr.target, memo))
                .max()
                .unwrap_or(0);
            memo[s] = Some(v);
            v
        }
        let mut memo = vec![None; self.dfa.states()];
        Some(longest(&self.dfa, 0, &mut memo))
    }

    /// The strings of the language, or `None` if it is infinite or has more than `limit`.
    pub fn finite_strings(&self, limit: usize) -> Option<BTreeSet<String>> {
        if self.dfa.has_cycle() {
            return None;
        }
        fn walk(dfa: &Dfa, s: StateId, prefix: &mut String, out: &mut BTreeSet<String>, limit: usize) -> bool {
            if dfa.accepting[s] {
                out.insert(prefix.clone());
                if out.len() > limit {
                    return false;
                }
            }
            for tr in &dfa.transitions[s] {
                let Some(chars) = tr.label.chars(limit) else {
                    return false;
                };
                for c in chars {
                    prefix.push(c);
                    let ok = walk(dfa, tr.target, prefix, out, limit);
                    prefix.pop();
                    if !ok {
                        return false;
                    }
                }
            }
            true
        }
        let mut out = BTreeSet::new();
        if walk(&self.dfa, 0, &mut String::new(), &mut out, limit) {
            Some(out)
        } else {
            None
        }
    }

    /// The only string of the language, if it has exactly one.
    pub fn single_string(&self) -> Option<String> {
        let strings = self.finite_strings(1)?;
        if strings.len() == 1 {
            strings.into_iter().next()
        } else {
            None
        }
    }

    /// Number of strings in the language, or `None` if it is infinite.
    pub fn count_strings(&self) -> Option<BigUint> {
        if self.dfa.has_cycle() {
            return None;
        }
        fn count(dfa: &Dfa, s: StateId, memo: &mut Vec<Option<BigUint>>) -> BigUint {
            if let Some(v) = &memo[s] {
                return v.clone();
            }
            let mut total = BigUint::from(u8::from(dfa.accepting[s]));
            for tr in &dfa.transitions[s] {
                total += BigUint::from(tr.label.len()) * count(dfa, tr.target, memo);
            }
            memo[s] = Some(total.clone());
            total
        }
        let mut memo = vec![None; self.dfa.states()];
        Some(count(&self.dfa, 0, &mut memo))
    }

    fn enumerate(&self) -> Option<BTreeSet<String>> {
        self.finite_strings(Self::ENUMERATION_LIMIT)
    }

    /// Every string of `self` satisfies `check(s, t)` for every string `t` of `other`,
    /// where the strings of `other` are enumerated and each one is turned into a
    /// language by `pattern`.
    fn definitely<F>(&self, other: &Self, pattern: F) -> bool
    where
        F: Fn(&str) -> AutomatonString,
    {
        if self.is_empty_language() {
            return false;
        }
        match other.enumerate() {
            Some(needles) if !needles.is_empty() => needles.iter().all(|t| self.is_contained_in(&pattern(t))),
            _ => false,
        }
    }

    /// Every string of `self` contains every string of `other`.
    pub fn contains(&self, other: &Self) -> bool {
        let top = Self::top();
        self.definitely(other, |t| top.concat(&Self::from_literal(t)).concat(&top))
    }

    /// Some string of `self` contains some string of `other`.
    pub fn may_contain(&self, other: &Self) -> bool {
        !self.factors().intersection(other).is_empty_language()
    }

    /// Every string of `self` starts with every string of `other`.
    pub fn starts_with(&self, other: &Self) -> bool {
        self.definitely(other, |t| Self::from_literal(t).concat(&Self::top()))
    }

    pub fn may_start_with(&self, other: &Self) -> bool {
        !self.prefixes().intersection(other).is_empty_language()
    }

    /// Every string of `self` ends with every string of `other`.
    pub fn ends_with(&self, other: &Self) -> bool {
        self.definitely(other, |t| Self::top().concat(&Self::from_literal(t)))
    }

    pub fn may_end_with(&self, other: &Self) -> bool {
        !self.suffixes().intersection(other).is_empty_language()
    }

    /// Bounds on the character index of the first occurrence of a string of `other` in
    /// a string of `self`; `-1` stands for "not found".
    pub fn index_of(&self, other: &Self) -> Interval {
        if self.is_empty_language() || other.is_empty_language() {
            return Interval::bottom();
        }
        if !self.may_contain(other) {
            return Interval::singleton(-1);
        }
        if let (Some(haystacks), Some(needles)) = (self.enumerate(), other.enumerate()) {
            let needles = &needles;
            let indices = haystacks.iter().flat_map(|s| {
                needles.iter().map(move |t| match s.find(t.as_str()) {
                    Some(byte) => s[..byte].chars().count() as i64,
                    None => -1,
                })
            });
            return indices.fold(Interval::bottom(), |acc, i| acc.lub(&Interval::singleton(i)));
        }
        let low = if self.contains(other) { 0 } else { -1 };
        let high = self
            .length()
            .high()
            .sub(&Bound::Finite(other.min_length() as i64));
        Interval::from_bounds(Bound::Finite(low), high.max(Bound::Finite(low)))
    }

    /// Replaces every occurrence of a string of `search` by a string of `replacement`.
    pub fn replace(&self, search: &Self, replacement: &Self) -> Self {
        if self.is_empty_language() || search.is_empty_language() || replacement.is_empty_language() {
            return Self::empty();
        }
        if !self.may_contain(search) {
            return self.clone();
        }
        if let (Some(subjects), Some(searches), Some(replacements)) =
            (self.enumerate(), search.enumerate(), replacement.enumerate())
        {
            if subjects.len() * searches.len() * replacements.len() <= Self::ENUMERATION_LIMIT {
                let (searches, replacements) = (&searches, &replacements);
                let results = subjects.iter().flat_map(|s| {
                    searches
                        .iter()
                        .flat_map(move |t| replacements.iter().map(move |r| s.replace(t.as_str(), r)))
                });
                return Self::from_strings(results);
            }
        }
        Self::top()
    }

    /// Union, collapsed to `C*` once the result grows past [`Self::WIDENING_THRESHOLD`]
    /// states.
    pub fn widen(&self, other: &Self) -> Self {
        if other.is_contained_in(self) {
            return self.clone();
        }
        let joined = self.union(other);
        if joined.states() > Self::WIDENING_THRESHOLD {
            trace!("widening: {} states, collapsing to star", joined.states());
            Self::star(joined.alphabet())
        } else {
            joined
        }
    }
}

impl Lattice for AutomatonString {
    fn top() -> Self {
        AutomatonString::top()
    }

    fn bottom() -> Self {
        AutomatonString::empty()
    }

    fn is_top(&self) -> bool {
        AutomatonString::is_top(self)
    }

    fn is_bottom(&self) -> bool {
        self.is_empty_language()
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self.is_contained_in(other)
    }

    fn lub(&self, other: &Self) -> Self {
        self.union(other)
    }

    fn glb(&self, other: &Self) -> Self {
        self.intersection(other)
    }

    fn widening(&self, other: &Self) -> Self {
        self.widen(other)
    }
}

impl fmt::Display for AutomatonString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_top() {
            return write!(f, "Σ*");
        }
        if let Some(strings) = self.finite_strings(8) {
            let items = strings.iter().map(|s| format!("{:?}", s)).collect::<Vec<_>>();
            return write!(f, "{{{}}}", items.join(", "));
        }
        let alphabet = self.alphabet();
        if self.dfa == Dfa::star(alphabet.clone()).minimize() {
            return write!(f, "{}*", alphabet);
        }
        write!(f, "<{} states over {}>", self.states(), alphabet)
    }
}
