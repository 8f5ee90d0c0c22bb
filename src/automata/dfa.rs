//! Symbolic finite automata over [`CharClass`] labels.
//!
//! [`Nfa`] is only a builder: every construction ends with [`Nfa::determinize`] and
//! [`Dfa::minimize`], which together yield a canonical automaton (trimmed, minimal, states
//! numbered in breadth-first order). Two canonical automata are structurally equal iff
//! they accept the same language.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use log::trace;

use super::charclass::{build_minterms, minterm_within, CharClass};

pub type StateId = usize;

/// An edge of a symbolic automaton, taken on any character of `label`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolicTransition {
    pub label: CharClass,
    pub target: StateId,
}

/// Nondeterministic symbolic automaton without epsilon edges.
#[derive(Clone, Debug)]
pub struct Nfa {
    pub start: StateId,
    pub accepting: Vec<bool>,
    pub transitions: Vec<Vec<SymbolicTransition>>,
}

impl Default for Nfa {
    fn default() -> Self {
        Nfa::new()
    }
}

impl Nfa {
    /// A single non-accepting start state.
    pub fn new() -> Self {
        Nfa {
            start: 0,
            accepting: vec![false],
            transitions: vec![Vec::new()],
        }
    }

    /// An NFA with the same states and edges as `dfa`.
    pub fn from_dfa(dfa: &Dfa) -> Self {
        Nfa {
            start: 0,
            accepting: dfa.accepting.clone(),
            transitions: dfa.transitions.clone(),
        }
    }

    pub fn states(&self) -> usize {
        self.accepting.len()
    }

    pub fn add_state(&mut self, accepting: bool) -> StateId {
        self.accepting.push(accepting);
        self.transitions.push(Vec::new());
        self.accepting.len() - 1
    }

    pub fn add_transition(&mut self, from: StateId, label: CharClass, to: StateId) {
        if !label.is_empty() {
            self.transitions[from].push(SymbolicTransition { label, target: to });
        }
    }

    /// Copies all states of `dfa` into this automaton, returning the offset of its states.
    pub fn embed(&mut self, dfa: &Dfa) -> StateId {
        let offset = self.states();
        for (s, &acc) in dfa.accepting.iter().enumerate() {
            let id = self.add_state(acc);
            debug_assert_eq!(id, offset + s);
        }
        for (s, trs) in dfa.transitions.iter().enumerate() {
            for tr in trs {
                self.add_transition(offset + s, tr.label.clone(), offset + tr.target);
            }
        }
        offset
    }

    /// Subset construction over the minterms of all labels.
    pub fn determinize(&self) -> Dfa {
        let minterms = build_minterms(self.transitions.iter().flatten().map(|tr| &tr.label));

        let step = |set: &BTreeSet<StateId>, minterm: &CharClass| -> BTreeSet<StateId> {
            set.iter()
                .flat_map(|&s| self.transitions[s].iter())
                .filter(|tr| minterm_within(minterm, &tr.label))
                .map(|tr| tr.target)
                .collect()
        };

        let start_set: BTreeSet<StateId> = [self.start].into_iter().collect();
        let mut sets = vec![start_set.clone()];
        let mut index: HashMap<BTreeSet<StateId>, StateId> = HashMap::new();
        index.insert(start_set, 0);
        let mut edges: Vec<Vec<SymbolicTransition>> = vec![Vec::new()];
        let mut queue = VecDeque::from([0usize]);

        while let Some(id) = queue.pop_front() {
            let set = sets[id].clone();
            for minterm in &minterms {
                let target = step(&set, minterm);
                if target.is_empty() {
                    continue;
                }
                let tid = match index.get(&target) {
                    Some(&tid) => tid,
                    None => {
                        let tid = sets.len();
                        index.insert(target.clone(), tid);
                        sets.push(target);
                        edges.push(Vec::new());
                        queue.push_back(tid);
                        tid
                    }
                };
                edges[id].push(SymbolicTransition {
                    label: minterm.clone(),
                    target: tid,
                });
            }
        }

        let accepting = sets.iter().map(|set| set.iter().any(|&s| self.accepting[s])).collect();
        trace!("determinize: {} NFA states -> {} DFA states", self.states(), sets.len());
        Dfa {
            accepting,
            transitions: edges,
        }
    }
}

/// Deterministic symbolic automaton with start state `0`.
///
/// The automaton may be partial: a missing edge leads to an implicit rejecting sink.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dfa {
    pub accepting: Vec<bool>,
    pub transitions: Vec<Vec<SymbolicTransition>>,
}

impl Dfa {
    /// The empty language.
    pub fn empty() -> Self {
        Dfa {
            accepting: vec![false],
            transitions: vec![Vec::new()],
        }
    }

    /// The language of all strings.
    pub fn universal() -> Self {
        Dfa::star(CharClass::full())
    }

    /// `label*`
    pub fn star(label: CharClass) -> Self {
        let mut dfa = Dfa {
            accepting: vec![true],
            transitions: vec![Vec::new()],
        };
        if !label.is_empty() {
            dfa.transitions[0].push(SymbolicTransition { label, target: 0 });
        }
        dfa
    }

    /// The language `{s}`.
    pub fn literal(s: &str) -> Self {
        let chars = s.chars().collect::<Vec<_>>();
        let mut transitions = Vec::with_capacity(chars.len() + 1);
        for (i, &c) in chars.iter().enumerate() {
            transitions.push(vec![SymbolicTransition {
                label: CharClass::single(c),
                target: i + 1,
            }]);
        }
        transitions.push(Vec::new());
        let mut accepting = vec![false; chars.len() + 1];
        accepting[chars.len()] = true;
        Dfa { accepting, transitions }
    }

    pub fn states(&self) -> usize {
        self.accepting.len()
    }

    pub fn step(&self, state: StateId, c: char) -> Option<StateId> {
        self.transitions[state].iter().find(|tr| tr.label.contains(c)).map(|tr| tr.target)
    }

    pub fn accepts(&self, input: &str) -> bool {
        let mut cur = 0;
        for ch in input.chars() {
            match self.step(cur, ch) {
                Some(next) => cur = next,
                None => return false,
            }
        }
        self.accepting[cur]
    }

    /// Union of all edge labels.
    pub fn alphabet(&self) -> CharClass {
        self.transitions
            .iter()
            .flatten()
            .fold(CharClass::empty(), |acc, tr| acc.or(&tr.label))
    }

    fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.states()];
        seen[0] = true;
        let mut queue = VecDeque::from([0]);
        while let Some(s) = queue.pop_front() {
            for tr in &self.transitions[s] {
                if !seen[tr.target] {
                    seen[tr.target] = true;
                    queue.push_back(tr.target);
                }
            }
        }
        seen
    }

    /// States from which an accepting state can be reached.
    pub fn co_reachable(&self) -> Vec<bool> {
        let mut preds: Vec<Vec<StateId>> = vec![Vec::new(); self.states()];
        for (s, trs) in self.transitions.iter().enumerate() {
            for tr in trs {
                preds[tr.target].push(s);
            }
        }
        let mut seen = self.accepting.clone();
        let mut queue = (0..self.states()).filter(|&s| seen[s]).collect::<VecDeque<_>>();
        while let Some(s) = queue.pop_front() {
            for &p in &preds[s] {
                if !seen[p] {
                    seen[p] = true;
                    queue.push_back(p);
                }
            }
        }
        seen
    }

    pub fn is_empty_lang(&self) -> bool {
        let reachable = self.reachable();
        !(0..self.states()).any(|s| reachable[s] && self.accepting[s])
    }

    /// Adds a rejecting sink so that every state has an edge on every character.
    pub fn complete(&self) -> Dfa {
        let mut out = self.clone();
        let sink = out.states();
        let mut needs_sink = false;
        for s in 0..self.states() {
            let covered = self.transitions[s].iter().fold(CharClass::empty(), |acc, tr| acc.or(&tr.label));
            let missing = covered.not();
            if !missing.is_empty() {
                needs_sink = true;
                out.transitions[s].push(SymbolicTransition {
                    label: missing,
                    target: sink,
                });
            }
        }
        if needs_sink {
            out.accepting.push(false);
            out.transitions.push(vec![SymbolicTransition {
                label: CharClass::full(),
                target: sink,
            }]);
        }
        out
    }

    pub fn complement(&self) -> Dfa {
        let mut out = self.complete();
        for a in &mut out.accepting {
            *a = !*a;
        }
        out.minimize()
    }

    pub fn union(&self, other: &Dfa) -> Dfa {
        self.product(other, |a, b| a || b)
    }

    pub fn intersection(&self, other: &Dfa) -> Dfa {
        self.product(other, |a, b| a && b)
    }

    /// Product construction over partial automata; a missing side is the rejecting sink.
    fn product<F>(&self, other: &Dfa, accept_op: F) -> Dfa
    where
        F: Fn(bool, bool) -> bool,
    {
        let labels = self.transitions.iter().chain(other.transitions.iter()).flatten().map(|tr| &tr.label);
        let minterms = build_minterms(labels);

        let mut index: HashMap<(Option<StateId>, Option<StateId>), StateId> = HashMap::new();
        let mut pairs = vec![(Some(0), Some(0))];
        index.insert((Some(0), Some(0)), 0);
        let mut edges: Vec<Vec<SymbolicTransition>> = vec![Vec::new()];
        let mut queue = VecDeque::from([0usize]);

        while let Some(id) = queue.pop_front() {
            let (a, b) = pairs[id];
            for minterm in &minterms {
                let ta = a.and_then(|q| self.step_minterm(q, minterm));
                let tb = b.and_then(|q| other.step_minterm(q, minterm));
                if ta.is_none() && tb.is_none() {
                    continue;
                }
                let tid = *index.entry((ta, tb)).or_insert_with(|| {
                    pairs.push((ta, tb));
                    edges.push(Vec::new());
                    queue.push_back(pairs.len() - 1);
                    pairs.len() - 1
                });
                edges[id].push(SymbolicTransition {
                    label: minterm.clone(),
                    target: tid,
                });
            }
        }

        let accepting = pairs
            .iter()
            .map(|&(a, b)| {
                let a = a.is_some_and(|q| self.accepting[q]);
                let b = b.is_some_and(|q| other.accepting[q]);
                accept_op(a, b)
            })
            .collect();
        Dfa {
            accepting,
            transitions: edges,
        }
        .minimize()
    }

    fn step_minterm(&self, q: StateId, minterm: &CharClass) -> Option<StateId> {
        self.transitions[q]
            .iter()
            .find(|tr| minterm_within(minterm, &tr.label))
            .map(|tr| tr.target)
    }

    /// Language inclusion: `self ∩ ¬other = ∅`.
    pub fn is_subset_of(&self, other: &Dfa) -> bool {
        self.intersection(&other.complement()).is_empty_lang()
    }

    /// Removes useless states, merges equivalent ones (Moore partition refinement) and
    /// renumbers the result canonically.
    pub fn minimize(&self) -> Dfa {
        let trimmed = self.trim();
        let n = trimmed.states();
        let minterms = build_minterms(trimmed.transitions.iter().flatten().map(|tr| &tr.label));

        let mut block: Vec<usize> = trimmed.accepting.iter().map(|&a| usize::from(a)).collect();
        let mut count = block.iter().collect::<BTreeSet<_>>().len();
        loop {
            let mut signatures: BTreeMap<(usize, Vec<Option<usize>>), usize> = BTreeMap::new();
            let mut next = vec![0; n];
            for s in 0..n {
                let sig = minterms
                    .iter()
                    .map(|m| trimmed.step_minterm(s, m).map(|t| block[t]))
                    .collect::<Vec<_>>();
                let fresh = signatures.len();
                next[s] = *signatures.entry((block[s], sig)).or_insert(fresh);
            }
            let new_count = signatures.len();
            block = next;
            if new_count == count {
                break;
            }
            count = new_count;
        }

        let mut merged = Dfa {
            accepting: vec![false; count],
            transitions: vec![Vec::new(); count],
        };
        for s in 0..n {
            let b = block[s];
            merged.accepting[b] = trimmed.accepting[s];
            if merged.transitions[b].is_empty() {
                merged.transitions[b] = trimmed.transitions[s]
                    .iter()
                    .map(|tr| SymbolicTransition {
                        label: tr.label.clone(),
                        target: block[tr.target],
                    })
                    .collect();
            }
        }
        // State 0 must stay the start state.
        merged.renumber_from(block.first().copied().unwrap_or(0))
    }

    /// Keeps the states that are reachable from the start and co-reachable.
    fn trim(&self) -> Dfa {
        let reachable = self.reachable();
        let co = self.co_reachable();
        if !co[0] {
            return Dfa::empty();
        }
        let useful = (0..self.states()).map(|s| reachable[s] && co[s]).collect::<Vec<_>>();
        let mut map = vec![None; self.states()];
        let mut next = 0;
        for s in 0..self.states() {
            if useful[s] {
                map[s] = Some(next);
                next += 1;
            }
        }
        let mut out = Dfa {
            accepting: Vec::with_capacity(next),
            transitions: Vec::with_capacity(next),
        };
        for s in (0..self.states()).filter(|&s| useful[s]) {
            out.accepting.push(self.accepting[s]);
            out.transitions.push(
                self.transitions[s]
                    .iter()
                    .filter_map(|tr| {
                        map[tr.target].map(|target| SymbolicTransition {
                            label: tr.label.clone(),
                            target,
                        })
                    })
                    .collect(),
            );
        }
        out
    }

    /// Canonical form: edges to the same target merged, edges sorted by label, states
    /// numbered in breadth-first order from `start`.
    fn renumber_from(&self, start: StateId) -> Dfa {
        let merged_edges = |s: StateId| -> Vec<SymbolicTransition> {
            let mut by_target: BTreeMap<StateId, CharClass> = BTreeMap::new();
            for tr in &self.transitions[s] {
                let entry = by_target.entry(tr.target).or_insert_with(CharClass::empty);
                *entry = entry.or(&tr.label);
            }
            let mut edges = by_target
                .into_iter()
                .map(|(target, label)| SymbolicTransition { label, target })
                .collect::<Vec<_>>();
            edges.sort_by(|a, b| a.label.cmp(&b.label));
            edges
        };

        let mut order = vec![start];
        let mut map: HashMap<StateId, StateId> = HashMap::from([(start, 0)]);
        let mut i = 0;
        while i < order.len() {
            for tr in merged_edges(order[i]) {
                if !map.contains_key(&tr.target) {
                    map.insert(tr.target, order.len());
                    order.push(tr.target);
                }
            }
            i += 1;
        }

        let mut out = Dfa {
            accepting: Vec::with_capacity(order.len()),
            transitions: Vec::with_capacity(order.len()),
        };
        for &old in &order {
            out.accepting.push(self.accepting[old]);
            out.transitions.push(
                merged_edges(old)
                    .into_iter()
                    .map(|tr| SymbolicTransition {
                        label: tr.label,
                        target: map[&tr.target],
                    })
                    .collect(),
            );
        }
        out
    }

    /// Whether the (trimmed) automaton has a cycle, i.e. accepts infinitely many strings.
    pub fn has_cycle(&self) -> bool {
        // 0 = unvisited, 1 = on stack, 2 = done
        let mut color = vec![0u8; self.states()];
        let mut stack: Vec<(StateId, usize)> = vec![(0, 0)];
        color[0] = 1;
        while let Some((s, i)) = stack.pop() {
            if let Some(tr) = self.transitions[s].get(i) {
                stack.push((s, i + 1));
                match color[tr.target] {
                    1 => return true,
                    0 => {
                        color[tr.target] = 1;
                        stack.push((tr.target, 0));
                    }
                    _ => {}
                }
            } else {
                color[s] = 2;
            }
        }
        false
    }

    /// States reachable from the start by reading exactly `n` characters.
    ///
    /// The sequence of state sets is eventually periodic, so only a prefix and one
    /// period of it are ever computed.
    pub fn states_after(&self, n: usize) -> BTreeSet<StateId> {
        let mut history: Vec<BTreeSet<StateId>> = vec![[0].into_iter().collect()];
        let mut seen: BTreeMap<BTreeSet<StateId>, usize> = BTreeMap::new();
        seen.insert(history[0].clone(), 0);
        for step in 1..=n {
            let next = history[step - 1]
                .iter()
                .flat_map(|&s| self.transitions[s].iter().map(|tr| tr.target))
                .collect::<BTreeSet<_>>();
            if let Some(&first) = seen.get(&next) {
                let period = step - first;
                trace!("states_after({}): period {} from step {}", n, period, first);
                return history[first + (n - first) % period].clone();
            }
            seen.insert(next.clone(), step);
            history.push(next);
        }
        history.pop().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_literal_and_star() {
        let abc = Dfa::literal("abc");
        assert!(abc.accepts("abc"));
        assert!(!abc.accepts("ab"));
        assert!(!abc.accepts("abcd"));

        let a_star = Dfa::star(CharClass::single('a'));
        assert!(a_star.accepts(""));
        assert!(a_star.accepts("aaaa"));
        assert!(!a_star.accepts("ab"));
    }

    #[test]
    fn test_determinize() {
        // (a|ab): two edges on 'a' from the start
        let mut nfa = Nfa::new();
        let s1 = nfa.add_state(true);
        let s2 = nfa.add_state(false);
        let s3 = nfa.add_state(true);
        nfa.add_transition(0, CharClass::single('a'), s1);
        nfa.add_transition(0, CharClass::single('a'), s2);
        nfa.add_transition(s2, CharClass::single('b'), s3);
        let dfa = nfa.determinize();
        assert!(dfa.accepts("a"));
        assert!(dfa.accepts("ab"));
        assert!(!dfa.accepts("b"));
        for s in 0..dfa.states() {
            let labels = &dfa.transitions[s];
            for (i, a) in labels.iter().enumerate() {
                for b in &labels[i + 1..] {
                    assert!(!a.label.intersects(&b.label));
                }
            }
        }
    }

    #[test]
    fn test_complement() {
        let dfa = Dfa::literal("a");
        let compl = dfa.complement();
        assert!(!compl.accepts("a"));
        assert!(compl.accepts("b"));
        assert!(compl.accepts("aa"));
        assert!(compl.accepts(""));
        assert!(Dfa::universal().complement().is_empty_lang());
    }

    #[test]
    fn test_union_intersection() {
        let a_plus = Dfa::literal("a").union(&Dfa::literal("aa"));
        let b = Dfa::literal("b");
        let joined = a_plus.union(&b);
        assert!(joined.accepts("a") && joined.accepts("aa") && joined.accepts("b"));
        assert!(!joined.accepts("ab"));
        assert!(a_plus.intersection(&b).is_empty_lang());
        assert!(Dfa::literal("a").is_subset_of(&a_plus));
        assert!(!a_plus.is_subset_of(&Dfa::literal("a")));
    }

    #[test]
    fn test_minimize_is_canonical() {
        let x = Dfa::literal("ab").union(&Dfa::literal("cb"));
        let y = Dfa::literal("cb").union(&Dfa::literal("ab"));
        assert_eq!(x, y);
        // "ab" | "cb" needs three states: start, middle, accept
        assert_eq!(x.states(), 3);
        assert_eq!(Dfa::universal().union(&Dfa::literal("q")), Dfa::universal().minimize());
    }

    #[test]
    fn test_cycle_and_layers() {
        assert!(!Dfa::literal("abc").minimize().has_cycle());
        assert!(Dfa::star(CharClass::single('a')).has_cycle());
        let abc = Dfa::literal("abc").minimize();
        assert_eq!(abc.states_after(2).len(), 1);
        assert!(abc.states_after(4).is_empty());
        assert!(abc.states_after(usize::MAX).is_empty());
    }

    #[test]
    fn test_states_after_far_index() {
        // (ab)*: start state on even lengths, the other one on odd lengths
        let ab_star = Dfa {
            accepting: vec![true, false],
            transitions: vec![
                vec![SymbolicTransition { label: CharClass::single('a'), target: 1 }],
                vec![SymbolicTransition { label: CharClass::single('b'), target: 0 }],
            ],
        };
        assert_eq!(ab_star.states_after(0), BTreeSet::from([0]));
        assert_eq!(ab_star.states_after(1_000_000_000_000), BTreeSet::from([0]));
        assert_eq!(ab_star.states_after(1_000_000_000_001), ab_star.states_after(1));
        assert_ne!(ab_star.states_after(1), ab_star.states_after(2));

        let a_star = Dfa::star(CharClass::single('a'));
        assert_eq!(a_star.states_after(usize::MAX), BTreeSet::from([0]));
    }
}
