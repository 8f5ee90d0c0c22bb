//! Character classes: the labels on automaton edges.

use std::collections::BTreeSet;
use std::fmt;

const MAX_CODE: u32 = 0x10FFFF;
const SURROGATES: (u32, u32) = (0xD800, 0xDFFF);

/// A set of Unicode scalar values, stored as sorted disjoint ranges.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct CharClass {
    // invariant: ranges are disjoint, sorted, non-adjacent
    ranges: Vec<(u32, u32)>,
}

impl CharClass {
    pub fn empty() -> Self {
        CharClass { ranges: Vec::new() }
    }

    /// Every character.
    pub fn full() -> Self {
        CharClass {
            ranges: vec![(0, MAX_CODE)],
        }
    }

    /// Normalizes arbitrary (possibly overlapping, unsorted) inclusive ranges.
    pub fn from_ranges(mut ranges: Vec<(u32, u32)>) -> Self {
        ranges.sort_unstable();
        let mut out = Vec::<(u32, u32)>::new();
        for (a, b) in ranges {
            if a > b {
                continue;
            }
            if let Some(last) = out.last_mut() {
                if a <= last.1.saturating_add(1) {
                    if b > last.1 {
                        last.1 = b;
                    }
                    continue;
                }
            }
            out.push((a, b));
        }
        CharClass { ranges: out }
    }

    pub fn single(ch: char) -> Self {
        let u = ch as u32;
        CharClass { ranges: vec![(u, u)] }
    }

    pub fn range(a: char, b: char) -> Self {
        CharClass::from_ranges(vec![(a as u32, b as u32)])
    }

    pub fn contains(&self, c: char) -> bool {
        self.contains_code(c as u32)
    }

    fn contains_code(&self, u: u32) -> bool {
        self.ranges
            .binary_search_by(|&(s, e)| {
                if u < s {
                    std::cmp::Ordering::Greater
                } else if u > e {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn and(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        let mut i = 0usize;
        let mut j = 0usize;
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a1, b1) = self.ranges[i];
            let (a2, b2) = other.ranges[j];
            let lo = a1.max(a2);
            let hi = b1.min(b2);
            if lo <= hi {
                out.push((lo, hi));
            }
            if b1 < b2 {
                i += 1;
            } else {
                j += 1;
            }
        }
        CharClass::from_ranges(out)
    }

    pub fn or(&self, other: &Self) -> Self {
        let mut all = self.ranges.clone();
        all.extend(other.ranges.iter());
        CharClass::from_ranges(all)
    }

    pub fn not(&self) -> Self {
        let mut out = Vec::new();
        let mut cur = 0u32;
        for &(s, e) in &self.ranges {
            if cur < s {
                out.push((cur, s - 1));
            }
            cur = e + 1;
        }
        if cur <= MAX_CODE {
            out.push((cur, MAX_CODE));
        }
        CharClass::from_ranges(out)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn intersects(&self, other: &Self) -> bool {
        !self.and(other).is_empty()
    }

    /// Number of characters in the class (surrogate code points are not characters).
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|&(s, e)| {
                let total = (e - s) as u64 + 1;
                let lo = s.max(SURROGATES.0);
                let hi = e.min(SURROGATES.1);
                let excluded = if lo <= hi { (hi - lo) as u64 + 1 } else { 0 };
                total - excluded
            })
            .sum()
    }

    /// The characters of the class, or `None` if there are more than `limit`.
    pub fn chars(&self, limit: usize) -> Option<Vec<char>> {
        if self.len() > limit as u64 {
            return None;
        }
        Some(
            self.ranges
                .iter()
                .flat_map(|&(s, e)| (s..=e).filter_map(char::from_u32))
                .collect(),
        )
    }

    /// The only character of the class, if it has exactly one.
    pub fn as_single(&self) -> Option<char> {
        match self.ranges.as_slice() {
            [(s, e)] if s == e => char::from_u32(*s),
            _ => None,
        }
    }

    /// Some character of the class.
    fn representative(&self) -> Option<char> {
        self.ranges
            .iter()
            .find_map(|&(s, e)| (s..=e).find_map(char::from_u32))
    }
}

impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = self.as_single() {
            return write!(f, "{:?}", c);
        }
        if self == &CharClass::full() {
            return write!(f, ".");
        }
        write!(f, "[")?;
        for &(s, e) in &self.ranges {
            let s = char::from_u32(s).unwrap_or(char::REPLACEMENT_CHARACTER);
            let e = char::from_u32(e).unwrap_or(char::REPLACEMENT_CHARACTER);
            if s == e {
                write!(f, "{}", s.escape_debug())?;
            } else {
                write!(f, "{}-{}", s.escape_debug(), e.escape_debug())?;
            }
        }
        write!(f, "]")
    }
}

/// Splits the characters covered by `labels` into disjoint minterms.
///
/// Every label is either a superset of a minterm or disjoint from it, and the union of
/// the minterms is the union of the labels.
pub fn build_minterms<'a, I>(labels: I) -> Vec<CharClass>
where
    I: IntoIterator<Item = &'a CharClass>,
{
    let labels = labels.into_iter().collect::<BTreeSet<_>>();
    let mut boundaries: BTreeSet<u32> = BTreeSet::new();
    for label in &labels {
        for &(a, b) in &label.ranges {
            boundaries.insert(a);
            if b < MAX_CODE {
                boundaries.insert(b + 1);
            }
        }
    }
    let boundaries = boundaries.into_iter().collect::<Vec<_>>();

    // Atoms with the same membership signature are merged into one minterm.
    let mut by_signature: std::collections::BTreeMap<Vec<bool>, Vec<(u32, u32)>> = Default::default();
    for (i, &start) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).map_or(MAX_CODE, |next| next - 1);
        let signature = labels.iter().map(|l| l.contains_code(start)).collect::<Vec<_>>();
        if signature.iter().any(|&b| b) {
            by_signature.entry(signature).or_default().push((start, end));
        }
    }
    let mut minterms = by_signature
        .into_values()
        .map(CharClass::from_ranges)
        .filter(|m| m.representative().is_some())
        .collect::<Vec<_>>();
    minterms.sort();
    minterms
}

/// Whether a minterm lies inside `label`.
pub(crate) fn minterm_within(minterm: &CharClass, label: &CharClass) -> bool {
    minterm.ranges.first().is_some_and(|&(s, _)| label.contains_code(s))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_char_class_ops() {
        let c_a = CharClass::single('a');
        let c_b = CharClass::single('b');
        let c_ab = c_a.or(&c_b);

        assert!(c_ab.contains('a'));
        assert!(c_ab.contains('b'));
        assert!(!c_ab.contains('c'));
        assert_eq!(c_ab.len(), 2);

        let c_not_a = c_a.not();
        assert!(!c_not_a.contains('a'));
        assert!(c_not_a.contains('z'));
        assert_eq!(c_not_a.not(), c_a);

        let c_range = CharClass::range('a', 'z');
        assert!(c_range.contains('m'));
        assert!(!c_range.contains('A'));
        assert_eq!(c_range.and(&c_ab), c_ab);
        assert!(c_range.and(&CharClass::single('A')).is_empty());
    }

    #[test]
    fn test_len_skips_surrogates() {
        assert_eq!(CharClass::full().len(), 0x110000 - 0x800);
        assert_eq!(CharClass::range('a', 'c').chars(3), Some(vec!['a', 'b', 'c']));
        assert_eq!(CharClass::range('a', 'z').chars(3), None);
    }

    #[test]
    fn test_minterms_partition() {
        let labels = [CharClass::range('a', 'f'), CharClass::range('d', 'k'), CharClass::single('z')];
        let minterms = build_minterms(labels.iter());
        for (i, m) in minterms.iter().enumerate() {
            for other in &minterms[i + 1..] {
                assert!(!m.intersects(other));
            }
            for l in &labels {
                assert!(minterm_within(m, l) == m.intersects(l));
            }
        }
        let union = minterms.iter().fold(CharClass::empty(), |acc, m| acc.or(m));
        let expected = labels.iter().fold(CharClass::empty(), |acc, l| acc.or(l));
        assert_eq!(union, expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(CharClass::single('a').to_string(), "'a'");
        assert_eq!(CharClass::range('a', 'c').to_string(), "[a-c]");
        assert_eq!(CharClass::full().to_string(), ".");
    }
}
