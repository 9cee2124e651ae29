//! Map-family decision diagrams.
//!
//! An MFDD canonically represents a family of finite maps over an ordered key
//! domain. An internal node `⟨k, take_map, skip⟩` carries one subtree per
//! value bound to `k`:
//!
//! ```text
//! ⟦⟨k, {vᵢ ↦ Tᵢ}, S⟩⟧ = ⋃ᵢ { m ∪ {k ↦ vᵢ} : m ∈ ⟦Tᵢ⟧ } ∪ ⟦S⟧
//! ```
//!
//! Values need only be hashable and equatable, not ordered, so the take map is
//! stored as a small entry list with order-independent equality and hashing;
//! entries whose subtree is `zero` are dropped at construction, and a node
//! whose take map empties out reduces to its skip. The canonicity, ordering,
//! and interning rules are the same as for [`crate::sfdd`].

mod hom;
mod iter;

pub use hom::{MfddHom, MfddInductiveStep, MfddMorphKey};
pub use iter::Members;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

use num_bigint::BigUint;

use crate::cache::{CacheStats, OpCache};
use crate::family::Family;
use crate::reference::Ref;
use crate::storage::{Arena, DEFAULT_BUCKET_CAPACITY};
use crate::utils::{fx_hash64, pairing2, pairing3};

/// An internal MFDD node.
///
/// `take` holds one entry per value bound to `key`; values are unique and
/// entry order carries no meaning.
#[derive(Debug, Clone)]
pub struct MfddNode<K, V> {
    pub key: K,
    pub take: Vec<(V, Ref)>,
    pub skip: Ref,
}

impl<K, V: PartialEq> MfddNode<K, V> {
    /// The subtree bound to `value`, if any.
    pub fn take_for(&self, value: &V) -> Option<Ref> {
        self.take.iter().find(|(v, _)| v == value).map(|(_, t)| *t)
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for MfddNode<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.skip == other.skip
            && self.take.len() == other.take.len()
            && self.take.iter().all(|entry| other.take.contains(entry))
    }
}

impl<K: Eq, V: Eq> Eq for MfddNode<K, V> {}

/// The MFDD factory: owns the node arena and the operation caches.
pub struct Mfdd<K, V> {
    arena: RefCell<Arena<MfddNode<K, V>>>,
    union_cache: RefCell<OpCache>,
    intersection_cache: RefCell<OpCache>,
    symdiff_cache: RefCell<OpCache>,
    subtraction_cache: RefCell<OpCache>,
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    pub fn new(bucket_capacity: usize) -> Self {
        Self {
            arena: RefCell::new(Arena::new(bucket_capacity)),
            union_cache: RefCell::new(OpCache::new()),
            intersection_cache: RefCell::new(OpCache::new()),
            symdiff_cache: RefCell::new(OpCache::new()),
            subtraction_cache: RefCell::new(OpCache::new()),
        }
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Default for Mfdd<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_CAPACITY)
    }
}

impl<K, V> std::fmt::Debug for Mfdd<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arena = self.arena.borrow();
        f.debug_struct("Mfdd")
            .field("bucket_capacity", &arena.bucket_capacity())
            .field("num_buckets", &arena.num_buckets())
            .field("created_count", &arena.len())
            .finish()
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    /// The empty family.
    pub fn zero(&self) -> Ref {
        Ref::ZERO
    }
    /// The family containing only the empty map.
    pub fn one(&self) -> Ref {
        Ref::ONE
    }

    pub fn is_zero(&self, f: Ref) -> bool {
        f == Ref::ZERO
    }
    pub fn is_one(&self, f: Ref) -> bool {
        f == Ref::ONE
    }

    /// Whether the family has no members.
    pub fn is_empty(&self, f: Ref) -> bool {
        f == Ref::ZERO
    }

    /// Number of interned nodes (terminals excluded).
    pub fn created_count(&self) -> usize {
        self.arena.borrow().len()
    }

    /// Hit/miss/entry counters of the operation caches.
    pub fn cache_stats(&self) -> Vec<(&'static str, CacheStats)> {
        vec![
            ("union", self.union_cache.borrow().stats()),
            ("intersection", self.intersection_cache.borrow().stats()),
            ("symmetric_difference", self.symdiff_cache.borrow().stats()),
            ("subtracting", self.subtraction_cache.borrow().stats()),
        ]
    }

    /// The content of an internal node.
    ///
    /// # Panics
    ///
    /// Panics on a terminal handle.
    pub fn node(&self, f: Ref) -> MfddNode<K, V> {
        assert!(!f.is_terminal(), "Terminal handles have no node");
        self.arena.borrow().get(f.arena_index()).clone()
    }

    /// The key of an internal node, `None` for terminals.
    pub fn key(&self, f: Ref) -> Option<K> {
        if f.is_terminal() {
            None
        } else {
            Some(self.arena.borrow().get(f.arena_index()).key.clone())
        }
    }

    pub fn skip(&self, f: Ref) -> Ref {
        assert!(!f.is_terminal(), "Terminal handles have no skip child");
        self.arena.borrow().get(f.arena_index()).skip
    }

    /// Returns the unique handle for `⟨key, take, skip⟩`.
    ///
    /// Entries pointing to `zero` are dropped; a node whose take map empties
    /// out reduces to `skip`. Values must be unique and children must respect
    /// the ordering invariant.
    pub fn mk_node(&self, key: K, take: Vec<(V, Ref)>, skip: Ref) -> Ref {
        let take: Vec<(V, Ref)> = take.into_iter().filter(|(_, t)| *t != Ref::ZERO).collect();
        if take.is_empty() {
            return skip;
        }
        debug_assert!(
            take.iter()
                .enumerate()
                .all(|(i, (v, _))| take[..i].iter().all(|(u, _)| u != v)),
            "Take map values must be unique"
        );
        debug_assert!(
            take.iter().all(|(_, t)| self.key(*t).map_or(true, |k| key < k)),
            "Take child keys must exceed the node key"
        );
        debug_assert!(
            self.key(skip).map_or(true, |k| key < k),
            "Skip child key must exceed the node key"
        );

        // Order-independent take hash, so permuted entry lists intern to one node.
        let take_hash = take
            .iter()
            .fold(0u64, |acc, (v, t)| acc.wrapping_add(pairing2(fx_hash64(v), t.hashy())));
        let hash = pairing3(fx_hash64(&key), take_hash, skip.hashy());
        let index = self.arena.borrow_mut().put(hash, MfddNode { key, take, skip });
        Ref::from_arena(index)
    }

    /// Follows the skip chain down to a terminal.
    ///
    /// The result is `one` exactly when the family contains the empty map.
    pub fn skip_most(&self, f: Ref) -> Ref {
        let mut current = f;
        while !current.is_terminal() {
            current = self.skip(current);
        }
        current
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    pub fn union(&self, f: Ref, g: Ref) -> Ref {
        if f == g || g == Ref::ZERO {
            return f;
        }
        if f == Ref::ZERO {
            return g;
        }

        let key = if f < g { (f, g) } else { (g, f) };
        if let Some(&res) = self.union_cache.borrow().get(&key) {
            return res;
        }

        let res = if f == Ref::ONE {
            let n = self.node(g);
            let skip = self.union(Ref::ONE, n.skip);
            self.mk_node(n.key, n.take, skip)
        } else if g == Ref::ONE {
            let n = self.node(f);
            let skip = self.union(n.skip, Ref::ONE);
            self.mk_node(n.key, n.take, skip)
        } else {
            let a = self.node(f);
            let b = self.node(g);
            match a.key.cmp(&b.key) {
                Ordering::Less => {
                    let skip = self.union(a.skip, g);
                    self.mk_node(a.key, a.take, skip)
                }
                Ordering::Greater => {
                    let skip = self.union(f, b.skip);
                    self.mk_node(b.key, b.take, skip)
                }
                Ordering::Equal => {
                    // Merge the take maps: recurse on shared values, keep the rest.
                    let mut take = a.take.clone();
                    for (v, bt) in b.take {
                        match take.iter().position(|(u, _)| *u == v) {
                            Some(i) => {
                                let merged = self.union(take[i].1, bt);
                                take[i].1 = merged;
                            }
                            None => take.push((v, bt)),
                        }
                    }
                    let skip = self.union(a.skip, b.skip);
                    self.mk_node(a.key, take, skip)
                }
            }
        };

        self.union_cache.borrow_mut().insert(key, res);
        res
    }

    pub fn intersection(&self, f: Ref, g: Ref) -> Ref {
        if f == g {
            return f;
        }
        if f == Ref::ZERO || g == Ref::ZERO {
            return Ref::ZERO;
        }
        // ⟦one⟧ = {∅}: the intersection is {∅} iff the other family contains ∅.
        if f == Ref::ONE {
            return self.skip_most(g);
        }
        if g == Ref::ONE {
            return self.skip_most(f);
        }

        let key = if f < g { (f, g) } else { (g, f) };
        if let Some(&res) = self.intersection_cache.borrow().get(&key) {
            return res;
        }

        let a = self.node(f);
        let b = self.node(g);
        let res = match a.key.cmp(&b.key) {
            Ordering::Less => self.intersection(a.skip, g),
            Ordering::Greater => self.intersection(f, b.skip),
            Ordering::Equal => {
                // Only values bound on both sides survive.
                let mut take = Vec::new();
                for (v, at) in &a.take {
                    if let Some(bt) = b.take_for(v) {
                        take.push((v.clone(), self.intersection(*at, bt)));
                    }
                }
                let skip = self.intersection(a.skip, b.skip);
                self.mk_node(a.key, take, skip)
            }
        };

        self.intersection_cache.borrow_mut().insert(key, res);
        res
    }

    pub fn symmetric_difference(&self, f: Ref, g: Ref) -> Ref {
        if f == g {
            return Ref::ZERO;
        }
        if f == Ref::ZERO {
            return g;
        }
        if g == Ref::ZERO {
            return f;
        }

        let key = if f < g { (f, g) } else { (g, f) };
        if let Some(&res) = self.symdiff_cache.borrow().get(&key) {
            return res;
        }

        let res = if f == Ref::ONE {
            let n = self.node(g);
            let skip = self.symmetric_difference(Ref::ONE, n.skip);
            self.mk_node(n.key, n.take, skip)
        } else if g == Ref::ONE {
            let n = self.node(f);
            let skip = self.symmetric_difference(n.skip, Ref::ONE);
            self.mk_node(n.key, n.take, skip)
        } else {
            let a = self.node(f);
            let b = self.node(g);
            match a.key.cmp(&b.key) {
                Ordering::Less => {
                    let skip = self.symmetric_difference(a.skip, g);
                    self.mk_node(a.key, a.take, skip)
                }
                Ordering::Greater => {
                    let skip = self.symmetric_difference(f, b.skip);
                    self.mk_node(b.key, b.take, skip)
                }
                Ordering::Equal => {
                    // Shared values recurse; one-sided entries pass through.
                    let mut take = Vec::new();
                    for (v, at) in &a.take {
                        match b.take_for(v) {
                            Some(bt) => take.push((v.clone(), self.symmetric_difference(*at, bt))),
                            None => take.push((v.clone(), *at)),
                        }
                    }
                    for (v, bt) in &b.take {
                        if a.take_for(v).is_none() {
                            take.push((v.clone(), *bt));
                        }
                    }
                    let skip = self.symmetric_difference(a.skip, b.skip);
                    self.mk_node(a.key, take, skip)
                }
            }
        };

        self.symdiff_cache.borrow_mut().insert(key, res);
        res
    }

    pub fn subtracting(&self, f: Ref, g: Ref) -> Ref {
        if f == g || f == Ref::ZERO {
            return Ref::ZERO;
        }
        if g == Ref::ZERO {
            return f;
        }
        if f == Ref::ONE {
            return if self.skip_most(g) == Ref::ZERO { Ref::ONE } else { Ref::ZERO };
        }

        let key = (f, g);
        if let Some(&res) = self.subtraction_cache.borrow().get(&key) {
            return res;
        }

        let a = self.node(f);
        let res = if g == Ref::ONE {
            let skip = self.subtracting(a.skip, Ref::ONE);
            self.mk_node(a.key, a.take, skip)
        } else {
            let b = self.node(g);
            match a.key.cmp(&b.key) {
                Ordering::Less => {
                    let skip = self.subtracting(a.skip, g);
                    self.mk_node(a.key, a.take, skip)
                }
                Ordering::Greater => self.subtracting(f, b.skip),
                Ordering::Equal => {
                    // Shared values recurse; a binding present in g only
                    // leaves the left side unchanged.
                    let mut take = Vec::new();
                    for (v, at) in &a.take {
                        match b.take_for(v) {
                            Some(bt) => take.push((v.clone(), self.subtracting(*at, bt))),
                            None => take.push((v.clone(), *at)),
                        }
                    }
                    let skip = self.subtracting(a.skip, b.skip);
                    self.mk_node(a.key, take, skip)
                }
            }
        };

        self.subtraction_cache.borrow_mut().insert(key, res);
        res
    }

    /// Union of arbitrarily many operands; `zero` for an empty list.
    pub fn union_all(&self, operands: &[Ref]) -> Ref {
        operands.iter().fold(Ref::ZERO, |acc, &f| self.union(acc, f))
    }

    /// Intersection of arbitrarily many operands; `zero` for an empty list.
    pub fn intersection_all(&self, operands: &[Ref]) -> Ref {
        match operands.split_first() {
            None => Ref::ZERO,
            Some((&first, rest)) => rest.iter().fold(first, |acc, &f| self.intersection(acc, f)),
        }
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    /// Encodes a collection of members, each an iterable of `(key, value)`
    /// bindings.
    ///
    /// Exact duplicate bindings within a member are de-duplicated; binding one
    /// key to two different values is a precondition failure.
    pub fn encode<M, I>(&self, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut res = Ref::ZERO;
        for member in family {
            let m = self.encode_member(member);
            res = self.union(res, m);
        }
        res
    }

    fn encode_member<I: IntoIterator<Item = (K, V)>>(&self, member: I) -> Ref {
        let assignments = normalized_member(member)
            .expect("Members must not bind one key to two different values");
        let mut current = Ref::ONE;
        for (key, value) in assignments.into_iter().rev() {
            current = self.mk_node(key, vec![(value, current)], Ref::ZERO);
        }
        current
    }

    /// Whether the family contains the given member.
    pub fn contains<I: IntoIterator<Item = (K, V)>>(&self, f: Ref, member: I) -> bool {
        let assignments = match normalized_member(member) {
            Some(assignments) => assignments,
            // A "member" binding a key twice denotes no map at all.
            None => return false,
        };

        let mut index = 0;
        let mut current = f;
        loop {
            if current.is_terminal() {
                return index == assignments.len() && current == Ref::ONE;
            }
            let n = self.node(current);
            if index == assignments.len() {
                current = n.skip;
                continue;
            }
            let (key, value) = &assignments[index];
            match n.key.cmp(key) {
                Ordering::Less => current = n.skip,
                Ordering::Equal => match n.take_for(value) {
                    Some(t) => {
                        index += 1;
                        current = t;
                    }
                    None => return false,
                },
                Ordering::Greater => return false,
            }
        }
    }

    /// Number of members in the family.
    pub fn count(&self, f: Ref) -> BigUint {
        let mut memo = HashMap::new();
        self.count_rec(f, &mut memo)
    }

    fn count_rec(&self, f: Ref, memo: &mut HashMap<Ref, BigUint>) -> BigUint {
        if f == Ref::ZERO {
            return BigUint::ZERO;
        }
        if f == Ref::ONE {
            return BigUint::from(1u32);
        }
        if let Some(res) = memo.get(&f) {
            return res.clone();
        }

        let n = self.node(f);
        let mut res = self.count_rec(n.skip, memo);
        for (_, t) in &n.take {
            res += self.count_rec(*t, memo);
        }
        memo.insert(f, res.clone());
        res
    }

    pub fn is_disjoint(&self, f: Ref, g: Ref) -> bool {
        self.intersection(f, g) == Ref::ZERO
    }

    pub fn is_strict_subset(&self, f: Ref, g: Ref) -> bool {
        f != g && self.subtracting(f, g) == Ref::ZERO
    }

    pub fn is_strict_superset(&self, f: Ref, g: Ref) -> bool {
        self.is_strict_subset(g, f)
    }

    /// `f ∪ encode(family)`.
    pub fn union_members<M, I>(&self, f: Ref, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
    {
        let g = self.encode(family);
        self.union(f, g)
    }

    /// `f ∩ encode(family)`.
    pub fn intersection_members<M, I>(&self, f: Ref, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
    {
        let g = self.encode(family);
        self.intersection(f, g)
    }

    /// `f △ encode(family)`.
    pub fn symmetric_difference_members<M, I>(&self, f: Ref, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
    {
        let g = self.encode(family);
        self.symmetric_difference(f, g)
    }

    /// `f ∖ encode(family)`.
    pub fn subtracting_members<M, I>(&self, f: Ref, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
    {
        let g = self.encode(family);
        self.subtracting(f, g)
    }

    /// All internal nodes reachable from the given roots.
    pub fn descendants(&self, roots: impl IntoIterator<Item = Ref>) -> Vec<Ref> {
        let mut seen = HashSet::new();
        let mut stack: Vec<Ref> = roots.into_iter().collect();
        let mut out = Vec::new();
        while let Some(f) = stack.pop() {
            if f.is_terminal() || !seen.insert(f) {
                continue;
            }
            out.push(f);
            let n = self.node(f);
            for (_, t) in &n.take {
                stack.push(*t);
            }
            stack.push(n.skip);
        }
        out
    }

    /// Number of distinct internal nodes reachable from `f`.
    pub fn size(&self, f: Ref) -> usize {
        self.descendants([f]).len()
    }
}

/// Sorts a member's bindings by key and de-duplicates exact repeats. `None`
/// when one key is bound to two different values.
fn normalized_member<K: Ord, V: Eq, I: IntoIterator<Item = (K, V)>>(member: I) -> Option<Vec<(K, V)>> {
    let mut assignments: Vec<(K, V)> = member.into_iter().collect();
    assignments.sort_by(|(a, _), (b, _)| a.cmp(b));
    let mut out: Vec<(K, V)> = Vec::with_capacity(assignments.len());
    for (k, v) in assignments {
        match out.last() {
            Some((last_key, last_value)) if *last_key == k => {
                if *last_value != v {
                    return None;
                }
            }
            _ => out.push((k, v)),
        }
    }
    Some(out)
}

impl<K, V> Mfdd<K, V>
where
    K: Ord + Hash + Clone + Display,
    V: Eq + Hash + Clone + Display,
{
    /// Compact textual rendering, for debugging and tests.
    pub fn to_bracket_string(&self, f: Ref) -> String {
        if f == Ref::ZERO {
            return "∅".to_string();
        }
        if f == Ref::ONE {
            return "ε".to_string();
        }
        let n = self.node(f);
        let entries: Vec<String> = n
            .take
            .iter()
            .map(|(v, t)| format!("{} ↦ {}", v, self.to_bracket_string(*t)))
            .collect();
        format!("({}: {{{}}}, {})", n.key, entries.join(", "), self.to_bracket_string(n.skip))
    }
}

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Family for Mfdd<K, V> {
    type Key = K;
    type MorphKey = MfddMorphKey<K, V>;

    fn zero(&self) -> Ref {
        Ref::ZERO
    }
    fn one(&self) -> Ref {
        Ref::ONE
    }

    fn union(&self, lhs: Ref, rhs: Ref) -> Ref {
        Mfdd::union(self, lhs, rhs)
    }
    fn intersection(&self, lhs: Ref, rhs: Ref) -> Ref {
        Mfdd::intersection(self, lhs, rhs)
    }
    fn symmetric_difference(&self, lhs: Ref, rhs: Ref) -> Ref {
        Mfdd::symmetric_difference(self, lhs, rhs)
    }
    fn subtracting(&self, lhs: Ref, rhs: Ref) -> Ref {
        Mfdd::subtracting(self, lhs, rhs)
    }
    fn union_all(&self, operands: &[Ref]) -> Ref {
        Mfdd::union_all(self, operands)
    }
    fn intersection_all(&self, operands: &[Ref]) -> Ref {
        Mfdd::intersection_all(self, operands)
    }

    fn key(&self, f: Ref) -> Option<K> {
        Mfdd::key(self, f)
    }

    fn map_children(&self, f: Ref, g: &mut dyn FnMut(Ref) -> Ref) -> Ref {
        let n = self.node(f);
        let take: Vec<(V, Ref)> = n.take.iter().map(|(v, t)| (v.clone(), g(*t))).collect();
        let skip = g(n.skip);
        self.mk_node(n.key, take, skip)
    }
}
