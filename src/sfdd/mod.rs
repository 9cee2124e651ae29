//! Set-family decision diagrams.
//!
//! An SFDD canonically represents a family of sets over an ordered key domain.
//! An internal node `⟨k, take, skip⟩` denotes every member of `take` extended
//! with `k`, together with every member of `skip`:
//!
//! ```text
//! ⟦⟨k, T, S⟩⟧ = { {k} ∪ m : m ∈ ⟦T⟧ } ∪ ⟦S⟧
//! ```
//!
//! The terminals denote the empty family (`zero`) and the family holding only
//! the empty set (`one`). Three invariants make the representation canonical:
//! keys strictly increase along every edge, `take` is never `zero` (such a node
//! reduces to its skip), and identical `(key, take, skip)` content is interned
//! to one node. Handle equality is therefore family equality.
//!
//! All operations go through the [`Sfdd`] factory, which owns the node arena
//! and the per-operation memoization caches behind `RefCell`, so a shared
//! `&Sfdd` is all callers ever need.

mod hom;
mod iter;

pub use hom::{SfddHom, SfddInductiveStep, SfddMorphKey};
pub use iter::Members;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

use log::debug;
use num_bigint::BigUint;

use crate::cache::{CacheStats, OpCache, OpsCache};
use crate::family::Family;
use crate::reference::Ref;
use crate::storage::{Arena, DEFAULT_BUCKET_CAPACITY};
use crate::utils::{fx_hash64, pairing3};

/// An internal SFDD node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfddNode<K> {
    pub key: K,
    pub take: Ref,
    pub skip: Ref,
}

/// The SFDD factory: owns the node arena and the operation caches, and is the
/// only way to create or inspect nodes.
pub struct Sfdd<K> {
    arena: RefCell<Arena<SfddNode<K>>>,
    union_cache: RefCell<OpCache>,
    intersection_cache: RefCell<OpCache>,
    symdiff_cache: RefCell<OpCache>,
    subtraction_cache: RefCell<OpCache>,
    union_all_cache: RefCell<OpsCache>,
    intersection_all_cache: RefCell<OpsCache>,
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
    pub fn new(bucket_capacity: usize) -> Self {
        Self {
            arena: RefCell::new(Arena::new(bucket_capacity)),
            union_cache: RefCell::new(OpCache::new()),
            intersection_cache: RefCell::new(OpCache::new()),
            symdiff_cache: RefCell::new(OpCache::new()),
            subtraction_cache: RefCell::new(OpCache::new()),
            union_all_cache: RefCell::new(OpsCache::new()),
            intersection_all_cache: RefCell::new(OpsCache::new()),
        }
    }
}

impl<K: Ord + Hash + Clone> Default for Sfdd<K> {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_CAPACITY)
    }
}

impl<K> std::fmt::Debug for Sfdd<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arena = self.arena.borrow();
        f.debug_struct("Sfdd")
            .field("bucket_capacity", &arena.bucket_capacity())
            .field("num_buckets", &arena.num_buckets())
            .field("created_count", &arena.len())
            .finish()
    }
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
    /// The empty family.
    pub fn zero(&self) -> Ref {
        Ref::ZERO
    }
    /// The family containing only the empty set.
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
            ("union_all", self.union_all_cache.borrow().stats()),
            ("intersection_all", self.intersection_all_cache.borrow().stats()),
        ]
    }
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
    /// The content of an internal node.
    ///
    /// # Panics
    ///
    /// Panics on a terminal handle.
    pub fn node(&self, f: Ref) -> SfddNode<K> {
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

    pub fn take(&self, f: Ref) -> Ref {
        assert!(!f.is_terminal(), "Terminal handles have no take child");
        self.arena.borrow().get(f.arena_index()).take
    }

    pub fn skip(&self, f: Ref) -> Ref {
        assert!(!f.is_terminal(), "Terminal handles have no skip child");
        self.arena.borrow().get(f.arena_index()).skip
    }

    /// Returns the unique handle for `⟨key, take, skip⟩`.
    ///
    /// A vanishing take reduces to `skip` (zero-suppression). Children must
    /// respect the ordering invariant: any internal child's key exceeds `key`.
    pub fn mk_node(&self, key: K, take: Ref, skip: Ref) -> Ref {
        if take == Ref::ZERO {
            return skip;
        }
        debug_assert!(
            self.key(take).map_or(true, |k| key < k),
            "Take child key must exceed the node key"
        );
        debug_assert!(
            self.key(skip).map_or(true, |k| key < k),
            "Skip child key must exceed the node key"
        );

        let hash = pairing3(fx_hash64(&key), take.hashy(), skip.hashy());
        let index = self.arena.borrow_mut().put(hash, SfddNode { key, take, skip });
        Ref::from_arena(index)
    }

    /// Follows the skip chain down to a terminal.
    ///
    /// The result is `one` exactly when the family contains the empty set.
    pub fn skip_most(&self, f: Ref) -> Ref {
        let mut current = f;
        while !current.is_terminal() {
            current = self.skip(current);
        }
        current
    }
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
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
                    let take = self.union(a.take, b.take);
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
                let take = self.intersection(a.take, b.take);
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
                    let take = self.symmetric_difference(a.take, b.take);
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
            // ∅ survives iff it is not a member of g.
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
                    let take = self.subtracting(a.take, b.take);
                    let skip = self.subtracting(a.skip, b.skip);
                    self.mk_node(a.key, take, skip)
                }
            }
        };

        self.subtraction_cache.borrow_mut().insert(key, res);
        res
    }

    /// Union of arbitrarily many operands.
    ///
    /// Groups the operands by the smallest root key and recurses over the
    /// group's take children and the rest; the canonicalized operand list is
    /// the cache key.
    pub fn union_all(&self, operands: &[Ref]) -> Ref {
        let mut ops: Vec<Ref> = operands.iter().copied().filter(|&f| f != Ref::ZERO).collect();
        ops.sort_unstable();
        ops.dedup();
        match ops.len() {
            0 => return Ref::ZERO,
            1 => return ops[0],
            2 => return self.union(ops[0], ops[1]),
            _ => {}
        }

        if let Some(&res) = self.union_all_cache.borrow().get(&ops) {
            return res;
        }
        debug!("union_all over {} operands", ops.len());

        let mut lowest: Option<K> = None;
        for &f in &ops {
            if let Some(k) = self.key(f) {
                lowest = Some(match lowest {
                    Some(l) if l < k => l,
                    _ => k,
                });
            }
        }
        let lowest = lowest.expect("more than two distinct non-zero operands include an internal node");

        let mut takes = Vec::new();
        let mut rest = Vec::new();
        for &f in &ops {
            match self.key(f) {
                Some(k) if k == lowest => {
                    let n = self.node(f);
                    takes.push(n.take);
                    rest.push(n.skip);
                }
                // `one` and internals rooted above the group end up below the branch.
                _ => rest.push(f),
            }
        }
        let take = self.union_all(&takes);
        let skip = self.union_all(&rest);
        let res = self.mk_node(lowest, take, skip);

        self.union_all_cache.borrow_mut().insert(ops, res);
        res
    }

    /// Intersection of arbitrarily many operands; `zero` for an empty list.
    pub fn intersection_all(&self, operands: &[Ref]) -> Ref {
        if operands.iter().any(|&f| f == Ref::ZERO) {
            return Ref::ZERO;
        }
        let mut ops: Vec<Ref> = operands.to_vec();
        ops.sort_unstable();
        ops.dedup();
        match ops.len() {
            0 => return Ref::ZERO,
            1 => return ops[0],
            2 => return self.intersection(ops[0], ops[1]),
            _ => {}
        }

        // Terminals sort first, so `one` can only be the head operand.
        if ops[0] == Ref::ONE {
            let all_contain_empty = ops[1..].iter().all(|&f| self.skip_most(f) == Ref::ONE);
            return if all_contain_empty { Ref::ONE } else { Ref::ZERO };
        }

        if let Some(&res) = self.intersection_all_cache.borrow().get(&ops) {
            return res;
        }
        debug!("intersection_all over {} operands", ops.len());

        let keys: Vec<K> = ops
            .iter()
            .map(|&f| self.key(f).expect("non-terminal operand"))
            .collect();
        let highest = keys.iter().max().expect("operand list is not empty").clone();

        let res = if keys.iter().all(|k| *k == highest) {
            let mut takes = Vec::with_capacity(ops.len());
            let mut skips = Vec::with_capacity(ops.len());
            for &f in &ops {
                let n = self.node(f);
                takes.push(n.take);
                skips.push(n.skip);
            }
            let take = self.intersection_all(&takes);
            let skip = self.intersection_all(&skips);
            self.mk_node(highest, take, skip)
        } else {
            // Operands rooted below the highest key descend their skip chain.
            let next: Vec<Ref> = ops
                .iter()
                .zip(&keys)
                .map(|(&f, k)| if *k < highest { self.skip(f) } else { f })
                .collect();
            self.intersection_all(&next)
        };

        self.intersection_all_cache.borrow_mut().insert(ops, res);
        res
    }
}

impl<K: Ord + Hash + Clone> Sfdd<K> {
    /// Encodes a collection of members, each an iterable of keys.
    ///
    /// Duplicate keys within a member are de-duplicated; member order is
    /// irrelevant.
    pub fn encode<M, I>(&self, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = K>,
    {
        let members: Vec<Ref> = family.into_iter().map(|m| self.encode_member(m)).collect();
        self.union_all(&members)
    }

    fn encode_member<I: IntoIterator<Item = K>>(&self, member: I) -> Ref {
        let mut keys: Vec<K> = member.into_iter().collect();
        keys.sort();
        keys.dedup();
        let mut current = Ref::ONE;
        for key in keys.into_iter().rev() {
            current = self.mk_node(key, current, Ref::ZERO);
        }
        current
    }

    /// Whether the family contains the given member.
    pub fn contains<I: IntoIterator<Item = K>>(&self, f: Ref, member: I) -> bool {
        let mut keys: Vec<K> = member.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut index = 0;
        let mut current = f;
        loop {
            if current.is_terminal() {
                return index == keys.len() && current == Ref::ONE;
            }
            let n = self.node(current);
            if index == keys.len() {
                current = n.skip;
                continue;
            }
            match n.key.cmp(&keys[index]) {
                Ordering::Less => current = n.skip,
                Ordering::Equal => {
                    index += 1;
                    current = n.take;
                }
                // All remaining keys in this branch exceed the member's next key.
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
        let res = self.count_rec(n.take, memo) + self.count_rec(n.skip, memo);
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
        I: IntoIterator<Item = K>,
    {
        let g = self.encode(family);
        self.union(f, g)
    }

    /// `f ∩ encode(family)`.
    pub fn intersection_members<M, I>(&self, f: Ref, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = K>,
    {
        let g = self.encode(family);
        self.intersection(f, g)
    }

    /// `f △ encode(family)`.
    pub fn symmetric_difference_members<M, I>(&self, f: Ref, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = K>,
    {
        let g = self.encode(family);
        self.symmetric_difference(f, g)
    }

    /// `f ∖ encode(family)`.
    pub fn subtracting_members<M, I>(&self, f: Ref, family: M) -> Ref
    where
        M: IntoIterator<Item = I>,
        I: IntoIterator<Item = K>,
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
            stack.push(n.take);
            stack.push(n.skip);
        }
        out
    }

    /// Number of distinct internal nodes reachable from `f`.
    pub fn size(&self, f: Ref) -> usize {
        self.descendants([f]).len()
    }
}

impl<K: Ord + Hash + Clone + Display> Sfdd<K> {
    /// Compact textual rendering, for debugging and tests.
    pub fn to_bracket_string(&self, f: Ref) -> String {
        if f == Ref::ZERO {
            return "∅".to_string();
        }
        if f == Ref::ONE {
            return "ε".to_string();
        }
        let n = self.node(f);
        format!(
            "({}, {}, {})",
            n.key,
            self.to_bracket_string(n.take),
            self.to_bracket_string(n.skip),
        )
    }
}

impl<K: Ord + Hash + Clone> Family for Sfdd<K> {
    type Key = K;
    type MorphKey = SfddMorphKey<K>;

    fn zero(&self) -> Ref {
        Ref::ZERO
    }
    fn one(&self) -> Ref {
        Ref::ONE
    }

    fn union(&self, lhs: Ref, rhs: Ref) -> Ref {
        Sfdd::union(self, lhs, rhs)
    }
    fn intersection(&self, lhs: Ref, rhs: Ref) -> Ref {
        Sfdd::intersection(self, lhs, rhs)
    }
    fn symmetric_difference(&self, lhs: Ref, rhs: Ref) -> Ref {
        Sfdd::symmetric_difference(self, lhs, rhs)
    }
    fn subtracting(&self, lhs: Ref, rhs: Ref) -> Ref {
        Sfdd::subtracting(self, lhs, rhs)
    }
    fn union_all(&self, operands: &[Ref]) -> Ref {
        Sfdd::union_all(self, operands)
    }
    fn intersection_all(&self, operands: &[Ref]) -> Ref {
        Sfdd::intersection_all(self, operands)
    }

    fn key(&self, f: Ref) -> Option<K> {
        Sfdd::key(self, f)
    }

    fn map_children(&self, f: Ref, g: &mut dyn FnMut(Ref) -> Ref) -> Ref {
        let n = self.node(f);
        let take = g(n.take);
        let skip = g(n.skip);
        self.mk_node(n.key, take, skip)
    }
}
