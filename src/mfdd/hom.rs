//! Morphisms that inspect MFDD keys and values: binding insertion, key and
//! value removal, the two filters, value mapping, and the generalized
//! inductive recursion.
//!
//! Assignment lists are sorted by key once at construction; repeating a key in
//! one list is a precondition failure. As on the SFDD side, every morphism
//! carries the head assignment and an eagerly interned tail morphism.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use super::Mfdd;
use crate::cache::HomCache;
use crate::hom::{Hom, HomFactory, HomKey, Morphism};
use crate::reference::Ref;

/// Structural identity of the MFDD-specific morphisms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MfddMorphKey<K, V> {
    Insert(Vec<(K, V)>),
    RemoveKeys(Vec<K>),
    RemoveValues(Vec<(K, Vec<V>)>),
    FilterContaining(Vec<(K, Vec<V>)>),
    FilterExcluding(Vec<(K, Vec<V>)>),
}

/// A type-erased MFDD morphism.
pub type MfddHom<'f, K, V> = Hom<'f, Mfdd<K, V>>;

/// The recursion step of an inductive MFDD morphism.
///
/// For an internal node the step yields a partial assignment of values to
/// morphisms plus the morphism for the skip subtree. A mentioned value's
/// morphism is applied to its current subtree, or to `zero` when the node does
/// not bind it (which lets the step introduce new bindings); unmentioned
/// values keep their subtree unchanged.
pub type MfddInductiveStep<'f, K, V> = Box<
    dyn Fn(&MfddHom<'f, K, V>, Ref) -> (Vec<(V, MfddHom<'f, K, V>)>, MfddHom<'f, K, V>) + 'f,
>;

fn sorted_assignments<K: Ord, V>(assignments: impl IntoIterator<Item = (K, V)>) -> Vec<(K, V)> {
    let mut assignments: Vec<(K, V)> = assignments.into_iter().collect();
    assert!(!assignments.is_empty(), "Assignment list must not be empty");
    assignments.sort_by(|(a, _), (b, _)| a.cmp(b));
    assert!(
        assignments.windows(2).all(|w| w[0].0 != w[1].0),
        "Assignment lists must not repeat a key"
    );
    assignments
}

fn sorted_keys<K: Ord>(keys: impl IntoIterator<Item = K>) -> Vec<K> {
    let mut keys: Vec<K> = keys.into_iter().collect();
    assert!(!keys.is_empty(), "Key list must not be empty");
    keys.sort();
    keys.dedup();
    keys
}

fn dedup_values<V: PartialEq>(values: Vec<V>) -> Vec<V> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn sorted_value_sets<K: Ord, V: PartialEq>(
    assignments: impl IntoIterator<Item = (K, Vec<V>)>,
) -> Vec<(K, Vec<V>)> {
    sorted_assignments(assignments)
        .into_iter()
        .map(|(k, values)| (k, dedup_values(values)))
        .collect()
}

impl<'f, K, V> HomFactory<'f, Mfdd<K, V>>
where
    K: Ord + Hash + Clone + 'f,
    V: Eq + Hash + Clone + 'f,
{
    /// Morphism adding the `key ↦ value` bindings to every member.
    pub fn insert(&self, assignments: impl IntoIterator<Item = (K, V)>) -> MfddHom<'f, K, V> {
        self.insert_sorted(sorted_assignments(assignments))
    }

    fn insert_sorted(&self, assignments: Vec<(K, V)>) -> MfddHom<'f, K, V> {
        self.intern(HomKey::Specific(MfddMorphKey::Insert(assignments.clone())), |_| {
            let tail = (assignments.len() > 1).then(|| self.insert_sorted(assignments[1..].to_vec()));
            let (key, value) = assignments[0].clone();
            Rc::new(InsertHom {
                family: self.family(),
                key,
                value,
                tail,
                cache: RefCell::new(HomCache::new()),
            })
        })
    }

    /// Morphism removing the named keys (with whatever value) from every
    /// member.
    pub fn remove_keys(&self, keys: impl IntoIterator<Item = K>) -> MfddHom<'f, K, V> {
        self.remove_keys_sorted(sorted_keys(keys))
    }

    fn remove_keys_sorted(&self, keys: Vec<K>) -> MfddHom<'f, K, V> {
        self.intern(HomKey::Specific(MfddMorphKey::RemoveKeys(keys.clone())), |_| {
            let tail = (keys.len() > 1).then(|| self.remove_keys_sorted(keys[1..].to_vec()));
            Rc::new(RemoveKeysHom {
                family: self.family(),
                key: keys[0].clone(),
                tail,
                cache: RefCell::new(HomCache::new()),
            })
        })
    }

    /// Morphism dropping only the listed value bindings per key; members bound
    /// to a listed value lose that binding (their subtree folds into skip),
    /// other bindings are untouched.
    pub fn remove_values(
        &self,
        assignments: impl IntoIterator<Item = (K, Vec<V>)>,
    ) -> MfddHom<'f, K, V> {
        self.remove_values_sorted(sorted_value_sets(assignments))
    }

    fn remove_values_sorted(&self, assignments: Vec<(K, Vec<V>)>) -> MfddHom<'f, K, V> {
        self.intern(
            HomKey::Specific(MfddMorphKey::RemoveValues(assignments.clone())),
            |_| {
                let tail =
                    (assignments.len() > 1).then(|| self.remove_values_sorted(assignments[1..].to_vec()));
                let (key, values) = assignments[0].clone();
                Rc::new(RemoveValuesHom {
                    family: self.family(),
                    key,
                    values,
                    tail,
                    cache: RefCell::new(HomCache::new()),
                })
            },
        )
    }

    /// Morphism keeping only the members that bind each named key to one of
    /// the allowed values.
    pub fn filter_containing(
        &self,
        assignments: impl IntoIterator<Item = (K, Vec<V>)>,
    ) -> MfddHom<'f, K, V> {
        self.filter_containing_sorted(sorted_value_sets(assignments))
    }

    fn filter_containing_sorted(&self, assignments: Vec<(K, Vec<V>)>) -> MfddHom<'f, K, V> {
        self.intern(
            HomKey::Specific(MfddMorphKey::FilterContaining(assignments.clone())),
            |_| {
                let tail = (assignments.len() > 1)
                    .then(|| self.filter_containing_sorted(assignments[1..].to_vec()));
                let (key, values) = assignments[0].clone();
                Rc::new(FilterContainingHom {
                    family: self.family(),
                    key,
                    values,
                    tail,
                    cache: RefCell::new(HomCache::new()),
                })
            },
        )
    }

    /// Morphism dropping the members that bind a named key to one of the
    /// denied values; members not binding the key pass through.
    pub fn filter_excluding(
        &self,
        assignments: impl IntoIterator<Item = (K, Vec<V>)>,
    ) -> MfddHom<'f, K, V> {
        self.filter_excluding_sorted(sorted_value_sets(assignments))
    }

    fn filter_excluding_sorted(&self, assignments: Vec<(K, Vec<V>)>) -> MfddHom<'f, K, V> {
        self.intern(
            HomKey::Specific(MfddMorphKey::FilterExcluding(assignments.clone())),
            |_| {
                let tail = (assignments.len() > 1)
                    .then(|| self.filter_excluding_sorted(assignments[1..].to_vec()));
                let (key, values) = assignments[0].clone();
                Rc::new(FilterExcludingHom {
                    family: self.family(),
                    key,
                    values,
                    tail,
                    cache: RefCell::new(HomCache::new()),
                })
            },
        )
    }

    /// Morphism rewriting every value through `function`.
    ///
    /// `function` must keep the values of each node distinct; otherwise the
    /// behavior is undefined. Identified by construction, never interned.
    pub fn map_values(&self, function: impl Fn(&V) -> V + 'f) -> MfddHom<'f, K, V> {
        let id = self.fresh_id();
        Hom::new(
            Rc::new(MapValuesHom {
                family: self.family(),
                function: Box::new(function),
                cache: RefCell::new(HomCache::new()),
            }),
            id,
        )
    }

    /// Generalized recursion; see [`MfddInductiveStep`]. `one` rewrites to
    /// `substitute` (default `one`), `zero` to `zero`. Identified by
    /// construction, never interned.
    pub fn inductive(
        &self,
        substitute: Option<Ref>,
        step: impl Fn(&MfddHom<'f, K, V>, Ref) -> (Vec<(V, MfddHom<'f, K, V>)>, MfddHom<'f, K, V>) + 'f,
    ) -> MfddHom<'f, K, V> {
        let id = self.fresh_id();
        let family = self.family();
        let inner = Rc::new_cyclic(|this: &Weak<InductiveHom<'f, K, V>>| InductiveHom {
            family,
            substitute: substitute.unwrap_or(Ref::ONE),
            step: Box::new(step),
            this: this.clone(),
            id,
            cache: RefCell::new(HomCache::new()),
        });
        Hom::new(inner, id)
    }
}

fn apply_tail<'f, K, V>(tail: &Option<MfddHom<'f, K, V>>, f: Ref) -> Ref
where
    K: Ord + Hash + Clone,
    V: Eq + Hash + Clone,
{
    match tail {
        Some(tail) => tail.apply(f),
        None => f,
    }
}

struct InsertHom<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> {
    family: &'f Mfdd<K, V>,
    key: K,
    value: V,
    tail: Option<MfddHom<'f, K, V>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Morphism<Mfdd<K, V>> for InsertHom<'f, K, V> {
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f == Ref::ZERO {
            return Ref::ZERO;
        }
        if f == Ref::ONE {
            let take = apply_tail(&self.tail, Ref::ONE);
            return dd.mk_node(self.key.clone(), vec![(self.value.clone(), take)], Ref::ZERO);
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let res = match n.key.cmp(&self.key) {
            Ordering::Less => {
                let take = n.take.iter().map(|(v, t)| (v.clone(), self.apply(*t))).collect();
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                let mut take: Vec<(V, Ref)> = Vec::with_capacity(n.take.len() + 1);
                match n.take_for(&self.value) {
                    Some(bound) => {
                        // Members that skipped the key join the inserted value;
                        // other bindings are untouched.
                        let folded = dd.union(bound, n.skip);
                        for (v, t) in &n.take {
                            let sub = if *v == self.value { folded } else { *t };
                            take.push((v.clone(), apply_tail(&self.tail, sub)));
                        }
                    }
                    None => {
                        let mut fresh = n.skip;
                        for (v, t) in &n.take {
                            fresh = dd.union(fresh, *t);
                            take.push((v.clone(), apply_tail(&self.tail, *t)));
                        }
                        take.push((self.value.clone(), apply_tail(&self.tail, fresh)));
                    }
                }
                dd.mk_node(n.key, take, Ref::ZERO)
            }
            Ordering::Greater => {
                let take = apply_tail(&self.tail, f);
                dd.mk_node(self.key.clone(), vec![(self.value.clone(), take)], Ref::ZERO)
            }
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct RemoveKeysHom<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> {
    family: &'f Mfdd<K, V>,
    key: K,
    tail: Option<MfddHom<'f, K, V>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Morphism<Mfdd<K, V>> for RemoveKeysHom<'f, K, V> {
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f.is_terminal() {
            return f;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let res = match n.key.cmp(&self.key) {
            Ordering::Less => {
                let take = n.take.iter().map(|(v, t)| (v.clone(), self.apply(*t))).collect();
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                let mut folded = n.skip;
                for (_, t) in &n.take {
                    folded = dd.union(folded, *t);
                }
                apply_tail(&self.tail, folded)
            }
            Ordering::Greater => apply_tail(&self.tail, f),
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct RemoveValuesHom<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> {
    family: &'f Mfdd<K, V>,
    key: K,
    values: Vec<V>,
    tail: Option<MfddHom<'f, K, V>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Morphism<Mfdd<K, V>> for RemoveValuesHom<'f, K, V> {
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f.is_terminal() {
            return f;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let res = match n.key.cmp(&self.key) {
            Ordering::Less => {
                let take = n.take.iter().map(|(v, t)| (v.clone(), self.apply(*t))).collect();
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                // Dropped bindings fold into skip; the others stay.
                let mut take = Vec::new();
                let mut folded = n.skip;
                for (v, t) in &n.take {
                    if self.values.contains(v) {
                        folded = dd.union(folded, *t);
                    } else {
                        take.push((v.clone(), apply_tail(&self.tail, *t)));
                    }
                }
                let skip = apply_tail(&self.tail, folded);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Greater => apply_tail(&self.tail, f),
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct FilterContainingHom<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> {
    family: &'f Mfdd<K, V>,
    key: K,
    values: Vec<V>,
    tail: Option<MfddHom<'f, K, V>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Morphism<Mfdd<K, V>>
    for FilterContainingHom<'f, K, V>
{
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        // The empty map cannot bind the required key.
        if f.is_terminal() {
            return Ref::ZERO;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let res = match n.key.cmp(&self.key) {
            Ordering::Less => {
                let take = n.take.iter().map(|(v, t)| (v.clone(), self.apply(*t))).collect();
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                let take = n
                    .take
                    .iter()
                    .filter(|(v, _)| self.values.contains(v))
                    .map(|(v, t)| (v.clone(), apply_tail(&self.tail, *t)))
                    .collect();
                dd.mk_node(n.key, take, Ref::ZERO)
            }
            Ordering::Greater => Ref::ZERO,
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct FilterExcludingHom<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> {
    family: &'f Mfdd<K, V>,
    key: K,
    values: Vec<V>,
    tail: Option<MfddHom<'f, K, V>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Morphism<Mfdd<K, V>>
    for FilterExcludingHom<'f, K, V>
{
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f.is_terminal() {
            return f;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let res = match n.key.cmp(&self.key) {
            Ordering::Less => {
                let take = n.take.iter().map(|(v, t)| (v.clone(), self.apply(*t))).collect();
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                // Denied bindings are dropped; skip is left alone.
                let take = n
                    .take
                    .iter()
                    .filter(|(v, _)| !self.values.contains(v))
                    .map(|(v, t)| (v.clone(), apply_tail(&self.tail, *t)))
                    .collect();
                let skip = apply_tail(&self.tail, n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Greater => apply_tail(&self.tail, f),
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct MapValuesHom<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> {
    family: &'f Mfdd<K, V>,
    function: Box<dyn Fn(&V) -> V + 'f>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Morphism<Mfdd<K, V>> for MapValuesHom<'f, K, V> {
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f.is_terminal() {
            return f;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let take = n
            .take
            .iter()
            .map(|(v, t)| ((self.function)(v), self.apply(*t)))
            .collect();
        let skip = self.apply(n.skip);
        let res = dd.mk_node(n.key, take, skip);

        self.cache.borrow_mut().insert(f, res);
        res
    }
}

struct InductiveHom<'f, K: Ord + Hash + Clone, V: Eq + Hash + Clone> {
    family: &'f Mfdd<K, V>,
    substitute: Ref,
    step: MfddInductiveStep<'f, K, V>,
    this: Weak<InductiveHom<'f, K, V>>,
    id: u64,
    cache: RefCell<HomCache>,
}

impl<'f, K, V> Morphism<Mfdd<K, V>> for InductiveHom<'f, K, V>
where
    K: Ord + Hash + Clone + 'f,
    V: Eq + Hash + Clone + 'f,
{
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f == Ref::ZERO {
            return Ref::ZERO;
        }
        if f == Ref::ONE {
            return self.substitute;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let this = Hom::new(
            self.this.upgrade().expect("inductive morphism outlived its handle"),
            self.id,
        );
        let n = dd.node(f);
        let (take_steps, skip_step) = (self.step)(&this, f);

        let mut take = n.take.clone();
        for (v, morphism) in take_steps {
            match take.iter().position(|(u, _)| *u == v) {
                Some(i) => {
                    let image = morphism.apply(take[i].1);
                    take[i].1 = image;
                }
                // Absent values apply to zero, introducing a new binding.
                None => take.push((v, morphism.apply(Ref::ZERO))),
            }
        }
        let skip = skip_step.apply(n.skip);
        let res = dd.mk_node(n.key, take, skip);

        self.cache.borrow_mut().insert(f, res);
        res
    }
}
