//! Morphisms that inspect SFDD keys: insert, remove, the two filters, key
//! mapping, and the generalized inductive recursion.
//!
//! Key lists are sorted (and de-duplicated) once at construction; every
//! morphism below carries the head key and an eagerly interned tail morphism
//! for the remaining keys, so a chain of `n` keys is `n` shared instances.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use super::Sfdd;
use crate::cache::HomCache;
use crate::hom::{Hom, HomFactory, HomKey, Morphism};
use crate::reference::Ref;

/// Structural identity of the SFDD-specific morphisms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SfddMorphKey<K> {
    Insert(Vec<K>),
    Remove(Vec<K>),
    FilterContaining(Vec<K>),
    FilterExcluding(Vec<K>),
}

/// A type-erased SFDD morphism.
pub type SfddHom<'f, K> = Hom<'f, Sfdd<K>>;

/// The recursion step of an inductive SFDD morphism: maps the morphism itself
/// and the current node to the morphisms applied to the take and skip
/// subtrees.
pub type SfddInductiveStep<'f, K> =
    Box<dyn Fn(&SfddHom<'f, K>, Ref) -> (SfddHom<'f, K>, SfddHom<'f, K>) + 'f>;

fn sorted_keys<K: Ord>(keys: impl IntoIterator<Item = K>) -> Vec<K> {
    let mut keys: Vec<K> = keys.into_iter().collect();
    assert!(!keys.is_empty(), "Key list must not be empty");
    keys.sort();
    keys.dedup();
    keys
}

impl<'f, K: Ord + Hash + Clone + 'f> HomFactory<'f, Sfdd<K>> {
    /// Morphism adding every key in `keys` to every member.
    pub fn insert(&self, keys: impl IntoIterator<Item = K>) -> SfddHom<'f, K> {
        self.insert_sorted(sorted_keys(keys))
    }

    fn insert_sorted(&self, keys: Vec<K>) -> SfddHom<'f, K> {
        self.intern(HomKey::Specific(SfddMorphKey::Insert(keys.clone())), |_| {
            let tail = (keys.len() > 1).then(|| self.insert_sorted(keys[1..].to_vec()));
            Rc::new(InsertHom {
                family: self.family(),
                key: keys[0].clone(),
                tail,
                cache: RefCell::new(HomCache::new()),
            })
        })
    }

    /// Morphism removing every key in `keys` from every member.
    pub fn remove(&self, keys: impl IntoIterator<Item = K>) -> SfddHom<'f, K> {
        self.remove_sorted(sorted_keys(keys))
    }

    fn remove_sorted(&self, keys: Vec<K>) -> SfddHom<'f, K> {
        self.intern(HomKey::Specific(SfddMorphKey::Remove(keys.clone())), |_| {
            let tail = (keys.len() > 1).then(|| self.remove_sorted(keys[1..].to_vec()));
            Rc::new(RemoveHom {
                family: self.family(),
                key: keys[0].clone(),
                tail,
                cache: RefCell::new(HomCache::new()),
            })
        })
    }

    /// Morphism keeping only the members containing every key in `keys`.
    pub fn filter_containing(&self, keys: impl IntoIterator<Item = K>) -> SfddHom<'f, K> {
        self.filter_containing_sorted(sorted_keys(keys))
    }

    fn filter_containing_sorted(&self, keys: Vec<K>) -> SfddHom<'f, K> {
        self.intern(
            HomKey::Specific(SfddMorphKey::FilterContaining(keys.clone())),
            |_| {
                let tail = (keys.len() > 1).then(|| self.filter_containing_sorted(keys[1..].to_vec()));
                Rc::new(FilterContainingHom {
                    family: self.family(),
                    key: keys[0].clone(),
                    tail,
                    cache: RefCell::new(HomCache::new()),
                })
            },
        )
    }

    /// Morphism keeping only the members containing none of the keys in `keys`.
    pub fn filter_excluding(&self, keys: impl IntoIterator<Item = K>) -> SfddHom<'f, K> {
        self.filter_excluding_sorted(sorted_keys(keys))
    }

    fn filter_excluding_sorted(&self, keys: Vec<K>) -> SfddHom<'f, K> {
        self.intern(
            HomKey::Specific(SfddMorphKey::FilterExcluding(keys.clone())),
            |_| {
                let tail = (keys.len() > 1).then(|| self.filter_excluding_sorted(keys[1..].to_vec()));
                Rc::new(FilterExcludingHom {
                    family: self.family(),
                    key: keys[0].clone(),
                    tail,
                    cache: RefCell::new(HomCache::new()),
                })
            },
        )
    }

    /// Morphism applying `function` to every key of every member.
    ///
    /// `function` must be strictly order-preserving on the keys actually
    /// occurring in the argument family; otherwise the behavior is undefined.
    /// Identified by construction, never interned.
    pub fn map(&self, function: impl Fn(&K) -> K + 'f) -> SfddHom<'f, K> {
        let id = self.fresh_id();
        Hom::new(
            Rc::new(MapHom {
                family: self.family(),
                function: Box::new(function),
                cache: RefCell::new(HomCache::new()),
            }),
            id,
        )
    }

    /// Generalized recursion: `step(this, node)` yields the morphisms applied
    /// to the take and skip subtrees; `one` rewrites to `substitute` (default
    /// `one`), `zero` to `zero`. Identified by construction, never interned.
    pub fn inductive(
        &self,
        substitute: Option<Ref>,
        step: impl Fn(&SfddHom<'f, K>, Ref) -> (SfddHom<'f, K>, SfddHom<'f, K>) + 'f,
    ) -> SfddHom<'f, K> {
        let id = self.fresh_id();
        let family = self.family();
        let inner = Rc::new_cyclic(|this: &Weak<InductiveHom<'f, K>>| InductiveHom {
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

struct InsertHom<'f, K: Ord + Hash + Clone> {
    family: &'f Sfdd<K>,
    key: K,
    tail: Option<SfddHom<'f, K>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone> InsertHom<'f, K> {
    fn apply_tail(&self, f: Ref) -> Ref {
        match &self.tail {
            Some(tail) => tail.apply(f),
            None => f,
        }
    }
}

impl<'f, K: Ord + Hash + Clone> Morphism<Sfdd<K>> for InsertHom<'f, K> {
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f == Ref::ZERO {
            return Ref::ZERO;
        }
        if f == Ref::ONE {
            let take = self.apply_tail(Ref::ONE);
            return dd.mk_node(self.key.clone(), take, Ref::ZERO);
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let res = match n.key.cmp(&self.key) {
            Ordering::Less => {
                let take = self.apply(n.take);
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                // The key is now chosen on every path: members that skipped it
                // join the take side.
                let merged = dd.union(n.take, n.skip);
                let take = self.apply_tail(merged);
                dd.mk_node(n.key, take, Ref::ZERO)
            }
            Ordering::Greater => {
                let take = self.apply_tail(f);
                dd.mk_node(self.key.clone(), take, Ref::ZERO)
            }
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct RemoveHom<'f, K: Ord + Hash + Clone> {
    family: &'f Sfdd<K>,
    key: K,
    tail: Option<SfddHom<'f, K>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone> RemoveHom<'f, K> {
    fn apply_tail(&self, f: Ref) -> Ref {
        match &self.tail {
            Some(tail) => tail.apply(f),
            None => f,
        }
    }
}

impl<'f, K: Ord + Hash + Clone> Morphism<Sfdd<K>> for RemoveHom<'f, K> {
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
                let take = self.apply(n.take);
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                let merged = dd.union(n.take, n.skip);
                self.apply_tail(merged)
            }
            Ordering::Greater => self.apply_tail(f),
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct FilterContainingHom<'f, K: Ord + Hash + Clone> {
    family: &'f Sfdd<K>,
    key: K,
    tail: Option<SfddHom<'f, K>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone> FilterContainingHom<'f, K> {
    fn apply_tail(&self, f: Ref) -> Ref {
        match &self.tail {
            Some(tail) => tail.apply(f),
            None => f,
        }
    }
}

impl<'f, K: Ord + Hash + Clone> Morphism<Sfdd<K>> for FilterContainingHom<'f, K> {
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        // The empty member cannot contain the required key.
        if f.is_terminal() {
            return Ref::ZERO;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let res = match n.key.cmp(&self.key) {
            Ordering::Less => {
                let take = self.apply(n.take);
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => {
                let take = self.apply_tail(n.take);
                dd.mk_node(n.key, take, Ref::ZERO)
            }
            // Every member below lacks the required key.
            Ordering::Greater => Ref::ZERO,
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct FilterExcludingHom<'f, K: Ord + Hash + Clone> {
    family: &'f Sfdd<K>,
    key: K,
    tail: Option<SfddHom<'f, K>>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone> FilterExcludingHom<'f, K> {
    fn apply_tail(&self, f: Ref) -> Ref {
        match &self.tail {
            Some(tail) => tail.apply(f),
            None => f,
        }
    }
}

impl<'f, K: Ord + Hash + Clone> Morphism<Sfdd<K>> for FilterExcludingHom<'f, K> {
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
                let take = self.apply(n.take);
                let skip = self.apply(n.skip);
                dd.mk_node(n.key, take, skip)
            }
            Ordering::Equal => self.apply_tail(n.skip),
            Ordering::Greater => self.apply_tail(f),
        };

        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<K> {
        Some(self.key.clone())
    }
}

struct MapHom<'f, K> {
    family: &'f Sfdd<K>,
    function: Box<dyn Fn(&K) -> K + 'f>,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone> Morphism<Sfdd<K>> for MapHom<'f, K> {
    fn apply(&self, f: Ref) -> Ref {
        let dd = self.family;
        if f.is_terminal() {
            return f;
        }
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let n = dd.node(f);
        let take = self.apply(n.take);
        let skip = self.apply(n.skip);
        let res = dd.mk_node((self.function)(&n.key), take, skip);

        self.cache.borrow_mut().insert(f, res);
        res
    }
}

struct InductiveHom<'f, K: Ord + Hash + Clone> {
    family: &'f Sfdd<K>,
    substitute: Ref,
    step: SfddInductiveStep<'f, K>,
    this: Weak<InductiveHom<'f, K>>,
    id: u64,
    cache: RefCell<HomCache>,
}

impl<'f, K: Ord + Hash + Clone + 'f> Morphism<Sfdd<K>> for InductiveHom<'f, K> {
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
        let (take_step, skip_step) = (self.step)(&this, f);
        let take = take_step.apply(n.take);
        let skip = skip_step.apply(n.skip);
        let res = dd.mk_node(n.key, take, skip);

        self.cache.borrow_mut().insert(f, res);
        res
    }
}
