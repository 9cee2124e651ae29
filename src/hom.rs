//! Morphisms: cached, composable transformations of families.
//!
//! A [`Morphism`] maps family handles to family handles and owns a
//! per-instance cache, so repeated applications over a shared DAG are cheap.
//! Morphisms are built through a [`HomFactory`] tied to one node factory; the
//! factory interns every morphism by its construction parameters, so two
//! structurally identical morphisms share one instance — and therefore one
//! cache. Closure-carrying morphisms (`map`, `inductive`) are identified by
//! construction instead, since semantic equality of closures is undecidable.
//!
//! This module holds the family-generic layer: the [`Hom`] type-erased
//! wrapper, the combinators (identity, constant, union, intersection,
//! symmetric difference, subtraction, composition, fixed point), and the
//! [saturation](HomFactory::saturate) wrapper that pushes a morphism past keys
//! it cannot affect. The key-inspecting morphisms live with their factories in
//! [`crate::sfdd`] and [`crate::mfdd`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use hashbrown::HashMap;
use log::debug;

use crate::cache::HomCache;
use crate::family::Family;
use crate::reference::Ref;

/// A structure-preserving transformation of families, computed on handles.
pub trait Morphism<F: Family> {
    /// Applies the morphism to a family handle.
    fn apply(&self, f: Ref) -> Ref;

    /// The smallest key this morphism can affect, when it is known.
    ///
    /// Morphisms reporting a key can be [saturated](HomFactory::saturate)
    /// automatically; combinators report the minimum over their operands.
    fn lowest_relevant_key(&self) -> Option<F::Key> {
        None
    }
}

/// A type-erased, cheaply clonable morphism handle.
///
/// Equality and hashing go through the identity assigned at interning time,
/// which coincides with structural equality for every morphism built from
/// construction parameters, and with object identity for the closure-carrying
/// ones. Identities are scoped to one [`HomFactory`].
pub struct Hom<'f, F: Family> {
    inner: Rc<dyn Morphism<F> + 'f>,
    id: u64,
}

impl<'f, F: Family> Hom<'f, F> {
    pub(crate) fn new(inner: Rc<dyn Morphism<F> + 'f>, id: u64) -> Self {
        Self { inner, id }
    }

    pub fn apply(&self, f: Ref) -> Ref {
        self.inner.apply(f)
    }

    pub fn lowest_relevant_key(&self) -> Option<F::Key> {
        self.inner.lowest_relevant_key()
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl<'f, F: Family> Clone for Hom<'f, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            id: self.id,
        }
    }
}

impl<'f, F: Family> PartialEq for Hom<'f, F> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<'f, F: Family> Eq for Hom<'f, F> {}

impl<'f, F: Family> Hash for Hom<'f, F> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<'f, F: Family> fmt::Debug for Hom<'f, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hom#{}", self.id)
    }
}

impl<'f, F: Family> Morphism<F> for Hom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        self.inner.apply(f)
    }
    fn lowest_relevant_key(&self) -> Option<F::Key> {
        self.inner.lowest_relevant_key()
    }
}

/// Structural identity of an interned morphism.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) enum HomKey<Key, Specific> {
    Identity,
    Constant(Ref),
    Union(Vec<u64>),
    Intersection(Vec<u64>),
    SymmetricDifference(Vec<u64>),
    Subtraction(u64, u64),
    Composition(Vec<u64>),
    FixedPoint(u64),
    Saturated(u64, Key),
    Specific(Specific),
}

type KeyOf<F> = HomKey<<F as Family>::Key, <F as Family>::MorphKey>;

/// Builds, interns, and shares morphisms over one family factory.
pub struct HomFactory<'f, F: Family> {
    family: &'f F,
    interned: RefCell<HashMap<KeyOf<F>, Hom<'f, F>>>,
    next_id: Cell<u64>,
}

impl<'f, F: Family> HomFactory<'f, F> {
    pub fn new(family: &'f F) -> Self {
        Self {
            family,
            interned: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    /// The node factory this morphism factory is tied to.
    pub fn family(&self) -> &'f F {
        self.family
    }

    /// Number of morphisms interned so far.
    pub fn interned_count(&self) -> usize {
        self.interned.borrow().len()
    }

    pub(crate) fn fresh_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Returns the interned morphism for `key`, building it on a miss.
    ///
    /// `build` may re-enter the factory (tail chains do), so the intern table
    /// is never borrowed across the call.
    pub(crate) fn intern(
        &self,
        key: KeyOf<F>,
        build: impl FnOnce(u64) -> Rc<dyn Morphism<F> + 'f>,
    ) -> Hom<'f, F> {
        if let Some(hom) = self.interned.borrow().get(&key) {
            return hom.clone();
        }
        let id = self.fresh_id();
        let hom = Hom::new(build(id), id);
        self.interned.borrow_mut().insert(key, hom.clone());
        hom
    }

    /// `apply(x) = x`.
    pub fn identity(&self) -> Hom<'f, F> {
        self.intern(HomKey::Identity, |_| Rc::new(IdentityHom))
    }

    /// `apply(x) = value`, for any `x`.
    pub fn constant(&self, value: Ref) -> Hom<'f, F> {
        self.intern(HomKey::Constant(value), |_| Rc::new(ConstantHom { value }))
    }

    /// `apply(x) = lhs(x) ∪ rhs(x)`.
    pub fn union(&self, lhs: &Hom<'f, F>, rhs: &Hom<'f, F>) -> Hom<'f, F> {
        self.union_all(&[lhs.clone(), rhs.clone()])
    }

    /// `apply(x) = ⋃ mᵢ(x)`.
    pub fn union_all(&self, operands: &[Hom<'f, F>]) -> Hom<'f, F> {
        let ops = canonical_operands(operands);
        if ops.len() == 1 {
            return ops.into_iter().next().expect("one operand");
        }
        let ids: Vec<u64> = ops.iter().map(Hom::id).collect();
        let family = self.family;
        self.intern(HomKey::Union(ids), move |_| {
            Rc::new(UnionHom { family, operands: ops, cache: RefCell::new(HomCache::new()) })
        })
    }

    /// `apply(x) = lhs(x) ∩ rhs(x)`.
    pub fn intersection(&self, lhs: &Hom<'f, F>, rhs: &Hom<'f, F>) -> Hom<'f, F> {
        self.intersection_all(&[lhs.clone(), rhs.clone()])
    }

    /// `apply(x) = ⋂ mᵢ(x)`.
    pub fn intersection_all(&self, operands: &[Hom<'f, F>]) -> Hom<'f, F> {
        let ops = canonical_operands(operands);
        if ops.len() == 1 {
            return ops.into_iter().next().expect("one operand");
        }
        let ids: Vec<u64> = ops.iter().map(Hom::id).collect();
        let family = self.family;
        self.intern(HomKey::Intersection(ids), move |_| {
            Rc::new(IntersectionHom { family, operands: ops, cache: RefCell::new(HomCache::new()) })
        })
    }

    /// `apply(x) = lhs(x) △ rhs(x)`.
    pub fn symmetric_difference(&self, lhs: &Hom<'f, F>, rhs: &Hom<'f, F>) -> Hom<'f, F> {
        self.symmetric_difference_all(&[lhs.clone(), rhs.clone()])
    }

    /// Folds the operand images with `△`.
    pub fn symmetric_difference_all(&self, operands: &[Hom<'f, F>]) -> Hom<'f, F> {
        let ops = canonical_operands(operands);
        if ops.len() == 1 {
            return ops.into_iter().next().expect("one operand");
        }
        let ids: Vec<u64> = ops.iter().map(Hom::id).collect();
        let family = self.family;
        self.intern(HomKey::SymmetricDifference(ids), move |_| {
            Rc::new(SymmetricDifferenceHom { family, operands: ops, cache: RefCell::new(HomCache::new()) })
        })
    }

    /// `apply(x) = lhs(x) ∖ rhs(x)`.
    pub fn subtraction(&self, lhs: &Hom<'f, F>, rhs: &Hom<'f, F>) -> Hom<'f, F> {
        let key = HomKey::Subtraction(lhs.id(), rhs.id());
        let family = self.family;
        let (lhs, rhs) = (lhs.clone(), rhs.clone());
        self.intern(key, move |_| {
            Rc::new(SubtractionHom { family, lhs, rhs, cache: RefCell::new(HomCache::new()) })
        })
    }

    /// `apply(x) = outer(inner(x))`.
    pub fn composition(&self, outer: &Hom<'f, F>, inner: &Hom<'f, F>) -> Hom<'f, F> {
        self.composition_all(&[outer.clone(), inner.clone()])
    }

    /// Composition of arbitrarily many morphisms, applied right-to-left.
    pub fn composition_all(&self, operands: &[Hom<'f, F>]) -> Hom<'f, F> {
        assert!(!operands.is_empty(), "Morphism combinators need at least one operand");
        if operands.len() == 1 {
            return operands[0].clone();
        }
        let ids: Vec<u64> = operands.iter().map(Hom::id).collect();
        let ops = operands.to_vec();
        self.intern(HomKey::Composition(ids), move |_| {
            Rc::new(CompositionHom { operands: ops, cache: RefCell::new(HomCache::new()) })
        })
    }

    /// Iterates `x, m(x), m(m(x)), …` until the handle stops changing.
    pub fn fixed_point(&self, m: &Hom<'f, F>) -> Hom<'f, F> {
        let inner = m.clone();
        self.intern(HomKey::FixedPoint(m.id()), move |_| {
            Rc::new(FixedPointHom { inner, cache: RefCell::new(HomCache::new()) })
        })
    }

    /// Saturates `m` at its advertised lowest relevant key.
    ///
    /// # Panics
    ///
    /// Panics when `m` does not advertise one; use [`saturate_to`](Self::saturate_to)
    /// to force a level explicitly.
    pub fn saturate(&self, m: &Hom<'f, F>) -> Hom<'f, F> {
        let level = m
            .lowest_relevant_key()
            .expect("Morphism does not advertise a lowest relevant key");
        self.saturate_to(m, level)
    }

    /// Wraps `m` so that nodes with keys below `level` are traversed
    /// structurally and `m` is only consulted from `level` on.
    pub fn saturate_to(&self, m: &Hom<'f, F>, level: F::Key) -> Hom<'f, F> {
        let key = HomKey::Saturated(m.id(), level.clone());
        let family = self.family;
        let inner = m.clone();
        self.intern(key, move |_| {
            Rc::new(SaturatedHom { family, inner, level, cache: RefCell::new(HomCache::new()) })
        })
    }
}

/// Sorted, de-duplicated operands for the commutative combinators.
fn canonical_operands<'f, F: Family>(operands: &[Hom<'f, F>]) -> Vec<Hom<'f, F>> {
    assert!(!operands.is_empty(), "Morphism combinators need at least one operand");
    let mut ops = operands.to_vec();
    ops.sort_by_key(Hom::id);
    ops.dedup();
    ops
}

/// Minimum advertised key over a set of operands; `None` as soon as one
/// operand does not advertise.
fn lowest_over<'f, F: Family>(operands: &[Hom<'f, F>]) -> Option<F::Key> {
    let mut lowest: Option<F::Key> = None;
    for m in operands {
        let k = m.lowest_relevant_key()?;
        lowest = Some(match lowest {
            Some(l) if l < k => l,
            _ => k,
        });
    }
    lowest
}

struct IdentityHom;

impl<F: Family> Morphism<F> for IdentityHom {
    fn apply(&self, f: Ref) -> Ref {
        f
    }
}

struct ConstantHom {
    value: Ref,
}

impl<F: Family> Morphism<F> for ConstantHom {
    fn apply(&self, _f: Ref) -> Ref {
        self.value
    }
}

struct UnionHom<'f, F: Family> {
    family: &'f F,
    operands: Vec<Hom<'f, F>>,
    cache: RefCell<HomCache>,
}

impl<'f, F: Family> Morphism<F> for UnionHom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }
        let images: Vec<Ref> = self.operands.iter().map(|m| m.apply(f)).collect();
        let res = self.family.union_all(&images);
        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        lowest_over(&self.operands)
    }
}

struct IntersectionHom<'f, F: Family> {
    family: &'f F,
    operands: Vec<Hom<'f, F>>,
    cache: RefCell<HomCache>,
}

impl<'f, F: Family> Morphism<F> for IntersectionHom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }
        let images: Vec<Ref> = self.operands.iter().map(|m| m.apply(f)).collect();
        let res = self.family.intersection_all(&images);
        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        lowest_over(&self.operands)
    }
}

struct SymmetricDifferenceHom<'f, F: Family> {
    family: &'f F,
    operands: Vec<Hom<'f, F>>,
    cache: RefCell<HomCache>,
}

impl<'f, F: Family> Morphism<F> for SymmetricDifferenceHom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }
        let mut images = self.operands.iter().map(|m| m.apply(f));
        let first = images.next().expect("combinators hold at least one operand");
        let res = images.fold(first, |acc, g| self.family.symmetric_difference(acc, g));
        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        lowest_over(&self.operands)
    }
}

struct SubtractionHom<'f, F: Family> {
    family: &'f F,
    lhs: Hom<'f, F>,
    rhs: Hom<'f, F>,
    cache: RefCell<HomCache>,
}

impl<'f, F: Family> Morphism<F> for SubtractionHom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }
        let res = self.family.subtracting(self.lhs.apply(f), self.rhs.apply(f));
        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        let l = self.lhs.lowest_relevant_key()?;
        let r = self.rhs.lowest_relevant_key()?;
        Some(if l < r { l } else { r })
    }
}

struct CompositionHom<'f, F: Family> {
    operands: Vec<Hom<'f, F>>,
    cache: RefCell<HomCache>,
}

impl<'f, F: Family> Morphism<F> for CompositionHom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }
        let res = self.operands.iter().rev().fold(f, |acc, m| m.apply(acc));
        self.cache.borrow_mut().insert(f, res);
        res
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        lowest_over(&self.operands)
    }
}

struct FixedPointHom<'f, F: Family> {
    inner: Hom<'f, F>,
    cache: RefCell<HomCache>,
}

impl<'f, F: Family> Morphism<F> for FixedPointHom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        if let Some(&res) = self.cache.borrow().get(&f) {
            return res;
        }

        let mut chain = vec![f];
        let mut current = f;
        loop {
            let next = self.inner.apply(current);
            if next == current {
                break;
            }
            if let Some(&known) = self.cache.borrow().get(&next) {
                current = known;
                break;
            }
            chain.push(next);
            current = next;
        }
        debug!("fixed point reached after {} iterations", chain.len() - 1);

        let mut cache = self.cache.borrow_mut();
        for handle in chain {
            cache.insert(handle, current);
        }
        current
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        self.inner.lowest_relevant_key()
    }
}

struct SaturatedHom<'f, F: Family> {
    family: &'f F,
    inner: Hom<'f, F>,
    level: F::Key,
    cache: RefCell<HomCache>,
}

impl<'f, F: Family> Morphism<F> for SaturatedHom<'f, F> {
    fn apply(&self, f: Ref) -> Ref {
        if f.is_terminal() {
            return self.inner.apply(f);
        }
        match self.family.key(f) {
            Some(k) if k < self.level => {
                if let Some(&res) = self.cache.borrow().get(&f) {
                    return res;
                }
                let res = self.family.map_children(f, &mut |child| self.apply(child));
                self.cache.borrow_mut().insert(f, res);
                res
            }
            _ => self.inner.apply(f),
        }
    }

    fn lowest_relevant_key(&self) -> Option<F::Key> {
        Some(self.level.clone())
    }
}
