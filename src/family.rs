//! The seam between the concrete factories and the generic morphism layer.

use std::hash::Hash;

use crate::reference::Ref;

/// A decision-diagram family factory, as seen by the generic morphism layer.
///
/// Implemented by [`Sfdd`](crate::sfdd::Sfdd) and [`Mfdd`](crate::mfdd::Mfdd).
/// The morphism combinators and the saturation wrapper are written against this
/// trait only, so one implementation serves both families.
pub trait Family {
    /// The ordered key domain.
    type Key: Ord + Hash + Clone;
    /// Structural identity of the family's specific morphisms, used for
    /// interning in the morphism factory.
    type MorphKey: Eq + Hash + Clone;

    /// The empty family.
    fn zero(&self) -> Ref;
    /// The family containing only the empty member.
    fn one(&self) -> Ref;

    fn union(&self, lhs: Ref, rhs: Ref) -> Ref;
    fn intersection(&self, lhs: Ref, rhs: Ref) -> Ref;
    fn symmetric_difference(&self, lhs: Ref, rhs: Ref) -> Ref;
    fn subtracting(&self, lhs: Ref, rhs: Ref) -> Ref;

    /// Union of arbitrarily many operands; `zero` for an empty list.
    fn union_all(&self, operands: &[Ref]) -> Ref;
    /// Intersection of arbitrarily many operands; `zero` for an empty list.
    fn intersection_all(&self, operands: &[Ref]) -> Ref;

    /// The key of an internal node, `None` for terminals.
    fn key(&self, f: Ref) -> Option<Self::Key>;

    /// Rebuilds an internal node with `g` applied to every child — the take
    /// subtree(s) and the skip subtree. Must not be called on terminals.
    fn map_children(&self, f: Ref, g: &mut dyn FnMut(Ref) -> Ref) -> Ref;
}
