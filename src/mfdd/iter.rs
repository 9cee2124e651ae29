use std::hash::Hash;

use rand::Rng;

use super::Mfdd;
use crate::reference::Ref;

impl<K: Ord + Hash + Clone, V: Eq + Hash + Clone> Mfdd<K, V> {
    /// Iterates over the members of a family, each as a key-sorted binding
    /// vector.
    ///
    /// At every node all take entries are visited (in interned order) before
    /// the skip branch, so the order is deterministic for a given factory.
    pub fn members(&self, f: Ref) -> Members<'_, K, V> {
        Members::new(self, f)
    }

    /// A member chosen by uniform structural choices.
    ///
    /// At each node the walk takes a uniformly chosen take entry or the skip
    /// branch with equal probability (a take entry only, when skip is `zero`).
    /// `zero` yields `None`; `one` yields the empty member.
    pub fn random_element<R: Rng + ?Sized>(&self, f: Ref, rng: &mut R) -> Option<Vec<(K, V)>> {
        if f == Ref::ZERO {
            return None;
        }
        let mut member = Vec::new();
        let mut current = f;
        while current != Ref::ONE {
            let n = self.node(current);
            if n.skip == Ref::ZERO || rng.gen_bool(0.5) {
                let (v, t) = &n.take[rng.gen_range(0..n.take.len())];
                member.push((n.key.clone(), v.clone()));
                current = *t;
            } else {
                current = n.skip;
            }
        }
        Some(member)
    }
}

/// Depth-first member iterator over an MFDD.
pub struct Members<'a, K, V> {
    dd: &'a Mfdd<K, V>,
    stack: Vec<(Ref, Vec<(K, V)>)>,
}

impl<'a, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Members<'a, K, V> {
    pub(crate) fn new(dd: &'a Mfdd<K, V>, root: Ref) -> Self {
        Members {
            dd,
            stack: vec![(root, Vec::new())],
        }
    }
}

impl<'a, K: Ord + Hash + Clone, V: Eq + Hash + Clone> Iterator for Members<'a, K, V> {
    type Item = Vec<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, member)) = self.stack.pop() {
            if node == Ref::ZERO {
                continue;
            }
            if node == Ref::ONE {
                return Some(member);
            }
            let n = self.dd.node(node);
            self.stack.push((n.skip, member.clone()));
            for (v, t) in n.take.iter().rev() {
                let mut taken = member.clone();
                taken.push((n.key.clone(), v.clone()));
                self.stack.push((*t, taken));
            }
        }
        None
    }
}
