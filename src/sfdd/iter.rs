use std::hash::Hash;

use rand::Rng;

use super::Sfdd;
use crate::reference::Ref;

impl<K: Ord + Hash + Clone> Sfdd<K> {
    /// Iterates over the members of a family, each as a sorted key vector.
    ///
    /// The order is deterministic: at every node the take branch is explored
    /// before the skip branch.
    pub fn members(&self, f: Ref) -> Members<'_, K> {
        Members::new(self, f)
    }

    /// A member chosen by uniform structural choices.
    ///
    /// At each node the walk picks the take or the skip branch with equal
    /// probability (take only, when skip is `zero`). The distribution is
    /// uniform over branch decisions, not over members. `zero` yields `None`;
    /// `one` yields the empty member.
    pub fn random_element<R: Rng + ?Sized>(&self, f: Ref, rng: &mut R) -> Option<Vec<K>> {
        if f == Ref::ZERO {
            return None;
        }
        let mut member = Vec::new();
        let mut current = f;
        while current != Ref::ONE {
            let n = self.node(current);
            if n.skip == Ref::ZERO || rng.gen_bool(0.5) {
                member.push(n.key);
                current = n.take;
            } else {
                current = n.skip;
            }
        }
        Some(member)
    }
}

/// Depth-first member iterator over an SFDD.
pub struct Members<'a, K> {
    dd: &'a Sfdd<K>,
    stack: Vec<(Ref, Vec<K>)>,
}

impl<'a, K: Ord + Hash + Clone> Members<'a, K> {
    pub(crate) fn new(dd: &'a Sfdd<K>, root: Ref) -> Self {
        Members {
            dd,
            stack: vec![(root, Vec::new())],
        }
    }
}

impl<'a, K: Ord + Hash + Clone> Iterator for Members<'a, K> {
    type Item = Vec<K>;

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
            let mut taken = member;
            taken.push(n.key);
            self.stack.push((n.take, taken));
        }
        None
    }
}
