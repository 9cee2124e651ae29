//! Graphviz rendering of SFDD and MFDD graphs.
//!
//! Take edges are solid (labeled with the bound value for MFDDs), skip edges
//! are dashed, terminals are squares, and nodes sharing a key sit on one rank.

use std::collections::BTreeMap;
use std::fmt::{Display, Write as _};
use std::hash::Hash;

use crate::mfdd::Mfdd;
use crate::reference::Ref;
use crate::sfdd::Sfdd;

fn dot_id(f: Ref) -> String {
    match f {
        Ref::ZERO => "zero".to_string(),
        Ref::ONE => "one".to_string(),
        _ => format!("n{}", f.arena_index()),
    }
}

impl<K: Ord + Hash + Clone + Display> Sfdd<K> {
    pub fn to_dot(&self, roots: &[Ref]) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph sfdd {{")?;
        writeln!(dot, "node [shape=circle, fixedsize=true];")?;

        writeln!(dot, "{{ rank=sink")?;
        writeln!(dot, "zero [shape=square, label=\"∅\"];")?;
        writeln!(dot, "one [shape=square, label=\"ε\"];")?;
        writeln!(dot, "}}")?;

        let all_nodes = self.descendants(roots.iter().copied());

        // Nodes per key level.
        let mut levels = BTreeMap::<K, Vec<Ref>>::new();
        for &f in &all_nodes {
            let n = self.node(f);
            levels.entry(n.key).or_default().push(f);
        }
        for (key, level) in &levels {
            writeln!(dot, "{{ rank=same")?;
            for &f in level {
                writeln!(dot, "{} [label=\"{}\"];", dot_id(f), key)?;
            }
            writeln!(dot, "}}")?;
        }

        for &f in &all_nodes {
            let n = self.node(f);
            writeln!(dot, "{} -> {};", dot_id(f), dot_id(n.take))?;
            writeln!(dot, "{} -> {} [style=dashed];", dot_id(f), dot_id(n.skip))?;
        }

        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape=rect, label=\"{}\"];", i, root)?;
        }
        writeln!(dot, "}}")?;
        for (i, &root) in roots.iter().enumerate() {
            writeln!(dot, "r{} -> {};", i, dot_id(root))?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

impl<K, V> Mfdd<K, V>
where
    K: Ord + Hash + Clone + Display,
    V: Eq + Hash + Clone + Display,
{
    pub fn to_dot(&self, roots: &[Ref]) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph mfdd {{")?;
        writeln!(dot, "node [shape=circle, fixedsize=true];")?;

        writeln!(dot, "{{ rank=sink")?;
        writeln!(dot, "zero [shape=square, label=\"∅\"];")?;
        writeln!(dot, "one [shape=square, label=\"ε\"];")?;
        writeln!(dot, "}}")?;

        let all_nodes = self.descendants(roots.iter().copied());

        let mut levels = BTreeMap::<K, Vec<Ref>>::new();
        for &f in &all_nodes {
            let n = self.node(f);
            levels.entry(n.key).or_default().push(f);
        }
        for (key, level) in &levels {
            writeln!(dot, "{{ rank=same")?;
            for &f in level {
                writeln!(dot, "{} [label=\"{}\"];", dot_id(f), key)?;
            }
            writeln!(dot, "}}")?;
        }

        for &f in &all_nodes {
            let n = self.node(f);
            for (v, t) in &n.take {
                writeln!(dot, "{} -> {} [label=\"{}\"];", dot_id(f), dot_id(*t), v)?;
            }
            writeln!(dot, "{} -> {} [style=dashed];", dot_id(f), dot_id(n.skip))?;
        }

        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape=rect, label=\"{}\"];", i, root)?;
        }
        writeln!(dot, "}}")?;
        for (i, &root) in roots.iter().enumerate() {
            writeln!(dot, "r{} -> {};", i, dot_id(root))?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
