//! # fdd-rs: Set-Family and Map-Family Decision Diagrams in Rust
//!
//! **`fdd-rs`** is a manager-centric library for **canonical, hash-consed
//! families of sets and maps**. An [`Sfdd`][crate::sfdd::Sfdd] compactly
//! represents a collection of sets over an ordered key domain; an
//! [`Mfdd`][crate::mfdd::Mfdd] represents a collection of key→value maps.
//! Both are reduced, shared DAGs: for a fixed key ordering every family has
//! exactly one representation, so handle equality *is* family equality —
//! which makes union, intersection, containment, and counting fast.
//!
//! ## Key Features
//!
//! - **Manager-Centric Architecture**: all operations go through the
//!   [`Sfdd`][crate::sfdd::Sfdd] / [`Mfdd`][crate::mfdd::Mfdd] factory, which
//!   enforces structural sharing (hash consing) and the canonical form.
//! - **Lightweight Handles**: families are referenced by copyable
//!   [`Ref`][crate::reference::Ref] handles backed by a stable bucketed arena.
//! - **Cached Algebra**: union, intersection, symmetric difference, and
//!   subtraction are memoized per operation, including n-ary variants.
//! - **Morphisms**: first-class, interned, composable transformations
//!   ([`HomFactory`][crate::hom::HomFactory]) — insert, remove, filters, map,
//!   inductive recursion, fixed points — plus *saturation*, which pushes a
//!   morphism below the keys it cannot affect.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fdd_rs::{HomFactory, Sfdd};
//!
//! // 1. Initialize the factory
//! let dd = Sfdd::<u32>::default();
//!
//! // 2. Encode families of sets
//! let a = dd.encode([vec![1, 2], vec![1, 3]]);
//! let b = dd.encode([vec![1, 2]]);
//!
//! // 3. Combine them through the factory
//! let both = dd.union(a, b);
//! assert_eq!(dd.count(both), 2u32.into());
//! assert!(dd.is_strict_subset(b, a));
//!
//! // 4. Transform them with morphisms
//! let homs = HomFactory::new(&dd);
//! let add5 = homs.insert([5]);
//! assert!(dd.contains(add5.apply(b), [1, 2, 5]));
//! ```
//!
//! ## Core Components
//!
//! - **[`sfdd`]**: the set-family factory, algebra, enumeration, and morphisms.
//! - **[`mfdd`]**: the map-family counterpart.
//! - **[`hom`]**: the generic morphism framework — combinators, fixed points,
//!   saturation — shared by both families through the [`family::Family`] seam.
//! - **[`storage`]**: the bucketed uniqueness arena behind both factories.
//! - **[`dot`]**: Graphviz rendering for debugging and papers.

pub mod cache;
pub mod dot;
pub mod family;
pub mod hom;
pub mod mfdd;
pub mod reference;
pub mod sfdd;
pub mod storage;
pub mod utils;

pub use crate::family::Family;
pub use crate::hom::{Hom, HomFactory, Morphism};
pub use crate::mfdd::{Mfdd, MfddNode};
pub use crate::reference::Ref;
pub use crate::sfdd::{Sfdd, SfddNode};
