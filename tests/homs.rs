//! Tests for the morphism framework and the SFDD-specific morphisms:
//! combinator semantics, interning, fixed points, saturation, and the
//! inductive recursion.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use fdd_rs::{HomFactory, Ref, Sfdd};

fn member(s: usize) -> Vec<u32> {
    (1..=3).filter(|k| s & (1 << (k - 1)) != 0).collect()
}

fn encode_mask(dd: &Sfdd<u32>, mask: u16) -> Ref {
    dd.encode((0..8).filter(|s| mask & (1 << s) != 0).map(member))
}

#[test]
fn insert_scenario() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let insert = homs.insert([2, 5]);

    let f = dd.encode([vec![1, 2], vec![1, 3]]);
    assert_eq!(insert.apply(f), dd.encode([vec![1, 2, 5], vec![1, 2, 3, 5]]));
    assert_eq!(insert.apply(dd.zero()), dd.zero());
    assert_eq!(insert.apply(dd.one()), dd.encode([vec![2, 5]]));
}

#[test]
fn remove_and_filters() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let f = dd.encode([vec![], vec![1, 2], vec![2, 3], vec![1, 3]]);

    assert_eq!(homs.remove([2]).apply(f), dd.encode([vec![], vec![1], vec![3], vec![1, 3]]));
    assert_eq!(homs.remove([1, 3]).apply(f), dd.encode([vec![], vec![2]]));
    assert_eq!(homs.remove([7]).apply(f), f);

    assert_eq!(homs.filter_containing([2]).apply(f), dd.encode([vec![1, 2], vec![2, 3]]));
    assert_eq!(homs.filter_containing([1, 3]).apply(f), dd.encode([vec![1, 3]]));
    assert_eq!(homs.filter_containing([7]).apply(f), dd.zero());
    assert_eq!(homs.filter_containing([2]).apply(dd.one()), dd.zero());

    assert_eq!(homs.filter_excluding([2]).apply(f), dd.encode([vec![], vec![1, 3]]));
    assert_eq!(homs.filter_excluding([1, 2]).apply(f), dd.encode([vec![]]));
    assert_eq!(homs.filter_excluding([7]).apply(f), f);
    assert_eq!(homs.filter_excluding([2]).apply(dd.one()), dd.one());
}

#[test]
fn identity_and_constant() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let f = dd.encode([vec![1], vec![2]]);
    let g = dd.encode([vec![3]]);

    assert_eq!(homs.identity().apply(f), f);
    assert_eq!(homs.constant(g).apply(f), g);
    assert_eq!(homs.constant(g).apply(dd.zero()), g);
}

#[test]
fn combinators_agree_with_the_algebra() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let mut rng = ChaCha8Rng::seed_from_u64(23);

    for _ in 0..50 {
        let x = encode_mask(&dd, rng.gen_range(0u16..256));
        let g = encode_mask(&dd, rng.gen_range(0u16..256));

        let constant = homs.constant(g);
        let identity = homs.identity();

        let union = homs.union(&constant, &identity);
        assert_eq!(union.apply(x), dd.union(x, g));

        let intersection = homs.intersection(&constant, &identity);
        assert_eq!(intersection.apply(x), dd.intersection(x, g));

        let symdiff = homs.symmetric_difference(&constant, &identity);
        assert_eq!(symdiff.apply(x), dd.symmetric_difference(x, g));

        let subtraction = homs.subtraction(&identity, &constant);
        assert_eq!(subtraction.apply(x), dd.subtracting(x, g));
    }
}

#[test]
fn composition_applies_right_to_left() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let f = dd.encode([vec![1], vec![2]]);

    // filter ∘ insert: every member gains 3, then passes the filter.
    let composed = homs.composition(&homs.filter_containing([3]), &homs.insert([3]));
    assert_eq!(composed.apply(f), dd.encode([vec![1, 3], vec![2, 3]]));

    // insert ∘ filter: only members already containing 3 survive; none do.
    let other_way = homs.composition(&homs.insert([3]), &homs.filter_containing([3]));
    assert_eq!(other_way.apply(f), dd.zero());

    let three_stage = homs.composition_all(&[
        homs.remove([1]),
        homs.insert([5]),
        homs.filter_containing([2]),
    ]);
    assert_eq!(three_stage.apply(f), dd.encode([vec![2, 5]]));
}

#[test]
fn morphisms_are_interned_structurally() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);

    assert_eq!(homs.identity(), homs.identity());
    assert_eq!(homs.insert([2, 5]), homs.insert([5, 2, 2]));
    assert_ne!(homs.insert([2]), homs.remove([2]));

    let a = homs.insert([1]);
    let b = homs.remove([2]);
    assert_eq!(homs.union(&a, &b), homs.union(&b, &a));
    assert_eq!(homs.union_all(&[a.clone(), b.clone(), a.clone()]), homs.union(&a, &b));
    // A single distinct operand collapses to the operand itself.
    assert_eq!(homs.union_all(&[a.clone(), a.clone()]), a);
    // Composition is not commutative, so operand order mints instances.
    assert_ne!(homs.composition(&a, &b), homs.composition(&b, &a));

    let before = homs.interned_count();
    let _ = homs.insert([2, 5]);
    let _ = homs.union(&b, &a);
    assert_eq!(homs.interned_count(), before);

    // Closure-carrying morphisms are identified by construction.
    assert_ne!(homs.map(|k| k + 1), homs.map(|k| k + 1));

    // The erased wrapper hashes consistently with its equality.
    let mut set = std::collections::HashSet::new();
    set.insert(homs.insert([2, 5]));
    assert!(set.contains(&homs.insert([2, 5])));
    assert!(!set.contains(&homs.insert([2])));
}

#[test]
fn fixed_point_reaches_a_fixed_point() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);

    // Members containing 1 spawn a variant that also contains 2; iterating
    // with the identity closes the family under that rule.
    let rule = homs.composition(&homs.insert([2]), &homs.filter_containing([1]));
    let step = homs.union(&homs.identity(), &rule);
    let closure = homs.fixed_point(&step);

    let f = dd.encode([vec![1], vec![3]]);
    let result = closure.apply(f);
    assert_eq!(result, dd.encode([vec![1], vec![1, 2], vec![3]]));
    // The result is a fixed point of the step (and of the closure).
    assert_eq!(step.apply(result), result);
    assert_eq!(closure.apply(result), result);

    assert_eq!(closure.apply(dd.zero()), dd.zero());
}

#[test]
fn saturation_preserves_semantics() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let mut rng = ChaCha8Rng::seed_from_u64(99);

    let morphisms = [
        homs.insert([6]),
        homs.remove([5, 6]),
        homs.filter_containing([5]),
        homs.filter_excluding([6]),
    ];
    for _ in 0..40 {
        // Families over keys 1..=7 with members below, at, and above the
        // morphisms' lowest relevant keys.
        let f = dd.encode((0..6).map(|_| {
            let mask: u8 = rng.gen();
            (1..=7).filter(|k| mask & (1 << (k - 1)) != 0).collect::<Vec<u32>>()
        }));
        for m in &morphisms {
            let saturated = homs.saturate(m);
            assert_eq!(saturated.apply(f), m.apply(f));
        }
    }

    // Saturating at an explicit level below the morphism's own is also sound.
    let m = homs.insert([6]);
    let f = dd.encode([vec![1, 2, 6], vec![3]]);
    assert_eq!(homs.saturate_to(&m, 4).apply(f), m.apply(f));
}

#[test]
fn saturation_shares_work_across_untouched_prefixes() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let m = homs.saturate(&homs.insert([100]));

    let f = dd.encode([vec![1, 100], vec![2], vec![3, 50]]);
    let g = m.apply(f);
    assert_eq!(g, dd.encode([vec![1, 100], vec![2, 100], vec![3, 50, 100]]));
}

#[test]
fn map_rewrites_keys() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let double = homs.map(|k| k * 2);

    let f = dd.encode([vec![1, 3], vec![2]]);
    assert_eq!(double.apply(f), dd.encode([vec![2, 6], vec![4]]));
    assert_eq!(double.apply(dd.zero()), dd.zero());
    assert_eq!(double.apply(dd.one()), dd.one());
}

#[test]
fn inductive_identity_and_pruning() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let f = dd.encode([vec![1], vec![1, 2, 3], vec![2, 4], vec![]]);

    // Recursing with `this` on both children and substituting `one` is the
    // identity.
    let identity = homs.inductive(None, |this, _| (this.clone(), this.clone()));
    assert_eq!(identity.apply(f), f);

    // Cutting the take branch at keys >= 3 keeps exactly the members whose
    // keys all lie below 3.
    let drop_take = homs.constant(dd.zero());
    let below3 = homs.inductive(None, {
        let dd = &dd;
        move |this, node| {
            if dd.key(node).expect("inductive steps only see internal nodes") >= 3 {
                (drop_take.clone(), this.clone())
            } else {
                (this.clone(), this.clone())
            }
        }
    });
    assert_eq!(below3.apply(f), dd.encode([vec![], vec![1]]));
    assert_eq!(below3.apply(dd.zero()), dd.zero());

    // A custom substitute rewrites the members themselves.
    let erase = homs.inductive(Some(dd.zero()), |this, _| (this.clone(), this.clone()));
    assert_eq!(erase.apply(f), dd.zero());
}

#[test]
#[should_panic(expected = "Key list must not be empty")]
fn empty_key_list_is_rejected() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let _ = homs.insert(Vec::<u32>::new());
}

#[test]
#[should_panic(expected = "at least one operand")]
fn empty_combinator_operands_are_rejected() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let _ = homs.union_all(&[]);
}

#[test]
#[should_panic(expected = "lowest relevant key")]
fn saturating_an_unsaturable_morphism_is_rejected() {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let identity = homs.identity();
    let _ = homs.saturate(&identity);
}
