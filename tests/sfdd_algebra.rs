//! Core tests for the SFDD algebra.
//!
//! The heavy lifting is an exhaustive check over the universe of keys
//! `{1, 2, 3}`: its 8 possible members index the bits of a mask, so every one
//! of the 256 families corresponds to a `u16` mask and every set operation to
//! bit arithmetic. Handle equality against the re-encoded mask result checks
//! correctness and canonicity at once.

use num_bigint::BigUint;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use fdd_rs::{Ref, Sfdd};

/// The eight members over keys {1, 2, 3}; member `s` holds key `k` iff bit
/// `k - 1` of `s` is set.
fn member(s: usize) -> Vec<u32> {
    (1..=3).filter(|k| s & (1 << (k - 1)) != 0).collect()
}

/// Encodes the family whose members are the set bits of `mask`.
fn encode_mask(dd: &Sfdd<u32>, mask: u16) -> Ref {
    let members = (0..8).filter(|s| mask & (1 << s) != 0).map(member);
    dd.encode(members)
}

#[test]
fn basic_algebra_scenario() {
    let dd = Sfdd::<u32>::default();
    let a = dd.encode([vec![], vec![3, 5], vec![1, 3, 5]]);
    let b = dd.encode([vec![3, 5], vec![1, 3, 5], vec![4, 7]]);

    assert_eq!(dd.union(a, b), dd.encode([vec![], vec![3, 5], vec![1, 3, 5], vec![4, 7]]));
    assert_eq!(dd.intersection(a, b), dd.encode([vec![3, 5], vec![1, 3, 5]]));
    assert_eq!(dd.symmetric_difference(a, b), dd.encode([vec![], vec![4, 7]]));
    assert_eq!(dd.subtracting(a, b), dd.encode([vec![]]));

    assert_eq!(dd.count(a), BigUint::from(3u32));
    assert_eq!(dd.count(b), BigUint::from(3u32));
    assert_eq!(dd.count(dd.union(a, b)), BigUint::from(4u32));
    assert_eq!(dd.count(dd.intersection(a, b)), BigUint::from(2u32));
    assert_eq!(dd.count(dd.symmetric_difference(a, b)), BigUint::from(2u32));
    assert_eq!(dd.count(dd.subtracting(a, b)), BigUint::from(1u32));
}

#[test]
fn exhaustive_three_key_universe() {
    let dd = Sfdd::<u32>::default();
    let families: Vec<Ref> = (0..256).map(|mask| encode_mask(&dd, mask as u16)).collect();

    // Distinct masks denote distinct families.
    for i in 0..256 {
        for j in (i + 1)..256 {
            assert_ne!(families[i], families[j], "masks {:#x} and {:#x}", i, j);
        }
    }

    for (i, &a) in families.iter().enumerate() {
        let i = i as u16;
        assert_eq!(dd.count(a), BigUint::from(i.count_ones()));
        // ∅ is member 0.
        assert_eq!(dd.skip_most(a) == dd.one(), i & 1 != 0);

        for (j, &b) in families.iter().enumerate() {
            let j = j as u16;
            assert_eq!(dd.union(a, b), families[(i | j) as usize]);
            assert_eq!(dd.intersection(a, b), families[(i & j) as usize]);
            assert_eq!(dd.symmetric_difference(a, b), families[(i ^ j) as usize]);
            assert_eq!(dd.subtracting(a, b), families[(i & !j) as usize]);

            assert_eq!(dd.is_disjoint(a, b), i & j == 0);
            assert_eq!(dd.is_strict_subset(a, b), i != j && i & !j == 0);
        }
    }
}

#[test]
fn lattice_laws_on_random_triples() {
    let dd = Sfdd::<u32>::default();
    let families: Vec<Ref> = (0..256).map(|mask| encode_mask(&dd, mask as u16)).collect();

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..300 {
        let a = families[rng.gen_range(0..256)];
        let b = families[rng.gen_range(0..256)];
        let c = families[rng.gen_range(0..256)];

        // Associativity.
        assert_eq!(dd.union(dd.union(a, b), c), dd.union(a, dd.union(b, c)));
        assert_eq!(
            dd.intersection(dd.intersection(a, b), c),
            dd.intersection(a, dd.intersection(b, c))
        );
        // Distributivity.
        assert_eq!(
            dd.intersection(a, dd.union(b, c)),
            dd.union(dd.intersection(a, b), dd.intersection(a, c))
        );
        // Absorption.
        assert_eq!(dd.union(a, dd.intersection(a, b)), a);
        assert_eq!(dd.intersection(a, dd.union(a, b)), a);
        // Symmetric difference via union and subtraction.
        assert_eq!(
            dd.symmetric_difference(a, b),
            dd.subtracting(dd.union(a, b), dd.intersection(a, b))
        );
        // Inclusion–exclusion on counts.
        assert_eq!(
            dd.count(dd.union(a, b)) + dd.count(dd.intersection(a, b)),
            dd.count(a) + dd.count(b)
        );
    }
}

#[test]
fn containment_agrees_with_enumeration() {
    let dd = Sfdd::<u32>::default();
    for mask in [0u16, 1, 0x35, 0x7b, 0xff, 0xa0] {
        let f = encode_mask(&dd, mask);
        for s in 0..8 {
            let expected = mask & (1 << s) != 0;
            assert_eq!(dd.contains(f, member(s)), expected, "mask {:#x}, member {}", mask, s);
        }
        let enumerated: Vec<Vec<u32>> = dd.members(f).collect();
        assert_eq!(enumerated.len() as u32, mask.count_ones());
        for m in &enumerated {
            assert!(dd.contains(f, m.iter().copied()));
        }
    }
}

#[test]
fn canonicity_across_operation_paths() {
    let dd = Sfdd::<u32>::default();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let families: Vec<Ref> = (0..256).map(|mask| encode_mask(&dd, mask as u16)).collect();

    for _ in 0..100 {
        let mut f = families[rng.gen_range(0..256)];
        for _ in 0..4 {
            let g = families[rng.gen_range(0..256)];
            f = match rng.gen_range(0..4) {
                0 => dd.union(f, g),
                1 => dd.intersection(f, g),
                2 => dd.symmetric_difference(f, g),
                _ => dd.subtracting(f, g),
            };
        }
        // Whatever the path, the handle equals the re-encoding of its members.
        let members: Vec<Vec<u32>> = dd.members(f).collect();
        assert_eq!(dd.encode(members), f);
    }
}

#[test]
fn member_sequence_variants_encode_first() {
    let dd = Sfdd::<u32>::default();
    let f = dd.encode([vec![1], vec![2, 4]]);

    assert_eq!(
        dd.union_members(f, [vec![2, 4], vec![6]]),
        dd.encode([vec![1], vec![2, 4], vec![6]])
    );
    assert_eq!(dd.intersection_members(f, [vec![2, 4]]), dd.encode([vec![2, 4]]));
    assert_eq!(
        dd.symmetric_difference_members(f, [vec![1], vec![6]]),
        dd.encode([vec![2, 4], vec![6]])
    );
    assert_eq!(dd.subtracting_members(f, [vec![1]]), dd.encode([vec![2, 4]]));
}

#[test]
fn structural_invariants_hold_after_arbitrary_operations() {
    let dd = Sfdd::<u32>::default();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let mut roots = Vec::new();
    for _ in 0..60 {
        let a = encode_mask(&dd, rng.gen());
        let b = encode_mask(&dd, rng.gen());
        roots.push(match rng.gen_range(0..4) {
            0 => dd.union(a, b),
            1 => dd.intersection(a, b),
            2 => dd.symmetric_difference(a, b),
            _ => dd.subtracting(a, b),
        });
    }

    for node in dd.descendants(roots) {
        let n = dd.node(node);
        // No vanishing take.
        assert_ne!(n.take, dd.zero());
        // Keys strictly increase along every edge.
        if let Some(k) = dd.key(n.take) {
            assert!(n.key < k);
        }
        if let Some(k) = dd.key(n.skip) {
            assert!(n.key < k);
        }
    }
}

#[test]
fn big_counts_do_not_overflow() {
    // The family of all subsets of 1..=96 has 2^96 members.
    let dd = Sfdd::<u32>::default();
    let mut f = dd.one();
    for k in (1..=96).rev() {
        f = dd.mk_node(k, f, f);
    }
    assert_eq!(dd.count(f), BigUint::from(2u32).pow(96));
}
