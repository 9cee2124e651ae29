//! Petri-net state-space exploration through MFDD morphisms.
//!
//! The net has 7 places and 10 transitions: a ring `p0 → p1 → … → p6 → p0`
//! plus three shortcut arcs. Every transition moves one token, so the token
//! count is conserved and, because the ring visits every place, every
//! distribution of the initial tokens is reachable: starting from
//! `p0 ↦ N` the state space is exactly the C(N+6, 6) compositions of N over
//! 7 places. The reachability set is the fixed point of the union of the
//! identity with the saturated transition morphisms.

use num_bigint::BigUint;

use fdd_rs::{Hom, HomFactory, Mfdd};

const PLACES: u32 = 7;

type Net = Mfdd<u32, u32>;

/// Arcs `(source, target)` of the net.
fn transitions() -> Vec<(u32, u32)> {
    vec![
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 4),
        (4, 5),
        (5, 6),
        (6, 0),
        (1, 3),
        (2, 5),
        (4, 0),
    ]
}

/// Rebinds `place` from `from` to `to`: filter the marking, clear the key,
/// insert the new binding (composition applies right-to-left).
fn rebind<'f>(homs: &HomFactory<'f, Net>, place: u32, from: u32, to: u32) -> Hom<'f, Net> {
    homs.composition_all(&[
        homs.insert([(place, to)]),
        homs.remove_keys([place]),
        homs.filter_containing([(place, vec![from])]),
    ])
}

/// Consumes one token at `place`; markings with an empty place drop out.
fn take_token<'f>(homs: &HomFactory<'f, Net>, place: u32, bound: u32) -> Hom<'f, Net> {
    let branches: Vec<Hom<'f, Net>> =
        (1..=bound).map(|v| rebind(homs, place, v, v - 1)).collect();
    homs.union_all(&branches)
}

/// Produces one token at `place`.
fn give_token<'f>(homs: &HomFactory<'f, Net>, place: u32, bound: u32) -> Hom<'f, Net> {
    let branches: Vec<Hom<'f, Net>> =
        (0..bound).map(|v| rebind(homs, place, v, v + 1)).collect();
    homs.union_all(&branches)
}

/// Size of the reachability set from `p0 ↦ tokens`, computed symbolically.
fn reachable_markings(tokens: u32) -> BigUint {
    let dd = Net::default();
    let homs = HomFactory::new(&dd);

    let marking: Vec<(u32, u32)> = (0..PLACES)
        .map(|p| (p, if p == 0 { tokens } else { 0 }))
        .collect();
    let initial = dd.encode([marking]);

    let mut steps = vec![homs.identity()];
    for (source, target) in transitions() {
        let fire = homs.composition(
            &homs.saturate(&give_token(&homs, target, tokens)),
            &homs.saturate(&take_token(&homs, source, tokens)),
        );
        steps.push(fire);
    }
    let closure = homs.fixed_point(&homs.union_all(&steps));

    dd.count(closure.apply(initial))
}

/// Explicit-state BFS over the same net, for cross-checking small instances.
fn reachable_explicit(tokens: u32) -> u64 {
    use std::collections::{HashSet, VecDeque};

    let arcs = transitions();
    let mut start = [0u32; PLACES as usize];
    start[0] = tokens;

    let mut seen = HashSet::new();
    seen.insert(start);
    let mut queue = VecDeque::from([start]);
    while let Some(state) = queue.pop_front() {
        for &(source, target) in &arcs {
            if state[source as usize] > 0 {
                let mut next = state;
                next[source as usize] -= 1;
                next[target as usize] += 1;
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    seen.len() as u64
}

/// C(tokens + places - 1, places - 1): compositions of `tokens` over `places`.
fn distributions(tokens: u64, places: u64) -> u64 {
    let mut result = 1u64;
    for i in 1..places {
        result = result * (tokens + i) / i;
    }
    result
}

#[test]
fn small_instances_match_explicit_search() {
    for tokens in 1..=4 {
        let symbolic = reachable_markings(tokens);
        let explicit = reachable_explicit(tokens);
        assert_eq!(symbolic, BigUint::from(explicit), "tokens = {}", tokens);
        assert_eq!(explicit, distributions(tokens as u64, PLACES as u64));
    }
}

#[test]
fn the_count_is_reproducible_across_factories() {
    let first = reachable_markings(6);
    let second = reachable_markings(6);
    assert_eq!(first, second);
    assert_eq!(first, BigUint::from(distributions(6, PLACES as u64)));
}

#[test]
fn twenty_four_tokens_reach_all_distributions() {
    // C(30, 6) markings.
    assert_eq!(distributions(24, PLACES as u64), 593775);
    assert_eq!(reachable_markings(24), BigUint::from(593775u32));
}
