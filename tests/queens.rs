//! N-Queens through SFDD morphisms.
//!
//! Cells are keys `r * n + c`. The placement family (one queen per row) is
//! built with insert morphisms; attacking pairs are then removed by
//! subtracting the image of a saturated `filter_containing` morphism for each
//! conflicting cell pair.

use num_bigint::BigUint;

use fdd_rs::{HomFactory, Ref, Sfdd};

fn queens(n: usize) -> BigUint {
    let dd = Sfdd::<u32>::default();
    let homs = HomFactory::new(&dd);
    let cell = |r: usize, c: usize| (r * n + c) as u32;

    // One queen per row.
    let mut board = dd.one();
    for r in 0..n {
        let placements: Vec<Ref> = (0..n)
            .map(|c| homs.insert([cell(r, c)]).apply(board))
            .collect();
        board = dd.union_all(&placements);
    }

    // Subtract every placement with two queens attacking each other.
    for r1 in 0..n {
        for c1 in 0..n {
            for r2 in (r1 + 1)..n {
                for c2 in 0..n {
                    let attacks = c1 == c2 || r2 - r1 == c1.abs_diff(c2);
                    if !attacks {
                        continue;
                    }
                    let conflict = homs.saturate(&homs.filter_containing([cell(r1, c1), cell(r2, c2)]));
                    board = dd.subtracting(board, conflict.apply(board));
                }
            }
        }
    }

    dd.count(board)
}

#[test]
fn tiny_boards() {
    assert_eq!(queens(1), BigUint::from(1u32));
    assert_eq!(queens(2), BigUint::ZERO);
    assert_eq!(queens(3), BigUint::ZERO);
}

#[test]
fn four_queens_has_two_solutions() {
    assert_eq!(queens(4), BigUint::from(2u32));
}

#[test]
fn eight_queens_has_ninety_two_solutions() {
    assert_eq!(queens(8), BigUint::from(92u32));
}
