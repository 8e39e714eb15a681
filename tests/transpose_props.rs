//! Property-based coverage of the forward-index transpose.

use proptest::prelude::*;

use elem_restrict::debug_invariants::DebugInvariants;
use elem_restrict::transpose::TransposedIndex;

/// A forward index over a random L-vector size, entries all in range.
fn forward_index() -> impl Strategy<Value = (Vec<u32>, usize)> {
    (1usize..48).prop_flat_map(|l_size| {
        (
            proptest::collection::vec(0u32..l_size as u32, 0..256),
            Just(l_size),
        )
    })
}

proptest! {
    #[test]
    fn offsets_are_monotone_and_complete((forward, l_size) in forward_index()) {
        let t = TransposedIndex::build(&forward, l_size);
        let offsets = t.offsets();
        prop_assert_eq!(offsets.len(), l_size + 1);
        prop_assert_eq!(offsets[0], 0);
        prop_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(offsets[l_size] as usize, forward.len());
        prop_assert!(t.validate_invariants().is_ok());
    }

    #[test]
    fn runs_recover_exactly_the_referencing_positions((forward, l_size) in forward_index()) {
        let t = TransposedIndex::build(&forward, l_size);
        for g in 0..l_size {
            let run: Vec<usize> = t.slot_positions(g).iter().map(|&p| p as usize).collect();
            let expected: Vec<usize> = forward
                .iter()
                .enumerate()
                .filter(|&(_, &slot)| slot as usize == g)
                .map(|(position, _)| position)
                .collect();
            // Stability: positions appear in forward-array order.
            prop_assert_eq!(run, expected);
        }
    }

    #[test]
    fn packed_positions_are_a_permutation((forward, l_size) in forward_index()) {
        let t = TransposedIndex::build(&forward, l_size);
        let mut positions: Vec<u32> = t.indices().to_vec();
        positions.sort_unstable();
        let expected: Vec<u32> = (0..forward.len() as u32).collect();
        prop_assert_eq!(positions, expected);
    }
}

#[test]
fn zero_elements_yield_all_zero_offsets() {
    let t = TransposedIndex::build(&[], 7);
    assert_eq!(t.offsets(), &[0u32; 8]);
    assert_eq!(t.len(), 0);
}
