//! Property-based tests for the node arena and easing curves.

use proptest::prelude::*;
use signer_scene::arena::Arena;
use signer_scene::{ease_in_out_quad, ease_in_quad, ease_out_quad, linear};

proptest! {
    // A handle is only ever valid immediately after the insert that produced
    // it; inserting past capacity never aliases an existing occupant.
    #[test]
    fn insert_up_to_capacity_never_aliases(capacity in 1usize..32) {
        let mut arena: Arena<u32> = Arena::new();
        let mut handles = Vec::new();
        for i in 0..capacity as u32 {
            let handle = arena.insert(i, capacity).expect("within capacity");
            handles.push((handle, i));
        }
        prop_assert!(arena.insert(999, capacity).is_none());
        for (handle, value) in handles {
            prop_assert_eq!(arena.get(handle).copied(), Some(value));
        }
    }

    // Removing and reinserting into the same slot bumps its generation, so
    // the old handle is never accepted again.
    #[test]
    fn stale_handle_never_reads_the_reused_slot(capacity in 1usize..16, value_a in any::<u32>(), value_b in any::<u32>()) {
        let mut arena: Arena<u32> = Arena::new();
        let first = arena.insert(value_a, capacity).expect("within capacity");
        arena.remove(first);
        let second = arena.insert(value_b, capacity);
        if let Some(second) = second {
            prop_assert_ne!(first, second);
            prop_assert_eq!(arena.get(first), None);
            prop_assert_eq!(arena.get(second).copied(), Some(value_b));
        }
    }

    // Every easing curve used for panel transitions is fixed at its
    // endpoints and stays within [0, 1] in between.
    #[test]
    fn easing_curves_stay_within_unit_range(t in 0.0f32..=1.0f32) {
        for curve in [linear, ease_in_quad, ease_out_quad, ease_in_out_quad] {
            let value = curve(t);
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }
}
