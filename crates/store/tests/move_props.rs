use proptest::prelude::*;
use roster_core::User;
use roster_store::{insertion_index, OrderedStore};

fn users(n: usize) -> Vec<User> {
    (1..=n as u64).map(|id| User { id, name: format!("u{id}"), ..Default::default() }).collect()
}

/// Reference: remove the dragged id, then insert in front of wherever the target now sits.
fn reference_move(ids: &[u64], dragged: u64, target: u64) -> Vec<u64> {
    if dragged == target { return ids.to_vec(); }
    let mut out: Vec<u64> = ids.iter().copied().filter(|id| *id != dragged).collect();
    let at = out.iter().position(|id| *id == target).unwrap();
    out.insert(at, dragged);
    out
}

proptest! {
    #[test]
    fn move_before_matches_remove_then_insert(n in 1usize..20, a in 0usize..20, b in 0usize..20) {
        let a = a % n;
        let b = b % n;
        let mut store = OrderedStore::new();
        store.initialize(users(n));
        let before = store.snapshot().ids();
        let dragged = before[a];
        let target = before[b];
        store.move_before(dragged, target).unwrap();
        let after = store.snapshot().ids();
        prop_assert_eq!(after.clone(), reference_move(&before, dragged, target));
        if dragged != target {
            let d = after.iter().position(|id| *id == dragged).unwrap();
            prop_assert_eq!(after[d + 1], target);
        }
    }

    #[test]
    fn move_preserves_relative_order_of_others(n in 2usize..20, a in 0usize..20, b in 0usize..20) {
        let a = a % n;
        let b = b % n;
        let mut store = OrderedStore::new();
        store.initialize(users(n));
        let before = store.snapshot().ids();
        let dragged = before[a];
        store.move_before(dragged, before[b]).unwrap();
        let others_before: Vec<u64> = before.iter().copied().filter(|id| *id != dragged).collect();
        let others_after: Vec<u64> = store.snapshot().ids().into_iter().filter(|id| *id != dragged).collect();
        prop_assert_eq!(others_before, others_after);
    }

    #[test]
    fn insertion_index_never_exceeds_bounds(from in 0usize..50, target in 0usize..50) {
        let at = insertion_index(from, target);
        prop_assert!(at <= target);
        prop_assert!(at + 1 >= target || from > target);
    }
}
