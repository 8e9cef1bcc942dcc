use core_state::{CaretSelectionManager, CaretSelectionManagerOptions};
use core_text::{LogicalDirection, TextPosition, TextSelection};
use proptest::prelude::*;

fn caret() -> impl Strategy<Value = TextSelection> {
    (0usize..6, 0usize..6)
        .prop_map(|(l, c)| TextSelection::caret(TextPosition::new(l, c), LogicalDirection::Forward))
}

proptest! {
    #[test]
    fn normalized_carets_are_sorted_unique_and_bounded(
        max in 1usize..8,
        carets in prop::collection::vec(caret(), 1..24),
        primary in any::<prop::sample::Index>(),
    ) {
        let options = CaretSelectionManagerOptions::new(max, true, true).unwrap();
        let manager = CaretSelectionManager::new(options);
        let primary_index = primary.index(carets.len());
        let requested = carets[primary_index].active();
        manager.set_carets(carets, primary_index);

        let state = manager.capture_state();
        prop_assert!(!state.is_empty());
        prop_assert!(state.len() <= max);
        prop_assert!(state.windows(2).all(|w| w[0].position() < w[1].position()));
        prop_assert_eq!(state.iter().filter(|c| c.is_primary).count(), 1);
        prop_assert_eq!(manager.primary_caret().map(|c| c.position()), Some(requested));
    }

    #[test]
    fn unsorted_manager_keeps_insertion_order(
        carets in prop::collection::vec(caret(), 1..12),
    ) {
        let options = CaretSelectionManagerOptions::new(64, false, false).unwrap();
        let manager = CaretSelectionManager::new(options);
        manager.set_carets(carets.clone(), 0);
        let got: Vec<_> = manager.capture_state().iter().map(|c| c.selection).collect();
        prop_assert_eq!(got, carets);
    }
}
