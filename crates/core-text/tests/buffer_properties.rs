//! Property-based tests: the piece table behaves like a plain `String`
//! under arbitrary edit sequences, and undo walks back through them.

use core_text::{DEFAULT_COALESCE_WINDOW, PieceTreeTextBuffer};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Edit {
    Insert { at: usize, text: String },
    Delete { at: usize, len: usize },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<usize>(), "[a-zé\n]{0,6}").prop_map(|(at, text)| Edit::Insert { at, text }),
        (any::<usize>(), 0usize..8).prop_map(|(at, len)| Edit::Delete { at, len }),
    ]
}

fn char_to_byte(s: &str, idx: usize) -> usize {
    s.char_indices().nth(idx).map_or(s.len(), |(i, _)| i)
}

fn apply_reference(reference: &mut String, edit: &Edit) {
    let len = reference.chars().count();
    match edit {
        Edit::Insert { at, text } => {
            let at = at % (len + 1);
            reference.insert_str(char_to_byte(reference, at), text);
        }
        Edit::Delete { at, len: n } => {
            let at = at % (len + 1);
            let end = (at + n).min(len);
            let (a, b) = (char_to_byte(reference, at), char_to_byte(reference, end));
            reference.replace_range(a..b, "");
        }
    }
}

fn apply_buffer(buffer: &mut PieceTreeTextBuffer, edit: &Edit) {
    let len = buffer.len();
    match edit {
        Edit::Insert { at, text } => buffer.insert(at % (len + 1), text).unwrap(),
        Edit::Delete { at, len: n } => {
            buffer.delete(at % (len + 1), *n).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn matches_reference_string(
        initial in "[a-z\n]{0,20}",
        edits in prop::collection::vec(edit_strategy(), 0..40),
    ) {
        let mut buffer = PieceTreeTextBuffer::new(&initial);
        let mut reference = initial.clone();
        for edit in &edits {
            apply_buffer(&mut buffer, edit);
            apply_reference(&mut reference, edit);
        }
        prop_assert_eq!(buffer.len(), reference.chars().count());
        prop_assert_eq!(buffer.text(0, buffer.len()).unwrap(), reference.clone());
        prop_assert_eq!(buffer.chunks().collect::<String>(), reference);
    }

    #[test]
    fn undo_all_restores_initial(
        initial in "[a-z]{0,10}",
        edits in prop::collection::vec(edit_strategy(), 1..20),
    ) {
        let mut buffer = PieceTreeTextBuffer::with_coalesce_window(&initial, Duration::ZERO);
        for edit in &edits {
            apply_buffer(&mut buffer, edit);
        }
        let after = buffer.to_string();
        while buffer.undo().unwrap() {}
        prop_assert_eq!(buffer.to_string(), initial);
        while buffer.redo().unwrap() {}
        prop_assert_eq!(buffer.to_string(), after);
    }

    // Edits land well inside the default window, so neighbouring edits
    // coalesce into shared entries.
    #[test]
    fn undo_all_restores_initial_with_coalescing(
        initial in "[a-z]{0,10}",
        edits in prop::collection::vec(edit_strategy(), 1..30),
    ) {
        let mut buffer =
            PieceTreeTextBuffer::with_coalesce_window(&initial, DEFAULT_COALESCE_WINDOW);
        for edit in &edits {
            apply_buffer(&mut buffer, edit);
        }
        let after = buffer.to_string();
        while buffer.undo().unwrap() {}
        prop_assert_eq!(buffer.to_string(), initial);
        while buffer.redo().unwrap() {}
        prop_assert_eq!(buffer.to_string(), after);
    }

    // Two carets typing the same char: the right caret's insert lands
    // first, then the left one just before an original char.
    #[test]
    fn adjacent_caret_inserts_undo_cleanly(
        initial in "[a-z]{2,12}",
        at in any::<prop::sample::Index>(),
        text in "[A-Z]{1,3}",
    ) {
        let len = initial.chars().count();
        let right = 1 + at.index(len);
        let mut buffer =
            PieceTreeTextBuffer::with_coalesce_window(&initial, DEFAULT_COALESCE_WINDOW);
        buffer.insert(right, &text).unwrap();
        buffer.insert(right - 1, &text).unwrap();
        while buffer.undo().unwrap() {}
        prop_assert_eq!(buffer.to_string(), initial);
    }

    #[test]
    fn snapshot_survives_edits(
        initial in "[a-z]{0,10}",
        edits in prop::collection::vec(edit_strategy(), 0..20),
    ) {
        let mut buffer = PieceTreeTextBuffer::new(&initial);
        let snap = buffer.snapshot();
        for edit in &edits {
            apply_buffer(&mut buffer, edit);
        }
        prop_assert_eq!(snap.text(), initial);
    }
}
