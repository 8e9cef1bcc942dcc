//! Gesture -> edit command translation.
//!
//! [`GestureTranslator`] is a stateless [`GestureSink`]: each gesture maps to
//! at most one [`EditCommand`], queued for the session to apply after the
//! dispatcher returns. Gestures without a mapping are dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use core_events::{
    EditorGesture, EditorKeyModifiers, GestureKind, GestureSink, KeyGesture, PointerGesture,
};
use core_text::TextPosition;
use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    LineStart,
    LineEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    InsertText(String),
    DeleteBackward,
    Undo,
    Redo,
    Move { motion: Motion, extend: bool },
    /// Place a caret; `add` keeps the existing carets.
    PlaceCaret { position: TextPosition, add: bool },
}

pub type CommandQueue = Arc<Mutex<VecDeque<EditCommand>>>;

#[derive(Debug)]
pub struct GestureTranslator {
    queue: CommandQueue,
    char_width: f64,
    line_height: f64,
}

impl GestureTranslator {
    pub fn new(queue: CommandQueue, char_width: f64, line_height: f64) -> Self {
        Self {
            queue,
            char_width,
            line_height,
        }
    }

    pub fn translate(&self, gesture: &EditorGesture) -> Option<EditCommand> {
        match gesture {
            EditorGesture::TextInput(g) if !g.text.is_empty() => {
                Some(EditCommand::InsertText(g.text.clone()))
            }
            EditorGesture::Composition(g)
                if g.kind == GestureKind::CompositionCompleted && !g.text.is_empty() =>
            {
                Some(EditCommand::InsertText(g.text.clone()))
            }
            EditorGesture::Key(k) if k.kind == GestureKind::KeyDown => translate_key(k),
            EditorGesture::Pointer(p) if p.kind == GestureKind::PointerPressed => {
                Some(self.translate_press(p))
            }
            _ => None,
        }
    }

    fn translate_press(&self, p: &PointerGesture) -> EditCommand {
        let pos = p.point.position;
        let line = (pos.y.max(0.0) / self.line_height).floor() as usize;
        let column = (pos.x.max(0.0) / self.char_width).round() as usize;
        EditCommand::PlaceCaret {
            position: TextPosition::new(line, column),
            add: p.modifiers.contains(EditorKeyModifiers::CONTROL),
        }
    }
}

fn translate_key(k: &KeyGesture) -> Option<EditCommand> {
    let control = k.modifiers.contains(EditorKeyModifiers::CONTROL);
    let extend = k.modifiers.contains(EditorKeyModifiers::SHIFT);
    let motion = |motion| Some(EditCommand::Move { motion, extend });
    match k.key.as_str() {
        "z" | "Z" if control => Some(EditCommand::Undo),
        "y" | "Y" if control => Some(EditCommand::Redo),
        "Backspace" => Some(EditCommand::DeleteBackward),
        "Enter" => Some(EditCommand::InsertText("\n".into())),
        "Tab" => Some(EditCommand::InsertText("\t".into())),
        "ArrowLeft" => motion(Motion::Left),
        "ArrowRight" => motion(Motion::Right),
        "ArrowUp" => motion(Motion::Up),
        "ArrowDown" => motion(Motion::Down),
        "Home" => motion(Motion::LineStart),
        "End" => motion(Motion::LineEnd),
        _ => None,
    }
}

impl GestureSink for GestureTranslator {
    fn handle_gesture(&self, gesture: &EditorGesture) {
        if let Some(command) = self.translate(gesture) {
            trace!(target: "runtime.input", ?command, "queued");
            self.queue.lock().push_back(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use core_events::{CompositionGesture, EditorPoint, EditorPointerPoint};
    use pretty_assertions::assert_eq;

    fn translator() -> GestureTranslator {
        GestureTranslator::new(CommandQueue::default(), 10.0, 20.0)
    }

    fn press(x: f64, y: f64, modifiers: EditorKeyModifiers) -> EditorGesture {
        EditorGesture::Pointer(PointerGesture {
            kind: GestureKind::PointerPressed,
            timestamp: Instant::now(),
            point: EditorPointerPoint::new(1, EditorPoint::new(x, y)),
            modifiers,
            click_count: 1,
        })
    }

    #[test]
    fn keys_map_to_commands() {
        let t = translator();
        let ctrl = EditorKeyModifiers::CONTROL;
        assert_eq!(t.translate(&EditorGesture::key_down("z", ctrl)), Some(EditCommand::Undo));
        assert_eq!(t.translate(&EditorGesture::key_down("y", ctrl)), Some(EditCommand::Redo));
        assert_eq!(t.translate(&EditorGesture::key_down("z", EditorKeyModifiers::empty())), None);
        assert_eq!(
            t.translate(&EditorGesture::key_down("ArrowLeft", EditorKeyModifiers::SHIFT)),
            Some(EditCommand::Move {
                motion: Motion::Left,
                extend: true
            })
        );
        assert_eq!(
            t.translate(&EditorGesture::key_down("Enter", EditorKeyModifiers::empty())),
            Some(EditCommand::InsertText("\n".into()))
        );
    }

    #[test]
    fn text_and_completed_composition_insert() {
        let t = translator();
        assert_eq!(
            t.translate(&EditorGesture::text_input("hé")),
            Some(EditCommand::InsertText("hé".into()))
        );
        assert_eq!(t.translate(&EditorGesture::text_input("")), None);
        let mut composition = CompositionGesture {
            kind: GestureKind::CompositionUpdated,
            timestamp: Instant::now(),
            text: "日本".into(),
            selection_start: 0,
            selection_len: 0,
        };
        assert_eq!(t.translate(&EditorGesture::Composition(composition.clone())), None);
        composition.kind = GestureKind::CompositionCompleted;
        assert_eq!(
            t.translate(&EditorGesture::Composition(composition)),
            Some(EditCommand::InsertText("日本".into()))
        );
    }

    #[test]
    fn press_places_caret_on_grid() {
        let t = translator();
        assert_eq!(
            t.translate(&press(36.0, 45.0, EditorKeyModifiers::empty())),
            Some(EditCommand::PlaceCaret {
                position: TextPosition::new(2, 4),
                add: false
            })
        );
        assert_eq!(
            t.translate(&press(-5.0, 0.0, EditorKeyModifiers::CONTROL)),
            Some(EditCommand::PlaceCaret {
                position: TextPosition::new(0, 0),
                add: true
            })
        );
    }

    #[test]
    fn sink_queues_translated_commands_only() {
        let queue = CommandQueue::default();
        let t = GestureTranslator::new(queue.clone(), 10.0, 20.0);
        t.handle_gesture(&EditorGesture::focus(true));
        t.handle_gesture(&EditorGesture::text_input("a"));
        assert_eq!(queue.lock().len(), 1);
    }
}
