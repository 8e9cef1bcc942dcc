//! Input gestures for the editor core.
//!
//! Hosts own the platform event loop. They translate native events into
//! [`EditorGesture`] values and push them through a [`GestureDispatcher`],
//! which forwards each one to every subscribed [`GestureSink`].
//!
//! Layout:
//! - `gesture`: the closed gesture sum type plus modifiers, pointer buttons
//!   and pointer samples.
//! - `dispatch`: the sink trait and the fan-out dispatcher.

mod dispatch;
mod gesture;

pub use dispatch::{GestureDispatcher, GestureSink};
pub use gesture::{
    AccessKeyGesture, CompositionGesture, EditorGesture, EditorKeyModifiers, EditorPoint,
    EditorPointerButtons, EditorPointerPoint, EditorPointerType, FocusGesture, GestureKind,
    KeyGesture, PhysicalKey, PointerGesture, PointerUpdateKind, PointerWheelGesture,
    TextInputGesture, WheelDeltaMode,
};
