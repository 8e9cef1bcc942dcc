//! Host-neutral input gestures.
//!
//! Hosts translate their native key, pointer, focus and IME events into an
//! [`EditorGesture`] before handing them to the editor. The set of variants
//! is closed; anything the editor has no dedicated shape for travels as
//! [`EditorGesture::Other`] with only a [`GestureKind`] and a timestamp.

use std::fmt;
use std::time::Instant;

/// Coarse classification shared by every gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GestureKind {
    #[default]
    Unknown,
    KeyDown,
    KeyUp,
    TextInput,
    PointerPressed,
    PointerReleased,
    PointerMoved,
    PointerEntered,
    PointerExited,
    PointerCaptureLost,
    PointerWheelChanged,
    CompositionStarted,
    CompositionUpdated,
    CompositionCompleted,
    FocusGained,
    FocusLost,
    AccessKeyInvoked,
}

impl GestureKind {
    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            Self::PointerPressed
                | Self::PointerReleased
                | Self::PointerMoved
                | Self::PointerEntered
                | Self::PointerExited
                | Self::PointerCaptureLost
                | Self::PointerWheelChanged
        )
    }

    pub fn is_composition(self) -> bool {
        matches!(
            self,
            Self::CompositionStarted | Self::CompositionUpdated | Self::CompositionCompleted
        )
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EditorKeyModifiers: u16 {
        const SHIFT     = 0b0000_0001;
        const CONTROL   = 0b0000_0010;
        const ALT       = 0b0000_0100;
        const META      = 0b0000_1000;
        const SUPER     = 0b0001_0000;
        const FUNCTION  = 0b0010_0000;
        const CAPS_LOCK = 0b0100_0000;
        const NUM_LOCK  = 0b1000_0000;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EditorPointerButtons: u8 {
        const LEFT       = 0b0000_0001;
        const RIGHT      = 0b0000_0010;
        const MIDDLE     = 0b0000_0100;
        const X_BUTTON_1 = 0b0000_1000;
        const X_BUTTON_2 = 0b0001_0000;
        const PEN_BARREL = 0b0010_0000;
        const PEN_ERASER = 0b0100_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EditorPointerType {
    #[default]
    Mouse,
    Touch,
    Pen,
    Touchpad,
}

/// Which button transition produced a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerUpdateKind {
    #[default]
    Other,
    LeftPressed,
    LeftReleased,
    RightPressed,
    RightReleased,
    MiddlePressed,
    MiddleReleased,
    XButton1Pressed,
    XButton1Released,
    XButton2Pressed,
    XButton2Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WheelDeltaMode {
    #[default]
    Pixel,
    Line,
    Page,
}

/// Position in device-independent pixels relative to the editor surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EditorPoint {
    pub x: f64,
    pub y: f64,
}

impl EditorPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: EditorPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl fmt::Display for EditorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One sampled pointer contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorPointerPoint {
    pub pointer_id: u32,
    pub position: EditorPoint,
    pub pointer_type: EditorPointerType,
    pub pressed_buttons: EditorPointerButtons,
    pub update_kind: PointerUpdateKind,
    /// Normalized to `0.0..=1.0`; mice report `0.5` while pressed.
    pub pressure: f32,
    pub is_in_contact: bool,
}

impl EditorPointerPoint {
    pub fn new(pointer_id: u32, position: EditorPoint) -> Self {
        Self {
            pointer_id,
            position,
            pointer_type: EditorPointerType::Mouse,
            pressed_buttons: EditorPointerButtons::empty(),
            update_kind: PointerUpdateKind::Other,
            pressure: 0.0,
            is_in_contact: false,
        }
    }

    pub fn is_pressed(&self, button: EditorPointerButtons) -> bool {
        self.pressed_buttons.contains(button)
    }
}

/// Layout-independent key code, e.g. `"KeyA"` or `"ArrowLeft"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalKey(pub String);

impl PhysicalKey {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyGesture {
    pub kind: GestureKind,
    pub timestamp: Instant,
    /// Logical key after layout mapping, e.g. `"a"` or `"Enter"`.
    pub key: String,
    pub physical_key: Option<PhysicalKey>,
    pub modifiers: EditorKeyModifiers,
    pub is_repeat: bool,
    /// Text the key would produce, if any.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextInputGesture {
    pub timestamp: Instant,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerGesture {
    pub kind: GestureKind,
    pub timestamp: Instant,
    pub point: EditorPointerPoint,
    pub modifiers: EditorKeyModifiers,
    /// Consecutive press count for multi-click detection.
    pub click_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerWheelGesture {
    pub timestamp: Instant,
    pub point: EditorPointerPoint,
    pub modifiers: EditorKeyModifiers,
    pub delta_x: f64,
    pub delta_y: f64,
    pub delta_mode: WheelDeltaMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusGesture {
    pub timestamp: Instant,
    pub has_focus: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessKeyGesture {
    pub timestamp: Instant,
    pub access_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositionGesture {
    pub kind: GestureKind,
    pub timestamp: Instant,
    pub text: String,
    /// Char offsets of the IME cursor range within `text`.
    pub selection_start: usize,
    pub selection_len: usize,
}

/// Every input gesture the editor understands.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorGesture {
    Key(KeyGesture),
    TextInput(TextInputGesture),
    Pointer(PointerGesture),
    PointerWheel(PointerWheelGesture),
    FocusChanged(FocusGesture),
    AccessKey(AccessKeyGesture),
    Composition(CompositionGesture),
    Other { kind: GestureKind, timestamp: Instant },
}

impl EditorGesture {
    pub fn key_down(key: impl Into<String>, modifiers: EditorKeyModifiers) -> Self {
        Self::Key(KeyGesture {
            kind: GestureKind::KeyDown,
            timestamp: Instant::now(),
            key: key.into(),
            physical_key: None,
            modifiers,
            is_repeat: false,
            text: None,
        })
    }

    pub fn text_input(text: impl Into<String>) -> Self {
        Self::TextInput(TextInputGesture {
            timestamp: Instant::now(),
            text: text.into(),
        })
    }

    pub fn focus(has_focus: bool) -> Self {
        Self::FocusChanged(FocusGesture {
            timestamp: Instant::now(),
            has_focus,
        })
    }

    pub fn kind(&self) -> GestureKind {
        match self {
            Self::Key(g) => g.kind,
            Self::TextInput(_) => GestureKind::TextInput,
            Self::Pointer(g) => g.kind,
            Self::PointerWheel(_) => GestureKind::PointerWheelChanged,
            Self::FocusChanged(g) if g.has_focus => GestureKind::FocusGained,
            Self::FocusChanged(_) => GestureKind::FocusLost,
            Self::AccessKey(_) => GestureKind::AccessKeyInvoked,
            Self::Composition(g) => g.kind,
            Self::Other { kind, .. } => *kind,
        }
    }

    pub fn timestamp(&self) -> Instant {
        match self {
            Self::Key(g) => g.timestamp,
            Self::TextInput(g) => g.timestamp,
            Self::Pointer(g) => g.timestamp,
            Self::PointerWheel(g) => g.timestamp,
            Self::FocusChanged(g) => g.timestamp,
            Self::AccessKey(g) => g.timestamp,
            Self::Composition(g) => g.timestamp,
            Self::Other { timestamp, .. } => *timestamp,
        }
    }

    pub fn modifiers(&self) -> EditorKeyModifiers {
        match self {
            Self::Key(g) => g.modifiers,
            Self::Pointer(g) => g.modifiers,
            Self::PointerWheel(g) => g.modifiers,
            _ => EditorKeyModifiers::empty(),
        }
    }

    /// Text carried by the gesture, if it produces any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Key(g) => g.text.as_deref(),
            Self::TextInput(g) => Some(g.text.as_str()),
            Self::Composition(g) => Some(g.text.as_str()),
            _ => None,
        }
        .filter(|t| !t.is_empty())
    }

    pub fn has_text(&self) -> bool {
        self.text().is_some()
    }

    pub fn is_key_down(&self) -> bool {
        self.kind() == GestureKind::KeyDown
    }
}

impl fmt::Display for EditorGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(g) => write!(f, "{:?}({}{:?})", g.kind, g.key, g.modifiers),
            Self::TextInput(g) => write!(f, "TextInput({:?})", g.text),
            Self::Pointer(g) => write!(f, "{:?}{}", g.kind, g.point.position),
            Self::PointerWheel(g) => write!(f, "Wheel({}, {})", g.delta_x, g.delta_y),
            Self::FocusChanged(_)
            | Self::AccessKey(_)
            | Self::Composition(_)
            | Self::Other { .. } => write!(f, "{:?}", self.kind()),
        }
    }
}
