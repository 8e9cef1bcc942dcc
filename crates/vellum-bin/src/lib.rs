//! Headless editing session over the vellum editor core.
//!
//! [`EditorSession`] binds a [`core_model::Document`] to a caret manager, a
//! viewport and a background layout scheduler using fixed-pitch metrics from
//! [`MonospaceLayout`]. Hosts feed it [`core_events::EditorGesture`]s and
//! scroll offsets; the `vellum` binary drives one session from the command
//! line.

pub mod commands;
pub mod layout;
pub mod session;
pub mod text_index;

pub use commands::{CommandQueue, EditCommand, GestureTranslator, Motion};
pub use layout::MonospaceLayout;
pub use session::{EditorSession, SessionSettings, SessionSummary};
pub use text_index::LineIndex;
