//! # Geomap Renderer
//!
//! The contract between the map controller and a rendering engine.
//! A converted `Scene` is handed to a long-lived `RenderSession`; the session
//! reports hover events through `SessionHandlers` and reaches back into the
//! application only through its `InteractionContext`.
//!
//! The GPU engine itself lives outside this workspace. `HeadlessEngine`
//! implements the contract without drawing, with real hit-testing over
//! point data, so the whole pipeline can be driven from tests.

pub mod scene;
pub mod viewport;
pub mod context;
pub mod engine;
pub mod spatial;
pub mod headless;

pub use scene::{Decoration, LayerInstance, Scene};
pub use viewport::{ViewState, Viewport};
pub use context::InteractionContext;
pub use engine::{
    Cursor, CursorState, PickInfo, PointerEvent, PointerEventKind, RenderEngine, RenderError,
    RenderSession, SessionConfig, SessionHandlers,
};
pub use headless::{HeadlessConfig, HeadlessEngine, HeadlessHandle, HoverOutcome};
