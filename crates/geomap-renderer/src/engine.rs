use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::context::InteractionContext;
use crate::scene::{Decoration, Scene};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Render session {0} has been disposed")]
    SessionDisposed(Uuid),

    #[error("Scene rejected by the engine: {0}")]
    InvalidScene(String),

    #[error("Rendering engine failure: {0}")]
    Engine(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEventKind {
    Move,
    Down,
    Up,
    Leave,
}

/// The pointer event that triggered a pick, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, x: f64, y: f64) -> Self {
        Self { kind, x, y }
    }
}

/// Hit-test result for a screen position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PickInfo {
    pub x: f64,
    pub y: f64,
    /// `[longitude, latitude]` under the pointer.
    pub coordinate: Option<[f64; 2]>,
    pub layer_id: Option<String>,
    /// Index of the picked datum within its layer's data.
    pub index: Option<usize>,
    pub object: Option<Value>,
    pub picked: bool,
}

impl PickInfo {
    pub fn miss(x: f64, y: f64, coordinate: Option<[f64; 2]>) -> Self {
        Self {
            x,
            y,
            coordinate,
            ..Self::default()
        }
    }

    /// `object.properties[key]` of a picked GeoJSON feature.
    pub fn feature_property(&self, key: &str) -> Option<&Value> {
        self.object.as_ref()?.get("properties")?.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cursor {
    Default,
    Grabbing,
    Pointer,
    Crosshair,
}

impl Cursor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cursor::Default => "default",
            Cursor::Grabbing => "grabbing",
            Cursor::Pointer => "pointer",
            Cursor::Crosshair => "crosshair",
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interaction state the engine reports when asking for a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorState {
    pub is_dragging: bool,
    pub is_hovering: bool,
}

pub type HoverHandler = Arc<dyn Fn(&PickInfo, &PointerEvent) + Send + Sync>;
pub type CursorPolicy = Arc<dyn Fn(CursorState) -> Cursor + Send + Sync>;
pub type TooltipPolicy = Arc<dyn Fn(&PickInfo) -> Option<String> + Send + Sync>;

/// Callbacks the engine invokes while the session is live.
#[derive(Clone)]
pub struct SessionHandlers {
    pub on_hover: HoverHandler,
    pub get_cursor: CursorPolicy,
    pub get_tooltip: TooltipPolicy,
}

impl fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandlers").finish_non_exhaustive()
    }
}

/// Everything a render session is constructed with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stable component identifier supplied by the host.
    pub id: String,
    pub context: InteractionContext,
    pub handlers: SessionHandlers,
    pub decorations: Vec<Decoration>,
}

/// A rendering engine able to open render sessions.
pub trait RenderEngine: Send {
    fn create_session(&mut self, config: SessionConfig) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// A long-lived render session owned by the map controller.
pub trait RenderSession: Send {
    fn id(&self) -> Uuid;

    /// Replace the rendered scene wholesale.
    fn set_scene(&mut self, scene: Arc<Scene>) -> Result<(), RenderError>;

    /// Swap the interaction context without rebuilding the scene.
    fn set_interaction_context(&mut self, context: InteractionContext) -> Result<(), RenderError>;

    fn set_decorations(&mut self, decorations: Vec<Decoration>) -> Result<(), RenderError>;

    /// Release engine resources. Further calls fail with `SessionDisposed`.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}
