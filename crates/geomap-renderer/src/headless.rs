//! Headless implementation of the rendering-engine contract.
//!
//! Draws nothing. It keeps the current scene, projects layer data through a
//! viewport and hit-tests pointer positions against it, invoking the session
//! handlers exactly as a GPU engine would. A `HeadlessHandle` drives pointer
//! input and simulates engine-internal edits from outside.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use geomap_core::PatchOperation;

use crate::context::InteractionContext;
use crate::engine::{
    Cursor, CursorState, PickInfo, PointerEvent, PointerEventKind, RenderEngine, RenderError,
    RenderSession, SessionConfig, SessionHandlers,
};
use crate::scene::{Decoration, Scene};
use crate::spatial::{PickEntry, PickIndex};
use crate::viewport::{ViewState, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadlessConfig {
    pub width: f64,
    pub height: f64,
    /// Hit-test tolerance in screen pixels.
    pub pick_radius: f64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            pick_radius: 6.0,
        }
    }
}

struct SessionState {
    component_id: String,
    scene: Option<Arc<Scene>>,
    initial_view_state: Option<ViewState>,
    viewport: Viewport,
    index: PickIndex,
    context: InteractionContext,
    handlers: SessionHandlers,
    decorations: Vec<Decoration>,
    frames: usize,
    drag_origin: Option<[f64; 2]>,
    hovering: bool,
    disposed: bool,
}

impl SessionState {
    fn cursor_state(&self) -> CursorState {
        CursorState {
            is_dragging: self.drag_origin.is_some(),
            is_hovering: self.hovering,
        }
    }

    fn pick(&self, x: f64, y: f64, pick_radius: f64) -> PickInfo {
        let coordinate = self.viewport.unproject([x, y]);
        let radius = pick_radius / self.viewport.pixels_per_degree();
        match self.index.pick(coordinate, radius) {
            Some(entry) => PickInfo {
                x,
                y,
                coordinate: Some(coordinate),
                layer_id: Some(entry.layer_id.clone()),
                index: Some(entry.index),
                object: Some(entry.object.clone()),
                picked: true,
            },
            None => PickInfo::miss(x, y, Some(coordinate)),
        }
    }
}

#[derive(Default)]
struct EngineState {
    live_sessions: usize,
    sessions_created: usize,
    active: Option<Arc<Mutex<SessionState>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reference engine that renders nothing but hit-tests for real.
pub struct HeadlessEngine {
    config: HeadlessConfig,
    shared: Arc<Mutex<EngineState>>,
}

impl HeadlessEngine {
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(EngineState::default())),
        }
    }

    /// A handle for driving input into whichever session is active.
    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle {
            config: self.config,
            shared: self.shared.clone(),
        }
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl RenderEngine for HeadlessEngine {
    fn create_session(&mut self, config: SessionConfig) -> Result<Box<dyn RenderSession>, RenderError> {
        let mut engine = lock(&self.shared);
        let id = Uuid::new_v4();
        let state = Arc::new(Mutex::new(SessionState {
            component_id: config.id,
            scene: None,
            initial_view_state: None,
            viewport: Viewport::new(ViewState::default(), self.config.width, self.config.height),
            index: PickIndex::new(),
            context: config.context,
            handlers: config.handlers,
            decorations: config.decorations,
            frames: 0,
            drag_origin: None,
            hovering: false,
            disposed: false,
        }));
        engine.live_sessions += 1;
        engine.sessions_created += 1;
        engine.active = Some(state.clone());
        log::info!(
            "Headless session {} created ({} live)",
            id,
            engine.live_sessions
        );
        Ok(Box::new(HeadlessSession {
            id,
            state,
            engine: self.shared.clone(),
        }))
    }
}

struct HeadlessSession {
    id: Uuid,
    state: Arc<Mutex<SessionState>>,
    engine: Arc<Mutex<EngineState>>,
}

impl HeadlessSession {
    fn live_state(&self) -> Result<MutexGuard<'_, SessionState>, RenderError> {
        let state = lock(&self.state);
        if state.disposed {
            return Err(RenderError::SessionDisposed(self.id));
        }
        Ok(state)
    }
}

impl RenderSession for HeadlessSession {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_scene(&mut self, scene: Arc<Scene>) -> Result<(), RenderError> {
        let mut state = self.live_state()?;
        let view_state = scene.view_state();
        if view_state.is_some() && view_state != state.initial_view_state {
            state.initial_view_state = view_state;
            state.viewport.view_state = view_state.unwrap_or_default();
        }
        state.index = PickIndex::build(pick_entries(&scene));
        state.scene = Some(scene);
        state.frames += 1;
        log::debug!(
            "Session {} now shows {} pickable objects",
            self.id,
            state.index.len()
        );
        Ok(())
    }

    fn set_interaction_context(&mut self, context: InteractionContext) -> Result<(), RenderError> {
        self.live_state()?.context = context;
        Ok(())
    }

    fn set_decorations(&mut self, decorations: Vec<Decoration>) -> Result<(), RenderError> {
        self.live_state()?.decorations = decorations;
        Ok(())
    }

    fn dispose(&mut self) {
        let mut state = lock(&self.state);
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.scene = None;
        state.index = PickIndex::new();
        drop(state);

        let mut engine = lock(&self.engine);
        engine.live_sessions = engine.live_sessions.saturating_sub(1);
        if engine
            .active
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, &self.state))
        {
            engine.active = None;
        }
        log::info!("Headless session {} disposed", self.id);
    }

    fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }
}

impl Drop for HeadlessSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Collect pickable positions from every visible layer's data.
fn pick_entries(scene: &Scene) -> Vec<PickEntry> {
    let mut entries = Vec::new();
    for (layer_order, layer) in scene.layers.iter().enumerate() {
        if !layer.visible() {
            continue;
        }
        let Some(Value::Array(data)) = layer.data() else {
            continue;
        };
        let accessor = layer.prop("getPosition").and_then(|p| p.as_accessor());
        for (index, datum) in data.into_iter().enumerate() {
            let position = match accessor {
                Some(accessor) => accessor.evaluate(&datum).and_then(as_position),
                None => datum_position(&datum),
            };
            if let Some(position) = position {
                entries.push(PickEntry {
                    layer_order,
                    layer_id: layer.id.clone(),
                    index,
                    position,
                    object: datum,
                });
            }
        }
    }
    entries
}

fn as_position(value: &Value) -> Option<[f64; 2]> {
    let coords = value.as_array()?;
    match (coords.first()?.as_f64(), coords.get(1)?.as_f64()) {
        (Some(lng), Some(lat)) => Some([lng, lat]),
        _ => None,
    }
}

/// Position of a GeoJSON feature (vertex centroid) or a bare point record.
fn datum_position(datum: &Value) -> Option<[f64; 2]> {
    if let Some(geometry) = datum.get("geometry") {
        let mut vertices = Vec::new();
        collect_vertices(geometry.get("coordinates")?, &mut vertices);
        if vertices.is_empty() {
            return None;
        }
        let n = vertices.len() as f64;
        let (sx, sy) = vertices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        return Some([sx / n, sy / n]);
    }
    ["position", "coordinates"]
        .iter()
        .find_map(|key| datum.get(*key).and_then(as_position))
}

fn collect_vertices(coords: &Value, out: &mut Vec<[f64; 2]>) {
    if let Some(position) = as_position(coords) {
        out.push(position);
    } else if let Some(items) = coords.as_array() {
        for item in items {
            collect_vertices(item, out);
        }
    }
}

/// What a pointer move produced on the active session.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverOutcome {
    pub pick: PickInfo,
    pub cursor: Cursor,
    pub tooltip: Option<String>,
}

/// Test-side remote control for a `HeadlessEngine`.
#[derive(Clone)]
pub struct HeadlessHandle {
    config: HeadlessConfig,
    shared: Arc<Mutex<EngineState>>,
}

impl HeadlessHandle {
    pub fn live_sessions(&self) -> usize {
        lock(&self.shared).live_sessions
    }

    pub fn sessions_created(&self) -> usize {
        lock(&self.shared).sessions_created
    }

    fn active(&self) -> Result<Arc<Mutex<SessionState>>, RenderError> {
        lock(&self.shared)
            .active
            .clone()
            .ok_or_else(|| RenderError::Engine("no active session".to_string()))
    }

    pub fn scene(&self) -> Option<Arc<Scene>> {
        let active = self.active().ok()?;
        let state = lock(&active);
        state.scene.clone()
    }

    /// Number of scenes handed to the active session.
    pub fn frames(&self) -> usize {
        self.active()
            .map(|active| {
                let state = lock(&active);
                state.frames
            })
            .unwrap_or(0)
    }

    pub fn component_id(&self) -> Option<String> {
        let active = self.active().ok()?;
        let state = lock(&active);
        Some(state.component_id.clone())
    }

    pub fn decorations(&self) -> Vec<Decoration> {
        self.active()
            .map(|active| {
                let state = lock(&active);
                state.decorations.clone()
            })
            .unwrap_or_default()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        let active = self.active().ok()?;
        let state = lock(&active);
        Some(state.viewport)
    }

    /// Move the pointer: hit-test, run the hover handler and both policies.
    pub fn pointer_move(&self, x: f64, y: f64) -> Result<HoverOutcome, RenderError> {
        let active = self.active()?;
        let mut state = lock(&active);
        if let Some(origin) = state.drag_origin {
            state.viewport.pan(x - origin[0], y - origin[1]);
            state.drag_origin = Some([x, y]);
        }
        let pick = state.pick(x, y, self.config.pick_radius);
        state.hovering = pick.picked;
        let cursor = (state.handlers.get_cursor)(state.cursor_state());
        let tooltip = (state.handlers.get_tooltip)(&pick);
        let on_hover = state.handlers.on_hover.clone();
        drop(state);

        on_hover(&pick, &PointerEvent::new(PointerEventKind::Move, x, y));
        Ok(HoverOutcome {
            pick,
            cursor,
            tooltip,
        })
    }

    /// Press the pointer and start panning; returns the cursor to show.
    pub fn drag_start(&self, x: f64, y: f64) -> Result<Cursor, RenderError> {
        let active = self.active()?;
        let mut state = lock(&active);
        state.drag_origin = Some([x, y]);
        Ok((state.handlers.get_cursor)(state.cursor_state()))
    }

    pub fn drag_end(&self) -> Result<Cursor, RenderError> {
        let active = self.active()?;
        let mut state = lock(&active);
        state.drag_origin = None;
        Ok((state.handlers.get_cursor)(state.cursor_state()))
    }

    /// Simulate an engine-internal editing layer committing an edit.
    pub fn commit_edit(&self, ops: &[PatchOperation]) -> Result<(), RenderError> {
        let active = self.active()?;
        let context = lock(&active).context.clone();
        context.emit_patch(ops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomap_core::store::PatchEmitter;
    use geomap_core::value::{Resolved, ResolvedMap};
    use serde_json::json;

    use crate::scene::LayerInstance;

    fn handlers(hovers: Arc<Mutex<Vec<PickInfo>>>) -> SessionHandlers {
        SessionHandlers {
            on_hover: Arc::new(move |info: &PickInfo, _: &PointerEvent| hovers.lock().unwrap().push(info.clone())),
            get_cursor: Arc::new(|state: CursorState| {
                if state.is_dragging {
                    Cursor::Grabbing
                } else {
                    Cursor::Default
                }
            }),
            get_tooltip: Arc::new(|info: &PickInfo| {
                info.feature_property("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
        }
    }

    fn noop_context() -> InteractionContext {
        let emitter: PatchEmitter = Arc::new(|_: &[PatchOperation]| {});
        InteractionContext::new(emitter)
    }

    fn scene() -> Arc<Scene> {
        let mut props = ResolvedMap::new();
        props.insert(
            "initialViewState",
            Resolved::from_json(&json!({"longitude": 0.0, "latitude": 0.0, "zoom": 2})),
        );
        let mut layer_props = ResolvedMap::new();
        layer_props.insert(
            "data",
            Resolved::from_json(&json!([
                {"type": "Feature", "properties": {"name": "Lake Erie"},
                 "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [10.0, 0.0]}}
            ])),
        );
        Arc::new(Scene {
            layers: vec![LayerInstance {
                id: "lakes".into(),
                class: "GeoJsonLayer".into(),
                props: layer_props,
            }],
            views: Vec::new(),
            props,
        })
    }

    fn open_session(engine: &mut HeadlessEngine) -> (Box<dyn RenderSession>, Arc<Mutex<Vec<PickInfo>>>) {
        let hovers = Arc::new(Mutex::new(Vec::new()));
        let session = engine
            .create_session(SessionConfig {
                id: "map".into(),
                context: noop_context(),
                handlers: handlers(hovers.clone()),
                decorations: Vec::new(),
            })
            .unwrap();
        (session, hovers)
    }

    #[test]
    fn test_hover_hits_feature_and_reports_tooltip() {
        let mut engine = HeadlessEngine::default();
        let handle = engine.handle();
        let (mut session, hovers) = open_session(&mut engine);
        session.set_scene(scene()).unwrap();

        let vp = handle.viewport().unwrap();
        let [x, y] = vp.project([0.0, 0.0]);
        let outcome = handle.pointer_move(x + 1.0, y).unwrap();
        assert!(outcome.pick.picked);
        assert_eq!(outcome.pick.layer_id.as_deref(), Some("lakes"));
        assert_eq!(outcome.tooltip.as_deref(), Some("Lake Erie"));

        let [x, y] = vp.project([10.0, 0.0]);
        let outcome = handle.pointer_move(x, y).unwrap();
        assert_eq!(outcome.pick.index, Some(1));
        assert!(outcome.tooltip.is_none());

        let outcome = handle.pointer_move(5.0, 5.0).unwrap();
        assert!(!outcome.pick.picked);
        assert_eq!(hovers.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_drag_cursor_and_pan() {
        let mut engine = HeadlessEngine::default();
        let handle = engine.handle();
        let (mut session, _) = open_session(&mut engine);
        session.set_scene(scene()).unwrap();

        assert_eq!(handle.drag_start(100.0, 100.0).unwrap(), Cursor::Grabbing);
        let before = handle.viewport().unwrap().view_state.longitude;
        let outcome = handle.pointer_move(150.0, 100.0).unwrap();
        assert_eq!(outcome.cursor, Cursor::Grabbing);
        assert!(handle.viewport().unwrap().view_state.longitude < before);
        assert_eq!(handle.drag_end().unwrap(), Cursor::Default);
    }

    #[test]
    fn test_dispose_releases_session() {
        let mut engine = HeadlessEngine::default();
        let handle = engine.handle();
        let (mut session, _) = open_session(&mut engine);
        assert_eq!(handle.live_sessions(), 1);
        session.dispose();
        assert!(session.is_disposed());
        assert_eq!(handle.live_sessions(), 0);
        assert!(matches!(
            session.set_scene(scene()),
            Err(RenderError::SessionDisposed(_))
        ));
        assert!(handle.pointer_move(0.0, 0.0).is_err());
        drop(session);
        assert_eq!(handle.live_sessions(), 0);
    }

    #[test]
    fn test_commit_edit_uses_current_context() {
        let mut engine = HeadlessEngine::default();
        let handle = engine.handle();
        let (mut session, _) = open_session(&mut engine);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let emitter: PatchEmitter = Arc::new(move |ops: &[PatchOperation]| {
            sink.lock().unwrap().extend_from_slice(ops);
        });
        session
            .set_interaction_context(InteractionContext::new(emitter))
            .unwrap();
        handle
            .commit_edit(&[PatchOperation::replace("/layers/0/visible", json!(false))])
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
