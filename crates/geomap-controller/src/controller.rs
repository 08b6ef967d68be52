use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use geomap_convert::{ConfigurationSchema, ConvertError, Converter};
use geomap_core::store::same_emitter;
use geomap_core::{
    InvalidPatchError, PatchEmitter, PatchOperation, SpecAction, SpecStore, Specification,
    StoreError, SubscriptionId,
};
use geomap_renderer::{
    InteractionContext, RenderEngine, RenderError, RenderSession, Scene, SessionConfig,
    SessionHandlers,
};

use crate::options::MapOptions;
use crate::policy::{cursor_policy, hover_forwarder, tooltip_policy, HoverSlot};
use crate::props::{HoverCallback, MapProps};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("Map controller has been disposed")]
    SessionDisposed,

    #[error("No specification has been supplied yet")]
    NotInitialized,

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Patch(#[from] InvalidPatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Uninitialized,
    Converting,
    Rendering,
    Error,
    Disposed,
}

/// Owns the specification store and the single live render session of one
/// map component.
///
/// Every call runs to completion synchronously: conversion, store updates
/// and session updates all happen before it returns.
pub struct MapController {
    engine: Box<dyn RenderEngine>,
    converter: Converter,
    options: MapOptions,
    state: ControllerState,
    props: Option<MapProps>,
    session: Option<Box<dyn RenderSession>>,
    store: Option<SpecStore>,
    subscription: Option<SubscriptionId>,
    changes_tx: Sender<()>,
    changes_rx: Receiver<()>,
    hover: HoverSlot,
    scene: Option<Arc<Scene>>,
    /// The specification the last conversion ran on.
    converted: Option<Value>,
    last_error: Option<ControllerError>,
}

impl MapController {
    pub fn new(engine: Box<dyn RenderEngine>, schema: Arc<ConfigurationSchema>, options: MapOptions) -> Self {
        let (changes_tx, changes_rx) = mpsc::channel();
        Self {
            engine,
            converter: Converter::new(schema),
            options,
            state: ControllerState::Uninitialized,
            props: None,
            session: None,
            store: None,
            subscription: None,
            changes_tx,
            changes_rx,
            hover: Arc::new(RwLock::new(None)),
            scene: None,
            converted: None,
            last_error: None,
        }
    }

    /// Controller over the stock map schema with default options.
    pub fn with_map_defaults(engine: Box<dyn RenderEngine>) -> Self {
        Self::new(engine, ConfigurationSchema::map_defaults(), MapOptions::default())
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The scene currently on screen; kept across failed conversions.
    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.scene.clone()
    }

    pub fn last_error(&self) -> Option<&ControllerError> {
        self.last_error.as_ref()
    }

    pub fn specification(&self) -> Option<&Specification> {
        self.store.as_ref().map(SpecStore::specification)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id())
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn can_undo(&self) -> bool {
        self.store.as_ref().is_some_and(SpecStore::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.store.as_ref().is_some_and(SpecStore::can_redo)
    }

    // ── Host updates ─────────────────────────────────────────────────

    /// Take a new set of props from the host.
    ///
    /// Reconverts when the specification or the resources changed identity.
    /// A new patch callback only refreshes the session's interaction context.
    pub fn update(&mut self, props: MapProps) -> Result<(), ControllerError> {
        self.ensure_live()?;
        let previous = self.props.replace(props.clone());

        let (id_changed, content_changed, emitter_changed, children_changed) = match &previous {
            None => (false, true, false, true),
            Some(prev) => (
                prev.id != props.id,
                !same_spec(&prev.spec, &props.spec) || !Arc::ptr_eq(&prev.resources, &props.resources),
                !same_emitter(&prev.patch_spec, &props.patch_spec),
                prev.children != props.children,
            ),
        };

        self.set_hover(props.on_hover.clone());

        if id_changed {
            log::info!(
                "Map id changed from '{}' to '{}'",
                previous.as_ref().map_or("", |p| p.id.as_str()),
                props.id
            );
            self.release_session();
        }

        // A rebuilt store may drop local edits the scene still shows.
        let mut stale = false;
        if let Some(spec) = props.non_empty_spec() {
            stale = self.sync_store(spec, &props.patch_spec) && self.converted.as_ref() != Some(spec);
        }

        if let Some(session) = self.session.as_mut() {
            if emitter_changed {
                session.set_interaction_context(InteractionContext::new(props.patch_spec.clone()))?;
                log::debug!("Interaction context of session {} refreshed", session.id());
            }
            if children_changed {
                session.set_decorations(props.children.clone())?;
            }
        }

        if content_changed || stale {
            return self.reconvert();
        }
        // A new id reopens the session on the scene already converted.
        if self.session.is_none() {
            if let Some(scene) = self.scene.clone() {
                return self.present(scene);
            }
        }
        Ok(())
    }

    // ── Local edits ──────────────────────────────────────────────────

    /// Apply a batch to the store; the map follows on success.
    pub fn apply_patch(&mut self, ops: &[PatchOperation]) -> Result<(), ControllerError> {
        self.ensure_live()?;
        self.store_mut()?.apply_patch(ops)?;
        self.follow_store()
    }

    /// Run a local action; its batch is also sent to the patch callback.
    pub fn dispatch(&mut self, action: &SpecAction) -> Result<Vec<PatchOperation>, ControllerError> {
        self.ensure_live()?;
        let ops = self.store_mut()?.dispatch(action)?;
        self.follow_store()?;
        Ok(ops)
    }

    pub fn undo(&mut self) -> Result<bool, ControllerError> {
        self.ensure_live()?;
        let undone = self.store_mut()?.undo()?;
        self.follow_store()?;
        Ok(undone)
    }

    pub fn redo(&mut self) -> Result<bool, ControllerError> {
        self.ensure_live()?;
        let redone = self.store_mut()?.redo()?;
        self.follow_store()?;
        Ok(redone)
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Unsubscribe from the store and release the session. Terminal.
    pub fn dispose(&mut self) -> Result<(), ControllerError> {
        self.ensure_live()?;
        self.release_store();
        self.release_session();
        self.set_hover(None);
        self.scene = None;
        self.converted = None;
        self.transition(ControllerState::Disposed);
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn ensure_live(&self) -> Result<(), ControllerError> {
        if self.state == ControllerState::Disposed {
            return Err(ControllerError::SessionDisposed);
        }
        Ok(())
    }

    fn transition(&mut self, next: ControllerState) {
        if self.state != next {
            log::info!("Map controller {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn set_hover(&self, callback: Option<HoverCallback>) {
        *self.hover.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn store_mut(&mut self) -> Result<&mut SpecStore, ControllerError> {
        self.store.as_mut().ok_or(ControllerError::NotInitialized)
    }

    /// Keep the store unless the host sent different content or a different
    /// patch callback. Returns whether a new store was created.
    fn sync_store(&mut self, spec: &Value, emitter: &PatchEmitter) -> bool {
        let keep = self
            .store
            .as_ref()
            .is_some_and(|store| same_emitter(store.emitter(), emitter) && store.specification().as_value() == spec);
        if keep {
            return false;
        }
        self.release_store();

        let mut store = SpecStore::with_history_limit(
            Specification::new(spec.clone()),
            emitter.clone(),
            self.options.history_limit,
        );
        let changes = self.changes_tx.clone();
        self.subscription = Some(store.subscribe(move |_: &Specification| {
            if changes.send(()).is_err() {
                log::debug!("Specification change dropped: controller is gone");
            }
        }));
        self.store = Some(store);
        log::debug!("Specification store created");
        true
    }

    fn release_store(&mut self) {
        if let Some(mut store) = self.store.take() {
            if let Some(id) = self.subscription.take() {
                store.unsubscribe(id);
            }
        }
        // Stale notifications from the old store.
        while self.changes_rx.try_recv().is_ok() {}
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.dispose();
            log::info!("Render session {} released", session.id());
        }
    }

    /// Reconvert if the store reported a change since the last call.
    fn follow_store(&mut self) -> Result<(), ControllerError> {
        if self.changes_rx.try_iter().count() == 0 {
            return Ok(());
        }
        self.reconvert()
    }

    fn reconvert(&mut self) -> Result<(), ControllerError> {
        let Some(props) = self.props.as_ref() else {
            return Ok(());
        };
        if props.non_empty_spec().is_none() {
            return Ok(());
        }
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        let spec = store.specification().as_value().clone();
        let converted = self.converter.convert(&spec, &props.resources);
        self.converted = Some(spec);

        self.transition(ControllerState::Converting);
        let outcome = converted
            .map_err(ControllerError::from)
            .and_then(|scene| self.present(Arc::new(scene)));
        match outcome {
            Ok(()) => {
                self.last_error = None;
                self.transition(ControllerState::Rendering);
                Ok(())
            }
            Err(err) => {
                log::warn!("Map conversion failed, keeping the previous scene: {}", err);
                // The session may have been released for a new id.
                if self.session.is_none() {
                    if let Some(scene) = self.scene.clone() {
                        if let Err(reopen) = self.present(scene) {
                            log::error!("Could not reopen the previous scene: {}", reopen);
                        }
                    }
                }
                self.last_error = Some(err.clone());
                self.transition(ControllerState::Error);
                Err(err)
            }
        }
    }

    /// Hand a scene to the session, opening one first if needed.
    fn present(&mut self, scene: Arc<Scene>) -> Result<(), ControllerError> {
        if self.session.is_none() {
            self.session = Some(self.open_session()?);
        }
        if let Some(session) = self.session.as_mut() {
            session.set_scene(scene.clone())?;
        }
        self.scene = Some(scene);
        Ok(())
    }

    fn open_session(&mut self) -> Result<Box<dyn RenderSession>, ControllerError> {
        let props = self.props.as_ref().ok_or(ControllerError::NotInitialized)?;
        let config = SessionConfig {
            id: props.id.clone(),
            context: InteractionContext::new(props.patch_spec.clone()),
            handlers: SessionHandlers {
                on_hover: hover_forwarder(self.hover.clone()),
                get_cursor: cursor_policy(&self.options),
                get_tooltip: tooltip_policy(&self.options),
            },
            decorations: props.children.clone(),
        };
        let session = self.engine.create_session(config)?;
        log::info!("Map '{}' opened render session {}", props.id, session.id());
        Ok(session)
    }
}

impl Drop for MapController {
    fn drop(&mut self) {
        self.release_session();
    }
}

fn same_spec(a: &Option<Arc<Value>>, b: &Option<Arc<Value>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
