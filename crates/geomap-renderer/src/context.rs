use std::fmt;

use geomap_core::store::{same_emitter, PatchEmitter};
use geomap_core::PatchOperation;

/// Per-session channel from engine internals back into the application.
///
/// Installed when a session is created and replaced through
/// `RenderSession::set_interaction_context`; engine layers that edit the map
/// (drawing, dragging handles) emit their patches through it.
#[derive(Clone)]
pub struct InteractionContext {
    patch_emitter: PatchEmitter,
}

impl InteractionContext {
    pub fn new(patch_emitter: PatchEmitter) -> Self {
        Self { patch_emitter }
    }

    pub fn emit_patch(&self, ops: &[PatchOperation]) {
        (self.patch_emitter)(ops);
    }

    pub fn patch_emitter(&self) -> &PatchEmitter {
        &self.patch_emitter
    }

    pub fn uses_emitter(&self, emitter: &PatchEmitter) -> bool {
        same_emitter(&self.patch_emitter, emitter)
    }
}

impl fmt::Debug for InteractionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionContext").finish_non_exhaustive()
    }
}
