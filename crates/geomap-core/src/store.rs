use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::actions::SpecAction;
use crate::history::{AppliedBatch, PatchHistory, PatchOrigin};
use crate::patch::{InvalidPatchError, PatchOperation};
use crate::spec::Specification;

/// Receives patch batches that originated inside the store.
pub type PatchEmitter = Arc<dyn Fn(&[PatchOperation]) + Send + Sync>;

pub type SubscriptionId = u64;

type Subscriber = Box<dyn FnMut(&Specification) + Send>;

/// True when both handles point at the same callback instance.
pub fn same_emitter(a: &PatchEmitter, b: &PatchEmitter) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    InvalidPatch(#[from] InvalidPatchError),

    #[error("No layer with id '{0}'")]
    UnknownLayer(String),

    #[error("Specification has no layers array")]
    MissingLayers,

    #[error("Specification root is not an object")]
    NotAnObject,
}

/// Single source of truth for the current specification.
///
/// Every change is a patch batch applied atomically; subscribers hear about
/// each successful batch exactly once. Locally originated batches (actions,
/// undo, redo) are also handed to the patch emitter.
pub struct SpecStore {
    spec: Specification,
    emitter: PatchEmitter,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
    history: PatchHistory,
}

impl SpecStore {
    pub fn initialize(spec: Specification, emitter: PatchEmitter) -> Self {
        Self::with_history_limit(spec, emitter, PatchHistory::DEFAULT_LIMIT)
    }

    pub fn with_history_limit(spec: Specification, emitter: PatchEmitter, limit: usize) -> Self {
        log::debug!("Specification store initialized (history limit {})", limit);
        Self {
            spec,
            emitter,
            subscribers: Vec::new(),
            next_subscription: 0,
            history: PatchHistory::new(limit),
        }
    }

    pub fn specification(&self) -> &Specification {
        &self.spec
    }

    pub fn emitter(&self) -> &PatchEmitter {
        &self.emitter
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Specification) + Send + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Apply an externally supplied batch.
    pub fn apply_patch(&mut self, ops: &[PatchOperation]) -> Result<(), InvalidPatchError> {
        self.commit(ops, PatchOrigin::External)
    }

    /// Apply a local action and surface the resulting batch via the emitter.
    pub fn dispatch(&mut self, action: &SpecAction) -> Result<Vec<PatchOperation>, StoreError> {
        let ops = action.to_patch(&self.spec)?;
        log::debug!("Dispatching {} ({} ops)", action.name(), ops.len());
        self.commit(&ops, PatchOrigin::Local)?;
        self.emit(&ops);
        Ok(ops)
    }

    // ── Undo / Redo ──────────────────────────────────────────────────

    pub fn undo(&mut self) -> Result<bool, InvalidPatchError> {
        let Some(batch) = self.history.take_undo() else {
            return Ok(false);
        };
        match self.spec.patched(&batch.inverse) {
            Ok((spec, _)) => {
                self.spec = spec;
                let inverse = batch.inverse.clone();
                self.history.push_redo(batch);
                self.notify();
                self.emit(&inverse);
                Ok(true)
            }
            Err(err) => {
                self.history.push_undo(batch);
                Err(err)
            }
        }
    }

    pub fn redo(&mut self) -> Result<bool, InvalidPatchError> {
        let Some(batch) = self.history.take_redo() else {
            return Ok(false);
        };
        match self.spec.patched(&batch.forward) {
            Ok((spec, inverse)) => {
                self.spec = spec;
                let forward = batch.forward.clone();
                self.history.push_undo(AppliedBatch {
                    forward: batch.forward,
                    inverse,
                    origin: PatchOrigin::Local,
                });
                self.notify();
                self.emit(&forward);
                Ok(true)
            }
            Err(err) => {
                self.history.push_redo(batch);
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn commit(&mut self, ops: &[PatchOperation], origin: PatchOrigin) -> Result<(), InvalidPatchError> {
        if ops.is_empty() {
            return Ok(());
        }
        let (spec, inverse) = self.spec.patched(ops).map_err(|err| {
            log::warn!("Rejected patch batch: {}", err);
            err
        })?;
        self.spec = spec;
        self.history.record(AppliedBatch {
            forward: ops.to_vec(),
            inverse,
            origin,
        });
        log::debug!("Applied {:?} patch batch of {} ops", origin, ops.len());
        self.notify();
        Ok(())
    }

    fn notify(&mut self) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&self.spec);
        }
    }

    fn emit(&self, ops: &[PatchOperation]) {
        (self.emitter)(ops);
    }
}

impl fmt::Debug for SpecStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecStore")
            .field("spec", &self.spec)
            .field("subscribers", &self.subscribers.len())
            .field("history", &self.history)
            .finish()
    }
}
