//! # Geomap Core
//!
//! The declarative map specification and everything that mutates it:
//! JSON pointers, RFC 6902 style patch operations applied as atomic batches,
//! the specification store with change subscriptions, and an undo/redo
//! journal of applied batches.
//!
//! Also home of the resolved value model shared by the converter and the
//! renderer.

pub mod pointer;
pub mod patch;
pub mod spec;
pub mod history;
pub mod actions;
pub mod store;
pub mod value;

pub use pointer::{JsonPointer, PointerError};
pub use patch::{InvalidPatchError, PatchFault, PatchOperation};
pub use spec::Specification;
pub use history::{AppliedBatch, PatchHistory, PatchOrigin};
pub use actions::SpecAction;
pub use store::{PatchEmitter, SpecStore, StoreError, SubscriptionId};
pub use value::{Accessor, ClassKind, Handle, Instance, NamedFunction, Resolved, ResolvedMap};
