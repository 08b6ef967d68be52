//! # Geomap Controller
//!
//! Lifecycle orchestration for an embedded map component. The controller
//! keeps the specification store, converts the specification whenever it or
//! the resources change, and owns the single live render session. Interaction
//! wiring (hover forwarding, cursor and tooltip policies, the interaction
//! context) is supplied to the engine when the session is opened.

pub mod options;
pub mod props;
pub mod policy;
pub mod controller;

pub use options::MapOptions;
pub use props::{HoverCallback, MapProps};
pub use controller::{ControllerError, ControllerState, MapController};
