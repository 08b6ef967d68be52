//! Interaction handlers supplied to the engine when a session opens.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use geomap_renderer::engine::{CursorPolicy, HoverHandler, TooltipPolicy};
use geomap_renderer::{CursorState, PickInfo, PointerEvent};

use crate::options::MapOptions;
use crate::props::HoverCallback;

/// Latest caller hover callback, swapped on every update.
pub type HoverSlot = Arc<RwLock<Option<HoverCallback>>>;

/// Forwards each hover to whatever callback the slot holds at that moment.
pub fn hover_forwarder(slot: HoverSlot) -> HoverHandler {
    Arc::new(move |info: &PickInfo, event: &PointerEvent| {
        let callback = slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(info, event);
        }
    })
}

pub fn cursor_policy(options: &MapOptions) -> CursorPolicy {
    let (drag, idle) = (options.drag_cursor, options.idle_cursor);
    Arc::new(move |state: CursorState| if state.is_dragging { drag } else { idle })
}

pub fn tooltip_policy(options: &MapOptions) -> TooltipPolicy {
    let property = options.tooltip_property.clone();
    Arc::new(move |info: &PickInfo| tooltip_text(info, &property))
}

/// Text of `properties[property]` on the picked feature.
pub fn tooltip_text(info: &PickInfo, property: &str) -> Option<String> {
    if !info.picked {
        return None;
    }
    match info.feature_property(property)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
