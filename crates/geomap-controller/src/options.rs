use serde::{Deserialize, Serialize};

use geomap_core::PatchHistory;
use geomap_renderer::Cursor;

/// Host-tunable behaviour of the map controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapOptions {
    /// Feature property shown as the hover tooltip.
    pub tooltip_property: String,
    pub drag_cursor: Cursor,
    pub idle_cursor: Cursor,
    /// Undo depth of the specification store.
    pub history_limit: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            tooltip_property: "name".to_string(),
            drag_cursor: Cursor::Grabbing,
            idle_cursor: Cursor::Default,
            history_limit: PatchHistory::DEFAULT_LIMIT,
        }
    }
}

impl MapOptions {
    /// Parse options from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
