use serde::{Deserialize, Serialize};

/// Camera state as written in a specification's `initialViewState`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub bearing: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            longitude: 0.0,
            latitude: 0.0,
            zoom: 0.0,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

/// A view state bound to a canvas size, with an equirectangular projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub view_state: ViewState,
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
}

const TILE_SIZE: f64 = 512.0;

impl Viewport {
    pub fn new(view_state: ViewState, width: f64, height: f64) -> Self {
        Self {
            view_state,
            width,
            height,
        }
    }

    /// Screen pixels per degree at the current zoom.
    pub fn pixels_per_degree(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.view_state.zoom) / 360.0
    }

    /// Convert `[longitude, latitude]` to screen pixels.
    pub fn project(&self, lng_lat: [f64; 2]) -> [f64; 2] {
        let scale = self.pixels_per_degree();
        [
            (lng_lat[0] - self.view_state.longitude) * scale + self.width / 2.0,
            self.height / 2.0 - (lng_lat[1] - self.view_state.latitude) * scale,
        ]
    }

    /// Convert screen pixels to `[longitude, latitude]`.
    pub fn unproject(&self, xy: [f64; 2]) -> [f64; 2] {
        let scale = self.pixels_per_degree();
        [
            (xy[0] - self.width / 2.0) / scale + self.view_state.longitude,
            self.view_state.latitude - (xy[1] - self.height / 2.0) / scale,
        ]
    }

    /// Pan by a delta in screen pixels (content follows the pointer).
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let scale = self.pixels_per_degree();
        self.view_state.longitude -= dx / scale;
        self.view_state.latitude = (self.view_state.latitude + dy / scale).clamp(-90.0, 90.0);
    }
}
