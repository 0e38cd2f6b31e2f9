use crate::error::{Result, SignError};
use serde::{Deserialize, Serialize};

/// Placements never get closer than this to an edge, in percent.
pub const POSITION_MIN_PERCENT: f64 = 5.0;
pub const POSITION_MAX_PERCENT: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in logical (unscaled) surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return POSITION_MIN_PERCENT;
    }
    value.clamp(POSITION_MIN_PERCENT, POSITION_MAX_PERCENT)
}

/// A document surface drawn top-left anchored and scaled by `zoom_percent`.
///
/// `surface_left`/`surface_top` are where the scaled surface starts in client
/// coordinates; `logical_*` is the unscaled page size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom_percent: f64,
    pub surface_left: f64,
    pub surface_top: f64,
    pub logical_width: f64,
    pub logical_height: f64,
}

impl Viewport {
    pub fn new(logical_width: f64, logical_height: f64) -> Result<Self> {
        if !(logical_width.is_finite() && logical_width > 0.0) {
            return Err(SignError::InvalidViewport("width"));
        }
        if !(logical_height.is_finite() && logical_height > 0.0) {
            return Err(SignError::InvalidViewport("height"));
        }
        Ok(Self {
            zoom_percent: 100.0,
            surface_left: 0.0,
            surface_top: 0.0,
            logical_width,
            logical_height,
        })
    }

    pub fn with_origin(mut self, left: f64, top: f64) -> Self {
        self.surface_left = left;
        self.surface_top = top;
        self
    }

    pub fn scale(&self) -> f64 {
        self.zoom_percent / 100.0
    }

    pub fn set_zoom(&mut self, zoom_percent: f64, min: f64, max: f64) {
        if zoom_percent.is_finite() {
            self.zoom_percent = zoom_percent.clamp(min, max);
        }
    }

    pub fn pointer_to_logical(&self, client: Point) -> Point {
        let scale = self.scale();
        Point::new(
            (client.x - self.surface_left) / scale,
            (client.y - self.surface_top) / scale,
        )
    }

    pub fn pointer_to_percent_unclamped(&self, client: Point) -> Point {
        let logical = self.pointer_to_logical(client);
        Point::new(
            logical.x / self.logical_width * 100.0,
            logical.y / self.logical_height * 100.0,
        )
    }

    /// Percent-of-document position under the pointer, clamped to the visible band.
    pub fn pointer_to_percent(&self, client: Point) -> Point {
        let raw = self.pointer_to_percent_unclamped(client);
        Point::new(clamp_percent(raw.x), clamp_percent(raw.y))
    }

    pub fn percent_to_logical(&self, percent: Point) -> Point {
        Point::new(
            percent.x / 100.0 * self.logical_width,
            percent.y / 100.0 * self.logical_height,
        )
    }

    pub fn percent_to_client(&self, percent: Point) -> Point {
        let logical = self.percent_to_logical(percent);
        let scale = self.scale();
        Point::new(
            self.surface_left + logical.x * scale,
            self.surface_top + logical.y * scale,
        )
    }

    /// Box of a signature whose stored point is its visual centre
    /// (the element is translated by -50%/-50% of its own size).
    pub fn placement_rect(&self, percent: Point, width: f64, height: f64) -> Rect {
        let anchor = self.percent_to_logical(percent);
        Rect {
            left: anchor.x - width / 2.0,
            top: anchor.y - height / 2.0,
            width,
            height,
        }
    }

    /// Distance between two client points measured in logical pixels.
    pub fn logical_distance(&self, a: Point, b: Point) -> f64 {
        let scale = self.scale();
        ((a.x - b.x) / scale).hypot((a.y - b.y) / scale)
    }
}
