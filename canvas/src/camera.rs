#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_SCALE, MIN_SCALE};

/// A point in either screen or board (logical) space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point { x: self.x - other.x, y: self.y - other.y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point { x: self.x + other.x, y: self.y + other.y }
    }
}

/// Convert a screen-space point to board coordinates.
#[must_use]
pub fn to_logical(screen: Point, offset: Point, scale: f64) -> Point {
    Point { x: (screen.x - offset.x) / scale, y: (screen.y - offset.y) / scale }
}

/// Convert a board-space point to screen coordinates.
#[must_use]
pub fn to_screen(logical: Point, offset: Point, scale: f64) -> Point {
    Point { x: logical.x * scale + offset.x, y: logical.y * scale + offset.y }
}

/// Clamp a requested scale into the supported zoom range.
#[must_use]
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// Per-client view onto the infinite board.
///
/// `offset` is in screen pixels and unconstrained. `scale` always lies in
/// `[MIN_SCALE, MAX_SCALE]`; construct through [`Viewport::new`] or
/// [`Viewport::set_scale`] to keep that true.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    offset: Point,
    scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { offset: Point::default(), scale: 1.0 }
    }
}

impl Viewport {
    #[must_use]
    pub fn new(offset: Point, scale: f64) -> Self {
        Self { offset, scale: clamp_scale(scale) }
    }

    #[must_use]
    pub fn offset(&self) -> Point {
        self.offset
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = clamp_scale(scale);
    }

    /// Convert a screen-space point to board coordinates.
    #[must_use]
    pub fn to_logical(&self, screen: Point) -> Point {
        to_logical(screen, self.offset, self.scale)
    }

    /// Convert a board-space point to screen coordinates.
    #[must_use]
    pub fn to_screen(&self, logical: Point) -> Point {
        to_screen(logical, self.offset, self.scale)
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset.x += dx;
        self.offset.y += dy;
    }

    /// Multiply the scale by `factor`, keeping the board point under
    /// `anchor` (screen space) fixed on screen.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let before = self.to_logical(anchor);
        self.scale = clamp_scale(self.scale * factor);
        self.offset = Point { x: anchor.x - before.x * self.scale, y: anchor.y - before.y * self.scale };
    }
}
