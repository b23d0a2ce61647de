//! Shared numeric constants for the canvas crate.

// ── Viewport ────────────────────────────────────────────────────

/// Smallest allowed viewport scale.
pub const MIN_SCALE: f64 = 0.1;

/// Largest allowed viewport scale.
pub const MAX_SCALE: f64 = 3.0;

// ── Drag ────────────────────────────────────────────────────────

/// Minimum wall-clock gap between two drag broadcasts, in milliseconds.
pub const DRAG_THROTTLE_MS: u64 = 50;

// ── Elements ────────────────────────────────────────────────────

/// Maximum number of characters in an element's content.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Smallest element width in board units.
pub const MIN_ELEMENT_WIDTH: f64 = 50.0;

/// Smallest element height in board units.
pub const MIN_ELEMENT_HEIGHT: f64 = 50.0;

/// Largest element width in board units.
pub const MAX_ELEMENT_WIDTH: f64 = 800.0;

/// Largest element height in board units.
pub const MAX_ELEMENT_HEIGHT: f64 = 600.0;

/// Default sticky-note size.
pub const POSTIT_SIZE: (f64, f64) = (200.0, 150.0);

/// Default size for text blocks and images.
pub const BLOCK_SIZE: (f64, f64) = (150.0, 100.0);

/// Default sticky-note fill.
pub const DEFAULT_POSTIT_COLOR: &str = "#FEF3C7";

/// Maximum number of elements on one board.
pub const MAX_ELEMENTS_PER_BOARD: usize = 1000;
