use crate::vr::IntSize;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OVERLAY_SIZE: IntSize = IntSize {
    width: 640,
    height: 480,
};

/// Holds state for a single overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayState {
    /// The size of the overlay surface in pixels
    pub size: IntSize,
}

impl OverlayState {
    pub fn new(size: IntSize) -> Self {
        Self { size }
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAY_SIZE)
    }
}
