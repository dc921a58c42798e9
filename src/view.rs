use std::sync::Arc;

use nalgebra::{Quaternion, Vector3};

use crate::driver::RenderTarget;

/// Which camera a [`ViewInfo`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Invalid,
    LeftEye,
    RightEye,
    Hud,
    Generic,
}

impl ViewKind {
    /// Eye kind for a stereo view index (0 = left, 1 = right).
    pub(crate) fn from_view_index(index: usize) -> Self {
        if index == 0 {
            Self::LeftEye
        } else {
            Self::RightEye
        }
    }
}

/// Everything the host needs to render one view: where to draw, from
/// where, and with what projection.
///
/// Position and orientation are in the host's left-handed coordinate
/// system, relative to the play-space origin.
#[derive(Clone)]
pub struct ViewInfo {
    pub kind: ViewKind,
    /// Render target already bound to this frame's acquired color and
    /// depth textures.
    pub target: Arc<dyn RenderTarget>,

    // Viewport
    pub width: u32,
    pub height: u32,

    pub position: Vector3<f32>,
    pub orientation: Quaternion<f32>,
    /// Midpoint between the eyes, for IPD-independent effects.
    pub position_base: Vector3<f32>,

    // FoV angles in radians. For a symmetric FoV, left/down are negative;
    // total extents are (right - left) and (up - down).
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,

    pub z_near: f32,
    pub z_far: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_kind_by_index() {
        assert_eq!(ViewKind::from_view_index(0), ViewKind::LeftEye);
        assert_eq!(ViewKind::from_view_index(1), ViewKind::RightEye);
    }
}
