use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Corners found in one image, paired by index with the board's reference
/// corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameFeature {
    /// Position of the source image in the calibration input.
    pub image_index: usize,
    pub image_points: Vec<Vec2>,
    pub world_points: Vec<Vec3>,
}

impl FrameFeature {
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// All accepted views of one run, in input order.
pub type CorrespondenceSet = Vec<FrameFeature>;
