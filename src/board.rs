use glam::Vec3;

use crate::error::{CalibError, Result};

/// Interior-corner layout of a planar checkerboard.
///
/// `width` and `height` count the corner intersections strictly inside the
/// board, i.e. one less than the number of squares along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternSpec {
    width: u32,
    height: u32,
    square_size: f64,
}

impl PatternSpec {
    pub fn new(width: u32, height: u32, square_size: f64) -> Result<PatternSpec> {
        if width < 2 || height < 2 {
            return Err(CalibError::InvalidPattern(format!(
                "need at least 2x2 interior corners, got {}x{}",
                width, height
            )));
        }
        if !square_size.is_finite() || square_size <= 0.0 {
            return Err(CalibError::InvalidPattern(format!(
                "square size must be positive, got {}",
                square_size
            )));
        }
        Ok(PatternSpec {
            width,
            height,
            square_size,
        })
    }

    /// Builds the pattern from square counts, the way board sizes are usually
    /// quoted on printed targets.
    pub fn from_square_counts(
        squares_x: u32,
        squares_y: u32,
        square_size: f64,
    ) -> Result<PatternSpec> {
        Self::new(
            squares_x.saturating_sub(1),
            squares_y.saturating_sub(1),
            square_size,
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn square_size(&self) -> f64 {
        self.square_size
    }

    /// (columns, rows) of interior corners.
    pub fn grid_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn corner_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Reference corners in the board frame.
///
/// Rows are the outer loop and columns the inner one, so corner `(r, c)` sits
/// at index `r * width + c` with coordinates `(c * s, r * s, 0)`. Detected
/// image corners are paired with these by index.
pub fn generate_reference_corners(pattern: &PatternSpec) -> Vec<Vec3> {
    let s = pattern.square_size as f32;
    let mut corners = Vec::with_capacity(pattern.corner_count());
    for r in 0..pattern.height {
        for c in 0..pattern.width {
            corners.push(Vec3::new(c as f32 * s, r as f32 * s, 0.0));
        }
    }
    corners
}
