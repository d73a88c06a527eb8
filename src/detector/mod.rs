pub mod chess;
pub mod grid;
pub mod preprocess;
pub mod refine;

use glam::Vec2;
use image::{DynamicImage, GrayImage};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::board::PatternSpec;
use chess::{ChessParams, chess_response, detect_peaks};
use grid::assemble_grid;
use preprocess::{adaptive_threshold, default_threshold_radius, equalize_histogram};
use refine::{SubPixParams, refine_corners};

/// Preprocessing requested from a [`CornerSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFlags {
    pub adaptive_threshold: bool,
    pub normalize_image: bool,
}

impl Default for SearchFlags {
    fn default() -> Self {
        SearchFlags {
            adaptive_threshold: true,
            normalize_image: true,
        }
    }
}

/// Outcome of one [`CornerSearch`] call.
///
/// When `found` is false, `corners` holds whatever the search got to, e.g.
/// the corner candidates that did not assemble into a grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CornerSearchResult {
    pub found: bool,
    pub corners: Vec<Vec2>,
}

impl CornerSearchResult {
    pub fn found(corners: Vec<Vec2>) -> CornerSearchResult {
        CornerSearchResult {
            found: true,
            corners,
        }
    }

    pub fn not_found(corners: Vec<Vec2>) -> CornerSearchResult {
        CornerSearchResult {
            found: false,
            corners,
        }
    }
}

/// Locates the interior corners of a checkerboard.
///
/// A found result holds `width × height` points, row-major, ordered like
/// [`crate::board::generate_reference_corners`].
pub trait CornerSearch {
    fn find_chessboard_corners(
        &self,
        gray: &GrayImage,
        pattern_size: (u32, u32),
        flags: SearchFlags,
    ) -> CornerSearchResult;
}

/// Receives every detection attempt, e.g. for an interactive overlay.
pub trait CornerViewer {
    fn show(&self, image: &DynamicImage, pattern: &PatternSpec, corners: &[Vec2], found: bool);
}

/// ChESS based chessboard search.
///
/// The raw image is searched first. The preprocessing enabled in
/// [`SearchFlags`] is only applied when that fails: the equalized image is
/// tried next, then its adaptive threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessboardCornerSearch {
    pub chess: ChessParams,
    pub subpix: SubPixParams,
    /// Window radius of the adaptive threshold. Derived from the image size
    /// when `None`.
    pub threshold_radius: Option<u32>,
}

impl ChessboardCornerSearch {
    /// Candidates on `img` and the ordered grid, if they form one.
    fn grid_on(&self, img: &GrayImage, pattern_size: (u32, u32)) -> (Vec<Vec2>, Option<Vec<Vec2>>) {
        let candidates = detect_peaks(&chess_response(img), &self.chess);
        trace!("{} corner candidates", candidates.len());
        let grid = assemble_grid(&candidates, pattern_size);
        (candidates, grid)
    }
}

impl CornerSearch for ChessboardCornerSearch {
    fn find_chessboard_corners(
        &self,
        gray: &GrayImage,
        pattern_size: (u32, u32),
        flags: SearchFlags,
    ) -> CornerSearchResult {
        let (candidates, grid) = self.grid_on(gray, pattern_size);
        if let Some(grid) = grid {
            return CornerSearchResult::found(refine_corners(gray, &grid, &self.subpix));
        }

        let normalized = flags.normalize_image.then(|| equalize_histogram(gray));
        if let Some(normalized) = &normalized {
            if let (_, Some(grid)) = self.grid_on(normalized, pattern_size) {
                debug!("grid found after histogram equalization");
                return CornerSearchResult::found(refine_corners(gray, &grid, &self.subpix));
            }
        }

        if flags.adaptive_threshold {
            let radius = self
                .threshold_radius
                .unwrap_or_else(|| default_threshold_radius(gray.dimensions()));
            let binary = adaptive_threshold(normalized.as_ref().unwrap_or(gray), radius);
            if let (_, Some(grid)) = self.grid_on(&binary, pattern_size) {
                debug!("grid found after adaptive threshold");
                return CornerSearchResult::found(refine_corners(gray, &grid, &self.subpix));
            }
        }

        CornerSearchResult::not_found(candidates)
    }
}

/// Runs `search` on one image. A failed search or a wrong point count yields
/// `None`; neither is an error for the run. The viewer sees the attempted
/// corners either way.
pub fn detect_corners(
    image: &DynamicImage,
    pattern: &PatternSpec,
    search: &dyn CornerSearch,
    flags: SearchFlags,
    viewer: Option<&dyn CornerViewer>,
) -> Option<Vec<Vec2>> {
    let gray = image.to_luma8();
    let result = search.find_chessboard_corners(&gray, pattern.grid_size(), flags);
    let found = result.found && result.corners.len() == pattern.corner_count();
    if result.found && !found {
        warn!(
            "corner search returned {} points, expected {}",
            result.corners.len(),
            pattern.corner_count()
        );
    } else if !found {
        debug!("chessboard not found");
    }
    if let Some(viewer) = viewer {
        viewer.show(image, pattern, &result.corners, found);
    }
    found.then_some(result.corners)
}
