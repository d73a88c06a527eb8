//! ChESS corner response and peak extraction.
//!
//! The response at a pixel compares 16 samples on a circle of radius 5: for an
//! X-junction opposite samples agree (small difference response) while samples
//! a quarter turn apart disagree (large sum response).

use glam::Vec2;
use image::GrayImage;

pub const RING_RADIUS: usize = 5;

/// Clockwise ring offsets starting at the top, `k + 8` opposite to `k`.
pub const RING: [(i32, i32); 16] = [
    (0, -5),
    (2, -5),
    (3, -3),
    (5, -2),
    (5, 0),
    (5, 2),
    (3, 3),
    (2, 5),
    (0, 5),
    (-2, 5),
    (-3, 3),
    (-5, 2),
    (-5, 0),
    (-5, -2),
    (-3, -3),
    (-2, -5),
];

#[derive(Debug, Clone, Copy)]
pub struct ChessParams {
    /// Fraction of the strongest response a peak must exceed.
    pub threshold_rel: f32,
    pub nms_radius: u32,
    /// Positive-response neighbours required inside the NMS window.
    pub min_cluster_size: u32,
}

impl Default for ChessParams {
    fn default() -> Self {
        ChessParams {
            threshold_rel: 0.1,
            nms_radius: 3,
            min_cluster_size: 2,
        }
    }
}

/// Dense response map, row-major.
#[derive(Debug, Clone)]
pub struct ResponseMap {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl ResponseMap {
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }
}

pub fn chess_response(img: &GrayImage) -> ResponseMap {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let src = img.as_raw();
    let mut data = vec![0f32; w * h];
    let r = RING_RADIUS;
    if w <= 2 * r || h <= 2 * r {
        return ResponseMap { w, h, data };
    }

    for y in r..h - r {
        for x in r..w - r {
            let s: [i32; 16] = std::array::from_fn(|k| {
                let (dx, dy) = RING[k];
                let sx = (x as i32 + dx) as usize;
                let sy = (y as i32 + dy) as usize;
                src[sy * w + sx] as i32
            });
            let sum_response: i32 = (0..4)
                .map(|k| ((s[k] + s[k + 8]) - (s[k + 4] + s[k + 12])).abs())
                .sum();
            let diff_response: i32 = (0..8).map(|k| (s[k] - s[k + 8]).abs()).sum();
            let ring_mean = s.iter().sum::<i32>() as f32 / 16.0;
            let c = y * w + x;
            let local = src[c] as i32
                + src[c - 1] as i32
                + src[c + 1] as i32
                + src[c - w] as i32
                + src[c + w] as i32;
            let mean_response = (ring_mean - local as f32 / 5.0).abs();
            data[c] = (sum_response - diff_response) as f32 - 16.0 * mean_response;
        }
    }
    ResponseMap { w, h, data }
}

/// Thresholded, non-maximum suppressed peaks refined by a 5×5 centre of mass.
/// Peaks closer than the NMS radius are merged into the stronger one.
pub fn detect_peaks(resp: &ResponseMap, params: &ChessParams) -> Vec<Vec2> {
    let max = resp.data.iter().copied().fold(0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let threshold = max * params.threshold_rel;
    let r = params.nms_radius as i32;
    let border = (params.nms_radius as usize).max(2);
    if resp.w <= 2 * border || resp.h <= 2 * border {
        return Vec::new();
    }

    let mut peaks: Vec<(Vec2, f32)> = Vec::new();
    for y in border..resp.h - border {
        for x in border..resp.w - border {
            let v = resp.at(x, y);
            if v <= threshold {
                continue;
            }
            let mut is_max = true;
            let mut cluster = 0;
            'window: for dy in -r..=r {
                for dx in -r..=r {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let n = resp.at((x as i32 + dx) as usize, (y as i32 + dy) as usize);
                    if n > v {
                        is_max = false;
                        break 'window;
                    }
                    if n > 0.0 {
                        cluster += 1;
                    }
                }
            }
            if !is_max || cluster < params.min_cluster_size {
                continue;
            }

            let (mut sx, mut sy, mut sw) = (0f32, 0f32, 0f32);
            for dy in -2i32..=2 {
                for dx in -2i32..=2 {
                    let px = (x as i32 + dx) as usize;
                    let py = (y as i32 + dy) as usize;
                    let n = resp.at(px, py);
                    if n > 0.0 {
                        sx += n * px as f32;
                        sy += n * py as f32;
                        sw += n;
                    }
                }
            }
            peaks.push((Vec2::new(sx / sw, sy / sw), v));
        }
    }

    peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
    let merge_dist = params.nms_radius as f32;
    let mut kept: Vec<Vec2> = Vec::with_capacity(peaks.len());
    for (p, _) in peaks {
        if kept.iter().all(|k| k.distance(p) > merge_dist) {
            kept.push(p);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x_junction(size: u32, cx: u32, cy: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let dark = (x < cx) == (y < cy);
            image::Luma([if dark { 20 } else { 230 }])
        })
    }

    #[test]
    fn ring_samples_are_opposite() {
        for k in 0..8 {
            assert_eq!(RING[k].0, -RING[k + 8].0);
            assert_eq!(RING[k].1, -RING[k + 8].1);
        }
    }

    #[test]
    fn single_junction_gives_single_peak() {
        let img = x_junction(40, 20, 20);
        let resp = chess_response(&img);
        let peaks = detect_peaks(&resp, &ChessParams::default());
        assert_eq!(peaks.len(), 1);
        // The junction lies between pixels 19 and 20.
        assert!((peaks[0].x - 19.5).abs() < 1.0);
        assert!((peaks[0].y - 19.5).abs() < 1.0);
    }

    #[test]
    fn flat_image_has_no_peaks() {
        let img = GrayImage::from_pixel(30, 30, image::Luma([128]));
        let resp = chess_response(&img);
        assert!(detect_peaks(&resp, &ChessParams::default()).is_empty());
    }
}
