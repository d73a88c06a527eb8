use std::cell::Cell;
use std::io::BufRead;

use glam::Vec2;
use image::{DynamicImage, Rgb, RgbImage};
use log::warn;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::{RecordingStream, TimeCell};

use crate::board::PatternSpec;
use crate::detected_points::CorrespondenceSet;
use crate::detector::CornerViewer;

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

fn row_color(row: usize, rows: usize) -> Rgb<u8> {
    let c = colorous::RAINBOW.eval_rational(row, rows.max(2));
    Rgb([c.r, c.g, c.b])
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(img: &mut RgbImage, a: Vec2, b: Vec2, color: Rgb<u8>) {
    let steps = (b - a).abs().max_element().ceil().max(1.0) as usize;
    for i in 0..=steps {
        let p = a.lerp(b, i as f32 / steps as f32);
        put(img, p.x.round() as i64, p.y.round() as i64, color);
    }
}

fn draw_circle(img: &mut RgbImage, center: Vec2, radius: f32, color: Rgb<u8>) {
    let n = (radius * 8.0).ceil().max(8.0) as usize;
    for i in 0..n {
        let t = i as f32 / n as f32 * std::f32::consts::TAU;
        let p = center + Vec2::new(t.cos(), t.sin()) * radius;
        put(img, p.x.round() as i64, p.y.round() as i64, color);
    }
}

/// Corner overlay on a copy of `image`.
///
/// A found board gets one colour per row and a polyline through the corners
/// in detection order; otherwise the attempted corners are drawn in red.
pub fn draw_chessboard_corners(
    image: &DynamicImage,
    pattern: &PatternSpec,
    corners: &[Vec2],
    found: bool,
) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let w = pattern.width() as usize;
    let rows = pattern.height() as usize;
    let radius = 4.0;
    if !found {
        let red = Rgb([255, 0, 0]);
        for c in corners {
            draw_circle(&mut canvas, *c, radius, red);
            draw_line(&mut canvas, *c - Vec2::splat(radius), *c + Vec2::splat(radius), red);
            draw_line(
                &mut canvas,
                *c + Vec2::new(-radius, radius),
                *c + Vec2::new(radius, -radius),
                red,
            );
        }
        return canvas;
    }
    for (i, c) in corners.iter().enumerate() {
        let color = row_color(i / w.max(1), rows);
        if i > 0 {
            draw_line(&mut canvas, corners[i - 1], *c, color);
        }
        draw_circle(&mut canvas, *c, radius, color);
    }
    canvas
}

pub fn log_image(recording: &RecordingStream, topic: &str, img: &RgbImage) {
    if let Err(e) = recording.log(
        format!("{}/image", topic),
        &rerun::Image::from_rgb24(img.as_raw().clone(), [img.width(), img.height()]),
    ) {
        warn!("rerun logging failed: {}", e);
    }
}

pub fn log_points(recording: &RecordingStream, topic: &str, points: &[Vec2]) {
    let (pts, colors): (Vec<_>, Vec<_>) = points
        .iter()
        .enumerate()
        .map(|(i, p)| ((p.x, p.y), id_to_color(i)))
        .unzip();
    let labels: Vec<String> = (0..points.len()).map(|i| i.to_string()).collect();
    let pts = rerun_shift(&pts);
    if let Err(e) = recording.log(
        format!("{}/pts", topic),
        &rerun::Points2D::new(pts)
            .with_colors(colors)
            .with_labels(labels)
            .with_radii([rerun::Radius::new_ui_points(5.0)]),
    ) {
        warn!("rerun logging failed: {}", e);
    }
}

/// Logs the detected corners of every view on the `image` timeline.
pub fn log_correspondences(
    recording: &RecordingStream,
    topic: &str,
    correspondences: &CorrespondenceSet,
) {
    for f in correspondences {
        recording.set_time("image", TimeCell::from_sequence(f.image_index as i64));
        log_points(recording, topic, &f.image_points);
    }
}

/// Sends each detection attempt to rerun and waits for Enter on stdin.
pub struct BlockingViewer {
    recording: RecordingStream,
    counter: Cell<i64>,
}

impl BlockingViewer {
    pub fn new(recording: RecordingStream) -> BlockingViewer {
        BlockingViewer {
            recording,
            counter: Cell::new(0),
        }
    }

    /// Sequence index of the next logged image.
    fn next_index(&self) -> i64 {
        let idx = self.counter.get();
        self.counter.set(idx + 1);
        idx
    }
}

impl CornerViewer for BlockingViewer {
    fn show(&self, image: &DynamicImage, pattern: &PatternSpec, corners: &[Vec2], found: bool) {
        let idx = self.next_index();
        let overlay = draw_chessboard_corners(image, pattern, corners, found);
        self.recording.set_time("image", TimeCell::from_sequence(idx));
        log_image(&self.recording, "corners", &overlay);
        log_points(&self.recording, "corners", corners);

        println!(
            "image {}: chessboard {}, press Enter to continue",
            idx,
            if found { "found" } else { "not found" }
        );
        let mut line = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
            warn!("failed to read stdin: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_indices_are_sequential() {
        let viewer = BlockingViewer::new(RecordingStream::disabled());
        let indices: Vec<i64> = (0..3).map(|_| viewer.next_index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
