use glam::Vec2;
use image::GrayImage;

#[derive(Debug, Clone, Copy)]
pub struct SubPixParams {
    pub half_window: i32,
    pub max_iterations: usize,
    /// Stop once an update moves the corner less than this many pixels.
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        SubPixParams {
            half_window: 5,
            max_iterations: 10,
            epsilon: 0.01,
        }
    }
}

/// Bilinear sample with edge clamping. Pixel centres sit on integer coordinates.
fn sample(img: &GrayImage, x: f64, y: f64) -> f64 {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let xf = x.floor();
    let yf = y.floor();
    let (ax, ay) = (x - xf, y - yf);
    let at = |px: i64, py: i64| -> f64 {
        let px = px.clamp(0, w - 1) as u32;
        let py = py.clamp(0, h - 1) as u32;
        img.get_pixel(px, py)[0] as f64
    };
    let (x0, y0) = (xf as i64, yf as i64);
    let top = at(x0, y0) * (1.0 - ax) + at(x0 + 1, y0) * ax;
    let bottom = at(x0, y0 + 1) * (1.0 - ax) + at(x0 + 1, y0 + 1) * ax;
    top * (1.0 - ay) + bottom * ay
}

/// Moves `corner` to the point where the image gradients inside the window are
/// orthogonal to the vectors pointing at them, i.e. the saddle of the junction.
/// Falls back to the input when the system is singular or the corner drifts
/// out of the window.
pub fn refine_corner(img: &GrayImage, corner: Vec2, params: &SubPixParams) -> Vec2 {
    if img.width() < 3 || img.height() < 3 {
        return corner;
    }
    let hw = params.half_window;
    let sigma2 = (hw as f64).powi(2);
    let start = (corner.x as f64, corner.y as f64);
    let mut q = start;

    for _ in 0..params.max_iterations {
        let (mut gxx, mut gxy, mut gyy) = (0.0, 0.0, 0.0);
        let (mut bx, mut by) = (0.0, 0.0);
        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let px = q.0 + dx as f64;
                let py = q.1 + dy as f64;
                let gx = (sample(img, px + 1.0, py) - sample(img, px - 1.0, py)) * 0.5;
                let gy = (sample(img, px, py + 1.0) - sample(img, px, py - 1.0)) * 0.5;
                let weight = (-((dx * dx + dy * dy) as f64) / sigma2).exp();
                let (wxx, wxy, wyy) = (weight * gx * gx, weight * gx * gy, weight * gy * gy);
                gxx += wxx;
                gxy += wxy;
                gyy += wyy;
                bx += wxx * px + wxy * py;
                by += wxy * px + wyy * py;
            }
        }
        let det = gxx * gyy - gxy * gxy;
        if det.abs() < 1e-9 {
            break;
        }
        let next = ((gyy * bx - gxy * by) / det, (gxx * by - gxy * bx) / det);
        let step = ((next.0 - q.0).powi(2) + (next.1 - q.1).powi(2)).sqrt();
        q = next;
        if step < params.epsilon as f64 {
            break;
        }
    }

    let drift = ((q.0 - start.0).powi(2) + (q.1 - start.1).powi(2)).sqrt();
    if !(q.0.is_finite() && q.1.is_finite()) || drift > hw as f64 {
        corner
    } else {
        Vec2::new(q.0 as f32, q.1 as f32)
    }
}

pub fn refine_corners(img: &GrayImage, corners: &[Vec2], params: &SubPixParams) -> Vec<Vec2> {
    corners
        .iter()
        .map(|c| refine_corner(img, *c, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_junction() {
        // Junction at (20.0, 20.0) with a one pixel anti-aliased seam.
        let img = GrayImage::from_fn(41, 41, |x, y| {
            let sx = (x as f64 - 20.0).clamp(-0.5, 0.5);
            let sy = (y as f64 - 20.0).clamp(-0.5, 0.5);
            let v = 0.5 - 2.0 * sx * sy;
            image::Luma([(20.0 + 210.0 * v) as u8])
        });
        let refined = refine_corner(&img, Vec2::new(21.2, 18.9), &SubPixParams::default());
        assert!((refined.x - 20.0).abs() < 0.2, "{:?}", refined);
        assert!((refined.y - 20.0).abs() < 0.2, "{:?}", refined);
    }

    #[test]
    fn flat_patch_keeps_input() {
        let img = GrayImage::from_pixel(20, 20, image::Luma([90]));
        let c = Vec2::new(10.3, 9.7);
        assert_eq!(refine_corner(&img, c, &SubPixParams::default()), c);
    }
}
