use log::{debug, warn};
use nalgebra as na;

/// Hartley normalization: centroid to the origin, mean distance √2.
fn normalize_points(points: &[na::Vector2<f64>]) -> (Vec<na::Vector2<f64>>, na::Matrix3<f64>) {
    let n = points.len() as f64;
    let mean = points.iter().fold(na::Vector2::zeros(), |acc, p| acc + p) / n;
    let mean_dist = points.iter().map(|p| (p - mean).norm()).sum::<f64>() / n;
    let scale = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let normalized = points.iter().map(|p| (p - mean) * scale).collect();
    let t = na::Matrix3::new(
        scale,
        0.0,
        -mean.x * scale,
        0.0,
        scale,
        -mean.y * scale,
        0.0,
        0.0,
        1.0,
    );
    (normalized, t)
}

/// Homography mapping `src` onto `dst` with the normalized DLT.
///
/// The solution is the eigenvector of `AᵀA` with the smallest eigenvalue,
/// which also works for exactly four correspondences.
pub fn find_homography(
    src: &[na::Vector2<f64>],
    dst: &[na::Vector2<f64>],
) -> Option<na::Matrix3<f64>> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    let (src_n, ts) = normalize_points(src);
    let (dst_n, td) = normalize_points(dst);

    let mut ata = na::SMatrix::<f64, 9, 9>::zeros();
    for (s, d) in src_n.iter().zip(&dst_n) {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let r0 = na::SVector::<f64, 9>::from_column_slice(&[
            -x,
            -y,
            -1.0,
            0.0,
            0.0,
            0.0,
            u * x,
            u * y,
            u,
        ]);
        let r1 = na::SVector::<f64, 9>::from_column_slice(&[
            0.0,
            0.0,
            0.0,
            -x,
            -y,
            -1.0,
            v * x,
            v * y,
            v,
        ]);
        ata += r0 * r0.transpose() + r1 * r1.transpose();
    }

    let eigen = ata.symmetric_eigen();
    let (min_idx, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = eigen.eigenvectors.column(min_idx);
    let hn = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let mut h_mat = td.try_inverse()? * hn * ts;
    if h_mat[(2, 2)].abs() > 1e-12 {
        h_mat /= h_mat[(2, 2)];
    }
    if h_mat.iter().all(|v| v.is_finite()) {
        Some(h_mat)
    } else {
        None
    }
}

/// Focal lengths from planar homographies with a known principal point.
///
/// With the principal point removed, `B = diag(1/fx², 1/fy², 1)` and every
/// homography contributes `h1ᵀBh2 = 0` and `h1ᵀBh1 = h2ᵀBh2`, which are linear
/// in `(1/fx², 1/fy²)`. Returns `None` when the views carry no perspective
/// information (e.g. all fronto-parallel).
pub fn focal_from_homographies(
    homographies: &[na::Matrix3<f64>],
    cx: f64,
    cy: f64,
) -> Option<(f64, f64)> {
    let t_inv = na::Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let mut ata = na::Matrix2::<f64>::zeros();
    let mut atb = na::Vector2::<f64>::zeros();
    for h in homographies {
        let hc = t_inv * h;
        let hc = hc / hc.norm();
        let (h1, h2) = (hc.column(0), hc.column(1));
        let rows = [
            (h1[0] * h2[0], h1[1] * h2[1], -h1[2] * h2[2]),
            (
                h1[0] * h1[0] - h2[0] * h2[0],
                h1[1] * h1[1] - h2[1] * h2[1],
                -(h1[2] * h1[2] - h2[2] * h2[2]),
            ),
        ];
        for (a, b, rhs) in rows {
            let row = na::Vector2::new(a, b);
            ata += row * row.transpose();
            atb += row * rhs;
        }
    }
    let ab = ata.try_inverse()? * atb;
    debug!("inverse squared focal estimate {:?}", ab.as_slice());
    if ab[0] > 0.0 && ab[1] > 0.0 {
        Some((1.0 / ab[0].sqrt(), 1.0 / ab[1].sqrt()))
    } else {
        None
    }
}

/// Initial camera matrix for the solver: principal point at `(w / 2, h / 2)`,
/// the same centre [`crate::sensor::synthesize`] uses, and focal lengths from
/// the view homographies.
pub fn init_camera_matrix(
    homographies: &[na::Matrix3<f64>],
    image_size: (u32, u32),
) -> na::Matrix3<f64> {
    let cx = (image_size.0 / 2) as f64;
    let cy = (image_size.1 / 2) as f64;
    let (fx, fy) = match focal_from_homographies(homographies, cx, cy) {
        Some(f) => f,
        None => {
            let f = image_size.0.max(image_size.1) as f64;
            warn!("degenerate views for focal initialization, falling back to f = {}", f);
            (f, f)
        }
    };
    na::Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0)
}
