use std::collections::{HashMap, VecDeque};

use glam::Vec2;
use log::trace;

/// Max distance between a predicted and an accepted corner, relative to the step.
const STEP_TOLERANCE: f32 = 0.35;
const MAX_SEEDS: usize = 10;

type Lattice = HashMap<(i32, i32), usize>;

/// Assembles candidate corners into a `width × height` grid and returns them
/// row-major in canonical order, or `None` when no complete grid is found.
///
/// Candidates that do not belong to the grid are ignored.
pub fn assemble_grid(points: &[Vec2], pattern_size: (u32, u32)) -> Option<Vec<Vec2>> {
    let (w, h) = (pattern_size.0 as usize, pattern_size.1 as usize);
    if w < 2 || h < 2 || points.len() < w * h {
        return None;
    }
    let centroid = points.iter().fold(Vec2::ZERO, |acc, p| acc + *p) / points.len() as f32;
    let mut seeds: Vec<usize> = (0..points.len()).collect();
    seeds.sort_by(|&a, &b| {
        points[a]
            .distance_squared(centroid)
            .total_cmp(&points[b].distance_squared(centroid))
    });

    for &seed in seeds.iter().take(MAX_SEEDS) {
        let Some((u, v)) = seed_axes(points, seed) else {
            continue;
        };
        let lattice = grow(points, seed, u, v);
        trace!("seed {} grew {} corners", seed, lattice.len());
        let Some(grid) = to_dense(&lattice, points, w, h) else {
            continue;
        };
        if let Some(ordered) = canonical_order(&grid, w, h) {
            return Some(ordered);
        }
    }
    None
}

/// Two lattice steps at the seed: the nearest neighbour, and the nearest
/// neighbour of similar length roughly perpendicular to it.
fn seed_axes(points: &[Vec2], seed: usize) -> Option<(Vec2, Vec2)> {
    let origin = points[seed];
    let mut offsets: Vec<Vec2> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != seed)
        .map(|(_, p)| *p - origin)
        .collect();
    offsets.sort_by(|a, b| a.length_squared().total_cmp(&b.length_squared()));

    let u = *offsets.first()?;
    let u_len = u.length();
    if u_len < 1e-3 {
        return None;
    }
    let v = offsets.iter().skip(1).take(8).find(|d| {
        let len = d.length();
        let ratio = len / u_len;
        let cos = u.dot(**d) / (u_len * len);
        (0.5..=2.0).contains(&ratio) && cos.abs() < 0.5
    })?;
    Some((u, *v))
}

fn nearest(points: &[Vec2], target: Vec2) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by(|a, b| {
            a.1.distance_squared(target)
                .total_cmp(&b.1.distance_squared(target))
        })
        .map(|(i, _)| i)
}

/// Step from `cell` towards `cell + dir`, taken from the nearest known
/// neighbours so perspective foreshortening is followed.
fn local_step(
    lattice: &Lattice,
    points: &[Vec2],
    cell: (i32, i32),
    dir: (i32, i32),
    u: Vec2,
    v: Vec2,
) -> Vec2 {
    let at = |c: (i32, i32)| lattice.get(&c).map(|&k| points[k]);
    let (i, j) = cell;
    let (di, dj) = dir;
    if let (Some(p), Some(prev)) = (at(cell), at((i - di, j - dj))) {
        return p - prev;
    }
    for (ei, ej) in [(dj, di), (-dj, -di)] {
        if let (Some(a), Some(b)) = (at((i + ei, j + ej)), at((i + ei + di, j + ej + dj))) {
            return b - a;
        }
    }
    u * di as f32 + v * dj as f32
}

fn grow(points: &[Vec2], seed: usize, u: Vec2, v: Vec2) -> Lattice {
    let mut lattice = Lattice::new();
    let mut used = vec![false; points.len()];
    let mut queue = VecDeque::new();
    lattice.insert((0, 0), seed);
    used[seed] = true;
    queue.push_back((0, 0));

    while let Some(cell) = queue.pop_front() {
        let origin = points[lattice[&cell]];
        for dir in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let next = (cell.0 + dir.0, cell.1 + dir.1);
            if lattice.contains_key(&next) {
                continue;
            }
            let step = local_step(&lattice, points, cell, dir, u, v);
            let predicted = origin + step;
            let Some(k) = nearest(points, predicted) else {
                continue;
            };
            if used[k] || points[k].distance(predicted) > STEP_TOLERANCE * step.length() {
                continue;
            }
            used[k] = true;
            lattice.insert(next, k);
            queue.push_back(next);
        }
    }
    lattice
}

/// Dense `[i][j]` grid when the lattice is a complete `w × h` or `h × w` block.
fn to_dense(lattice: &Lattice, points: &[Vec2], w: usize, h: usize) -> Option<Vec<Vec<Vec2>>> {
    let min_i = lattice.keys().map(|c| c.0).min()?;
    let max_i = lattice.keys().map(|c| c.0).max()?;
    let min_j = lattice.keys().map(|c| c.1).min()?;
    let max_j = lattice.keys().map(|c| c.1).max()?;
    let ni = (max_i - min_i + 1) as usize;
    let nj = (max_j - min_j + 1) as usize;
    if !((ni == w && nj == h) || (ni == h && nj == w)) || lattice.len() != ni * nj {
        return None;
    }
    let mut grid = vec![vec![Vec2::ZERO; nj]; ni];
    for (&(i, j), &k) in lattice {
        grid[(i - min_i) as usize][(j - min_j) as usize] = points[k];
    }
    Some(grid)
}

/// Picks among the eight symmetries of the grid the row-major `h × w` layout
/// whose column and row directions are right-handed in image coordinates
/// (x right, y down), starting at the corner with the smallest `x + y`.
fn canonical_order(grid: &[Vec<Vec2>], w: usize, h: usize) -> Option<Vec<Vec2>> {
    let ni = grid.len();
    let nj = grid.first()?.len();
    let mut best: Option<Vec<Vec2>> = None;

    for transpose in [false, true] {
        for flip_rows in [false, true] {
            for flip_cols in [false, true] {
                let (rows, cols) = if transpose { (nj, ni) } else { (ni, nj) };
                if rows != h || cols != w {
                    continue;
                }
                let mut ordered = Vec::with_capacity(w * h);
                for r in 0..rows {
                    for c in 0..cols {
                        let r = if flip_rows { rows - 1 - r } else { r };
                        let c = if flip_cols { cols - 1 - c } else { c };
                        let p = if transpose { grid[c][r] } else { grid[r][c] };
                        ordered.push(p);
                    }
                }
                let col_dir = ordered[w - 1] - ordered[0];
                let row_dir = ordered[(h - 1) * w] - ordered[0];
                if col_dir.perp_dot(row_dir) <= 0.0 {
                    continue;
                }
                let score = ordered[0].x + ordered[0].y;
                if best.as_ref().is_none_or(|b| score < b[0].x + b[0].y) {
                    best = Some(ordered);
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(w: usize, h: usize, angle: f32) -> Vec<Vec2> {
        let a = Vec2::new(angle.cos(), angle.sin()) * 30.0;
        let b = Vec2::new(-angle.sin(), angle.cos()) * 30.0;
        let origin = Vec2::new(100.0, 80.0);
        let mut pts = Vec::new();
        for r in 0..h {
            for c in 0..w {
                pts.push(origin + a * c as f32 + b * r as f32);
            }
        }
        pts
    }

    #[test]
    fn recovers_row_major_order_from_shuffled_candidates() {
        let truth = lattice(6, 4, 0.35);
        let mut shuffled = truth.clone();
        shuffled.reverse();
        shuffled.swap(3, 17);
        let ordered = assemble_grid(&shuffled, (6, 4)).unwrap();
        assert_eq!(ordered, truth);
    }

    #[test]
    fn ignores_distant_outliers() {
        let truth = lattice(5, 3, -0.2);
        let mut candidates = truth.clone();
        candidates.push(Vec2::new(600.0, 400.0));
        candidates.push(Vec2::new(5.0, 450.0));
        let ordered = assemble_grid(&candidates, (5, 3)).unwrap();
        assert_eq!(ordered, truth);
    }

    #[test]
    fn transposed_pattern_size_is_reordered() {
        // Columns run down the image, rows run to the left.
        let a = Vec2::new(0.0, 25.0);
        let b = Vec2::new(-25.0, 0.0);
        let origin = Vec2::new(300.0, 50.0);
        let mut truth = Vec::new();
        for r in 0..3 {
            for c in 0..4 {
                truth.push(origin + a * c as f32 + b * r as f32);
            }
        }
        let ordered = assemble_grid(&truth, (4, 3)).unwrap();
        assert_eq!(ordered.len(), 12);
        let col_dir = ordered[3] - ordered[0];
        let row_dir = ordered[8] - ordered[0];
        assert!(col_dir.perp_dot(row_dir) > 0.0);
    }

    #[test]
    fn incomplete_grid_is_rejected() {
        let mut pts = lattice(5, 4, 0.1);
        pts.remove(7);
        pts.push(Vec2::new(900.0, 900.0));
        assert!(assemble_grid(&pts, (5, 4)).is_none());
    }
}
