//! ChESS-style X-junction response on a 16-sample ring of radius 5.

use crate::params::ResponseParams;
use crossview_core::GrayImageView;
use nalgebra::Point2;

/// Ring offsets in circular order; sample `n + 8` is opposite `n`, `n + 4` is at 90°.
const RING: [(i32, i32); 16] = [
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
const RING_RADIUS: usize = 5;

/// A candidate X-junction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    pub position: Point2<f32>,
    /// Direction of the bright diagonal, radians modulo π.
    pub orientation: f32,
    pub strength: f32,
}

#[inline]
fn ring_samples(img: &GrayImageView<'_>, x: usize, y: usize) -> [f32; 16] {
    let mut s = [0.0f32; 16];
    for (k, &(dx, dy)) in RING.iter().enumerate() {
        let sx = (x as i32 + dx) as usize;
        let sy = (y as i32 + dy) as usize;
        s[k] = img.get(sx, sy) as f32;
    }
    s
}

/// Dense response map; pixels closer than the ring radius to a border are 0.
///
/// `R = SR - DR - 16 * MR` where SR rewards opposite quadrants matching and
/// adjacent ones differing, DR penalizes edges and MR penalizes a ring mean
/// that disagrees with the local centre mean.
pub fn chess_response(img: &GrayImageView<'_>) -> Vec<f32> {
    let (w, h) = (img.width, img.height);
    let mut out = vec![0.0f32; w * h];
    if w <= 2 * RING_RADIUS || h <= 2 * RING_RADIUS {
        return out;
    }

    for y in RING_RADIUS..h - RING_RADIUS {
        for x in RING_RADIUS..w - RING_RADIUS {
            let s = ring_samples(img, x, y);

            let mut sum_resp = 0.0;
            for n in 0..4 {
                sum_resp += (s[n] + s[n + 8] - s[n + 4] - s[n + 12]).abs();
            }
            let mut diff_resp = 0.0;
            for n in 0..8 {
                diff_resp += (s[n] - s[n + 8]).abs();
            }
            let ring_mean = s.iter().sum::<f32>() / 16.0;
            let local_mean = (img.get(x, y) as f32
                + img.get(x - 1, y) as f32
                + img.get(x + 1, y) as f32
                + img.get(x, y - 1) as f32
                + img.get(x, y + 1) as f32)
                / 5.0;
            let mean_resp = (ring_mean - local_mean).abs();

            out[y * w + x] = sum_resp - diff_resp - 16.0 * mean_resp;
        }
    }
    out
}

/// Bright-diagonal direction from the second angular harmonic of the ring.
fn ring_orientation(img: &GrayImageView<'_>, x: usize, y: usize) -> f32 {
    let s = ring_samples(img, x, y);
    let mean = s.iter().sum::<f32>() / 16.0;
    let (mut c, mut sn) = (0.0f32, 0.0f32);
    for (k, &(dx, dy)) in RING.iter().enumerate() {
        let phi = (dy as f32).atan2(dx as f32);
        let v = s[k] - mean;
        c += v * (2.0 * phi).cos();
        sn += v * (2.0 * phi).sin();
    }
    (0.5 * sn.atan2(c)).rem_euclid(std::f32::consts::PI)
}

/// Thresholded local maxima of `response`.
///
/// Ties are broken in raster order: among equal neighbours only the first
/// survives, so a corner sitting between pixels yields one candidate.
pub fn find_corners(
    img: &GrayImageView<'_>,
    response: &[f32],
    params: &ResponseParams,
) -> Vec<Corner> {
    let (w, h) = (img.width, img.height);
    let max_resp = response.iter().copied().fold(0.0f32, f32::max);
    if max_resp <= 0.0 {
        return Vec::new();
    }
    let threshold = params.threshold_rel * max_resp;
    let r = params.nms_radius.max(1) as i64;
    let margin = RING_RADIUS;

    let mut corners = Vec::new();
    for y in margin..h.saturating_sub(margin) {
        'pixel: for x in margin..w.saturating_sub(margin) {
            let idx = y * w + x;
            let v = response[idx];
            if v <= threshold {
                continue;
            }
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    let nv = response[nidx];
                    if nv > v || (nv == v && nidx < idx) {
                        continue 'pixel;
                    }
                }
            }
            corners.push(Corner {
                position: Point2::new(x as f32, y as f32),
                orientation: ring_orientation(img, x, y),
                strength: v,
            });
        }
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossview_core::GrayImage;
    use std::f32::consts::{FRAC_PI_4, PI};

    /// Four quadrants meeting between pixels (cx - 1, cx) and (cy - 1, cy).
    fn x_junction(w: usize, h: usize, cx: usize, cy: usize, flip: bool) -> GrayImage {
        let mut data = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let dark = (x < cx) == (y < cy);
                data[y * w + x] = if dark != flip { 30 } else { 220 };
            }
        }
        GrayImage {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn single_peak_at_junction() {
        let img = x_junction(32, 32, 16, 16, false);
        let view = img.view();
        let resp = chess_response(&view);
        let corners = find_corners(&view, &resp, &ResponseParams::default());
        assert_eq!(corners.len(), 1, "{corners:?}");
        let c = corners[0];
        assert!((c.position.x - 15.5).abs() <= 0.5);
        assert!((c.position.y - 15.5).abs() <= 0.5);
    }

    #[test]
    fn orientation_follows_bright_diagonal() {
        // Dark top-left/bottom-right: bright squares on the 3π/4 diagonal.
        let img = x_junction(32, 32, 16, 16, false);
        let a = ring_orientation(&img.view(), 15, 15);
        assert!((a - 3.0 * FRAC_PI_4).abs() < 0.2, "a = {a}");

        let img = x_junction(32, 32, 16, 16, true);
        let b = ring_orientation(&img.view(), 15, 15);
        assert!((b - FRAC_PI_4).abs() < 0.2, "b = {b}");
        assert!(b >= 0.0 && b < PI);
    }

    #[test]
    fn straight_edges_do_not_respond() {
        let w = 32;
        let data = (0..w * w).map(|i| if i % w < 16 { 30 } else { 220 }).collect();
        let img = GrayImage {
            width: w,
            height: w,
            data,
        };
        let resp = chess_response(&img.view());
        assert!(resp.iter().all(|&v| v <= 0.0));
    }
}
