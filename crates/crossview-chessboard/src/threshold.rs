//! Contrast normalization and the adaptive-threshold fast check.

use crate::params::FastCheckParams;
use crossview_core::{GrayImage, GrayImageView, GridSpec};

/// Linearly stretch `src` to the full 0..255 range.
///
/// Returns `None` when the dynamic range is below `min_contrast`.
pub fn normalize_contrast(src: &GrayImageView<'_>, min_contrast: u8) -> Option<GrayImage> {
    let (lo, hi) = src
        .data
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi < lo || hi - lo < min_contrast.max(1) {
        return None;
    }
    let range = (hi - lo) as u32;
    let data = src
        .data
        .iter()
        .map(|&v| (((v - lo) as u32 * 255 + range / 2) / range) as u8)
        .collect();
    Some(GrayImage {
        width: src.width,
        height: src.height,
        data,
    })
}

/// Summed-area table with one row/column of zero padding.
fn integral_image(src: &GrayImageView<'_>) -> Vec<u64> {
    let (w, h) = (src.width, src.height);
    let mut sat = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row = 0u64;
        for x in 0..w {
            row += src.get(x, y) as u64;
            sat[(y + 1) * (w + 1) + x + 1] = sat[y * (w + 1) + x + 1] + row;
        }
    }
    sat
}

/// Binary mask, `true` where a pixel is darker than its local mean minus `offset`.
pub fn adaptive_threshold(src: &GrayImageView<'_>, block_radius: usize, offset: u8) -> Vec<bool> {
    let (w, h) = (src.width, src.height);
    let sat = integral_image(src);
    let stride = w + 1;
    let mut out = vec![false; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(block_radius);
        let y1 = (y + block_radius + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(block_radius);
            let x1 = (x + block_radius + 1).min(w);
            let sum = sat[y1 * stride + x1] + sat[y0 * stride + x0]
                - sat[y0 * stride + x1]
                - sat[y1 * stride + x0];
            let area = ((y1 - y0) * (x1 - x0)) as u64;
            // v < mean - offset  <=>  (v + offset) * area < sum
            let v = src.get(x, y) as u64 + offset as u64;
            out[y * w + x] = v * area < sum;
        }
    }
    out
}

fn count_transitions(mask: impl Iterator<Item = bool>) -> usize {
    let mut prev = None;
    let mut n = 0;
    for v in mask {
        if prev.is_some_and(|p| p != v) {
            n += 1;
        }
        prev = Some(v);
    }
    n
}

/// Cheap rejection test for images without a chessboard.
///
/// A board with `cols x rows` inner corners crosses a scan line with at least
/// `min(cols, rows)` dark/light transitions; require that on at least
/// `min(cols, rows)` horizontal or vertical scan lines.
pub fn passes_fast_check(src: &GrayImageView<'_>, params: &FastCheckParams, grid: &GridSpec) -> bool {
    let (w, h) = (src.width, src.height);
    let radius = if params.block_radius == 0 {
        (w.max(h) / 8).max(3)
    } else {
        params.block_radius
    };
    let mask = adaptive_threshold(src, radius, params.offset);
    let needed = grid.cols.min(grid.rows) as usize;
    let step = params.scan_step.max(1);

    let rows_hit = (0..h)
        .step_by(step)
        .filter(|&y| count_transitions(mask[y * w..(y + 1) * w].iter().copied()) >= needed)
        .count();
    if rows_hit >= needed {
        return true;
    }

    let cols_hit = (0..w)
        .step_by(step)
        .filter(|&x| count_transitions((0..h).map(|y| mask[y * w + x])) >= needed)
        .count();
    cols_hit >= needed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes(w: usize, h: usize, period: usize) -> GrayImage {
        let data = (0..w * h)
            .map(|i| if (i % w / period) % 2 == 0 { 40 } else { 200 })
            .collect();
        GrayImage {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn flat_images_are_not_normalized() {
        let img = GrayImage {
            width: 8,
            height: 8,
            data: vec![128; 64],
        };
        assert!(normalize_contrast(&img.view(), 30).is_none());
    }

    #[test]
    fn normalization_stretches_range() {
        let img = GrayImage {
            width: 3,
            height: 1,
            data: vec![50, 100, 150],
        };
        let out = normalize_contrast(&img.view(), 30).unwrap();
        assert_eq!(out.data, vec![0, 128, 255]);
    }

    #[test]
    fn adaptive_threshold_marks_dark_stripes() {
        let img = stripes(64, 8, 8);
        let mask = adaptive_threshold(&img.view(), 8, 10);
        assert!(mask[0]);
        assert!(!mask[8]);
    }

    #[test]
    fn fast_check_needs_enough_transitions() {
        let grid = GridSpec::default();
        let params = FastCheckParams::default();
        assert!(passes_fast_check(&stripes(200, 64, 10).view(), &params, &grid));
        assert!(!passes_fast_check(&stripes(200, 64, 80).view(), &params, &grid));
    }
}
