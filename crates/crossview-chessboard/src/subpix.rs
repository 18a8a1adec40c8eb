use crate::params::SubPixParams;
use crossview_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refine an X-junction location to sub-pixel precision.
///
/// Every image gradient `g_q` inside the window is orthogonal to `c - q` at the
/// true corner `c`, so `c` solves `Σ w g gᵀ c = Σ w g gᵀ q`. The solve is
/// repeated around the new estimate until the update drops below `eps`.
/// Returns `start` if the system is singular or the estimate leaves the window.
pub fn refine_corner(
    img: &GrayImageView<'_>,
    start: Point2<f32>,
    params: &SubPixParams,
) -> Point2<f32> {
    let win = params.half_window.max(1) as i32;
    let sigma = win as f32 * 0.5 + 0.5;
    let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);
    let mut c = start;

    for _ in 0..params.max_iters.max(1) {
        let mut a = Matrix2::<f32>::zeros();
        let mut b = Vector2::<f32>::zeros();

        for dy in -win..=win {
            for dx in -win..=win {
                let qx = c.x + dx as f32;
                let qy = c.y + dy as f32;
                let gx = 0.5 * (sample_bilinear(img, qx + 1.0, qy) - sample_bilinear(img, qx - 1.0, qy));
                let gy = 0.5 * (sample_bilinear(img, qx, qy + 1.0) - sample_bilinear(img, qx, qy - 1.0));
                let w = (-((dx * dx + dy * dy) as f32) * inv_two_sigma2).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b[0] += gxx * qx + gxy * qy;
                b[1] += gxy * qx + gyy * qy;
            }
        }

        let Some(inv) = a.try_inverse() else {
            return start;
        };
        let next = inv * b;
        let next = Point2::new(next[0], next[1]);
        let moved = (next - c).norm();
        c = next;

        if (c - start).abs().max() > win as f32 {
            return start;
        }
        if moved < params.eps {
            break;
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossview_core::GrayImage;

    /// Anti-aliased X-junction centred at (`cx`, `cy`) in pixel-centre coordinates.
    fn soft_junction(w: usize, h: usize, cx: f32, cy: f32) -> GrayImage {
        let ss = 8;
        let mut data = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for sy in 0..ss {
                    for sx in 0..ss {
                        let px = x as f32 + (sx as f32 + 0.5) / ss as f32 - 0.5;
                        let py = y as f32 + (sy as f32 + 0.5) / ss as f32 - 0.5;
                        let dark = (px < cx) == (py < cy);
                        acc += if dark { 30.0 } else { 220.0 };
                    }
                }
                data[y * w + x] = (acc / (ss * ss) as f32).round() as u8;
            }
        }
        GrayImage {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn converges_to_fractional_junction() {
        let img = soft_junction(40, 40, 19.3, 20.6);
        let refined = refine_corner(&img.view(), Point2::new(19.0, 21.0), &SubPixParams::default());
        assert!((refined.x - 19.3).abs() < 0.1, "{refined}");
        assert!((refined.y - 20.6).abs() < 0.1, "{refined}");
    }

    #[test]
    fn flat_patch_keeps_start() {
        let img = GrayImage {
            width: 20,
            height: 20,
            data: vec![90; 400],
        };
        let start = Point2::new(10.0, 10.0);
        assert_eq!(refine_corner(&img.view(), start, &SubPixParams::default()), start);
    }
}
