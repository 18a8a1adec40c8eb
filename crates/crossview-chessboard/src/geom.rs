use std::f32::consts::{FRAC_PI_2, PI};

/// Compute the absolute difference between two angles (radians),
/// normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Angle between an undirected axis (defined modulo π) and a directed vector
/// angle. Returns a value in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let d = angle_diff_abs(axis_angle, vec_angle);
    d.min(PI - d)
}

/// Check whether two undirected axes (angles modulo π) are approximately
/// orthogonal within the given `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    (FRAC_PI_2 - axis_vec_diff(reference_angle, other_angle)).abs() <= tolerance.abs()
}

/// Dominant direction of a set of undirected grid edges, modulo π/2.
///
/// Edges along both grid axes agree in 4θ space, so the circular mean there
/// recovers one axis; the other is that axis plus π/2.
pub fn dominant_axis(edge_angles: impl IntoIterator<Item = f32>) -> Option<f32> {
    let (mut sx, mut sy, mut n) = (0.0f32, 0.0f32, 0usize);
    for a in edge_angles {
        sx += (4.0 * a).cos();
        sy += (4.0 * a).sin();
        n += 1;
    }
    if n == 0 || (sx * sx + sy * sy).sqrt() < 1e-3 * n as f32 {
        return None;
    }
    Some(0.25 * sy.atan2(sx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn aligned_and_orthogonal_cases() {
        let tol = 1e-3;
        assert!(is_orthogonal(0.0, FRAC_PI_2, tol));
        assert!(is_orthogonal(FRAC_PI_4, 3.0 * FRAC_PI_4, tol));
        // Axes are undirected: π/4 and 5π/4 describe the same line.
        assert!(!is_orthogonal(FRAC_PI_4, 5.0 * FRAC_PI_4, 0.05));
        assert!(!is_orthogonal(0.0, 0.25, 0.05));
    }

    #[test]
    fn dominant_axis_folds_both_grid_directions() {
        let rot = 0.2f32;
        let edges = [rot, rot + FRAC_PI_2, rot + PI, rot - FRAC_PI_2, rot + 0.01];
        let axis = dominant_axis(edges).unwrap();
        assert!((axis - rot).abs() < 0.01, "axis = {axis}");
        assert!(dominant_axis([]).is_none());
    }
}
