//! Conversions between flat `f32` buffers and structured geometry.
//!
//! Point buffers are interleaved `(x, y)` pairs; matrices are row-major.

use crate::camera::{Camera, Distortion, DistortionKind, Intrinsics};
use nalgebra::{Matrix3, Point2};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("interleaved point buffer has odd length {0}")]
    OddPointBuffer(usize),

    #[error("expected {expected} values, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("non-finite value at index {0}")]
    NonFinite(usize),

    #[error("{count} distortion coefficients do not fit the {kind:?} model")]
    DistortionLength { kind: DistortionKind, count: usize },

    #[error("intrinsic matrix has non-positive or non-finite focal lengths")]
    InvalidIntrinsics,
}

fn check_finite(buf: &[f32]) -> Result<(), CodecError> {
    match buf.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(CodecError::NonFinite(idx)),
        None => Ok(()),
    }
}

pub fn points_from_interleaved(buf: &[f32]) -> Result<Vec<Point2<f64>>, CodecError> {
    if buf.len() % 2 != 0 {
        return Err(CodecError::OddPointBuffer(buf.len()));
    }
    check_finite(buf)?;
    Ok(buf
        .chunks_exact(2)
        .map(|xy| Point2::new(xy[0] as f64, xy[1] as f64))
        .collect())
}

pub fn points_to_interleaved<T>(points: &[Point2<T>]) -> Vec<f32>
where
    T: nalgebra::Scalar + Copy + Into<f64>,
{
    points
        .iter()
        .flat_map(|p| [Into::<f64>::into(p.x) as f32, Into::<f64>::into(p.y) as f32])
        .collect()
}

/// Write `points` into `out`; nothing is written when the lengths disagree.
pub fn write_points_interleaved<T>(points: &[Point2<T>], out: &mut [f32]) -> Result<(), CodecError>
where
    T: nalgebra::Scalar + Copy + Into<f64>,
{
    let expected = points.len() * 2;
    if out.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            got: out.len(),
        });
    }
    for (dst, p) in out.chunks_exact_mut(2).zip(points) {
        dst[0] = Into::<f64>::into(p.x) as f32;
        dst[1] = Into::<f64>::into(p.y) as f32;
    }
    Ok(())
}

pub fn matrix3_from_row_major(buf: &[f32]) -> Result<Matrix3<f64>, CodecError> {
    if buf.len() != 9 {
        return Err(CodecError::LengthMismatch {
            expected: 9,
            got: buf.len(),
        });
    }
    check_finite(buf)?;
    Ok(Matrix3::from_iterator(buf.iter().map(|&v| v as f64)).transpose())
}

pub fn matrix3_to_row_major(m: &Matrix3<f64>) -> [f32; 9] {
    let mut out = [0.0f32; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[r * 3 + c] = m[(r, c)] as f32;
        }
    }
    out
}

/// Flatten per-view 3-vectors into an `N x 3` row-major buffer.
pub fn vec3_rows_to_flat(rows: &[[f64; 3]]) -> Vec<f32> {
    rows.iter()
        .flat_map(|r| r.iter().map(|&v| v as f32))
        .collect()
}

/// Copy `src` into `out` with a length check; nothing is written on mismatch.
pub fn write_exact(src: &[f32], out: &mut [f32]) -> Result<(), CodecError> {
    if src.len() != out.len() {
        return Err(CodecError::LengthMismatch {
            expected: src.len(),
            got: out.len(),
        });
    }
    out.copy_from_slice(src);
    Ok(())
}

/// Decode a camera from a row-major 3x3 intrinsic buffer and a coefficient buffer.
pub fn camera_from_buffers(
    intrinsics: &[f32],
    distortion: &[f32],
    kind: DistortionKind,
) -> Result<Camera, CodecError> {
    let k = Intrinsics::from_matrix(&matrix3_from_row_major(intrinsics)?);
    if !k.is_valid() {
        return Err(CodecError::InvalidIntrinsics);
    }
    check_finite(distortion)?;
    let coeffs: Vec<f64> = distortion.iter().map(|&v| v as f64).collect();
    let d = Distortion::from_coeffs(kind, &coeffs).ok_or(CodecError::DistortionLength {
        kind,
        count: coeffs.len(),
    })?;
    Ok(Camera::new(k, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_matrix_layout() {
        let buf = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let m = matrix3_from_row_major(&buf).unwrap();
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(m[(2, 2)], 9.0);
        assert_eq!(matrix3_to_row_major(&m), buf);
    }

    #[test]
    fn rejects_malformed_point_buffers() {
        assert_eq!(
            points_from_interleaved(&[1.0, 2.0, 3.0]),
            Err(CodecError::OddPointBuffer(3))
        );
        assert_eq!(
            points_from_interleaved(&[1.0, f32::NAN]),
            Err(CodecError::NonFinite(1))
        );
    }

    #[test]
    fn write_leaves_output_untouched_on_mismatch() {
        let pts = [Point2::new(1.0f32, 2.0), Point2::new(3.0, 4.0)];
        let mut out = [-1.0f32; 3];
        assert!(write_points_interleaved(&pts, &mut out).is_err());
        assert_eq!(out, [-1.0; 3]);

        let mut out = [0.0f32; 4];
        write_points_interleaved(&pts, &mut out).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn camera_decoding_checks_model_length() {
        let k = [800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0];
        let cam = camera_from_buffers(&k, &[0.0; 8], DistortionKind::RadialTangential).unwrap();
        assert_eq!(cam.intrinsics, Intrinsics::new(800.0, 800.0, 320.0, 240.0));
        assert!(matches!(
            camera_from_buffers(&k, &[0.0; 8], DistortionKind::Fisheye),
            Err(CodecError::DistortionLength { count: 8, .. })
        ));
        let bad_k = [0.0; 9];
        assert_eq!(
            camera_from_buffers(&bad_k, &[0.0; 4], DistortionKind::Fisheye),
            Err(CodecError::InvalidIntrinsics)
        );
    }
}
