use nalgebra::{Isometry3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Board-to-camera transform stored as a Rodrigues rotation vector plus translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self {
            rvec: rvec.into(),
            tvec: tvec.into(),
        }
    }

    pub fn from_rotation(rotation: &Rotation3<f64>, tvec: Vector3<f64>) -> Self {
        Self::new(rotation.scaled_axis(), tvec)
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self::new(iso.rotation.scaled_axis(), iso.translation.vector)
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(Vector3::from(self.rvec))
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(Vector3::from(self.tvec)),
            UnitQuaternion::from_scaled_axis(Vector3::from(self.rvec)),
        )
    }

    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + Vector3::from(self.tvec)
    }

    /// Flat `[rx, ry, rz, tx, ty, tz]` parameter block.
    pub fn to_params(&self) -> [f64; 6] {
        let [rx, ry, rz] = self.rvec;
        let [tx, ty, tz] = self.tvec;
        [rx, ry, rz, tx, ty, tz]
    }

    pub fn from_params(p: &[f64]) -> Self {
        Self {
            rvec: [p[0], p[1], p[2]],
            tvec: [p[3], p[4], p[5]],
        }
    }
}
