use crate::bundle::BundleProblem;
use crate::init::{board_homographies, focal_from_homographies, pose_from_view, validate_views};
use crate::{CalibError, CameraCalibration};
use crossview_core::{
    Camera, Distortion, DistortionKind, GridSpec, ImageSize, Intrinsics, LevenbergMarquardt,
    TermCriteria,
};
use log::{debug, info, warn};
use nalgebra::Point2;

/// Model-specific knobs shared by the pinhole and fisheye entry points.
pub(crate) struct ModelSetup {
    pub kind: DistortionKind,
    /// Indices of the distortion coefficients that are refined.
    pub free: Vec<usize>,
    pub principal: (f64, f64),
    pub fallback_focal: f64,
    pub criteria: TermCriteria,
}

pub(crate) fn calibrate(
    views: &[Vec<Point2<f64>>],
    grid: &GridSpec,
    size: ImageSize,
    setup: ModelSetup,
) -> Result<CameraCalibration, CalibError> {
    let object = validate_views(views, grid, size)?;
    let homographies = board_homographies(&object, views)?;

    let (fx, fy) = focal_from_homographies(&homographies, setup.principal).unwrap_or_else(|| {
        warn!(
            "focal length not observable from {} views, using {:.1}",
            views.len(),
            setup.fallback_focal
        );
        (setup.fallback_focal, setup.fallback_focal)
    });
    let (cx, cy) = setup.principal;
    let initial = Camera::new(
        Intrinsics::new(fx, fy, cx, cy),
        Distortion::zero(setup.kind),
    );
    debug!("initial intrinsics fx={fx:.2} fy={fy:.2} cx={cx:.2} cy={cy:.2}");

    let poses = views
        .iter()
        .enumerate()
        .map(|(i, view)| pose_from_view(&initial, &object, view).ok_or(CalibError::HomographyFailed(i)))
        .collect::<Result<Vec<_>, _>>()?;

    let problem = BundleProblem {
        object: &object,
        views,
        fixed: initial.distortion,
        free: setup.free,
    };
    let mut params = problem.pack(&initial, &poses);
    let report = LevenbergMarquardt::new(setup.criteria).minimize(&problem, &mut params)?;

    let camera = problem.camera(&params);
    let poses: Vec<_> = (0..views.len()).map(|v| problem.pose(&params, v)).collect();
    let finite = params.iter().all(|v| v.is_finite()) && camera.intrinsics.is_valid();
    if !finite || !report.final_cost.is_finite() {
        return Err(CalibError::Diverged);
    }

    let rms = (report.final_cost / (views.len() * object.len()) as f64).sqrt();
    info!(
        "{:?} calibration over {} views: rms {:.4} px after {} iterations",
        setup.kind,
        views.len(),
        rms,
        report.iterations
    );

    Ok(CameraCalibration {
        image_size: size,
        camera,
        poses,
        rms,
        iterations: report.iterations,
    })
}
