use crossview_chessboard::{ChessboardDetector, ChessboardParams};
use crossview_core::synthetic::{render_chessboard, rendered_corners, BoardRender};
use crossview_core::{GridSpec, Homography, ImageSize, RgbaImage};
use nalgebra::Matrix3;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn detector() -> ChessboardDetector {
    ChessboardDetector::new(GridSpec::default(), ChessboardParams::default())
}

fn axis_aligned_board() -> BoardRender {
    BoardRender {
        size: ImageSize::new(420, 320),
        grid: GridSpec::default(),
        square_px: 30.0,
        board_to_image: Homography::from_array([
            [1.0, 0.0, 40.0],
            [0.0, 1.0, 40.0],
            [0.0, 0.0, 1.0],
        ]),
        supersample: 4,
    }
}

/// Board rotated by ~20° about its centre with a mild perspective tilt.
fn tilted_board() -> BoardRender {
    let (s, c) = 20f64.to_radians().sin_cos();
    let to_centre = Matrix3::new(1.0, 0.0, -165.0, 0.0, 1.0, -120.0, 0.0, 0.0, 1.0);
    let rotate = Matrix3::new(c, -s, 0.0, s, c, 0.0, 1.0e-4, 5.0e-5, 1.0);
    let to_image = Matrix3::new(1.0, 0.0, 320.0, 0.0, 1.0, 240.0, 0.0, 0.0, 1.0);
    BoardRender {
        size: ImageSize::new(640, 480),
        grid: GridSpec::default(),
        square_px: 30.0,
        board_to_image: Homography::new(to_image * rotate * to_centre),
        supersample: 4,
    }
}

fn assert_matches(spec: &BoardRender, tol: f32) {
    let img = render_chessboard(spec).expect("invertible board homography");
    let detection = detector().detect(&img.view()).expect("board detected");
    let truth = rendered_corners(spec);
    assert_eq!(detection.corners.len(), truth.len());
    for (k, (got, want)) in detection.corners.iter().zip(&truth).enumerate() {
        let dx = got.x - want.x as f32;
        let dy = got.y - want.y as f32;
        assert!(
            (dx * dx + dy * dy).sqrt() < tol,
            "corner {k}: got {got}, want {want}"
        );
    }
}

#[test]
fn detects_axis_aligned_board_in_row_major_order() {
    init();
    assert_matches(&axis_aligned_board(), 0.3);
}

#[test]
fn detects_rotated_perspective_board() {
    init();
    assert_matches(&tilted_board(), 0.5);
}

#[test]
fn uniform_frame_has_no_board() {
    init();
    let img = RgbaImage::new(320, 240, vec![128; 320 * 240 * 4]).unwrap();
    assert!(detector().detect(&img.view()).is_none());
}

#[test]
fn gradient_frame_has_no_board() {
    init();
    let (w, h) = (320, 240);
    let mut data = Vec::with_capacity(w * h * 4);
    for _y in 0..h {
        for x in 0..w {
            let v = (x * 255 / (w - 1)) as u8;
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    let img = RgbaImage::new(w, h, data).unwrap();
    assert!(detector().detect(&img.view()).is_none());
}

#[test]
fn partially_covered_board_is_rejected() {
    init();
    let spec = axis_aligned_board();
    let mut img = render_chessboard(&spec).unwrap();
    // Paint over the bottom-right quarter of the board.
    for y in 180..img.height {
        for x in 220..img.width {
            let i = (y * img.width + x) * 4;
            img.data[i..i + 3].copy_from_slice(&[235, 235, 235]);
        }
    }
    assert!(detector().detect(&img.view()).is_none());
}

#[test]
fn params_fill_missing_fields_from_defaults() {
    let params: ChessboardParams =
        serde_json::from_str(r#"{ "response": { "threshold_rel": 0.3 } }"#).unwrap();
    assert_eq!(params.response.threshold_rel, 0.3);
    assert_eq!(params.response.nms_radius, 3);
    assert_eq!(params.subpix, ChessboardParams::default().subpix);
}
