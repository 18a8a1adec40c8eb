use serde::{Deserialize, Serialize};

/// Errors raised when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid image buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },
}

/// Pixel dimensions of a camera image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

impl ImageSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn validate(&self) -> Result<(), ImageError> {
        if self.width == 0 || self.height == 0 {
            return Err(ImageError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

fn check_buffer(
    width: usize,
    height: usize,
    channels: usize,
    len: usize,
) -> Result<(), ImageError> {
    ImageSize::new(width, height).validate()?;
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(ImageError::InvalidDimensions { width, height })?;
    if len != expected {
        return Err(ImageError::InvalidBuffer { expected, got: len });
    }
    Ok(())
}

/// Borrowed interleaved RGBA8 image.
#[derive(Clone, Copy, Debug)]
pub struct RgbaImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h*4
}

impl<'a> RgbaImageView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, ImageError> {
        check_buffer(width, height, 4, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    #[inline]
    fn pixel(&self, x: i32, y: i32) -> [f32; 4] {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return [0.0; 4];
        }
        let i = (y as usize * self.width + x as usize) * 4;
        [
            self.data[i] as f32,
            self.data[i + 1] as f32,
            self.data[i + 2] as f32,
            self.data[i + 3] as f32,
        ]
    }
}

/// Owned interleaved RGBA8 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbaImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        check_buffer(width, height, 4, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> RgbaImageView<'_> {
        RgbaImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, ImageError> {
        check_buffer(width, height, 1, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Convert RGBA to 8-bit luma with the BT.601 weights (0.299, 0.587, 0.114).
///
/// Alpha is ignored. The weighted sum is truncated, not rounded.
pub fn rgba_to_gray(src: &RgbaImageView<'_>) -> GrayImage {
    let data = src
        .data
        .chunks_exact(4)
        .map(|px| {
            let luma = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
            (luma / 1000) as u8
        })
        .collect();
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

/// Expand a gray image into opaque RGBA.
pub fn gray_to_rgba(src: &GrayImageView<'_>) -> RgbaImage {
    let mut data = Vec::with_capacity(src.data.len() * 4);
    for &v in src.data {
        data.extend_from_slice(&[v, v, v, 255]);
    }
    RgbaImage {
        width: src.width,
        height: src.height,
        data,
    }
}

/// Per-pixel operation applied to gray previews before display or detection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostOp {
    /// Linear contrast around mid-gray; slope is clamped to `[0, 3]`.
    Contrast { slope: f32 },
    Invert,
}

const MID_GRAY: f32 = 128.0;

/// Apply `ops` in order to a copy of `src`.
pub fn apply_post_ops(src: &GrayImageView<'_>, ops: &[PostOp]) -> GrayImage {
    let mut data = src.data.to_vec();
    for op in ops {
        match *op {
            PostOp::Contrast { slope } => {
                let slope = slope.clamp(0.0, 3.0);
                if (slope - 1.0).abs() < 1e-6 {
                    continue;
                }
                for v in data.iter_mut() {
                    let c = MID_GRAY + slope * (*v as f32 - MID_GRAY);
                    *v = c.round().clamp(0.0, 255.0) as u8;
                }
            }
            PostOp::Invert => {
                for v in data.iter_mut() {
                    *v = 255 - *v;
                }
            }
        }
    }
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample at pixel-center coordinates; out-of-bounds taps read as 0.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear RGBA sample; taps outside the image contribute transparent black.
///
/// Returns `None` when the sample lies entirely outside the image.
#[inline]
pub fn sample_bilinear_rgba(src: &RgbaImageView<'_>, x: f32, y: f32) -> Option<[u8; 4]> {
    if !x.is_finite()
        || !y.is_finite()
        || x <= -1.0
        || y <= -1.0
        || x >= src.width as f32
        || y >= src.height as f32
    {
        return None;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x0 + 1, y0);
    let p01 = src.pixel(x0, y0 + 1);
    let p11 = src.pixel(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_rgba_buffer() {
        let data = vec![0u8; 10];
        let err = RgbaImageView::new(2, 2, &data).unwrap_err();
        assert_eq!(
            err,
            ImageError::InvalidBuffer {
                expected: 16,
                got: 10
            }
        );
        assert!(matches!(
            RgbaImageView::new(0, 2, &[]),
            Err(ImageError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn overflowing_dimensions_are_rejected() {
        let huge = usize::MAX / 2;
        assert_eq!(
            RgbaImageView::new(huge, 3, &[]).unwrap_err(),
            ImageError::InvalidDimensions {
                width: huge,
                height: 3
            }
        );
        assert!(matches!(
            GrayImageView::new(huge, huge, &[]),
            Err(ImageError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn luma_uses_bt601_weights() {
        let data = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 0, 255, 255, 255, 255];
        let view = RgbaImageView::new(2, 2, &data).unwrap();
        let gray = rgba_to_gray(&view);
        assert_eq!(gray.data, vec![76, 149, 29, 255]);
    }

    #[test]
    fn post_ops_apply_in_order() {
        let data = [0u8, 100, 128, 200];
        let view = GrayImageView::new(4, 1, &data).unwrap();

        let inverted = apply_post_ops(&view, &[PostOp::Invert]);
        assert_eq!(inverted.data, vec![255, 155, 127, 55]);

        let stretched = apply_post_ops(&view, &[PostOp::Contrast { slope: 2.0 }]);
        assert_eq!(stretched.data, vec![0, 72, 128, 255]);

        let clamped = apply_post_ops(&view, &[PostOp::Contrast { slope: 10.0 }]);
        assert_eq!(clamped.data, vec![0, 44, 128, 255]);

        let flat = apply_post_ops(
            &view,
            &[PostOp::Contrast { slope: 0.0 }, PostOp::Invert],
        );
        assert_eq!(flat.data, vec![127; 4]);
    }

    #[test]
    fn bilinear_rgba_blends_neighbours() {
        let data = [0, 0, 0, 255, 200, 100, 50, 255];
        let view = RgbaImageView::new(2, 1, &data).unwrap();
        assert_eq!(sample_bilinear_rgba(&view, 0.5, 0.0), Some([100, 50, 25, 255]));
        assert_eq!(sample_bilinear_rgba(&view, -2.0, 0.0), None);
    }
}
