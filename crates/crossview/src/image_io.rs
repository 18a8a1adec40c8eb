//! Interop with the `image` crate.

use crate::{IoError, OpError};
use crossview_core::{RgbaImage, RgbaImageView};
use crossview_remap::{remap_rgba, RemapTable};
use std::path::Path;

/// Borrow an `image::RgbaImage` as an [`RgbaImageView`].
pub fn rgba_view(img: &::image::RgbaImage) -> RgbaImageView<'_> {
    RgbaImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn to_image(img: RgbaImage) -> Result<::image::RgbaImage, OpError> {
    let (w, h) = (img.width, img.height);
    let too_large = || OpError::InvalidInput(format!("image {w}x{h} exceeds u32 dimensions"));
    let width = u32::try_from(w).map_err(|_| too_large())?;
    let height = u32::try_from(h).map_err(|_| too_large())?;
    ::image::RgbaImage::from_raw(width, height, img.data).ok_or_else(too_large)
}

/// Load an image file as RGBA8.
pub fn load_rgba(path: impl AsRef<Path>) -> Result<::image::RgbaImage, IoError> {
    let img = ::image::open(path)?;
    Ok(img.to_rgba8())
}

/// Remap `src` through `table` and save the result; the format follows the
/// file extension.
pub fn save_remapped(
    src: &::image::RgbaImage,
    table: &RemapTable,
    path: impl AsRef<Path>,
) -> Result<(), IoError> {
    let remapped = remap_rgba(&rgba_view(src), table).map_err(OpError::from)?;
    to_image(remapped)?.save(path)?;
    Ok(())
}
