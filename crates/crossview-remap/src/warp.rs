use crate::{RemapError, RemapTable};
use crossview_core::{sample_bilinear_rgba, RgbaImage, RgbaImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Resample `src` through `table`; the output has the table's dimensions.
///
/// Bilinear interpolation, with transparent black outside the source.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, table), fields(w = table.width, h = table.height))
)]
pub fn remap_rgba(src: &RgbaImageView<'_>, table: &RemapTable) -> Result<RgbaImage, RemapError> {
    table.validate()?;
    let mut out = vec![0u8; table.width * table.height * 4];
    for (i, px) in out.chunks_exact_mut(4).enumerate() {
        if let Some(rgba) = sample_bilinear_rgba(src, table.map_x[i], table.map_y[i]) {
            px.copy_from_slice(&rgba);
        }
    }
    Ok(RgbaImage::new(table.width, table.height, out)?)
}
