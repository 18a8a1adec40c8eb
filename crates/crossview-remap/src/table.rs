use crate::RemapError;
use crossview_core::ImageSize;
use serde::{Deserialize, Serialize};

/// Per-pixel sampling positions for a destination image.
///
/// `map_x[y * width + x]` / `map_y[y * width + x]` hold the source
/// coordinates sampled for destination pixel `(x, y)`; integer values address
/// pixel centres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemapTable {
    pub width: usize,
    pub height: usize,
    pub map_x: Vec<f32>,
    pub map_y: Vec<f32>,
}

impl RemapTable {
    pub fn new(
        width: usize,
        height: usize,
        map_x: Vec<f32>,
        map_y: Vec<f32>,
    ) -> Result<Self, RemapError> {
        let table = Self {
            width,
            height,
            map_x,
            map_y,
        };
        table.validate()?;
        Ok(table)
    }

    /// Table that samples every pixel at its own position.
    pub fn identity(size: ImageSize) -> Self {
        let mut map_x = Vec::with_capacity(size.pixel_count());
        let mut map_y = Vec::with_capacity(size.pixel_count());
        for y in 0..size.height {
            for x in 0..size.width {
                map_x.push(x as f32);
                map_y.push(y as f32);
            }
        }
        Self {
            width: size.width,
            height: size.height,
            map_x,
            map_y,
        }
    }

    /// Fill a table by evaluating `f(x, y)` for every destination pixel.
    pub(crate) fn from_fn<F>(size: ImageSize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> (f32, f32),
    {
        let mut map_x = vec![0.0f32; size.pixel_count()];
        let mut map_y = vec![0.0f32; size.pixel_count()];
        for y in 0..size.height {
            let row = y * size.width;
            for x in 0..size.width {
                let (sx, sy) = f(x, y);
                map_x[row + x] = sx;
                map_y[row + x] = sy;
            }
        }
        Self {
            width: size.width,
            height: size.height,
            map_x,
            map_y,
        }
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> (f32, f32) {
        let i = y * self.width + x;
        (self.map_x[i], self.map_y[i])
    }

    pub fn validate(&self) -> Result<(), RemapError> {
        self.size().validate()?;
        let expected = self.size().pixel_count();
        for len in [self.map_x.len(), self.map_y.len()] {
            if len != expected {
                return Err(RemapError::MapLength {
                    width: self.width,
                    height: self.height,
                    got: len,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_addresses_own_pixel() {
        let t = RemapTable::identity(ImageSize::new(4, 3));
        assert_eq!(t.get(0, 0), (0.0, 0.0));
        assert_eq!(t.get(3, 2), (3.0, 2.0));
        assert_eq!(t.map_x.len(), 12);
    }

    #[test]
    fn rejects_short_maps() {
        let err = RemapTable::new(2, 2, vec![0.0; 4], vec![0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            RemapError::MapLength {
                width: 2,
                height: 2,
                got: 3
            }
        );
    }
}
