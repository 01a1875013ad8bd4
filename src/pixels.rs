//! Pixel storage and the raster-file codec boundary.
//!
//! Band files are decoded into a [`PixelArray`], a 2D array tagged with the
//! storage dtype the file actually carried. Masking policies operate on
//! whole arrays here; which policy applies to a band is decided by the band
//! loader.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use ndarray::{Array2, Axis};
use tiff::decoder::{Decoder as TiffDecoder, DecodingResult};

use crate::error::{EspaError, Result};

/// A decoded single-band raster, tagged with its storage dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    U8(Array2<u8>),
    U16(Array2<u16>),
    I16(Array2<i16>),
    I32(Array2<i32>),
    F32(Array2<f32>),
}

impl PixelArray {
    /// Array shape as (rows, cols).
    pub fn dim(&self) -> (usize, usize) {
        match self {
            PixelArray::U8(a) => a.dim(),
            PixelArray::U16(a) => a.dim(),
            PixelArray::I16(a) => a.dim(),
            PixelArray::I32(a) => a.dim(),
            PixelArray::F32(a) => a.dim(),
        }
    }

    /// Value at (row, col) widened to `f64`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        match self {
            PixelArray::U8(a) => f64::from(a[[row, col]]),
            PixelArray::U16(a) => f64::from(a[[row, col]]),
            PixelArray::I16(a) => f64::from(a[[row, col]]),
            PixelArray::I32(a) => f64::from(a[[row, col]]),
            PixelArray::F32(a) => f64::from(a[[row, col]]),
        }
    }

    /// Float copy of the array with invalid pixels replaced by NaN.
    ///
    /// A pixel is invalid when it equals `fill` or falls outside the
    /// inclusive `valid` bounds when bounds are declared.
    pub fn cast_with_nan(&self, fill: f64, valid: Option<(f64, f64)>) -> Array2<f32> {
        fn cast<T: Copy + Into<f64>>(
            a: &Array2<T>,
            fill: f64,
            valid: Option<(f64, f64)>,
        ) -> Array2<f32> {
            a.mapv(|v| {
                let v: f64 = v.into();
                if is_invalid(v, fill, valid) {
                    f32::NAN
                } else {
                    v as f32
                }
            })
        }

        match self {
            PixelArray::U8(a) => cast(a, fill, valid),
            PixelArray::U16(a) => cast(a, fill, valid),
            PixelArray::I16(a) => cast(a, fill, valid),
            PixelArray::I32(a) => cast(a, fill, valid),
            PixelArray::F32(a) => cast(a, fill, valid),
        }
    }

    /// Mask of invalid pixels (`true` = invalid), leaving values untouched.
    pub fn invalid_mask(&self, fill: f64, valid: Option<(f64, f64)>) -> Array2<bool> {
        fn mask<T: Copy + Into<f64>>(
            a: &Array2<T>,
            fill: f64,
            valid: Option<(f64, f64)>,
        ) -> Array2<bool> {
            a.mapv(|v| is_invalid(v.into(), fill, valid))
        }

        match self {
            PixelArray::U8(a) => mask(a, fill, valid),
            PixelArray::U16(a) => mask(a, fill, valid),
            PixelArray::I16(a) => mask(a, fill, valid),
            PixelArray::I32(a) => mask(a, fill, valid),
            PixelArray::F32(a) => mask(a, fill, valid),
        }
    }

    /// Reverse the row axis in place.
    pub fn flip_rows(&mut self) {
        match self {
            PixelArray::U8(a) => a.invert_axis(Axis(0)),
            PixelArray::U16(a) => a.invert_axis(Axis(0)),
            PixelArray::I16(a) => a.invert_axis(Axis(0)),
            PixelArray::I32(a) => a.invert_axis(Axis(0)),
            PixelArray::F32(a) => a.invert_axis(Axis(0)),
        }
    }
}

fn is_invalid(value: f64, fill: f64, valid: Option<(f64, f64)>) -> bool {
    if value == fill {
        return true;
    }
    match valid {
        Some((min, max)) => value < min || value > max,
        None => false,
    }
}

/// Decode a single-band raster file into a [`PixelArray`].
pub fn read_raster(path: &Path) -> Result<PixelArray> {
    let file = File::open(path)?;
    let mut decoder = TiffDecoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);
    debug!("decoding raster {} ({cols}x{rows})", path.display());

    let array = match decoder.read_image()? {
        DecodingResult::U8(data) => PixelArray::U8(shape(data, rows, cols, path)?),
        DecodingResult::U16(data) => PixelArray::U16(shape(data, rows, cols, path)?),
        DecodingResult::I16(data) => PixelArray::I16(shape(data, rows, cols, path)?),
        DecodingResult::I32(data) => PixelArray::I32(shape(data, rows, cols, path)?),
        DecodingResult::F32(data) => PixelArray::F32(shape(data, rows, cols, path)?),
        _ => {
            return Err(EspaError::UnsupportedRaster {
                path: path.to_path_buf(),
                reason: "unsupported sample format".into(),
            })
        }
    };
    Ok(array)
}

/// Shape a flat sample buffer into (rows, cols), rejecting multi-sample
/// layouts whose buffer length does not match the dimensions.
fn shape<T>(data: Vec<T>, rows: usize, cols: usize, path: &Path) -> Result<Array2<T>> {
    Array2::from_shape_vec((rows, cols), data).map_err(|_| EspaError::UnsupportedRaster {
        path: path.to_path_buf(),
        reason: "sample count does not match a single-band layout".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tiff::encoder::{colortype, TiffEncoder};

    fn i16_pixels() -> PixelArray {
        PixelArray::I16(array![[-9999, 100], [2500, 30000]])
    }

    #[test]
    fn test_cast_replaces_fill_with_nan() {
        let cast = i16_pixels().cast_with_nan(-9999.0, None);
        assert!(cast[[0, 0]].is_nan());
        assert_eq!(cast[[0, 1]], 100.0);
        assert_eq!(cast[[1, 1]], 30000.0);
    }

    #[test]
    fn test_cast_applies_valid_range() {
        let cast = i16_pixels().cast_with_nan(-9999.0, Some((0.0, 16000.0)));
        assert!(cast[[0, 0]].is_nan());
        assert_eq!(cast[[0, 1]], 100.0);
        assert_eq!(cast[[1, 0]], 2500.0);
        // 30000 is above the declared maximum
        assert!(cast[[1, 1]].is_nan());
    }

    #[test]
    fn test_mask_preserves_values() {
        let pixels = i16_pixels();
        let mask = pixels.invalid_mask(-9999.0, Some((0.0, 16000.0)));
        assert!(mask[[0, 0]]);
        assert!(!mask[[0, 1]]);
        assert!(mask[[1, 1]]);
        // Stored values are unchanged under the mask
        assert_eq!(pixels.get(0, 0), -9999.0);
        assert_eq!(pixels.get(1, 1), 30000.0);
    }

    #[test]
    fn test_flip_rows() {
        let mut pixels = i16_pixels();
        pixels.flip_rows();
        assert_eq!(pixels.get(0, 0), 2500.0);
        assert_eq!(pixels.get(1, 0), -9999.0);
    }

    #[test]
    fn test_read_raster_u16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");

        let data: Vec<u16> = vec![0, 1, 2, 3, 4, 5];
        let mut file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        encoder
            .write_image::<colortype::Gray16>(3, 2, &data)
            .unwrap();
        drop(file);

        let pixels = read_raster(&path).unwrap();
        assert_eq!(pixels.dim(), (2, 3));
        assert_eq!(pixels.get(0, 2), 2.0);
        assert_eq!(pixels.get(1, 0), 3.0);
        assert!(matches!(pixels, PixelArray::U16(_)));
    }

    #[test]
    fn test_read_raster_f32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");

        let data: Vec<f32> = vec![-9999.0, 0.5, 1.5, 2.5];
        let mut file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(2, 2, &data)
            .unwrap();
        drop(file);

        let pixels = read_raster(&path).unwrap();
        assert!(matches!(pixels, PixelArray::F32(_)));
        assert_eq!(pixels.get(0, 0), -9999.0);
    }

    #[test]
    fn test_read_raster_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_raster(&dir.path().join("nope.tif")).unwrap_err();
        assert!(matches!(err, EspaError::Io(_)));
    }

    #[test]
    fn test_read_raster_rejects_multi_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");

        let data: Vec<u8> = vec![0; 2 * 2 * 3];
        let mut file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        encoder.write_image::<colortype::RGB8>(2, 2, &data).unwrap();
        drop(file);

        let err = read_raster(&path).unwrap_err();
        assert!(matches!(err, EspaError::UnsupportedRaster { .. }));
    }
}
