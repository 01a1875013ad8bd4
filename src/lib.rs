//! espa-raster - Landsat ESPA archive loading
//!
//! Loads an ESPA archive (one XML metadata document plus one single-band
//! raster file per band) into a validated, strongly-typed raster set with
//! pixel arrays attached.
//!
//! ```rust,ignore
//! use espa_raster::{ColorScheme, RasterSetReader, ReadOptions};
//!
//! let mut reader = RasterSetReader::new("scene/scene.xml");
//! let set = reader.read(&ReadOptions::new())?;
//! let rgb = set.rgb(ColorScheme::Infrared)?;
//! ```

pub mod band;
pub mod composite;
pub mod decode;
pub mod document;
pub mod error;
pub mod meta;
pub mod pixels;
pub mod raster;
pub mod reader;
pub mod schema;

pub use band::{Band, BandData, MaskPolicy, DEFAULT_FILL_VALUE};
pub use composite::ColorScheme;
pub use error::{EspaError, Result};
pub use pixels::PixelArray;
pub use raster::RasterSet;
pub use reader::{RasterSetReader, ReadOptions};
