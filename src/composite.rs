//! RGB composites from band triples.
//!
//! Band combinations follow the USGS guidance on Landsat band
//! combinations; explicit band names always override a preset scheme.
//! Each channel is stretched independently from its own observed range,
//! which is an intentional per-channel stretch rather than a joint one.

use ndarray::{s, Array2, Array3};

use crate::band::BandData;
use crate::error::{EspaError, Result};
use crate::raster::RasterSet;

/// Predefined RGB band combinations, keyed by satellite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    TrueColor,
    Infrared,
    FalseColorA,
    FalseColorB,
    FalseColorC,
}

impl ColorScheme {
    /// All schemes, in presentation order.
    pub const ALL: [ColorScheme; 5] = [
        ColorScheme::TrueColor,
        ColorScheme::Infrared,
        ColorScheme::FalseColorA,
        ColorScheme::FalseColorB,
        ColorScheme::FalseColorC,
    ];

    /// Look up a scheme by its short name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "true" => Some(ColorScheme::TrueColor),
            "infrared" => Some(ColorScheme::Infrared),
            "false_a" => Some(ColorScheme::FalseColorA),
            "false_b" => Some(ColorScheme::FalseColorB),
            "false_c" => Some(ColorScheme::FalseColorC),
            _ => None,
        }
    }

    /// The scheme's short name.
    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::TrueColor => "true",
            ColorScheme::Infrared => "infrared",
            ColorScheme::FalseColorA => "false_a",
            ColorScheme::FalseColorB => "false_b",
            ColorScheme::FalseColorC => "false_c",
        }
    }

    /// Band names for this scheme on the given satellite, if known.
    pub fn bands(self, satellite: &str) -> Option<[&'static str; 3]> {
        let landsat8 = match satellite {
            "LANDSAT_8" => true,
            "LANDSAT_7" | "LANDSAT_5" => false,
            _ => return None,
        };
        Some(match (self, landsat8) {
            (ColorScheme::TrueColor, true) => ["sr_band4", "sr_band3", "sr_band2"],
            (ColorScheme::TrueColor, false) => ["sr_band3", "sr_band2", "sr_band1"],
            (ColorScheme::Infrared, true) => ["sr_band5", "sr_band4", "sr_band3"],
            (ColorScheme::Infrared, false) => ["sr_band4", "sr_band3", "sr_band2"],
            (ColorScheme::FalseColorA, true) => ["sr_band6", "sr_band5", "sr_band4"],
            (ColorScheme::FalseColorA, false) => ["sr_band5", "sr_band4", "sr_band3"],
            (ColorScheme::FalseColorB, true) => ["sr_band7", "sr_band6", "sr_band4"],
            (ColorScheme::FalseColorB, false) => ["sr_band7", "sr_band5", "sr_band3"],
            (ColorScheme::FalseColorC, true) => ["sr_band7", "sr_band5", "sr_band3"],
            (ColorScheme::FalseColorC, false) => ["sr_band7", "sr_band4", "sr_band2"],
        })
    }
}

impl RasterSet {
    /// RGB composite for a preset scheme, keyed by the scene's satellite.
    pub fn rgb(&self, scheme: ColorScheme) -> Result<Array3<u8>> {
        let satellite = self
            .global_metadata
            .as_ref()
            .and_then(|meta| meta.satellite.as_deref())
            .ok_or_else(|| EspaError::insufficient_bands("satellite identifier is not set"))?;
        let names = scheme.bands(satellite).ok_or_else(|| {
            EspaError::insufficient_bands(format!(
                "no `{}` preset for satellite `{satellite}`",
                scheme.name()
            ))
        })?;
        self.rgb_from_names(names)
    }

    /// RGB composite from an explicit ordered (red, green, blue) triple of
    /// band names.
    pub fn rgb_from_names(&self, names: [&str; 3]) -> Result<Array3<u8>> {
        let mut channels = Vec::with_capacity(3);
        for name in names {
            let band = self
                .bands
                .get(name)
                .ok_or_else(|| EspaError::UnknownBand(name.to_string()))?;
            let data = band.data.as_ref().ok_or_else(|| {
                EspaError::insufficient_bands(format!("band `{name}` has no data attached"))
            })?;
            channels.push(normalize_channel(data));
        }

        let (rows, cols) = channels[0].dim();
        let mut rgb = Array3::zeros((rows, cols, 3));
        for (channel, values) in channels.iter().enumerate() {
            rgb.slice_mut(s![.., .., channel]).assign(values);
        }
        Ok(rgb)
    }
}

/// Stretch one band to the full 8-bit range from its own valid min/max.
///
/// Invalid pixels map to 0, as does every pixel of a constant or entirely
/// invalid band.
fn normalize_channel(data: &BandData) -> Array2<u8> {
    let (rows, cols) = data.dim();
    let mut out = Array2::zeros((rows, cols));

    let Some((min, max)) = data.valid_min_max() else {
        return out;
    };
    if max <= min {
        return out;
    }

    let scale = 255.0 / (max - min);
    for row in 0..rows {
        for col in 0..cols {
            if let Some(v) = data.value(row, col) {
                out[[row, col]] = ((v - min) * scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}
