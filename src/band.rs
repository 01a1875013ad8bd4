//! Band entity and its attached pixel data.

use std::collections::BTreeMap;

use ndarray::{Array2, Axis};

use crate::decode::FieldReader;
use crate::error::Result;
use crate::meta::{Lum, PixelSize, ThermalConst, ValidRange};
use crate::pixels::PixelArray;
use crate::schema::{check_required, FieldKind, FieldSpec, Schema};

/// Fill value assumed when a band declares none.
pub const DEFAULT_FILL_VALUE: i64 = -9999;

/// How invalid pixels are represented when a band is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskPolicy {
    /// Keep original values and dtype, marking invalid pixels in a side
    /// mask.
    #[default]
    Mask,
    /// Convert to `f32` and replace invalid pixels with NaN.
    Cast,
}

/// Pixel data attached to a band, in one of the two masking
/// representations.
#[derive(Debug, Clone, PartialEq)]
pub enum BandData {
    /// Original pixel values with an invalid-pixel mask (`true` =
    /// invalid).
    Masked {
        pixels: PixelArray,
        mask: Array2<bool>,
    },
    /// Float pixels with invalid values replaced by NaN.
    Cast(Array2<f32>),
}

impl BandData {
    /// Build band data from decoded pixels under the given policy.
    pub fn from_pixels(
        pixels: PixelArray,
        policy: MaskPolicy,
        fill: f64,
        valid: Option<(f64, f64)>,
    ) -> Self {
        match policy {
            MaskPolicy::Cast => BandData::Cast(pixels.cast_with_nan(fill, valid)),
            MaskPolicy::Mask => {
                let mask = pixels.invalid_mask(fill, valid);
                BandData::Masked { pixels, mask }
            }
        }
    }

    /// The masking policy this data was built under.
    pub fn policy(&self) -> MaskPolicy {
        match self {
            BandData::Masked { .. } => MaskPolicy::Mask,
            BandData::Cast(_) => MaskPolicy::Cast,
        }
    }

    /// Array shape as (rows, cols).
    pub fn dim(&self) -> (usize, usize) {
        match self {
            BandData::Masked { pixels, .. } => pixels.dim(),
            BandData::Cast(a) => a.dim(),
        }
    }

    /// Value at (row, col), or `None` when the pixel is invalid.
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            BandData::Masked { pixels, mask } => {
                if mask[[row, col]] {
                    None
                } else {
                    Some(pixels.get(row, col))
                }
            }
            BandData::Cast(a) => {
                let v = a[[row, col]];
                if v.is_nan() {
                    None
                } else {
                    Some(f64::from(v))
                }
            }
        }
    }

    /// Minimum and maximum over valid pixels, if any pixel is valid.
    pub fn valid_min_max(&self) -> Option<(f64, f64)> {
        let (rows, cols) = self.dim();
        let mut bounds: Option<(f64, f64)> = None;
        for row in 0..rows {
            for col in 0..cols {
                if let Some(v) = self.value(row, col) {
                    bounds = Some(match bounds {
                        None => (v, v),
                        Some((min, max)) => (min.min(v), max.max(v)),
                    });
                }
            }
        }
        bounds
    }

    /// Reverse the row axis in place.
    pub fn flip_rows(&mut self) {
        match self {
            BandData::Masked { pixels, mask } => {
                pixels.flip_rows();
                mask.invert_axis(Axis(0));
            }
            BandData::Cast(a) => a.invert_axis(Axis(0)),
        }
    }
}

/// Raster metadata and data for a single band.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Band {
    pub name: Option<String>,
    pub data_type: Option<String>,
    pub nlines: Option<usize>,
    pub nsamps: Option<usize>,
    pub product: Option<String>,
    pub app_version: Option<String>,
    pub production_date: Option<String>,
    pub resample_method: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub qa_description: Option<String>,
    pub percent_coverage: Option<f64>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub file_name: Option<String>,
    pub pixel_size: Option<PixelSize>,
    /// Declared fill value; see [`Band::fill_value`] for the default.
    pub fill_value: Option<i64>,
    pub saturate_value: Option<i64>,
    pub add_offset: Option<f64>,
    pub data_units: Option<String>,
    pub scale_factor: Option<f64>,
    pub valid_range: Option<ValidRange>,
    pub radiance: Option<Lum>,
    pub reflectance: Option<Lum>,
    pub thermal_const: Option<ThermalConst>,
    /// Bit index to description, normalized from the document's list of
    /// `{num, text}` pairs before decoding.
    pub bitmap_description: Option<BTreeMap<String, String>>,
    /// Attached pixel data; absent in metadata-only mode. Not a schema
    /// field.
    pub data: Option<BandData>,
}

impl Band {
    const NAME_F: FieldSpec = FieldSpec::required("name", FieldKind::Text);
    const DATA_TYPE: FieldSpec = FieldSpec::required("data_type", FieldKind::Text);
    const NLINES: FieldSpec = FieldSpec::required("nlines", FieldKind::Integer);
    const NSAMPS: FieldSpec = FieldSpec::required("nsamps", FieldKind::Integer);
    const PRODUCT: FieldSpec = FieldSpec::required("product", FieldKind::Text);
    const APP_VERSION: FieldSpec = FieldSpec::optional("app_version", FieldKind::Text);
    const PRODUCTION_DATE: FieldSpec = FieldSpec::optional("production_date", FieldKind::Text);
    const RESAMPLE_METHOD: FieldSpec = FieldSpec::optional("resample_method", FieldKind::Text);
    const CATEGORY: FieldSpec = FieldSpec::optional("category", FieldKind::Text);
    const SOURCE: FieldSpec = FieldSpec::optional("source", FieldKind::Text);
    const QA_DESCRIPTION: FieldSpec = FieldSpec::optional("qa_description", FieldKind::Text);
    const PERCENT_COVERAGE: FieldSpec = FieldSpec::optional("percent_coverage", FieldKind::Real);
    const SHORT_NAME: FieldSpec = FieldSpec::required("short_name", FieldKind::Text);
    const LONG_NAME: FieldSpec = FieldSpec::required("long_name", FieldKind::Text);
    const FILE_NAME: FieldSpec = FieldSpec::required("file_name", FieldKind::Text);
    const PIXEL_SIZE: FieldSpec = FieldSpec::required("pixel_size", FieldKind::Entity);
    const FILL_VALUE: FieldSpec = FieldSpec::optional("fill_value", FieldKind::Integer);
    const SATURATE_VALUE: FieldSpec = FieldSpec::optional("saturate_value", FieldKind::Integer);
    const ADD_OFFSET: FieldSpec = FieldSpec::optional("add_offset", FieldKind::Real);
    const DATA_UNITS: FieldSpec = FieldSpec::optional("data_units", FieldKind::Text);
    const SCALE_FACTOR: FieldSpec = FieldSpec::optional("scale_factor", FieldKind::Real);
    const VALID_RANGE: FieldSpec = FieldSpec::optional("valid_range", FieldKind::Entity);
    const RADIANCE: FieldSpec = FieldSpec::optional("radiance", FieldKind::Entity);
    const REFLECTANCE: FieldSpec = FieldSpec::optional("reflectance", FieldKind::Entity);
    const THERMAL_CONST: FieldSpec = FieldSpec::optional("thermal_const", FieldKind::Entity);
    const BITMAP_DESCRIPTION: FieldSpec =
        FieldSpec::optional("bitmap_description", FieldKind::TextMap);

    /// Declared fill value, or the conventional sentinel when unset.
    pub fn fill_value(&self) -> i64 {
        self.fill_value.unwrap_or(DEFAULT_FILL_VALUE)
    }

    /// The (nlines, nsamps) dimensions when both are set.
    pub fn dims(&self) -> Option<(usize, usize)> {
        Some((self.nlines?, self.nsamps?))
    }

    /// The declared valid range as inclusive bounds, when fully set.
    pub fn valid_bounds(&self) -> Option<(f64, f64)> {
        let range = self.valid_range.as_ref()?;
        Some((range.min?, range.max?))
    }
}

impl Schema for Band {
    const NAME: &'static str = "band";
    const FIELDS: &'static [FieldSpec] = &[
        Self::NAME_F,
        Self::DATA_TYPE,
        Self::NLINES,
        Self::NSAMPS,
        Self::PRODUCT,
        Self::APP_VERSION,
        Self::PRODUCTION_DATE,
        Self::RESAMPLE_METHOD,
        Self::CATEGORY,
        Self::SOURCE,
        Self::QA_DESCRIPTION,
        Self::PERCENT_COVERAGE,
        Self::SHORT_NAME,
        Self::LONG_NAME,
        Self::FILE_NAME,
        Self::PIXEL_SIZE,
        Self::FILL_VALUE,
        Self::SATURATE_VALUE,
        Self::ADD_OFFSET,
        Self::DATA_UNITS,
        Self::SCALE_FACTOR,
        Self::VALID_RANGE,
        Self::RADIANCE,
        Self::REFLECTANCE,
        Self::THERMAL_CONST,
        Self::BITMAP_DESCRIPTION,
    ];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text(&Self::NAME_F)?,
            data_type: r.text(&Self::DATA_TYPE)?,
            nlines: r.index(&Self::NLINES)?,
            nsamps: r.index(&Self::NSAMPS)?,
            product: r.text(&Self::PRODUCT)?,
            app_version: r.text(&Self::APP_VERSION)?,
            production_date: r.text(&Self::PRODUCTION_DATE)?,
            resample_method: r.text(&Self::RESAMPLE_METHOD)?,
            category: r.text(&Self::CATEGORY)?,
            source: r.text(&Self::SOURCE)?,
            qa_description: r.text(&Self::QA_DESCRIPTION)?,
            percent_coverage: r.real(&Self::PERCENT_COVERAGE)?,
            short_name: r.text(&Self::SHORT_NAME)?,
            long_name: r.text(&Self::LONG_NAME)?,
            file_name: r.text(&Self::FILE_NAME)?,
            pixel_size: r.entity(&Self::PIXEL_SIZE)?,
            fill_value: r.integer(&Self::FILL_VALUE)?,
            saturate_value: r.integer(&Self::SATURATE_VALUE)?,
            add_offset: r.real(&Self::ADD_OFFSET)?,
            data_units: r.text(&Self::DATA_UNITS)?,
            scale_factor: r.real(&Self::SCALE_FACTOR)?,
            valid_range: r.entity(&Self::VALID_RANGE)?,
            radiance: r.entity(&Self::RADIANCE)?,
            reflectance: r.entity(&Self::REFLECTANCE)?,
            thermal_const: r.entity(&Self::THERMAL_CONST)?,
            bitmap_description: r.text_map(&Self::BITMAP_DESCRIPTION)?,
            data: None,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "name" => self.name.is_some(),
            "data_type" => self.data_type.is_some(),
            "nlines" => self.nlines.is_some(),
            "nsamps" => self.nsamps.is_some(),
            "product" => self.product.is_some(),
            "app_version" => self.app_version.is_some(),
            "production_date" => self.production_date.is_some(),
            "resample_method" => self.resample_method.is_some(),
            "category" => self.category.is_some(),
            "source" => self.source.is_some(),
            "qa_description" => self.qa_description.is_some(),
            "percent_coverage" => self.percent_coverage.is_some(),
            "short_name" => self.short_name.is_some(),
            "long_name" => self.long_name.is_some(),
            "file_name" => self.file_name.is_some(),
            "pixel_size" => self.pixel_size.is_some(),
            "fill_value" => self.fill_value.is_some(),
            "saturate_value" => self.saturate_value.is_some(),
            "add_offset" => self.add_offset.is_some(),
            "data_units" => self.data_units.is_some(),
            "scale_factor" => self.scale_factor.is_some(),
            "valid_range" => self.valid_range.is_some(),
            "radiance" => self.radiance.is_some(),
            "reflectance" => self.reflectance.is_some(),
            "thermal_const" => self.thermal_const.is_some(),
            "bitmap_description" => self.bitmap_description.is_some(),
            _ => false,
        }
    }

    fn validate(&self) -> Result<()> {
        check_required(self)?;
        if let Some(pixel_size) = &self.pixel_size {
            pixel_size.validate()?;
        }
        if let Some(range) = &self.valid_range {
            range.validate()?;
        }
        if let Some(radiance) = &self.radiance {
            radiance.validate()?;
        }
        if let Some(reflectance) = &self.reflectance {
            reflectance.validate()?;
        }
        if let Some(thermal) = &self.thermal_const {
            thermal.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use crate::document::{parse_str, Node, NodeMap};
    use ndarray::array;

    const BAND_XML: &str = r#"<band product="sr_refl" source="level1" name="sr_band1"
            category="image" data_type="INT16" nlines="4" nsamps="4"
            fill_value="-9999" saturate_value="20000" scale_factor="0.0001">
        <short_name>LC08SR</short_name>
        <long_name>band 1 surface reflectance</long_name>
        <file_name>scene_sr_band1.tif</file_name>
        <pixel_size x="30" y="30" units="meters"/>
        <resample_method>none</resample_method>
        <data_units>reflectance</data_units>
        <valid_range min="-2000" max="16000"/>
        <app_version>LaSRC_1.3.0</app_version>
        <production_date>2017-06-28T18:08:30Z</production_date>
    </band>"#;

    fn decode_band(xml: &str) -> Band {
        let (_, node) = parse_str(xml).unwrap();
        Decoder::new().decode(&node).unwrap()
    }

    #[test]
    fn test_decode_band_metadata() {
        let band = decode_band(BAND_XML);
        assert_eq!(band.name.as_deref(), Some("sr_band1"));
        assert_eq!(band.dims(), Some((4, 4)));
        assert_eq!(band.fill_value(), -9999);
        assert_eq!(band.saturate_value, Some(20000));
        assert_eq!(band.scale_factor, Some(0.0001));
        assert_eq!(band.valid_bounds(), Some((-2000.0, 16000.0)));
        assert_eq!(band.pixel_size.as_ref().unwrap().xy(), Some((30.0, 30.0)));
        band.validate().unwrap();
    }

    #[test]
    fn test_fill_value_defaults_when_unset() {
        let xml = BAND_XML.replace(r#"fill_value="-9999" "#, "");
        let band = decode_band(&xml);
        assert_eq!(band.fill_value, None);
        assert_eq!(band.fill_value(), DEFAULT_FILL_VALUE);
    }

    #[test]
    fn test_band_round_trip() {
        let band = decode_band(BAND_XML);

        // Serialize the band's own fields back into the raw schema and
        // decode again; the result must be an equal band.
        let mut map = NodeMap::new();
        let mut text = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                map.push_child(key.to_string(), Node::Text(v.clone()));
            }
        };
        text("name", &band.name);
        text("data_type", &band.data_type);
        text("product", &band.product);
        text("source", &band.source);
        text("category", &band.category);
        text("short_name", &band.short_name);
        text("long_name", &band.long_name);
        text("file_name", &band.file_name);
        text("resample_method", &band.resample_method);
        text("data_units", &band.data_units);
        text("app_version", &band.app_version);
        text("production_date", &band.production_date);
        map.push_child("nlines", Node::Text(band.nlines.unwrap().to_string()));
        map.push_child("nsamps", Node::Text(band.nsamps.unwrap().to_string()));
        map.push_child("fill_value", Node::Text(band.fill_value().to_string()));
        map.push_child(
            "saturate_value",
            Node::Text(band.saturate_value.unwrap().to_string()),
        );
        map.push_child(
            "scale_factor",
            Node::Text(band.scale_factor.unwrap().to_string()),
        );
        let ps = band.pixel_size.as_ref().unwrap();
        let mut ps_map = NodeMap::new();
        ps_map.push_child("x", Node::Text(ps.x.unwrap().to_string()));
        ps_map.push_child("y", Node::Text(ps.y.unwrap().to_string()));
        ps_map.push_child("units", Node::Text(ps.units.clone().unwrap()));
        map.push_child("pixel_size", Node::Map(ps_map));
        let vr = band.valid_range.as_ref().unwrap();
        let mut vr_map = NodeMap::new();
        vr_map.push_child("min", Node::Text(vr.min.unwrap().to_string()));
        vr_map.push_child("max", Node::Text(vr.max.unwrap().to_string()));
        map.push_child("valid_range", Node::Map(vr_map));

        let rebuilt: Band = Decoder::new().decode(&Node::Map(map)).unwrap();
        assert_eq!(rebuilt, band);
    }

    #[test]
    fn test_missing_required_field_fails_validation() {
        let xml = BAND_XML.replace("<file_name>scene_sr_band1.tif</file_name>", "");
        let band = decode_band(&xml);
        let err = band.validate().unwrap_err();
        assert!(matches!(
            err,
            crate::error::EspaError::MissingField {
                entity: "band",
                field: "file_name",
            }
        ));
    }

    #[test]
    fn test_band_data_mask_mode() {
        let pixels = PixelArray::I16(array![[-9999, 50], [100, 200]]);
        let data = BandData::from_pixels(pixels, MaskPolicy::Mask, -9999.0, Some((0.0, 150.0)));

        assert_eq!(data.policy(), MaskPolicy::Mask);
        assert_eq!(data.value(0, 0), None);
        assert_eq!(data.value(0, 1), Some(50.0));
        assert_eq!(data.value(1, 1), None);

        // Masked values keep their stored representation
        match &data {
            BandData::Masked { pixels, .. } => {
                assert_eq!(pixels.get(0, 0), -9999.0);
                assert_eq!(pixels.get(1, 1), 200.0);
            }
            BandData::Cast(_) => unreachable!(),
        }
    }

    #[test]
    fn test_band_data_cast_mode() {
        let pixels = PixelArray::I16(array![[-9999, 50], [100, 200]]);
        let data = BandData::from_pixels(pixels, MaskPolicy::Cast, -9999.0, Some((0.0, 150.0)));

        assert_eq!(data.policy(), MaskPolicy::Cast);
        assert_eq!(data.value(0, 0), None);
        assert_eq!(data.value(0, 1), Some(50.0));
        assert_eq!(data.value(1, 0), Some(100.0));
        assert_eq!(data.value(1, 1), None);
    }

    #[test]
    fn test_valid_min_max_ignores_invalid() {
        let pixels = PixelArray::I16(array![[-9999, 50], [100, 30000]]);
        let data = BandData::from_pixels(pixels, MaskPolicy::Mask, -9999.0, Some((0.0, 16000.0)));
        assert_eq!(data.valid_min_max(), Some((50.0, 100.0)));
    }

    #[test]
    fn test_valid_min_max_all_invalid() {
        let pixels = PixelArray::I16(array![[-9999, -9999]]);
        let data = BandData::from_pixels(pixels, MaskPolicy::Mask, -9999.0, None);
        assert_eq!(data.valid_min_max(), None);
    }

    #[test]
    fn test_flip_rows_moves_mask_with_values() {
        let pixels = PixelArray::I16(array![[-9999, 1], [2, 3]]);
        let mut data = BandData::from_pixels(pixels, MaskPolicy::Mask, -9999.0, None);
        data.flip_rows();
        assert_eq!(data.value(0, 0), Some(2.0));
        assert_eq!(data.value(1, 0), None);
    }
}
