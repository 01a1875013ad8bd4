//! The assembled multi-band raster set and its consistency validation.

use std::collections::HashMap;

use crate::band::Band;
use crate::decode::FieldReader;
use crate::error::{EspaError, Result};
use crate::meta::{PixelSize, RasterMetaData};
use crate::schema::{FieldKind, FieldSpec, Schema};

/// The full multi-band product for one scene, plus shared metadata.
///
/// `nlines`, `nsamps` and `pixel_size` are derived caches, not independent
/// truth: [`RasterSet::validate`] fills them from the bands and they are
/// recomputed on every validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterSet {
    pub version: Option<String>,
    pub global_metadata: Option<RasterMetaData>,
    /// Bands keyed by name; key order is irrelevant.
    pub bands: HashMap<String, Band>,
    pub nlines: Option<usize>,
    pub nsamps: Option<usize>,
    pub pixel_size: Option<PixelSize>,
}

impl RasterSet {
    const VERSION: FieldSpec = FieldSpec::optional("version", FieldKind::Text);
    const GLOBAL_METADATA: FieldSpec = FieldSpec::required("global_metadata", FieldKind::Entity);
    const NLINES: FieldSpec = FieldSpec::optional("nlines", FieldKind::Integer);
    const NSAMPS: FieldSpec = FieldSpec::optional("nsamps", FieldKind::Integer);
    const PIXEL_SIZE: FieldSpec = FieldSpec::optional("pixel_size", FieldKind::Entity);

    /// Look up a band by name.
    pub fn band(&self, name: &str) -> Result<&Band> {
        self.bands
            .get(name)
            .ok_or_else(|| EspaError::UnknownBand(name.to_string()))
    }

    /// Check cross-band consistency and back-fill the derived caches.
    ///
    /// An arbitrary band serves as the reference; every other band must
    /// match its dimensions and pixel size exactly. On success the
    /// reference values are copied into the set-level fields. Also runs
    /// the schema validation of the global metadata and each band.
    pub fn validate(&mut self) -> Result<()> {
        let (expected_dims, expected_pixel_size) = {
            let (_, reference) = self
                .bands
                .iter()
                .next()
                .ok_or(EspaError::EmptyBandSet)?;
            (reference.dims(), reference.pixel_size.clone())
        };
        let expected_xy = expected_pixel_size.as_ref().and_then(PixelSize::xy);

        for (name, band) in &self.bands {
            if band.dims() != expected_dims {
                return Err(EspaError::DimensionMismatch { band: name.clone() });
            }
            let xy = band.pixel_size.as_ref().and_then(PixelSize::xy);
            if xy != expected_xy {
                return Err(EspaError::PixelSizeMismatch { band: name.clone() });
            }
        }

        self.nlines = expected_dims.map(|(nlines, _)| nlines);
        self.nsamps = expected_dims.map(|(_, nsamps)| nsamps);
        self.pixel_size = expected_pixel_size;

        match &self.global_metadata {
            Some(meta) => meta.validate()?,
            None => {
                return Err(EspaError::MissingField {
                    entity: Self::NAME,
                    field: "global_metadata",
                })
            }
        }
        for band in self.bands.values() {
            band.validate()?;
        }
        Ok(())
    }
}

impl Schema for RasterSet {
    const NAME: &'static str = "espa_metadata";
    // The derived caches are declared so the table mirrors the entity, but
    // the document never carries them; `bands` is owned by the assembler
    // and deliberately absent.
    const FIELDS: &'static [FieldSpec] = &[
        Self::VERSION,
        Self::GLOBAL_METADATA,
        Self::NLINES,
        Self::NSAMPS,
        Self::PIXEL_SIZE,
    ];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            version: r.text(&Self::VERSION)?,
            global_metadata: r.entity(&Self::GLOBAL_METADATA)?,
            bands: HashMap::new(),
            nlines: r.index(&Self::NLINES)?,
            nsamps: r.index(&Self::NSAMPS)?,
            pixel_size: r.entity(&Self::PIXEL_SIZE)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "version" => self.version.is_some(),
            "global_metadata" => self.global_metadata.is_some(),
            "nlines" => self.nlines.is_some(),
            "nsamps" => self.nsamps.is_some(),
            "pixel_size" => self.pixel_size.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use crate::document::parse_str;
    use crate::meta::{BoundingCoordinates, Corner, CornerPoint, Projection};

    fn test_metadata() -> RasterMetaData {
        RasterMetaData {
            data_provider: Some("USGS/EROS".into()),
            satellite: Some("LANDSAT_8".into()),
            instrument: Some("OLI_TIRS".into()),
            corner: Some(vec![
                Corner {
                    location: Some("UL".into()),
                    latitude: Some(40.2),
                    longitude: Some(-106.1),
                },
                Corner {
                    location: Some("LR".into()),
                    latitude: Some(38.1),
                    longitude: Some(-103.5),
                },
            ]),
            bounding_coordinates: Some(BoundingCoordinates {
                west: Some(-106.1),
                east: Some(-103.5),
                north: Some(40.2),
                south: Some(38.1),
            }),
            projection_information: Some(Projection {
                projection: Some("UTM".into()),
                datum: Some("WGS84".into()),
                units: Some("meters".into()),
                corner_point: Some(vec![CornerPoint {
                    location: Some("UL".into()),
                    x: Some(399300.0),
                    y: Some(4450500.0),
                }]),
                grid_origin: Some("CENTER".into()),
                ..Default::default()
            }),
            orientation_angle: Some(0.0),
            ..Default::default()
        }
    }

    fn test_band(name: &str, nlines: usize, nsamps: usize, pixel: f64) -> Band {
        Band {
            name: Some(name.into()),
            data_type: Some("INT16".into()),
            nlines: Some(nlines),
            nsamps: Some(nsamps),
            product: Some("sr_refl".into()),
            short_name: Some("LC08SR".into()),
            long_name: Some(format!("{name} surface reflectance")),
            file_name: Some(format!("{name}.tif")),
            pixel_size: Some(PixelSize {
                x: Some(pixel),
                y: Some(pixel),
                units: Some("meters".into()),
            }),
            ..Default::default()
        }
    }

    fn test_set(bands: Vec<Band>) -> RasterSet {
        RasterSet {
            global_metadata: Some(test_metadata()),
            bands: bands
                .into_iter()
                .map(|b| (b.name.clone().unwrap(), b))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_backfills_derived_fields() {
        let mut set = test_set(vec![
            test_band("sr_band1", 4, 5, 30.0),
            test_band("sr_band2", 4, 5, 30.0),
        ]);
        set.validate().unwrap();

        assert_eq!(set.nlines, Some(4));
        assert_eq!(set.nsamps, Some(5));
        assert_eq!(set.pixel_size.as_ref().unwrap().xy(), Some((30.0, 30.0)));
    }

    #[test]
    fn test_validate_empty_band_set() {
        let mut set = test_set(Vec::new());
        assert!(matches!(set.validate(), Err(EspaError::EmptyBandSet)));
    }

    #[test]
    fn test_validate_names_offending_band_on_size_mismatch() {
        let mut set = test_set(vec![
            test_band("sr_band1", 4, 5, 30.0),
            test_band("sr_band2", 6, 5, 30.0),
        ]);
        match set.validate() {
            Err(EspaError::DimensionMismatch { band }) => {
                assert!(band == "sr_band1" || band == "sr_band2");
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_names_offending_band_on_pixel_size_mismatch() {
        let mut set = test_set(vec![
            test_band("sr_band1", 4, 5, 30.0),
            test_band("sr_band2", 4, 5, 15.0),
        ]);
        assert!(matches!(
            set.validate(),
            Err(EspaError::PixelSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_validated_bands_all_agree() {
        let mut set = test_set(vec![
            test_band("sr_band1", 4, 5, 30.0),
            test_band("sr_band2", 4, 5, 30.0),
            test_band("sr_band3", 4, 5, 30.0),
        ]);
        set.validate().unwrap();

        let dims: Vec<_> = set.bands.values().map(|b| b.dims()).collect();
        assert!(dims.iter().all(|d| *d == dims[0]));
    }

    #[test]
    fn test_unknown_band_lookup() {
        let set = test_set(vec![test_band("sr_band1", 4, 5, 30.0)]);
        assert!(set.band("sr_band1").is_ok());
        assert!(matches!(
            set.band("sr_band9"),
            Err(EspaError::UnknownBand(name)) if name == "sr_band9"
        ));
    }

    #[test]
    fn test_decode_version_and_metadata() {
        let xml = r#"<espa_metadata version="2.0">
            <global_metadata>
                <data_provider>USGS/EROS</data_provider>
                <satellite>LANDSAT_8</satellite>
                <instrument>OLI_TIRS</instrument>
            </global_metadata>
        </espa_metadata>"#;
        let (name, node) = parse_str(xml).unwrap();
        assert_eq!(name, "espa_metadata");

        let set: RasterSet = Decoder::new().decode(&node).unwrap();
        assert_eq!(set.version.as_deref(), Some("2.0"));
        assert_eq!(
            set.global_metadata.as_ref().unwrap().satellite.as_deref(),
            Some("LANDSAT_8")
        );
        assert!(set.bands.is_empty());
    }
}
