//! Metadata entities for an ESPA scene.
//!
//! Pure data records decoded from the metadata document. Every field is an
//! `Option` so a partially decoded entity is representable; required fields
//! are enforced by [`Schema::validate`], which recurses into nested
//! entities where the schema nests them.

use std::collections::BTreeMap;

use crate::decode::FieldReader;
use crate::error::Result;
use crate::schema::{check_required, FieldKind, FieldSpec, Schema};

/// Radiometric scaling pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lum {
    pub gain: Option<f64>,
    pub bias: Option<f64>,
}

impl Lum {
    const GAIN: FieldSpec = FieldSpec::required("gain", FieldKind::Real);
    const BIAS: FieldSpec = FieldSpec::required("bias", FieldKind::Real);
}

impl Schema for Lum {
    const NAME: &'static str = "lum";
    const FIELDS: &'static [FieldSpec] = &[Self::GAIN, Self::BIAS];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            gain: r.real(&Self::GAIN)?,
            bias: r.real(&Self::BIAS)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "gain" => self.gain.is_some(),
            "bias" => self.bias.is_some(),
            _ => false,
        }
    }
}

/// Thermal conversion constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermalConst {
    pub k1: Option<f64>,
    pub k2: Option<f64>,
}

impl ThermalConst {
    const K1: FieldSpec = FieldSpec::required("k1", FieldKind::Real);
    const K2: FieldSpec = FieldSpec::required("k2", FieldKind::Real);
}

impl Schema for ThermalConst {
    const NAME: &'static str = "thermal_const";
    const FIELDS: &'static [FieldSpec] = &[Self::K1, Self::K2];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            k1: r.real(&Self::K1)?,
            k2: r.real(&Self::K2)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "k1" => self.k1.is_some(),
            "k2" => self.k2.is_some(),
            _ => false,
        }
    }
}

/// Ground sample distance of a band.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelSize {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub units: Option<String>,
}

impl PixelSize {
    const X: FieldSpec = FieldSpec::required("x", FieldKind::Real);
    const Y: FieldSpec = FieldSpec::required("y", FieldKind::Real);
    const UNITS: FieldSpec = FieldSpec::required("units", FieldKind::Text);

    /// The (x, y) sizes when both are set.
    pub fn xy(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

impl Schema for PixelSize {
    const NAME: &'static str = "pixel_size";
    const FIELDS: &'static [FieldSpec] = &[Self::X, Self::Y, Self::UNITS];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            x: r.real(&Self::X)?,
            y: r.real(&Self::Y)?,
            units: r.text(&Self::UNITS)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "x" => self.x.is_some(),
            "y" => self.y.is_some(),
            "units" => self.units.is_some(),
            _ => false,
        }
    }
}

/// Inclusive bounds of physically meaningful pixel values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValidRange {
    const MIN: FieldSpec = FieldSpec::required("min", FieldKind::Real);
    const MAX: FieldSpec = FieldSpec::required("max", FieldKind::Real);
}

impl Schema for ValidRange {
    const NAME: &'static str = "valid_range";
    const FIELDS: &'static [FieldSpec] = &[Self::MIN, Self::MAX];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            min: r.real(&Self::MIN)?,
            max: r.real(&Self::MAX)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "min" => self.min.is_some(),
            "max" => self.max.is_some(),
            _ => false,
        }
    }
}

/// Worldwide Reference System designator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wrs {
    pub system: Option<i64>,
    pub path: Option<i64>,
    pub row: Option<i64>,
}

impl Wrs {
    const SYSTEM: FieldSpec = FieldSpec::required("system", FieldKind::Integer);
    const PATH: FieldSpec = FieldSpec::required("path", FieldKind::Integer);
    const ROW: FieldSpec = FieldSpec::required("row", FieldKind::Integer);
}

impl Schema for Wrs {
    const NAME: &'static str = "wrs";
    const FIELDS: &'static [FieldSpec] = &[Self::SYSTEM, Self::PATH, Self::ROW];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            system: r.integer(&Self::SYSTEM)?,
            path: r.integer(&Self::PATH)?,
            row: r.integer(&Self::ROW)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "system" => self.system.is_some(),
            "path" => self.path.is_some(),
            "row" => self.row.is_some(),
            _ => false,
        }
    }
}

/// One scene corner in geographic coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corner {
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Corner {
    const LOCATION: FieldSpec = FieldSpec::required("location", FieldKind::Text);
    const LATITUDE: FieldSpec =
        FieldSpec::required("latitude", FieldKind::Real).in_range(-90.0, 90.0);
    const LONGITUDE: FieldSpec =
        FieldSpec::required("longitude", FieldKind::Real).in_range(-180.0, 180.0);
}

impl Schema for Corner {
    const NAME: &'static str = "corner";
    const FIELDS: &'static [FieldSpec] = &[Self::LOCATION, Self::LATITUDE, Self::LONGITUDE];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            location: r.text(&Self::LOCATION)?,
            latitude: r.real(&Self::LATITUDE)?,
            longitude: r.real(&Self::LONGITUDE)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "location" => self.location.is_some(),
            "latitude" => self.latitude.is_some(),
            "longitude" => self.longitude.is_some(),
            _ => false,
        }
    }
}

/// One scene corner in projected coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CornerPoint {
    pub location: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl CornerPoint {
    const LOCATION: FieldSpec = FieldSpec::required("location", FieldKind::Text);
    const X: FieldSpec = FieldSpec::required("x", FieldKind::Real);
    const Y: FieldSpec = FieldSpec::required("y", FieldKind::Real);
}

impl Schema for CornerPoint {
    const NAME: &'static str = "corner_point";
    const FIELDS: &'static [FieldSpec] = &[Self::LOCATION, Self::X, Self::Y];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            location: r.text(&Self::LOCATION)?,
            x: r.real(&Self::X)?,
            y: r.real(&Self::Y)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "location" => self.location.is_some(),
            "x" => self.x.is_some(),
            "y" => self.y.is_some(),
            _ => false,
        }
    }
}

/// Geographic bounding box of the scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingCoordinates {
    pub west: Option<f64>,
    pub east: Option<f64>,
    pub north: Option<f64>,
    pub south: Option<f64>,
}

impl BoundingCoordinates {
    const WEST: FieldSpec = FieldSpec::required("west", FieldKind::Real);
    const EAST: FieldSpec = FieldSpec::required("east", FieldKind::Real);
    const NORTH: FieldSpec = FieldSpec::required("north", FieldKind::Real);
    const SOUTH: FieldSpec = FieldSpec::required("south", FieldKind::Real);
}

impl Schema for BoundingCoordinates {
    const NAME: &'static str = "bounding_coordinates";
    const FIELDS: &'static [FieldSpec] = &[Self::WEST, Self::EAST, Self::NORTH, Self::SOUTH];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            west: r.real(&Self::WEST)?,
            east: r.real(&Self::EAST)?,
            north: r.real(&Self::NORTH)?,
            south: r.real(&Self::SOUTH)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "west" => self.west.is_some(),
            "east" => self.east.is_some(),
            "north" => self.north.is_some(),
            "south" => self.south.is_some(),
            _ => false,
        }
    }
}

/// Map projection description, with per-datum parameter maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub projection: Option<String>,
    pub datum: Option<String>,
    pub units: Option<String>,
    /// Projected corner points, in document order.
    pub corner_point: Option<Vec<CornerPoint>>,
    pub grid_origin: Option<String>,
    pub utm_proj_params: Option<BTreeMap<String, String>>,
    pub ps_proj_params: Option<BTreeMap<String, String>>,
    pub albers_proj_params: Option<BTreeMap<String, String>>,
    pub sin_proj_params: Option<BTreeMap<String, String>>,
}

impl Projection {
    const PROJECTION: FieldSpec = FieldSpec::required("projection", FieldKind::Text);
    const DATUM: FieldSpec = FieldSpec::required("datum", FieldKind::Text);
    const UNITS: FieldSpec = FieldSpec::required("units", FieldKind::Text);
    const CORNER_POINT: FieldSpec = FieldSpec::required("corner_point", FieldKind::EntityList);
    const GRID_ORIGIN: FieldSpec = FieldSpec::required("grid_origin", FieldKind::Text);
    const UTM_PROJ_PARAMS: FieldSpec = FieldSpec::optional("utm_proj_params", FieldKind::TextMap);
    const PS_PROJ_PARAMS: FieldSpec = FieldSpec::optional("ps_proj_params", FieldKind::TextMap);
    const ALBERS_PROJ_PARAMS: FieldSpec =
        FieldSpec::optional("albers_proj_params", FieldKind::TextMap);
    const SIN_PROJ_PARAMS: FieldSpec = FieldSpec::optional("sin_proj_params", FieldKind::TextMap);
}

impl Schema for Projection {
    const NAME: &'static str = "projection_information";
    const FIELDS: &'static [FieldSpec] = &[
        Self::PROJECTION,
        Self::DATUM,
        Self::UNITS,
        Self::CORNER_POINT,
        Self::GRID_ORIGIN,
        Self::UTM_PROJ_PARAMS,
        Self::PS_PROJ_PARAMS,
        Self::ALBERS_PROJ_PARAMS,
        Self::SIN_PROJ_PARAMS,
    ];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            projection: r.text(&Self::PROJECTION)?,
            datum: r.text(&Self::DATUM)?,
            units: r.text(&Self::UNITS)?,
            corner_point: r.entity_list(&Self::CORNER_POINT)?,
            grid_origin: r.text(&Self::GRID_ORIGIN)?,
            utm_proj_params: r.text_map(&Self::UTM_PROJ_PARAMS)?,
            ps_proj_params: r.text_map(&Self::PS_PROJ_PARAMS)?,
            albers_proj_params: r.text_map(&Self::ALBERS_PROJ_PARAMS)?,
            sin_proj_params: r.text_map(&Self::SIN_PROJ_PARAMS)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "projection" => self.projection.is_some(),
            "datum" => self.datum.is_some(),
            "units" => self.units.is_some(),
            "corner_point" => self.corner_point.is_some(),
            "grid_origin" => self.grid_origin.is_some(),
            "utm_proj_params" => self.utm_proj_params.is_some(),
            "ps_proj_params" => self.ps_proj_params.is_some(),
            "albers_proj_params" => self.albers_proj_params.is_some(),
            "sin_proj_params" => self.sin_proj_params.is_some(),
            _ => false,
        }
    }

    fn validate(&self) -> Result<()> {
        check_required(self)?;
        if let Some(points) = &self.corner_point {
            for point in points {
                point.validate()?;
            }
        }
        Ok(())
    }
}

/// Solar geometry at scene center.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolarAngle {
    pub zenith: Option<f64>,
    pub azimuth: Option<f64>,
    pub units: Option<String>,
}

impl SolarAngle {
    const ZENITH: FieldSpec = FieldSpec::required("zenith", FieldKind::Real);
    const AZIMUTH: FieldSpec = FieldSpec::required("azimuth", FieldKind::Real);
    const UNITS: FieldSpec = FieldSpec::required("units", FieldKind::Text);
}

impl Schema for SolarAngle {
    const NAME: &'static str = "solar_angles";
    const FIELDS: &'static [FieldSpec] = &[Self::ZENITH, Self::AZIMUTH, Self::UNITS];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            zenith: r.real(&Self::ZENITH)?,
            azimuth: r.real(&Self::AZIMUTH)?,
            units: r.text(&Self::UNITS)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "zenith" => self.zenith.is_some(),
            "azimuth" => self.azimuth.is_some(),
            "units" => self.units.is_some(),
            _ => false,
        }
    }
}

/// Scene-wide metadata shared by every band of a raster set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterMetaData {
    pub data_provider: Option<String>,
    pub satellite: Option<String>,
    pub instrument: Option<String>,
    pub acquisition_date: Option<String>,
    pub scene_center_time: Option<String>,
    pub level1_production_date: Option<String>,
    pub solar_angles: Option<SolarAngle>,
    pub earth_sun_distance: Option<f64>,
    pub product_id: Option<String>,
    pub lpgs_metadata_file: Option<String>,
    pub wrs: Option<Wrs>,
    /// Scene corners, in document order.
    pub corner: Option<Vec<Corner>>,
    pub bounding_coordinates: Option<BoundingCoordinates>,
    pub projection_information: Option<Projection>,
    pub orientation_angle: Option<f64>,
}

impl RasterMetaData {
    const DATA_PROVIDER: FieldSpec = FieldSpec::required("data_provider", FieldKind::Text);
    const SATELLITE: FieldSpec = FieldSpec::required("satellite", FieldKind::Text);
    const INSTRUMENT: FieldSpec = FieldSpec::required("instrument", FieldKind::Text);
    const ACQUISITION_DATE: FieldSpec = FieldSpec::optional("acquisition_date", FieldKind::Text);
    const SCENE_CENTER_TIME: FieldSpec = FieldSpec::optional("scene_center_time", FieldKind::Text);
    const LEVEL1_PRODUCTION_DATE: FieldSpec =
        FieldSpec::optional("level1_production_date", FieldKind::Text);
    const SOLAR_ANGLES: FieldSpec = FieldSpec::optional("solar_angles", FieldKind::Entity);
    const EARTH_SUN_DISTANCE: FieldSpec =
        FieldSpec::optional("earth_sun_distance", FieldKind::Real);
    const PRODUCT_ID: FieldSpec = FieldSpec::optional("product_id", FieldKind::Text);
    const LPGS_METADATA_FILE: FieldSpec =
        FieldSpec::optional("lpgs_metadata_file", FieldKind::Text);
    const WRS: FieldSpec = FieldSpec::optional("wrs", FieldKind::Entity);
    const CORNER: FieldSpec = FieldSpec::required("corner", FieldKind::EntityList);
    const BOUNDING_COORDINATES: FieldSpec =
        FieldSpec::required("bounding_coordinates", FieldKind::Entity);
    const PROJECTION_INFORMATION: FieldSpec =
        FieldSpec::required("projection_information", FieldKind::Entity);
    const ORIENTATION_ANGLE: FieldSpec =
        FieldSpec::required("orientation_angle", FieldKind::Real).in_range(-360.0, 360.0);
}

impl Schema for RasterMetaData {
    const NAME: &'static str = "global_metadata";
    const FIELDS: &'static [FieldSpec] = &[
        Self::DATA_PROVIDER,
        Self::SATELLITE,
        Self::INSTRUMENT,
        Self::ACQUISITION_DATE,
        Self::SCENE_CENTER_TIME,
        Self::LEVEL1_PRODUCTION_DATE,
        Self::SOLAR_ANGLES,
        Self::EARTH_SUN_DISTANCE,
        Self::PRODUCT_ID,
        Self::LPGS_METADATA_FILE,
        Self::WRS,
        Self::CORNER,
        Self::BOUNDING_COORDINATES,
        Self::PROJECTION_INFORMATION,
        Self::ORIENTATION_ANGLE,
    ];

    fn decode_fields(r: &FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            data_provider: r.text(&Self::DATA_PROVIDER)?,
            satellite: r.text(&Self::SATELLITE)?,
            instrument: r.text(&Self::INSTRUMENT)?,
            acquisition_date: r.text(&Self::ACQUISITION_DATE)?,
            scene_center_time: r.text(&Self::SCENE_CENTER_TIME)?,
            level1_production_date: r.text(&Self::LEVEL1_PRODUCTION_DATE)?,
            solar_angles: r.entity(&Self::SOLAR_ANGLES)?,
            earth_sun_distance: r.real(&Self::EARTH_SUN_DISTANCE)?,
            product_id: r.text(&Self::PRODUCT_ID)?,
            lpgs_metadata_file: r.text(&Self::LPGS_METADATA_FILE)?,
            wrs: r.entity(&Self::WRS)?,
            corner: r.entity_list(&Self::CORNER)?,
            bounding_coordinates: r.entity(&Self::BOUNDING_COORDINATES)?,
            projection_information: r.entity(&Self::PROJECTION_INFORMATION)?,
            orientation_angle: r.real(&Self::ORIENTATION_ANGLE)?,
        })
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "data_provider" => self.data_provider.is_some(),
            "satellite" => self.satellite.is_some(),
            "instrument" => self.instrument.is_some(),
            "acquisition_date" => self.acquisition_date.is_some(),
            "scene_center_time" => self.scene_center_time.is_some(),
            "level1_production_date" => self.level1_production_date.is_some(),
            "solar_angles" => self.solar_angles.is_some(),
            "earth_sun_distance" => self.earth_sun_distance.is_some(),
            "product_id" => self.product_id.is_some(),
            "lpgs_metadata_file" => self.lpgs_metadata_file.is_some(),
            "wrs" => self.wrs.is_some(),
            "corner" => self.corner.is_some(),
            "bounding_coordinates" => self.bounding_coordinates.is_some(),
            "projection_information" => self.projection_information.is_some(),
            "orientation_angle" => self.orientation_angle.is_some(),
            _ => false,
        }
    }

    fn validate(&self) -> Result<()> {
        check_required(self)?;
        if let Some(corners) = &self.corner {
            for corner in corners {
                corner.validate()?;
            }
        }
        if let Some(angles) = &self.solar_angles {
            angles.validate()?;
        }
        if let Some(wrs) = &self.wrs {
            wrs.validate()?;
        }
        if let Some(bounds) = &self.bounding_coordinates {
            bounds.validate()?;
        }
        if let Some(projection) = &self.projection_information {
            projection.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use crate::document::parse_str;

    const GLOBAL_XML: &str = r#"<global_metadata>
        <data_provider>USGS/EROS</data_provider>
        <satellite>LANDSAT_8</satellite>
        <instrument>OLI_TIRS</instrument>
        <acquisition_date>2017-06-21</acquisition_date>
        <solar_angles zenith="25.3" azimuth="127.9" units="degrees"/>
        <wrs system="2" path="33" row="32"/>
        <corner location="UL" latitude="40.2" longitude="-106.1"/>
        <corner location="LR" latitude="38.1" longitude="-103.5"/>
        <bounding_coordinates>
            <west>-106.1</west>
            <east>-103.5</east>
            <north>40.2</north>
            <south>38.1</south>
        </bounding_coordinates>
        <projection_information projection="UTM" datum="WGS84" units="meters">
            <corner_point location="UL" x="399300.0" y="4450500.0"/>
            <corner_point location="LR" x="625200.0" y="4222200.0"/>
            <grid_origin>CENTER</grid_origin>
            <utm_proj_params>
                <zone_code>13</zone_code>
            </utm_proj_params>
        </projection_information>
        <orientation_angle>0.0</orientation_angle>
    </global_metadata>"#;

    #[test]
    fn test_decode_global_metadata() {
        let (_, node) = parse_str(GLOBAL_XML).unwrap();
        let meta: RasterMetaData = Decoder::new().decode(&node).unwrap();

        assert_eq!(meta.satellite.as_deref(), Some("LANDSAT_8"));
        assert_eq!(meta.instrument.as_deref(), Some("OLI_TIRS"));
        assert_eq!(meta.wrs.as_ref().unwrap().path, Some(33));
        assert_eq!(meta.orientation_angle, Some(0.0));

        let corners = meta.corner.as_ref().unwrap();
        assert_eq!(corners.len(), 2);
        assert_eq!(corners[0].location.as_deref(), Some("UL"));
        assert_eq!(corners[1].latitude, Some(38.1));

        let projection = meta.projection_information.as_ref().unwrap();
        assert_eq!(projection.projection.as_deref(), Some("UTM"));
        assert_eq!(projection.grid_origin.as_deref(), Some("CENTER"));
        assert_eq!(
            projection.utm_proj_params.as_ref().unwrap().get("zone_code"),
            Some(&"13".to_string())
        );

        meta.validate().unwrap();
    }

    #[test]
    fn test_missing_required_fails_validation_not_decode() {
        let xml = r#"<global_metadata>
            <data_provider>USGS/EROS</data_provider>
        </global_metadata>"#;
        let (_, node) = parse_str(xml).unwrap();

        // Decode succeeds with most fields unset
        let meta: RasterMetaData = Decoder::new().decode(&node).unwrap();
        assert_eq!(meta.satellite, None);

        let err = meta.validate().unwrap_err();
        assert!(matches!(
            err,
            crate::error::EspaError::MissingField {
                entity: "global_metadata",
                field: "satellite",
            }
        ));
    }

    #[test]
    fn test_nested_validation_recurses() {
        let mut meta: RasterMetaData = {
            let (_, node) = parse_str(GLOBAL_XML).unwrap();
            Decoder::new().decode(&node).unwrap()
        };

        // Blank out a required field of a nested corner point
        meta.projection_information
            .as_mut()
            .unwrap()
            .corner_point
            .as_mut()
            .unwrap()[0]
            .x = None;

        let err = meta.validate().unwrap_err();
        assert!(matches!(
            err,
            crate::error::EspaError::MissingField {
                entity: "corner_point",
                field: "x",
            }
        ));
    }

    #[test]
    fn test_orientation_angle_range() {
        let xml = GLOBAL_XML.replace(
            "<orientation_angle>0.0</orientation_angle>",
            "<orientation_angle>400.0</orientation_angle>",
        );
        let (_, node) = parse_str(&xml).unwrap();
        assert!(Decoder::new().decode::<RasterMetaData>(&node).is_err());
    }

    #[test]
    fn test_pixel_size_xy() {
        let ps = PixelSize {
            x: Some(30.0),
            y: Some(30.0),
            units: Some("meters".into()),
        };
        assert_eq!(ps.xy(), Some((30.0, 30.0)));
        assert_eq!(PixelSize::default().xy(), None);
    }
}
