//! Reading an ESPA archive: one metadata document plus band rasters.
//!
//! The reader owns a per-name band cache scoped to its own lifetime, so
//! scanning the same document repeatedly with different name filters never
//! decodes a band's pixels more than once per representation. Running
//! several readers concurrently is safe because nothing is shared between
//! instances.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::band::{Band, BandData, MaskPolicy};
use crate::decode::Decoder;
use crate::document::{self, Node, NodeMap};
use crate::error::{EspaError, Result};
use crate::pixels;
use crate::raster::RasterSet;
use crate::schema::Schema;

/// Options for one read of an ESPA archive.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Skip pixel data entirely, leaving `Band::data` unset.
    pub metadata_only: bool,
    /// How invalid pixels are represented in loaded bands.
    pub policy: MaskPolicy,
    /// When set, only bands with these names are loaded.
    pub allowed: Option<HashSet<String>>,
}

impl ReadOptions {
    /// Default options: full load, mask representation, every band.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip pixel data, decoding metadata only.
    pub fn metadata_only(mut self, metadata_only: bool) -> Self {
        self.metadata_only = metadata_only;
        self
    }

    /// Choose the invalid-pixel representation.
    pub fn policy(mut self, policy: MaskPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Restrict the read to the named bands.
    pub fn allow<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Reads a series of raster files via their ESPA XML metadata file.
pub struct RasterSetReader {
    filename: PathBuf,
    yflip: bool,
    cache: HashMap<String, Band>,
    // Pixel decode count, observable for the cache guarantees.
    raster_reads: usize,
}

impl RasterSetReader {
    /// Create a reader for the given metadata file.
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            yflip: false,
            cache: HashMap::new(),
            raster_reads: 0,
        }
    }

    /// Flip every band vertically on load, for coordinate systems with an
    /// inverted y origin.
    pub fn with_yflip(mut self, yflip: bool) -> Self {
        self.yflip = yflip;
        self
    }

    /// The metadata file this reader points at.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Point the reader at another metadata file. The band cache is kept,
    /// matching the reader's lifetime scope.
    pub fn set_filename(&mut self, filename: impl Into<PathBuf>) {
        self.filename = filename.into();
    }

    /// Directory band file names are resolved against.
    fn source_dir(&self) -> &Path {
        match self.filename.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Read the metadata document and assemble the raster set.
    pub fn read(&mut self, options: &ReadOptions) -> Result<RasterSet> {
        info!("reading ESPA metadata {}", self.filename.display());
        let (root_name, mut root) = document::parse_file(&self.filename)?;
        if root_name != "espa_metadata" {
            return Err(EspaError::schema_mismatch(
                RasterSet::NAME,
                format!("unexpected root element `{root_name}`"),
            ));
        }

        // Bands are split off and handled separately from the top-level
        // decode.
        let band_nodes = {
            let map = root.as_map_mut().ok_or_else(|| {
                EspaError::schema_mismatch(RasterSet::NAME, "expected a map-like document root")
            })?;
            take_band_nodes(map)?
        };
        let mut raster: RasterSet = Decoder::new().decode(&root)?;

        if let Some(allowed) = &options.allowed {
            // Drop cached bands the allow-list excludes so the assembled
            // map equals the allow-list intersection.
            self.cache.retain(|name, _| allowed.contains(name));
        }

        for node in &band_nodes {
            // Metadata-only pre-decode to learn the name before any file
            // I/O happens.
            let probe = self.load_band(node, true, options.policy)?;
            let name = probe.name.clone().ok_or(EspaError::MissingField {
                entity: Band::NAME,
                field: "name",
            })?;

            if let Some(allowed) = &options.allowed {
                if !allowed.contains(&name) {
                    debug!("band `{name}` excluded by allow-list");
                    continue;
                }
            }

            // Reload only when there is no cached entity, the cached
            // entity has no data, or its representation differs from the
            // request.
            let reload = match self.cache.get(&name).map(|cached| &cached.data) {
                None | Some(None) => true,
                Some(Some(data)) => data.policy() != options.policy,
            };
            if reload {
                let band = self.load_band(node, options.metadata_only, options.policy)?;
                if let Some((nlines, nsamps)) = band.dims() {
                    info!("loaded band `{name}` ({nlines}x{nsamps})");
                }
                self.cache.insert(name, band);
            } else {
                debug!("band `{name}` cached; skipping reload");
            }
        }
        raster.bands = self.cache.clone();

        if !options.metadata_only {
            raster.validate()?;
        }
        Ok(raster)
    }

    /// Build one band from its raw metadata node, attaching pixel data
    /// unless `metadata_only` is set.
    fn load_band(&mut self, node: &Node, metadata_only: bool, policy: MaskPolicy) -> Result<Band> {
        let map = node.as_map().ok_or_else(|| {
            EspaError::schema_mismatch(Band::NAME, "expected a map-like band node")
        })?;

        let pixels = if metadata_only {
            None
        } else {
            let file_name = map.get("file_name").and_then(Node::as_text).ok_or(
                EspaError::MissingField {
                    entity: Band::NAME,
                    field: "file_name",
                },
            )?;
            let path = self.source_dir().join(file_name);
            let pixels = pixels::read_raster(&path)?;
            self.raster_reads += 1;
            Some(pixels)
        };

        let node = normalize_bitmap(node)?;
        let mut band: Band = Decoder::new().decode(&node)?;

        if let Some(pixels) = pixels {
            let mut data = BandData::from_pixels(
                pixels,
                policy,
                band.fill_value() as f64,
                band.valid_bounds(),
            );
            if self.yflip {
                data.flip_rows();
            }
            band.data = Some(data);
        }

        if !metadata_only {
            band.validate()?;
        }
        Ok(band)
    }
}

/// Split the `bands` subtree off the document root, returning one node
/// per band. A document with a single band collapses to a map instead of
/// a list and is accepted as-is.
fn take_band_nodes(map: &mut NodeMap) -> Result<Vec<Node>> {
    let bands = map.remove("bands").ok_or_else(|| {
        EspaError::schema_mismatch(RasterSet::NAME, "missing `bands` element")
    })?;
    let mut bands_map = match bands {
        Node::Map(m) => m,
        _ => {
            return Err(EspaError::schema_mismatch(
                RasterSet::NAME,
                "`bands` is not an element",
            ))
        }
    };
    match bands_map.remove("band") {
        Some(Node::List(nodes)) => Ok(nodes),
        Some(node @ Node::Map(_)) => Ok(vec![node]),
        Some(_) => Err(EspaError::schema_mismatch(
            Band::NAME,
            "`band` is not an element",
        )),
        None => Ok(Vec::new()),
    }
}

/// Normalize the irregular `bitmap_description` substructure from a list
/// of `{num, text}` pairs into a flat map, ahead of the generic decode.
///
/// Accepts a single pair (one-element XML collapses to a map) and leaves
/// an already-flat map untouched.
fn normalize_bitmap(node: &Node) -> Result<Node> {
    let Some(map) = node.as_map() else {
        return Ok(node.clone());
    };
    let Some(description) = map.get("bitmap_description").and_then(Node::as_map) else {
        return Ok(node.clone());
    };
    let Some(bits) = description.get("bit") else {
        return Ok(node.clone());
    };

    let entries: Vec<&Node> = match bits {
        Node::List(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut flat = NodeMap::new();
    for bit in entries {
        let pair = bit
            .as_map()
            .and_then(|m| Some((m.get("num")?.as_text()?, m.get("text")?.as_text()?)));
        match pair {
            Some((num, text)) => flat.push_child(num.to_string(), Node::Text(text.to_string())),
            None => {
                return Err(EspaError::schema_mismatch(
                    Band::NAME,
                    "bitmap_description bit entry must carry `num` and `text`",
                ))
            }
        }
    }

    let mut out = map.clone();
    out.set("bitmap_description", Node::Map(flat));
    Ok(Node::Map(out))
}
