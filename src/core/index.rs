//! Burst and tile indexing: select catalog footprints covering an AOI and
//! resolve the product archives available for each of them.

use crate::core::aoi::AreaOfInterest;
use crate::io::archive::{ProductArchive, ProductMetadata};
use crate::io::vector::{first_vertex, srs_from_epsg, FieldDef, VectorFeature, VectorLayer};
use crate::types::{
    AttrValue, CalibrationType, Component, OrbitDirection, PackError, PackResult,
    EPSG_LAEA_EUROPE, EPSG_WGS84, NONE_VALUE,
};
use gdal::vector::{Geometry, OGRFieldType, OGRwkbGeometryType};
use regex::Regex;
use std::path::{Path, PathBuf};

pub const FIELD_NAME: &str = "Name";
pub const FIELD_TRACK: &str = "Track";
pub const FIELD_BURST: &str = "Burst";
pub const FIELD_SUBSWATH: &str = "Subswath";
pub const FIELD_ORBIT_DIR: &str = "Orbit_Dir";
pub const FIELD_C_TYPE: &str = "c_type";
pub const FIELD_PATH: &str = "Path";
pub const FIELD_START_DATE: &str = "start_date";
pub const FIELD_END_DATE: &str = "end_date";
pub const FIELD_ORTHO: &str = "Ortho";

/// Catalog column dropped from index outputs
const FIELD_OVERLAP: &str = "overlap";

const BURST_INDEX_DIR: &str = "AOIs_bursts";
const TILE_INDEX_DIR: &str = "AOIs_tiles";

/// Inputs of the burst indexing step
#[derive(Debug, Clone)]
pub struct BurstIndexConfig {
    /// Burst footprint catalog (any OGR vector format)
    pub catalog: PathBuf,
    /// Area of interest vector file
    pub aoi: PathBuf,
    /// Directory holding the burst product archives
    pub burst_dir: PathBuf,
    /// Output directory, `<burst_dir>/../AOIs_bursts` when unset
    pub out_dir: Option<PathBuf>,
}

impl BurstIndexConfig {
    pub fn output_path(&self) -> PackResult<PathBuf> {
        output_path(&self.aoi, &self.burst_dir, self.out_dir.as_deref(), BURST_INDEX_DIR)
    }
}

/// Inputs of the tile indexing step
#[derive(Debug, Clone)]
pub struct TileIndexConfig {
    /// Tile grid catalog
    pub catalog: PathBuf,
    /// Area of interest vector file
    pub aoi: PathBuf,
    /// Directory holding the tile product archives
    pub tile_dir: PathBuf,
    /// Output directory, `<tile_dir>/../AOIs_tiles` when unset
    pub out_dir: Option<PathBuf>,
}

impl TileIndexConfig {
    pub fn output_path(&self) -> PackResult<PathBuf> {
        output_path(&self.aoi, &self.tile_dir, self.out_dir.as_deref(), TILE_INDEX_DIR)
    }
}

/// Outcome of an indexing run
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    /// Written index shapefile
    pub output: PathBuf,
    /// Catalog entries intersecting the AOI
    pub matched: usize,
    /// Records written to the index
    pub records: usize,
}

/// `<dir>/<AOI stem>.shp`, whatever the format of the AOI file
fn output_path(
    aoi: &Path,
    data_dir: &Path,
    out_dir: Option<&Path>,
    default_dir: &str,
) -> PackResult<PathBuf> {
    let stem = aoi.file_stem()
        .ok_or_else(|| PackError::Config(format!("invalid AOI path {}", aoi.display())))?;
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let data_dir = std::fs::canonicalize(data_dir)?;
            data_dir.parent().unwrap_or(&data_dir).join(default_dir)
        }
    };
    let mut name = stem.to_os_string();
    name.push(".shp");
    let output = dir.join(name);
    if same_file(&output, aoi) {
        return Err(PackError::Config(format!(
            "index output {} would replace the AOI file",
            output.display()
        )));
    }
    Ok(output)
}

/// Whether `output` names the existing file `existing`, through any spelling of its directory
fn same_file(output: &Path, existing: &Path) -> bool {
    let resolved = output.parent()
        .and_then(|dir| std::fs::canonicalize(dir).ok())
        .zip(output.file_name())
        .map(|(dir, name)| dir.join(name));
    match (resolved, std::fs::canonicalize(existing)) {
        (Some(output), Ok(existing)) => output == existing,
        _ => output == existing,
    }
}

/// Orbit direction from an archive name: `<track>A<burst><subswath>` is ascending
pub fn orbit_direction(
    file_name: &str,
    track: &str,
    burst: &str,
    subswath: &str,
) -> OrbitDirection {
    if file_name.contains(&format!("{}A{}{}", track, burst, subswath)) {
        OrbitDirection::Ascending
    } else if file_name.contains(&format!("{}D{}{}", track, burst, subswath)) {
        OrbitDirection::Descending
    } else {
        OrbitDirection::Unknown
    }
}

/// Calibration type from the fifth `_`-separated token of an archive name
pub fn calibration_type(file_name: &str) -> CalibrationType {
    match file_name.split('_').nth(4) {
        Some(token) if token.ends_with('B') => CalibrationType::Basic,
        Some(token) if token.ends_with('C') => CalibrationType::Calibrated,
        _ => CalibrationType::Unspecified,
    }
}

/// Sorted names of the `.zip` files in `dir`
pub fn list_archives<P: AsRef<Path>>(dir: P) -> PackResult<Vec<String>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(PackError::Config(format!("Data directory {} not found", dir.display())));
    }

    let mut archives = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".zip") && entry.path().is_file() {
            archives.push(name);
        }
    }
    archives.sort();
    Ok(archives)
}

/// Archives matching `<track>.*<burst><subswath>`
pub fn find_burst_archives<'a>(
    archives: &'a [String],
    track: &str,
    burst: &str,
    subswath: &str,
) -> PackResult<Vec<&'a String>> {
    let pattern = Regex::new(&format!(
        "{}.*{}{}",
        regex::escape(track),
        regex::escape(burst),
        regex::escape(subswath)
    ))
    .map_err(|e| PackError::Config(format!("invalid burst pattern: {}", e)))?;

    Ok(archives.iter().filter(|name| pattern.is_match(name)).collect())
}

/// Grid code of the 100 km tile whose first vertex is (x, y) in EPSG:3035
///
/// Coordinates are rounded to the metre first, grid vertices sit on whole metres.
pub fn tile_code(x: f64, y: f64) -> String {
    let (x, y) = (x.round(), y.round());
    format!("E{}N{}", (x / 1e5).floor() as i64, (y / 1e5).ceil() as i64)
}

/// Start and end date of the product stored in `archive`
fn archive_dates(archive: &Path) -> PackResult<(Option<String>, Option<String>)> {
    let metadata: ProductMetadata = ProductArchive::new(archive)?.primary_metadata()?;
    Ok((metadata.start_date, metadata.end_date))
}

/// Catalog entries intersecting the AOI, with footprints in `epsg`
///
/// Intersections are tested in EPSG:4326; the returned footprints are
/// reprojected from the catalog's own reference system.
fn select_intersecting(
    catalog: &VectorLayer,
    aoi: &AreaOfInterest,
    epsg: u32,
) -> PackResult<Vec<VectorFeature>> {
    if catalog.is_empty() {
        return Err(PackError::EmptyCatalog(format!("catalog '{}' has no features", catalog.name)));
    }
    if catalog.srs.is_none() {
        return Err(PackError::Crs(format!(
            "catalog '{}' has no coordinate reference system",
            catalog.name
        )));
    }

    let wgs84 = catalog.reproject(EPSG_WGS84)?;
    let selected: Vec<usize> = wgs84.features.iter()
        .enumerate()
        .filter(|(_, f)| aoi.intersects(&f.geometry))
        .map(|(i, _)| i)
        .collect();
    log::info!(
        "{} of {} catalog entries intersect {}",
        selected.len(),
        catalog.len(),
        aoi.source().display()
    );

    let projected = if epsg == EPSG_WGS84 { wgs84 } else { catalog.reproject(epsg)? };
    Ok(selected.into_iter().map(|i| projected.features[i].clone()).collect())
}

/// One row of the burst index
#[derive(Debug, Clone)]
pub struct BurstRecord {
    pub name: AttrValue,
    pub track: AttrValue,
    pub burst: AttrValue,
    pub subswath: AttrValue,
    /// `None` when no archive was found for the burst
    pub orbit_dir: Option<OrbitDirection>,
    pub c_type: CalibrationType,
    pub path: Option<PathBuf>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Footprint in EPSG:4326
    pub geometry: Geometry,
}

impl BurstRecord {
    /// Columns copied from the burst catalog, with their catalog types
    pub const CATALOG_FIELDS: [&'static str; 4] =
        [FIELD_NAME, FIELD_TRACK, FIELD_BURST, FIELD_SUBSWATH];
    /// Text columns added by the index
    pub const INDEX_FIELDS: [&'static str; 5] = [
        FIELD_ORBIT_DIR, FIELD_C_TYPE, FIELD_PATH, FIELD_START_DATE, FIELD_END_DATE,
    ];

    /// Index schema for records selected from `catalog`
    pub fn fields(catalog: &VectorLayer) -> Vec<FieldDef> {
        let copied = Self::CATALOG_FIELDS.iter()
            .map(|name| catalog.field(name).cloned().unwrap_or_else(|| FieldDef::inferred(name)));
        copied.chain(text_fields(&Self::INDEX_FIELDS)).collect()
    }

    fn to_feature(&self) -> VectorFeature {
        VectorFeature::new(self.geometry.clone())
            .with_attribute(FIELD_NAME, self.name.clone())
            .with_attribute(FIELD_TRACK, self.track.clone())
            .with_attribute(FIELD_BURST, self.burst.clone())
            .with_attribute(FIELD_SUBSWATH, self.subswath.clone())
            .with_attribute(FIELD_ORBIT_DIR, optional_text(self.orbit_dir.map(|d| d.to_string())))
            .with_attribute(FIELD_C_TYPE, self.c_type.to_string())
            .with_attribute(FIELD_PATH, optional_path(self.path.as_deref()))
            .with_attribute(FIELD_START_DATE, optional_text(self.start_date.clone()))
            .with_attribute(FIELD_END_DATE, optional_text(self.end_date.clone()))
    }
}

/// One row of the tile index
#[derive(Debug, Clone)]
pub struct TileRecord {
    /// Catalog attributes of the tile
    pub attributes: Vec<(String, AttrValue)>,
    pub component: Component,
    pub path: Option<PathBuf>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Footprint in EPSG:3035
    pub geometry: Geometry,
}

impl TileRecord {
    fn to_feature(&self) -> VectorFeature {
        let mut feature = VectorFeature::new(self.geometry.clone());
        feature.attributes = self.attributes.clone();
        feature
            .with_attribute(FIELD_PATH, optional_path(self.path.as_deref()))
            .with_attribute(FIELD_ORTHO, self.component.to_string())
            .with_attribute(FIELD_START_DATE, optional_text(self.start_date.clone()))
            .with_attribute(FIELD_END_DATE, optional_text(self.end_date.clone()))
    }
}

fn optional_text(value: Option<String>) -> AttrValue {
    AttrValue::Text(value.unwrap_or_else(|| NONE_VALUE.to_string()))
}

fn optional_path(path: Option<&Path>) -> AttrValue {
    optional_text(path.map(|p| p.display().to_string()))
}

fn text_fields<'a>(names: &'a [&'a str]) -> impl Iterator<Item = FieldDef> + 'a {
    names.iter().map(|name| FieldDef::typed(name, OGRFieldType::OFTString))
}

/// Index records for the selected bursts; one per matching archive, or a placeholder
pub fn burst_records(
    selected: &[VectorFeature],
    burst_dir: &Path,
    archives: &[String],
    source: &str,
) -> PackResult<Vec<BurstRecord>> {
    let mut records = Vec::new();

    for feature in selected {
        let name = feature.require(FIELD_NAME, source)?.clone();
        let track = feature.require(FIELD_TRACK, source)?.clone();
        let burst = feature.require(FIELD_BURST, source)?.clone();
        let subswath = feature.require(FIELD_SUBSWATH, source)?.clone();
        let (track_str, burst_str, subswath_str) =
            (track.to_string(), burst.to_string(), subswath.to_string());

        let found = find_burst_archives(archives, &track_str, &burst_str, &subswath_str)?;
        if found.is_empty() {
            log::debug!("No archive found for burst {} {}{}", track_str, burst_str, subswath_str);
            records.push(BurstRecord {
                name,
                track,
                burst,
                subswath,
                orbit_dir: None,
                c_type: CalibrationType::Unspecified,
                path: None,
                start_date: None,
                end_date: None,
                geometry: feature.geometry.clone(),
            });
            continue;
        }

        for archive in found {
            let path = burst_dir.join(archive);
            log::debug!("Burst {} {}{} -> {}", track_str, burst_str, subswath_str, archive);
            let (start_date, end_date) = archive_dates(&path)?;
            let missing = |field: &str| PackError::Metadata(format!(
                "{} missing from metadata of {}", field, path.display()
            ));
            let start_date = start_date.ok_or_else(|| missing(FIELD_START_DATE))?;
            let end_date = end_date.ok_or_else(|| missing(FIELD_END_DATE))?;

            records.push(BurstRecord {
                name: name.clone(),
                track: track.clone(),
                burst: burst.clone(),
                subswath: subswath.clone(),
                orbit_dir: Some(orbit_direction(archive, &track_str, &burst_str, &subswath_str)),
                c_type: calibration_type(archive),
                path: Some(path.clone()),
                start_date: Some(start_date),
                end_date: Some(end_date),
                geometry: feature.geometry.clone(),
            });
        }
    }

    Ok(records)
}

/// Index records for the selected tiles: every `V` record, then every `E` record
///
/// `selected` footprints must be in EPSG:3035.
pub fn tile_records(
    selected: &[VectorFeature],
    tile_dir: &Path,
    archives: &[String],
) -> PackResult<Vec<TileRecord>> {
    let mut records = Vec::with_capacity(selected.len() * Component::ALL.len());

    for component in Component::ALL {
        for feature in selected {
            let (x, y) = first_vertex(&feature.geometry).ok_or_else(|| {
                PackError::InvalidFormat("tile footprint without vertices".to_string())
            })?;
            let code = format!("{}{}", tile_code(x, y), component);
            log::info!("Looking for tile {}", code);

            let attributes: Vec<(String, AttrValue)> = feature.attributes.iter()
                .filter(|(name, _)| name != FIELD_OVERLAP)
                .cloned()
                .collect();

            let record = match archives.iter().find(|name| name.contains(&code)) {
                Some(archive) => {
                    let path = tile_dir.join(archive);
                    let (start_date, end_date) = match archive_dates(&path)? {
                        (Some(start), Some(end)) => (start, end),
                        _ => dates_from_name(archive)?,
                    };
                    TileRecord {
                        attributes,
                        component,
                        path: Some(path),
                        start_date: Some(start_date),
                        end_date: Some(end_date),
                        geometry: feature.geometry.clone(),
                    }
                }
                None => TileRecord {
                    attributes,
                    component,
                    path: None,
                    start_date: None,
                    end_date: None,
                    geometry: feature.geometry.clone(),
                },
            };
            records.push(record);
        }
    }

    Ok(records)
}

/// Start and end date from tokens 2 and 3 of an archive name
pub fn dates_from_name(file_name: &str) -> PackResult<(String, String)> {
    let stem = file_name.strip_suffix(".zip").unwrap_or(file_name);
    let tokens: Vec<&str> = stem.split('_').collect();
    match (tokens.get(2), tokens.get(3)) {
        (Some(start), Some(end)) => Ok((start.to_string(), end.to_string())),
        _ => Err(PackError::Metadata(format!("no dates in metadata or name of {}", file_name))),
    }
}

/// Select the bursts covering the AOI and write the burst index shapefile
pub fn index_bursts(config: &BurstIndexConfig) -> PackResult<IndexSummary> {
    let aoi = AreaOfInterest::load(&config.aoi)?;
    let archives = list_archives(&config.burst_dir)?;
    let catalog = VectorLayer::read(&config.catalog)?;

    log::info!("Looking for bursts covering the selected area of interest");
    let selected = select_intersecting(&catalog, &aoi, EPSG_WGS84)?;
    if selected.is_empty() {
        log::warn!("No bursts found covering {}", config.aoi.display());
    }

    let source = config.catalog.display().to_string();
    let records = burst_records(&selected, &config.burst_dir, &archives, &source)?;

    let mut layer = VectorLayer::new(
        "bursts",
        Some(srs_from_epsg(EPSG_WGS84)?),
        BurstRecord::fields(&catalog),
    );
    layer.features = records.iter().map(BurstRecord::to_feature).collect();

    let output = config.output_path()?;
    layer.write_shapefile(&output, OGRwkbGeometryType::wkbPolygon)?;
    log::info!("Shapefile saved to {}", output.display());

    Ok(IndexSummary { output, matched: selected.len(), records: records.len() })
}

/// Select the tiles covering the AOI and write the tile index shapefile
pub fn index_tiles(config: &TileIndexConfig) -> PackResult<IndexSummary> {
    let aoi = AreaOfInterest::load(&config.aoi)?;
    let archives = list_archives(&config.tile_dir)?;
    let catalog = VectorLayer::read(&config.catalog)?;

    log::info!("Looking for tiles covering the selected area of interest");
    let selected = select_intersecting(&catalog, &aoi, EPSG_LAEA_EUROPE)?;
    if selected.is_empty() {
        log::warn!("No tiles found covering {}", config.aoi.display());
    }

    let records = tile_records(&selected, &config.tile_dir, &archives)?;

    let mut fields: Vec<FieldDef> = catalog.fields.iter()
        .filter(|f| f.name != FIELD_OVERLAP)
        .cloned()
        .collect();
    fields.extend(text_fields(&[FIELD_PATH, FIELD_ORTHO, FIELD_START_DATE, FIELD_END_DATE]));

    let mut layer = VectorLayer::new("tiles", Some(srs_from_epsg(EPSG_LAEA_EUROPE)?), fields);
    layer.features = records.iter().map(TileRecord::to_feature).collect();

    let output = config.output_path()?;
    layer.write_shapefile(&output, OGRwkbGeometryType::wkbPolygon)?;
    log::info!("Shapefile saved to {}", output.display());

    Ok(IndexSummary { output, matched: selected.len(), records: records.len() })
}
