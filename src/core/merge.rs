//! Merge the per-burst and per-tile point products listed in an index into
//! packaged deliverables: one point file plus a GSP metadata document per
//! group, zipped together.

use crate::core::aoi::{aoi_info_from_path, AoiInfo, AreaOfInterest};
use crate::core::gsp::{ancillary_input, gsp_description, gsp_metadata};
use crate::core::index::{
    dates_from_name, FIELD_C_TYPE, FIELD_ORBIT_DIR, FIELD_ORTHO, FIELD_PATH, FIELD_TRACK,
};
use crate::core::table::PointTable;
use crate::io::archive::{compact_date, ProductArchive, ProductMetadata};
use crate::io::package::{package_product, XmlElement};
use crate::io::points::{read_point_table, write_csv, write_point_shapefile, EASTING, NORTHING};
use crate::io::vector::{shapefile_parts, VectorFeature, VectorLayer};
use crate::types::{
    AttrValue, CalibrationType, Component, OutputFormat, PackError, PackResult, EPSG_LAEA_EUROPE,
    EPSG_WGS84, NONE_VALUE, SENSOR,
};
use gdal::vector::Geometry;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Source product identifiers of the single geometry deformation products
const GSP_BASIC: &str = "S301SNT01";
const GSP_CALIBRATED: &str = "S301SNT02";
/// Source product identifier of the 2D deformation tiles
const GSP_TILES: &str = "S301SNT03";

/// Inputs of a merge run
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Index shapefile; its file stem names the AOI
    pub index_file: PathBuf,
    /// Products are written to `<out_dir>/<AOI tag>/`
    pub out_dir: PathBuf,
    /// Optional AOI the merged points are clipped to
    pub clip_aoi: Option<PathBuf>,
    pub format: OutputFormat,
    /// Merge only this track (bursts only)
    pub track: Option<String>,
}

impl MergeConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(index_file: P, out_dir: Q) -> Self {
        Self {
            index_file: index_file.into(),
            out_dir: out_dir.into(),
            clip_aoi: None,
            format: OutputFormat::default(),
            track: None,
        }
    }
}

/// A packaged deliverable
#[derive(Debug, Clone, PartialEq)]
pub struct MergedProduct {
    pub name: String,
    pub archive: PathBuf,
    /// Points written after de-duplication and clipping
    pub records: usize,
    /// Source products merged
    pub sources: usize,
}

/// Index entry with a resolved product archive
#[derive(Debug, Clone)]
struct IndexEntry {
    path: PathBuf,
    track: String,
    orbit_dir: String,
    c_type: CalibrationType,
    component: Option<Component>,
}

impl IndexEntry {
    /// `None` for placeholder entries without an archive
    fn from_feature(feature: &VectorFeature, source: &str) -> PackResult<Option<Self>> {
        let path = match feature.require(FIELD_PATH, source)?.as_present_str() {
            Some(path) => PathBuf::from(path),
            None => return Ok(None),
        };
        let text = |name: &str| {
            feature.attribute(name)
                .and_then(AttrValue::as_present_str)
                .unwrap_or_else(|| NONE_VALUE.to_string())
        };

        let c_type = text(FIELD_C_TYPE).parse().unwrap_or(CalibrationType::Unspecified);
        let component = feature.attribute(FIELD_ORTHO)
            .and_then(AttrValue::as_present_str)
            .and_then(|o| o.parse().ok());

        Ok(Some(Self {
            path,
            track: text(FIELD_TRACK),
            orbit_dir: text(FIELD_ORBIT_DIR),
            c_type,
            component,
        }))
    }
}

/// Index entries with an archive, in index order
fn read_index(index_file: &Path) -> PackResult<Vec<IndexEntry>> {
    log::info!("Loading index file {}", index_file.display());
    let layer = VectorLayer::read(index_file)?;
    let source = index_file.display().to_string();

    let mut entries = Vec::with_capacity(layer.len());
    for feature in &layer.features {
        if let Some(entry) = IndexEntry::from_feature(feature, &source)? {
            entries.push(entry);
        }
    }
    log::debug!("{} of {} index entries reference an archive", entries.len(), layer.len());
    Ok(entries)
}

/// Output directory for an AOI, created when missing
fn product_dir(out_dir: &Path, aoi: &AoiInfo) -> PackResult<PathBuf> {
    let dir = out_dir.join(aoi.tag);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn clip_geometry(clip_aoi: Option<&Path>) -> PackResult<Option<Geometry>> {
    match clip_aoi {
        Some(path) => Ok(Some(AreaOfInterest::load(path)?.geometry_in(EPSG_LAEA_EUROPE)?)),
        None => Ok(None),
    }
}

/// Concatenate the point products of a group, drop duplicates and clip
fn merge_points(paths: &[&Path], keys: &[&str], clip: Option<&Geometry>) -> PackResult<PointTable> {
    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        tables.push(read_point_table(path)?.normalize_columns());
    }

    let mut merged = PointTable::concat(tables)?;
    let duplicates = merged.drop_duplicates(keys);
    if duplicates > 0 {
        log::debug!("Dropped {} duplicated points", duplicates);
    }

    if let Some(area) = clip {
        log::info!("Clipping the output to the AOI");
        let outside = merged.retain_within(area)?;
        log::debug!("Removed {} points outside the AOI", outside);
    }

    log::info!("Number of points merged: {}", merged.len());
    if let Some(pid) = merged.column_index("pid") {
        let unique: HashSet<String> = merged.records().iter()
            .map(|r| r.values[pid].to_string())
            .collect();
        log::info!("Number of unique pid: {}", unique.len());
    }
    Ok(merged)
}

/// Rename date columns of burst products to `D<yyyymmdd>`
pub fn rename_burst_date_columns(table: &mut PointTable) -> PackResult<()> {
    let pattern = Regex::new(r"^D?(\d+)$")
        .map_err(|e| PackError::Config(format!("invalid date pattern: {}", e)))?;
    table.rename_columns(|name| {
        pattern.captures(name).map(|caps| format!("D{}", &caps[1]))
    });
    Ok(())
}

/// Prefix all-digit columns of tile products with `D`
pub fn rename_tile_date_columns(table: &mut PointTable) {
    table.rename_columns(|name| {
        (!name.is_empty() && name.chars().all(|c| c.is_ascii_digit())).then(|| format!("D{}", name))
    });
}

pub fn burst_product_name(
    product_id: &str,
    start_date: &str,
    end_date: &str,
    track: &str,
    aoi_tag: &str,
    orbit_dir: &str,
    c_type: CalibrationType,
) -> String {
    format!(
        "ISS_{}_{}_{}_{}{}{}{}_01",
        product_id.replace('-', ""),
        compact_date(start_date),
        compact_date(end_date),
        track,
        aoi_tag,
        orbit_dir,
        c_type.name_code()
    )
}

pub fn tile_product_name(
    product_id: &str,
    start_date: &str,
    end_date: &str,
    aoi_tag: &str,
    component: Component,
) -> String {
    format!(
        "ISS_{}_{}_{}_{}O{}_01",
        product_id.replace('-', ""),
        compact_date(start_date),
        compact_date(end_date),
        aoi_tag,
        component
    )
}

fn archive_stem(path: &Path) -> PackResult<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| PackError::InvalidFormat(format!("invalid archive path {}", path.display())))
}

/// Source product identifier and source product name of a burst archive
///
/// Token 5 of the archive name ends with the calibration code: `B` products
/// come from `S301SNT01`, all others from `S301SNT02`. The source name has
/// token 2 set to that identifier and the calibration code removed.
pub fn burst_source_id(stem: &str) -> PackResult<(&'static str, String)> {
    let tokens: Vec<&str> = stem.split('_').collect();
    let (Some(product), Some(processing)) = (tokens.get(1), tokens.get(4)) else {
        return Err(PackError::InvalidFormat(format!("unexpected burst product name {}", stem)));
    };

    let gsp_id = if processing.ends_with('B') { GSP_BASIC } else { GSP_CALIBRATED };
    let mut product_id = stem.replace(product, gsp_id);
    if !processing.is_empty() {
        let mut trimmed = processing.to_string();
        trimmed.pop();
        product_id = product_id.replace(processing, &trimmed);
    }
    Ok((gsp_id, product_id))
}

/// Source product identifier and source product name of a tile archive
pub fn tile_source_id(stem: &str) -> PackResult<(&'static str, String)> {
    match stem.split('_').nth(1) {
        Some(product) if !product.is_empty() => Ok((GSP_TILES, stem.replace(product, GSP_TILES))),
        _ => Err(PackError::InvalidFormat(format!("unexpected tile product name {}", stem))),
    }
}

/// Top-level fields of a product metadata document
struct ProductHeader<'a> {
    gsp_id: &'a str,
    name: &'a str,
    track: Option<&'a str>,
    provider: &'a str,
    production_date: String,
    start_date: String,
    end_date: String,
    aoi_tag: &'a str,
    crs: &'a str,
}

/// GSP metadata document for a merged product
///
/// The bounding box and footprint are those of the merged points in EPSG:4326.
fn gsp_document(
    header: &ProductHeader,
    table: &PointTable,
    sources: Vec<XmlElement>,
) -> PackResult<XmlElement> {
    let bbox = table.to_epsg(EPSG_WGS84)?
        .bounds()
        .ok_or_else(|| PackError::InvalidFormat(format!("product {} has no points", header.name)))?;
    let footprint = serde_json::json!({
        "type": "Polygon",
        "coordinates": [bbox.envelope_ring()],
    });

    let mut root = XmlElement::new("GSP")
        .with_child(XmlElement::leaf("gsp_id", header.gsp_id))
        .with_child(XmlElement::leaf("product_id", header.name))
        .with_child(XmlElement::leaf("description", gsp_description(header.gsp_id)))
        .with_child(XmlElement::leaf("sensor_id", SENSOR));
    if let Some(track) = header.track {
        root.push(XmlElement::leaf("track_id", track));
    }
    root.push(XmlElement::leaf("provider", header.provider));
    root.push(XmlElement::leaf("production_date", &header.production_date));
    root.push(XmlElement::leaf("start_date", &header.start_date));
    root.push(XmlElement::leaf("end_date", &header.end_date));
    root.push(XmlElement::leaf("aoi", header.aoi_tag));
    root.push(XmlElement::leaf("bbox", bbox));
    root.push(XmlElement::leaf("geometry", footprint));
    root.push(XmlElement::leaf("crs", header.crs));

    let mut dataset = XmlElement::new("dataset");
    for name in gsp_metadata(header.gsp_id) {
        dataset.push(ancillary_input(name)?.to_xml());
    }
    for source in sources {
        dataset.push(source);
    }
    root.push(dataset);

    Ok(root)
}

/// `gsp` entry describing one source product
fn source_entry(gsp_id: &str, product_id: String, id_field: &str, id_value: &str) -> XmlElement {
    XmlElement::new("gsp")
        .with_child(XmlElement::leaf("gsp_id", gsp_id))
        .with_child(XmlElement::leaf("product_id", product_id))
        .with_child(XmlElement::leaf(id_field, id_value))
        .with_child(XmlElement::leaf("description", gsp_description(gsp_id)))
}

fn primary_metadata(path: &Path) -> PackResult<ProductMetadata> {
    ProductArchive::new(path)?.primary_metadata()
}

/// Write the data file of a product; returns every file to package
fn write_data(
    table: &PointTable,
    dir: &Path,
    name: &str,
    format: OutputFormat,
) -> PackResult<Vec<PathBuf>> {
    let out_file = dir.join(format!("{}.{}", name, format.extension()));
    log::info!("Saving merged file {}", out_file.display());
    match format {
        OutputFormat::Csv => {
            write_csv(table, &out_file)?;
            Ok(vec![out_file])
        }
        OutputFormat::Shapefile => {
            write_point_shapefile(table, &out_file)?;
            Ok(shapefile_parts(&out_file))
        }
    }
}

/// Merge the burst products of an index, per track and calibration type
pub fn merge_bursts(config: &MergeConfig) -> PackResult<Vec<MergedProduct>> {
    let entries = read_index(&config.index_file)?;
    let aoi = aoi_info_from_path(&config.index_file)?;
    let out_dir = product_dir(&config.out_dir, &aoi)?;
    let clip = clip_geometry(config.clip_aoi.as_deref())?;

    let mut tracks: Vec<&str> = Vec::new();
    for entry in &entries {
        if !tracks.contains(&entry.track.as_str()) {
            tracks.push(&entry.track);
        }
    }
    if let Some(track) = &config.track {
        tracks.retain(|t| t == track);
        if tracks.is_empty() {
            log::warn!("Track {} not found in {}", track, config.index_file.display());
        }
    }

    let mut products = Vec::new();
    for track in tracks {
        let track_entries: Vec<&IndexEntry> = entries.iter().filter(|e| e.track == track).collect();
        log::info!("Processing track {} with {} bursts", track, track_entries.len());

        for c_type in CalibrationType::MERGE_ORDER {
            let group: Vec<&IndexEntry> = track_entries.iter()
                .copied()
                .filter(|e| e.c_type == c_type)
                .collect();
            if group.is_empty() {
                log::warn!("No bursts found for track {} - Calib-Type {}", track, c_type);
                continue;
            }

            let merged = merge_burst_group(
                &group, track, c_type, &aoi, &out_dir, clip.as_ref(), config.format,
            )?;
            match merged {
                Some(product) => products.push(product),
                None => log::warn!(
                    "Track {} - Calib-Type {} has no points left, skipped",
                    track,
                    c_type
                ),
            }
        }
    }

    Ok(products)
}

fn merge_burst_group(
    group: &[&IndexEntry],
    track: &str,
    c_type: CalibrationType,
    aoi: &AoiInfo,
    out_dir: &Path,
    clip: Option<&Geometry>,
    format: OutputFormat,
) -> PackResult<Option<MergedProduct>> {
    let first = group[0];
    let reference = primary_metadata(&first.path)?;
    let product_id = reference.require(&reference.product_id, "product_id")?;
    let start_date = reference.require(&reference.start_date, "start_date")?;
    let end_date = reference.require(&reference.end_date, "end_date")?;

    let paths: Vec<&Path> = group.iter().map(|e| e.path.as_path()).collect();
    let mut table = merge_points(&paths, &["latitude", "longitude"], clip)?;
    if table.is_empty() {
        return Ok(None);
    }
    rename_burst_date_columns(&mut table)?;

    let name = burst_product_name(
        product_id, start_date, end_date, track, aoi.tag, &first.orbit_dir, c_type,
    );
    let data_files = write_data(&table, out_dir, &name, format)?;

    let mut sources = Vec::with_capacity(group.len());
    for entry in group {
        let metadata = primary_metadata(&entry.path)?;
        let (gsp_id, source_id) = burst_source_id(&archive_stem(&entry.path)?)?;
        let burst_id = metadata.require(&metadata.burst_id, "burst_id")?;
        sources.push(source_entry(gsp_id, source_id, "burst_id", burst_id));
    }

    let header = ProductHeader {
        gsp_id: product_id,
        name: &name,
        track: Some(track),
        provider: reference.require(&reference.provider, "provider")?,
        production_date: compact_date(
            reference.require(&reference.production_date, "production_date")?,
        ),
        start_date: compact_date(start_date),
        end_date: compact_date(end_date),
        aoi_tag: aoi.tag,
        crs: reference.require(&reference.crs, "crs")?,
    };
    let document = gsp_document(&header, &table, sources)?;
    let archive = package_product(out_dir, &name, &document, &data_files)?;

    Ok(Some(MergedProduct { name, archive, records: table.len(), sources: group.len() }))
}

/// Merge the tile products of an index, per deformation component
pub fn merge_tiles(config: &MergeConfig) -> PackResult<Vec<MergedProduct>> {
    let entries = read_index(&config.index_file)?;
    if entries.is_empty() {
        return Err(PackError::EmptyIndex(format!(
            "No Tiles found in the index file {}",
            config.index_file.display()
        )));
    }
    let aoi = aoi_info_from_path(&config.index_file)?;
    let out_dir = product_dir(&config.out_dir, &aoi)?;
    let clip = clip_geometry(config.clip_aoi.as_deref())?;

    log::info!("Merging Tiles based on Deformation Direction [V, E]");
    let mut products = Vec::new();
    for component in Component::ALL {
        let group: Vec<&IndexEntry> = entries.iter()
            .filter(|e| e.component == Some(component))
            .collect();
        if group.is_empty() {
            log::warn!("No Tiles found for Ortho {}", component);
            continue;
        }

        match merge_tile_group(&group, component, &aoi, &out_dir, clip.as_ref(), config.format)? {
            Some(product) => products.push(product),
            None => log::warn!("Ortho {} has no points left, skipped", component),
        }
    }

    Ok(products)
}

fn merge_tile_group(
    group: &[&IndexEntry],
    component: Component,
    aoi: &AoiInfo,
    out_dir: &Path,
    clip: Option<&Geometry>,
    format: OutputFormat,
) -> PackResult<Option<MergedProduct>> {
    let first = group[0];
    let reference = primary_metadata(&first.path)?;
    let product_id = reference.require(&reference.product_id, "product_id")?;
    let (start_date, end_date) = dates_from_name(&archive_stem(&first.path)?)?;

    let paths: Vec<&Path> = group.iter().map(|e| e.path.as_path()).collect();
    let mut table = merge_points(&paths, &[EASTING, NORTHING], clip)?;
    if table.is_empty() {
        return Ok(None);
    }
    rename_tile_date_columns(&mut table);

    let name = tile_product_name(product_id, &start_date, &end_date, aoi.tag, component);
    let data_files = write_data(&table, out_dir, &name, format)?;

    let mut sources = Vec::with_capacity(group.len());
    for entry in group {
        let metadata = primary_metadata(&entry.path)?;
        let (gsp_id, source_id) = tile_source_id(&archive_stem(&entry.path)?)?;
        let tile_id = metadata.require(&metadata.tile_id, "tile_id")?;
        sources.push(source_entry(gsp_id, source_id, "tile_id", tile_id));
    }

    let header = ProductHeader {
        gsp_id: product_id,
        name: &name,
        track: None,
        provider: reference.require(&reference.provider, "provider")?,
        production_date: compact_date(
            reference.require(&reference.production_date, "production_date")?,
        ),
        start_date,
        end_date,
        aoi_tag: aoi.tag,
        crs: reference.require(&reference.crs, "crs")?,
    };
    let document = gsp_document(&header, &table, sources)?;
    let archive = package_product(out_dir, &name, &document, &data_files)?;

    Ok(Some(MergedProduct { name, archive, records: table.len(), sources: group.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str]) -> PointTable {
        PointTable::new(EPSG_LAEA_EUROPE, columns.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_burst_date_columns() {
        let mut t = table(&["pid", "20180101", "D20180113", "vel", "D_x", "2018a"]);
        rename_burst_date_columns(&mut t).unwrap();
        assert_eq!(t.columns(), &["pid", "D20180101", "D20180113", "vel", "D_x", "2018a"]);
    }

    #[test]
    fn test_tile_date_columns() {
        let mut t = table(&["easting", "20180101", "D20180113"]);
        rename_tile_date_columns(&mut t);
        assert_eq!(t.columns(), &["easting", "D20180101", "D20180113"]);
    }

    #[test]
    fn test_product_names() {
        let name = burst_product_name("S3-01-SNT-02", "2018-01-01", "2022-12-31", "117", "PAL", "A", CalibrationType::Calibrated);
        assert_eq!(name, "ISS_S301SNT02_20180101_20221231_117PALAC_01");

        let name = burst_product_name("S3-01-SNT-01", "2018-01-01", "2022-12-31", "44", "PAL", "D", CalibrationType::Unspecified);
        assert_eq!(name, "ISS_S301SNT01_20180101_20221231_44PALD_01");

        let name = tile_product_name("S3-01-SNT-03", "20180101", "20221231", "CAL", Component::EastWest);
        assert_eq!(name, "ISS_S301SNT03_20180101_20221231_CALOE_01");
    }

    #[test]
    fn test_burst_source_id() {
        let (gsp_id, product_id) = burst_source_id("ISS_S3SNTB_20180101_20221231_117A250123IW2B_01").unwrap();
        assert_eq!(gsp_id, "S301SNT01");
        assert_eq!(product_id, "ISS_S301SNT01_20180101_20221231_117A250123IW2_01");

        let (gsp_id, product_id) = burst_source_id("ISS_TREA_20180101_20221231_117A250123IW2C_01").unwrap();
        assert_eq!(gsp_id, "S301SNT02");
        assert_eq!(product_id, "ISS_S301SNT02_20180101_20221231_117A250123IW2_01");

        assert!(burst_source_id("ISS_TREA").is_err());
    }

    #[test]
    fn test_tile_source_id() {
        let (gsp_id, product_id) = tile_source_id("ISS_TREA2D_20180101_20221231_E45N17V_01").unwrap();
        assert_eq!(gsp_id, "S301SNT03");
        assert_eq!(product_id, "ISS_S301SNT03_20180101_20221231_E45N17V_01");
        assert!(tile_source_id("E45N17V").is_err());
    }

    #[test]
    fn test_gsp_document() {
        let mut t = table(&["pid"]);
        t.push(4_500_000.0, 1_600_000.0, vec![AttrValue::from("a")]).unwrap();
        t.push(4_510_000.0, 1_610_000.0, vec![AttrValue::from("b")]).unwrap();

        let header = ProductHeader {
            gsp_id: "S3-01-SNT-02",
            name: "ISS_S301SNT02_20180101_20221231_117PALAC_01",
            track: Some("117"),
            provider: "TRE-A",
            production_date: "20240115".to_string(),
            start_date: "20180101".to_string(),
            end_date: "20221231".to_string(),
            aoi_tag: "PAL",
            crs: "EPSG:3035",
        };
        let sources = vec![source_entry("S301SNT02", "ISS_X".to_string(), "burst_id", "117_250123_IW2")];
        let document = gsp_document(&header, &t, sources).unwrap();

        let names: Vec<&str> = document.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![
            "gsp_id", "product_id", "description", "sensor_id", "track_id", "provider",
            "production_date", "start_date", "end_date", "aoi", "bbox", "geometry", "crs", "dataset",
        ]);

        let dataset = document.child("dataset").unwrap();
        assert_eq!(dataset.children.len(), 2);
        assert_eq!(dataset.children[0].name, "input");
        assert_eq!(dataset.children[1].child("burst_id").and_then(|b| b.text.as_deref()), Some("117_250123_IW2"));

        let geometry = document.child("geometry").and_then(|g| g.text.clone()).unwrap();
        let geojson: serde_json::Value = serde_json::from_str(&geometry).unwrap();
        assert_eq!(geojson["type"], "Polygon");
        assert_eq!(geojson["coordinates"][0].as_array().unwrap().len(), 5);
    }
}
