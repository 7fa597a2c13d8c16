//! Fixtures shared by the integration tests: shapefiles and product archives
//! written through the library into temporary directories.

#![allow(dead_code)]

use gdal::vector::{Geometry, OGRwkbGeometryType};
use sarpack::io::archive::write_flat_archive;
use sarpack::io::vector::{srs_from_epsg, FieldDef, VectorFeature, VectorLayer};
use sarpack::AttrValue;
use std::path::{Path, PathBuf};

/// Rectangle with a clockwise ring starting at the upper left corner
pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
    Geometry::from_wkt(&format!(
        "POLYGON (({x0} {y1}, {x1} {y1}, {x1} {y0}, {x0} {y0}, {x0} {y1}))",
        x0 = min_x, y0 = min_y, x1 = max_x, y1 = max_y
    ))
    .expect("Failed to build rectangle")
}

pub type Polygons = Vec<(Geometry, Vec<AttrValue>)>;

/// Write a polygon shapefile; `epsg` None leaves the file without a .prj
pub fn write_polygons(path: &Path, epsg: Option<u32>, fields: &[&str], features: Polygons) {
    let fields = fields.iter().map(|f| FieldDef::inferred(f)).collect();
    write_typed_polygons(path, epsg, fields, features);
}

/// Polygon shapefile with explicit column types
pub fn write_typed_polygons(
    path: &Path,
    epsg: Option<u32>,
    fields: Vec<FieldDef>,
    features: Polygons,
) {
    let srs = epsg.map(|code| srs_from_epsg(code).expect("Failed to create SRS"));
    let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
    let mut layer = VectorLayer::new("fixture", srs, fields);
    for (geometry, values) in features {
        let mut feature = VectorFeature::new(geometry);
        feature.attributes = names.iter().cloned().zip(values).collect();
        layer.features.push(feature);
    }
    layer.write_shapefile(path, OGRwkbGeometryType::wkbPolygon)
        .expect("Failed to write shapefile");
}

/// Single-polygon AOI file in EPSG:4326
pub fn write_aoi(path: &Path, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) {
    write_polygons(
        path,
        Some(4326),
        &["id"],
        vec![(rectangle(min_lon, min_lat, max_lon, max_lat), vec![AttrValue::Integer(1)])],
    );
}

/// Product metadata document as delivered inside provider archives
pub fn metadata_xml(
    product_id: &str,
    dates: Option<(&str, &str)>,
    id_field: &str,
    id_value: &str,
) -> String {
    let dates = dates
        .map(|(start, end)| {
            format!("<start_date>{}</start_date><end_date>{}</end_date>", start, end)
        })
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<GSP>
  <gsp_id>{product_id}</gsp_id>
  <product_id>{product_id}</product_id>
  <provider>TRE-A</provider>
  <production_date>2024-01-15</production_date>
  {dates}
  <crs>EPSG:3035</crs>
  <{id_field}>{id_value}</{id_field}>
</GSP>"#
    )
}

/// Product archive holding `<stem>.xml` and, when given, `<stem>.csv`
pub fn write_archive(dir: &Path, name: &str, xml: &str, csv: Option<&str>) -> PathBuf {
    let path = dir.join(name);
    let stem = name.trim_end_matches(".zip");
    let mut members = vec![(format!("{}.xml", stem), xml.as_bytes().to_vec())];
    if let Some(csv) = csv {
        members.push((format!("{}.csv", stem), csv.as_bytes().to_vec()));
    }
    write_flat_archive(&path, &members).expect("Failed to write archive");
    path
}

/// Names of the members of a zip archive, in archive order
pub fn archive_members(path: &Path) -> Vec<String> {
    let mut archive = sarpack::io::ProductArchive::new(path).expect("Failed to open archive");
    archive.list_files().expect("Failed to list archive")
}

/// Text of one archive member
pub fn archive_text(path: &Path, member: &str) -> String {
    let mut archive = sarpack::io::ProductArchive::new(path).expect("Failed to open archive");
    let content = archive.read_entry(member).expect("Failed to read member");
    String::from_utf8(content).expect("Member is not UTF-8")
}

/// Text attribute of a feature, `None` placeholders included
pub fn text(feature: &VectorFeature, field: &str) -> String {
    feature.attribute(field).map(|v| v.to_string()).unwrap_or_default()
}
