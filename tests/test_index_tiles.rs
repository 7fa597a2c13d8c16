mod common;

use common::{metadata_xml, rectangle, text, write_archive, write_polygons};
use gdal::vector::OGRFieldType;
use sarpack::core::index::{index_tiles, TileIndexConfig};
use sarpack::io::VectorLayer;
use sarpack::AttrValue;
use std::path::Path;
use tempfile::TempDir;

/// 100 km grid cell with lower left corner (e, n) in units of 100 km
fn tile(e: i64, n: i64, label: &str) -> (gdal::vector::Geometry, Vec<AttrValue>) {
    let (x, y) = (e as f64 * 1e5, n as f64 * 1e5);
    (
        rectangle(x, y, x + 1e5, y + 1e5),
        vec![AttrValue::from(label), AttrValue::Real(0.5)],
    )
}

fn setup(root: &Path) -> TileIndexConfig {
    let catalog = root.join("grid.shp");
    write_polygons(&catalog, Some(3035), &["label", "overlap"], vec![
        tile(45, 16, "E45N17"),
        tile(46, 16, "E46N17"),
        tile(48, 20, "E48N21"),
    ]);

    // crosses the border between the first two tiles
    let aoi = root.join("palermo.shp");
    write_polygons(&aoi, Some(3035), &["id"], vec![
        (
            rectangle(4_590_000.0, 1_620_000.0, 4_610_000.0, 1_630_000.0),
            vec![AttrValue::Integer(1)],
        ),
    ]);

    let tile_dir = root.join("tiles");
    std::fs::create_dir_all(&tile_dir).unwrap();
    write_archive(
        &tile_dir,
        "ISS_TREA2D_20180101_20221231_E45N17V_01.zip",
        &metadata_xml("S3-01-SNT-03", Some(("2018-01-01", "2022-12-31")), "tile_id", "E45N17V"),
        None,
    );
    write_archive(
        &tile_dir,
        "ISS_TREA2D_20180101_20221231_E45N17E_01.zip",
        &metadata_xml("S3-01-SNT-03", Some(("2018-01-01", "2022-12-31")), "tile_id", "E45N17E"),
        None,
    );
    // dates missing from the metadata
    write_archive(
        &tile_dir,
        "ISS_TREA2D_20190101_20231231_E46N17V_01.zip",
        &metadata_xml("S3-01-SNT-03", None, "tile_id", "E46N17V"),
        None,
    );

    TileIndexConfig { catalog, aoi, tile_dir, out_dir: Some(root.join("out")) }
}

#[test]
fn test_index_tiles_vertical_then_east_west() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = setup(dir.path());

    let summary = index_tiles(&config).expect("Failed to index tiles");
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.records, 4);

    let index = VectorLayer::read(&summary.output).expect("Failed to read index");
    assert!(index.srs.is_some());
    assert!(index.field("overlap").is_none());
    assert_eq!(index.field("label").and_then(|f| f.field_type), Some(OGRFieldType::OFTString));

    let rows: Vec<(String, String, String)> = index.features.iter()
        .map(|f| (text(f, "label"), text(f, "Ortho"), text(f, "start_date")))
        .collect();
    assert_eq!(rows, vec![
        ("E45N17".to_string(), "V".to_string(), "2018-01-01".to_string()),
        ("E46N17".to_string(), "V".to_string(), "20190101".to_string()),
        ("E45N17".to_string(), "E".to_string(), "2018-01-01".to_string()),
        ("E46N17".to_string(), "E".to_string(), "None".to_string()),
    ]);

    let missing = &index.features[3];
    assert_eq!(text(missing, "Path"), "None");
    assert_eq!(text(&index.features[1], "end_date"), "20231231");
    assert!(text(&index.features[0], "Path").ends_with("E45N17V_01.zip"));
}

#[test]
fn test_tile_index_keeps_projected_footprints() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let summary = index_tiles(&config).unwrap();

    let index = VectorLayer::read(&summary.output).unwrap();
    let (x, y) = sarpack::io::vector::first_vertex(&index.features[0].geometry).unwrap();
    approx::assert_abs_diff_eq!(x, 4_500_000.0, epsilon = 1e-3);
    approx::assert_abs_diff_eq!(y, 1_700_000.0, epsilon = 1e-3);
}
