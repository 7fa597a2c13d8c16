mod common;

use common::{
    archive_members, archive_text, metadata_xml, rectangle, write_aoi, write_archive,
    write_polygons,
};
use sarpack::core::index::{index_bursts, index_tiles, BurstIndexConfig, TileIndexConfig};
use sarpack::core::merge::{merge_bursts, merge_tiles, MergeConfig};
use sarpack::{AttrValue, OutputFormat, PackError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER: &str = "pid,latitude,longitude,easting,northing,20180101";

fn points(rows: &[&str]) -> String {
    let mut csv = String::from(HEADER);
    for row in rows {
        csv.push('\n');
        csv.push_str(row);
    }
    csv.push('\n');
    csv
}

const P1: &str = "P1,38.10,13.10,4550000,1650000,0.0";
const P2: &str = "P2,38.11,13.11,4551000,1650000,0.0";
const P3: &str = "P3,38.12,13.12,4552000,1650000,0.0";
const P4: &str = "P4,38.20,13.20,4560000,1660000,0.0";

/// Burst index `<root>/out/palermo.shp` over three delivered burst products
fn burst_index(root: &Path) -> PathBuf {
    let catalog = root.join("bursts_catalog.shp");
    let fields = ["Name", "Track", "Burst", "Subswath"];
    let attrs = |name: &str, burst: &str| vec![
        AttrValue::from(name),
        AttrValue::Integer(117),
        AttrValue::from(burst),
        AttrValue::from("IW2"),
    ];
    write_polygons(&catalog, Some(4326), &fields, vec![
        (rectangle(12.9, 38.1, 13.2, 38.2), attrs("B1", "250123")),
        (rectangle(13.4, 37.9, 13.8, 38.1), attrs("B2", "250124")),
    ]);

    let aoi = root.join("palermo.shp");
    write_aoi(&aoi, 13.0, 38.0, 13.6, 38.3);

    let burst_dir = root.join("bursts");
    std::fs::create_dir_all(&burst_dir).unwrap();
    let dates = Some(("2018-01-01", "2022-12-31"));
    write_archive(
        &burst_dir,
        "ISS_TREA_20180101_20221231_117A250123IW2B_01.zip",
        &metadata_xml("S3-01-SNT-01", dates, "burst_id", "117_250123_IW2"),
        Some(&points(&[P1, P2])),
    );
    write_archive(
        &burst_dir,
        "ISS_TREA_20180101_20221231_117A250124IW2B_01.zip",
        &metadata_xml("S3-01-SNT-01", dates, "burst_id", "117_250124_IW2"),
        Some(&points(&[P2, P3])),
    );
    write_archive(
        &burst_dir,
        "ISS_TREA_20180101_20221231_117A250123IW2C_01.zip",
        &metadata_xml("S3-01-SNT-02", dates, "burst_id", "117_250123_IW2"),
        Some(&points(&[P1, P4])),
    );

    let config = BurstIndexConfig { catalog, aoi, burst_dir, out_dir: Some(root.join("index")) };
    index_bursts(&config).expect("Failed to index bursts").output
}

#[test]
fn test_merge_bursts_per_calibration_type() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let index = burst_index(dir.path());
    let out_dir = dir.path().join("products");

    let products = merge_bursts(&MergeConfig::new(&index, &out_dir))
        .expect("Failed to merge bursts");
    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec![
        "ISS_S301SNT02_20180101_20221231_117PALAC_01",
        "ISS_S301SNT01_20180101_20221231_117PALAB_01",
    ]);

    let calibrated = &products[0];
    assert_eq!((calibrated.records, calibrated.sources), (2, 1));
    let basic = &products[1];
    // P2 is delivered by both bursts
    assert_eq!((basic.records, basic.sources), (3, 2));
    assert!(basic.archive.starts_with(out_dir.join("PAL")));

    let stem = &basic.name;
    let members = vec![format!("{}.xml", stem), format!("{}.csv", stem)];
    assert_eq!(archive_members(&basic.archive), members);

    let csv = archive_text(&basic.archive, &format!("{}.csv", stem));
    assert_eq!(csv.lines().next(), Some("pid,latitude,longitude,easting,northing,D20180101"));
    let pids: Vec<&str> = csv.lines().skip(1).map(|l| l.split(',').next().unwrap_or("")).collect();
    assert_eq!(pids, vec!["P1", "P2", "P3"]);

    let xml = archive_text(&basic.archive, &format!("{}.xml", stem));
    assert!(xml.contains("<gsp_id>S3-01-SNT-01</gsp_id>"));
    assert!(xml.contains(&format!("<product_id>{}</product_id>", stem)));
    assert!(xml.contains("<track_id>117</track_id>"));
    assert!(xml.contains("<aoi>PAL</aoi>"));
    assert!(xml.contains("<start_date>20180101</start_date>"));
    assert!(xml.contains("<production_date>20240115</production_date>"));
    assert!(xml.contains("<burst_id>117_250124_IW2</burst_id>"));
    let source = "ISS_S301SNT01_20180101_20221231_117A250123IW2_01";
    assert!(xml.contains(&format!("<product_id>{}</product_id>", source)));

    // loose files are removed once packaged
    let leftovers: Vec<_> = std::fs::read_dir(out_dir.join("PAL")).unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(true, |ext| ext != "zip"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_merge_fails_on_missing_or_corrupt_archive() {
    let dir = TempDir::new().unwrap();
    let index = burst_index(dir.path());
    let config = MergeConfig::new(&index, dir.path().join("products"));
    let archive = dir.path()
        .join("bursts")
        .join("ISS_TREA_20180101_20221231_117A250124IW2B_01.zip");

    std::fs::write(&archive, b"not a zip archive").unwrap();
    assert!(matches!(merge_bursts(&config), Err(PackError::InvalidFormat(_))));

    std::fs::remove_file(&archive).unwrap();
    match merge_bursts(&config) {
        Err(PackError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected result: {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn test_merge_bursts_as_shapefile() {
    let dir = TempDir::new().unwrap();
    let index = burst_index(dir.path());

    let mut config = MergeConfig::new(&index, dir.path().join("products"));
    config.format = OutputFormat::Shapefile;
    let products = merge_bursts(&config).unwrap();
    assert_eq!(products.len(), 2);

    let members = archive_members(&products[0].archive);
    for ext in ["shp", "shx", "dbf", "prj", "xml"] {
        let member = format!("{}.{}", products[0].name, ext);
        assert!(members.contains(&member), "missing {} in {:?}", member, members);
    }
}

#[test]
fn test_merge_bursts_clipped() {
    let dir = TempDir::new().unwrap();
    let index = burst_index(dir.path());

    // around P1 and P2 only
    let clip = dir.path().join("clip.shp");
    write_polygons(&clip, Some(3035), &["id"], vec![
        (
            rectangle(4_549_500.0, 1_649_500.0, 4_551_500.0, 1_650_500.0),
            vec![AttrValue::Integer(1)],
        ),
    ]);

    let mut config = MergeConfig::new(&index, dir.path().join("products"));
    config.clip_aoi = Some(clip);
    let products = merge_bursts(&config).unwrap();

    let records: Vec<usize> = products.iter().map(|p| p.records).collect();
    assert_eq!(records, vec![1, 2]);
}

#[test]
fn test_merge_bursts_track_filter() {
    let dir = TempDir::new().unwrap();
    let index = burst_index(dir.path());

    let mut config = MergeConfig::new(&index, dir.path().join("products"));
    config.track = Some("117".to_string());
    assert_eq!(merge_bursts(&config).unwrap().len(), 2);

    config.track = Some("44".to_string());
    assert!(merge_bursts(&config).unwrap().is_empty());
}

fn tile_fixture(root: &Path, with_archives: bool) -> PathBuf {
    let catalog = root.join("grid.shp");
    write_polygons(&catalog, Some(3035), &["label", "overlap"], vec![
        (
            rectangle(4_500_000.0, 1_600_000.0, 4_600_000.0, 1_700_000.0),
            vec![AttrValue::from("E45N17"), AttrValue::Real(0.1)],
        ),
        (
            rectangle(4_600_000.0, 1_600_000.0, 4_700_000.0, 1_700_000.0),
            vec![AttrValue::from("E46N17"), AttrValue::Real(0.1)],
        ),
    ]);
    let aoi = root.join("palermo.shp");
    write_polygons(&aoi, Some(3035), &["id"], vec![
        (
            rectangle(4_590_000.0, 1_620_000.0, 4_610_000.0, 1_630_000.0),
            vec![AttrValue::Integer(1)],
        ),
    ]);

    let tile_dir = root.join("tiles");
    std::fs::create_dir_all(&tile_dir).unwrap();
    if with_archives {
        let header = "easting,northing,vel,20180101";
        let tiles = [
            ("E45N17V", "4550000,1650000,1.0,0.0\n4551000,1650000,1.1,0.1\n"),
            ("E46N17V", "4551000,1650000,1.1,0.1\n4650000,1650000,1.2,0.2\n"),
            ("E45N17E", "4550000,1650000,-0.5,0.0\n"),
        ];
        for (code, rows) in tiles {
            write_archive(
                &tile_dir,
                &format!("ISS_TREA2D_20180101_20221231_{}_01.zip", code),
                &metadata_xml("S3-01-SNT-03", Some(("2018-01-01", "2022-12-31")), "tile_id", code),
                Some(&format!("{}\n{}", header, rows)),
            );
        }
    }

    let config = TileIndexConfig { catalog, aoi, tile_dir, out_dir: Some(root.join("index")) };
    index_tiles(&config).expect("Failed to index tiles").output
}

#[test]
fn test_merge_tiles_per_component() {
    let dir = TempDir::new().unwrap();
    let index = tile_fixture(dir.path(), true);

    let products = merge_tiles(&MergeConfig::new(&index, dir.path().join("products"))).unwrap();
    let summary: Vec<(&str, usize, usize)> = products.iter()
        .map(|p| (p.name.as_str(), p.records, p.sources))
        .collect();
    assert_eq!(summary, vec![
        ("ISS_S301SNT03_20180101_20221231_PALOV_01", 3, 2),
        ("ISS_S301SNT03_20180101_20221231_PALOE_01", 1, 1),
    ]);

    let vertical = &products[0];
    let csv = archive_text(&vertical.archive, &format!("{}.csv", vertical.name));
    assert_eq!(csv.lines().next(), Some("easting,northing,vel,D20180101"));

    let xml = archive_text(&vertical.archive, &format!("{}.xml", vertical.name));
    assert!(!xml.contains("<track_id>"));
    assert!(xml.contains("<tile_id>E46N17V</tile_id>"));
    assert!(xml.contains("<gsp_id>S301SNT03</gsp_id>"));
    assert!(xml.contains("<input_id>S3-NEO-I01</input_id>"));
}

#[test]
fn test_merge_tiles_without_products() {
    let dir = TempDir::new().unwrap();
    let index = tile_fixture(dir.path(), false);

    let result = merge_tiles(&MergeConfig::new(&index, dir.path().join("products")));
    assert!(matches!(result, Err(PackError::EmptyIndex(_))));
}

#[test]
fn test_merge_unknown_aoi() {
    let dir = TempDir::new().unwrap();
    let index = tile_fixture(dir.path(), true);
    let renamed = dir.path().join("index").join("atlantis.shp");
    for ext in ["shp", "shx", "dbf", "prj"] {
        std::fs::copy(index.with_extension(ext), renamed.with_extension(ext)).unwrap();
    }

    let result = merge_tiles(&MergeConfig::new(&renamed, dir.path().join("products")));
    assert!(matches!(result, Err(PackError::UnknownAoi(_))));
}
