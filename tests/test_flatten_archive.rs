mod common;

use common::archive_members;
use sarpack::io::archive::write_flat_archive;
use sarpack::io::flatten_archive;
use tempfile::TempDir;

#[test]
fn test_flatten_nested_archive() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let stem = "ISS_TREA_20180101_20221231_117A250123IW2B_01";
    let source = dir.path().join(format!("{}.zip", stem));

    let nested = |name: &str| format!("data/IRIDE/S3-01-SNT-01/{}", name);
    write_flat_archive(&source, &[
        (nested(&format!("{}.xml", stem)), b"<GSP/>".to_vec()),
        (nested(&format!("{}.csv", stem)), b"pid,easting,northing\n".to_vec()),
        (nested(&format!("{}.qml", stem)), b"style".to_vec()),
        (nested("readme.csv"), b"x".to_vec()),
    ])
    .expect("Failed to write source archive");

    let flat = flatten_archive(&source, dir.path().join("flat"))
        .expect("Failed to flatten archive");
    assert_eq!(flat, dir.path().join("flat").join(format!("{}.zip", stem)));
    let expected = vec![format!("{}.xml", stem), format!("{}.csv", stem)];
    assert_eq!(archive_members(&flat), expected);
}

#[test]
fn test_flatten_refuses_to_overwrite_input() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("product.zip");
    write_flat_archive(&source, &[("product.xml".to_string(), b"<GSP/>".to_vec())]).unwrap();

    assert!(flatten_archive(&source, dir.path()).is_err());
    assert_eq!(archive_members(&source), vec!["product.xml".to_string()]);
}
