use crate::core::table::PointTable;
use crate::io::archive::ProductArchive;
use crate::io::vector::{
    first_vertex, point_geometry, srs_from_epsg, FieldDef, VectorFeature, VectorLayer,
};
use crate::types::{AttrValue, PackError, PackResult, EPSG_LAEA_EUROPE, EPSG_WGS84};
use gdal::vector::OGRwkbGeometryType;
use std::io::Read;
use std::path::Path;

/// Columns holding the EPSG:3035 position of every point in CSV products
pub const EASTING: &str = "easting";
pub const NORTHING: &str = "northing";

/// Read a deformation product as a point table in EPSG:3035
///
/// Supported inputs are `.csv` files with `easting`/`northing` columns, `.zip`
/// archives holding `<stem>.csv`, and point shapefiles (EPSG:4326 when the
/// shapefile carries no reference system).
pub fn read_point_table<P: AsRef<Path>>(path: P) -> PackResult<PointTable> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PackError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Data product not found: {}", path.display()),
        )));
    }

    let extension = path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    log::debug!("Reading point dataset {}", path.display());

    match extension.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)?;
            read_csv_points(file, &path.display().to_string())
        }
        "zip" => read_zipped_points(path),
        "shp" => read_shapefile_points(path),
        "parquet" => Err(PackError::UnsupportedFormat(format!(
            "parquet products are not supported: {}",
            path.display()
        ))),
        other => Err(PackError::UnsupportedFormat(format!(
            "File extension '{}' not recognised: {}",
            other,
            path.display()
        ))),
    }
}

/// Parse CSV points; every column is kept as text, positions come from `easting`/`northing`
pub fn read_csv_points<R: Read>(reader: R, source: &str) -> PackResult<PointTable> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let columns: Vec<String> = csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let position = |name: &str| {
        columns.iter().position(|c| c == name).ok_or_else(|| PackError::MissingField {
            field: name.to_string(),
            source_name: source.to_string(),
        })
    };
    let x_index = position(EASTING)?;
    let y_index = position(NORTHING)?;

    let mut table = PointTable::new(EPSG_LAEA_EUROPE, columns.clone());
    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        let coordinate = |index: usize| -> PackResult<f64> {
            let raw = record.get(index).unwrap_or("").trim();
            raw.parse::<f64>().map_err(|_| {
                PackError::InvalidFormat(format!(
                    "{}: invalid coordinate '{}' in {} at record {}",
                    source, raw, columns[index], line + 1
                ))
            })
        };
        let x = coordinate(x_index)?;
        let y = coordinate(y_index)?;
        let values = record.iter()
            .map(|cell| if cell.is_empty() { AttrValue::Null } else { AttrValue::from(cell) })
            .collect();
        table.push(x, y, values)?;
    }

    Ok(table)
}

fn read_zipped_points(path: &Path) -> PackResult<PointTable> {
    let mut archive = ProductArchive::new(path)?;
    let csv_name = format!("{}.csv", archive.stem());

    match archive.find_member(&csv_name)? {
        Some(member) => {
            let content = archive.read_entry(&member)?;
            read_csv_points(content.as_slice(), &format!("{}:{}", path.display(), member))
        }
        None => {
            let files = archive.list_files()?;
            if files.iter().any(|f| f.ends_with(".parquet")) {
                Err(PackError::UnsupportedFormat(format!(
                    "parquet member in {} is not supported",
                    path.display()
                )))
            } else {
                Err(PackError::InvalidFormat(format!(
                    "{} holds no {} member",
                    path.display(),
                    csv_name
                )))
            }
        }
    }
}

fn read_shapefile_points(path: &Path) -> PackResult<PointTable> {
    let mut layer = VectorLayer::read(path)?;
    if layer.srs.is_none() {
        log::debug!("{} has no reference system, assuming EPSG:{}", path.display(), EPSG_WGS84);
        layer.srs = Some(srs_from_epsg(EPSG_WGS84)?);
    }
    let layer = layer.reproject(EPSG_LAEA_EUROPE)?;

    let columns: Vec<String> = layer.fields.iter().map(|f| f.name.clone()).collect();
    let mut table = PointTable::new(EPSG_LAEA_EUROPE, columns.clone());
    for feature in &layer.features {
        let (x, y) = first_vertex(&feature.geometry).ok_or_else(|| {
            PackError::InvalidFormat(format!("empty geometry in {}", path.display()))
        })?;
        let values = columns.iter()
            .map(|c| feature.attribute(c).cloned().unwrap_or(AttrValue::Null))
            .collect();
        table.push(x, y, values)?;
    }
    Ok(table)
}

/// Write the attribute columns as CSV; the point geometry is not written
pub fn write_csv<P: AsRef<Path>>(table: &PointTable, path: P) -> PackResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(table.columns())?;
    for record in table.records() {
        writer.write_record(record.values.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the table as a point shapefile in EPSG:4326
pub fn write_point_shapefile<P: AsRef<Path>>(table: &PointTable, path: P) -> PackResult<()> {
    let table = table.to_epsg(EPSG_WGS84)?;
    let name = path.as_ref().file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    // CSV cells are text, column types come from their content
    let fields = table.columns().iter().map(|c| FieldDef::inferred(c)).collect();
    let mut layer = VectorLayer::new(&name, Some(srs_from_epsg(EPSG_WGS84)?), fields);
    for record in table.records() {
        let mut feature = VectorFeature::new(point_geometry(record.x, record.y)?);
        feature.attributes = table.columns().iter()
            .cloned()
            .zip(record.values.iter().cloned())
            .collect();
        layer.features.push(feature);
    }

    layer.write_shapefile(path, OGRwkbGeometryType::wkbPoint)
}
