//! Point tables: the records of deformation products, merged across bursts and tiles

use crate::io::vector::{epsg_transform, point_geometry};
use crate::types::{AttrValue, BoundingBox, PackError, PackResult};
use gdal::vector::Geometry;
use std::collections::HashSet;

/// Columns renamed to their standard names when products are loaded
const STANDARD_COLUMNS: [(&str, &str); 3] = [
    ("LAT", "latitude"),
    ("LON", "longitude"),
    ("CODE", "pid"),
];

/// One measurement point
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub values: Vec<AttrValue>,
}

/// Points with a shared set of attribute columns, in a single EPSG reference system
#[derive(Debug, Clone, PartialEq)]
pub struct PointTable {
    epsg: u32,
    columns: Vec<String>,
    records: Vec<PointRecord>,
}

impl PointTable {
    pub fn new(epsg: u32, columns: Vec<String>) -> Self {
        Self { epsg, columns, records: Vec::new() }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a record; `values` must follow the column order
    pub fn push(&mut self, x: f64, y: f64, values: Vec<AttrValue>) -> PackResult<()> {
        if values.len() != self.columns.len() {
            return Err(PackError::InvalidFormat(format!(
                "record has {} values but the table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.records.push(PointRecord { x, y, values });
        Ok(())
    }

    /// Value of `column` in record `row`
    pub fn value(&self, row: usize, column: &str) -> Option<&AttrValue> {
        let index = self.column_index(column)?;
        self.records.get(row).and_then(|r| r.values.get(index))
    }

    /// Rename every column for which `rename` returns a new name
    pub fn rename_columns<F: Fn(&str) -> Option<String>>(&mut self, rename: F) {
        for column in self.columns.iter_mut() {
            if let Some(new_name) = rename(column) {
                *column = new_name;
            }
        }
    }

    /// Map provider-specific column names onto the standard ones
    pub fn normalize_columns(mut self) -> Self {
        self.rename_columns(|name| {
            STANDARD_COLUMNS.iter()
                .find(|(from, _)| *from == name)
                .map(|(_, to)| to.to_string())
        });
        self
    }

    /// Concatenate tables; columns are the union in first-seen order and missing cells are null
    pub fn concat(tables: Vec<PointTable>) -> PackResult<PointTable> {
        let epsg = match tables.first() {
            Some(table) => table.epsg,
            None => return Err(PackError::InvalidFormat("no tables to concatenate".to_string())),
        };

        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            if table.epsg != epsg {
                return Err(PackError::Crs(format!(
                    "cannot concatenate EPSG:{} and EPSG:{} tables",
                    epsg, table.epsg
                )));
            }
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut merged = PointTable::new(epsg, columns);
        for table in tables {
            let mapping: Vec<Option<usize>> = merged.columns.iter()
                .map(|c| table.column_index(c))
                .collect();
            for record in table.records {
                let values = mapping.iter()
                    .map(|index| match index {
                        Some(i) => record.values[*i].clone(),
                        None => AttrValue::Null,
                    })
                    .collect();
                merged.records.push(PointRecord { x: record.x, y: record.y, values });
            }
        }

        Ok(merged)
    }

    /// Drop records repeating the values of `keys`, keeping the first occurrence
    ///
    /// Numeric cells compare by value (`38.10` repeats `38.1`), other cells by text.
    /// Falls back to the point coordinates when any key column is missing.
    /// Returns the number of dropped records.
    pub fn drop_duplicates(&mut self, keys: &[&str]) -> usize {
        let indices: Option<Vec<usize>> = keys.iter().map(|k| self.column_index(k)).collect();
        if indices.is_none() {
            log::debug!("Key columns {:?} not found, using coordinates to find duplicates", keys);
        }

        let before = self.records.len();
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(before);
        self.records.retain(|record| {
            let key: Vec<String> = match &indices {
                Some(indices) => indices.iter().map(|i| key_part(&record.values[*i])).collect(),
                None => vec![float_key(record.x), float_key(record.y)],
            };
            seen.insert(key)
        });
        before - self.records.len()
    }

    /// Keep only records intersecting `area`, given in the table's reference system
    pub fn retain_within(&mut self, area: &Geometry) -> PackResult<usize> {
        let before = self.records.len();
        let mut kept = Vec::with_capacity(before);
        for record in self.records.drain(..) {
            if area.intersects(&point_geometry(record.x, record.y)?) {
                kept.push(record);
            }
        }
        self.records = kept;
        Ok(before - self.records.len())
    }

    /// Copy of the table with coordinates transformed to `epsg`
    pub fn to_epsg(&self, epsg: u32) -> PackResult<PointTable> {
        if epsg == self.epsg || self.records.is_empty() {
            let mut table = self.clone();
            table.epsg = epsg;
            return Ok(table);
        }

        let transform = epsg_transform(self.epsg, epsg)?;
        let mut xs: Vec<f64> = self.records.iter().map(|r| r.x).collect();
        let mut ys: Vec<f64> = self.records.iter().map(|r| r.y).collect();
        let mut zs = vec![0.0; xs.len()];
        transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

        let records = self.records.iter()
            .zip(xs.into_iter().zip(ys))
            .map(|(record, (x, y))| PointRecord { x, y, values: record.values.clone() })
            .collect();

        Ok(PointTable { epsg, columns: self.columns.clone(), records })
    }

    /// Bounds of the points, `None` for an empty table
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.records.iter().map(|r| (r.x, r.y)))
    }
}

/// Comparison key of one cell
fn key_part(value: &AttrValue) -> String {
    let number = match value {
        AttrValue::Integer(v) => Some(*v as f64),
        AttrValue::Real(v) => Some(*v),
        AttrValue::Text(s) => s.trim().parse::<f64>().ok(),
        AttrValue::Null => None,
    };
    match number {
        Some(v) if !v.is_nan() => float_key(v),
        _ => value.to_string(),
    }
}

fn float_key(value: f64) -> String {
    // -0.0 and 0.0 are the same point
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:e}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[(f64, f64, &[&str])]) -> PointTable {
        let mut table = PointTable::new(3035, columns.iter().map(|c| c.to_string()).collect());
        for (x, y, values) in rows {
            table.push(*x, *y, values.iter().map(|v| AttrValue::from(*v)).collect()).unwrap();
        }
        table
    }

    #[test]
    fn test_normalize_columns() {
        let t = table(&["CODE", "LAT", "LON", "vel"], &[]).normalize_columns();
        assert_eq!(t.columns(), &["pid", "latitude", "longitude", "vel"]);
    }

    #[test]
    fn test_concat_with_different_columns() {
        let a = table(&["pid", "vel"], &[(1.0, 1.0, &["a1", "0.5"])]);
        let b = table(&["pid", "D20200101"], &[(2.0, 2.0, &["b1", "3.2"])]);

        let merged = PointTable::concat(vec![a, b]).unwrap();
        assert_eq!(merged.columns(), &["pid", "vel", "D20200101"]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.value(0, "D20200101"), Some(&AttrValue::Null));
        assert_eq!(merged.value(1, "vel"), Some(&AttrValue::Null));
        assert_eq!(merged.value(1, "D20200101"), Some(&AttrValue::from("3.2")));
    }

    #[test]
    fn test_concat_rejects_mixed_reference_systems() {
        let a = table(&["pid"], &[]);
        let b = PointTable::new(4326, vec!["pid".to_string()]);
        assert!(PointTable::concat(vec![a, b]).is_err());
        assert!(PointTable::concat(Vec::new()).is_err());
    }

    #[test]
    fn test_drop_duplicates() {
        let mut t = table(
            &["pid", "latitude", "longitude"],
            &[
                (1.0, 1.0, &["a", "38.1", "13.3"]),
                (1.0, 1.0, &["b", "38.1", "13.3"]),
                (2.0, 2.0, &["c", "38.2", "13.3"]),
            ],
        );
        assert_eq!(t.drop_duplicates(&["latitude", "longitude"]), 1);
        assert_eq!(t.value(0, "pid"), Some(&AttrValue::from("a")));
        assert_eq!(t.value(1, "pid"), Some(&AttrValue::from("c")));

        // same coordinates written with different precision
        let mut t = table(
            &["pid", "latitude", "longitude"],
            &[
                (1.0, 1.0, &["a", "38.10", "13.3"]),
                (1.0, 1.0, &["b", "38.1", "13.30"]),
                (1.0, 1.0, &["c", "-0.0", "0"]),
                (1.0, 1.0, &["d", "0.0", "-0"]),
                (1.0, 1.0, &["e", "n/a", "13.3"]),
            ],
        );
        assert_eq!(t.drop_duplicates(&["latitude", "longitude"]), 2);
        let pids: Vec<String> = (0..t.len())
            .filter_map(|i| t.value(i, "pid"))
            .map(|v| v.to_string())
            .collect();
        assert_eq!(pids, vec!["a", "c", "e"]);

        // no key columns: coordinates decide
        let mut t = table(&["pid"], &[(5.0, 5.0, &["x"]), (5.0, 5.0, &["y"]), (5.0, 6.0, &["z"])]);
        assert_eq!(t.drop_duplicates(&["easting", "northing"]), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_retain_within() {
        let mut t = table(&["pid"], &[(1.0, 1.0, &["in"]), (10.0, 10.0, &["out"])]);
        let area = Geometry::from_wkt("POLYGON ((0 0, 5 0, 5 5, 0 5, 0 0))").unwrap();
        assert_eq!(t.retain_within(&area).unwrap(), 1);
        assert_eq!(t.value(0, "pid"), Some(&AttrValue::from("in")));
    }

    #[test]
    fn test_bounds() {
        let t = table(&["pid"], &[(1.0, 4.0, &["a"]), (3.0, 2.0, &["b"])]);
        let bbox = t.bounds().unwrap();
        assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (1.0, 2.0, 3.0, 4.0));
        assert!(table(&["pid"], &[]).bounds().is_none());
    }
}
