use crate::types::{AttrValue, PackError, PackResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::vector::{
    FieldValue, Geometry, LayerAccess, OGRFieldType, OGRwkbGeometryType,
};
use gdal::{Dataset, DriverManager, LayerOptions};
use std::path::{Path, PathBuf};

/// File extensions making up one ESRI shapefile
const SHAPEFILE_PARTS: [&str; 6] = ["shp", "shx", "dbf", "prj", "cpg", "qix"];

/// One feature of a vector layer: geometry plus ordered attributes
#[derive(Debug, Clone)]
pub struct VectorFeature {
    pub geometry: Geometry,
    pub attributes: Vec<(String, AttrValue)>,
}

impl VectorFeature {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry, attributes: Vec::new() }
    }

    pub fn with_attribute<V: Into<AttrValue>>(mut self, name: &str, value: V) -> Self {
        self.attributes.push((name.to_string(), value.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Attribute that has to exist, `source` names the dataset in the error
    pub fn require(&self, name: &str, source: &str) -> PackResult<&AttrValue> {
        self.attribute(name).ok_or_else(|| PackError::MissingField {
            field: name.to_string(),
            source_name: source.to_string(),
        })
    }
}

/// Attribute column of a vector layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// `None` types the column from its values when the layer is written
    pub field_type: Option<OGRFieldType::Type>,
}

impl FieldDef {
    pub fn typed(name: &str, field_type: OGRFieldType::Type) -> Self {
        Self { name: name.to_string(), field_type: Some(field_type) }
    }

    pub fn inferred(name: &str) -> Self {
        Self { name: name.to_string(), field_type: None }
    }
}

/// In-memory copy of the first layer of an OGR dataset
#[derive(Debug, Clone)]
pub struct VectorLayer {
    pub name: String,
    pub srs: Option<SpatialRef>,
    pub fields: Vec<FieldDef>,
    pub features: Vec<VectorFeature>,
}

impl VectorLayer {
    pub fn new(name: &str, srs: Option<SpatialRef>, fields: Vec<FieldDef>) -> Self {
        Self { name: name.to_string(), srs, fields, features: Vec::new() }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Read all features of the first layer in `path`
    pub fn read<P: AsRef<Path>>(path: P) -> PackResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PackError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }
        log::debug!("Reading vector layer from {}", path.display());

        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layers().next().ok_or_else(|| {
            PackError::InvalidFormat(format!("No layer found in {}", path.display()))
        })?;

        let srs = match layer.spatial_ref() {
            Some(mut srs) => {
                use_traditional_axis_order(&mut srs);
                Some(srs)
            }
            None => None,
        };
        let fields: Vec<FieldDef> = layer.defn().fields()
            .map(|f| FieldDef::typed(&f.name(), stored_field_type(f.field_type())))
            .collect();

        let mut features = Vec::new();
        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                log::warn!("Skipping feature without geometry in {}", path.display());
                continue;
            };
            let attributes = feature.fields()
                .map(|(name, value)| (name, attr_from_field(value)))
                .collect();
            features.push(VectorFeature { geometry: geometry.clone(), attributes });
        }

        let name = path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        log::debug!("Read {} features from layer '{}'", features.len(), name);

        Ok(Self { name, srs, fields, features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// EPSG code of the layer, if the reference system has one
    pub fn epsg(&self) -> Option<u32> {
        self.srs.as_ref()
            .and_then(|srs| srs.auth_code().ok())
            .and_then(|code| u32::try_from(code).ok())
    }

    /// Copy of the layer with every geometry transformed to `epsg`
    pub fn reproject(&self, epsg: u32) -> PackResult<Self> {
        let source = self.srs.as_ref().ok_or_else(|| {
            PackError::Crs(format!("layer '{}' has no coordinate reference system", self.name))
        })?;
        let target = srs_from_epsg(epsg)?;
        let transform = CoordTransform::new(source, &target)?;

        let mut features = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            features.push(VectorFeature {
                geometry: feature.geometry.transform(&transform)?,
                attributes: feature.attributes.clone(),
            });
        }

        Ok(Self {
            name: self.name.clone(),
            srs: Some(target),
            fields: self.fields.clone(),
            features,
        })
    }

    /// Write the layer as an ESRI shapefile, replacing any existing one
    pub fn write_shapefile<P: AsRef<Path>>(
        &self,
        path: P,
        geometry_type: OGRwkbGeometryType::Type,
    ) -> PackResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        remove_shapefile(path)?;

        log::debug!("Writing {} features to {}", self.features.len(), path.display());

        let driver = DriverManager::get_driver_by_name("ESRI Shapefile")?;
        let mut dataset = driver.create_vector_only(path)?;
        let layer_name = path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone());
        let mut layer = dataset.create_layer(LayerOptions {
            name: &layer_name,
            srs: self.srs.as_ref(),
            ty: geometry_type,
            ..Default::default()
        })?;

        let field_defs: Vec<(&str, OGRFieldType::Type)> = self.fields.iter()
            .map(|f| {
                let field_type = f.field_type.unwrap_or_else(|| self.column_field_type(&f.name));
                (f.name.as_str(), field_type)
            })
            .collect();
        layer.create_defn_fields(&field_defs)?;

        for feature in &self.features {
            let mut names = Vec::new();
            let mut values = Vec::new();
            for (name, field_type) in &field_defs {
                let Some(value) = feature.attribute(name) else { continue };
                if let Some(value) = field_value(value, *field_type) {
                    names.push(*name);
                    values.push(value);
                }
            }
            layer.create_feature_fields(feature.geometry.clone(), &names, &values)?;
        }

        Ok(())
    }

    /// OGR field type able to hold every value of a column
    fn column_field_type(&self, name: &str) -> OGRFieldType::Type {
        column_field_type(self.features.iter().filter_map(|f| f.attribute(name)))
    }
}

/// OGR type kept for a column read from disk; values of other types are read as text
fn stored_field_type(field_type: OGRFieldType::Type) -> OGRFieldType::Type {
    match field_type {
        OGRFieldType::OFTInteger
        | OGRFieldType::OFTInteger64
        | OGRFieldType::OFTReal
        | OGRFieldType::OFTString => field_type,
        _ => OGRFieldType::OFTString,
    }
}

/// Narrowest OGR field type for a set of values; text is typed by its content
pub fn column_field_type<'a, I>(values: I) -> OGRFieldType::Type
where
    I: Iterator<Item = &'a AttrValue>,
{
    let mut has_real = false;
    let mut has_integer = false;
    for value in values {
        match value {
            AttrValue::Integer(_) => has_integer = true,
            AttrValue::Real(_) => has_real = true,
            AttrValue::Text(s) if s.is_empty() => {}
            AttrValue::Text(s) => {
                if s.parse::<i64>().is_ok() {
                    has_integer = true;
                } else if s.parse::<f64>().is_ok() {
                    has_real = true;
                } else {
                    return OGRFieldType::OFTString;
                }
            }
            AttrValue::Null => {}
        }
    }
    if has_real {
        OGRFieldType::OFTReal
    } else if has_integer {
        OGRFieldType::OFTInteger64
    } else {
        OGRFieldType::OFTString
    }
}

fn field_value(value: &AttrValue, field_type: OGRFieldType::Type) -> Option<FieldValue> {
    match (value, field_type) {
        (AttrValue::Null, _) => None,
        (AttrValue::Text(s), _) if s.is_empty() && field_type != OGRFieldType::OFTString => None,
        (AttrValue::Integer(v), OGRFieldType::OFTInteger) => {
            i32::try_from(*v).ok().map(FieldValue::IntegerValue)
        }
        (AttrValue::Integer(v), OGRFieldType::OFTInteger64) => Some(FieldValue::Integer64Value(*v)),
        (AttrValue::Integer(v), OGRFieldType::OFTReal) => Some(FieldValue::RealValue(*v as f64)),
        (AttrValue::Real(v), OGRFieldType::OFTReal) => Some(FieldValue::RealValue(*v)),
        (AttrValue::Text(s), OGRFieldType::OFTInteger) => {
            s.parse().ok().map(FieldValue::IntegerValue)
        }
        (AttrValue::Text(s), OGRFieldType::OFTInteger64) => {
            s.parse().ok().map(FieldValue::Integer64Value)
        }
        (AttrValue::Text(s), OGRFieldType::OFTReal) => s.parse().ok().map(FieldValue::RealValue),
        (other, _) => Some(FieldValue::StringValue(other.to_string())),
    }
}

fn attr_from_field(value: Option<FieldValue>) -> AttrValue {
    match value {
        Some(FieldValue::IntegerValue(v)) => AttrValue::Integer(i64::from(v)),
        Some(FieldValue::Integer64Value(v)) => AttrValue::Integer(v),
        Some(FieldValue::RealValue(v)) => AttrValue::Real(v),
        Some(FieldValue::StringValue(v)) => AttrValue::Text(v),
        Some(FieldValue::DateValue(v)) => AttrValue::Text(v.to_string()),
        Some(FieldValue::DateTimeValue(v)) => AttrValue::Text(v.to_rfc3339()),
        Some(other) => AttrValue::Text(format!("{:?}", other)),
        None => AttrValue::Null,
    }
}

/// Spatial reference for an EPSG code, in longitude/latitude (x/y) axis order
pub fn srs_from_epsg(epsg: u32) -> PackResult<SpatialRef> {
    let mut srs = SpatialRef::from_epsg(epsg)
        .map_err(|e| PackError::Crs(format!("EPSG:{} is not available: {}", epsg, e)))?;
    use_traditional_axis_order(&mut srs);
    Ok(srs)
}

/// GDAL 3 follows the authority axis order (lat/lon for EPSG:4326) unless told otherwise
fn use_traditional_axis_order(srs: &mut SpatialRef) {
    srs.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
}

/// Coordinate transform between two EPSG codes
pub fn epsg_transform(source: u32, target: u32) -> PackResult<CoordTransform> {
    Ok(CoordTransform::new(&srs_from_epsg(source)?, &srs_from_epsg(target)?)?)
}

/// Point geometry from planar coordinates
pub fn point_geometry(x: f64, y: f64) -> PackResult<Geometry> {
    Ok(Geometry::from_wkt(&format!("POINT ({} {})", x, y))?)
}

/// First vertex of a geometry, descending into rings and parts
pub fn first_vertex(geometry: &Geometry) -> Option<(f64, f64)> {
    if geometry.geometry_count() > 0 {
        return first_vertex(&geometry.get_geometry(0));
    }
    if geometry.point_count() > 0 {
        let (x, y, _) = geometry.get_point(0);
        Some((x, y))
    } else {
        None
    }
}

/// Union of a set of geometries, `None` when there is nothing to join
pub fn union_all<'a, I>(geometries: I) -> PackResult<Option<Geometry>>
where
    I: IntoIterator<Item = &'a Geometry>,
{
    let mut merged: Option<Geometry> = None;
    for geometry in geometries {
        merged = Some(match merged {
            None => geometry.clone(),
            Some(acc) => acc.union(geometry).ok_or_else(|| {
                PackError::InvalidFormat("Failed to compute geometry union".to_string())
            })?,
        });
    }
    Ok(merged)
}

/// Paths of all shapefile parts that exist for `path`
pub fn shapefile_parts<P: AsRef<Path>>(path: P) -> Vec<PathBuf> {
    SHAPEFILE_PARTS.iter()
        .map(|ext| path.as_ref().with_extension(ext))
        .filter(|p| p.exists())
        .collect()
}

/// Delete every part of a shapefile
pub fn remove_shapefile<P: AsRef<Path>>(path: P) -> PackResult<()> {
    for part in shapefile_parts(path) {
        std::fs::remove_file(part)?;
    }
    Ok(())
}
