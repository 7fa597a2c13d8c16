use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Placeholder written into index attributes when no product was found
pub const NONE_VALUE: &str = "None";

/// Sensor identifier of Sentinel-1 products in the service segment
pub const SENSOR: &str = "SNT";

/// WGS84 geographic coordinates
pub const EPSG_WGS84: u32 = 4326;

/// ETRS89 Lambert Azimuthal Equal-Area, the grid of the deformation tiles
pub const EPSG_LAEA_EUROPE: u32 = 3035;

/// Attribute value of a vector feature or point record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Text value, or `None` for nulls and the `"None"` placeholder
    pub fn as_present_str(&self) -> Option<String> {
        match self {
            AttrValue::Null => None,
            AttrValue::Text(s) if s == NONE_VALUE || s.is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Integer(v) => write!(f, "{}", v),
            AttrValue::Real(v) => write!(f, "{}", v),
            AttrValue::Text(v) => write!(f, "{}", v),
            AttrValue::Null => Ok(()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

/// Satellite pass direction encoded in burst archive names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitDirection {
    Ascending,
    Descending,
    Unknown,
}

impl std::fmt::Display for OrbitDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrbitDirection::Ascending => write!(f, "A"),
            OrbitDirection::Descending => write!(f, "D"),
            OrbitDirection::Unknown => write!(f, "U"),
        }
    }
}

/// Calibration level of a single-geometry deformation product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalibrationType {
    Basic,
    Calibrated,
    Unspecified,
}

impl CalibrationType {
    /// Merge order of calibration groups
    pub const MERGE_ORDER: [CalibrationType; 3] = [
        CalibrationType::Calibrated,
        CalibrationType::Basic,
        CalibrationType::Unspecified,
    ];

    /// Code used inside product names; empty for unspecified products
    pub fn name_code(&self) -> &'static str {
        match self {
            CalibrationType::Basic => "B",
            CalibrationType::Calibrated => "C",
            CalibrationType::Unspecified => "",
        }
    }
}

impl std::fmt::Display for CalibrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationType::Basic => write!(f, "B"),
            CalibrationType::Calibrated => write!(f, "C"),
            CalibrationType::Unspecified => write!(f, "{}", NONE_VALUE),
        }
    }
}

impl FromStr for CalibrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(CalibrationType::Basic),
            "C" => Ok(CalibrationType::Calibrated),
            "" | NONE_VALUE => Ok(CalibrationType::Unspecified),
            other => Err(format!("Invalid calibration type: {}", other)),
        }
    }
}

/// Deformation component of a 2D tile product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Vertical,
    EastWest,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Vertical, Component::EastWest];
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Component::Vertical => write!(f, "V"),
            Component::EastWest => write!(f, "E"),
        }
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "V" => Ok(Component::Vertical),
            "E" => Ok(Component::EastWest),
            other => Err(format!("Invalid deformation component: {}", other)),
        }
    }
}

/// Format of merged point products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Csv,
    Shapefile,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Shapefile => "shp",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "shp" | "shapefile" => Ok(OutputFormat::Shapefile),
            "parquet" => Err("parquet output is not supported, use csv or shp".to_string()),
            other => Err(format!("Invalid output format: {}", other)),
        }
    }
}

/// Axis-aligned bounds in the coordinates of the owning dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Bounds of a set of coordinates, `None` when empty
    pub fn from_points<I: IntoIterator<Item = (f64, f64)>>(points: I) -> Option<Self> {
        let mut bbox: Option<BoundingBox> = None;
        for (x, y) in points {
            bbox = Some(match bbox {
                None => BoundingBox { min_x: x, min_y: y, max_x: x, max_y: y },
                Some(b) => BoundingBox {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        }
        bbox
    }

    /// Closed exterior ring of the envelope, counter-clockwise from the lower left corner
    pub fn envelope_ring(&self) -> Vec<[f64; 2]> {
        vec![
            [self.min_x, self.min_y],
            [self.max_x, self.min_y],
            [self.max_x, self.max_y],
            [self.min_x, self.max_y],
            [self.min_x, self.min_y],
        ]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} {}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Error types for indexing and packaging
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("XML writing error: {0}")]
    XmlWriting(#[from] quick_xml::Error),

    #[error("Coordinate reference system error: {0}")]
    Crs(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing field '{field}' in {source_name}")]
    MissingField { field: String, source_name: String },

    #[error("Empty catalog: {0}")]
    EmptyCatalog(String),

    #[error("Empty index: {0}")]
    EmptyIndex(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("AOI {0} not found")]
    UnknownAoi(String),

    #[error("Dataset {0} not found")]
    UnknownDataset(String),
}

/// Result type for indexing and packaging operations
pub type PackResult<T> = Result<T, PackError>;
