//! Catalogue of the geospatial products (GSP) of the service segment
//!
//! Product identifiers come in a dashed form (`S3-01-SNT-02`) and a compact
//! form (`S301SNT02`); every lookup accepts both.

use crate::io::package::XmlElement;
use crate::types::{PackError, PackResult};

/// Parsed product identifier: service number, sensor code and product number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GspId {
    pub service: u8,
    pub sensor: String,
    pub product: u8,
}

impl GspId {
    /// Parse `S3-01-SNT-02` or `S301SNT02`
    pub fn parse(id: &str) -> Option<Self> {
        let compact: String = id.trim().chars().filter(|c| *c != '-').collect();
        if compact.len() != 9 || !compact.is_ascii() || !compact.starts_with("S3") {
            return None;
        }
        let service = compact[2..4].parse().ok()?;
        let sensor = &compact[4..7];
        if !sensor.chars().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        let product = compact[7..9].parse().ok()?;
        Some(Self { service, sensor: sensor.to_string(), product })
    }

    /// (service, product) when the sensor code is valid for the service
    fn family(&self) -> Option<(u8, u8)> {
        let valid = match self.service {
            1 | 2 | 4 => matches!(self.sensor.as_str(), "SNT" | "CSM" | "SAO"),
            3 => self.sensor == "CHA",
            5 => self.sensor == "ETQ",
            6 => self.sensor == "VOL",
            7 => self.sensor == "OND",
            _ => false,
        };
        valid.then_some((self.service, self.product))
    }

    /// Dashed identifier, `S3-01-SNT-02`
    pub fn dashed(&self) -> String {
        format!("S3-{:02}-{}-{:02}", self.service, self.sensor, self.product)
    }

    /// Compact identifier, `S301SNT02`
    pub fn compact(&self) -> String {
        format!("S3{:02}{}{:02}", self.service, self.sensor, self.product)
    }
}

fn family(gsp_id: &str) -> Option<(u8, u8)> {
    GspId::parse(gsp_id).and_then(|id| id.family())
}

/// Human-readable description of a product; empty for unknown products
pub fn gsp_description(gsp_id: &str) -> &'static str {
    match family(gsp_id) {
        Some((1, 1)) => "Single Geometry Deformation.",
        Some((1, 2)) => "Single Geometry Calibrated Deformation.",
        Some((1, 3)) => "2D Deformation East-West and Vertical Components.",
        Some((1, 4)) => "Active Displacement Areas.",
        Some((2, 2)) => "LOS velocities projected along the maximum slope.",
        Some((2, 3)) => "Spatial Anomaly maps.",
        Some((2, 4)) => "Temporal Anomaly Maps.",
        Some((2, 5)) => "Automatic identification of unstable slopes.",
        Some((3, 1)) => "InSAR Statistical Indexes.",
        Some((3, 2)) => "3D Velocity Decomposition.",
        Some((3, 3)) => "Identification of Differential Deformation over Cultural Heritage Structures.",
        Some((3, 4)) => "Temporal Anomaly Maps.",
        Some((3, 5)) => "Intersection of spatio-temporal anomalies with exposed Cultural heritage.",
        Some((4, 2)) => "Active deformation areas close to infrastructures.",
        Some((4, 3)) => "Anomalous Deformation Areas based on acceleration analysis.",
        Some((5, 1)) => "Single geometry calibrated deformations resampled on a medium resolution grid.",
        Some((5, 2)) => "2D calibrated deformations: East-West and Vertical components.",
        Some((5, 3)) => "Spatial clusterization based on temporal displacement models.",
        Some((5, 4)) => "DInSAR-based co-seismic deformation.",
        Some((5, 5)) => "Strategic assets single geometry deformations: non-calibrated and calibrated.",
        Some((5, 6)) => "Strategic assets 2D deformations: East-West and vertical components.",
        Some((5, 7)) => "Strategic assets PS/DS-based temporal anomalies.",
        Some((6, 2)) => "Active Deformation Areas Perimeter.",
        Some((6, 3)) => "Identification of Differential Deformation over Volcanic Areas.",
        Some((6, 4)) => "Temporal Anomaly Maps.",
        Some((6, 5)) => "Multi-sensors and multi-geometry Data Fusion.",
        Some((6, 6)) => "Change Detection Maps.",
        Some((6, 7)) => "InSAR Coherence Maps.",
        Some((6, 8)) => "Intersection of spatio-temporal anomalies with exposed assets.",
        Some((7, 1)) => "Single geometry calibrated deformations extracted for the period of interest.",
        Some((7, 2)) => "2D calibrated deformations: East-West and Vertical components.",
        Some((7, 3)) => "Landslide Spatial Anomalies.",
        Some((7, 4)) => "Landslide Spatio-Temporal Anomalies.",
        Some((7, 5)) => "Area of influence of active areas from spatial anomalies.",
        Some((7, 6)) => "LOS velocities projected along the maximum slope.",
        Some((7, 7)) => "GNSS time series projected along the PS/DS LOS.",
        Some((7, 8)) => "Volcanic Spatial Statistics.",
        Some((7, 9)) => "InSAR Coherence Maps.",
        _ => "",
    }
}

/// Ancillary datasets used to generate a product
pub fn gsp_metadata(gsp_id: &str) -> &'static [&'static str] {
    match family(gsp_id) {
        Some((1, 1..=3)) => &["CopDem"],
        Some((1, 4)) => &["CopDem", "OpenStreetMap"],
        Some((2, 2 | 4 | 5)) => &["Tinitaly-10"],
        Some((4, 2 | 3)) => &["Tinitaly-10", "OpenStreetMap", "CopDem"],
        _ => &[],
    }
}

/// Delivery data type of a product; `NA` for unknown products
pub fn gsp_data_type(gsp_id: &str) -> &'static str {
    match family(gsp_id) {
        Some((1, 1..=3) | (2, 2 | 4 | 5) | (3, 2 | 4) | (4, 2 | 3)
            | (5, 1..=3 | 6 | 7) | (6, 2 | 4 | 5) | (7, 1 | 2 | 7)) => {
            "ESRI Shapefile (Geometry: Points) + CSV"
        }
        Some((1, 4) | (3, 1 | 3 | 5) | (6, 8) | (7, 6 | 8)) => "ESRI Shapefile (Geometry: Polygon)",
        Some((5, 4) | (6, 6 | 7)) => "GeoTiff disp. Map + XML",
        Some((7, 3..=5 | 9)) => "ESRI Shapefile (Geometry: Polygon / Points) + CSV",
        _ => "NA",
    }
}

/// Non-EO dataset referenced in the `input` entries of product metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncillaryInput {
    pub input_id: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

impl AncillaryInput {
    pub fn to_xml(&self) -> XmlElement {
        XmlElement::new("input")
            .with_child(XmlElement::leaf("input_id", self.input_id))
            .with_child(XmlElement::leaf("version", self.version))
            .with_child(XmlElement::leaf("description", self.description))
    }
}

/// Look up an ancillary dataset by name
pub fn ancillary_input(name: &str) -> PackResult<AncillaryInput> {
    match name {
        "TINITALY" | "Tinitaly" | "Tinitaly-10" => Ok(AncillaryInput {
            input_id: "S3-NEO-I01",
            version: "Tinitaly-10",
            description: "Tarquini S., I. Isola, M. Favalli, A. Battistini,G. Dotta (2023). \
                TINITALY, a digital elevation model of Italy with a 10 meters cell size \
                (Version 1.1). Istituto Nazionale di Geofisica e Vulcanologia (INGV). \
                https://doi.org/10.13127/tinitaly/1.1.",
        }),
        "OpenStreetMap" | "OSM" => Ok(AncillaryInput {
            input_id: "S3-NEO-I09",
            version: "OpenStreetMap",
            description: "OpenStreetMap (Version 1.0). OpenStreetMap Foundation. \
                https://doi.org/10.13127/osm/1.0.",
        }),
        "Copernicus" | "CopDem" => Ok(AncillaryInput {
            input_id: "S3-NEO-I01",
            version: "Cop-DEM - Resolution (m) 30 x 30",
            description: "Copernicus Digital Elevation Model (DEM) (Version 1.0). \
                https://spacedata.copernicus.eu/collections/copernicus-digital-elevation-model.",
        }),
        other => Err(PackError::UnknownDataset(other.to_string())),
    }
}

/// Character `index` of the processing token, `NA` when out of range
fn char_at(processing: &str, index: usize) -> String {
    processing.chars()
        .nth(index)
        .map(|c| c.to_string())
        .unwrap_or_else(|| "NA".to_string())
}

/// Orbit direction encoded in the processing token of a delivered product name
pub fn gsp_direction(processing: &str, svc_id: &str, gsp_id: &str) -> String {
    let len = processing.chars().count();
    let product = family(gsp_id).map(|(_, product)| product);
    match svc_id {
        "SE-S3-01" => match product {
            Some(3 | 4) => char_at(processing, 3),
            _ => char_at(processing, 6),
        },
        "SE-S3-02" if len == 5 => char_at(processing, 4),
        "SE-S3-02" | "SE-S3-04" => char_at(processing, 6),
        "SE-S3-03" if len > 13 => char_at(processing, 9),
        "SE-S3-03" => char_at(processing, 6),
        "SE-S3-05" if len >= 11 => char_at(processing, 9),
        "SE-S3-05" => char_at(processing, 6),
        "SE-S3-06" if len >= 14 => char_at(processing, 9),
        "SE-S3-06" if len <= 8 => "NA".to_string(),
        "SE-S3-06" => char_at(processing, 6),
        _ => "NA".to_string(),
    }
}

/// Calibration flag (`Yes`, `No` or `NA`) of a delivered product
pub fn gsp_calibrated(processing: &str, svc_id: &str, gsp_id: &str) -> String {
    let len = processing.chars().count();
    let flag = |index: usize, calibrated: &[char]| -> String {
        match processing.chars().nth(index) {
            Some(c) if calibrated.contains(&c) => "Yes".to_string(),
            Some(_) => "No".to_string(),
            None => "NA".to_string(),
        }
    };
    let product = family(gsp_id).map(|(_, product)| product);

    match svc_id {
        "SE-S3-01" => match product {
            Some(2..=4) => "Yes".to_string(),
            _ => "No".to_string(),
        },
        "SE-S3-02" if len == 5 || processing.ends_with('C') => "Yes".to_string(),
        "SE-S3-02" => "No".to_string(),
        "SE-S3-03" if len == 9 || product == Some(4) => flag(7, &['O', 'C']),
        "SE-S3-03" => flag(10, &['O', 'C']),
        "SE-S3-04" => "No".to_string(),
        "SE-S3-05" if len <= 10 => flag(7, &['M', 'C']),
        "SE-S3-05" => flag(10, &['M', 'C']),
        "SE-S3-06" => match len {
            8 => flag(6, &['O', 'C']),
            9 | 11 | 13 => flag(7, &['O', 'C']),
            _ => flag(10, &['O', 'C']),
        },
        _ => "NA".to_string(),
    }
}
