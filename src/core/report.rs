//! Delivery report of the products uploaded to the delivery bucket.
//!
//! Object keys follow `<root>/<svc>/<sensor>/<start>_<end>/<aoi>/<gsp>/.../<product>`.

use crate::core::aoi::aoi_info;
use crate::core::gsp::{gsp_calibrated, gsp_data_type, gsp_description, gsp_direction};
use crate::types::{PackError, PackResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Key suffixes that are not products
const SKIP_SUFFIXES: [&str; 3] = ["DS_Store", "qml", "sld"];

const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Comma separated
    #[default]
    Csv,
    /// Tab separated
    Txt,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Txt => "txt",
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            ReportFormat::Csv => b',',
            ReportFormat::Txt => b'\t',
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "txt" => Ok(ReportFormat::Txt),
            "xlsx" => Err("xlsx reports are not supported, use csv or txt".to_string()),
            other => Err(format!("Invalid report format: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Keep only keys containing this string; every key when unset
    pub sub_dir: Option<String>,
    pub out_dir: PathBuf,
    pub format: ReportFormat,
    pub delivery_date: NaiveDate,
    /// Date stamped into the report file name
    pub report_date: NaiveDate,
}

impl ReportConfig {
    pub fn report_path(&self) -> PathBuf {
        self.out_dir.join(format!(
            "Lot-2_GSP_Delivery_Report-{}.{}",
            self.report_date.format("%Y%m%d"),
            self.format.extension()
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "SVC_ID")]
    pub svc_id: String,
    #[serde(rename = "GSP_ID")]
    pub gsp_id: String,
    #[serde(rename = "AOI")]
    pub aoi: String,
    #[serde(rename = "GSP_Path")]
    pub gsp_path: String,
    #[serde(rename = "Start_Date")]
    pub start_date: String,
    #[serde(rename = "End_Date")]
    pub end_date: String,
    #[serde(rename = "Sensor")]
    pub sensor: String,
    #[serde(rename = "Data_Type")]
    pub data_type: String,
    #[serde(rename = "Scheduled_Delivery_Date")]
    pub scheduled_delivery_date: String,
    #[serde(rename = "Delivery_Date")]
    pub delivery_date: String,
    #[serde(rename = "GSP_Name")]
    pub gsp_name: String,
    #[serde(rename = "Direction")]
    pub direction: String,
    #[serde(rename = "Calibrated")]
    pub calibrated: String,
}

/// Whether a key names a directory or a styling side file
fn is_skipped(key: &str) -> bool {
    if key.ends_with('/') {
        return true;
    }
    let suffix = key.rsplit('.').next().unwrap_or(key);
    SKIP_SUFFIXES.contains(&suffix)
}

/// 15th of the month encoded as `YYYYMM...` at the start of `token`
fn mid_month(token: &str, key: &str) -> PackResult<String> {
    let invalid = || PackError::InvalidFormat(format!("invalid reference period in key {}", key));
    let year: i32 = token.get(0..4).and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
    let month: u32 = token.get(4..6).and_then(|m| m.parse().ok()).ok_or_else(invalid)?;
    let date = NaiveDate::from_ymd_opt(year, month, 15).ok_or_else(invalid)?;
    Ok(date.format(DATE_FORMAT).to_string())
}

fn scheduled_delivery(svc_id: &str) -> &'static str {
    if svc_id == "SE-S3-01" {
        "01/02/2024"
    } else {
        "15/02/2024"
    }
}

/// Report row for one object key; `None` for keys that are not products
pub fn parse_key(key: &str, delivery_date: NaiveDate) -> PackResult<Option<ReportRow>> {
    let key = key.trim();
    if key.is_empty() || is_skipped(key) {
        return Ok(None);
    }

    let parts: Vec<&str> = key.split('/').collect();
    if parts.len() < 7 {
        return Err(PackError::InvalidFormat(format!("unexpected object key layout: {}", key)));
    }
    let (svc_id, sensor, period) = (parts[1], parts[2], parts[3]);
    let (aoi_id, gsp_id) = (parts[4], parts[5]);
    let product = parts[parts.len() - 1];

    let mut dates = period.split('_');
    let start_date = mid_month(dates.next().unwrap_or(""), key)?;
    let end_date = mid_month(dates.next().unwrap_or(""), key)?;

    let processing = product.split('_').nth(4).unwrap_or("");
    let aoi = aoi_info(aoi_id)?;

    Ok(Some(ReportRow {
        svc_id: svc_id.to_string(),
        gsp_id: gsp_id.to_string(),
        aoi: aoi.name.to_string(),
        gsp_path: key.to_string(),
        start_date,
        end_date,
        sensor: sensor.to_string(),
        data_type: gsp_data_type(gsp_id).to_string(),
        scheduled_delivery_date: scheduled_delivery(svc_id).to_string(),
        delivery_date: delivery_date.format(DATE_FORMAT).to_string(),
        gsp_name: gsp_description(gsp_id).to_string(),
        direction: gsp_direction(processing, svc_id, gsp_id),
        calibrated: gsp_calibrated(processing, svc_id, gsp_id),
    }))
}

/// Report rows for every product key, in listing order
pub fn build_report<'a, I>(keys: I, config: &ReportConfig) -> PackResult<Vec<ReportRow>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut rows = Vec::new();
    for key in keys {
        if let Some(sub_dir) = &config.sub_dir {
            if !key.contains(sub_dir.as_str()) {
                continue;
            }
        }
        if let Some(row) = parse_key(key, config.delivery_date)? {
            log::debug!("{} -> {} {}", key, row.svc_id, row.gsp_id);
            rows.push(row);
        }
    }
    log::info!("{} products listed", rows.len());
    Ok(rows)
}

/// Read a listing with one object key per line
pub fn read_listing<P: AsRef<Path>>(path: P) -> PackResult<Vec<String>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(content.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Write the report to `ReportConfig::report_path`
pub fn write_report(rows: &[ReportRow], config: &ReportConfig) -> PackResult<PathBuf> {
    std::fs::create_dir_all(&config.out_dir)?;
    let path = config.report_path();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(config.format.delimiter())
        .from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    log::info!("Report saved to {}", path.display());
    Ok(path)
}
