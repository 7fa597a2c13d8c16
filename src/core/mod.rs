//! Core indexing, merging and reporting modules

pub mod aoi;
pub mod gsp;
pub mod index;
pub mod merge;
pub mod report;
pub mod table;

// Re-export main types
pub use aoi::{aoi_info, AoiInfo, AreaOfInterest};
pub use index::{index_bursts, index_tiles, BurstIndexConfig, IndexSummary, TileIndexConfig};
pub use merge::{merge_bursts, merge_tiles, MergeConfig, MergedProduct};
pub use report::{build_report, write_report, ReportConfig, ReportFormat, ReportRow};
pub use table::PointTable;
