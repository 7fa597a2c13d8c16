//! sarpack: AOI indexing and delivery packaging for Sentinel-1 deformation products
//!
//! Selects the burst footprints and 2D deformation tiles covering an area of
//! interest, merges the matching point products per track, calibration type or
//! deformation component, and packages them with their GSP metadata.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AttrValue, BoundingBox, CalibrationType, Component, OrbitDirection, OutputFormat,
    PackError, PackResult,
};

pub use crate::core::{
    index_bursts, index_tiles, merge_bursts, merge_tiles, BurstIndexConfig, MergeConfig,
    TileIndexConfig,
};
