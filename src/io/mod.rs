//! I/O: vector layers, product archives, point datasets and product packaging

pub mod archive;
pub mod package;
pub mod points;
pub mod vector;

pub use archive::{flatten_archive, ProductArchive, ProductMetadata};
pub use package::{package_product, XmlElement};
pub use points::read_point_table;
pub use vector::{FieldDef, VectorFeature, VectorLayer};
