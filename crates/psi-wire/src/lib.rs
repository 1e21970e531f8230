#![warn(clippy::pedantic)]

pub mod error;
pub mod header;
pub mod markers;

pub use error::WireError;
pub use header::{BoundingBox, Header, RecordLayout, RegionMarker, parse_header};
