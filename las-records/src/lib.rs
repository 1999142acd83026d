#![deny(unused_must_use)]

//! Record layouts and codec for the binary records of LAS 1.0 - 1.3 files:
//! the public header block, variable length record headers and point records
//! in point data formats 0 - 5.

pub mod coordinate_system;
pub mod error;
pub mod format;
pub mod header;
pub mod io;
pub mod reader;
pub mod record;
pub mod settings;
pub mod vlr;

pub use error::{LasError, Result};
pub use format::{FormatId, HeaderVersion, PointFormat, RecordSchema, SchemaRegistry, Value};
pub use header::Header;
pub use reader::LasReader;
pub use record::Record;
pub use settings::CodecSettings;
pub use vlr::VlrHeader;

pub use nalgebra;
