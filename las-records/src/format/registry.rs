//! Field lists of all known record formats.
//!
//! The order of the fields in this module *is* the binary layout of the
//! respective records: Offsets are derived by appending the fields one after
//! another, without any padding.

use super::field::{DataType, FieldOptions};
use super::{RecordSchema, SchemaBuilder};
use crate::error::{LasError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// Point data record formats 0-5.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PointFormat {
    Format0,
    Format1,
    Format2,
    Format3,
    Format4,
    Format5,
}

impl PointFormat {
    pub const ALL: [PointFormat; 6] = [
        PointFormat::Format0,
        PointFormat::Format1,
        PointFormat::Format2,
        PointFormat::Format3,
        PointFormat::Format4,
        PointFormat::Format5,
    ];

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(PointFormat::Format0),
            1 => Ok(PointFormat::Format1),
            2 => Ok(PointFormat::Format2),
            3 => Ok(PointFormat::Format3),
            4 => Ok(PointFormat::Format4),
            5 => Ok(PointFormat::Format5),
            _ => Err(LasError::UnknownPointFormat(id)),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            PointFormat::Format0 => 0,
            PointFormat::Format1 => 1,
            PointFormat::Format2 => 2,
            PointFormat::Format3 => 3,
            PointFormat::Format4 => 4,
            PointFormat::Format5 => 5,
        }
    }

    /// Size of a point record in bytes, as defined by the LAS specification.
    pub fn record_length(&self) -> usize {
        match self {
            PointFormat::Format0 => 20,
            PointFormat::Format1 => 28,
            PointFormat::Format2 => 26,
            PointFormat::Format3 => 34,
            PointFormat::Format4 => 57,
            PointFormat::Format5 => 63,
        }
    }

    pub fn has_gps_time(&self) -> bool {
        !matches!(self, PointFormat::Format0 | PointFormat::Format2)
    }

    pub fn has_color(&self) -> bool {
        matches!(
            self,
            PointFormat::Format2 | PointFormat::Format3 | PointFormat::Format5
        )
    }

    pub fn has_waveform(&self) -> bool {
        matches!(self, PointFormat::Format4 | PointFormat::Format5)
    }
}

/// LAS header versions 1.0 - 1.3.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum HeaderVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
}

impl HeaderVersion {
    pub fn from_minor(minor: u8) -> Result<Self> {
        match minor {
            0 => Ok(HeaderVersion::V1_0),
            1 => Ok(HeaderVersion::V1_1),
            2 => Ok(HeaderVersion::V1_2),
            3 => Ok(HeaderVersion::V1_3),
            _ => Err(LasError::UnknownFormat {
                id: format!("h1.{minor}"),
            }),
        }
    }

    pub fn minor(&self) -> u8 {
        match self {
            HeaderVersion::V1_0 => 0,
            HeaderVersion::V1_1 => 1,
            HeaderVersion::V1_2 => 2,
            HeaderVersion::V1_3 => 3,
        }
    }

    /// Number of entries in the "number of points by return" array.
    pub fn returns_tracked(&self) -> usize {
        match self {
            HeaderVersion::V1_3 => 7,
            _ => 5,
        }
    }
}

/// Identifies the layout of a record: A point format, a VLR header or a file header.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FormatId {
    Point(PointFormat),
    Vlr,
    Header(HeaderVersion),
}

impl FormatId {
    /// The short identifier (`"0"`-`"5"`, `"VLR"`, `"h1.0"`-`"h1.3"`).
    pub fn identifier(&self) -> String {
        match self {
            FormatId::Point(format) => format.id().to_string(),
            FormatId::Vlr => "VLR".to_string(),
            FormatId::Header(version) => format!("h1.{}", version.minor()),
        }
    }

    /// The size a record of this format must have, if the LAS specification fixes it.
    pub fn canonical_record_length(&self) -> Option<usize> {
        match self {
            FormatId::Point(format) => Some(format.record_length()),
            FormatId::Vlr | FormatId::Header(_) => None,
        }
    }
}

impl FromStr for FormatId {
    type Err = LasError;

    fn from_str(s: &str) -> Result<Self> {
        let id = match s {
            "0" => FormatId::Point(PointFormat::Format0),
            "1" => FormatId::Point(PointFormat::Format1),
            "2" => FormatId::Point(PointFormat::Format2),
            "3" => FormatId::Point(PointFormat::Format3),
            "4" => FormatId::Point(PointFormat::Format4),
            "5" => FormatId::Point(PointFormat::Format5),
            "VLR" => FormatId::Vlr,
            "h1.0" => FormatId::Header(HeaderVersion::V1_0),
            "h1.1" => FormatId::Header(HeaderVersion::V1_1),
            "h1.2" => FormatId::Header(HeaderVersion::V1_2),
            "h1.3" => FormatId::Header(HeaderVersion::V1_3),
            _ => return Err(LasError::UnknownFormat { id: s.to_string() }),
        };
        Ok(id)
    }
}

impl Display for FormatId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatId::Point(format) => write!(f, "point format = {}", format.id()),
            FormatId::Vlr => write!(f, "VLR"),
            FormatId::Header(version) => write!(f, "header version = 1.{}", version.minor()),
        }
    }
}

pub(super) fn populate(id: FormatId, builder: &mut SchemaBuilder) -> Result<()> {
    match id {
        FormatId::Point(format) => point_fields(format, builder),
        FormatId::Vlr => vlr_fields(builder),
        FormatId::Header(version) => header_fields(version, builder),
    }
}

fn point_fields(format: PointFormat, b: &mut SchemaBuilder) -> Result<()> {
    b.add("X", DataType::I32, 1)?;
    b.add("Y", DataType::I32, 1)?;
    b.add("Z", DataType::I32, 1)?;
    b.add("intensity", DataType::U16, 1)?;
    b.add("flag_byte", DataType::U8, 1)?;
    b.add("raw_classification", DataType::U8, 1)?;
    b.add("scan_angle_rank", DataType::U8, 1)?;
    b.add("user_data", DataType::U8, 1)?;
    b.add("pt_src_id", DataType::U16, 1)?;
    if format.has_gps_time() {
        b.add("gps_time", DataType::F64, 1)?;
    }
    if format.has_color() {
        b.add("red", DataType::U16, 1)?;
        b.add("green", DataType::U16, 1)?;
        b.add("blue", DataType::U16, 1)?;
    }
    if format.has_waveform() {
        b.add("wave_packet_descp_idx", DataType::U8, 1)?;
        b.add("byte_offset_to_wavefm_data", DataType::U64, 1)?;
        b.add("wavefm_pkt_size", DataType::I32, 1)?;
        b.add("return_pt_wavefm_loc", DataType::F32, 1)?;
        b.add("x_t", DataType::F32, 1)?;
        b.add("y_t", DataType::F32, 1)?;
        b.add("z_t", DataType::F32, 1)?;
    }
    Ok(())
}

fn vlr_fields(b: &mut SchemaBuilder) -> Result<()> {
    b.add("reserved", DataType::U16, 1)?;
    b.add("user_id", DataType::Char, 16)?;
    b.add("record_id", DataType::U16, 1)?;
    b.add("payload_length", DataType::U16, 1)?;
    b.add_with("description", DataType::Char, 32, text())?;
    Ok(())
}

fn header_fields(version: HeaderVersion, b: &mut SchemaBuilder) -> Result<()> {
    // these fields define the structure of the file
    // and can not be changed once it is written.
    let fixed = FieldOptions {
        mutable: false,
        ..Default::default()
    };

    b.add_with(
        "file_sig",
        DataType::Char,
        4,
        FieldOptions {
            text_concatenated: true,
            mutable: false,
            ..Default::default()
        },
    )?;
    b.add("file_src", DataType::U16, 1)?;
    b.add("global_encoding", DataType::U16, 1)?;
    b.add("proj_id_1", DataType::U32, 1)?;
    b.add("proj_id_2", DataType::U16, 1)?;
    b.add("proj_id_3", DataType::U16, 1)?;
    b.add("proj_id_4", DataType::U8, 8)?;
    b.add_with("version_major", DataType::U8, 1, fixed)?;
    b.add_with("version_minor", DataType::U8, 1, fixed)?;
    b.add_with("sys_id", DataType::Char, 32, text())?;
    b.add_with("gen_soft", DataType::Char, 32, text())?;
    b.add("created_day", DataType::U16, 1)?;
    b.add("created_year", DataType::U16, 1)?;
    b.add_with("header_size", DataType::U16, 1, fixed)?;
    b.add("offset_to_point_data", DataType::U32, 1)?;
    b.add("num_variable_len_recs", DataType::U32, 1)?;
    b.add_with("pt_dat_format_id", DataType::U8, 1, fixed)?;
    b.add("pt_dat_rec_len", DataType::U16, 1)?;
    b.add("num_pt_recs", DataType::U32, 1)?;
    b.add("num_pts_by_return", DataType::U32, version.returns_tracked())?;
    b.add("x_scale", DataType::F64, 1)?;
    b.add("y_scale", DataType::F64, 1)?;
    b.add("z_scale", DataType::F64, 1)?;
    b.add("x_offset", DataType::F64, 1)?;
    b.add("y_offset", DataType::F64, 1)?;
    b.add("z_offset", DataType::F64, 1)?;
    // max before min, per axis
    b.add("x_max", DataType::F64, 1)?;
    b.add("x_min", DataType::F64, 1)?;
    b.add("y_max", DataType::F64, 1)?;
    b.add("y_min", DataType::F64, 1)?;
    b.add("z_max", DataType::F64, 1)?;
    b.add("z_min", DataType::F64, 1)?;
    Ok(())
}

fn text() -> FieldOptions {
    FieldOptions {
        text_concatenated: true,
        ..Default::default()
    }
}

/// Cache of built schemas, so that each format is only built once
/// and can be shared between all records of that format.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Mutex<HashMap<FormatId, Arc<RecordSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FormatId) -> Result<Arc<RecordSchema>> {
        let mut schemas = self.schemas.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(schema) = schemas.get(&id) {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(RecordSchema::new(id)?);
        schemas.insert(id, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get_by_identifier(&self, id: &str) -> Result<Arc<RecordSchema>> {
        self.get(id.parse()?)
    }

    pub fn point_format(&self, format: PointFormat) -> Result<Arc<RecordSchema>> {
        self.get(FormatId::Point(format))
    }

    pub fn header(&self, version: HeaderVersion) -> Result<Arc<RecordSchema>> {
        self.get(FormatId::Header(version))
    }

    pub fn vlr(&self) -> Result<Arc<RecordSchema>> {
        self.get(FormatId::Vlr)
    }
}

#[cfg(test)]
mod tests {
    use super::{FormatId, HeaderVersion, PointFormat, SchemaRegistry};
    use crate::error::LasError;
    use std::sync::Arc;

    #[test]
    fn test_parse_identifiers() {
        for id in ["0", "1", "2", "3", "4", "5", "VLR", "h1.0", "h1.1", "h1.2", "h1.3"] {
            let format: FormatId = id.parse().unwrap();
            assert_eq!(format.identifier(), id);
        }
        for id in ["9", "6", "vlr", "h1.4", "h2.0", ""] {
            let result = id.parse::<FormatId>();
            assert!(matches!(result, Err(LasError::UnknownFormat { .. })), "{id}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            FormatId::Point(PointFormat::Format3).to_string(),
            "point format = 3"
        );
        assert_eq!(FormatId::Vlr.to_string(), "VLR");
        assert_eq!(
            FormatId::Header(HeaderVersion::V1_2).to_string(),
            "header version = 1.2"
        );
    }

    #[test]
    fn test_point_format_ids() {
        for format in PointFormat::ALL {
            assert_eq!(PointFormat::from_id(format.id()).unwrap(), format);
        }
        assert!(matches!(
            PointFormat::from_id(6),
            Err(LasError::UnknownPointFormat(6))
        ));
    }

    #[test]
    fn test_header_versions() {
        assert_eq!(HeaderVersion::from_minor(3).unwrap(), HeaderVersion::V1_3);
        assert!(matches!(
            HeaderVersion::from_minor(4),
            Err(LasError::UnknownFormat { id }) if id == "h1.4"
        ));
    }

    #[test]
    fn test_registry_reuses_schemas() {
        let registry = SchemaRegistry::new();
        let a = registry.point_format(PointFormat::Format1).unwrap();
        let b = registry.get_by_identifier("1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let vlr = registry.vlr().unwrap();
        assert!(!Arc::ptr_eq(&a, &vlr));
        assert!(registry.get_by_identifier("VLR ").is_err());
    }
}
