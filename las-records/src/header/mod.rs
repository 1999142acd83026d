//! The public header block of a LAS file.

use crate::coordinate_system::CoordinateSystem;
use crate::error::{LasError, Result};
use crate::format::{FormatId, HeaderVersion, PointFormat, RecordSchema, SchemaRegistry, Value};
use crate::io::ReadAt;
use crate::record::Record;
use crate::settings::{CodecSettings, SetterPolicy};
use crate::vlr::VlrHeader;
use chrono::NaiveDate;
use log::debug;
use nalgebra::Vector3;
use std::sync::Arc;

pub mod date;

pub const FILE_SIGNATURE: &str = "LASF";

/// Bits of the global encoding field.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct GlobalEncoding {
    /// GPS time is adjusted standard GPS time, rather than GPS week time.
    pub gps_time_type: bool,
    pub waveform_data_internal: bool,
    pub waveform_data_external: bool,
    pub synthetic_return_numbers: bool,
}

impl GlobalEncoding {
    pub fn from_bits(bits: u16) -> Self {
        GlobalEncoding {
            gps_time_type: bits & 0x01 != 0,
            waveform_data_internal: bits & 0x02 != 0,
            waveform_data_external: bits & 0x04 != 0,
            synthetic_return_numbers: bits & 0x08 != 0,
        }
    }

    pub fn to_bits(&self) -> u16 {
        u16::from(self.gps_time_type)
            | u16::from(self.waveform_data_internal) << 1
            | u16::from(self.waveform_data_external) << 2
            | u16::from(self.synthetic_return_numbers) << 3
    }
}

/// Read access to the header of a LAS file.
///
/// All properties are computed from the decoded header record on each access.
///
/// The setters never change the header: Persisting them would require rewriting
/// the file around the header, which is the job of whoever owns the byte stream.
/// Depending on [CodecSettings::setter_policy], they either do nothing, or fail
/// with [LasError::NotImplemented].
#[derive(Debug, Clone)]
pub struct Header {
    record: Record,
    version: HeaderVersion,
    settings: CodecSettings,
}

impl Header {
    /// Wraps a decoded header record.
    pub fn from_record(record: Record, settings: CodecSettings) -> Result<Self> {
        if !record.is_decoded() {
            return Err(LasError::NotDecoded);
        }
        let version = match record.schema().format_id() {
            FormatId::Header(version) => version,
            other => {
                return Err(LasError::UnknownFormat {
                    id: other.identifier(),
                })
            }
        };
        let header = Header {
            record,
            version,
            settings,
        };
        if settings.verify_signature {
            let found = header.file_signature()?;
            if found != FILE_SIGNATURE {
                return Err(LasError::BadSignature { found });
            }
        }
        Ok(header)
    }

    pub fn decode(schema: Arc<RecordSchema>, data: &[u8], settings: CodecSettings) -> Result<Self> {
        Self::from_record(Record::decode(schema, data)?, settings)
    }

    /// Reads the header from the start of the byte stream.
    ///
    /// The header layout is picked based on the minor version stored in the file.
    pub fn read_from<S: ReadAt + ?Sized>(
        source: &mut S,
        registry: &SchemaRegistry,
        settings: CodecSettings,
    ) -> Result<Self> {
        // the version bytes are at the same position in all header versions
        let minor_range = registry
            .header(HeaderVersion::V1_0)?
            .field("version_minor")?
            .byte_range();
        let prefix = source.read_vec_at(0, minor_range.end)?;
        let version = HeaderVersion::from_minor(prefix[minor_range.start])?;

        let schema = registry.header(version)?;
        let data = source.read_vec_at(0, schema.record_length())?;
        debug!("Read header of {} bytes, {}", data.len(), schema.format_id());
        Self::decode(schema, &data, settings)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    pub fn header_version(&self) -> HeaderVersion {
        self.version
    }

    fn value(&self, name: &str) -> Result<&Value> {
        self.record.get(name)
    }

    fn mismatch(name: &str, expected: &str) -> LasError {
        LasError::ValueMismatch {
            field: name.to_string(),
            expected: expected.to_string(),
        }
    }

    fn u8_field(&self, name: &str) -> Result<u8> {
        self.value(name)?.as_u8().ok_or_else(|| Self::mismatch(name, "u8"))
    }

    fn u16_field(&self, name: &str) -> Result<u16> {
        self.value(name)?
            .as_u16()
            .ok_or_else(|| Self::mismatch(name, "u16"))
    }

    fn u32_field(&self, name: &str) -> Result<u32> {
        self.value(name)?
            .as_u32()
            .ok_or_else(|| Self::mismatch(name, "u32"))
    }

    fn f64_field(&self, name: &str) -> Result<f64> {
        self.value(name)?
            .as_f64()
            .ok_or_else(|| Self::mismatch(name, "f64"))
    }

    fn text_field(&self, name: &str) -> Result<String> {
        self.value(name)?
            .as_text()
            .ok_or_else(|| Self::mismatch(name, "text"))
    }

    fn triple(&self, suffix: &str) -> Result<Vector3<f64>> {
        Ok(Vector3::new(
            self.f64_field(&format!("x{suffix}"))?,
            self.f64_field(&format!("y{suffix}"))?,
            self.f64_field(&format!("z{suffix}"))?,
        ))
    }

    /// Should always be "LASF".
    pub fn file_signature(&self) -> Result<String> {
        self.text_field("file_sig")
    }

    pub fn file_source_id(&self) -> Result<u16> {
        self.u16_field("file_src")
    }

    pub fn global_encoding(&self) -> Result<u16> {
        self.u16_field("global_encoding")
    }

    pub fn global_encoding_flags(&self) -> Result<GlobalEncoding> {
        Ok(GlobalEncoding::from_bits(self.global_encoding()?))
    }

    /// The four parts of the project id (GUID).
    pub fn project_id_parts(&self) -> Result<(u32, u16, u16, [u8; 8])> {
        let mut part_4 = [0; 8];
        let values = self
            .value("proj_id_4")?
            .as_array()
            .ok_or_else(|| Self::mismatch("proj_id_4", "8 x u8"))?;
        if values.len() != part_4.len() {
            return Err(Self::mismatch("proj_id_4", "8 x u8"));
        }
        for (byte, value) in part_4.iter_mut().zip(values) {
            *byte = value
                .as_u8()
                .ok_or_else(|| Self::mismatch("proj_id_4", "8 x u8"))?;
        }
        Ok((
            self.u32_field("proj_id_1")?,
            self.u16_field("proj_id_2")?,
            self.u16_field("proj_id_3")?,
            part_4,
        ))
    }

    /// The project id in GUID notation.
    pub fn project_id(&self) -> Result<String> {
        let (a, b, c, d) = self.project_id_parts()?;
        let tail: String = d[2..].iter().map(|byte| format!("{byte:02x}")).collect();
        Ok(format!(
            "{a:08x}-{b:04x}-{c:04x}-{:02x}{:02x}-{tail}",
            d[0], d[1]
        ))
    }

    pub fn version_major(&self) -> Result<u8> {
        self.u8_field("version_major")
    }

    pub fn version_minor(&self) -> Result<u8> {
        self.u8_field("version_minor")
    }

    /// Dotted version string, like "1.2".
    pub fn version(&self) -> Result<String> {
        Ok(format!("{}.{}", self.version_major()?, self.version_minor()?))
    }

    pub fn system_id(&self) -> Result<String> {
        self.text_field("sys_id")
    }

    pub fn software_id(&self) -> Result<String> {
        self.text_field("gen_soft")
    }

    pub fn created_day(&self) -> Result<u16> {
        self.u16_field("created_day")
    }

    pub fn created_year(&self) -> Result<u16> {
        self.u16_field("created_year")
    }

    /// Creation date of the file, or None, if no date is set.
    pub fn created_date(&self) -> Result<Option<NaiveDate>> {
        Ok(date::decode_date(
            self.created_year()?,
            self.created_day()?,
            self.settings.leap_year_rule,
        ))
    }

    /// Size of the header block in bytes, as stored in the file.
    pub fn header_size(&self) -> Result<u16> {
        self.u16_field("header_size")
    }

    /// Offset from the start of the file to the first point record.
    pub fn data_offset(&self) -> Result<u32> {
        self.u32_field("offset_to_point_data")
    }

    pub fn num_vlrs(&self) -> Result<u32> {
        self.u32_field("num_variable_len_recs")
    }

    pub fn data_format_id(&self) -> Result<u8> {
        self.u8_field("pt_dat_format_id")
    }

    pub fn point_format(&self) -> Result<PointFormat> {
        PointFormat::from_id(self.data_format_id()?)
    }

    /// Length of a point record as stored in the header.
    /// This can be larger than [Header::point_record_length], if the points carry extra bytes.
    pub fn data_record_length(&self) -> Result<u16> {
        self.u16_field("pt_dat_rec_len")
    }

    /// Length of a point record according to the point format.
    pub fn point_record_length(&self) -> Result<usize> {
        Ok(self.point_format()?.record_length())
    }

    pub fn point_records_count(&self) -> Result<u32> {
        self.u32_field("num_pt_recs")
    }

    /// Number of points by return number (5 entries up to LAS 1.2, 7 for LAS 1.3).
    pub fn point_return_count(&self) -> Result<Vec<u32>> {
        let values = self
            .value("num_pts_by_return")?
            .as_array()
            .ok_or_else(|| Self::mismatch("num_pts_by_return", "array of u32"))?;
        values
            .iter()
            .map(|v| {
                v.as_u32()
                    .ok_or_else(|| Self::mismatch("num_pts_by_return", "array of u32"))
            })
            .collect()
    }

    pub fn scale(&self) -> Result<Vector3<f64>> {
        self.triple("_scale")
    }

    pub fn offset(&self) -> Result<Vector3<f64>> {
        self.triple("_offset")
    }

    pub fn min(&self) -> Result<Vector3<f64>> {
        self.triple("_min")
    }

    pub fn max(&self) -> Result<Vector3<f64>> {
        self.triple("_max")
    }

    pub fn coordinate_system(&self) -> Result<CoordinateSystem> {
        Ok(CoordinateSystem::from_las_transform(
            self.scale()?,
            self.offset()?,
        ))
    }

    /// The schema of the point records of this file.
    pub fn point_schema(&self, registry: &SchemaRegistry) -> Result<Arc<RecordSchema>> {
        registry.point_format(self.point_format()?)
    }

    fn unsupported(&self, property: &'static str) -> Result<()> {
        match self.settings.setter_policy {
            SetterPolicy::Ignore => {
                debug!("Ignoring change of header {property}.");
                Ok(())
            }
            SetterPolicy::Reject => Err(LasError::NotImplemented { property }),
        }
    }

    pub fn set_version(&mut self, _version: &str) -> Result<()> {
        self.unsupported("version")
    }

    pub fn set_scale(&mut self, _scale: Vector3<f64>) -> Result<()> {
        self.unsupported("scale")
    }

    pub fn set_offset(&mut self, _offset: Vector3<f64>) -> Result<()> {
        self.unsupported("offset")
    }

    pub fn set_min(&mut self, _min: Vector3<f64>) -> Result<()> {
        self.unsupported("min")
    }

    pub fn set_max(&mut self, _max: Vector3<f64>) -> Result<()> {
        self.unsupported("max")
    }

    pub fn set_date(&mut self, date: NaiveDate) -> Result<()> {
        if let Some((year, day)) = date::encode_date(date, self.settings.leap_year_rule) {
            debug!("Requested creation date {date} would be stored as year {year}, day {day}.");
        }
        self.unsupported("date")
    }

    pub fn set_system_id(&mut self, _system_id: &str) -> Result<()> {
        self.unsupported("system id")
    }

    pub fn set_software_id(&mut self, _software_id: &str) -> Result<()> {
        self.unsupported("software id")
    }

    pub fn set_file_source_id(&mut self, _file_source_id: u16) -> Result<()> {
        self.unsupported("file source id")
    }

    pub fn set_global_encoding(&mut self, _global_encoding: u16) -> Result<()> {
        self.unsupported("global encoding")
    }

    pub fn set_vlrs(&mut self, _vlrs: Vec<VlrHeader>) -> Result<()> {
        self.unsupported("variable length records")
    }

    pub fn set_srs(&mut self, _wkt: &str) -> Result<()> {
        self.unsupported("spatial reference system")
    }

    pub fn set_schema(&mut self, _format: PointFormat) -> Result<()> {
        self.unsupported("point schema")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{GlobalEncoding, Header};
    use crate::error::LasError;
    use crate::format::{HeaderVersion, PointFormat, SchemaRegistry, Value};
    use crate::header::date::LeapYearRule;
    use crate::record::Record;
    use crate::settings::{CodecSettings, SetterPolicy};
    use chrono::NaiveDate;
    use nalgebra::Vector3;
    use std::io::Cursor;

    /// Builds the bytes of a header with some typical values.
    pub fn sample_header_bytes(version: HeaderVersion, edit: &[(&str, Value)]) -> Vec<u8> {
        let registry = SchemaRegistry::new();
        let schema = registry.header(version).unwrap();
        let mut record = Record::with_defaults(schema.clone());
        let returns = vec![Value::U32(3); version.returns_tracked()];
        let defaults = [
            ("file_sig", Value::Text("LASF".to_string())),
            ("file_src", Value::U16(12)),
            ("global_encoding", Value::U16(0b1001)),
            ("proj_id_1", Value::U32(0xDEADBEEF)),
            ("proj_id_2", Value::U16(0x0102)),
            ("proj_id_3", Value::U16(0x0A0B)),
            (
                "proj_id_4",
                Value::Array((1..=8).map(Value::U8).collect()),
            ),
            ("version_major", Value::U8(1)),
            ("version_minor", Value::U8(version.minor())),
            ("sys_id", Value::Text("LIDARSERV".to_string())),
            ("gen_soft", Value::Text("las-records test".to_string())),
            ("created_day", Value::U16(79)),
            ("created_year", Value::U16(2008)),
            ("header_size", Value::U16(schema.record_length() as u16)),
            ("offset_to_point_data", Value::U32(schema.record_length() as u32)),
            ("num_variable_len_recs", Value::U32(0)),
            ("pt_dat_format_id", Value::U8(1)),
            ("pt_dat_rec_len", Value::U16(28)),
            ("num_pt_recs", Value::U32(15)),
            ("num_pts_by_return", Value::Array(returns)),
            ("x_scale", Value::F64(0.01)),
            ("y_scale", Value::F64(0.02)),
            ("z_scale", Value::F64(0.001)),
            ("x_offset", Value::F64(100.0)),
            ("y_offset", Value::F64(200.0)),
            ("z_offset", Value::F64(-5.0)),
            ("x_max", Value::F64(110.0)),
            ("x_min", Value::F64(90.0)),
            ("y_max", Value::F64(220.0)),
            ("y_min", Value::F64(180.0)),
            ("z_max", Value::F64(50.0)),
            ("z_min", Value::F64(-50.0)),
        ];
        for (name, value) in defaults.into_iter().chain(edit.iter().cloned()) {
            record.set(name, value).unwrap();
        }
        record.pack().unwrap()
    }

    fn sample_header(version: HeaderVersion, settings: CodecSettings) -> Header {
        let data = sample_header_bytes(version, &[]);
        let registry = SchemaRegistry::new();
        Header::read_from(&mut Cursor::new(data), &registry, settings).unwrap()
    }

    #[test]
    fn test_derived_properties() {
        let header = sample_header(HeaderVersion::V1_2, CodecSettings::default());
        assert_eq!(header.header_version(), HeaderVersion::V1_2);
        assert_eq!(header.file_signature().unwrap(), "LASF");
        assert_eq!(header.version().unwrap(), "1.2");
        assert_eq!(header.scale().unwrap(), Vector3::new(0.01, 0.02, 0.001));
        assert_eq!(header.offset().unwrap(), Vector3::new(100.0, 200.0, -5.0));
        assert_eq!(header.min().unwrap(), Vector3::new(90.0, 180.0, -50.0));
        assert_eq!(header.max().unwrap(), Vector3::new(110.0, 220.0, 50.0));
        assert_eq!(header.system_id().unwrap(), "LIDARSERV");
        assert_eq!(header.software_id().unwrap(), "las-records test");
        assert_eq!(header.file_source_id().unwrap(), 12);
        assert_eq!(header.header_size().unwrap(), 227);
        assert_eq!(header.data_offset().unwrap(), 227);
        assert_eq!(header.num_vlrs().unwrap(), 0);
        assert_eq!(header.point_format().unwrap(), PointFormat::Format1);
        assert_eq!(header.point_record_length().unwrap(), 28);
        assert_eq!(header.point_records_count().unwrap(), 15);
        assert_eq!(header.point_return_count().unwrap(), vec![3; 5]);
        assert_eq!(
            header.project_id().unwrap(),
            "deadbeef-0102-0a0b-0102-030405060708"
        );
        assert_eq!(
            header.global_encoding_flags().unwrap(),
            GlobalEncoding {
                gps_time_type: true,
                synthetic_return_numbers: true,
                ..Default::default()
            }
        );
        let point = header
            .coordinate_system()
            .unwrap()
            .decode_position(nalgebra::Point3::new(100, 0, 1000));
        assert_eq!(point, nalgebra::Point3::new(101.0, 200.0, -4.0));
    }

    #[test]
    fn test_header_1_3() {
        let header = sample_header(HeaderVersion::V1_3, CodecSettings::default());
        assert_eq!(header.version().unwrap(), "1.3");
        assert_eq!(header.point_return_count().unwrap().len(), 7);
        assert_eq!(header.min().unwrap(), Vector3::new(90.0, 180.0, -50.0));
        assert_eq!(header.max().unwrap(), Vector3::new(110.0, 220.0, 50.0));
    }

    #[test]
    fn test_created_date() {
        let header = sample_header(HeaderVersion::V1_0, CodecSettings::default());
        assert_eq!(
            header.created_date().unwrap(),
            NaiveDate::from_ymd_opt(2008, 3, 20)
        );

        let settings = CodecSettings {
            leap_year_rule: LeapYearRule::Gregorian,
            ..Default::default()
        };
        let header = sample_header(HeaderVersion::V1_0, settings);
        assert_eq!(
            header.created_date().unwrap(),
            NaiveDate::from_ymd_opt(2008, 3, 19)
        );

        let data = sample_header_bytes(
            HeaderVersion::V1_1,
            &[
                ("created_day", Value::U16(0)),
                ("created_year", Value::U16(0)),
            ],
        );
        let registry = SchemaRegistry::new();
        let header =
            Header::read_from(&mut Cursor::new(data), &registry, CodecSettings::default()).unwrap();
        assert_eq!(header.created_date().unwrap(), None);
    }

    #[test]
    fn test_unknown_point_format() {
        let data = sample_header_bytes(HeaderVersion::V1_2, &[("pt_dat_format_id", Value::U8(6))]);
        let registry = SchemaRegistry::new();
        let header =
            Header::read_from(&mut Cursor::new(data), &registry, CodecSettings::default()).unwrap();
        assert!(matches!(
            header.point_record_length(),
            Err(LasError::UnknownPointFormat(6))
        ));
    }

    #[test]
    fn test_bad_signature() {
        let data = sample_header_bytes(
            HeaderVersion::V1_2,
            &[("file_sig", Value::Text("LASX".to_string()))],
        );
        let registry = SchemaRegistry::new();
        let result = Header::read_from(
            &mut Cursor::new(data.clone()),
            &registry,
            CodecSettings::default(),
        );
        assert!(matches!(result, Err(LasError::BadSignature { found }) if found == "LASX"));

        let settings = CodecSettings {
            verify_signature: false,
            ..Default::default()
        };
        assert!(Header::read_from(&mut Cursor::new(data), &registry, settings).is_ok());
    }

    #[test]
    fn test_unknown_version() {
        let data = sample_header_bytes(HeaderVersion::V1_2, &[("version_minor", Value::U8(4))]);
        let registry = SchemaRegistry::new();
        let result =
            Header::read_from(&mut Cursor::new(data), &registry, CodecSettings::default());
        assert!(matches!(result, Err(LasError::UnknownFormat { id }) if id == "h1.4"));
    }

    #[test]
    fn test_truncated_header() {
        let mut data = sample_header_bytes(HeaderVersion::V1_2, &[]);
        data.truncate(200);
        let registry = SchemaRegistry::new();
        let result =
            Header::read_from(&mut Cursor::new(data), &registry, CodecSettings::default());
        assert!(matches!(result, Err(LasError::Io(_))));
    }

    #[test]
    fn test_setters_are_inert() {
        let mut header = sample_header(HeaderVersion::V1_2, CodecSettings::default());
        header.set_version("1.0").unwrap();
        header.set_scale(Vector3::new(1.0, 1.0, 1.0)).unwrap();
        header.set_offset(Vector3::new(1.0, 1.0, 1.0)).unwrap();
        header.set_min(Vector3::new(1.0, 1.0, 1.0)).unwrap();
        header.set_max(Vector3::new(1.0, 1.0, 1.0)).unwrap();
        header
            .set_date(NaiveDate::from_ymd_opt(2020, 5, 5).unwrap())
            .unwrap();
        header.set_system_id("MODIFICATION").unwrap();
        header.set_software_id("hobu").unwrap();
        header.set_file_source_id(7).unwrap();
        header.set_global_encoding(0).unwrap();
        header.set_vlrs(Vec::new()).unwrap();
        header.set_srs("").unwrap();
        header.set_schema(PointFormat::Format3).unwrap();

        assert_eq!(header.version().unwrap(), "1.2");
        assert_eq!(header.scale().unwrap(), Vector3::new(0.01, 0.02, 0.001));
        assert_eq!(header.system_id().unwrap(), "LIDARSERV");
        assert_eq!(header.file_source_id().unwrap(), 12);
        assert_eq!(header.point_format().unwrap(), PointFormat::Format1);
        assert_eq!(
            header.created_date().unwrap(),
            NaiveDate::from_ymd_opt(2008, 3, 20)
        );
    }

    #[test]
    fn test_setters_rejected() {
        let settings = CodecSettings {
            setter_policy: SetterPolicy::Reject,
            ..Default::default()
        };
        let mut header = sample_header(HeaderVersion::V1_2, settings);
        assert!(matches!(
            header.set_version("1.0"),
            Err(LasError::NotImplemented {
                property: "version"
            })
        ));
        assert!(header.set_global_encoding(1).is_err());
        assert!(header.set_vlrs(Vec::new()).is_err());
        assert_eq!(header.version().unwrap(), "1.2");
    }

    #[test]
    fn test_global_encoding_bits() {
        for bits in 0..16 {
            assert_eq!(GlobalEncoding::from_bits(bits).to_bits(), bits);
        }
    }

    #[test]
    fn test_requires_header_record() {
        let registry = SchemaRegistry::new();
        let vlr = registry.vlr().unwrap();
        let record = Record::decode(vlr, &[0; 54]).unwrap();
        assert!(matches!(
            Header::from_record(record, CodecSettings::default()),
            Err(LasError::UnknownFormat { .. })
        ));
    }
}
