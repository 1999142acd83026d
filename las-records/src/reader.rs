use crate::error::{LasError, Result};
use crate::format::{RecordSchema, SchemaRegistry};
use crate::header::Header;
use crate::io::{ReadAt, WriteAt};
use crate::record::Record;
use crate::settings::CodecSettings;
use crate::vlr::VlrHeader;
use log::{debug, trace, warn};
use std::sync::Arc;

/// Reads the header, VLR headers and point records of a LAS file
/// from a byte stream.
///
/// The point schema is built once when the file is opened
/// and shared by all point records read from it.
pub struct LasReader<S> {
    source: S,
    header: Header,
    point_schema: Arc<RecordSchema>,
    vlr_schema: Arc<RecordSchema>,
    point_count: u64,
    stored_record_length: u64,
}

impl<S: ReadAt> LasReader<S> {
    pub fn open(source: S, settings: CodecSettings) -> Result<Self> {
        Self::with_registry(source, &SchemaRegistry::new(), settings)
    }

    pub fn with_registry(
        mut source: S,
        registry: &SchemaRegistry,
        settings: CodecSettings,
    ) -> Result<Self> {
        let header = Header::read_from(&mut source, registry, settings)?;
        let point_schema = header.point_schema(registry)?;
        let vlr_schema = registry.vlr()?;

        let stored_record_length = usize::from(header.data_record_length()?);
        if stored_record_length < point_schema.record_length() {
            return Err(LasError::TruncatedRecord {
                expected: point_schema.record_length(),
                actual: stored_record_length,
            });
        }
        if stored_record_length > point_schema.record_length() {
            warn!(
                "Point records have {} extra bytes, which will be skipped.",
                stored_record_length - point_schema.record_length()
            );
        }

        let point_count = u64::from(header.point_records_count()?);
        debug!(
            "Opened LAS {} file with {} points of {}.",
            header.version()?,
            point_count,
            point_schema.format_id()
        );
        Ok(LasReader {
            source,
            header,
            point_schema,
            vlr_schema,
            point_count,
            stored_record_length: stored_record_length as u64,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn point_schema(&self) -> &Arc<RecordSchema> {
        &self.point_schema
    }

    pub fn point_count(&self) -> u64 {
        self.point_count
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Reads the headers of all variable length records.
    pub fn vlr_headers(&mut self) -> Result<Vec<VlrHeader>> {
        let mut offset = u64::from(self.header.header_size()?);
        let nr_vlrs = self.header.num_vlrs()?;
        let mut vlrs = Vec::new();
        for i in 0..nr_vlrs {
            let data = self
                .source
                .read_vec_at(offset, self.vlr_schema.record_length())?;
            let vlr = VlrHeader::decode(Arc::clone(&self.vlr_schema), &data)?;
            trace!(
                "VLR {i} at offset {offset}: {} / {}, {} bytes",
                vlr.user_id,
                vlr.record_id,
                vlr.payload_length
            );
            offset += vlr.total_length(&self.vlr_schema);
            vlrs.push(vlr);
        }
        Ok(vlrs)
    }

    /// Number of bytes between the end of the VLRs and the beginning of the point data.
    pub fn padding(&mut self) -> Result<u64> {
        let vlr_end = self
            .vlr_headers()?
            .iter()
            .map(|vlr| vlr.total_length(&self.vlr_schema))
            .sum::<u64>()
            + u64::from(self.header.header_size()?);
        u64::from(self.header.data_offset()?)
            .checked_sub(vlr_end)
            .ok_or_else(|| LasError::ValueMismatch {
                field: "offset_to_point_data".to_string(),
                expected: format!("offset of at least {vlr_end}"),
            })
    }

    fn point_offset(&self, index: u64) -> Result<u64> {
        if index >= self.point_count {
            return Err(LasError::PointIndexOutOfBounds {
                index,
                count: self.point_count,
            });
        }
        Ok(u64::from(self.header.data_offset()?) + index * self.stored_record_length)
    }

    pub fn read_point(&mut self, index: u64) -> Result<Record> {
        let offset = self.point_offset(index)?;
        let data = self
            .source
            .read_vec_at(offset, self.point_schema.record_length())?;
        Record::decode(Arc::clone(&self.point_schema), &data)
    }

    pub fn points(&mut self) -> impl Iterator<Item = Result<Record>> + '_ {
        (0..self.point_count).map(move |index| self.read_point(index))
    }
}

impl<S: ReadAt + WriteAt> LasReader<S> {
    /// Overwrites a point record in the byte stream.
    /// Extra bytes after the point record are left as they are.
    pub fn write_point(&mut self, index: u64, record: &Record) -> Result<()> {
        if record.schema().format_id() != self.point_schema.format_id() {
            return Err(LasError::ValueMismatch {
                field: "point record".to_string(),
                expected: self.point_schema.format_id().to_string(),
            });
        }
        let offset = self.point_offset(index)?;
        let data = record.pack()?;
        self.source.write_at(offset, &data)?;
        Ok(())
    }
}
