//! Binary layouts of LAS records.
//!
//! A [RecordSchema] is the ordered list of fields of one record format
//! (point format 0-5, VLR header or file header 1.0-1.3). All fields are
//! densely packed, little endian.

use crate::error::{LasError, Result};
use byteorder::LittleEndian;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

pub mod field;
pub mod registry;

pub use field::{DataType, Endianess, FieldOptions, FieldSpec, Value};
pub use registry::{FormatId, HeaderVersion, PointFormat, SchemaRegistry};

/// Ordered set of fields, that make up one record.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    format_id: FormatId,
    fields: Vec<FieldSpec>,
    lookup: HashMap<String, usize>,
    record_length: usize,
    type_codes: String,
}

/// Appends fields to a schema under construction, keeping track of the offsets.
pub(crate) struct SchemaBuilder {
    fields: Vec<FieldSpec>,
    endianess: Endianess,
    next_offset: usize,
}

impl SchemaBuilder {
    fn new(endianess: Endianess) -> Self {
        SchemaBuilder {
            fields: Vec::new(),
            endianess,
            next_offset: 0,
        }
    }

    pub fn add(&mut self, name: &str, data_type: DataType, count: usize) -> Result<()> {
        self.add_with(name, data_type, count, FieldOptions::default())
    }

    pub fn add_with(
        &mut self,
        name: &str,
        data_type: DataType,
        count: usize,
        options: FieldOptions,
    ) -> Result<()> {
        let options = FieldOptions {
            endianess: self.endianess,
            ..options
        };
        let index = self.fields.len();
        let field =
            FieldSpec::with_options(name, self.next_offset, data_type, count, index, options)?;
        self.next_offset += field.byte_length();
        self.fields.push(field);
        Ok(())
    }
}

impl RecordSchema {
    /// Builds the schema for the given format.
    pub fn new(format_id: FormatId) -> Result<Self> {
        Self::with_endianess(format_id, Endianess::LittleEndian)
    }

    /// Builds the schema for a format given by its short identifier, like `"3"` or `"h1.2"`.
    pub fn for_identifier(id: &str) -> Result<Self> {
        Self::new(id.parse()?)
    }

    /// Builds the schema for the given format and byte order.
    ///
    /// Only [Endianess::LittleEndian] is supported, any other byte order
    /// fails with [LasError::UnsupportedEndianess].
    pub fn with_endianess(format_id: FormatId, endianess: Endianess) -> Result<Self> {
        let mut builder = SchemaBuilder::new(endianess);
        registry::populate(format_id, &mut builder)?;
        let fields = builder.fields;

        let record_length = fields.iter().map(FieldSpec::byte_length).sum();
        if let Some(expected) = format_id.canonical_record_length() {
            if expected != record_length {
                return Err(LasError::SchemaSizeMismatch {
                    format: format_id.to_string(),
                    expected,
                    actual: record_length,
                });
            }
        }

        let mut type_codes = String::from("<");
        for field in &fields {
            if field.count() > 1 {
                type_codes.push_str(&field.count().to_string());
            }
            type_codes.push(field.data_type().type_code());
        }

        let lookup = fields
            .iter()
            .map(|field| (field.name().to_string(), field.index()))
            .collect();

        debug!("Built record schema for {format_id}: {record_length} bytes, layout {type_codes}");
        Ok(RecordSchema {
            format_id,
            fields,
            lookup,
            record_length,
            type_codes,
        })
    }

    pub fn format_id(&self) -> FormatId {
        self.format_id
    }

    pub fn record_length(&self) -> usize {
        self.record_length
    }

    /// Composite layout string of the whole record, e.g. `"<iiiHBBBBH"` for point format 0.
    pub fn type_codes(&self) -> &str {
        &self.type_codes
    }

    pub fn field(&self, name: &str) -> Result<&FieldSpec> {
        self.index_of(name).map(|index| &self.fields[index])
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| LasError::UnknownField {
                name: name.to_string(),
            })
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    pub fn field_at(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    pub fn fields_in_order(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// The fields at the given positions (not byte offsets).
    pub fn fields_in_range(&self, range: Range<usize>) -> &[FieldSpec] {
        let end = range.end.min(self.fields.len());
        let start = range.start.min(end);
        &self.fields[start..end]
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldSpec> {
        self.fields.iter()
    }

    /// Default values for all fields, in order.
    pub fn default_values(&self) -> Vec<Value> {
        self.fields.iter().map(FieldSpec::default_value).collect()
    }

    /// Serializes one whole record. There must be exactly one value per field.
    pub fn pack(&self, values: &[Value]) -> Result<Vec<u8>> {
        if values.len() < self.fields.len() {
            return Err(LasError::IncompleteRecord {
                field: self.fields[values.len()].name().to_string(),
            });
        }
        if values.len() > self.fields.len() {
            return Err(LasError::ValueMismatch {
                field: self.format_id.to_string(),
                expected: format!("{} values", self.fields.len()),
            });
        }
        let mut data = vec![0; self.record_length];
        for (field, value) in self.fields.iter().zip(values) {
            field.encode::<LittleEndian>(value, &mut data[field.byte_range()])?;
        }
        Ok(data)
    }

    /// Deserializes one whole record from the start of `data`.
    /// Bytes after the end of the record are ignored.
    pub fn unpack(&self, data: &[u8]) -> Result<Vec<Value>> {
        if data.len() < self.record_length {
            return Err(LasError::TruncatedRecord {
                expected: self.record_length,
                actual: data.len(),
            });
        }
        let values = self
            .fields
            .iter()
            .map(|field| field.decode::<LittleEndian>(&data[field.byte_range()]))
            .collect();
        Ok(values)
    }

    /// Decodes a single field from a record, without unpacking the rest of it.
    pub fn unpack_field(&self, name: &str, data: &[u8]) -> Result<Value> {
        let field = self.field(name)?;
        let range = field.byte_range();
        if data.len() < range.end {
            return Err(LasError::TruncatedRecord {
                expected: range.end,
                actual: data.len(),
            });
        }
        Ok(field.decode::<LittleEndian>(&data[range]))
    }

    pub fn describe(&self) -> SchemaDescription {
        SchemaDescription {
            format: self.format_id.to_string(),
            record_length: self.record_length,
            fields: self
                .fields
                .iter()
                .map(|field| FieldDescription {
                    name: field.name().to_string(),
                    offset: field.offset(),
                    data_type: field.data_type(),
                    count: field.count(),
                    byte_length: field.byte_length(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> String {
        // unwrap: the description only consists of strings and integers, which always serialize
        serde_json::to_string_pretty(&self.describe()).unwrap()
    }
}

impl<'a> IntoIterator for &'a RecordSchema {
    type Item = &'a FieldSpec;
    type IntoIter = std::slice::Iter<'a, FieldSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Summary of a schema, e.g. for finding out which dimensions a point format has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescription {
    pub format: String,
    pub record_length: usize,
    pub fields: Vec<FieldDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescription {
    pub name: String,
    pub offset: usize,
    pub data_type: DataType,
    pub count: usize,
    pub byte_length: usize,
}
