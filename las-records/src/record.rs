//! Decoding and encoding of single records.

use crate::error::{LasError, Result};
use crate::format::{RecordSchema, Value};
use log::trace;
use nalgebra::Point3;
use std::collections::HashMap;
use std::sync::Arc;

/// A group of bits within a byte, that holds a small integer value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BitField {
    pub name: &'static str,
    pub low_bit: u8,
    pub width: u8,
}

impl BitField {
    const fn new(name: &'static str, low_bit: u8, width: u8) -> Self {
        BitField {
            name,
            low_bit,
            width,
        }
    }

    fn mask(&self) -> u8 {
        ((1u16 << self.width) - 1) as u8
    }

    /// Extracts the value of this bit field from the byte.
    /// Bit 0 is the least significant bit.
    pub fn extract(&self, byte: u8) -> u8 {
        (byte >> self.low_bit) & self.mask()
    }

    /// Stores `value` in this bit field of `byte`.
    /// Returns None, if the value does not fit into the bit field.
    pub fn insert(&self, byte: u8, value: u8) -> Option<u8> {
        if value & !self.mask() != 0 {
            return None;
        }
        let cleared = byte & !(self.mask() << self.low_bit);
        Some(cleared | (value << self.low_bit))
    }
}

pub const FLAG_BYTE: &str = "flag_byte";
pub const RAW_CLASSIFICATION: &str = "raw_classification";

pub const FLAG_BYTE_FIELDS: [BitField; 4] = [
    BitField::new("return_number", 0, 3),
    BitField::new("number_of_returns", 3, 3),
    BitField::new("scan_direction_flag", 6, 1),
    BitField::new("edge_of_flight_line", 7, 1),
];

pub const CLASSIFICATION_FIELDS: [BitField; 4] = [
    BitField::new("classification", 0, 5),
    BitField::new("synthetic", 5, 1),
    BitField::new("key_point", 6, 1),
    BitField::new("withheld", 7, 1),
];

/// Byte-valued fields, that are split up into bit fields when a record is expanded.
const COMPOSITE_FIELDS: [(&str, &[BitField]); 2] = [
    (FLAG_BYTE, &FLAG_BYTE_FIELDS),
    (RAW_CLASSIFICATION, &CLASSIFICATION_FIELDS),
];

fn composite_parts(name: &str) -> Option<&'static [BitField]> {
    COMPOSITE_FIELDS
        .iter()
        .find(|(composite, _)| *composite == name)
        .map(|(_, parts)| *parts)
}

/// Splits a composite byte into its named bit fields.
pub fn decompose(byte: u8, parts: &[BitField]) -> Vec<(&'static str, u8)> {
    parts.iter().map(|p| (p.name, p.extract(byte))).collect()
}

/// Point attributes, that are common to all point formats 0-5,
/// plus gps time and color, if the format has them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointAttributes {
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub scan_direction: bool,
    pub edge_of_flight_line: bool,
    pub classification: u8,
    pub synthetic: bool,
    pub key_point: bool,
    pub withheld: bool,
    pub scan_angle_rank: i8,
    pub user_data: u8,
    pub point_source_id: u16,
    pub gps_time: Option<f64>,
    pub color: Option<(u16, u16, u16)>,
}

/// A single record (point, VLR header or file header) of some [RecordSchema].
///
/// A record is either decoded from bytes, or built from values for encoding.
/// Decoded records can be *expanded*, which assigns each value to its field
/// name and splits the flag byte and the classification byte into their bit fields.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    raw: Vec<Value>,
    decoded: bool,
    named: Option<HashMap<String, Value>>,
}

impl Record {
    /// Creates a record either from the given bytes (preferred, if both are given)
    /// or from the given raw values.
    pub fn new(
        schema: Arc<RecordSchema>,
        bytes: Option<&[u8]>,
        values: Option<Vec<Value>>,
    ) -> Result<Self> {
        match (bytes, values) {
            (Some(bytes), _) => Self::decode(schema, bytes),
            (None, Some(values)) => Ok(Self::from_values(schema, values)),
            (None, None) => Err(LasError::MissingSource),
        }
    }

    pub fn decode(schema: Arc<RecordSchema>, bytes: &[u8]) -> Result<Self> {
        let raw = schema.unpack(bytes)?;
        trace!("Decoded record of {}", schema.format_id());
        Ok(Record {
            schema,
            raw,
            decoded: true,
            named: None,
        })
    }

    /// Record for encoding, from one raw value per field.
    pub fn from_values(schema: Arc<RecordSchema>, values: Vec<Value>) -> Self {
        Record {
            schema,
            raw: values,
            decoded: false,
            named: None,
        }
    }

    /// Record for encoding, from named values.
    ///
    /// The flag byte and the classification byte are assembled from their
    /// bit fields (`return_number`, `classification`, ...), so those must be present.
    pub fn from_named(schema: Arc<RecordSchema>, values: HashMap<String, Value>) -> Self {
        Record {
            schema,
            raw: Vec::new(),
            decoded: false,
            named: Some(values),
        }
    }

    /// Record for encoding, with every field set to its default value.
    pub fn with_defaults(schema: Arc<RecordSchema>) -> Self {
        let values = schema.default_values();
        Self::from_values(schema, values)
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn raw_values(&self) -> &[Value] {
        &self.raw
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded
    }

    pub fn is_expanded(&self) -> bool {
        self.named.is_some()
    }

    /// Assigns each raw value to its field name and decomposes the bit fields.
    pub fn expand(&mut self) -> Result<&HashMap<String, Value>> {
        if !self.decoded {
            return Err(LasError::NotDecoded);
        }
        let named = match self.named.take() {
            Some(named) => named,
            None => self.name_values()?,
        };
        Ok(&*self.named.insert(named))
    }

    fn name_values(&self) -> Result<HashMap<String, Value>> {
        let mut named: HashMap<String, Value> = self
            .schema
            .iter()
            .zip(&self.raw)
            .map(|(field, value)| (field.name().to_string(), value.clone()))
            .collect();
        for (composite, parts) in COMPOSITE_FIELDS {
            if let Some(value) = named.get(composite) {
                let byte = value.as_u8().ok_or_else(|| LasError::ValueMismatch {
                    field: composite.to_string(),
                    expected: "u8".to_string(),
                })?;
                for (name, bits) in decompose(byte, parts) {
                    named.insert(name.to_string(), Value::U8(bits));
                }
            }
        }
        Ok(named)
    }

    /// Value of a field, or (for expanded records) of a bit field.
    pub fn get(&self, name: &str) -> Result<&Value> {
        match &self.named {
            Some(named) => named.get(name).ok_or_else(|| LasError::UnknownField {
                name: name.to_string(),
            }),
            None => {
                let index = self.schema.index_of(name)?;
                self.raw.get(index).ok_or_else(|| LasError::IncompleteRecord {
                    field: name.to_string(),
                })
            }
        }
    }

    /// Overwrites a field, or (for expanded records) a bit field.
    ///
    /// The flag byte and the classification byte of an expanded record are kept
    /// in sync with their bit fields: Setting the byte updates the bit fields
    /// derived from it, and setting a bit field updates the byte.
    /// A bit field value that does not fit into its bits fails with [LasError::ValueMismatch].
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        if self.decoded {
            if let Ok(field) = self.schema.field(name) {
                if !field.is_mutable() {
                    return Err(LasError::ImmutableField {
                        name: name.to_string(),
                    });
                }
            }
        }
        match &mut self.named {
            Some(named) => {
                let owner = COMPOSITE_FIELDS.iter().find(|(composite, parts)| {
                    self.schema.has_field(composite) && parts.iter().any(|p| p.name == name)
                });
                if !self.schema.has_field(name) && owner.is_none() {
                    return Err(LasError::UnknownField {
                        name: name.to_string(),
                    });
                }
                if let Some(parts) = composite_parts(name) {
                    let byte = value.as_u8().ok_or_else(|| LasError::ValueMismatch {
                        field: name.to_string(),
                        expected: "u8".to_string(),
                    })?;
                    for (part, bits) in decompose(byte, parts) {
                        named.insert(part.to_string(), Value::U8(bits));
                    }
                }
                if let Some((composite, parts)) = owner {
                    let fits = parts
                        .iter()
                        .find(|p| p.name == name)
                        .zip(value.as_u8())
                        .and_then(|(part, v)| part.insert(0, v))
                        .is_some();
                    if !fits {
                        return Err(LasError::ValueMismatch {
                            field: name.to_string(),
                            expected: format!("bit field value of {composite}"),
                        });
                    }
                    named.insert(name.to_string(), value);
                    // records built from named values may not have all bit fields yet
                    if let Ok(byte) = assemble(named, composite, parts) {
                        named.insert(composite.to_string(), Value::U8(byte));
                        let index = self.schema.index_of(composite)?;
                        if let Some(raw) = self.raw.get_mut(index) {
                            *raw = Value::U8(byte);
                        }
                    }
                } else {
                    let index = self.schema.index_of(name)?;
                    if let Some(raw) = self.raw.get_mut(index) {
                        *raw = value.clone();
                    }
                    named.insert(name.to_string(), value);
                }
            }
            None => {
                let index = self.schema.index_of(name)?;
                if index >= self.raw.len() {
                    return Err(LasError::IncompleteRecord {
                        field: name.to_string(),
                    });
                }
                self.raw[index] = value;
            }
        }
        Ok(())
    }

    /// Serializes the record.
    ///
    /// For expanded (or named) records, the flag byte and the classification byte
    /// are reassembled from their bit fields.
    pub fn pack(&self) -> Result<Vec<u8>> {
        let data = match &self.named {
            None => self.schema.pack(&self.raw)?,
            Some(named) => {
                let values = self
                    .schema
                    .iter()
                    .map(|field| match composite_parts(field.name()) {
                        Some(parts) => assemble(named, field.name(), parts).map(Value::U8),
                        None => named.get(field.name()).cloned().ok_or_else(|| {
                            LasError::IncompleteRecord {
                                field: field.name().to_string(),
                            }
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.schema.pack(&values)?
            }
        };
        trace!("Packed record of {}", self.schema.format_id());
        Ok(data)
    }

    /// Stored (unscaled) coordinates of a point record.
    pub fn position(&self) -> Result<Point3<i32>> {
        let coordinate = |name: &str| {
            self.get(name)?.as_i32().ok_or_else(|| LasError::ValueMismatch {
                field: name.to_string(),
                expected: "i32".to_string(),
            })
        };
        Ok(Point3::new(coordinate("X")?, coordinate("Y")?, coordinate("Z")?))
    }

    /// Typed view of the attributes of a point record.
    pub fn point_attributes(&self) -> Result<PointAttributes> {
        let flags = self.byte(FLAG_BYTE)?;
        let class = self.byte(RAW_CLASSIFICATION)?;
        let [return_number, number_of_returns, scan_direction, edge_of_flight_line] =
            FLAG_BYTE_FIELDS.map(|p| p.extract(flags));
        let [classification, synthetic, key_point, withheld] =
            CLASSIFICATION_FIELDS.map(|p| p.extract(class));

        let gps_time = if self.schema.has_field("gps_time") {
            self.get("gps_time")?.as_f64()
        } else {
            None
        };
        let color = if self.schema.has_field("red") {
            Some((
                self.short("red")?,
                self.short("green")?,
                self.short("blue")?,
            ))
        } else {
            None
        };

        Ok(PointAttributes {
            intensity: self.short("intensity")?,
            return_number,
            number_of_returns,
            scan_direction: scan_direction == 1,
            edge_of_flight_line: edge_of_flight_line == 1,
            classification,
            synthetic: synthetic == 1,
            key_point: key_point == 1,
            withheld: withheld == 1,
            scan_angle_rank: self.byte("scan_angle_rank")? as i8,
            user_data: self.byte("user_data")?,
            point_source_id: self.short("pt_src_id")?,
            gps_time,
            color,
        })
    }

    /// Current value of a composite byte, taking modified bit fields into account.
    fn byte(&self, name: &str) -> Result<u8> {
        if let (Some(named), Some(parts)) = (&self.named, composite_parts(name)) {
            return assemble(named, name, parts);
        }
        self.get(name)?.as_u8().ok_or_else(|| LasError::ValueMismatch {
            field: name.to_string(),
            expected: "u8".to_string(),
        })
    }

    fn short(&self, name: &str) -> Result<u16> {
        self.get(name)?.as_u16().ok_or_else(|| LasError::ValueMismatch {
            field: name.to_string(),
            expected: "u16".to_string(),
        })
    }
}

/// Builds a composite byte from its bit fields.
fn assemble(named: &HashMap<String, Value>, composite: &str, parts: &[BitField]) -> Result<u8> {
    let mut byte = 0;
    for part in parts {
        let value = named
            .get(part.name)
            .ok_or_else(|| LasError::IncompleteRecord {
                field: part.name.to_string(),
            })?;
        byte = value
            .as_u8()
            .and_then(|v| part.insert(byte, v))
            .ok_or_else(|| LasError::ValueMismatch {
                field: part.name.to_string(),
                expected: format!("{}-bit value of {composite}", part.width),
            })?;
    }
    Ok(byte)
}
