use crate::error::{LasError, Result};
use byteorder::ByteOrder;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Byte order of the stored values.
///
/// The LAS format family only defines little endian storage.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Endianess {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Primitive element types that LAS records are built from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    I32,
    F32,
    F64,
    Char,
}

impl DataType {
    /// Size of a single element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::U8 | DataType::Char => 1,
            DataType::U16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::F64 => 8,
        }
    }

    /// Type code of this element type in the composite record layout string.
    pub fn type_code(&self) -> char {
        match self {
            DataType::U8 => 'B',
            DataType::U16 => 'H',
            DataType::U32 => 'I',
            DataType::U64 => 'Q',
            DataType::I32 => 'i',
            DataType::F32 => 'f',
            DataType::F64 => 'd',
            DataType::Char => 's',
        }
    }

    fn zero(&self) -> Value {
        match self {
            DataType::U8 => Value::U8(0),
            DataType::U16 => Value::U16(0),
            DataType::U32 => Value::U32(0),
            DataType::U64 => Value::U64(0),
            DataType::I32 => Value::I32(0),
            DataType::F32 => Value::F32(0.0),
            DataType::F64 => Value::F64(0.0),
            DataType::Char => Value::Chars(vec![b' ']),
        }
    }

    fn read<B: ByteOrder>(&self, src: &[u8]) -> Value {
        match self {
            DataType::U8 => Value::U8(src[0]),
            DataType::U16 => Value::U16(B::read_u16(src)),
            DataType::U32 => Value::U32(B::read_u32(src)),
            DataType::U64 => Value::U64(B::read_u64(src)),
            DataType::I32 => Value::I32(B::read_i32(src)),
            DataType::F32 => Value::F32(B::read_f32(src)),
            DataType::F64 => Value::F64(B::read_f64(src)),
            DataType::Char => Value::Chars(vec![src[0]]),
        }
    }

    /// Writes a single element. Returns false, if the value has the wrong type.
    fn write<B: ByteOrder>(&self, value: &Value, dst: &mut [u8]) -> bool {
        match (self, value) {
            (DataType::U8, Value::U8(v)) => dst[0] = *v,
            (DataType::U16, Value::U16(v)) => B::write_u16(dst, *v),
            (DataType::U32, Value::U32(v)) => B::write_u32(dst, *v),
            (DataType::U64, Value::U64(v)) => B::write_u64(dst, *v),
            (DataType::I32, Value::I32(v)) => B::write_i32(dst, *v),
            (DataType::F32, Value::F32(v)) => B::write_f32(dst, *v),
            (DataType::F64, Value::F64(v)) => B::write_f64(dst, *v),
            _ => return false,
        }
        true
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::I32 => "i32",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::Char => "char",
        };
        f.write_str(name)
    }
}

/// A raw value of one field of a record.
///
/// Fields with more than one numeric element are represented as [Value::Array].
/// Character arrays are either collapsed into a single [Value::Text]
/// or kept as raw bytes in [Value::Chars], depending on the field.
///
/// [Value::Text] ends at the first NUL byte and is decoded as lossy UTF-8,
/// so text fields with bytes after the terminating NUL, or with invalid UTF-8,
/// are not restored bit-exactly when packed again (they are NUL-padded).
/// All other fields survive an unpack / pack cycle unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I32(i32),
    F32(f32),
    F64(f64),
    Text(String),
    Chars(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_u8(&self) -> Option<u8> {
        self.as_u64().and_then(|v| v.to_u8())
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.as_u64().and_then(|v| v.to_u16())
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| v.to_u32())
    }

    /// Integer value. Fails for floats, text and arrays.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => v.to_u64(),
            Value::U16(v) => v.to_u64(),
            Value::U32(v) => v.to_u64(),
            Value::U64(v) => Some(*v),
            Value::I32(v) => v.to_u64(),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => self.as_u64().and_then(|v| v.to_i32()),
        }
    }

    /// Any numeric scalar as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => v.to_f64(),
            Value::F64(v) => Some(*v),
            Value::I32(v) => v.to_f64(),
            _ => self.as_u64().and_then(|v| v.to_f64()),
        }
    }

    /// Text content, with trailing NUL bytes removed.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Chars(bytes) => Some(read_las_string(bytes)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

/// Reads a fixed-length LAS string, which is terminated by the first NUL byte
/// (or the end of the field).
pub fn read_las_string(las_str: &[u8]) -> String {
    let bytes = las_str
        .iter()
        .take_while(|byte| **byte != 0)
        .copied()
        .collect::<Vec<_>>();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Optional parts of a field definition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FieldOptions {
    /// Collapse a character array into a single text value.
    pub text_concatenated: bool,

    /// Whether the field may be overwritten once the structure of the file is fixed.
    pub mutable: bool,

    pub endianess: Endianess,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            text_concatenated: false,
            mutable: true,
            endianess: Endianess::LittleEndian,
        }
    }
}

/// Describes a single named field within a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    name: String,
    offset: usize,
    data_type: DataType,
    count: usize,
    byte_length: usize,
    is_text_concatenated: bool,
    mutable: bool,
    index: usize,
}

impl FieldSpec {
    pub fn new(
        name: &str,
        offset: usize,
        data_type: DataType,
        count: usize,
        index: usize,
    ) -> Result<Self> {
        Self::with_options(name, offset, data_type, count, index, FieldOptions::default())
    }

    pub fn with_options(
        name: &str,
        offset: usize,
        data_type: DataType,
        count: usize,
        index: usize,
        options: FieldOptions,
    ) -> Result<Self> {
        if options.endianess != Endianess::LittleEndian {
            return Err(LasError::UnsupportedEndianess);
        }
        if count == 0 {
            return Err(LasError::InvalidFieldArity {
                name: name.to_string(),
                count,
            });
        }
        Ok(FieldSpec {
            name: name.to_string(),
            offset,
            data_type,
            count,
            byte_length: data_type.size() * count,
            is_text_concatenated: options.text_concatenated,
            mutable: options.mutable,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn is_text_concatenated(&self) -> bool {
        self.is_text_concatenated
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte range of this field within its record.
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.byte_length
    }

    /// The value a freshly initialized record holds for this field.
    pub fn default_value(&self) -> Value {
        match self.data_type {
            DataType::Char if self.is_text_concatenated => Value::Text(" ".repeat(self.count)),
            DataType::Char => Value::Chars(vec![b' '; self.count]),
            _ if self.count == 1 => self.data_type.zero(),
            _ => Value::Array(vec![self.data_type.zero(); self.count]),
        }
    }

    /// Decodes the field from `src`, which holds exactly the bytes of this field.
    pub(crate) fn decode<B: ByteOrder>(&self, src: &[u8]) -> Value {
        debug_assert_eq!(src.len(), self.byte_length);
        match self.data_type {
            DataType::Char if self.is_text_concatenated => Value::Text(read_las_string(src)),
            DataType::Char => Value::Chars(src.to_vec()),
            _ if self.count == 1 => self.data_type.read::<B>(src),
            _ => Value::Array(
                src.chunks_exact(self.data_type.size())
                    .map(|chunk| self.data_type.read::<B>(chunk))
                    .collect(),
            ),
        }
    }

    /// Encodes `value` into `dst`, which is exactly the byte range of this field.
    pub(crate) fn encode<B: ByteOrder>(&self, value: &Value, dst: &mut [u8]) -> Result<()> {
        debug_assert_eq!(dst.len(), self.byte_length);
        let ok = match (self.data_type, value) {
            (DataType::Char, Value::Text(text)) if self.is_text_concatenated => {
                let bytes = text.as_bytes();
                if bytes.len() <= self.count {
                    dst[..bytes.len()].copy_from_slice(bytes);
                    dst[bytes.len()..].fill(0);
                    true
                } else {
                    false
                }
            }
            (DataType::Char, Value::Chars(bytes)) if !self.is_text_concatenated => {
                if bytes.len() == self.count {
                    dst.copy_from_slice(bytes);
                    true
                } else {
                    false
                }
            }
            (DataType::Char, _) => false,
            (data_type, Value::Array(values)) if self.count > 1 => {
                values.len() == self.count
                    && values
                        .iter()
                        .zip(dst.chunks_exact_mut(data_type.size()))
                        .all(|(v, chunk)| data_type.write::<B>(v, chunk))
            }
            (data_type, value) if self.count == 1 => data_type.write::<B>(value, dst),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(LasError::ValueMismatch {
                field: self.name.clone(),
                expected: self.describe_type(),
            })
        }
    }

    fn describe_type(&self) -> String {
        match self.data_type {
            DataType::Char if self.is_text_concatenated => {
                format!("text of at most {} bytes", self.count)
            }
            _ if self.count == 1 => self.data_type.to_string(),
            _ => format!("{} x {}", self.count, self.data_type),
        }
    }
}
