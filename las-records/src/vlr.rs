use crate::error::{LasError, Result};
use crate::format::{FormatId, RecordSchema, Value};
use crate::record::Record;
use std::sync::Arc;

/// Header of a variable length record.
/// The payload follows directly after the header and is not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlrHeader {
    pub reserved: u16,
    pub user_id: String,
    pub record_id: u16,
    pub payload_length: u16,
    pub description: String,
}

impl VlrHeader {
    pub fn from_record(record: &Record) -> Result<Self> {
        if record.schema().format_id() != FormatId::Vlr {
            return Err(LasError::UnknownFormat {
                id: record.schema().format_id().identifier(),
            });
        }
        let text = |name: &str| {
            record.get(name)?.as_text().ok_or_else(|| LasError::ValueMismatch {
                field: name.to_string(),
                expected: "text".to_string(),
            })
        };
        let short = |name: &str| {
            record.get(name)?.as_u16().ok_or_else(|| LasError::ValueMismatch {
                field: name.to_string(),
                expected: "u16".to_string(),
            })
        };
        Ok(VlrHeader {
            reserved: short("reserved")?,
            user_id: text("user_id")?,
            record_id: short("record_id")?,
            payload_length: short("payload_length")?,
            description: text("description")?,
        })
    }

    pub fn decode(schema: Arc<RecordSchema>, data: &[u8]) -> Result<Self> {
        Self::from_record(&Record::decode(schema, data)?)
    }

    /// Builds the record for encoding this VLR header.
    pub fn to_record(&self, schema: Arc<RecordSchema>) -> Result<Record> {
        let user_id_len = schema.field("user_id")?.count();
        let mut user_id = self.user_id.as_bytes().to_vec();
        if user_id.len() > user_id_len {
            return Err(LasError::ValueMismatch {
                field: "user_id".to_string(),
                expected: format!("text of at most {user_id_len} bytes"),
            });
        }
        user_id.resize(user_id_len, 0);

        let values = vec![
            Value::U16(self.reserved),
            Value::Chars(user_id),
            Value::U16(self.record_id),
            Value::U16(self.payload_length),
            Value::Text(self.description.clone()),
        ];
        Ok(Record::from_values(schema, values))
    }

    /// Length of the VLR including its payload.
    pub fn total_length(&self, schema: &RecordSchema) -> u64 {
        schema.record_length() as u64 + u64::from(self.payload_length)
    }
}

#[cfg(test)]
mod tests {
    use super::VlrHeader;
    use crate::error::LasError;
    use crate::format::SchemaRegistry;

    #[test]
    fn test_vlr_header_rw() {
        let registry = SchemaRegistry::new();
        let schema = registry.vlr().unwrap();
        let vlr = VlrHeader {
            reserved: 0xAABB,
            user_id: "LASF_Projection".to_string(),
            record_id: 34735,
            payload_length: 16,
            description: "GeoKeyDirectoryTag".to_string(),
        };
        let data = vlr.to_record(schema.clone()).unwrap().pack().unwrap();
        assert_eq!(data.len(), 54);
        assert_eq!(&data[0..2], &[0xBB, 0xAA]);
        assert_eq!(&data[2..17], b"LASF_Projection");
        assert_eq!(data[17], 0);
        assert_eq!(&data[18..20], &34735u16.to_le_bytes());

        let read_back = VlrHeader::decode(schema.clone(), &data).unwrap();
        assert_eq!(read_back, vlr);
        assert_eq!(read_back.total_length(&schema), 70);
    }

    #[test]
    fn test_user_id_too_long() {
        let registry = SchemaRegistry::new();
        let vlr = VlrHeader {
            user_id: "a user id that is too long".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            vlr.to_record(registry.vlr().unwrap()),
            Err(LasError::ValueMismatch { .. })
        ));
    }
}
