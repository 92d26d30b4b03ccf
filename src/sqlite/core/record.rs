//! Record format decoding.
//!
//! A record is the payload of a leaf-table or index cell. It starts
//! with a header: a `header_size` varint (which counts its own bytes),
//! followed by one serial-type varint per field. The field bytes are
//! concatenated after the header, in the same order.
//!
//! Serial types:
//!
//! - 0: NULL
//! - 1,2,3,4,5,6: big-endian twos-complement ints of 1/2/3/4/6/8 bytes
//! - 7: IEEE 754 64-bit float
//! - 8: the integer 0
//! - 9: the integer 1
//! - 10,11: reserved
//! - N >= 12, even: blob of (N-12)/2 bytes
//! - N >= 13, odd: text of (N-13)/2 bytes

use crate::sqlite::core::header::TextEncoding;
use crate::sqlite::core::varint::{read_varint, read_varints};
use crate::sqlite::error::{Result, SqliteError};

/// One field's on-disk representation, decoded from its serial-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialType {
    Null,
    Int8,
    Int16,
    Int24,
    Int32,
    Int48,
    Int64,
    Float64,
    Zero,
    One,
    /// Codes 10 and 11; the field cannot be decoded.
    Reserved(i64),
    Blob(usize),
    Text(usize),
}

impl SerialType {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(SerialType::Null),
            1 => Ok(SerialType::Int8),
            2 => Ok(SerialType::Int16),
            3 => Ok(SerialType::Int24),
            4 => Ok(SerialType::Int32),
            5 => Ok(SerialType::Int48),
            6 => Ok(SerialType::Int64),
            7 => Ok(SerialType::Float64),
            8 => Ok(SerialType::Zero),
            9 => Ok(SerialType::One),
            10 | 11 => Ok(SerialType::Reserved(code)),
            n if n >= 12 && n % 2 == 0 => Ok(SerialType::Blob(((n - 12) / 2) as usize)),
            n if n >= 13 => Ok(SerialType::Text(((n - 13) / 2) as usize)),
            n => Err(SqliteError::MalformedRecord {
                reason: format!("negative serial type {n}"),
            }),
        }
    }

    /// On-disk size of the field in bytes.
    pub fn size(&self) -> usize {
        match *self {
            SerialType::Null | SerialType::Zero | SerialType::One => 0,
            SerialType::Int8 => 1,
            SerialType::Int16 => 2,
            SerialType::Int24 => 3,
            SerialType::Int32 => 4,
            SerialType::Int48 => 6,
            SerialType::Int64 | SerialType::Float64 => 8,
            // Reserved codes have no defined width; treated as empty so
            // later field offsets stay computable.
            SerialType::Reserved(_) => 0,
            SerialType::Blob(n) | SerialType::Text(n) => n,
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    /// Raw text bytes; interpretation depends on the database encoding.
    Text(Vec<u8>),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Renders the value for output: numerics in decimal, text per the
    /// database encoding, NULL as the empty string.
    pub fn render(&self, encoding: TextEncoding) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(bytes) => decode_text(bytes, encoding),
            Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Utf16Le => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        TextEncoding::Utf16Be => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

/// A record: the serial-type list from its header plus the inline body.
///
/// The body may be shorter than the header promises when the payload
/// spilled to overflow pages; text and blob fields then come back
/// truncated.
#[derive(Debug, Clone)]
pub struct Record {
    pub serial_types: Vec<SerialType>,
    pub body: Vec<u8>,
}

impl Record {
    /// Parses a record from the front of `buf`. `payload_length` is
    /// the full declared payload size (header included); `buf` holds
    /// whatever portion of it is inline. Returns the record and the
    /// number of inline bytes consumed.
    pub fn parse(buf: &[u8], payload_length: usize) -> Result<(Record, usize)> {
        let (header_size, header_varint_len) = read_varint(buf);
        if header_size < 1 {
            return Err(SqliteError::MalformedRecord {
                reason: format!("record header size {header_size} (must count itself)"),
            });
        }
        let header_size = header_size as usize;
        // Guards a non-canonical header_size varint that is longer
        // than the value it encodes.
        if header_size < header_varint_len {
            return Err(SqliteError::MalformedRecord {
                reason: format!(
                    "record header size {header_size} smaller than its own {header_varint_len}-byte varint"
                ),
            });
        }
        if header_size > payload_length {
            return Err(SqliteError::MalformedRecord {
                reason: format!(
                    "record header size {header_size} exceeds payload length {payload_length}"
                ),
            });
        }
        if header_size > buf.len() {
            return Err(SqliteError::MalformedRecord {
                reason: format!(
                    "record header of {header_size} bytes truncated at {}",
                    buf.len()
                ),
            });
        }

        let (codes, _) = read_varints(&buf[header_varint_len..header_size]);
        let serial_types = codes
            .into_iter()
            .map(SerialType::from_code)
            .collect::<Result<Vec<_>>>()?;

        let body_len = payload_length - header_size;
        let body_end = (header_size + body_len).min(buf.len());
        let body = buf[header_size..body_end].to_vec();

        Ok((
            Record {
                serial_types,
                body,
            },
            body_end,
        ))
    }

    /// Number of fields in the record.
    pub fn field_count(&self) -> usize {
        self.serial_types.len()
    }

    /// Decodes field `index` from the inline body.
    pub fn field(&self, index: usize) -> Result<Value> {
        let serial_type = *self.serial_types.get(index).ok_or_else(|| {
            SqliteError::MalformedRecord {
                reason: format!(
                    "field {index} out of range ({} fields)",
                    self.serial_types.len()
                ),
            }
        })?;

        let offset: usize = self.serial_types[..index].iter().map(SerialType::size).sum();

        match serial_type {
            SerialType::Null => Ok(Value::Null),
            SerialType::Zero => Ok(Value::Int(0)),
            SerialType::One => Ok(Value::Int(1)),
            SerialType::Reserved(code) => Err(SqliteError::UnsupportedSerialType(code)),
            SerialType::Int8 => {
                let b = self.fixed(offset, 1)?;
                Ok(Value::Int(i64::from(b[0] as i8)))
            }
            SerialType::Int16 => {
                let b = self.fixed(offset, 2)?;
                Ok(Value::Int(i64::from(i16::from_be_bytes([b[0], b[1]]))))
            }
            SerialType::Int24 => {
                let b = self.fixed(offset, 3)?;
                let mut v = (i64::from(b[0]) << 16) | (i64::from(b[1]) << 8) | i64::from(b[2]);
                if v & (1 << 23) != 0 {
                    v |= !((1 << 24) - 1);
                }
                Ok(Value::Int(v))
            }
            SerialType::Int32 => {
                let b = self.fixed(offset, 4)?;
                Ok(Value::Int(i64::from(i32::from_be_bytes([
                    b[0], b[1], b[2], b[3],
                ]))))
            }
            SerialType::Int48 => {
                let b = self.fixed(offset, 6)?;
                let mut v = (i64::from(b[0]) << 40)
                    | (i64::from(b[1]) << 32)
                    | (i64::from(b[2]) << 24)
                    | (i64::from(b[3]) << 16)
                    | (i64::from(b[4]) << 8)
                    | i64::from(b[5]);
                if v & (1 << 47) != 0 {
                    v |= !((1 << 48) - 1);
                }
                Ok(Value::Int(v))
            }
            SerialType::Int64 => {
                let b = self.fixed(offset, 8)?;
                Ok(Value::Int(i64::from_be_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ])))
            }
            SerialType::Float64 => {
                let b = self.fixed(offset, 8)?;
                Ok(Value::Float(f64::from_be_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ])))
            }
            SerialType::Blob(len) => Ok(Value::Blob(self.clamped(offset, len).to_vec())),
            SerialType::Text(len) => Ok(Value::Text(self.clamped(offset, len).to_vec())),
        }
    }

    fn fixed(&self, offset: usize, len: usize) -> Result<&[u8]> {
        if offset + len > self.body.len() {
            return Err(SqliteError::ShortRead {
                want: offset + len,
                got: self.body.len(),
            });
        }
        Ok(&self.body[offset..offset + len])
    }

    // Text and blob fields may be truncated by an overflow spill; the
    // inline prefix is returned as-is.
    fn clamped(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(self.body.len());
        let end = (offset + len).min(self.body.len());
        &self.body[start..end]
    }
}
