//! Key codec
//!
//! Order-preserving encoding of key rows into byte strings.

use bytes::{Buf, BufMut};

use crate::error::{IndexError, Result};

use super::{KeyColumn, KeySchema, KeyType, KeyValue};

/// Escape byte following 0x00 inside a non-final varchar
const ESCAPE_ZERO: u8 = 0x01;

/// Terminator of a non-final varchar: 0x00 0x00
const TERMINATOR: [u8; 2] = [0x00, 0x00];

// =============================================================================
// Encoding
// =============================================================================

fn non_empty_columns(schema: &KeySchema) -> Result<&[KeyColumn]> {
    let columns = schema.columns();
    if columns.is_empty() {
        return Err(IndexError::KeyEncoding("empty key schema".to_string()));
    }
    Ok(columns)
}

/// Encode one key row against the schema
pub fn encode_key(schema: &KeySchema, row: &[KeyValue]) -> Result<Vec<u8>> {
    let columns = non_empty_columns(schema)?;
    if row.len() != columns.len() {
        return Err(IndexError::KeyEncoding(format!(
            "key row has {} values, schema has {} columns",
            row.len(),
            columns.len()
        )));
    }

    let mut buf = Vec::with_capacity(schema.fixed_width().unwrap_or(16));
    let last = columns.len() - 1;

    for (i, (column, value)) in columns.iter().zip(row).enumerate() {
        if value.key_type() != column.key_type {
            return Err(IndexError::KeyEncoding(format!(
                "column '{}' expects {:?}, got {:?}",
                column.name,
                column.key_type,
                value.key_type()
            )));
        }
        encode_value(&mut buf, value, i == last);
    }

    Ok(buf)
}

/// Encode a batch of key rows, failing on the first bad row
pub fn encode_keys(schema: &KeySchema, rows: &[Vec<KeyValue>]) -> Result<Vec<Vec<u8>>> {
    rows.iter().map(|row| encode_key(schema, row)).collect()
}

fn encode_value(buf: &mut Vec<u8>, value: &KeyValue, is_last: bool) {
    match value {
        KeyValue::Boolean(v) => buf.put_u8(*v as u8),
        KeyValue::TinyInt(v) => buf.put_u8((*v as u8) ^ 0x80),
        KeyValue::SmallInt(v) => buf.put_u16((*v as u16) ^ 0x8000),
        KeyValue::Int(v) | KeyValue::Date(v) => buf.put_u32((*v as u32) ^ 0x8000_0000),
        KeyValue::BigInt(v) | KeyValue::Datetime(v) => {
            buf.put_u64((*v as u64) ^ 0x8000_0000_0000_0000)
        }
        KeyValue::LargeInt(v) => buf.put_u128((*v as u128) ^ (1u128 << 127)),
        KeyValue::Varchar(bytes) if is_last => buf.put_slice(bytes),
        KeyValue::Varchar(bytes) => {
            for &b in bytes {
                buf.put_u8(b);
                if b == 0 {
                    buf.put_u8(ESCAPE_ZERO);
                }
            }
            buf.put_slice(&TERMINATOR);
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode an encoded key back into its column values
pub fn decode_key(schema: &KeySchema, encoded: &[u8]) -> Result<Vec<KeyValue>> {
    let columns = non_empty_columns(schema)?;
    let last = columns.len() - 1;
    let mut buf = encoded;
    let mut row = Vec::with_capacity(columns.len());

    for (i, column) in columns.iter().enumerate() {
        let value = match column.key_type {
            KeyType::Varchar if i == last => {
                let bytes = buf.to_vec();
                buf.advance(buf.len());
                KeyValue::Varchar(bytes)
            }
            KeyType::Varchar => KeyValue::Varchar(decode_escaped(&mut buf, &column.name)?),
            key_type => {
                // fixed_width is Some for every non-varchar type
                let width = key_type.fixed_width().unwrap_or(0);
                if buf.remaining() < width {
                    return Err(IndexError::KeyEncoding(format!(
                        "column '{}': need {} bytes, {} remaining",
                        column.name,
                        width,
                        buf.remaining()
                    )));
                }
                decode_fixed(&mut buf, key_type, &column.name)?
            }
        };
        row.push(value);
    }

    if buf.has_remaining() {
        return Err(IndexError::KeyEncoding(format!(
            "{} trailing bytes after last key column",
            buf.remaining()
        )));
    }

    Ok(row)
}

fn decode_fixed(buf: &mut &[u8], key_type: KeyType, column: &str) -> Result<KeyValue> {
    let value = match key_type {
        KeyType::Boolean => match buf.get_u8() {
            0 => KeyValue::Boolean(false),
            1 => KeyValue::Boolean(true),
            other => {
                return Err(IndexError::KeyEncoding(format!(
                    "column '{}': invalid boolean byte 0x{:02x}",
                    column, other
                )))
            }
        },
        KeyType::TinyInt => KeyValue::TinyInt((buf.get_u8() ^ 0x80) as i8),
        KeyType::SmallInt => KeyValue::SmallInt((buf.get_u16() ^ 0x8000) as i16),
        KeyType::Int => KeyValue::Int((buf.get_u32() ^ 0x8000_0000) as i32),
        KeyType::Date => KeyValue::Date((buf.get_u32() ^ 0x8000_0000) as i32),
        KeyType::BigInt => KeyValue::BigInt((buf.get_u64() ^ 0x8000_0000_0000_0000) as i64),
        KeyType::Datetime => {
            KeyValue::Datetime((buf.get_u64() ^ 0x8000_0000_0000_0000) as i64)
        }
        KeyType::LargeInt => KeyValue::LargeInt((buf.get_u128() ^ (1u128 << 127)) as i128),
        KeyType::Varchar => {
            return Err(IndexError::KeyEncoding(format!(
                "column '{}': varchar is not fixed-width",
                column
            )))
        }
    };
    Ok(value)
}

fn decode_escaped(buf: &mut &[u8], column: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        if !buf.has_remaining() {
            return Err(IndexError::KeyEncoding(format!(
                "column '{}': unterminated varchar",
                column
            )));
        }
        let b = buf.get_u8();
        if b != 0 {
            out.push(b);
            continue;
        }
        if !buf.has_remaining() {
            return Err(IndexError::KeyEncoding(format!(
                "column '{}': dangling zero byte in varchar",
                column
            )));
        }
        match buf.get_u8() {
            0x00 => return Ok(out),
            ESCAPE_ZERO => out.push(0),
            other => {
                return Err(IndexError::KeyEncoding(format!(
                    "column '{}': invalid escape byte 0x{:02x}",
                    column, other
                )))
            }
        }
    }
}
