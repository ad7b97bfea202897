//! Snapshot Reader
//!
//! Parses and verifies a snapshot stream.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::Buf;
use serde::de::DeserializeOwned;

use crate::error::{IndexError, Result};
use crate::tablet::DelVector;

use super::{SnapshotMeta, SnapshotType, FOOTER_SIZE, HEADER_SIZE, MAGIC, STREAM_VERSION};

/// SnapshotType (1) + FormatVersion (4) + SnapshotVersion (8)
const FIXED_FIELDS_SIZE: usize = 13;

impl SnapshotMeta {
    /// Read a snapshot previously written by `serialize_to_file`
    pub fn parse_from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::parse_from_reader(&mut file)
    }

    /// Read a snapshot from the current position of `reader` to its end
    pub fn parse_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::decode(&bytes)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(format!(
                "snapshot is {} bytes, shorter than header and footer",
                bytes.len()
            )));
        }

        let (content, mut footer) = bytes.split_at(bytes.len() - FOOTER_SIZE);
        let stored_crc = footer.get_u32_le();
        let actual_crc = crc32fast::hash(content);
        if stored_crc != actual_crc {
            return Err(corrupt(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                stored_crc, actual_crc
            )));
        }

        let mut buf = content;
        if &buf[..MAGIC.len()] != MAGIC {
            return Err(corrupt(format!(
                "invalid magic: expected PKSN, got {:?}",
                &buf[..MAGIC.len()]
            )));
        }
        buf.advance(MAGIC.len());

        let stream_version = buf.get_u16_le();
        if stream_version != STREAM_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot stream version {}",
                stream_version
            )));
        }

        need(buf, FIXED_FIELDS_SIZE, "snapshot header fields")?;
        let snapshot_type = SnapshotType::from_u8(buf.get_u8())?;
        if snapshot_type == SnapshotType::Unknown {
            return Err(corrupt("snapshot type is unknown".to_string()));
        }
        let format_version = buf.get_i32_le();
        let snapshot_version = buf.get_i64_le();
        if format_version < 0 || snapshot_version < 0 {
            return Err(corrupt(format!(
                "negative version: format {}, snapshot {}",
                format_version, snapshot_version
            )));
        }

        let mut meta = SnapshotMeta::new();
        meta.set_snapshot_type(snapshot_type);
        meta.set_snapshot_format(format_version);
        meta.set_snapshot_version(snapshot_version);
        meta.set_tablet_meta(get_record(&mut buf, "tablet meta")?);

        let rowset_count = get_u32(&mut buf, "rowset count")?;
        for _ in 0..rowset_count {
            let rowset = get_record(&mut buf, "rowset meta")?;
            meta.rowset_metas_mut().push(rowset);
        }

        let dv_count = get_u32(&mut buf, "delete vector count")?;
        let mut delete_vectors = HashMap::with_capacity((dv_count as usize).min(buf.len()));
        for _ in 0..dv_count {
            let segment_id = get_u32(&mut buf, "delete vector segment id")?;
            let dv = DelVector::decode_from(&mut buf)?;
            if delete_vectors.insert(segment_id, dv).is_some() {
                return Err(corrupt(format!(
                    "duplicate delete vector for segment {}",
                    segment_id
                )));
            }
        }
        *meta.delete_vectors_mut() = delete_vectors;

        if buf.has_remaining() {
            return Err(corrupt(format!(
                "{} unexpected bytes after delete vectors",
                buf.remaining()
            )));
        }

        Ok(meta)
    }
}

fn corrupt(msg: String) -> IndexError {
    IndexError::DataCorruption(msg)
}

fn need(buf: &[u8], n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(corrupt(format!(
            "truncated {}: need {} bytes, {} remaining",
            what,
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

fn get_u32(buf: &mut &[u8], what: &str) -> Result<u32> {
    need(buf, 4, what)?;
    Ok(buf.get_u32_le())
}

/// Read `[len u32][bincode bytes]`
fn get_record<T: DeserializeOwned>(buf: &mut &[u8], what: &str) -> Result<T> {
    let len = get_u32(buf, what)? as usize;
    need(buf, len, what)?;
    let data: &[u8] = *buf;
    let (payload, rest) = data.split_at(len);
    let record = bincode::deserialize(payload)
        .map_err(|e| corrupt(format!("malformed {}: {}", what, e)))?;
    *buf = rest;
    Ok(record)
}
