//! Snapshot Writer
//!
//! Validates a `SnapshotMeta` and writes it as one self-contained stream.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::BufMut;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{IndexError, Result};

use super::{SnapshotMeta, SnapshotType, MAGIC, STREAM_VERSION};

impl SnapshotMeta {
    /// Write the snapshot to `path`
    ///
    /// The stream goes to a sibling temp file which is synced and then
    /// renamed over `path`. Nothing is created if validation fails.
    pub fn serialize_to_file(&self, path: &Path) -> Result<()> {
        let bytes = self.encode()?;
        let temp_path = temp_path_for(path);

        let result = write_synced(&temp_path, &bytes).and_then(|()| {
            fs::rename(&temp_path, path)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                debug!(
                    path = %path.display(),
                    bytes = bytes.len(),
                    rowsets = self.rowset_metas().len(),
                    delete_vectors = self.delete_vectors().len(),
                    "snapshot written"
                );
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot write failed");
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    /// Write the snapshot to an already open writer and flush it
    pub fn serialize_to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.encode()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Validate and encode the full stream, footer included
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        if self.snapshot_type() == SnapshotType::Unknown {
            return Err(IndexError::Serialization(
                "snapshot type is not set".to_string(),
            ));
        }
        let format_version = match self.snapshot_format() {
            Some(v) if v >= 0 => v,
            Some(v) => {
                return Err(IndexError::Serialization(format!(
                    "invalid snapshot format version {}",
                    v
                )))
            }
            None => {
                return Err(IndexError::Serialization(
                    "snapshot format version is not set".to_string(),
                ))
            }
        };
        let snapshot_version = match self.snapshot_version() {
            Some(v) if v >= 0 => v,
            Some(v) => {
                return Err(IndexError::Serialization(format!(
                    "invalid snapshot version {}",
                    v
                )))
            }
            None => {
                return Err(IndexError::Serialization(
                    "snapshot version is not set".to_string(),
                ))
            }
        };
        let tablet_meta = self.tablet_meta().ok_or_else(|| {
            IndexError::Serialization("tablet meta is not set".to_string())
        })?;

        let mut buf = Vec::new();
        buf.put_slice(MAGIC);
        buf.put_u16_le(STREAM_VERSION);

        buf.put_u8(self.snapshot_type().as_u8());
        buf.put_i32_le(format_version);
        buf.put_i64_le(snapshot_version);

        put_record(&mut buf, tablet_meta)?;

        buf.put_u32_le(count_u32(self.rowset_metas().len(), "rowset metas")?);
        for rowset in self.rowset_metas() {
            put_record(&mut buf, rowset)?;
        }

        let mut delete_vectors: Vec<_> = self.delete_vectors().iter().collect();
        delete_vectors.sort_unstable_by_key(|(segment_id, _)| **segment_id);

        buf.put_u32_le(count_u32(delete_vectors.len(), "delete vectors")?);
        for (segment_id, dv) in delete_vectors {
            buf.put_u32_le(*segment_id);
            dv.encode_to(&mut buf)?;
        }

        let crc = crc32fast::hash(&buf);
        buf.put_u32_le(crc);
        Ok(buf)
    }
}

/// Append `[len u32][bincode bytes]`
fn put_record<T: Serialize>(buf: &mut Vec<u8>, record: &T) -> Result<()> {
    let payload = bincode::serialize(record)?;
    buf.put_u32_le(count_u32(payload.len(), "record")?);
    buf.put_slice(&payload);
    Ok(())
}

fn count_u32(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n)
        .map_err(|_| IndexError::Serialization(format!("too many {}: {}", what, n)))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
