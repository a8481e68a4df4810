//! Retained Snapshot Codec
//!
//! File layout: [Len: u32][CRC32: u32][JSON body]. The body carries the
//! payload map and, per namespace, the sorted list of stored topics. Tries are
//! rebuilt from those lists on load.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use bytes::{BufMut, Bytes, BytesMut};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consensus::snapshot_io::{SnapshotError, SnapshotReader, SnapshotWriter};

pub const SNAPSHOT_FILE: &str = "retained_msg.snapshot";
pub const SNAPSHOT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetainedSnapshotData {
    // normalized topic -> payload
    pub payloads: BTreeMap<String, Bytes>,
    // namespace -> stored topics (sorted)
    pub namespaces: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    version: u32,
    data: RetainedSnapshotData,
}

pub fn encode(data: &RetainedSnapshotData) -> Result<Bytes, SnapshotError> {
    let body = serde_json::to_vec(&SnapshotBody {
        version: SNAPSHOT_VERSION,
        data: data.clone(),
    })?;

    let mut hasher = Hasher::new();
    hasher.update(&body);
    let crc = hasher.finalize();

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u32(body.len() as u32);
    buf.put_u32(crc);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

pub fn decode(raw: &[u8]) -> Result<RetainedSnapshotData, SnapshotError> {
    if raw.len() < HEADER_LEN {
        return Err(SnapshotError::Corrupt("truncated header".to_string()));
    }
    let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let stored_crc = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let body = &raw[HEADER_LEN..];

    if body.len() != len {
        return Err(SnapshotError::Corrupt(format!(
            "expected {} body bytes, found {}",
            len,
            body.len()
        )));
    }

    let mut hasher = Hasher::new();
    hasher.update(body);
    if hasher.finalize() != stored_crc {
        return Err(SnapshotError::Corrupt("CRC mismatch".to_string()));
    }

    let parsed: SnapshotBody = serde_json::from_slice(body)?;
    if parsed.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Codec(format!(
            "unsupported snapshot version {}",
            parsed.version
        )));
    }
    Ok(parsed.data)
}

/// Writes the snapshot file under the writer's directory and registers it.
pub fn save(writer: &mut dyn SnapshotWriter, data: &RetainedSnapshotData) -> Result<(), SnapshotError> {
    let encoded = encode(data)?;
    let path = writer.path().join(SNAPSHOT_FILE);
    let tmp = writer.path().join(format!("{}.tmp", SNAPSHOT_FILE));

    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        out.write_all(&encoded)?;
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&tmp, &path)?;

    if !writer.add_file(SNAPSHOT_FILE) {
        return Err(SnapshotError::Io(format!("failed to register {}", SNAPSHOT_FILE)));
    }
    info!("Retained snapshot saved: {} topics, {} bytes", data.payloads.len(), encoded.len());
    Ok(())
}

pub fn load(reader: &dyn SnapshotReader) -> Result<RetainedSnapshotData, SnapshotError> {
    if !reader.list_files().iter().any(|f| f == SNAPSHOT_FILE) {
        return Err(SnapshotError::Unavailable(format!(
            "{} not listed in {:?}",
            SNAPSHOT_FILE,
            reader.path()
        )));
    }
    let raw = fs::read(reader.path().join(SNAPSHOT_FILE))?;
    decode(&raw)
}
