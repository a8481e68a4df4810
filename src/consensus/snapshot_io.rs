//! Snapshot Handles: directory-backed reader/writer passed to state machines
//!
//! A snapshot is a directory holding the files a state machine registered plus
//! `snapshot_meta.json` (applied index, file list, creation time).
//!
//! Writers fill a sibling `<dir>.staging` directory and publish it with
//! renames once the meta file is sealed, so `<dir>` always holds one complete
//! snapshot. The replaced one is parked as `<dir>.prev` during the swap;
//! readers fall back to it if a crash hit between the two renames.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const META_FILE: &str = "snapshot_meta.json";

// ========================================
// ERRORS
// ========================================

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    Io(String),
    Corrupt(String),
    Codec(String),
    Unavailable(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(msg) => write!(f, "snapshot I/O error: {}", msg),
            SnapshotError::Corrupt(msg) => write!(f, "snapshot corrupt: {}", msg),
            SnapshotError::Codec(msg) => write!(f, "snapshot codec error: {}", msg),
            SnapshotError::Unavailable(msg) => write!(f, "snapshot unavailable: {}", msg),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<std::io::Error> for SnapshotError {
    fn from(error: std::io::Error) -> Self {
        SnapshotError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(error: serde_json::Error) -> Self {
        SnapshotError::Codec(error.to_string())
    }
}

// ========================================
// HANDLES
// ========================================

pub trait SnapshotWriter: Send {
    fn path(&self) -> &Path;

    /// Registers a file already written under `path()`.
    fn add_file(&mut self, name: &str) -> bool;
}

pub trait SnapshotReader: Send + Sync {
    fn path(&self) -> &Path;

    fn list_files(&self) -> Vec<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMeta {
    applied_index: u64,
    created_at: String,
    files: Vec<String>,
}

pub struct DirSnapshotWriter {
    target: PathBuf,
    staging: PathBuf,
    applied_index: u64,
    files: Vec<String>,
}

impl DirSnapshotWriter {
    pub fn create(dir: impl Into<PathBuf>, applied_index: u64) -> Result<Self, SnapshotError> {
        let target = dir.into();
        let staging = sibling(&target, "staging");
        if staging.exists() {
            // Leftover of an interrupted save
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        Ok(Self {
            target,
            staging,
            applied_index,
            files: Vec::new(),
        })
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Seals the snapshot by writing its meta file, then publishes it as the
    /// target directory.
    pub fn finish(self) -> Result<(), SnapshotError> {
        let meta = SnapshotMeta {
            applied_index: self.applied_index,
            created_at: chrono::Utc::now().to_rfc3339(),
            files: self.files,
        };
        let mut out = File::create(self.staging.join(META_FILE))?;
        out.write_all(&serde_json::to_vec_pretty(&meta)?)?;
        out.sync_all()?;

        let previous = sibling(&self.target, "prev");
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        if self.target.exists() {
            fs::rename(&self.target, &previous)?;
        }
        fs::rename(&self.staging, &self.target)?;
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        Ok(())
    }
}

impl SnapshotWriter for DirSnapshotWriter {
    fn path(&self) -> &Path {
        &self.staging
    }

    fn add_file(&mut self, name: &str) -> bool {
        if !self.staging.join(name).is_file() {
            warn!("Snapshot file {:?} missing in {:?}", name, self.staging);
            return false;
        }
        if !self.files.iter().any(|f| f == name) {
            self.files.push(name.to_string());
        }
        true
    }
}

pub struct DirSnapshotReader {
    dir: PathBuf,
    meta: SnapshotMeta,
}

impl DirSnapshotReader {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let target = dir.into();
        let dir = if target.join(META_FILE).exists() {
            target
        } else {
            let previous = sibling(&target, "prev");
            if !previous.join(META_FILE).exists() {
                return Err(SnapshotError::Unavailable(format!("no snapshot in {:?}", target)));
            }
            warn!("Snapshot {:?} incomplete, falling back to {:?}", target, previous);
            previous
        };
        let meta: SnapshotMeta = serde_json::from_slice(&fs::read(dir.join(META_FILE))?)?;
        Ok(Self { dir, meta })
    }

    pub fn applied_index(&self) -> u64 {
        self.meta.applied_index
    }

    pub fn created_at(&self) -> &str {
        &self.meta.created_at
    }
}

impl SnapshotReader for DirSnapshotReader {
    fn path(&self) -> &Path {
        &self.dir
    }

    fn list_files(&self) -> Vec<String> {
        self.meta.files.clone()
    }
}

/// True when `dir` (or its parked predecessor) holds a sealed snapshot.
pub fn snapshot_exists(dir: &Path) -> bool {
    dir.join(META_FILE).exists() || sibling(dir, "prev").join(META_FILE).exists()
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    dir.with_file_name(format!("{}.{}", name, suffix))
}
