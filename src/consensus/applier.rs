//! Apply Loop: the single writer of a replica
//!
//! Committed entries, snapshot saves and snapshot loads all go through one
//! channel and are handled strictly in arrival order, so a state machine never
//! sees two writes (or a write and a snapshot) at once.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::consensus::snapshot_io::{DirSnapshotReader, DirSnapshotWriter, SnapshotError};
use crate::consensus::{Response, StateProcessor, WriteRequest};

// ==========================================
// APPLY COMMANDS
// ==========================================

pub(crate) enum ApplyCommand {
    Write {
        request: WriteRequest,
        reply: oneshot::Sender<Response>,
    },
    SaveSnapshot {
        dir: PathBuf,
        reply: oneshot::Sender<Result<u64, SnapshotError>>,
    },
    LoadSnapshot {
        dir: PathBuf,
        reply: oneshot::Sender<Result<u64, SnapshotError>>,
    },
    AppliedIndex {
        reply: oneshot::Sender<u64>,
    },
}

// ==========================================
// APPLIER ACTOR
// ==========================================

pub struct Applier {
    processor: Arc<dyn StateProcessor>,
    rx: mpsc::Receiver<ApplyCommand>,
    applied_index: u64,
}

impl Applier {
    /// Spawns the loop on the current tokio runtime.
    pub fn spawn(processor: Arc<dyn StateProcessor>, channel_capacity: usize) -> ApplyHandle {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let actor = Self {
            processor,
            rx,
            applied_index: 0,
        };
        tokio::spawn(actor.run());
        ApplyHandle { tx }
    }

    async fn run(mut self) {
        let group = self.processor.group_category();
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                ApplyCommand::Write { request, reply } => {
                    self.applied_index += 1;
                    let response = self.processor.on_write_request(&request);
                    debug!("Group '{}' applied index {} (success: {})", group, self.applied_index, response.success);
                    let _ = reply.send(response);
                }
                ApplyCommand::SaveSnapshot { dir, reply } => {
                    let result = Self::save_snapshot(self.processor.clone(), self.applied_index, dir).await;
                    let _ = reply.send(result);
                }
                ApplyCommand::LoadSnapshot { dir, reply } => {
                    let _ = reply.send(self.load_snapshot(dir));
                }
                ApplyCommand::AppliedIndex { reply } => {
                    let _ = reply.send(self.applied_index);
                }
            }
        }
        debug!("Applier for group '{}' channel closed, exiting", group);
    }

    async fn save_snapshot(
        processor: Arc<dyn StateProcessor>,
        applied_index: u64,
        dir: PathBuf,
    ) -> Result<u64, SnapshotError> {
        let mut writer = DirSnapshotWriter::create(&dir, applied_index)?;

        let (done_tx, done_rx) = oneshot::channel();
        processor.on_snapshot_save(
            &mut writer,
            Box::new(move |ok, cause| {
                let _ = done_tx.send(match (ok, cause) {
                    (true, _) => Ok(()),
                    (false, Some(e)) => Err(e),
                    (false, None) => Err(SnapshotError::Io("snapshot save failed".to_string())),
                });
            }),
        );

        done_rx
            .await
            .map_err(|_| SnapshotError::Unavailable("snapshot callback dropped".to_string()))??;
        writer.finish()?;

        info!("Group '{}' snapshot at index {} written to {:?}", processor.group_category(), applied_index, dir);
        Ok(applied_index)
    }

    fn load_snapshot(&mut self, dir: PathBuf) -> Result<u64, SnapshotError> {
        let reader = DirSnapshotReader::open(&dir)?;
        if !self.processor.on_snapshot_load(&reader) {
            error!("Group '{}' rejected snapshot {:?}", self.processor.group_category(), dir);
            return Err(SnapshotError::Corrupt(format!("snapshot {:?} could not be loaded", dir)));
        }

        self.applied_index = reader.applied_index();
        info!(
            "Group '{}' loaded snapshot {:?} (index {}, created {})",
            self.processor.group_category(),
            dir,
            self.applied_index,
            reader.created_at()
        );
        Ok(self.applied_index)
    }
}

// ==========================================
// HANDLE
// ==========================================

#[derive(Clone)]
pub struct ApplyHandle {
    tx: mpsc::Sender<ApplyCommand>,
}

impl ApplyHandle {
    pub async fn apply(&self, request: WriteRequest) -> Response {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ApplyCommand::Write { request, reply }).await.is_err() {
            return Response::fail("INTERNAL", "apply loop stopped".to_string());
        }
        rx.await
            .unwrap_or_else(|_| Response::fail("INTERNAL", "apply loop dropped the request".to_string()))
    }

    /// Returns the applied index captured by the snapshot.
    pub async fn save_snapshot(&self, dir: impl Into<PathBuf>) -> Result<u64, SnapshotError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ApplyCommand::SaveSnapshot { dir: dir.into(), reply })
            .await
            .map_err(|_| SnapshotError::Unavailable("apply loop stopped".to_string()))?;
        rx.await
            .map_err(|_| SnapshotError::Unavailable("apply loop dropped the request".to_string()))?
    }

    /// Returns the applied index restored from the snapshot.
    pub async fn load_snapshot(&self, dir: impl Into<PathBuf>) -> Result<u64, SnapshotError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ApplyCommand::LoadSnapshot { dir: dir.into(), reply })
            .await
            .map_err(|_| SnapshotError::Unavailable("apply loop stopped".to_string()))?;
        rx.await
            .map_err(|_| SnapshotError::Unavailable("apply loop dropped the request".to_string()))?
    }

    pub async fn applied_index(&self) -> u64 {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ApplyCommand::AppliedIndex { reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
