pub mod brokers;
pub mod config;
pub mod consensus;

use std::sync::Arc;
use std::time::Instant;
use crate::brokers::retained::RetainedMsgStateMachine;
use crate::config::Config;
use crate::consensus::{Applier, ApplyHandle, ReadRequest, Response, StateProcessor, WriteRequest};

// ========================================
// ENGINE
// ========================================

/// One replica of the retained-message group.
/// Cheap to clone: writes funnel through the apply loop, reads hit the state machine directly.
#[derive(Clone)]
pub struct MetaEngine {
    pub retained: Arc<RetainedMsgStateMachine>,
    pub applier: ApplyHandle,
    pub start_time: Instant,
}

impl MetaEngine {
    /// Must be called inside a tokio runtime (spawns the apply loop).
    pub fn new(config: &Config) -> Self {
        let retained = Arc::new(RetainedMsgStateMachine::new(&config.retained));
        let applier = Applier::spawn(retained.clone(), config.retained.apply_channel_capacity);

        Self {
            retained,
            applier,
            start_time: Instant::now(),
        }
    }

    pub async fn write(&self, request: WriteRequest) -> Response {
        self.applier.apply(request).await
    }

    pub fn read(&self, request: &ReadRequest) -> Response {
        self.retained.on_read_request(request)
    }
}
