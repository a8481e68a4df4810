//! Retained State Machine: bridges consensus requests to the retained store
//!
//! Registered under `GROUP_RETAINED_MSG`. Writes come from the apply loop in
//! log order; reads are served locally from any caller thread.

use std::collections::HashMap;
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::brokers::retained::errors::RetainedError;
use crate::brokers::retained::snapshot;
use crate::brokers::retained::store::RetainedStore;
use crate::config::RetainedConfig;
use crate::consensus::snapshot_io::{SnapshotReader, SnapshotWriter};
use crate::consensus::{
    ReadRequest, Response, SnapshotDone, StateProcessor, WriteRequest, EXT_FIRST_TOPIC,
    EXT_IS_EMPTY, EXT_TOPIC, GROUP_RETAINED_MSG, OP_TOPIC,
};

/// Returned as data when a point read finds nothing. Existing callers match on it.
pub const NULL_PAYLOAD: &[u8] = b"null";

impl From<RetainedError> for Response {
    fn from(error: RetainedError) -> Self {
        Response::fail(error.kind(), error.to_string())
    }
}

pub struct RetainedMsgStateMachine {
    store: RetainedStore,
}

impl RetainedMsgStateMachine {
    pub fn new(config: &RetainedConfig) -> Self {
        Self {
            store: RetainedStore::new(config),
        }
    }

    pub fn store(&self) -> &RetainedStore {
        &self.store
    }

    fn apply_write(&self, request: &WriteRequest) -> Result<Bytes, RetainedError> {
        let first_topic = required(&request.ext_data, EXT_FIRST_TOPIC)?;
        let topic = required(&request.ext_data, EXT_TOPIC)?;
        let is_empty = request
            .ext_data
            .get(EXT_IS_EMPTY)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let topic = if is_empty {
            let topic = self.store.remove(first_topic, topic)?;
            info!("Delete the topic {} retained message", topic);
            topic
        } else {
            let topic = self.store.put(first_topic, topic, request.data.clone())?;
            info!("Put the topic {} retained message success", topic);
            topic
        };

        let ack = serde_json::to_vec(&topic)
            .map_err(|e| RetainedError::Internal(format!("encode ack: {}", e)))?;
        Ok(Bytes::from(ack))
    }

    fn serve_read(&self, request: &ReadRequest) -> Result<Response, RetainedError> {
        let topic = required(&request.ext_data, EXT_TOPIC)?;
        debug!(
            "Read operation:{} topic:{} firstTopic:{:?}",
            request.operation,
            topic,
            request.ext_data.get(EXT_FIRST_TOPIC)
        );

        if request.operation == OP_TOPIC {
            let payload = self
                .store
                .get(topic)
                .unwrap_or_else(|| Bytes::from_static(NULL_PAYLOAD));
            return Ok(Response::ok(payload));
        }

        let first_topic = required(&request.ext_data, EXT_FIRST_TOPIC)?;
        Ok(Response::ok_list(self.store.match_payloads(first_topic, topic)))
    }
}

impl StateProcessor for RetainedMsgStateMachine {
    fn on_read_request(&self, request: &ReadRequest) -> Response {
        match self.serve_read(request) {
            Ok(response) => response,
            Err(e) => {
                error!("Read retained message failed: {}", e);
                e.into()
            }
        }
    }

    fn on_write_request(&self, request: &WriteRequest) -> Response {
        match self.apply_write(request) {
            Ok(ack) => Response::ok(ack),
            Err(e @ RetainedError::CapacityExceeded { .. }) => {
                warn!("Put the retained message failed: {}", e);
                e.into()
            }
            Err(e) => {
                error!("Put the retained message error: {}", e);
                e.into()
            }
        }
    }

    fn on_snapshot_save(&self, writer: &mut dyn SnapshotWriter, done: SnapshotDone) {
        let data = self.store.export();
        match snapshot::save(writer, &data) {
            Ok(()) => done(true, None),
            Err(e) => {
                error!("Retained snapshot save failed: {}", e);
                done(false, Some(e));
            }
        }
    }

    fn on_snapshot_load(&self, reader: &dyn SnapshotReader) -> bool {
        match snapshot::load(reader) {
            Ok(data) => {
                self.store.restore(data);
                true
            }
            Err(e) => {
                error!("Retained snapshot load from {:?} failed: {}", reader.path(), e);
                false
            }
        }
    }

    fn group_category(&self) -> &'static str {
        GROUP_RETAINED_MSG
    }
}

fn required<'a>(ext_data: &'a HashMap<String, String>, key: &str) -> Result<&'a str, RetainedError> {
    ext_data
        .get(key)
        .map(|v| v.as_str())
        .ok_or_else(|| RetainedError::MalformedRequest(format!("missing '{}'", key)))
}
