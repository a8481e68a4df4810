//! Consensus Contract: the shapes a replication engine hands to a state machine
//!
//! Writes are committed log entries applied one at a time in log order (see
//! `applier`). Reads bypass the log and are served locally, concurrently.

pub mod applier;
pub mod snapshot_io;

use std::collections::HashMap;
use bytes::Bytes;

use crate::consensus::snapshot_io::{SnapshotError, SnapshotReader, SnapshotWriter};

pub use applier::{ApplyHandle, Applier};

// ========================================
// GROUPS & KEYS
// ========================================

pub const GROUP_RETAINED_MSG: &str = "retainedMsg";

pub const EXT_FIRST_TOPIC: &str = "firstTopic";
pub const EXT_TOPIC: &str = "topic";
pub const EXT_IS_EMPTY: &str = "isEmpty";

/// Point lookup; any other operation is a wildcard match.
pub const OP_TOPIC: &str = "topic";
pub const OP_TRIE: &str = "trie";

// ========================================
// REQUESTS
// ========================================

#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    pub group: String,
    pub ext_data: HashMap<String, String>,
    pub data: Bytes,
}

impl WriteRequest {
    pub fn retained(first_topic: &str, topic: &str, is_empty: bool, data: Bytes) -> Self {
        let mut ext_data = HashMap::new();
        ext_data.insert(EXT_FIRST_TOPIC.to_string(), first_topic.to_string());
        ext_data.insert(EXT_TOPIC.to_string(), topic.to_string());
        ext_data.insert(EXT_IS_EMPTY.to_string(), is_empty.to_string());
        Self {
            group: GROUP_RETAINED_MSG.to_string(),
            ext_data,
            data,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    pub group: String,
    pub operation: String,
    pub ext_data: HashMap<String, String>,
}

impl ReadRequest {
    /// Point read of a single retained topic
    pub fn topic(topic: &str) -> Self {
        let mut ext_data = HashMap::new();
        ext_data.insert(EXT_TOPIC.to_string(), topic.to_string());
        Self {
            group: GROUP_RETAINED_MSG.to_string(),
            operation: OP_TOPIC.to_string(),
            ext_data,
        }
    }

    /// Wildcard read of every retained topic in `first_topic` matching `filter`
    pub fn matching(first_topic: &str, filter: &str) -> Self {
        let mut ext_data = HashMap::new();
        ext_data.insert(EXT_FIRST_TOPIC.to_string(), first_topic.to_string());
        ext_data.insert(EXT_TOPIC.to_string(), filter.to_string());
        Self {
            group: GROUP_RETAINED_MSG.to_string(),
            operation: OP_TRIE.to_string(),
            ext_data,
        }
    }
}

// ========================================
// RESPONSE
// ========================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub success: bool,
    pub data: Option<Bytes>,
    pub data_list: Vec<Bytes>,
    pub err_msg: Option<String>,
    pub error_kind: Option<String>,
}

impl Response {
    pub fn ok(data: Bytes) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn ok_list(data_list: Vec<Bytes>) -> Self {
        Self {
            success: true,
            data_list,
            ..Default::default()
        }
    }

    pub fn fail(kind: &str, err_msg: String) -> Self {
        Self {
            success: false,
            err_msg: Some(err_msg),
            error_kind: Some(kind.to_string()),
            ..Default::default()
        }
    }
}

// ========================================
// STATE PROCESSOR
// ========================================

/// Completion callback for a snapshot save: (success, failure cause)
pub type SnapshotDone = Box<dyn FnOnce(bool, Option<SnapshotError>) + Send>;

/// A state machine registered under one replication group.
/// Failures never escape: they come back as `Response { success: false, .. }`.
pub trait StateProcessor: Send + Sync {
    fn on_read_request(&self, request: &ReadRequest) -> Response;

    /// Called sequentially, in log order.
    fn on_write_request(&self, request: &WriteRequest) -> Response;

    fn on_snapshot_save(&self, writer: &mut dyn SnapshotWriter, done: SnapshotDone);

    /// Replaces (never merges) in-memory state. False leaves prior state in place.
    fn on_snapshot_load(&self, reader: &dyn SnapshotReader) -> bool;

    fn group_category(&self) -> &'static str;
}
