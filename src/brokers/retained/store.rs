//! Retained Store: payload map + one topic trie per first topic (namespace)
//!
//! Concurrency contract:
//! - Writes (`put`/`remove`) arrive one at a time from the apply loop. `put`
//!   also holds the namespace trie write lock across check-then-insert, so the
//!   capacity gate holds even if two writers ever raced.
//! - Point reads only touch the payload map and never wait on the writer.
//!   Wildcard reads take the namespace trie read lock, so they wait while a
//!   `put`/`remove` on the same namespace holds the write lock (one trie
//!   walk, no I/O). Other namespaces are unaffected.
//! - `put` stores the payload before marking the trie and `remove` unmarks the
//!   trie before dropping the payload, so a reader can at worst see a trie
//!   match whose payload is already gone, which `match_payloads` skips.
//! - `restore` swaps the whole state in one step.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::brokers::retained::errors::RetainedError;
use crate::brokers::retained::snapshot::RetainedSnapshotData;
use crate::brokers::retained::summary::{NamespaceSummary, RetainedBrokerSummary};
use crate::brokers::retained::topic::{
    namespace_of, normalize_topic, segments, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD,
};
use crate::brokers::retained::trie::TopicTrie;
use crate::config::RetainedConfig;

pub(crate) type SharedTrie = Arc<RwLock<TopicTrie>>;

#[derive(Default)]
struct RetainedState {
    // normalized topic -> payload
    payloads: DashMap<String, Bytes>,
    // namespace -> trie of its retained topics
    tries: DashMap<String, SharedTrie>,
}

impl RetainedState {
    fn trie(&self, namespace: &str) -> SharedTrie {
        if let Some(trie) = self.tries.get(namespace) {
            return trie.value().clone();
        }
        self.tries
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(TopicTrie::new())))
            .value()
            .clone()
    }
}

pub struct RetainedStore {
    state: RwLock<Arc<RetainedState>>,
    max_per_namespace: usize,
    // 0 = unlimited
    max_topic_levels: usize,
}

impl RetainedStore {
    pub fn new(config: &RetainedConfig) -> Self {
        Self {
            state: RwLock::new(Arc::new(RetainedState::default())),
            max_per_namespace: config.max_per_namespace,
            max_topic_levels: config.max_topic_levels,
        }
    }

    fn current(&self) -> Arc<RetainedState> {
        self.state.read().clone()
    }

    // ========================================
    // READS
    // ========================================

    pub fn get(&self, topic: &str) -> Option<Bytes> {
        let topic = normalize_topic(topic);
        let state = self.current();
        let payload = state.payloads.get(&topic).map(|entry| entry.value().clone());
        payload
    }

    /// Payloads of every retained topic in `first_topic`'s namespace matching
    /// `filter`. An unseen namespace gets an empty trie and yields nothing.
    pub fn match_payloads(&self, first_topic: &str, filter: &str) -> Vec<Bytes> {
        if filter.trim().is_empty() {
            return Vec::new();
        }
        let state = self.current();
        let namespace = namespace_of(first_topic);
        let filter = normalize_topic(filter);

        let shared = state.trie(&namespace);
        let matched = shared.read().match_all(&filter);
        debug!("Namespace '{}' filter '{}' matched {} topics", namespace, filter, matched.len());

        matched
            .iter()
            .filter_map(|topic| state.payloads.get(topic).map(|entry| entry.value().clone()))
            .collect()
    }

    pub fn namespace_len(&self, first_topic: &str) -> usize {
        let namespace = namespace_of(first_topic);
        let state = self.current();
        let len = match state.tries.get(&namespace) {
            Some(trie) => trie.value().read().len(),
            None => 0,
        };
        len
    }

    pub fn contains_namespace(&self, first_topic: &str) -> bool {
        self.current().tries.contains_key(&namespace_of(first_topic))
    }

    pub fn total_topics(&self) -> usize {
        self.current().payloads.len()
    }

    // ========================================
    // WRITES (apply path only)
    // ========================================

    /// Stores or replaces the payload for `topic`. A topic new to its namespace
    /// is rejected once the namespace holds `max_per_namespace` topics.
    /// Returns the normalized topic.
    pub fn put(&self, first_topic: &str, topic: &str, payload: Bytes) -> Result<String, RetainedError> {
        let (namespace, topic) = Self::resolve(first_topic, topic)?;
        let levels = segments(&topic).len();
        if self.max_topic_levels > 0 && levels > self.max_topic_levels {
            return Err(RetainedError::MalformedRequest(format!(
                "topic has {} levels, limit is {}",
                levels, self.max_topic_levels
            )));
        }

        let state = self.current();
        let shared = state.trie(&namespace);

        let mut trie = shared.write();
        if !trie.contains(&topic) && trie.len() >= self.max_per_namespace {
            return Err(RetainedError::CapacityExceeded {
                namespace,
                limit: self.max_per_namespace,
            });
        }

        state.payloads.insert(topic.clone(), payload);
        trie.insert(&topic);
        debug!("Namespace '{}' now holds {} retained topics", namespace, trie.len());
        Ok(topic)
    }

    /// Drops `topic`. Unknown topics are a no-op. Returns the normalized topic.
    pub fn remove(&self, first_topic: &str, topic: &str) -> Result<String, RetainedError> {
        let (namespace, topic) = Self::resolve(first_topic, topic)?;
        let state = self.current();
        let shared = state.trie(&namespace);

        let mut trie = shared.write();
        let existed = trie.delete(&topic);
        state.payloads.remove(&topic);
        debug!("Namespace '{}' delete '{}' (existed: {})", namespace, topic, existed);
        Ok(topic)
    }

    fn resolve(first_topic: &str, topic: &str) -> Result<(String, String), RetainedError> {
        if topic.trim().is_empty() {
            return Err(RetainedError::MalformedRequest("topic is empty".to_string()));
        }
        if first_topic.trim().is_empty() {
            return Err(RetainedError::MalformedRequest("firstTopic is empty".to_string()));
        }

        if topic.contains(SINGLE_LEVEL_WILDCARD) || topic.contains(MULTI_LEVEL_WILDCARD) {
            return Err(RetainedError::MalformedRequest(format!(
                "retained topic '{}' must not contain wildcards",
                topic
            )));
        }

        let namespace = namespace_of(first_topic);
        let topic = normalize_topic(topic);
        let topic_namespace = namespace_of(&topic);
        if topic_namespace != namespace {
            return Err(RetainedError::MalformedRequest(format!(
                "topic '{}' does not belong to first topic '{}'",
                topic, namespace
            )));
        }
        Ok((namespace, topic))
    }

    // ========================================
    // SNAPSHOT SUPPORT
    // ========================================

    pub fn export(&self) -> RetainedSnapshotData {
        let state = self.current();

        let payloads: BTreeMap<String, Bytes> = state
            .payloads
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let namespaces: BTreeMap<String, Vec<String>> = state
            .tries
            .iter()
            .map(|entry| {
                let mut topics = entry.value().read().topics();
                topics.sort();
                (entry.key().clone(), topics)
            })
            .collect();

        RetainedSnapshotData { payloads, namespaces }
    }

    /// Replaces the whole state with `data`. Topics without payload, topics
    /// listed under a foreign namespace and payloads without a trie entry are
    /// dropped.
    pub fn restore(&self, data: RetainedSnapshotData) {
        let RetainedSnapshotData { mut payloads, namespaces } = data;
        let fresh = RetainedState::default();
        let mut indexed = HashSet::new();

        for (namespace, topics) in namespaces {
            let mut trie = TopicTrie::new();
            for topic in topics {
                if namespace_of(&topic) != namespace {
                    warn!("Snapshot topic '{}' listed under namespace '{}', dropped", topic, namespace);
                    continue;
                }
                match payloads.remove(&topic) {
                    Some(payload) => {
                        trie.insert(&topic);
                        fresh.payloads.insert(topic.clone(), payload);
                        indexed.insert(topic);
                    }
                    None if indexed.contains(&topic) => {}
                    None => warn!("Snapshot topic '{}' has no payload, dropped", topic),
                }
            }
            fresh.tries.insert(namespace, Arc::new(RwLock::new(trie)));
        }

        for topic in payloads.keys() {
            warn!("Snapshot payload for '{}' has no trie entry, dropped", topic);
        }

        let total = fresh.payloads.len();
        *self.state.write() = Arc::new(fresh);
        info!("Retained store restored: {} topics", total);
    }

    pub fn summary(&self) -> RetainedBrokerSummary {
        let state = self.current();
        let mut namespaces: Vec<NamespaceSummary> = state
            .tries
            .iter()
            .map(|entry| {
                let trie = entry.value().read();
                NamespaceSummary {
                    name: entry.key().clone(),
                    topics: trie.len(),
                    nodes: trie.node_count(),
                }
            })
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));

        RetainedBrokerSummary {
            total_topics: state.payloads.len(),
            max_per_namespace: self.max_per_namespace,
            namespaces,
        }
    }
}
