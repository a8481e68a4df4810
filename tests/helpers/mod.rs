#![allow(dead_code)]

use bytes::Bytes;
use nexo_meta::config::{Config, RetainedConfig};
use nexo_meta::consensus::{ReadRequest, Response, WriteRequest};
use nexo_meta::MetaEngine;
use std::path::PathBuf;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub fn config_with_limit(max_per_namespace: usize) -> Config {
    Config {
        retained: RetainedConfig::with_limit(max_per_namespace),
        ..Config::default()
    }
}

pub async fn setup_engine(max_per_namespace: usize) -> (MetaEngine, TempDir) {
    setup_engine_with(config_with_limit(max_per_namespace)).await
}

pub async fn setup_engine_with(config: Config) -> (MetaEngine, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let engine = MetaEngine::new(&config);
    (engine, temp_dir)
}

/// `namespace/x/x/...` with `levels` levels in total.
pub fn deep_topic(namespace: &str, levels: usize) -> String {
    format!("{}{}", namespace, "/x".repeat(levels.saturating_sub(1)))
}

/// Fresh snapshot directory under the test's temp dir.
pub fn snapshot_dir(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join(format!("snap-{}", uuid::Uuid::new_v4()))
}

fn first_segment(topic: &str) -> &str {
    topic.split('/').next().unwrap()
}

pub async fn put(engine: &MetaEngine, topic: &str, payload: &str) -> Response {
    engine
        .write(WriteRequest::retained(first_segment(topic), topic, false, Bytes::from(payload.to_string())))
        .await
}

pub async fn delete(engine: &MetaEngine, topic: &str) -> Response {
    engine
        .write(WriteRequest::retained(first_segment(topic), topic, true, Bytes::new()))
        .await
}

pub fn point_read(engine: &MetaEngine, topic: &str) -> Bytes {
    let response = engine.read(&ReadRequest::topic(topic));
    assert!(response.success, "point read failed: {:?}", response.err_msg);
    response.data.expect("point read always carries data")
}

pub fn match_read(engine: &MetaEngine, first_topic: &str, filter: &str) -> Vec<Bytes> {
    let response = engine.read(&ReadRequest::matching(first_topic, filter));
    assert!(response.success, "match read failed: {:?}", response.err_msg);
    let mut payloads = response.data_list;
    payloads.sort();
    payloads
}

pub fn payloads(values: &[&str]) -> Vec<Bytes> {
    let mut out: Vec<Bytes> = values.iter().map(|v| Bytes::from(v.to_string())).collect();
    out.sort();
    out
}

/// Times individual operations and reports latency percentiles.
pub struct Benchmark {
    label: String,
    started: Instant,
    samples: Vec<Duration>,
}

impl Benchmark {
    pub fn start(label: &str, expected_ops: usize) -> Self {
        Self {
            label: label.to_string(),
            started: Instant::now(),
            samples: Vec::with_capacity(expected_ops),
        }
    }

    pub fn time<T>(&mut self, op: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = op();
        self.samples.push(started.elapsed());
        out
    }

    pub async fn time_async<T>(&mut self, op: impl Future<Output = T>) -> T {
        let started = Instant::now();
        let out = op.await;
        self.samples.push(started.elapsed());
        out
    }

    pub fn finish(mut self) -> BenchReport {
        let elapsed = self.started.elapsed();
        self.samples.sort();
        BenchReport {
            ops: self.samples.len(),
            elapsed,
            p50: percentile(&self.samples, 50),
            p99: percentile(&self.samples, 99),
            max: self.samples.last().copied().unwrap_or_default(),
            label: self.label,
        }
    }
}

pub struct BenchReport {
    pub label: String,
    pub ops: usize,
    pub elapsed: Duration,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl BenchReport {
    pub fn ops_per_sec(&self) -> f64 {
        self.ops as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ops in {:.2?} ({:.0} ops/sec) | p50 {:?} | p99 {:?} | max {:?}",
            self.label,
            self.ops,
            self.elapsed,
            self.ops_per_sec(),
            self.p50,
            self.p99,
            self.max
        )
    }
}

fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    sorted.get(sorted.len() * pct / 100).copied().unwrap_or_default()
}
