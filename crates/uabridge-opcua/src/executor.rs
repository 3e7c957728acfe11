// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Read, write, browse and method operations over the managed session.
//!
//! Node ids arrive as text. Single operations fail as a whole; batch
//! operations return one [`BatchEntry`] per request in request order, so a
//! bad id or a rejected value only affects its own entry.
//!
//! # Batch Write Pipeline
//!
//! ```text
//!  requests ──► parse ids ──► ONE batched read ──► coerce each ──► ONE batched write
//!                  │               │                   │                │
//!                  ▼               ▼                   ▼                ▼
//!              entry error     entry error         entry error     entry outcome
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::client::{ConnectionManager, OpcUaTransport, OpcUaValue, ReadResult, WriteResult};
use crate::coercion::{coerce, coerce_method_argument};
use crate::error::{
    is_good_status, BrowseError, MethodError, OpcUaError, OpcUaResult, OperationError,
};
use crate::types::NodeId;

// =============================================================================
// Request / Result Types
// =============================================================================

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Target node id, in text form.
    pub node_id: String,
    /// Value text, coerced against the node's current value.
    pub value: String,
}

impl WriteRequest {
    /// Creates a write request.
    pub fn new(node_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            value: value.into(),
        }
    }
}

/// A method invocation with textual arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Object the method is called on.
    pub object_id: String,
    /// Method node.
    pub method_id: String,
    /// Arguments in declaration order.
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl MethodCall {
    /// Creates a method call.
    pub fn new(
        object_id: impl Into<String>,
        method_id: impl Into<String>,
        arguments: Vec<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            method_id: method_id.into(),
            arguments,
        }
    }
}

/// Outcome for one element of a batch.
#[derive(Debug)]
pub struct BatchEntry<V> {
    /// Node id as supplied by the caller.
    pub node_id: String,
    /// The element's own result.
    pub outcome: OpcUaResult<V>,
}

impl<V> BatchEntry<V> {
    fn new(node_id: impl Into<String>, outcome: OpcUaResult<V>) -> Self {
        Self {
            node_id: node_id.into(),
            outcome,
        }
    }

    /// Returns `true` if this element succeeded.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A child reference returned by [`OperationExecutor::browse_children`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildRef {
    /// Child node id.
    pub node_id: String,
    /// Browse name as `<namespace>:<name>`.
    pub browse_name: String,
}

// =============================================================================
// OperationStats
// =============================================================================

/// Counters for executed operations.
#[derive(Debug, Default)]
pub struct OperationStats {
    reads: AtomicU64,
    writes: AtomicU64,
    browses: AtomicU64,
    method_calls: AtomicU64,
    errors: AtomicU64,
    total_response_time_us: AtomicU64,
}

impl OperationStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_read(&self, duration: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    fn record_write(&self, duration: Duration) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    fn record_browse(&self) {
        self.browses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_method_call(&self, duration: Duration) {
        self.method_calls.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    fn record_errors(&self, count: usize) {
        self.errors.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn add_time(&self, duration: Duration) {
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Returns the number of read operations, single or batched.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of write operations, single or batched.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of browse operations.
    pub fn browses(&self) -> u64 {
        self.browses.load(Ordering::Relaxed)
    }

    /// Returns the number of method calls.
    pub fn method_calls(&self) -> u64 {
        self.method_calls.load(Ordering::Relaxed)
    }

    /// Returns the number of failed operations or batch elements.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns the average response time of reads, writes and calls.
    pub fn average_response_time(&self) -> Duration {
        let total_ops = self.reads() + self.writes() + self.method_calls();
        if total_ops == 0 {
            return Duration::ZERO;
        }
        let total_us = self.total_response_time_us.load(Ordering::Relaxed);
        Duration::from_micros(total_us / total_ops)
    }

    /// Returns a serializable copy of the counters.
    pub fn snapshot(&self) -> OperationStatsSnapshot {
        OperationStatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            browses: self.browses(),
            method_calls: self.method_calls(),
            errors: self.errors(),
            average_response_time_ms: self.average_response_time().as_secs_f64() * 1000.0,
        }
    }
}

/// Point-in-time copy of [`OperationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperationStatsSnapshot {
    /// Read operations.
    pub reads: u64,
    /// Write operations.
    pub writes: u64,
    /// Browse operations.
    pub browses: u64,
    /// Method calls.
    pub method_calls: u64,
    /// Failed operations or batch elements.
    pub errors: u64,
    /// Average response time in milliseconds.
    pub average_response_time_ms: f64,
}

// =============================================================================
// OperationExecutor
// =============================================================================

/// Executes node operations through a [`ConnectionManager`].
///
/// Every operation first makes sure a session is open, then holds shared
/// access to it until the operation completes. Each service request is
/// bounded by the configured request timeout.
pub struct OperationExecutor<T: OpcUaTransport> {
    manager: Arc<ConnectionManager<T>>,
    stats: OperationStats,
}

impl<T: OpcUaTransport> OperationExecutor<T> {
    /// Creates an executor over a shared manager.
    pub fn new(manager: Arc<ConnectionManager<T>>) -> Self {
        Self {
            manager,
            stats: OperationStats::new(),
        }
    }

    /// Returns the connection manager.
    pub fn manager(&self) -> &Arc<ConnectionManager<T>> {
        &self.manager
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &OperationStats {
        &self.stats
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Reads the value of one node.
    ///
    /// # Errors
    ///
    /// Fails on an invalid id, a connection problem, or a non-good status.
    #[instrument(skip(self), level = "debug")]
    pub async fn read_one(&self, node_id: &str) -> OpcUaResult<OpcUaValue> {
        let started = Instant::now();
        let result = self.read_one_inner(node_id).await;
        self.stats.record_read(started.elapsed());
        self.settle(&result).await;
        result
    }

    async fn read_one_inner(&self, node_id: &str) -> OpcUaResult<OpcUaValue> {
        let id: NodeId = node_id.parse()?;
        let transport = self.manager.session().await?;
        self.read_current(&*transport, &id).await
    }

    async fn read_current(&self, transport: &T, id: &NodeId) -> OpcUaResult<OpcUaValue> {
        let label = id.to_string();
        let read = with_request_timeout(
            self.manager.request_timeout(),
            transport.read_value(id),
            |message| OperationError::read_failed(&label, message).into(),
        )
        .await?;
        read_outcome(id, Some(read))
    }

    /// Reads several nodes with a single read request.
    ///
    /// The result has one entry per input id, in input order. Ids that do
    /// not parse are reported in place and left out of the request.
    #[instrument(skip_all, fields(count = node_ids.len()), level = "debug")]
    pub async fn read_many<S: AsRef<str>>(&self, node_ids: &[S]) -> Vec<BatchEntry<OpcUaValue>> {
        let started = Instant::now();
        let mut outcomes = Outcomes::new(node_ids.len());
        let pending = outcomes.parse_all(node_ids.iter().map(AsRef::<str>::as_ref));

        if !pending.is_empty() {
            let ids: Vec<NodeId> = pending.iter().map(|(_, id)| id.clone()).collect();
            match self.read_batch(&ids).await {
                Ok(reads) => {
                    let mut reads = reads.into_iter();
                    for (index, id) in pending {
                        outcomes.set(index, read_outcome(&id, reads.next()));
                    }
                }
                Err(e) => {
                    self.manager.handle_error(&e).await;
                    for (index, _) in pending {
                        outcomes.set(index, Err(e.clone()));
                    }
                }
            }
        }

        let entries = outcomes.finish(node_ids.iter().map(AsRef::<str>::as_ref), |id| {
            OperationError::read_failed(id, "no result returned").into()
        });
        self.stats.record_read(started.elapsed());
        self.stats.record_errors(entries.iter().filter(|e| !e.is_ok()).count());
        entries
    }

    async fn read_batch(&self, ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        let transport = self.manager.session().await?;
        with_request_timeout(
            self.manager.request_timeout(),
            transport.read_values(ids),
            |message| OperationError::read_failed(batch_label(ids), message).into(),
        )
        .await
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Writes one node: reads its current value, coerces `raw` to that
    /// value's type, then writes.
    ///
    /// # Errors
    ///
    /// Fails on an invalid id, a failed read, a coercion error (nothing is
    /// written), or a non-good write status.
    #[instrument(skip(self), level = "debug")]
    pub async fn write_one(&self, node_id: &str, raw: &str) -> OpcUaResult<()> {
        let started = Instant::now();
        let result = self.write_one_inner(node_id, raw).await;
        self.stats.record_write(started.elapsed());
        self.settle(&result).await;
        result
    }

    async fn write_one_inner(&self, node_id: &str, raw: &str) -> OpcUaResult<()> {
        let id: NodeId = node_id.parse()?;
        let transport = self.manager.session().await?;
        let current = self.read_current(&*transport, &id).await?;
        let value = coerce(&current, raw)?;
        debug!(node_id = %id, value = %value, "Writing coerced value");

        let label = id.to_string();
        let written = with_request_timeout(
            self.manager.request_timeout(),
            transport.write_value(&id, value),
            |message| OperationError::write_failed(&label, message).into(),
        )
        .await?;
        write_outcome(&id, Some(written))
    }

    /// Writes several nodes with one batched read and one batched write.
    ///
    /// Each entry is coerced against its own node's current value. Entries
    /// that fail to parse, read or coerce are reported in place and left out
    /// of the write request.
    #[instrument(skip_all, fields(count = requests.len()), level = "debug")]
    pub async fn write_many(&self, requests: &[WriteRequest]) -> Vec<BatchEntry<()>> {
        let started = Instant::now();
        let mut outcomes = Outcomes::new(requests.len());
        let pending = outcomes.parse_all(requests.iter().map(|r| r.node_id.as_str()));

        let mut writes: Vec<(usize, NodeId, OpcUaValue)> = Vec::with_capacity(pending.len());
        if !pending.is_empty() {
            let ids: Vec<NodeId> = pending.iter().map(|(_, id)| id.clone()).collect();
            match self.read_batch(&ids).await {
                Ok(reads) => {
                    let mut reads = reads.into_iter();
                    for (index, id) in pending {
                        let coerced = read_outcome(&id, reads.next())
                            .and_then(|current| coerce(&current, &requests[index].value));
                        match coerced {
                            Ok(value) => writes.push((index, id, value)),
                            Err(e) => outcomes.set(index, Err(e)),
                        }
                    }
                }
                Err(e) => {
                    self.manager.handle_error(&e).await;
                    for (index, _) in pending {
                        outcomes.set(index, Err(e.clone()));
                    }
                }
            }
        }

        if !writes.is_empty() {
            let batch: Vec<(NodeId, OpcUaValue)> = writes
                .iter()
                .map(|(_, id, value)| (id.clone(), value.clone()))
                .collect();
            match self.write_batch(&batch).await {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for (index, id, _) in writes {
                        outcomes.set(index, write_outcome(&id, results.next()));
                    }
                }
                Err(e) => {
                    self.manager.handle_error(&e).await;
                    for (index, _, _) in writes {
                        outcomes.set(index, Err(e.clone()));
                    }
                }
            }
        }

        let entries = outcomes.finish(requests.iter().map(|r| r.node_id.as_str()), |id| {
            OperationError::write_failed(id, "no result returned").into()
        });
        self.stats.record_write(started.elapsed());
        self.stats.record_errors(entries.iter().filter(|e| !e.is_ok()).count());
        entries
    }

    async fn write_batch(&self, writes: &[(NodeId, OpcUaValue)]) -> OpcUaResult<Vec<WriteResult>> {
        let transport = self.manager.session().await?;
        let label = if writes.len() == 1 {
            writes[0].0.to_string()
        } else {
            format!("batch of {}", writes.len())
        };
        with_request_timeout(
            self.manager.request_timeout(),
            transport.write_values(writes),
            |message| OperationError::write_failed(label, message).into(),
        )
        .await
    }

    // =========================================================================
    // Browse
    // =========================================================================

    /// Lists the hierarchical children of a node.
    ///
    /// # Errors
    ///
    /// Fails on an invalid id, a connection problem, or a failed browse.
    #[instrument(skip(self), level = "debug")]
    pub async fn browse_children(&self, node_id: &str) -> OpcUaResult<Vec<ChildRef>> {
        self.stats.record_browse();
        let result = self.browse_children_inner(node_id).await;
        self.settle(&result).await;
        result
    }

    async fn browse_children_inner(&self, node_id: &str) -> OpcUaResult<Vec<ChildRef>> {
        let id: NodeId = node_id.parse()?;
        let transport = self.manager.session().await?;
        let label = id.to_string();
        let references = with_request_timeout(
            self.manager.request_timeout(),
            transport.browse(&id),
            |message| BrowseError::browse_failed(&label, message).into(),
        )
        .await?;

        Ok(references
            .into_iter()
            .map(|r| ChildRef {
                node_id: r.node_id.to_string(),
                browse_name: format!("{}:{}", r.browse_name.namespace_index, r.browse_name.name),
            })
            .collect())
    }

    // =========================================================================
    // Method
    // =========================================================================

    /// Calls a method and returns its output arguments.
    ///
    /// Arguments are sent as numbers when they parse as one, else as text.
    ///
    /// # Errors
    ///
    /// Fails on invalid ids, a connection problem, a rejected argument, or a
    /// non-good call status.
    #[instrument(skip(self), fields(object = %call.object_id, method = %call.method_id), level = "debug")]
    pub async fn call_method(&self, call: &MethodCall) -> OpcUaResult<Vec<OpcUaValue>> {
        let started = Instant::now();
        let result = self.call_method_inner(call).await;
        self.stats.record_method_call(started.elapsed());
        self.settle(&result).await;
        result
    }

    async fn call_method_inner(&self, call: &MethodCall) -> OpcUaResult<Vec<OpcUaValue>> {
        let object: NodeId = call.object_id.parse()?;
        let method: NodeId = call.method_id.parse()?;
        let arguments: Vec<OpcUaValue> = call
            .arguments
            .iter()
            .map(|raw| coerce_method_argument(raw))
            .collect();

        let transport = self.manager.session().await?;
        let result = with_request_timeout(
            self.manager.request_timeout(),
            transport.call_method(&object, &method, &arguments),
            |message| {
                MethodError::call_failed(object.to_string(), method.to_string(), message).into()
            },
        )
        .await?;

        if result.is_good() {
            return Ok(result.output_arguments);
        }
        let rejected = result
            .input_argument_results
            .iter()
            .position(|status| !is_good_status(*status));
        Err(match rejected {
            Some(index) => MethodError::invalid_argument(
                method.to_string(),
                index,
                result.input_argument_results[index],
            ),
            None => {
                MethodError::bad_status(object.to_string(), method.to_string(), result.status_code)
            }
        }
        .into())
    }
}

impl<T: OpcUaTransport> OperationExecutor<T> {
    /// Counts a failed single operation and lets the manager drop a dead
    /// session. Runs after the operation has released its session guard.
    async fn settle<V>(&self, result: &OpcUaResult<V>) {
        if let Err(e) = result {
            self.stats.record_errors(1);
            self.manager.handle_error(e).await;
        }
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for OperationExecutor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationExecutor")
            .field("manager", &self.manager)
            .field("stats", &self.stats)
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Bounds one service request by `limit`.
///
/// On expiry the error comes from `on_timeout`, which receives a message
/// naming the limit.
pub(crate) async fn with_request_timeout<F, R>(
    limit: Duration,
    call: F,
    on_timeout: impl FnOnce(String) -> OpcUaError,
) -> OpcUaResult<R>
where
    F: Future<Output = OpcUaResult<R>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!(
            "request timed out after {}",
            humantime::format_duration(limit)
        ))),
    }
}

fn read_outcome(id: &NodeId, read: Option<ReadResult>) -> OpcUaResult<OpcUaValue> {
    match read {
        Some(read) if read.is_good() => Ok(read.value.unwrap_or_default()),
        Some(read) => Err(OperationError::read_bad_status(id.to_string(), read.status_code).into()),
        None => Err(OperationError::read_failed(id.to_string(), "no result returned").into()),
    }
}

fn write_outcome(id: &NodeId, written: Option<WriteResult>) -> OpcUaResult<()> {
    match written {
        Some(written) if written.is_good() => Ok(()),
        Some(written) => {
            Err(OperationError::write_bad_status(id.to_string(), written.status_code).into())
        }
        None => Err(OperationError::write_failed(id.to_string(), "no result returned").into()),
    }
}

fn batch_label(ids: &[NodeId]) -> String {
    match ids {
        [single] => single.to_string(),
        _ => format!("batch of {}", ids.len()),
    }
}

/// Per-index outcome slots for a batch.
struct Outcomes<V> {
    slots: Vec<Option<OpcUaResult<V>>>,
}

impl<V> Outcomes<V> {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
        }
    }

    fn set(&mut self, index: usize, outcome: OpcUaResult<V>) {
        self.slots[index] = Some(outcome);
    }

    /// Parses every id, filling the slots of those that fail. Returns the
    /// parsed ids with their positions.
    fn parse_all<'a>(&mut self, raw_ids: impl Iterator<Item = &'a str>) -> Vec<(usize, NodeId)> {
        let mut parsed = Vec::new();
        for (index, raw) in raw_ids.enumerate() {
            match raw.parse::<NodeId>() {
                Ok(id) => parsed.push((index, id)),
                Err(e) => self.set(index, Err(e)),
            }
        }
        parsed
    }

    fn finish<'a>(
        self,
        raw_ids: impl Iterator<Item = &'a str>,
        missing: impl Fn(&str) -> OpcUaError,
    ) -> Vec<BatchEntry<V>> {
        raw_ids
            .zip(self.slots)
            .map(|(raw, slot)| BatchEntry::new(raw, slot.unwrap_or_else(|| Err(missing(raw)))))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockServer, MockTransport, BAD_NOT_WRITABLE};
    use crate::types::{OpcUaConfig, QualifiedName};

    fn setup() -> (OperationExecutor<MockTransport>, Arc<MockServer>) {
        let (transport, server) = MockTransport::new();
        let plant = NodeId::numeric(2, 1);
        server.add_object(&NodeId::OBJECTS_FOLDER, plant.clone(), QualifiedName::new(2, "Plant"));
        server.add_variable(
            &plant,
            NodeId::numeric(2, 10),
            "Temperature",
            OpcUaValue::Double(20.0),
        );
        server.add_variable(&plant, NodeId::numeric(2, 11), "Running", OpcUaValue::Boolean(false));
        server.add_variable(
            &plant,
            NodeId::string(2, "Label"),
            "Label",
            OpcUaValue::String("a".into()),
        );
        server.add_variable(&plant, NodeId::numeric(2, 12), "Count", OpcUaValue::Int32(0));
        let executor = OperationExecutor::new(Arc::new(ConnectionManager::new(transport)));
        (executor, server)
    }

    #[tokio::test]
    async fn test_read_one() {
        let (executor, server) = setup();

        let value = executor.read_one("ns=2;i=10").await.unwrap();
        assert_eq!(value, OpcUaValue::Double(20.0));
        assert_eq!(server.connect_count(), 1);
        assert_eq!(executor.stats().reads(), 1);
    }

    #[tokio::test]
    async fn test_read_one_unknown_node() {
        let (executor, _server) = setup();

        let err = executor.read_one("ns=2;i=999").await.unwrap_err();
        assert_eq!(err.category(), "read");
        assert!(err.to_string().contains("BadNodeIdUnknown"));
        assert_eq!(executor.stats().errors(), 1);
    }

    #[tokio::test]
    async fn test_read_one_invalid_id() {
        let (executor, server) = setup();

        let err = executor.read_one("not-a-node").await.unwrap_err();
        assert_eq!(err.category(), "configuration");
        assert_eq!(server.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_read_many_preserves_order() {
        let (executor, server) = setup();
        server.add_variable(
            &NodeId::OBJECTS_FOLDER,
            NodeId::numeric(2, 50),
            "Extra",
            OpcUaValue::UInt16(5),
        );

        let entries = executor
            .read_many(&["ns=2;i=10", "bogus", "ns=2;i=999", "ns=2;i=50"])
            .await;

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].node_id, "ns=2;i=10");
        assert_eq!(entries[0].outcome.as_ref().unwrap(), &OpcUaValue::Double(20.0));
        assert_eq!(entries[1].outcome.as_ref().unwrap_err().category(), "configuration");
        assert_eq!(entries[2].outcome.as_ref().unwrap_err().category(), "read");
        assert_eq!(entries[3].outcome.as_ref().unwrap(), &OpcUaValue::UInt16(5));
        assert_eq!(server.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_many_service_failure_hits_every_element() {
        let (executor, server) = setup();
        executor.manager().ensure_connection().await.unwrap();
        server.set_fail_service(true);

        let entries = executor.read_many(&["ns=2;i=10", "ns=2;i=11"]).await;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| !e.is_ok()));
        for entry in &entries {
            let err = entry.outcome.as_ref().unwrap_err();
            assert_eq!(err.category(), "connection");
            assert!(err.to_string().contains("service unavailable"));
        }
    }

    #[tokio::test]
    async fn test_dropped_session_reconnects_on_next_operation() {
        let (executor, server) = setup();
        executor.read_one("ns=2;i=10").await.unwrap();

        server.drop_sessions();
        let err = executor.read_one("ns=2;i=10").await.unwrap_err();
        assert_eq!(err.category(), "read");
        assert!(err.to_string().contains("BadSessionIdInvalid"));
        assert!(!executor.manager().is_connected().await);

        let value = executor.read_one("ns=2;i=10").await.unwrap();
        assert_eq!(value, OpcUaValue::Double(20.0));
        assert_eq!(server.connect_count(), 2);
        assert_eq!(executor.manager().stats().sessions_lost(), 1);

        server.drop_sessions();
        let entries = executor.read_many(&["ns=2;i=10", "ns=2;i=11"]).await;
        assert!(entries.iter().all(|e| !e.is_ok()));
        let entries = executor.read_many(&["ns=2;i=10", "ns=2;i=11"]).await;
        assert!(entries.iter().all(BatchEntry::is_ok));
        assert_eq!(server.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_bad_node_keeps_session() {
        let (executor, server) = setup();

        executor.read_one("ns=2;i=999").await.unwrap_err();
        executor.read_one("ns=2;i=10").await.unwrap();
        assert_eq!(server.connect_count(), 1);
        assert_eq!(executor.manager().stats().sessions_lost(), 0);
    }

    #[tokio::test]
    async fn test_read_many_empty() {
        let (executor, server) = setup();
        let entries = executor.read_many::<&str>(&[]).await;
        assert!(entries.is_empty());
        assert_eq!(server.read_calls(), 0);
    }

    #[tokio::test]
    async fn test_write_one_round_trip() {
        let (executor, server) = setup();

        executor.write_one("ns=2;i=10", "42.5").await.unwrap();
        let value = executor.read_one("ns=2;i=10").await.unwrap();
        assert!((value.as_f64().unwrap() - 42.5).abs() < f64::EPSILON);
        assert_eq!(server.value(&NodeId::numeric(2, 10)), Some(OpcUaValue::Double(42.5)));
    }

    #[tokio::test]
    async fn test_write_one_keeps_integer_type() {
        let (executor, server) = setup();

        executor.write_one("ns=2;i=12", "7").await.unwrap();
        assert_eq!(server.value(&NodeId::numeric(2, 12)), Some(OpcUaValue::Int32(7)));
    }

    #[tokio::test]
    async fn test_write_one_conversion_error_skips_write() {
        let (executor, server) = setup();

        let err = executor.write_one("ns=2;i=10", "abc").await.unwrap_err();
        assert_eq!(err.category(), "conversion");
        assert_eq!(server.write_calls(), 0);
        assert_eq!(server.value(&NodeId::numeric(2, 10)), Some(OpcUaValue::Double(20.0)));
    }

    #[tokio::test]
    async fn test_write_one_bad_status() {
        let (executor, server) = setup();
        server.set_read_only(&NodeId::numeric(2, 10));

        let err = executor.write_one("ns=2;i=10", "1").await.unwrap_err();
        assert_eq!(err.category(), "write");
        assert_eq!(err.status_code(), Some(BAD_NOT_WRITABLE));
    }

    #[tokio::test]
    async fn test_write_one_boolean_and_text() {
        let (executor, server) = setup();

        executor.write_one("ns=2;i=11", "TRUE").await.unwrap();
        assert_eq!(server.value(&NodeId::numeric(2, 11)), Some(OpcUaValue::Boolean(true)));
        executor.write_one("ns=2;i=11", "yes").await.unwrap();
        assert_eq!(server.value(&NodeId::numeric(2, 11)), Some(OpcUaValue::Boolean(false)));

        executor.write_one("ns=2;s=Label", "hello").await.unwrap();
        assert_eq!(
            server.value(&NodeId::string(2, "Label")),
            Some(OpcUaValue::String("hello".into()))
        );
    }

    #[tokio::test]
    async fn test_write_many_isolates_failures() {
        let (executor, server) = setup();

        let entries = executor
            .write_many(&[
                WriteRequest::new("ns=2;i=10", "1.5"),
                WriteRequest::new("ns=2;i=12", "abc"),
                WriteRequest::new("ns=x", "1"),
                WriteRequest::new("ns=2;i=11", "1"),
                WriteRequest::new("ns=2;i=999", "1"),
            ])
            .await;

        assert_eq!(entries.len(), 5);
        assert!(entries[0].is_ok());
        assert_eq!(entries[1].outcome.as_ref().unwrap_err().category(), "conversion");
        assert_eq!(entries[2].outcome.as_ref().unwrap_err().category(), "configuration");
        assert!(entries[3].is_ok());
        assert_eq!(entries[4].outcome.as_ref().unwrap_err().category(), "read");

        assert_eq!(server.read_calls(), 1);
        assert_eq!(server.write_calls(), 1);
        assert_eq!(server.value(&NodeId::numeric(2, 10)), Some(OpcUaValue::Double(1.5)));
        assert_eq!(server.value(&NodeId::numeric(2, 12)), Some(OpcUaValue::Int32(0)));
        assert_eq!(server.value(&NodeId::numeric(2, 11)), Some(OpcUaValue::Boolean(true)));
    }

    #[tokio::test]
    async fn test_write_many_nothing_to_write() {
        let (executor, server) = setup();

        let entries = executor.write_many(&[WriteRequest::new("ns=2;i=10", "abc")]).await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_ok());
        assert_eq!(server.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_browse_children() {
        let (executor, _server) = setup();

        let children = executor.browse_children("ns=2;i=1").await.unwrap();
        let names: Vec<_> = children.iter().map(|c| c.browse_name.as_str()).collect();
        assert_eq!(names, ["2:Temperature", "2:Running", "2:Label", "2:Count"]);
        assert_eq!(children[0].node_id, "ns=2;i=10");

        let root = executor.browse_children("i=85").await.unwrap();
        assert_eq!(root[0].browse_name, "2:Plant");
    }

    #[tokio::test]
    async fn test_browse_failure() {
        let (executor, server) = setup();
        server.fail_browse(NodeId::numeric(2, 1));

        let err = executor.browse_children("ns=2;i=1").await.unwrap_err();
        assert_eq!(err.category(), "browse");
    }

    #[tokio::test]
    async fn test_call_method() {
        let (executor, server) = setup();
        let plant = NodeId::numeric(2, 1);
        server.add_method(&plant, NodeId::numeric(2, 100), "Add", |args| {
            let sum: f64 = args.iter().filter_map(OpcUaValue::as_f64).sum();
            Ok(vec![OpcUaValue::Double(sum)])
        });

        let outputs = executor
            .call_method(&MethodCall::new("ns=2;i=1", "ns=2;i=100", vec!["2".into(), "3.5".into()]))
            .await
            .unwrap();
        assert_eq!(outputs, vec![OpcUaValue::Double(5.5)]);
        assert_eq!(executor.stats().method_calls(), 1);
    }

    #[tokio::test]
    async fn test_call_method_bad_status() {
        let (executor, _server) = setup();

        let err = executor
            .call_method(&MethodCall::new("ns=2;i=1", "ns=2;i=404", Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "method");
        assert!(err.to_string().contains("BadMethodInvalid"));
    }

    #[tokio::test]
    async fn test_connection_failure_surfaces() {
        let (transport, server) =
            MockTransport::with_config(OpcUaConfig::new("opc.tcp://down:4840"));
        server.set_fail_connect(true);
        let executor = OperationExecutor::new(Arc::new(ConnectionManager::new(transport)));

        let err = executor.read_one("i=85").await.unwrap_err();
        assert_eq!(err.category(), "connection");

        let entries = executor.read_many(&["i=85", "i=84"]).await;
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            let err = entry.outcome.as_ref().unwrap_err();
            assert_eq!(err.category(), "connection");
            assert!(err.to_string().contains("down"));
        }
    }

    #[test]
    fn test_operation_stats() {
        let stats = OperationStats::new();
        stats.record_read(Duration::from_millis(10));
        stats.record_write(Duration::from_millis(20));
        stats.record_errors(2);

        assert_eq!(stats.reads(), 1);
        assert_eq!(stats.writes(), 1);
        assert_eq!(stats.errors(), 2);
        assert_eq!(stats.average_response_time(), Duration::from_millis(15));
        assert!((stats.snapshot().average_response_time_ms - 15.0).abs() < 1e-9);
    }
}
