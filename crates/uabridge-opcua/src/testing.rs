// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory OPC UA server for tests.
//!
//! [`MockTransport`] implements [`OpcUaTransport`] over a small address space
//! held by a shared [`MockServer`]. The test keeps the server handle after
//! the transport has been moved into a manager, so it can inspect counters
//! and inject failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{
    BrowseResult, CallResult, OpcUaTransport, OpcUaValue, ReadResult, TransportState, WriteResult,
};
use crate::error::{
    BrowseError, ConnectionError, MethodError, OpcUaError, OpcUaResult, OperationError,
};
use crate::types::{AttributeId, NodeClass, NodeId, OpcUaConfig, QualifiedName};

/// BadNodeIdUnknown.
pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;
/// BadAttributeIdInvalid.
pub const BAD_ATTRIBUTE_ID_INVALID: u32 = 0x8035_0000;
/// BadNotWritable.
pub const BAD_NOT_WRITABLE: u32 = 0x803B_0000;
/// BadTypeMismatch.
pub const BAD_TYPE_MISMATCH: u32 = 0x8074_0000;
/// BadMethodInvalid.
pub const BAD_METHOD_INVALID: u32 = 0x8075_0000;
/// BadSessionIdInvalid.
pub const BAD_SESSION_ID_INVALID: u32 = 0x8025_0000;

type MethodHandler = Box<dyn Fn(&[OpcUaValue]) -> Result<Vec<OpcUaValue>, u32> + Send + Sync>;

/// One node of the in-memory address space.
#[derive(Debug, Clone)]
pub struct MockNode {
    /// Browse name.
    pub browse_name: QualifiedName,
    /// Node class.
    pub node_class: NodeClass,
    /// Current value for variables.
    pub value: Option<OpcUaValue>,
    /// DataType attribute.
    pub data_type: Option<NodeId>,
    /// Description attribute.
    pub description: Option<String>,
    /// Hierarchical children in browse order.
    pub children: Vec<NodeId>,
    /// Whether writes are accepted.
    pub writable: bool,
}

/// Shared state behind one or more [`MockTransport`]s.
#[derive(Default)]
pub struct MockServer {
    nodes: RwLock<HashMap<NodeId, MockNode>>,
    methods: RwLock<HashMap<(NodeId, NodeId), MethodHandler>>,
    read_status: RwLock<HashMap<NodeId, u32>>,
    attribute_failures: RwLock<HashSet<(NodeId, u32)>>,
    browse_failures: RwLock<HashSet<NodeId>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    fail_service: AtomicBool,
    omit_node_class: AtomicBool,
    connect_delay: Mutex<Duration>,
    /// Bumped to invalidate every open session.
    session_epoch: AtomicUsize,
}

impl MockServer {
    fn new() -> Self {
        let server = Self::default();
        server.insert(
            NodeId::OBJECTS_FOLDER,
            MockNode {
                browse_name: QualifiedName::new(0, "Objects"),
                node_class: NodeClass::Object,
                value: None,
                data_type: None,
                description: None,
                children: Vec::new(),
                writable: false,
            },
        );
        server
    }

    fn insert(&self, id: NodeId, node: MockNode) {
        if let Ok(mut nodes) = self.nodes.write() {
            nodes.insert(id, node);
        }
    }

    fn link(&self, parent: &NodeId, child: NodeId) {
        if let Ok(mut nodes) = self.nodes.write() {
            if let Some(p) = nodes.get_mut(parent) {
                p.children.push(child);
            }
        }
    }

    fn node(&self, id: &NodeId) -> Option<MockNode> {
        self.nodes.read().ok().and_then(|n| n.get(id).cloned())
    }

    // =========================================================================
    // Address space construction
    // =========================================================================

    /// Adds an object under `parent`.
    pub fn add_object(&self, parent: &NodeId, id: NodeId, name: QualifiedName) {
        self.insert(
            id.clone(),
            MockNode {
                browse_name: name,
                node_class: NodeClass::Object,
                value: None,
                data_type: None,
                description: None,
                children: Vec::new(),
                writable: false,
            },
        );
        self.link(parent, id);
    }

    /// Adds a writable variable under `parent`, typed after its initial value.
    pub fn add_variable(&self, parent: &NodeId, id: NodeId, name: &str, value: OpcUaValue) {
        self.insert(
            id.clone(),
            MockNode {
                browse_name: QualifiedName::new(id.namespace_index, name),
                node_class: NodeClass::Variable,
                data_type: Some(value.data_type().node_id()),
                value: Some(value),
                description: Some(format!("{} description", name)),
                children: Vec::new(),
                writable: true,
            },
        );
        self.link(parent, id);
    }

    /// Adds a reference from `parent` to an existing node.
    pub fn add_reference(&self, parent: &NodeId, child: NodeId) {
        self.link(parent, child);
    }

    /// Registers a method callable on `object`.
    pub fn add_method<F>(&self, object: &NodeId, method: NodeId, name: &str, handler: F)
    where
        F: Fn(&[OpcUaValue]) -> Result<Vec<OpcUaValue>, u32> + Send + Sync + 'static,
    {
        self.insert(
            method.clone(),
            MockNode {
                browse_name: QualifiedName::new(method.namespace_index, name),
                node_class: NodeClass::Method,
                value: None,
                data_type: None,
                description: None,
                children: Vec::new(),
                writable: false,
            },
        );
        self.link(object, method.clone());
        if let Ok(mut methods) = self.methods.write() {
            methods.insert((object.clone(), method), Box::new(handler));
        }
    }

    /// Marks a variable read-only.
    pub fn set_read_only(&self, id: &NodeId) {
        if let Ok(mut nodes) = self.nodes.write() {
            if let Some(node) = nodes.get_mut(id) {
                node.writable = false;
            }
        }
    }

    /// Returns the stored value of a node.
    pub fn value(&self, id: &NodeId) -> Option<OpcUaValue> {
        self.node(id).and_then(|n| n.value)
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Makes value reads of `id` report `status`.
    pub fn set_read_status(&self, id: NodeId, status: u32) {
        if let Ok(mut map) = self.read_status.write() {
            map.insert(id, status);
        }
    }

    /// Makes reads of one attribute of `id` fail.
    pub fn fail_attribute(&self, id: NodeId, attribute: AttributeId) {
        if let Ok(mut set) = self.attribute_failures.write() {
            set.insert((id, attribute.value()));
        }
    }

    /// Makes browsing `id` fail.
    pub fn fail_browse(&self, id: NodeId) {
        if let Ok(mut set) = self.browse_failures.write() {
            set.insert(id);
        }
    }

    /// Makes `connect` fail until reset.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes `disconnect` fail until reset.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Makes whole read/write service calls fail until reset.
    pub fn set_fail_service(&self, fail: bool) {
        self.fail_service.store(fail, Ordering::SeqCst);
    }

    /// Makes browse leave the node class of every reference unset (0), so
    /// clients have to read the NodeClass attribute instead.
    pub fn set_omit_node_class(&self, omit: bool) {
        self.omit_node_class.store(omit, Ordering::SeqCst);
    }

    /// Forgets every open session, as a restarted server would. Transports
    /// keep believing they are connected; their service calls fail with
    /// `BadSessionIdInvalid` until they reconnect.
    pub fn drop_sessions(&self) {
        self.session_epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Delays `connect` by the given duration.
    pub fn set_connect_delay(&self, delay: Duration) {
        if let Ok(mut d) = self.connect_delay.lock() {
            *d = delay;
        }
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Number of successful connects.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Number of read service calls (single or batched).
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Number of write service calls (single or batched).
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Service behaviour
    // =========================================================================

    fn read_one(&self, id: &NodeId, attribute_id: u32) -> ReadResult {
        if let Ok(set) = self.attribute_failures.read() {
            if set.contains(&(id.clone(), attribute_id)) {
                return ReadResult::failure(id.clone(), BAD_ATTRIBUTE_ID_INVALID);
            }
        }
        let Some(node) = self.node(id) else {
            return ReadResult::failure(id.clone(), BAD_NODE_ID_UNKNOWN);
        };

        let value = match attribute_id {
            a if a == AttributeId::Value.value() => {
                if let Some(status) = self.read_status.read().ok().and_then(|m| m.get(id).copied())
                {
                    return ReadResult::failure(id.clone(), status);
                }
                node.value
            }
            a if a == AttributeId::NodeClass.value() => {
                Some(OpcUaValue::Int32(node.node_class.value() as i32))
            }
            a if a == AttributeId::BrowseName.value() => {
                Some(OpcUaValue::QualifiedName(node.browse_name.clone()))
            }
            a if a == AttributeId::DisplayName.value() => {
                Some(OpcUaValue::LocalizedText(node.browse_name.name.clone()))
            }
            a if a == AttributeId::Description.value() => Some(OpcUaValue::LocalizedText(
                node.description.unwrap_or_default(),
            )),
            a if a == AttributeId::DataType.value() => node.data_type.map(OpcUaValue::NodeId),
            _ => None,
        };

        match value {
            Some(v) => ReadResult::success(id.clone(), v),
            None => ReadResult::failure(id.clone(), BAD_ATTRIBUTE_ID_INVALID),
        }
    }

    fn write_one(&self, id: &NodeId, value: &OpcUaValue) -> WriteResult {
        let Ok(mut nodes) = self.nodes.write() else {
            return WriteResult::failure(id.clone(), 0x8002_0000);
        };
        let Some(node) = nodes.get_mut(id) else {
            return WriteResult::failure(id.clone(), BAD_NODE_ID_UNKNOWN);
        };
        if !node.writable || node.node_class != NodeClass::Variable {
            return WriteResult::failure(id.clone(), BAD_NOT_WRITABLE);
        }
        if let Some(current) = &node.value {
            if current.data_type() != value.data_type() {
                return WriteResult::failure(id.clone(), BAD_TYPE_MISMATCH);
            }
        }
        node.value = Some(value.clone());
        WriteResult::success(id.clone())
    }

    fn service_check(&self, what: &str) -> OpcUaResult<()> {
        if self.fail_service.load(Ordering::SeqCst) {
            return Err(OpcUaError::connection(ConnectionError::closed(Some(format!(
                "{} service unavailable",
                what
            )))));
        }
        Ok(())
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// Transport over a [`MockServer`].
pub struct MockTransport {
    server: Arc<MockServer>,
    state: TransportState,
    config: OpcUaConfig,
    epoch: usize,
}

impl MockTransport {
    /// Creates a transport and the server it talks to.
    pub fn new() -> (Self, Arc<MockServer>) {
        Self::with_config(OpcUaConfig::default())
    }

    /// Creates a transport with a specific configuration.
    pub fn with_config(config: OpcUaConfig) -> (Self, Arc<MockServer>) {
        let server = Arc::new(MockServer::new());
        let transport = Self {
            server: Arc::clone(&server),
            state: TransportState::Disconnected,
            config,
            epoch: 0,
        };
        (transport, server)
    }

    /// Fails unless connected with a session the server still knows.
    /// `stale` builds the service's error for a forgotten session.
    fn require_session(&self, stale: impl FnOnce(u32) -> OpcUaError) -> OpcUaResult<()> {
        if !self.state.is_connected() {
            return Err(OpcUaError::not_connected());
        }
        if self.epoch != self.server.session_epoch.load(Ordering::SeqCst) {
            return Err(stale(BAD_SESSION_ID_INVALID));
        }
        Ok(())
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn connect(&mut self) -> OpcUaResult<()> {
        self.state = TransportState::Connecting;
        let delay = self.server.connect_delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.server.fail_connect.load(Ordering::SeqCst) {
            self.state = TransportState::Failed;
            return Err(OpcUaError::connection_refused(&self.config.endpoint));
        }
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        self.epoch = self.server.session_epoch.load(Ordering::SeqCst);
        self.state = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        self.server.disconnects.fetch_add(1, Ordering::SeqCst);
        self.state = TransportState::Disconnected;
        if self.server.fail_disconnect.load(Ordering::SeqCst) {
            return Err(OpcUaError::connection(ConnectionError::closed(Some(
                "session already gone".into(),
            ))));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult> {
        self.read_attribute(node_id, AttributeId::Value.value()).await
    }

    async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        self.require_session(|status| {
            OperationError::read_bad_status(format!("batch of {}", node_ids.len()), status).into()
        })?;
        self.server.service_check("Read")?;
        self.server.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(node_ids
            .iter()
            .map(|id| self.server.read_one(id, AttributeId::Value.value()))
            .collect())
    }

    async fn read_attribute(&self, node_id: &NodeId, attribute_id: u32) -> OpcUaResult<ReadResult> {
        self.require_session(|status| {
            OperationError::read_bad_status(node_id.to_string(), status).into()
        })?;
        self.server.service_check("Read")?;
        self.server.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.server.read_one(node_id, attribute_id))
    }

    async fn write_value(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<WriteResult> {
        self.require_session(|status| {
            OperationError::write_bad_status(node_id.to_string(), status).into()
        })?;
        self.server.service_check("Write")?;
        self.server.write_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.server.write_one(node_id, &value))
    }

    async fn write_values(&self, writes: &[(NodeId, OpcUaValue)]) -> OpcUaResult<Vec<WriteResult>> {
        self.require_session(|status| {
            OperationError::write_bad_status(format!("batch of {}", writes.len()), status).into()
        })?;
        self.server.service_check("Write")?;
        self.server.write_calls.fetch_add(1, Ordering::SeqCst);
        Ok(writes
            .iter()
            .map(|(id, value)| self.server.write_one(id, value))
            .collect())
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseResult>> {
        self.require_session(|status| BrowseError::bad_status(node_id.to_string(), status).into())?;
        let failing = self
            .server
            .browse_failures
            .read()
            .map(|s| s.contains(node_id))
            .unwrap_or(false);
        if failing {
            return Err(OpcUaError::browse(BrowseError::browse_failed(
                node_id.to_string(),
                "injected browse failure",
            )));
        }
        let node = self.server.node(node_id).ok_or_else(|| {
            OpcUaError::browse(BrowseError::bad_status(node_id.to_string(), BAD_NODE_ID_UNKNOWN))
        })?;

        let omit_class = self.server.omit_node_class.load(Ordering::SeqCst);
        Ok(node
            .children
            .iter()
            .filter_map(|child| {
                self.server.node(child).map(|c| {
                    let class = if omit_class { 0 } else { c.node_class.value() };
                    BrowseResult::new(child.clone(), c.browse_name, class)
                })
            })
            .collect())
    }

    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: &[OpcUaValue],
    ) -> OpcUaResult<CallResult> {
        self.require_session(|status| {
            MethodError::bad_status(object_id.to_string(), method_id.to_string(), status).into()
        })?;
        let methods = self
            .server
            .methods
            .read()
            .map_err(|_| OpcUaError::connection(ConnectionError::closed(None)))?;
        let key = (object_id.clone(), method_id.clone());
        Ok(match methods.get(&key) {
            Some(handler) => match handler(arguments) {
                Ok(outputs) => CallResult::success(outputs),
                Err(status) => CallResult::failure(status),
            },
            None => CallResult::failure(BAD_METHOD_INVALID),
        })
    }

    fn display_name(&self) -> String {
        format!("MockTransport({})", self.config.endpoint)
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn config(&self) -> &OpcUaConfig {
        &self.config
    }
}
