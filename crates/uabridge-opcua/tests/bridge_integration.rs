// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge Integration Tests
//!
//! Most tests run against an in-memory address space. The tests marked
//! `#[ignore]` need a running OPC UA server and the `real-transport`
//! feature.
//!
//! # Environment Variables
//!
//! - `OPCUA_TEST_ENDPOINT`: OPC UA server endpoint (default: opc.tcp://localhost:4840)
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests
//! cargo test -p uabridge-opcua --test bridge_integration
//!
//! # Including the real server tests
//! cargo test -p uabridge-opcua --features real-transport --test bridge_integration -- --include-ignored
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use uabridge_opcua::client::{
    BrowseResult, CallResult, OpcUaTransport, OpcUaValue, ReadResult, TransportState, WriteResult,
};
use uabridge_opcua::{
    AttributeId, ConnectionManager, DiscoveryWalker, NodeClass, NodeId, OpcUaConfig, OpcUaError,
    OpcUaResult, OperationExecutor, QualifiedName, WriteRequest,
};

// =============================================================================
// Mock Transport
// =============================================================================

const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;
const BAD_ATTRIBUTE_ID_INVALID: u32 = 0x8035_0000;

#[derive(Clone)]
struct Node {
    name: QualifiedName,
    class: NodeClass,
    value: Option<OpcUaValue>,
    children: Vec<NodeId>,
}

/// Address space shared between the test and the transport.
#[derive(Default)]
struct AddressSpace {
    nodes: RwLock<HashMap<NodeId, Node>>,
    connects: AtomicUsize,
    writes: AtomicUsize,
}

impl AddressSpace {
    fn new() -> Arc<Self> {
        let space = Arc::new(Self::default());
        space.insert(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object, None);
        space
    }

    fn insert(&self, id: NodeId, name: &str, class: NodeClass, value: Option<OpcUaValue>) {
        let node = Node {
            name: QualifiedName::new(id.namespace_index, name),
            class,
            value,
            children: Vec::new(),
        };
        self.nodes.write().unwrap().insert(id, node);
    }

    fn add(
        &self,
        parent: &NodeId,
        id: NodeId,
        name: &str,
        class: NodeClass,
        value: Option<OpcUaValue>,
    ) {
        self.insert(id.clone(), name, class, value);
        if let Some(p) = self.nodes.write().unwrap().get_mut(parent) {
            p.children.push(id);
        }
    }

    fn value(&self, id: &NodeId) -> Option<OpcUaValue> {
        self.nodes.read().unwrap().get(id).and_then(|n| n.value.clone())
    }
}

struct MockTransport {
    space: Arc<AddressSpace>,
    state: TransportState,
    config: OpcUaConfig,
}

impl MockTransport {
    fn new(space: Arc<AddressSpace>) -> Self {
        Self {
            space,
            state: TransportState::Disconnected,
            config: OpcUaConfig::default(),
        }
    }

    fn read(&self, id: &NodeId, attribute_id: u32) -> ReadResult {
        let nodes = self.space.nodes.read().unwrap();
        let Some(node) = nodes.get(id) else {
            return ReadResult::failure(id.clone(), BAD_NODE_ID_UNKNOWN);
        };
        let value = match attribute_id {
            a if a == AttributeId::Value.value() => node.value.clone(),
            a if a == AttributeId::NodeClass.value() => {
                Some(OpcUaValue::Int32(node.class.value() as i32))
            }
            a if a == AttributeId::DataType.value() => {
                node.value.as_ref().map(|v| OpcUaValue::NodeId(v.data_type().node_id()))
            }
            a if a == AttributeId::Description.value() => {
                Some(OpcUaValue::LocalizedText(String::new()))
            }
            _ => None,
        };
        match value {
            Some(v) => ReadResult::success(id.clone(), v),
            None => ReadResult::failure(id.clone(), BAD_ATTRIBUTE_ID_INVALID),
        }
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn connect(&mut self) -> OpcUaResult<()> {
        // Yield so concurrent callers really overlap.
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.space.connects.fetch_add(1, Ordering::SeqCst);
        self.state = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        self.state = TransportState::Disconnected;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult> {
        Ok(self.read(node_id, AttributeId::Value.value()))
    }

    async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        Ok(node_ids
            .iter()
            .map(|id| self.read(id, AttributeId::Value.value()))
            .collect())
    }

    async fn read_attribute(&self, node_id: &NodeId, attribute_id: u32) -> OpcUaResult<ReadResult> {
        Ok(self.read(node_id, attribute_id))
    }

    async fn write_value(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<WriteResult> {
        let mut results = self.write_values(&[(node_id.clone(), value)]).await?;
        Ok(results.remove(0))
    }

    async fn write_values(&self, writes: &[(NodeId, OpcUaValue)]) -> OpcUaResult<Vec<WriteResult>> {
        self.space.writes.fetch_add(1, Ordering::SeqCst);
        let mut nodes = self.space.nodes.write().unwrap();
        Ok(writes
            .iter()
            .map(|(id, value)| match nodes.get_mut(id) {
                Some(node) => {
                    node.value = Some(value.clone());
                    WriteResult::success(id.clone())
                }
                None => WriteResult::failure(id.clone(), BAD_NODE_ID_UNKNOWN),
            })
            .collect())
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseResult>> {
        let nodes = self.space.nodes.read().unwrap();
        let node = nodes
            .get(node_id)
            .ok_or_else(|| OpcUaError::browse_failed(node_id.to_string(), "unknown node"))?;
        Ok(node
            .children
            .iter()
            .filter_map(|child| {
                nodes
                    .get(child)
                    .map(|c| BrowseResult::new(child.clone(), c.name.clone(), c.class.value()))
            })
            .collect())
    }

    async fn call_method(
        &self,
        _object_id: &NodeId,
        _method_id: &NodeId,
        arguments: &[OpcUaValue],
    ) -> OpcUaResult<CallResult> {
        Ok(CallResult::success(arguments.to_vec()))
    }

    fn display_name(&self) -> String {
        "MockTransport".to_string()
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn config(&self) -> &OpcUaConfig {
        &self.config
    }
}

// =============================================================================
// Fixture
// =============================================================================

/// Objects
/// ├── Server
/// │   └── ServerStatus
/// └── Boiler
///     ├── Temperature (Double)
///     ├── Setpoint    (Int32)
///     ├── Enabled     (Boolean)
///     └── Mode        (String)
fn fixture() -> (Arc<ConnectionManager<MockTransport>>, Arc<AddressSpace>) {
    let space = AddressSpace::new();
    let objects = NodeId::OBJECTS_FOLDER;
    let boiler = NodeId::numeric(2, 1);

    space.add(&objects, NodeId::SERVER, "Server", NodeClass::Object, None);
    space.add(
        &NodeId::SERVER,
        NodeId::numeric(0, 2256),
        "ServerStatus",
        NodeClass::Variable,
        Some(OpcUaValue::Int32(0)),
    );
    space.add(&objects, boiler.clone(), "Boiler", NodeClass::Object, None);
    space.add(
        &boiler,
        NodeId::numeric(2, 2),
        "Temperature",
        NodeClass::Variable,
        Some(OpcUaValue::Double(65.0)),
    );
    space.add(
        &boiler,
        NodeId::numeric(2, 3),
        "Setpoint",
        NodeClass::Variable,
        Some(OpcUaValue::Int32(70)),
    );
    space.add(
        &boiler,
        NodeId::numeric(2, 4),
        "Enabled",
        NodeClass::Variable,
        Some(OpcUaValue::Boolean(false)),
    );
    space.add(
        &boiler,
        NodeId::string(2, "Mode"),
        "Mode",
        NodeClass::Variable,
        Some(OpcUaValue::String("auto".into())),
    );

    let manager = Arc::new(ConnectionManager::new(MockTransport::new(Arc::clone(&space))));
    (manager, space)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_numeric_round_trip() {
    let (manager, _space) = fixture();
    let executor = OperationExecutor::new(manager);

    for v2 in [0.0, -12.75, 1e6, 98.6] {
        executor.write_one("ns=2;i=2", &v2.to_string()).await.unwrap();
        let read = executor.read_one("ns=2;i=2").await.unwrap();
        assert!((read.as_f64().unwrap() - v2).abs() < 1e-9, "wrote {}, read {}", v2, read);
    }
}

#[tokio::test]
async fn test_batch_order_and_length() {
    let (manager, _space) = fixture();
    let executor = OperationExecutor::new(manager);

    let ids = ["ns=2;s=Mode", "ns=2;i=2", "ns=2;i=4", "ns=2;i=3"];
    let reads = executor.read_many(&ids).await;
    assert_eq!(reads.len(), ids.len());
    for (entry, id) in reads.iter().zip(ids) {
        assert_eq!(entry.node_id, id);
        assert!(entry.is_ok());
    }

    let writes: Vec<WriteRequest> = vec![
        WriteRequest::new("ns=2;i=3", "75"),
        WriteRequest::new("ns=2;i=2", "oops"),
        WriteRequest::new("ns=2;s=Mode", "manual"),
    ];
    let results = executor.write_many(&writes).await;
    assert_eq!(results.len(), writes.len());
    let ok: Vec<bool> = results.iter().map(|r| r.is_ok()).collect();
    assert_eq!(ok, [true, false, true]);
    for (entry, request) in results.iter().zip(&writes) {
        assert_eq!(entry.node_id, request.node_id);
    }
}

#[tokio::test]
async fn test_boolean_coercion() {
    let (manager, space) = fixture();
    let executor = OperationExecutor::new(manager);
    let enabled = NodeId::numeric(2, 4);

    for (raw, expected) in [
        ("true", true),
        ("1", true),
        ("false", false),
        ("0", false),
        ("yes", false),
    ] {
        executor.write_one("ns=2;i=4", raw).await.unwrap();
        assert_eq!(space.value(&enabled), Some(OpcUaValue::Boolean(expected)), "input {}", raw);
    }
}

#[tokio::test]
async fn test_conversion_failure_leaves_node_unchanged() {
    let (manager, space) = fixture();
    let executor = OperationExecutor::new(manager);

    let err = executor.write_one("ns=2;i=2", "abc").await.unwrap_err();
    assert_eq!(err.category(), "conversion");
    assert_eq!(space.writes.load(Ordering::SeqCst), 0);
    assert_eq!(space.value(&NodeId::numeric(2, 2)), Some(OpcUaValue::Double(65.0)));
}

#[tokio::test]
async fn test_discovery_excludes_server() {
    let (manager, _space) = fixture();
    let records = DiscoveryWalker::new(manager).discover_all().await.unwrap();

    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Temperature", "Setpoint", "Enabled", "Mode"]);
    assert!(records.iter().all(|r| r.parent == NodeId::numeric(2, 1)));
}

#[tokio::test]
async fn test_partial_failure_isolation() {
    let (manager, _space) = fixture();
    let executor = OperationExecutor::new(manager);

    let reads = executor.read_many(&["ns=2;i=2", "ns=2;q=broken", "ns=2;i=3"]).await;
    assert_eq!(reads.len(), 3);
    assert_eq!(reads[0].outcome.as_ref().unwrap(), &OpcUaValue::Double(65.0));
    assert!(reads[1].outcome.is_err());
    assert_eq!(reads[2].outcome.as_ref().unwrap(), &OpcUaValue::Int32(70));
}

#[tokio::test]
async fn test_single_session_across_operations() {
    let (manager, space) = fixture();
    let executor = Arc::new(OperationExecutor::new(Arc::clone(&manager)));

    manager.ensure_connection().await.unwrap();
    manager.ensure_connection().await.unwrap();
    assert_eq!(space.connects.load(Ordering::SeqCst), 1);

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.write_one("ns=2;i=3", &i.to_string()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    DiscoveryWalker::new(Arc::clone(&manager)).discover_all().await.unwrap();

    assert_eq!(space.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_first_use() {
    let (manager, space) = fixture();
    let executor = Arc::new(OperationExecutor::new(manager));

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.read_one("ns=2;i=2").await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(space.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_method_arguments_are_coerced() {
    let (manager, _space) = fixture();
    let executor = OperationExecutor::new(manager);

    let outputs = executor
        .call_method(&uabridge_opcua::MethodCall::new(
            "ns=2;i=1",
            "ns=2;i=99",
            vec!["4".into(), "2.5".into(), "start".into()],
        ))
        .await
        .unwrap();
    assert_eq!(
        outputs,
        [
            OpcUaValue::Double(4.0),
            OpcUaValue::Double(2.5),
            OpcUaValue::String("start".into())
        ]
    );
}

// =============================================================================
// Real Server Tests
// =============================================================================

#[cfg(feature = "real-transport")]
mod real_server {
    use super::*;
    use uabridge_opcua::{OpcUaBridge, RealOpcUaTransport};

    fn test_endpoint() -> String {
        std::env::var("OPCUA_TEST_ENDPOINT")
            .unwrap_or_else(|_| "opc.tcp://localhost:4840".to_string())
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA server"]
    async fn test_real_server_connect_and_discover() {
        let config = OpcUaConfig::new(test_endpoint());
        let manager = Arc::new(ConnectionManager::new(RealOpcUaTransport::new(config)));

        manager.ensure_connection().await.expect("Failed to connect to OPC UA server");
        let records = DiscoveryWalker::new(Arc::clone(&manager)).discover_all().await.unwrap();
        assert!(records.iter().all(|r| r.name != "ServerStatus"));

        manager.disconnect().await;
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    #[ignore = "Requires OPC UA server"]
    async fn test_real_server_browse_objects() {
        let bridge = OpcUaBridge::new(RealOpcUaTransport::new(OpcUaConfig::new(test_endpoint())));

        let out = bridge
            .browse_children(uabridge_opcua::bridge::BrowseChildrenRequest {
                node_id: "i=85".into(),
            })
            .await;
        assert!(!out.is_error, "{}", out.text);
        assert!(out.text.contains("0:Server"));

        bridge.shutdown().await;
    }
}
