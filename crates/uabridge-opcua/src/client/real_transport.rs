// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous and drives its own runtime, so
//! every service call runs on the blocking pool via `spawn_blocking`.
//!
//! Only unsecured endpoints (security policy and mode `None`) with an
//! anonymous identity are used.
//!
//! # Example
//!
//! ```rust,ignore
//! use uabridge_opcua::client::RealOpcUaTransport;
//! use uabridge_opcua::types::OpcUaConfig;
//!
//! let mut transport = RealOpcUaTransport::new(OpcUaConfig::from_env());
//! transport.connect().await?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use crate::client::transport::{
    BrowseResult, CallResult, OpcUaTransport, OpcUaValue, ReadResult, TransportState,
    WriteResult,
};
use crate::error::{
    BrowseError, ConnectionError, ConversionError, MethodError, OpcUaError, OpcUaResult,
    OperationError,
};
use crate::types::{NodeId, NodeIdentifier, OpcUaConfig, QualifiedName as UaQualifiedName};

type SharedSession = Arc<OpcUaRwLock<Session>>;

/// One Browse or BrowseNext response.
type BrowsePage = Result<Option<Vec<opcua::types::BrowseResult>>, StatusCode>;

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// OPC UA transport talking to a real server.
pub struct RealOpcUaTransport {
    /// Configuration for the transport.
    config: OpcUaConfig,

    /// Current connection state.
    state: RwLock<TransportState>,

    /// The active session, if any.
    session: RwLock<Option<SharedSession>>,
}

impl RealOpcUaTransport {
    /// Creates a new transport. No network activity happens until `connect`.
    pub fn new(config: OpcUaConfig) -> Self {
        Self {
            config,
            state: RwLock::new(TransportState::Disconnected),
            session: RwLock::new(None),
        }
    }

    async fn set_state(&self, state: TransportState) {
        *self.state.write().await = state;
    }

    /// Builds the OPC UA client from configuration.
    fn build_client(config: &OpcUaConfig) -> OpcUaResult<Client> {
        ClientBuilder::new()
            .application_name(config.client_name.as_str())
            .application_uri(config.application_uri())
            .session_name(config.client_name.as_str())
            // Reconnection is driven by the connection manager.
            .session_retry_limit(0)
            .session_timeout(config.session_timeout.as_millis().min(u32::MAX as u128) as u32)
            .client()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::invalid_endpoint(
                    &config.endpoint,
                    "Failed to build OPC UA client",
                ))
            })
    }

    /// Discovers endpoints and opens an anonymous session on an unsecured one.
    fn open_session(config: &OpcUaConfig) -> OpcUaResult<SharedSession> {
        let mut client = Self::build_client(config)?;

        let endpoints = client
            .get_server_endpoints_from_url(config.endpoint.as_str())
            .map_err(|status| {
                OpcUaError::connection(ConnectionError::endpoint_not_found(
                    &config.endpoint,
                    Some(status.to_string()),
                ))
            })?;

        let endpoint = endpoints
            .iter()
            .find(|e| {
                e.security_policy_uri.as_ref() == SecurityPolicy::None.to_uri()
                    && e.security_mode == MessageSecurityMode::None
            })
            .cloned()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::no_suitable_endpoint("None"))
            })?;

        debug!(
            security_policy = %endpoint.security_policy_uri,
            security_mode = ?endpoint.security_mode,
            "Found matching endpoint"
        );

        client
            .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
            .map_err(|status| {
                OpcUaError::connection(ConnectionError::refused_with(
                    &config.endpoint,
                    status.to_string(),
                ))
            })
    }

    /// Runs a blocking session call on the blocking pool.
    async fn with_session<F, R>(&self, call: F) -> OpcUaResult<R>
    where
        F: FnOnce(&Session) -> OpcUaResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or_else(OpcUaError::not_connected)?;

        tokio::task::spawn_blocking(move || {
            let session = session.read();
            call(&session)
        })
        .await
        .map_err(|e| OpcUaError::connection(ConnectionError::closed(Some(e.to_string()))))?
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Converts our NodeId to opcua NodeId.
    fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
        let ns = node_id.namespace_index;
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, *v),
            NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v.clone()),
            NodeIdentifier::Guid(v) => opcua::types::NodeId::new(ns, opcua::types::Guid::from(*v)),
            NodeIdentifier::Opaque(v) => {
                opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.as_slice()))
            }
        }
    }

    /// Converts opcua NodeId to our NodeId.
    fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeId {
        let ns = node_id.namespace;
        match &node_id.identifier {
            opcua::types::Identifier::Numeric(v) => NodeId::numeric(ns, *v),
            opcua::types::Identifier::String(v) => NodeId::string(ns, v.as_ref()),
            opcua::types::Identifier::Guid(v) => {
                NodeId::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes()))
            }
            opcua::types::Identifier::ByteString(v) => {
                NodeId::opaque(ns, v.value.clone().unwrap_or_default())
            }
        }
    }

    fn from_opcua_datetime(dt: &opcua::types::DateTime) -> chrono::DateTime<chrono::Utc> {
        let value = dt.as_chrono();
        chrono::DateTime::from_timestamp(value.timestamp(), value.timestamp_subsec_nanos())
            .unwrap_or_else(chrono::Utc::now)
    }

    /// Converts opcua Variant to our OpcUaValue.
    fn from_opcua_variant(variant: &Variant) -> OpcUaValue {
        match variant {
            Variant::Empty => OpcUaValue::Null,
            Variant::Boolean(v) => OpcUaValue::Boolean(*v),
            Variant::SByte(v) => OpcUaValue::SByte(*v),
            Variant::Byte(v) => OpcUaValue::Byte(*v),
            Variant::Int16(v) => OpcUaValue::Int16(*v),
            Variant::UInt16(v) => OpcUaValue::UInt16(*v),
            Variant::Int32(v) => OpcUaValue::Int32(*v),
            Variant::UInt32(v) => OpcUaValue::UInt32(*v),
            Variant::Int64(v) => OpcUaValue::Int64(*v),
            Variant::UInt64(v) => OpcUaValue::UInt64(*v),
            Variant::Float(v) => OpcUaValue::Float(*v),
            Variant::Double(v) => OpcUaValue::Double(*v),
            Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
            Variant::DateTime(v) => OpcUaValue::DateTime(Self::from_opcua_datetime(v)),
            Variant::Guid(v) => OpcUaValue::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
            Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
            Variant::NodeId(v) => OpcUaValue::NodeId(Self::from_opcua_node_id(v)),
            Variant::LocalizedText(v) => OpcUaValue::LocalizedText(v.text.as_ref().to_string()),
            Variant::QualifiedName(v) => OpcUaValue::QualifiedName(UaQualifiedName::new(
                v.namespace_index,
                v.name.as_ref(),
            )),
            Variant::Array(arr) => {
                OpcUaValue::Array(arr.values.iter().map(Self::from_opcua_variant).collect())
            }
            other => OpcUaValue::String(format!("{:?}", other)),
        }
    }

    /// Converts our OpcUaValue to opcua Variant.
    fn to_opcua_variant(value: &OpcUaValue) -> OpcUaResult<Variant> {
        Ok(match value {
            OpcUaValue::Null => Variant::Empty,
            OpcUaValue::Boolean(v) => Variant::Boolean(*v),
            OpcUaValue::SByte(v) => Variant::SByte(*v),
            OpcUaValue::Byte(v) => Variant::Byte(*v),
            OpcUaValue::Int16(v) => Variant::Int16(*v),
            OpcUaValue::UInt16(v) => Variant::UInt16(*v),
            OpcUaValue::Int32(v) => Variant::Int32(*v),
            OpcUaValue::UInt32(v) => Variant::UInt32(*v),
            OpcUaValue::Int64(v) => Variant::Int64(*v),
            OpcUaValue::UInt64(v) => Variant::UInt64(*v),
            OpcUaValue::Float(v) => Variant::Float(*v),
            OpcUaValue::Double(v) => Variant::Double(*v),
            OpcUaValue::String(v) => Variant::String(UAString::from(v.as_str())),
            OpcUaValue::DateTime(v) => {
                Variant::DateTime(Box::new(opcua::types::DateTime::from(*v)))
            }
            OpcUaValue::Guid(v) => Variant::Guid(Box::new(opcua::types::Guid::from(*v))),
            OpcUaValue::ByteString(v) => Variant::ByteString(ByteString::from(v.as_slice())),
            OpcUaValue::NodeId(v) => Variant::NodeId(Box::new(Self::to_opcua_node_id(v))),
            OpcUaValue::LocalizedText(v) => {
                Variant::LocalizedText(Box::new(LocalizedText::new("", v.as_str())))
            }
            OpcUaValue::QualifiedName(v) => Variant::QualifiedName(Box::new(
                opcua::types::QualifiedName::new(v.namespace_index, v.name.as_str()),
            )),
            OpcUaValue::Array(_) => {
                return Err(OpcUaError::conversion(ConversionError::unsupported_type(
                    "Array",
                )))
            }
        })
    }

    fn read_value_id(node_id: &NodeId, attribute_id: u32) -> ReadValueId {
        ReadValueId {
            node_id: Self::to_opcua_node_id(node_id),
            attribute_id,
            index_range: UAString::null(),
            data_encoding: opcua::types::QualifiedName::null(),
        }
    }

    fn to_read_result(node_id: &NodeId, data_value: &DataValue) -> ReadResult {
        let status_code = data_value.status.as_ref().map(|s| s.bits()).unwrap_or(0);
        ReadResult {
            node_id: node_id.clone(),
            value: data_value.value.as_ref().map(Self::from_opcua_variant),
            status_code,
        }
    }

    async fn read_many(
        &self,
        node_ids: &[NodeId],
        attribute_id: u32,
    ) -> OpcUaResult<Vec<ReadResult>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<ReadValueId> = node_ids
            .iter()
            .map(|n| Self::read_value_id(n, attribute_id))
            .collect();
        let label = batch_label(node_ids.iter());

        trace!(count = node_ids.len(), attribute_id, "Reading node attributes");

        let values = self
            .with_session(move |session| {
                session
                    .read(&requests, TimestampsToReturn::Both, 0.0)
                    .map_err(|status| {
                        OpcUaError::operation(OperationError::read_bad_status(label, status.bits()))
                    })
            })
            .await?;

        // A short response leaves the missing tail as BadUnexpectedError.
        Ok(node_ids
            .iter()
            .enumerate()
            .map(|(i, node_id)| match values.get(i) {
                Some(dv) => Self::to_read_result(node_id, dv),
                None => ReadResult::failure(node_id.clone(), 0x8001_0000),
            })
            .collect())
    }

    async fn read_one(&self, node_id: &NodeId, attribute_id: u32) -> OpcUaResult<ReadResult> {
        let mut results = self
            .read_many(std::slice::from_ref(node_id), attribute_id)
            .await?;
        Ok(results
            .pop()
            .unwrap_or_else(|| ReadResult::failure(node_id.clone(), 0x8001_0000)))
    }
}

// =============================================================================
// Session handoff
// =============================================================================

/// Creates the two ends of a handoff for a session opened on the blocking
/// pool.
///
/// `connect` may be dropped by a timeout while the blocking open is still
/// running. Whichever end sees the other gone passes the session to `close`
/// instead of letting it drop while open.
fn session_handoff<S>(close: fn(S)) -> (HandoffSender<S>, HandoffReceiver<S>) {
    let slot = Arc::new(Mutex::new(HandoffSlot {
        abandoned: false,
        session: None,
    }));
    (
        HandoffSender {
            slot: Arc::clone(&slot),
            close,
        },
        HandoffReceiver { slot, close },
    )
}

struct HandoffSlot<S> {
    abandoned: bool,
    session: Option<S>,
}

fn lock_slot<S>(slot: &Mutex<HandoffSlot<S>>) -> MutexGuard<'_, HandoffSlot<S>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

struct HandoffSender<S> {
    slot: Arc<Mutex<HandoffSlot<S>>>,
    close: fn(S),
}

impl<S> HandoffSender<S> {
    fn deliver(self, session: S) {
        let mut slot = lock_slot(&self.slot);
        if slot.abandoned {
            drop(slot);
            (self.close)(session);
        } else {
            slot.session = Some(session);
        }
    }
}

struct HandoffReceiver<S> {
    slot: Arc<Mutex<HandoffSlot<S>>>,
    close: fn(S),
}

impl<S> HandoffReceiver<S> {
    fn take(&self) -> Option<S> {
        lock_slot(&self.slot).session.take()
    }
}

impl<S> Drop for HandoffReceiver<S> {
    fn drop(&mut self) {
        let late = {
            let mut slot = lock_slot(&self.slot);
            slot.abandoned = true;
            slot.session.take()
        };
        if let Some(session) = late {
            (self.close)(session);
        }
    }
}

/// Closes a session whose `connect` call gave up waiting for it.
fn close_abandoned_session(session: SharedSession) {
    warn!("Closing OPC UA session opened after connect was abandoned");
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || session.read().disconnect());
        }
        Err(_) => session.read().disconnect(),
    }
}

/// Gathers the references of a single-node browse, following continuation
/// points with `next` until the server reports none.
fn collect_references<F>(
    label: &str,
    first: BrowsePage,
    mut next: F,
) -> OpcUaResult<Vec<ReferenceDescription>>
where
    F: FnMut(ByteString) -> BrowsePage,
{
    let mut references = Vec::new();
    let mut page = first;
    loop {
        let results = page
            .map_err(|status| OpcUaError::browse(BrowseError::bad_status(label, status.bits())))?
            .ok_or_else(|| {
                OpcUaError::browse(BrowseError::browse_failed(label, "No browse results returned"))
            })?;
        let Some(result) = results.into_iter().next() else {
            return Ok(references);
        };
        if !result.status_code.is_good() {
            return Err(OpcUaError::browse(BrowseError::bad_status(
                label,
                result.status_code.bits(),
            )));
        }

        references.extend(result.references.unwrap_or_default());
        if result.continuation_point.value.as_ref().map_or(true, Vec::is_empty) {
            return Ok(references);
        }
        trace!(node_id = label, count = references.len(), "Following continuation point");
        page = next(result.continuation_point);
    }
}

fn batch_label<'a>(nodes: impl Iterator<Item = &'a NodeId>) -> String {
    let ids: Vec<String> = nodes.map(NodeId::to_string).collect();
    if ids.len() == 1 {
        ids.into_iter().next().unwrap_or_default()
    } else {
        format!("batch of {}", ids.len())
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&mut self) -> OpcUaResult<()> {
        self.set_state(TransportState::Connecting).await;
        info!(endpoint = %self.config.endpoint, "Connecting to OPC UA server");

        let config = self.config.clone();
        let (sender, receiver) = session_handoff(close_abandoned_session);
        let opened = tokio::task::spawn_blocking(move || -> OpcUaResult<()> {
            sender.deliver(Self::open_session(&config)?);
            Ok(())
        })
        .await
        .map_err(|e| {
            OpcUaError::connection(ConnectionError::refused_with(
                &self.config.endpoint,
                e.to_string(),
            ))
        })
        .and_then(|r| r)
        .and_then(|()| {
            receiver.take().ok_or_else(|| {
                OpcUaError::connection(ConnectionError::closed(Some(
                    "session was not handed over".into(),
                )))
            })
        });

        match opened {
            Ok(session) => {
                *self.session.write().await = Some(session);
                self.set_state(TransportState::Connected).await;
                info!(endpoint = %self.config.endpoint, "Connected to OPC UA server");
                Ok(())
            }
            Err(e) => {
                self.set_state(TransportState::Failed).await;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        let session = self.session.write().await.take();

        if let Some(session) = session {
            debug!(endpoint = %self.config.endpoint, "Closing OPC UA session");
            tokio::task::spawn_blocking(move || session.read().disconnect())
                .await
                .map_err(|e| {
                    OpcUaError::connection(ConnectionError::closed(Some(e.to_string())))
                })?;
        }

        self.set_state(TransportState::Disconnected).await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
            .try_read()
            .map(|s| *s)
            .unwrap_or(TransportState::Disconnected)
    }

    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult> {
        self.read_one(node_id, AttributeId::Value as u32).await
    }

    async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        self.read_many(node_ids, AttributeId::Value as u32).await
    }

    async fn read_attribute(&self, node_id: &NodeId, attribute_id: u32) -> OpcUaResult<ReadResult> {
        self.read_one(node_id, attribute_id).await
    }

    async fn write_value(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<WriteResult> {
        let mut results = self.write_values(&[(node_id.clone(), value)]).await?;
        Ok(results
            .pop()
            .unwrap_or_else(|| WriteResult::failure(node_id.clone(), 0x8001_0000)))
    }

    async fn write_values(&self, writes: &[(NodeId, OpcUaValue)]) -> OpcUaResult<Vec<WriteResult>> {
        if writes.is_empty() {
            return Ok(Vec::new());
        }

        let requests = writes
            .iter()
            .map(|(node_id, value)| {
                Ok(WriteValue {
                    node_id: Self::to_opcua_node_id(node_id),
                    attribute_id: AttributeId::Value as u32,
                    index_range: UAString::null(),
                    value: DataValue::new_now(Self::to_opcua_variant(value)?),
                })
            })
            .collect::<OpcUaResult<Vec<WriteValue>>>()?;
        let label = batch_label(writes.iter().map(|(n, _)| n));

        trace!(count = writes.len(), "Writing node values");

        let statuses = self
            .with_session(move |session| {
                session.write(&requests).map_err(|status| {
                    OpcUaError::operation(OperationError::write_bad_status(label, status.bits()))
                })
            })
            .await?;

        Ok(writes
            .iter()
            .enumerate()
            .map(|(i, (node_id, _))| match statuses.get(i) {
                Some(status) => WriteResult {
                    node_id: node_id.clone(),
                    status_code: status.bits(),
                },
                None => WriteResult::failure(node_id.clone(), 0x8001_0000),
            })
            .collect())
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseResult>> {
        let description = BrowseDescription {
            node_id: Self::to_opcua_node_id(node_id),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseDescriptionResultMask::all().bits(),
        };
        let label = node_id.to_string();

        trace!(node_id = %node_id, "Browsing node");

        let references = self
            .with_session(move |session| {
                let first = session.browse(&[description]);
                collect_references(&label, first, |continuation_point| {
                    session.browse_next(false, &[continuation_point])
                })
            })
            .await?;

        Ok(references
            .iter()
            .map(|r| {
                BrowseResult::new(
                    Self::from_opcua_node_id(&r.node_id.node_id),
                    UaQualifiedName::new(
                        r.browse_name.namespace_index,
                        r.browse_name.name.as_ref(),
                    ),
                    r.node_class as u32,
                )
            })
            .collect())
    }

    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: &[OpcUaValue],
    ) -> OpcUaResult<CallResult> {
        let input_arguments = arguments
            .iter()
            .map(Self::to_opcua_variant)
            .collect::<OpcUaResult<Vec<Variant>>>()?;
        let request = CallMethodRequest {
            object_id: Self::to_opcua_node_id(object_id),
            method_id: Self::to_opcua_node_id(method_id),
            input_arguments: Some(input_arguments),
        };
        let (object_label, method_label) = (object_id.to_string(), method_id.to_string());

        trace!(object_id = %object_id, method_id = %method_id, "Calling method");

        let result = self
            .with_session(move |session| {
                session.call(request).map_err(|status| {
                    OpcUaError::method(MethodError::bad_status(
                        object_label,
                        method_label,
                        status.bits(),
                    ))
                })
            })
            .await?;

        Ok(CallResult {
            status_code: result.status_code.bits(),
            input_argument_results: result
                .input_argument_results
                .unwrap_or_default()
                .iter()
                .map(|s| s.bits())
                .collect(),
            output_arguments: result
                .output_arguments
                .unwrap_or_default()
                .iter()
                .map(Self::from_opcua_variant)
                .collect(),
        })
    }

    fn display_name(&self) -> String {
        format!("RealOpcUaTransport({})", self.config.endpoint)
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn config(&self) -> &OpcUaConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_conversion() {
        for node in [
            NodeId::numeric(2, 1001),
            NodeId::string(2, "Test.Node"),
            NodeId::opaque(3, vec![9, 8, 7]),
        ] {
            let opcua_node = RealOpcUaTransport::to_opcua_node_id(&node);
            assert_eq!(RealOpcUaTransport::from_opcua_node_id(&opcua_node), node);
        }
    }

    #[test]
    fn test_value_conversion() {
        for value in [
            OpcUaValue::Boolean(true),
            OpcUaValue::Double(3.5),
            OpcUaValue::UInt16(7),
            OpcUaValue::String("Hello".to_string()),
            OpcUaValue::NodeId(NodeId::numeric(0, 11)),
            OpcUaValue::LocalizedText("Pump speed".to_string()),
        ] {
            let variant = RealOpcUaTransport::to_opcua_variant(&value).unwrap();
            assert_eq!(RealOpcUaTransport::from_opcua_variant(&variant), value);
        }
    }

    #[test]
    fn test_array_write_rejected() {
        let err = RealOpcUaTransport::to_opcua_variant(&OpcUaValue::Array(vec![])).unwrap_err();
        assert_eq!(err.category(), "conversion");
    }

    thread_local! {
        static CLOSED: std::cell::RefCell<Vec<u32>> = const { std::cell::RefCell::new(Vec::new()) };
    }

    fn record_close(session: u32) {
        CLOSED.with(|closed| closed.borrow_mut().push(session));
    }

    fn take_closed() -> Vec<u32> {
        CLOSED.with(|closed| std::mem::take(&mut *closed.borrow_mut()))
    }

    #[test]
    fn test_handoff_delivers_to_waiting_connect() {
        take_closed();
        let (sender, receiver) = session_handoff(record_close);
        sender.deliver(1);
        assert_eq!(receiver.take(), Some(1));
        drop(receiver);
        assert!(take_closed().is_empty());
    }

    #[test]
    fn test_session_opened_after_abandon_is_closed() {
        take_closed();
        let (sender, receiver) = session_handoff(record_close);
        drop(receiver);
        sender.deliver(2);
        assert_eq!(take_closed(), vec![2]);
    }

    #[test]
    fn test_untaken_session_is_closed_on_drop() {
        take_closed();
        let (sender, receiver) = session_handoff(record_close);
        sender.deliver(3);
        drop(receiver);
        assert_eq!(take_closed(), vec![3]);
    }

    fn reference(id: u32) -> ReferenceDescription {
        ReferenceDescription {
            reference_type_id: ReferenceTypeId::Organizes.into(),
            is_forward: true,
            node_id: opcua::types::NodeId::new(2, id).into(),
            browse_name: QualifiedName::new(2, format!("Node{id}")),
            display_name: LocalizedText::new("", &format!("Node{id}")),
            node_class: opcua::types::NodeClass::Variable,
            type_definition: ExpandedNodeId::null(),
        }
    }

    fn page(ids: &[u32], continuation: &[u8]) -> BrowsePage {
        Ok(Some(vec![opcua::types::BrowseResult {
            status_code: StatusCode::Good,
            continuation_point: if continuation.is_empty() {
                ByteString::null()
            } else {
                ByteString::from(continuation)
            },
            references: Some(ids.iter().copied().map(reference).collect()),
        }]))
    }

    #[test]
    fn test_browse_follows_continuation_points() {
        let mut requested = Vec::new();
        let references = collect_references("i=85", page(&[1, 2], b"p1"), |cp| {
            requested.push(cp.value.clone().unwrap_or_default());
            match requested.len() {
                1 => page(&[3, 4], b"p2"),
                _ => page(&[5], b""),
            }
        })
        .unwrap();

        let ids: Vec<NodeId> = references
            .iter()
            .map(|r| RealOpcUaTransport::from_opcua_node_id(&r.node_id.node_id))
            .collect();
        assert_eq!(ids, (1..=5).map(|i| NodeId::numeric(2, i)).collect::<Vec<_>>());
        assert_eq!(requested, vec![b"p1".to_vec(), b"p2".to_vec()]);
    }

    #[test]
    fn test_browse_single_page_and_failures() {
        let references = collect_references("i=85", page(&[7], b""), |_| {
            panic!("no continuation point was returned")
        })
        .unwrap();
        assert_eq!(references.len(), 1);

        let err = collect_references("i=85", page(&[1], b"p1"), |_| {
            Err(StatusCode::BadContinuationPointInvalid)
        })
        .unwrap_err();
        assert_eq!(err.category(), "browse");

        let err = collect_references("i=85", Ok(None), |_| page(&[], b"")).unwrap_err();
        assert!(err.to_string().contains("No browse results returned"));
    }

    #[test]
    fn test_transport_creation() {
        let transport = RealOpcUaTransport::new(OpcUaConfig::default());
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(!transport.is_connected());
        assert_eq!(transport.endpoint(), "opc.tcp://localhost:4840");
    }

    #[tokio::test]
    async fn test_operations_require_session() {
        let transport = RealOpcUaTransport::new(OpcUaConfig::default());
        let err = transport.read_value(&NodeId::numeric(0, 2258)).await.unwrap_err();
        assert_eq!(err.category(), "connection");
    }
}
