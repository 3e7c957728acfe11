// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space discovery.
//!
//! [`DiscoveryWalker`] walks the hierarchy below the Objects folder and
//! collects every variable it finds. The walk is depth-first and pre-order,
//! driven by an explicit stack, with a visited set so that address spaces
//! containing cycles or shared nodes still terminate.
//!
//! Any child whose browse name is `Server` is skipped together with its
//! subtree. Failures never abort the walk: a node that cannot be browsed
//! contributes nothing, and a variable attribute that cannot be read is
//! left empty in its record.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::{BrowseResult, ConnectionManager, OpcUaTransport, OpcUaValue};
use crate::error::{BrowseError, OpcUaError, OpcUaResult, OperationError};
use crate::executor::with_request_timeout;
use crate::types::{AttributeId, NodeClass, NodeId};

/// Browse name of the server diagnostics object excluded from discovery.
pub const EXCLUDED_BROWSE_NAME: &str = "Server";

// =============================================================================
// VariableRecord
// =============================================================================

/// Metadata collected for one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRecord {
    /// Browse name.
    pub name: String,

    /// Node id of the variable.
    pub node_id: NodeId,

    /// Node the variable was browsed from.
    pub parent: NodeId,

    /// Current value, `None` if it could not be read.
    pub value: Option<OpcUaValue>,

    /// DataType attribute, `None` if it could not be read.
    pub data_type: Option<NodeId>,

    /// Description text, empty if absent or unreadable.
    pub description: String,
}

// =============================================================================
// DiscoveryOptions
// =============================================================================

/// Options for a discovery walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Node the walk starts from.
    pub root: NodeId,

    /// Deepest level to visit, counting the root's children as 1.
    /// `None` walks the whole hierarchy.
    pub max_depth: Option<usize>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            root: NodeId::OBJECTS_FOLDER,
            max_depth: None,
        }
    }
}

impl DiscoveryOptions {
    /// Sets the depth bound.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Sets the starting node.
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = root;
        self
    }
}

// =============================================================================
// DiscoveryWalker
// =============================================================================

/// What a walk collected.
#[derive(Default)]
struct Walk {
    records: Vec<VariableRecord>,
    failed_browses: usize,
    /// First failure that showed the session was gone.
    session_error: Option<OpcUaError>,
}

impl Walk {
    fn browse_failed(&mut self, error: OpcUaError) {
        self.failed_browses += 1;
        if self.session_error.is_none() && error.is_session_lost() {
            self.session_error = Some(error);
        }
    }
}

/// A browsed child waiting to be classified.
struct Pending {
    reference: BrowseResult,
    parent: NodeId,
    depth: usize,
}

/// Walks the address space and collects variables.
pub struct DiscoveryWalker<T: OpcUaTransport> {
    manager: Arc<ConnectionManager<T>>,
    options: DiscoveryOptions,
}

impl<T: OpcUaTransport> DiscoveryWalker<T> {
    /// Creates a walker with default options.
    pub fn new(manager: Arc<ConnectionManager<T>>) -> Self {
        Self::with_options(manager, DiscoveryOptions::default())
    }

    /// Creates a walker with the given options.
    pub fn with_options(manager: Arc<ConnectionManager<T>>, options: DiscoveryOptions) -> Self {
        Self { manager, options }
    }

    /// Returns the walk options.
    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Walks the address space and returns every variable found, in
    /// depth-first pre-order.
    ///
    /// # Errors
    ///
    /// Only failing to open a session is an error. Browse and read failures
    /// inside the walk are logged and skipped. A browse failure showing the
    /// session is gone is handed to the manager once the walk is over, so
    /// the next operation reconnects.
    pub async fn discover_all(&self) -> OpcUaResult<Vec<VariableRecord>> {
        let walk = {
            let transport = self.manager.session().await?;
            self.walk(&transport).await
        };
        if let Some(e) = &walk.session_error {
            self.manager.handle_error(e).await;
        }
        Ok(walk.records)
    }

    async fn walk(&self, transport: &T) -> Walk {
        let root = &self.options.root;

        let mut visited: HashSet<NodeId> = HashSet::from([root.clone()]);
        let mut stack: Vec<Pending> = Vec::new();
        let mut walk = Walk::default();

        if let Err(e) = self.expand(transport, root, 0, &mut stack).await {
            walk.browse_failed(e);
        }

        while let Some(pending) = stack.pop() {
            let Pending {
                reference,
                parent,
                depth,
            } = pending;

            if reference.browse_name.name == EXCLUDED_BROWSE_NAME {
                debug!(node_id = %reference.node_id, "Skipping excluded subtree");
                continue;
            }
            if !visited.insert(reference.node_id.clone()) {
                continue;
            }

            let Some(class) = self.node_class(transport, &reference).await else {
                continue;
            };

            match class {
                NodeClass::Object => {
                    let within_bound = self.options.max_depth.map_or(true, |max| depth < max);
                    if !within_bound {
                        continue;
                    }
                    let node = &reference.node_id;
                    if let Err(e) = self.expand(transport, node, depth, &mut stack).await {
                        walk.browse_failed(e);
                    }
                }
                NodeClass::Variable => {
                    let record = self.describe_variable(transport, reference, parent).await;
                    walk.records.push(record);
                }
                _ => {}
            }
        }

        info!(
            variables = walk.records.len(),
            visited = visited.len(),
            failed_browses = walk.failed_browses,
            "Address space discovery finished"
        );
        walk
    }

    /// Browses `node` and pushes its children so they pop in browse order.
    async fn expand(
        &self,
        transport: &T,
        node: &NodeId,
        depth: usize,
        stack: &mut Vec<Pending>,
    ) -> OpcUaResult<()> {
        let label = node.to_string();
        let browsed = with_request_timeout(
            self.manager.request_timeout(),
            transport.browse(node),
            |message| BrowseError::browse_failed(&label, message).into(),
        )
        .await;

        match browsed {
            Ok(children) => {
                stack.extend(children.into_iter().rev().map(|reference| Pending {
                    reference,
                    parent: node.clone(),
                    depth: depth + 1,
                }));
                Ok(())
            }
            Err(e) => {
                warn!(node_id = %node, error = %e, "Browse failed, skipping subtree");
                Err(e)
            }
        }
    }

    /// Node class from the browse reference, or from the NodeClass
    /// attribute when the server left it out.
    async fn node_class(&self, transport: &T, reference: &BrowseResult) -> Option<NodeClass> {
        if reference.node_class != 0 {
            return NodeClass::from_value(reference.node_class);
        }

        let value = self
            .read_attribute(transport, &reference.node_id, AttributeId::NodeClass)
            .await?;
        let class = value
            .as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .and_then(NodeClass::from_value);
        if class.is_none() {
            debug!(node_id = %reference.node_id, value = %value, "Unrecognized node class");
        }
        class
    }

    async fn describe_variable(
        &self,
        transport: &T,
        reference: BrowseResult,
        parent: NodeId,
    ) -> VariableRecord {
        let node_id = reference.node_id;
        let value = self.read_attribute(transport, &node_id, AttributeId::Value).await;
        let data_type = self
            .read_attribute(transport, &node_id, AttributeId::DataType)
            .await
            .and_then(|v| v.as_node_id().cloned());
        let description = self
            .read_attribute(transport, &node_id, AttributeId::Description)
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        VariableRecord {
            name: reference.browse_name.name,
            node_id,
            parent,
            value,
            data_type,
            description,
        }
    }

    /// Reads one attribute, yielding `None` on any failure.
    async fn read_attribute(
        &self,
        transport: &T,
        node_id: &NodeId,
        attribute: AttributeId,
    ) -> Option<OpcUaValue> {
        let label = node_id.to_string();
        let read = with_request_timeout(
            self.manager.request_timeout(),
            transport.read_attribute(node_id, attribute.value()),
            |message| OperationError::read_failed(&label, message).into(),
        )
        .await;

        match read {
            Ok(result) if result.is_good() => result.value,
            Ok(result) => {
                let e = OperationError::read_bad_status(label, result.status_code);
                debug!(?attribute, error = %e, "Attribute unavailable");
                None
            }
            Err(e) => {
                debug!(node_id = %node_id, ?attribute, error = %e, "Attribute read failed");
                None
            }
        }
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for DiscoveryWalker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryWalker")
            .field("manager", &self.manager)
            .field("options", &self.options)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
