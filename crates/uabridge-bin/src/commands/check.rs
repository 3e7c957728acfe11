// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `check` command.

use std::io::Write;

use serde_json::json;
use tracing::info;
use uabridge_opcua::{OpcUaBridge, OpcUaTransport};

use crate::cli::{CheckArgs, Cli, OutputFormat};
use crate::config::BridgeConfig;
use crate::error::{BinError, BinResult};

/// Executes the `check` command against the configured server.
pub async fn check(cli: &Cli, args: CheckArgs) -> BinResult<()> {
    let config = BridgeConfig::load(cli.config.as_deref(), cli.endpoint.as_deref())?;
    run(config, args).await
}

#[cfg(feature = "real-transport")]
async fn run(config: BridgeConfig, args: CheckArgs) -> BinResult<()> {
    let bridge = OpcUaBridge::new(uabridge_opcua::RealOpcUaTransport::new(config.opcua));
    let mut report = Vec::new();
    check_with(&bridge, &args, &mut report).await?;
    std::io::stdout().write_all(&report)?;
    Ok(())
}

#[cfg(not(feature = "real-transport"))]
async fn run(_config: BridgeConfig, _args: CheckArgs) -> BinResult<()> {
    Err(BinError::init(super::MISSING_TRANSPORT))
}

/// Connects, lists the children of `args.node`, writes the report and
/// disconnects. The session is closed even when browsing fails.
pub async fn check_with<T: OpcUaTransport>(
    bridge: &OpcUaBridge<T>,
    args: &CheckArgs,
    out: &mut impl Write,
) -> BinResult<()> {
    let endpoint = bridge.manager().endpoint().to_string();
    info!(%endpoint, node = %args.node, "Checking server");

    let result = bridge.executor().browse_children(&args.node).await;
    bridge.shutdown().await;

    let children = result
        .map_err(|e| BinError::from(e).with_context(format!("Check of {} failed", endpoint)))?;

    match args.format {
        OutputFormat::Text => {
            writeln!(out, "Connected to {}", endpoint)?;
            writeln!(out, "Children of {} ({}):", args.node, children.len())?;
            for child in &children {
                writeln!(out, "  {:<24} {}", child.node_id, child.browse_name)?;
            }
        }
        OutputFormat::Json => {
            let report = json!({
                "endpoint": endpoint,
                "node_id": args.node,
                "children": children,
            });
            let text = serde_json::to_string_pretty(&report)
                .map_err(|e| BinError::runtime(e.to_string()))?;
            writeln!(out, "{}", text)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;

    use uabridge_opcua::testing::{MockServer, MockTransport};
    use uabridge_opcua::types::{NodeId, QualifiedName};

    fn bridge() -> (OpcUaBridge<MockTransport>, Arc<MockServer>) {
        let (transport, mock) = MockTransport::new();
        mock.add_object(
            &NodeId::OBJECTS_FOLDER,
            NodeId::numeric(0, 2253),
            QualifiedName::new(0, "Server"),
        );
        mock.add_object(
            &NodeId::OBJECTS_FOLDER,
            NodeId::numeric(2, 1),
            QualifiedName::new(2, "Boiler"),
        );
        (OpcUaBridge::new(transport), mock)
    }

    #[tokio::test]
    async fn test_check_text() {
        let (bridge, mock) = bridge();
        let mut out = Vec::new();

        check_with(&bridge, &CheckArgs::default(), &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Connected to opc.tcp://localhost:4840"));
        assert!(text.contains("Children of i=85 (2):"));
        assert!(text.contains("2:Boiler"));
        assert_eq!(mock.connect_count(), 1);
        assert_eq!(mock.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_check_json() {
        let (bridge, _mock) = bridge();
        let args = CheckArgs {
            format: OutputFormat::Json,
            ..CheckArgs::default()
        };
        let mut out = Vec::new();

        check_with(&bridge, &args, &mut out).await.unwrap();

        let report: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["node_id"], "i=85");
        assert_eq!(report["children"].as_array().unwrap().len(), 2);
        assert_eq!(report["children"][1]["node_id"], "ns=2;i=1");
    }

    #[tokio::test]
    async fn test_check_connection_failure() {
        let (bridge, mock) = bridge();
        mock.set_fail_connect(true);
        let mut out = Vec::new();

        let err = check_with(&bridge, &CheckArgs::default(), &mut out)
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().starts_with("Check of opc.tcp://localhost:4840 failed"));
        assert!(out.is_empty());
    }
}
