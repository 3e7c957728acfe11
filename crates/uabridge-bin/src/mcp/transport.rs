// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Newline-delimited JSON over a reader/writer pair.
//!
//! One message per line in each direction. Requests are handled in arrival
//! order and each response is flushed before the next line is read.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};
use uabridge_opcua::OpcUaTransport;

use super::server::McpServer;
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownSignal;

/// Why the serve loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The client closed its end of the input.
    EndOfInput,
    /// Shutdown was requested.
    Shutdown,
}

/// Serves requests until end of input or shutdown.
pub async fn serve_lines<T, R, W>(
    server: &McpServer<T>,
    mut reader: R,
    mut writer: W,
    shutdown: ShutdownSignal,
) -> BinResult<StopReason>
where
    T: OpcUaTransport,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let shutdown = shutdown.wait();
    tokio::pin!(shutdown);

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Stopping tool server on shutdown request");
                return Ok(StopReason::Shutdown);
            }
            read = reader.read_until(b'\n', &mut buf) => read.map_err(|e| {
                BinError::io(e.to_string()).with_context("Failed to read request")
            })?,
        };

        if read == 0 {
            info!("Input closed, stopping tool server");
            return Ok(StopReason::EndOfInput);
        }
        trace!(bytes = read, "Received line");

        if let Some(response) = server.handle_bytes(&buf).await {
            write_line(&mut writer, &response).await?;
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> BinResult<()> {
    writer.write_all(message.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    debug!(bytes = message.len(), "Response sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::Value;
    use tokio::io::BufReader;
    use uabridge_opcua::testing::MockTransport;
    use uabridge_opcua::OpcUaBridge;

    use crate::shutdown::ShutdownCoordinator;

    fn server() -> McpServer<MockTransport> {
        let (transport, _mock) = MockTransport::new();
        McpServer::new(Arc::new(OpcUaBridge::new(transport)))
    }

    #[tokio::test]
    async fn test_serves_until_eof() {
        let server = server();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();

        let reason = serve_lines(
            &server,
            BufReader::new(input.as_bytes()),
            &mut output,
            ShutdownCoordinator::new().shutdown_signal(),
        )
        .await
        .unwrap();

        assert_eq!(reason, StopReason::EndOfInput);
        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stop_serving() {
        let server = server();
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#);
        input.push(b'\n');
        let mut output = Vec::new();

        let reason = serve_lines(
            &server,
            BufReader::new(input.as_slice()),
            &mut output,
            ShutdownCoordinator::new().shutdown_signal(),
        )
        .await
        .unwrap();

        assert_eq!(reason, StopReason::EndOfInput);
        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], 3);
        assert_eq!(responses[1]["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let server = server();
        let coordinator = ShutdownCoordinator::new();
        let (_client, server_side) = tokio::io::duplex(64);
        let (read_half, write_half) = tokio::io::split(server_side);

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        let reason = tokio::time::timeout(
            Duration::from_secs(1),
            serve_lines(
                &server,
                BufReader::new(read_half),
                write_half,
                coordinator.shutdown_signal(),
            ),
        )
        .await
        .expect("serve loop should stop")
        .unwrap();
        assert_eq!(reason, StopReason::Shutdown);
    }
}
