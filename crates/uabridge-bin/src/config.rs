// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge configuration loading.
//!
//! Without a file, the bridge runs on defaults and only the endpoint is
//! taken from `--endpoint` or `OPCUA_SERVER_URL`. A file may also tune the
//! session timing and the discovery depth:
//!
//! ```yaml
//! opcua:
//!   endpoint: opc.tcp://plc:4840
//!   request_timeout: 5s
//! discovery:
//!   max_depth: 6
//! ```
//!
//! Precedence, lowest first: defaults, file, environment/flag endpoint,
//! `serve --max-depth`.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uabridge_opcua::{DiscoveryOptions, OpcUaConfig};

use crate::error::{BinError, BinResult};

// =============================================================================
// BridgeConfig
// =============================================================================

/// Complete configuration of the bridge process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// OPC UA session settings.
    #[serde(default)]
    pub opcua: OpcUaConfig,

    /// Variable discovery settings.
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

/// Discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Maximum folder depth below the Objects folder; unlimited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl BridgeConfig {
    /// Loads the configuration, applies the endpoint override and validates.
    pub fn load(path: Option<&Path>, endpoint: Option<&str>) -> BinResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(endpoint) = endpoint.map(str::trim).filter(|e| !e.is_empty()) {
            debug!(endpoint, "Endpoint overridden");
            config.opcua.endpoint = endpoint.to_string();
        }

        config.opcua.validate()?;
        Ok(config)
    }

    /// Parses a configuration file; the format follows the extension.
    pub fn from_file(path: &Path) -> BinResult<Self> {
        info!("Loading configuration from: {}", path.display());

        let format = ConfigFormat::from_path(path)?;
        Self::read_file(path, format).map_err(|e| BinError::config(format!("{e:#}")))
    }

    /// Parses configuration text in the given format.
    pub fn parse_str(content: &str, format: ConfigFormat) -> BinResult<Self> {
        Self::deserialize(content, format).map_err(|e| BinError::config(format!("{e:#}")))
    }

    fn read_file(path: &Path, format: ConfigFormat) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::deserialize(&content, format)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn deserialize(content: &str, format: ConfigFormat) -> anyhow::Result<Self> {
        Ok(match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        })
    }

    /// Discovery options with an optional command-line depth override.
    pub fn discovery_options(&self, max_depth: Option<usize>) -> DiscoveryOptions {
        match max_depth.or(self.discovery.max_depth) {
            Some(depth) => DiscoveryOptions::default().with_max_depth(depth),
            None => DiscoveryOptions::default(),
        }
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> BinResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(BinError::config(format!(
                "unsupported configuration format: {}",
                other
            ))),
            None => Err(BinError::config(
                "unsupported configuration format: (no extension)",
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
