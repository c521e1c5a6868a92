//! Configuration for the A2A server and CLI.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::store::{FileTaskStore, InMemoryTaskStore, TaskStore};

/// Server configuration — typically stored at `<config_dir>/a2a/server.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (or read from A2A_BIND).
    #[serde(default = "default_bind")]
    pub bind: String,

    /// TCP port (or read from A2A_PORT). `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the JSON-RPC endpoint.
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    /// Task store backend.
    #[serde(default)]
    pub store: StoreConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            rpc_path: default_rpc_path(),
            store: StoreConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a config file. Environment overrides are applied on top.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: ServerConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.apply_env()?;
        Ok(config)
    }

    /// `<config_dir>/a2a/server.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("a2a").join("server.toml"))
    }

    /// Load `path` if given, else the default path if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                let mut config = Self::default();
                config.apply_env()?;
                Ok(config)
            }
        }
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(
            std::env::var("A2A_BIND").ok(),
            std::env::var("A2A_PORT").ok(),
        )
    }

    fn apply_overrides(&mut self, bind: Option<String>, port: Option<String>) -> anyhow::Result<()> {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if let Some(port) = port {
            self.port = port
                .parse()
                .with_context(|| format!("invalid A2A_PORT {port:?}"))?;
        }
        Ok(())
    }

    /// The address to listen on.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}:{}: {}", self.bind, self.port, e))
    }

    /// Instantiate the configured task store.
    pub fn build_store(&self) -> anyhow::Result<Arc<dyn TaskStore>> {
        Ok(match &self.store {
            StoreConfig::Memory => Arc::new(InMemoryTaskStore::new()),
            StoreConfig::File { dir } => Arc::new(
                FileTaskStore::open(dir)
                    .with_context(|| format!("opening task store at {}", dir.display()))?,
            ),
        })
    }
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    41241
}

fn default_rpc_path() -> String {
    "/".into()
}

/// Where task snapshots live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Volatile in-process map.
    #[default]
    Memory,

    /// One JSON file per task under `dir`.
    File { dir: PathBuf },
}

/// Telemetry/observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether to export spans over OTLP.
    #[serde(default)]
    pub enabled: bool,

    /// OTLP exporter endpoint.
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,

    /// Log line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            format: LogFormat::default(),
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
