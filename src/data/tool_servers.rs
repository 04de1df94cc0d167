//! External tool-server manager.
//!
//! Tool servers are child processes speaking line-delimited JSON over stdio:
//! one request object per line in (`{"id", "tool", "args"}`), one response
//! object per line out (`{"id", "ok", "data", "error"}`). The manager owns
//! every child's lifetime (`kill_on_drop` plus an explicit shutdown path)
//! and walks a per-capability priority list when asked for a fallback.
//!
//! Configuration is a YAML file; `${VAR}` values in server env blocks are
//! expanded from the process environment.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::provider::Capability;

// ── Configuration ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ToolServerConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Canonical operation name -> this server's tool name.
    #[serde(default)]
    pub tool_mappings: HashMap<String, String>,
    /// Canonical parameter name -> this server's parameter name.
    #[serde(default)]
    pub param_mappings: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolServersConfig {
    #[serde(default)]
    pub tool_servers: HashMap<String, ToolServerConfig>,
    /// Capability name -> ordered list of server ids to try.
    #[serde(default)]
    pub fallback_priority: HashMap<String, Vec<String>>,
}

impl ToolServersConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!("Tool servers config not found at {}", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config: ToolServersConfig = serde_yaml::from_str(&raw)?;
        for server in config.tool_servers.values_mut() {
            for value in server.env.values_mut() {
                *value = expand_env(value);
            }
        }
        Ok(config)
    }
}

/// Expand `${VAR}` references from the process environment.
fn expand_env(value: &str) -> String {
    if let Some(name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        return std::env::var(name).unwrap_or_default();
    }
    value.to_string()
}

// ── Wire protocol ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Result of a single tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub server_id: String,
    pub tool_name: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: f64,
}

// ── Server status (exposed over the API) ─────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ToolServerStatus {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub status: String,
    pub capabilities: Vec<Capability>,
    pub call_count: u64,
    pub avg_response_ms: f64,
    pub error: Option<String>,
}

// ── Manager ──────────────────────────────────────────────────────────────

struct ChildIo {
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

struct ServerHandle {
    config: ToolServerConfig,
    io: Mutex<Option<ChildIo>>,
    next_id: AtomicU64,
}

pub struct ToolServerManager {
    config: ToolServersConfig,
    servers: HashMap<String, Arc<ServerHandle>>,
    statuses: RwLock<HashMap<String, ToolServerStatus>>,
}

impl ToolServerManager {
    pub fn new(config: ToolServersConfig) -> Self {
        let mut servers = HashMap::new();
        let mut statuses = HashMap::new();

        for (id, server_config) in &config.tool_servers {
            statuses.insert(
                id.clone(),
                ToolServerStatus {
                    id: id.clone(),
                    name: server_config.name.clone(),
                    enabled: server_config.enabled,
                    status: "disconnected".to_string(),
                    capabilities: server_config.capabilities.clone(),
                    call_count: 0,
                    avg_response_ms: 0.0,
                    error: None,
                },
            );
            servers.insert(
                id.clone(),
                Arc::new(ServerHandle {
                    config: server_config.clone(),
                    io: Mutex::new(None),
                    next_id: AtomicU64::new(1),
                }),
            );
        }

        Self {
            config,
            servers,
            statuses: RwLock::new(statuses),
        }
    }

    /// Spawn every enabled server. Failures are recorded per server, not fatal.
    pub async fn startup(&self) {
        info!(
            "Tool server manager starting with {} configured servers",
            self.servers.len()
        );
        for (id, handle) in &self.servers {
            if !handle.config.enabled {
                continue;
            }
            match self.spawn(handle).await {
                Ok(io) => {
                    *handle.io.lock().await = Some(io);
                    self.update_status(id, |s| {
                        s.status = "connected".to_string();
                        s.error = None;
                    });
                    info!("Connected tool server '{id}' ({})", handle.config.name);
                }
                Err(e) => {
                    error!("Failed to start tool server '{id}': {e}");
                    self.update_status(id, |s| {
                        s.status = "error".to_string();
                        s.error = Some(e.to_string());
                    });
                }
            }
        }
    }

    async fn spawn(&self, handle: &ServerHandle) -> anyhow::Result<ChildIo> {
        let mut child = Command::new(&handle.config.command)
            .args(&handle.config.args)
            .envs(&handle.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow::anyhow!("no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| anyhow::anyhow!("no stdout"))?;

        Ok(ChildIo {
            _child: child,
            stdin,
            stdout,
        })
    }

    /// Kill all children. Safe to call more than once.
    pub async fn shutdown(&self) {
        info!("Tool server manager shutting down");
        for (id, handle) in &self.servers {
            let mut io = handle.io.lock().await;
            if let Some(mut child_io) = io.take() {
                let _ = child_io._child.kill().await;
                self.update_status(id, |s| s.status = "disconnected".to_string());
            }
        }
    }

    fn update_status(&self, id: &str, f: impl FnOnce(&mut ToolServerStatus)) {
        if let Some(status) = self.statuses.write().get_mut(id) {
            f(status);
        }
    }

    /// Call a specific tool on a specific server.
    pub async fn call_tool(&self, server_id: &str, tool_name: &str, args: Value) -> ToolCallResult {
        let failed = |error: String| ToolCallResult {
            server_id: server_id.to_string(),
            tool_name: tool_name.to_string(),
            success: false,
            data: None,
            error: Some(error),
            duration_ms: 0.0,
        };

        let Some(handle) = self.servers.get(server_id) else {
            return failed(format!("Server '{server_id}' not configured"));
        };

        let start = std::time::Instant::now();
        let mut io_guard = handle.io.lock().await;
        let Some(io) = io_guard.as_mut() else {
            return failed(format!("Server '{server_id}' not connected"));
        };

        let request_id = handle.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({ "id": request_id, "tool": tool_name, "args": args });

        let outcome = async {
            let mut line = serde_json::to_string(&request)
                .map_err(|e| format!("encode request: {e}"))?;
            line.push('\n');
            io.stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| format!("write request: {e}"))?;
            io.stdin.flush().await.map_err(|e| format!("flush: {e}"))?;

            let mut response_line = String::new();
            let n = io
                .stdout
                .read_line(&mut response_line)
                .await
                .map_err(|e| format!("read response: {e}"))?;
            if n == 0 {
                return Err("server closed stdout".to_string());
            }
            let response: WireResponse = serde_json::from_str(response_line.trim())
                .map_err(|e| format!("decode response: {e}"))?;
            if response.id != request_id {
                return Err(format!(
                    "response id {} does not match request id {request_id}",
                    response.id
                ));
            }
            Ok(response)
        }
        .await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        drop(io_guard);

        self.update_status(server_id, |s| {
            let total = s.avg_response_ms * s.call_count as f64 + duration_ms;
            s.call_count += 1;
            s.avg_response_ms = total / s.call_count as f64;
        });

        match outcome {
            Ok(response) if response.ok => ToolCallResult {
                server_id: server_id.to_string(),
                tool_name: tool_name.to_string(),
                success: true,
                data: response.data,
                error: None,
                duration_ms,
            },
            Ok(response) => ToolCallResult {
                server_id: server_id.to_string(),
                tool_name: tool_name.to_string(),
                success: false,
                data: None,
                error: response.error.or_else(|| Some("tool error".to_string())),
                duration_ms,
            },
            Err(e) => {
                error!("Error calling {tool_name} on {server_id}: {e}");
                ToolCallResult {
                    server_id: server_id.to_string(),
                    tool_name: tool_name.to_string(),
                    success: false,
                    data: None,
                    error: Some(e),
                    duration_ms,
                }
            }
        }
    }

    /// Walk the capability's priority list; return the first success.
    ///
    /// `mapping_key` is the canonical operation name translated per server
    /// via its `tool_mappings`; canonical argument names are translated via
    /// `param_mappings`.
    pub async fn call_with_fallback(
        &self,
        capability: Capability,
        mapping_key: &str,
        args: &Value,
    ) -> Option<ToolCallResult> {
        let priority = self.config.fallback_priority.get(&capability.to_string())?;

        for server_id in priority {
            let Some(handle) = self.servers.get(server_id) else {
                continue;
            };
            if !handle.config.capabilities.contains(&capability) {
                continue;
            }
            let Some(tool_name) = handle.config.tool_mappings.get(mapping_key) else {
                continue;
            };

            let translated = translate_args(args, &handle.config.param_mappings);
            let result = self.call_tool(server_id, tool_name, translated).await;
            if result.success {
                return Some(result);
            }
            warn!(
                "Fallback {server_id}/{tool_name} failed: {}",
                result.error.as_deref().unwrap_or("unknown")
            );
        }

        None
    }

    /// True if at least one configured fallback can serve this capability.
    pub fn has_fallback_for(&self, capability: Capability) -> bool {
        self.config
            .fallback_priority
            .get(&capability.to_string())
            .map(|priority| {
                priority.iter().any(|id| {
                    self.servers
                        .get(id)
                        .is_some_and(|h| h.config.capabilities.contains(&capability))
                })
            })
            .unwrap_or(false)
    }

    pub fn statuses(&self) -> Vec<ToolServerStatus> {
        let mut all: Vec<_> = self.statuses.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

/// Rename canonical argument keys into a server's parameter names.
fn translate_args(args: &Value, param_mappings: &HashMap<String, String>) -> Value {
    let Value::Object(map) = args else {
        return args.clone();
    };
    let translated = map
        .iter()
        .map(|(key, value)| {
            let name = param_mappings.get(key).cloned().unwrap_or_else(|| key.clone());
            (name, value.clone())
        })
        .collect();
    Value::Object(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_expands_env_references() {
        std::env::set_var("OPTDESK_TEST_TOKEN", "sekrit");
        let yaml = r#"
tool_servers:
  bridge:
    name: Test Bridge
    enabled: false
    command: cat
    env:
      TOKEN: "${OPTDESK_TEST_TOKEN}"
      PLAIN: literal
    capabilities: [quote]
    tool_mappings:
      get_quote: get_stock_info
fallback_priority:
  quote: [bridge]
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = ToolServersConfig::load(file.path()).unwrap();
        let bridge = &config.tool_servers["bridge"];
        assert_eq!(bridge.env["TOKEN"], "sekrit");
        assert_eq!(bridge.env["PLAIN"], "literal");
        assert_eq!(config.fallback_priority["quote"], vec!["bridge"]);
    }

    #[test]
    fn missing_config_is_empty() {
        let config = ToolServersConfig::load(Path::new("/nonexistent/tools.yaml")).unwrap();
        assert!(config.tool_servers.is_empty());
    }

    #[test]
    fn translate_args_renames_keys() {
        let mut mappings = HashMap::new();
        mappings.insert("symbol".to_string(), "ticker".to_string());
        let args = json!({"symbol": "AAPL", "market": "US"});
        let translated = translate_args(&args, &mappings);
        assert_eq!(translated["ticker"], "AAPL");
        assert_eq!(translated["market"], "US");
        assert!(translated.get("symbol").is_none());
    }

    #[tokio::test]
    async fn call_tool_on_unconnected_server_fails_cleanly() {
        let yaml = r#"
tool_servers:
  bridge:
    name: Test Bridge
    enabled: false
    command: cat
    capabilities: [quote]
"#;
        let config: ToolServersConfig = serde_yaml::from_str(yaml).unwrap();
        let manager = ToolServerManager::new(config);
        let result = manager.call_tool("bridge", "get_quote", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not connected"));
    }

    #[tokio::test]
    async fn fallback_walk_skips_servers_without_mapping() {
        let yaml = r#"
tool_servers:
  no_mapping:
    name: No Mapping
    enabled: false
    command: cat
    capabilities: [quote]
fallback_priority:
  quote: [no_mapping, missing_server]
"#;
        let config: ToolServersConfig = serde_yaml::from_str(yaml).unwrap();
        let manager = ToolServerManager::new(config);
        let result = manager
            .call_with_fallback(Capability::Quote, "get_quote", &json!({"symbol": "SPY"}))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn roundtrip_against_cat_echo_server() {
        // `cat` echoes the request line back, exercising spawn, the write/
        // read round trip, and shutdown against a real child process.
        let yaml = r#"
tool_servers:
  echo:
    name: Echo
    enabled: true
    command: cat
    capabilities: [quote]
    tool_mappings:
      get_quote: get_quote
"#;
        let config: ToolServersConfig = serde_yaml::from_str(yaml).unwrap();
        let manager = ToolServerManager::new(config);
        manager.startup().await;

        // The echoed request has no "ok" field, so it decodes as a failure
        // payload rather than hanging or panicking.
        let result = manager.call_tool("echo", "get_quote", json!({"ok": true})).await;
        assert_eq!(result.server_id, "echo");

        manager.shutdown().await;
    }
}
