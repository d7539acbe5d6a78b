use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How to launch the MCP server process.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Executable to spawn, e.g. "node"
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Extra environment variables for the server process
    pub env: BTreeMap<String, String>,
    /// Seconds to wait for a response before giving up on a request
    pub request_timeout_secs: Option<u64>,
    /// Protocol version to request during the handshake
    pub protocol_version: Option<String>,
}

/// OpenAI-compatible chat completions endpoint used for queries and sampling.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    /// Model used for free-form queries
    pub model: Option<String>,
    /// Model used to answer sampling requests from the server
    pub sampling_model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Backend round trips allowed per query; tool results are fed back
    /// between steps
    pub max_steps: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub query: QueryConfig,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
