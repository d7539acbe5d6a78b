use crate::core::config::data::{BackendConfig, Config, QueryConfig};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_STEPS: u32 = 1;

impl BackendConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Falls back to the query model, then the built-in default.
    pub fn sampling_model(&self) -> &str {
        self.sampling_model
            .as_deref()
            .or(self.model.as_deref())
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS)
    }

    /// Reads the API key from the configured environment variable. Blank
    /// values count as unset.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl QueryConfig {
    /// At least one step always runs.
    pub fn max_steps(&self) -> u32 {
        self.max_steps.unwrap_or(DEFAULT_MAX_STEPS).max(1)
    }
}

impl Config {
    /// Every backend and query setting spelled out, for `config init`.
    pub fn starter() -> Config {
        Config {
            backend: BackendConfig {
                base_url: Some(DEFAULT_BASE_URL.to_string()),
                model: Some(DEFAULT_MODEL.to_string()),
                sampling_model: Some(DEFAULT_MODEL.to_string()),
                api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
                timeout_secs: Some(DEFAULT_BACKEND_TIMEOUT_SECS),
            },
            query: QueryConfig {
                max_steps: Some(DEFAULT_MAX_STEPS),
            },
            ..Config::default()
        }
    }

    /// Replaces the server command with a whitespace-separated command line.
    pub fn set_server_command_line(&mut self, command_line: &str) {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        if let Some(command) = parts.next() {
            self.server.command = Some(command);
            self.server.args = parts.collect();
        }
    }
}
