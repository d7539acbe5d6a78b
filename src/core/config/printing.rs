use crate::core::config::data::Config;

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(unset)")
}

impl Config {
    /// Effective settings, one per line, defaults filled in.
    pub fn render(&self) -> String {
        let mut lines = vec!["Current configuration:".to_string()];

        let server = &self.server;
        lines.push(format!("  server.command: {}", or_unset(server.command.as_deref())));
        if server.args.is_empty() {
            lines.push("  server.args: (none)".to_string());
        } else {
            lines.push(format!("  server.args: {}", server.args.join(" ")));
        }
        if server.env.is_empty() {
            lines.push("  server.env: (none)".to_string());
        } else {
            lines.push("  server.env:".to_string());
            for key in server.env.keys() {
                lines.push(format!("    {key}: (set)"));
            }
        }
        lines.push(format!(
            "  server.request_timeout_secs: {}",
            server
                .request_timeout_secs
                .map(|secs| secs.to_string())
                .unwrap_or_else(|| "(default)".to_string())
        ));
        lines.push(format!(
            "  server.protocol_version: {}",
            or_unset(server.protocol_version.as_deref())
        ));

        let backend = &self.backend;
        lines.push(format!("  backend.base_url: {}", backend.base_url()));
        lines.push(format!("  backend.model: {}", backend.model()));
        lines.push(format!("  backend.sampling_model: {}", backend.sampling_model()));
        let key_state = if backend.api_key().is_some() {
            "set"
        } else {
            "missing"
        };
        lines.push(format!(
            "  backend.api_key_env: {} ({key_state})",
            backend.api_key_env()
        ));
        lines.push(format!("  backend.timeout_secs: {}", backend.timeout_secs()));
        lines.push(format!("  query.max_steps: {}", self.query.max_steps()));

        lines.join("\n")
    }

    pub fn print_all(&self) {
        println!("{}", self.render());
    }
}
