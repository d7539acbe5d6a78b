pub mod backend;
pub mod collector;
pub mod config;
pub mod error;
pub mod mcp_runtime;
pub mod query;
pub mod registry;
pub mod sampling;
pub mod session;
pub mod uri_template;
