//! Relais is an interactive terminal client for Model Context Protocol
//! servers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`mcp`] speaks JSON-RPC to a server child process over stdio, including
//!   requests the server sends back to us.
//! - [`core`] holds the session: capability discovery, argument collection,
//!   URI template resolution, the sampling bridge, the tool-augmented query
//!   engine, and the menu loop.
//! - [`api`] defines the chat completions payloads sent to the model.
//! - [`ui`] is the operator surface: numbered menus, text input, and yes/no
//!   confirmations on the terminal.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod mcp;
pub mod ui;
pub mod utils;
