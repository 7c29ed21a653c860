//! Matrix: a personal media scrapbook with a small multi-agent chat.
//!
//! Moments (GIFs and images) are collected into a heap, arranged into stories,
//! and thrown in the trash. The whole scrapbook can be exported to and
//! restored from a single JSON backup. A crew of agents can be asked about the
//! story on screen through any OpenAI-compatible or Anthropic chat API.
//!
//! # Architecture
//!
//! - **Storage**: SQLite key-value table of JSON documents (`heap`, `trash`,
//!   `stories`, `story:<id>`, `overlays`, `agents`)
//! - **Layout**: justified row packing computed server side for the grid
//! - **Chat**: @mention routing to parallel or sequential provider calls,
//!   with a canned demo transcript when no key is configured
//! - **Transport**: JSON over HTTP (axum), plus CORS-safe image and album proxies
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`store`]: Typed JSON get/set over the key-value table
//! - [`scrapbook`]: Heap, trash, stories, overlays, and agents
//! - [`backup`]: Export, preview, and lenient import
//! - [`layout`]: Justified masonry rows
//! - [`chat`]: Agent orchestration and LLM providers
//! - [`roles`]: Markdown role definitions
//! - [`proxy`]: Image proxy and album fetch
//! - [`server`]: HTTP routes

pub mod backup;
pub mod chat;
pub mod config;
pub mod db;
pub mod layout;
pub mod proxy;
pub mod roles;
pub mod scrapbook;
pub mod server;
pub mod store;
