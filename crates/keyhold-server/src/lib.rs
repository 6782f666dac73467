//! Keyhold HTTP server.
//!
//! Wires the core services, the configured store, and the HTTP routes into a
//! running Axum server. Everything lives under `/api/*` except `/health`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
