//! Lock relay server library.
//!
//! Bridges WebSocket editors onto per-document lock topics of a shared
//! in-process hub. Exposes config, state, routes and the full middleware
//! stack so the binary and integration tests build the same application.

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;
