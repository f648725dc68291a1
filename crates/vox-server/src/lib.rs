//! # vox-server
//!
//! Axum HTTP boundary for the recognition gateway.
//!
//! - `POST /api/recognize/audio?lang=<tag>`: raw audio in, transcript out
//! - `GET /health`: uptime and session occupancy
//! - `GET /metrics`: Prometheus text, when a recorder is installed
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ApiError;
pub use server::{AppState, RECOGNIZE_PATH, ServerHandle, VoxServer};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome};
