//! HTTP control API for the buildsync daemon.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServerConfig, AppState, build_router, serve};
