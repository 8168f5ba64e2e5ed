//! HTTP API.
//!
//! - `launches`: launch records CRUD
//! - `orchestrator`: start a run and poll its progress

mod launches;
mod orchestrator;
mod routes;

pub use routes::{app, serve, AppState};
