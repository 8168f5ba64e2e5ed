//! # Launch Orchestrator
//!
//! Runs a fixed pipeline of launch-planning agents against a tracked product
//! launch and assembles their documents into a consolidated report.
//!
//! This library provides:
//! - An HTTP API for launch records, starting runs and polling progress
//! - A sequential orchestrator over a static phase table
//! - Inference clients for OpenRouter and Ollama
//! - SQLite persistence of launches and per-task results
//!
//! ## Task Flow
//! 1. Create one pending result row per task
//! 2. Run phases in order, tasks in order, each seeing earlier outputs
//! 3. Per task: health probe, bounded generation, validation, fallback
//! 4. Render the final report and record the run's terminal status
//!
//! ## Modules
//! - `agents`: agent capability trait, the launch agents and the task executor
//! - `orchestrator`: phase table, run driver and trigger surface
//! - `store`: launch and task-result persistence
//! - `llm`: inference clients and transport retry

pub mod agents;
pub mod api;
pub mod config;
pub mod llm;
pub mod orchestrator;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
