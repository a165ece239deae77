//! Core domain types and logic: configuration, errors, models, candidate
//! resolution, and channel orchestration.

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod resolver;
