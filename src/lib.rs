//! Sprout: a habit garden service.
//!
//! Users report lifestyle habits across three dimensions (food, health,
//! toxic exposure). An LLM classifier judges each dimension's trend, and the
//! garden engine turns those verdicts into streaks, plant health, growth,
//! and transformations, persisted in libSQL and served over HTTP.

pub mod bootstrap;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod garden;
pub mod gateway;
pub mod llm;

pub use config::Config;
pub use error::{Error, Result};
