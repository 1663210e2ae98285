//! # Red-Green Common Library
//!
//! Shared code for the Red-Green experiment backend:
//! - Database schema and row models (sessions, trials, key frames, progress)
//! - Configuration loading and root folder resolution
//! - Timestamp helpers
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
