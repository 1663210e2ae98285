//! Database queries for sessions, trials, key frames and session progress
//!
//! Single-statement queries are generic over the executor so they run on
//! the pool or inside a transaction (`&mut *tx`).

pub mod key_frames;
pub mod progress;
pub mod sessions;
pub mod trials;
