//! Experiment domain: trial content, ordering, progress, sequencing, scoring

pub mod catalog;
pub mod content;
pub mod ordering;
pub mod progress;
pub mod scoring;
pub mod sequencer;

pub use catalog::{ExperimentCatalog, LoadedExperiment};
pub use content::{Outcome, TrialContent};
pub use progress::SessionProgress;
pub use scoring::{KeyTally, RecordedFrame};
pub use sequencer::{advance, Scene, SequenceError};
