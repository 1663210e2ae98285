//! Request-level operations over the database and experiment catalog
//!
//! Every service re-reads what it needs from SQLite on each call; nothing
//! about a participant is kept in process memory between requests.

pub mod monitor;
pub mod scorer;
pub mod session_manager;
pub mod supervisor;
pub mod trial_sequencer;

pub use monitor::{SessionMonitor, SessionSummary};
pub use scorer::{Scorer, Submission};
pub use session_manager::{SessionManager, SessionStats, StartRequest, StartedSession};
pub use supervisor::{TimeoutStatus, TimeoutSupervisor};
pub use trial_sequencer::{SceneResponse, TrialSequencer};
