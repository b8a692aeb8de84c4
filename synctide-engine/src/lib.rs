//! # synctide-engine
//!
//! The run path: connectivity gate, per-user run lock, cascading filter
//! resolution, flag merging, subprocess supervision, and the orchestrator
//! that ties them together.
//!
//! Service installation lives in `synctide-service`; the two never call
//! each other.

pub mod cancel;
pub mod error;
pub mod executor;
pub mod filters;
pub mod flags;
pub mod lock;
pub mod net;
pub mod runner;

pub use cancel::CancelFlag;
pub use error::EngineError;
pub use executor::{Executor, SyncExecutor};
pub use filters::{FilterArg, FilterResolver};
pub use flags::merge_flags;
pub use lock::RunLock;
pub use net::{PingProbe, Probe};
pub use runner::{RunOutcome, RunReport, Runner};
