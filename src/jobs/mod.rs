//! Background delete jobs.
//!
//! - `cancel`: one-shot cooperative stop flag
//! - `registry`: owner → cancel handle map, one entry per active job
//! - `runner`: the fetch/delete/refetch sweep for a single owner
//! - `coordinator`: `run_job` / `stop_job` entry points used by the routes

pub mod cancel;
pub mod coordinator;
pub mod registry;
pub mod runner;

pub use cancel::CancelHandle;
pub use coordinator::JobCoordinator;
pub use registry::JobRegistry;
pub use runner::{JobOutcome, JobRunner, SWEEP_INCLUDES_REPOSTS};
