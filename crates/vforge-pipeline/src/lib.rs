//! VForge pipeline core.
//!
//! Runs the ordered stage chain for a processing request, fans the final
//! artifact out to durable storage, sweeps ephemeral files and hands the
//! result to the distribution queue.

pub mod adapters;
pub mod cleanup;
pub mod config;
pub mod distribution;
pub mod error;
pub mod executor;
pub mod fan_out;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use adapters::{StageAdapter, StageRegistry};
pub use cleanup::{CleanupManager, CleanupReport};
pub use config::PipelineConfig;
pub use distribution::{DistributionEnqueuer, DistributionOutcome};
pub use error::{ErrorCategory, PipelineError, PipelineResult, StageError};
pub use executor::{ExecutionOutcome, Executor, RunContext};
pub use fan_out::{FanOut, FanOutOutcome};
pub use logging::PipelineLogger;
pub use service::{PipelineDeps, PipelineService};
pub use tracker::ArtifactTracker;
