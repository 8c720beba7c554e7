//! liferake: CLI collector for Liferay headless-delivery content, outputting JSON datasets.

pub mod cli;
pub mod client;
pub mod config;
pub mod harvest;
pub mod model;

// Re-exports for CLI and consumers.
pub use client::{
    ClientError, Credentials, HttpSession, Paginator, RequestExecutor, SessionBuilder, Sleeper,
    ThreadSleeper, Transport, TransportError,
};
pub use harvest::{HarvestError, Harvester, RunPhase};
pub use model::{PageEnvelope, Record, RunStats, RunSummary};
