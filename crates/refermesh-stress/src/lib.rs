//! Refermesh stress harness
//!
//! Spawns competing actors against a shared database for a bounded
//! duration while nine SQL oracles continuously assert the storage
//! invariants. Actors share nothing but a stop signal; each holds its own
//! pooled connections, and a chaos task terminates random backends to
//! prove the invariants survive connection loss.
//!
//! Replayable: every run is driven by a `{seed, duration, concurrency}`
//! tuple printed at start and in every failure report.

pub mod actors;
pub mod chaos;
pub mod harness;
pub mod infra;
pub mod oracles;

pub use harness::{run, StressConfig, StressFailure, StressReport};
