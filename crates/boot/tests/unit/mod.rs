//! # Unit Tests
//!
//! One module per boot loader component, from the configuration store up to the
//! lifecycle orchestrator and its crash recovery path.

/// Configuration store: loading, typed lookups, overrides, lock and dump.
pub mod config;





/// Simulation backend resolution and memory topology.
pub mod simu;



/// Crash recovery state machine.
pub mod recovery;
