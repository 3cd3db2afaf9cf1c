//! ESESC boot loader library.
//!
//! This crate resolves a declarative simulator configuration into a running system
//! and drives it through its lifecycle:
//! 1. **Configuration:** section/key/value store with an accumulating error channel.
//! 2. **Emulation:** `cpuemul` entries become per-flow CPU backends or one shared accelerator backend.
//! 3. **Sampling:** every flow gets a sampler bound to the backend serving it.
//! 4. **Simulation:** `cpusimu` entries become built memory systems and processors.
//! 5. **Orchestration:** `BootLoader` runs plug, boot, report, unboot and unplug.
//! 6. **Recovery:** stop signals produce one partial report before an orderly shutdown.

/// Common types (flow ids, errors).
pub mod common;
/// Component factory seam and the inert component family.
pub mod components;
/// Configuration store, arguments, capabilities and kind tables.
pub mod config;
/// Emulation backend and sampler resolution.
pub mod emul;
/// Power and thermal model seams.
pub mod power;
/// Report sink and report identity.
pub mod report;
/// Flow scheduler seam and the default task handler.
pub mod sched;
/// Lifecycle orchestrator and crash recovery.
pub mod sim;
/// Simulation backend resolution and memory topology.
pub mod simu;
/// Global statistics registry.
pub mod stats;

/// Errors returned by lifecycle stages.
pub use crate::common::{BootError, ConfError, FlowId};
/// Configuration store and the arguments it loads from.
pub use crate::config::{Capabilities, ConfArgs, ConfStore};
/// File-backed report sink.
pub use crate::report::FileReport;
/// Default scheduler.
pub use crate::sched::TaskHandler;
/// Orchestrator; construct with `BootLoader::new` and share it with `Recovery`.
pub use crate::sim::{BootLoader, Recovery};
