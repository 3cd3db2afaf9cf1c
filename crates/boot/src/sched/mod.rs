//! Flow scheduler seam.
//!
//! The scheduler owns the flow registry the resolvers populate and runs the
//! simulated flows once booted. Every method takes `&self`: the recovery handler
//! reaches the scheduler from its own thread while the main thread is inside `boot`.

/// Default scheduler.
pub mod task_handler;

use std::fmt;
use std::io;

pub use self::task_handler::TaskHandler;
use crate::common::FlowId;
use crate::config::kinds::EmulSlot;
use crate::emul::EmulInterface;
use crate::report::ReportSink;
use crate::simu::Processor;
use crate::simu::topology::Topology;

/// Flow registry and runner.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Resolution is starting.
    fn plug_begin(&self);
    /// Resolution has completed.
    fn plug_end(&self);
    /// Registers the exclusive backend of flow `fid`.
    fn add_emul(&self, fid: FlowId, emul: Box<dyn EmulInterface>);
    /// Registers the shared accelerator backend, first declared by `owner`.
    fn add_emul_shared(&self, emul: Box<dyn EmulInterface>, owner: FlowId);
    /// Appends the backend slot of the next emulation flow.
    fn push_emul_mapping(&self, slot: EmulSlot);
    /// Snapshot of the flow-to-backend mapping, indexed by flow.
    fn emul_mapping(&self) -> Vec<EmulSlot>;
    /// Registers the simulation backend of flow `fid`.
    fn add_simu(&self, fid: FlowId, simu: Box<dyn Processor>);
    /// Memory topologies of every registered simulation backend, in flow order.
    fn memory_topologies(&self) -> Vec<Topology>;
    /// Runs the flows until they finish or `unboot` is called.
    fn boot(&self);
    /// Stops the simulated flows.
    fn unboot(&self);
    /// Releases every registered backend, waiting for a running slice to finish.
    fn unplug(&self);
    /// Releases every registered backend unless the registry is busy.
    ///
    /// Never blocks; returns `false` when the backends were left in place.
    fn try_unplug(&self) -> bool;
    /// Writes per-flow statistics.
    fn report(&self, label: &str, sink: &mut dyn ReportSink) -> io::Result<()>;
}
