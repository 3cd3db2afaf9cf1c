//! Simulation backend resolution.
//!
//! This module turns the root `cpusimu` record into (memory system, processor) pairs.
//! For each flow it performs:
//! 1. **Memory selection:** a dummy memory system when the section declares `noMemory`,
//!    the real one otherwise.
//! 2. **Memory build:** the memory system resolves its full topology. Only a
//!    [`BuiltMemory`] can be handed to a processor constructor, so a processor can never
//!    observe a half-built memory system.
//! 3. **Processor selection:** in-order, accelerator streaming multiprocessor, or
//!    out-of-order, in that order of precedence.
//! 4. **Registration:** the processor (owning its memory) is registered with the scheduler.

/// Memory hierarchy topology and the architecture diagram.
pub mod topology;

use std::fmt;

use tracing::info;

use self::topology::Topology;
use crate::common::{ConfError, FlowId};
use crate::components::Components;
use crate::config::kinds::{MemoryKind, ProcessorKind};
use crate::config::{Capabilities, ConfStore};
use crate::sched::Scheduler;

/// Memory system serving one flow.
pub trait MemorySystem: Send + fmt::Debug {
    /// Memory system variant.
    fn kind(&self) -> MemoryKind;
    /// Flow the memory system belongs to.
    fn flow(&self) -> FlowId;
    /// Builds the internal topology from the flow's `cpusimu` section.
    fn build(&mut self, conf: &ConfStore, section: &str) -> Result<(), ConfError>;
    /// Resolved topology. Before `build` only the processor node is present.
    fn topology(&self) -> &Topology;
}

/// A memory system whose `build` has completed.
#[derive(Debug)]
pub struct BuiltMemory(Box<dyn MemorySystem>);

impl BuiltMemory {
    /// Builds `memory` and wraps it.
    pub fn build(
        mut memory: Box<dyn MemorySystem>,
        conf: &ConfStore,
        section: &str,
    ) -> Result<Self, ConfError> {
        memory.build(conf, section)?;
        Ok(Self(memory))
    }

    /// The built memory system.
    pub fn get(&self) -> &dyn MemorySystem {
        self.0.as_ref()
    }

    /// Unwraps the memory system.
    pub fn into_inner(self) -> Box<dyn MemorySystem> {
        self.0
    }
}

/// Processor timing model of one flow.
pub trait Processor: Send + fmt::Debug {
    /// Processor model variant.
    fn kind(&self) -> ProcessorKind;
    /// Flow the processor simulates.
    fn flow(&self) -> FlowId;
    /// Memory system the processor issues accesses to.
    fn memory(&self) -> &dyn MemorySystem;
}

/// Resolves every `cpusimu` entry and registers the processors with `tasks`.
pub fn plug_simu_interfaces(
    conf: &mut ConfStore,
    caps: &Capabilities,
    components: &dyn Components,
    tasks: &dyn Scheduler,
) {
    let nsimu = conf.record_size(ConfStore::ROOT, "cpusimu");
    info!("cpusimu size [{nsimu}]");

    for i in 0..nsimu {
        let fid = FlowId::from(i);
        match conf.record(ConfStore::ROOT, "cpusimu", i) {
            Ok(section) => {
                let section = section.to_owned();
                create_simu_interface(conf, caps, components, tasks, &section, fid);
            }
            Err(e) => conf.not_correct(e),
        }
    }
}

/// Builds and registers the simulation backend of flow `fid`.
pub fn create_simu_interface(
    conf: &mut ConfStore,
    caps: &Capabilities,
    components: &dyn Components,
    tasks: &dyn Scheduler,
    section: &str,
    fid: FlowId,
) {
    if !conf.has_section(section) {
        conf.not_correct(ConfError::MissingSection {
            section: section.to_owned(),
            from: ConfStore::ROOT.to_owned(),
            key: "cpusimu".to_owned(),
        });
        return;
    }

    let kind = match conf.get_bool_or(section, "noMemory", false) {
        Ok(true) => MemoryKind::Dummy,
        Ok(false) => MemoryKind::Real,
        Err(e) => {
            conf.not_correct(e);
            return;
        }
    };
    let memory = match BuiltMemory::build(components.new_memory(kind, fid), conf, section) {
        Ok(memory) => memory,
        Err(e) => {
            conf.not_correct(e);
            return;
        }
    };

    match select_processor(conf, caps, section) {
        Ok(proc_kind) => tasks.add_simu(fid, components.new_processor(proc_kind, memory, fid)),
        Err(e) => conf.not_correct(e),
    }
}

fn select_processor(
    conf: &ConfStore,
    caps: &Capabilities,
    section: &str,
) -> Result<ProcessorKind, ConfError> {
    if conf.get_bool_or(section, "inorder", false)? {
        return Ok(ProcessorKind::InOrder);
    }
    if caps.accelerator && conf.check_int(section, "sp_per_sm") {
        let sp_per_sm = conf.get_int(section, "sp_per_sm")?;
        if sp_per_sm < 1 {
            return Err(ConfError::InvalidValue {
                section: section.to_owned(),
                key: "sp_per_sm".to_owned(),
                value: sp_per_sm.to_string(),
            });
        }
        info!("SPs per SM in the GPU = {sp_per_sm}");
        return Ok(ProcessorKind::GpuSm);
    }
    Ok(ProcessorKind::OutOfOrder)
}
