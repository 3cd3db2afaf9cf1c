//! Inert component implementations.
//!
//! These stand in for the real emulators, samplers and timing models: they record
//! how they were configured and bound, and every flow finishes on its first slice.
//! The real memory variant still resolves its topology so the architecture diagram
//! reflects the configuration.

use std::collections::BTreeMap;

use tracing::warn;

use super::Components;
use crate::common::{ConfError, FlowId};
use crate::config::ConfStore;
use crate::config::kinds::{EmulKind, MemoryKind, ProcessorKind, SamplerKind};
use crate::emul::EmulInterface;
use crate::emul::sampler::{Sampler, SamplerBinding};
use crate::power::{NullPowerModel, NullThermal, PowerModel, ThermalReport};
use crate::simu::topology::Topology;
use crate::simu::{BuiltMemory, MemorySystem, Processor};

/// Factory producing inert components.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertComponents;

impl Components for InertComponents {
    fn new_emul(&self, kind: EmulKind, section: &str) -> Box<dyn EmulInterface> {
        Box::new(InertEmul::new(kind, section))
    }

    fn new_sampler(
        &self,
        kind: SamplerKind,
        section: &str,
        binding: &SamplerBinding,
    ) -> Box<dyn Sampler> {
        Box::new(InertSampler {
            kind,
            section: section.to_owned(),
            fid: binding.fid,
        })
    }

    fn new_memory(&self, kind: MemoryKind, fid: FlowId) -> Box<dyn MemorySystem> {
        Box::new(InertMemory {
            kind,
            fid,
            topology: Topology::empty(fid),
        })
    }

    fn new_processor(
        &self,
        kind: ProcessorKind,
        memory: BuiltMemory,
        fid: FlowId,
    ) -> Box<dyn Processor> {
        Box::new(InertProcessor { kind, fid, memory })
    }

    fn new_power_model(&self) -> Box<dyn PowerModel> {
        Box::<NullPowerModel>::default()
    }

    fn new_thermal(&self) -> Box<dyn ThermalReport> {
        Box::<NullThermal>::default()
    }
}

/// Emulation backend with nothing to emulate.
#[derive(Debug)]
pub struct InertEmul {
    kind: EmulKind,
    section: String,
    samplers: BTreeMap<FlowId, Box<dyn Sampler>>,
}

impl InertEmul {
    /// Creates a backend of `kind` for `section`.
    pub fn new(kind: EmulKind, section: &str) -> Self {
        Self {
            kind,
            section: section.to_owned(),
            samplers: BTreeMap::new(),
        }
    }

    /// Flows with a bound sampler, in flow order.
    pub fn flows(&self) -> impl Iterator<Item = FlowId> + '_ {
        self.samplers.keys().copied()
    }
}

impl EmulInterface for InertEmul {
    fn kind(&self) -> EmulKind {
        self.kind
    }

    fn section(&self) -> &str {
        &self.section
    }

    fn set_sampler(&mut self, sampler: Box<dyn Sampler>, fid: FlowId) {
        if self.samplers.insert(fid, sampler).is_some() {
            warn!(flow = %fid, "sampler replaced on {} backend", self.kind);
        }
    }

    fn sampler(&self, fid: FlowId) -> Option<&dyn Sampler> {
        self.samplers.get(&fid).map(Box::as_ref)
    }

    fn execute(&mut self, _fid: FlowId) -> bool {
        false
    }
}

/// Sampler that never switches phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InertSampler {
    kind: SamplerKind,
    section: String,
    fid: FlowId,
}

impl Sampler for InertSampler {
    fn kind(&self) -> SamplerKind {
        self.kind
    }

    fn section(&self) -> &str {
        &self.section
    }

    fn flow(&self) -> FlowId {
        self.fid
    }
}

/// Memory system that resolves its topology and nothing else.
#[derive(Debug, Clone)]
pub struct InertMemory {
    kind: MemoryKind,
    fid: FlowId,
    topology: Topology,
}

impl MemorySystem for InertMemory {
    fn kind(&self) -> MemoryKind {
        self.kind
    }

    fn flow(&self) -> FlowId {
        self.fid
    }

    fn build(&mut self, conf: &ConfStore, section: &str) -> Result<(), ConfError> {
        if self.kind == MemoryKind::Real {
            self.topology = Topology::resolve(conf, section, self.fid)?;
        }
        Ok(())
    }

    fn topology(&self) -> &Topology {
        &self.topology
    }
}

/// Processor model that issues nothing.
#[derive(Debug)]
pub struct InertProcessor {
    kind: ProcessorKind,
    fid: FlowId,
    memory: BuiltMemory,
}

impl Processor for InertProcessor {
    fn kind(&self) -> ProcessorKind {
        self.kind
    }

    fn flow(&self) -> FlowId {
        self.fid
    }

    fn memory(&self) -> &dyn MemorySystem {
        self.memory.get()
    }
}
