//! Component factory.
//!
//! The resolvers decide *which* implementation a flow gets; a [`Components`]
//! implementation decides *how* each one is constructed. Concrete timing models,
//! emulators and samplers plug in here.

/// Inert implementations of every component family.
pub mod inert;

use std::fmt;

pub use self::inert::InertComponents;
use crate::common::FlowId;
use crate::config::kinds::{EmulKind, MemoryKind, ProcessorKind, SamplerKind};
use crate::emul::EmulInterface;
use crate::emul::sampler::{Sampler, SamplerBinding};
use crate::power::{PowerModel, ThermalReport};
use crate::simu::{BuiltMemory, MemorySystem, Processor};

/// Constructors for every component the boot loader instantiates.
pub trait Components: Send + Sync + fmt::Debug {
    /// Creates an emulation backend from `section`.
    fn new_emul(&self, kind: EmulKind, section: &str) -> Box<dyn EmulInterface>;
    /// Creates a sampler from `section` bound to `binding`.
    fn new_sampler(
        &self,
        kind: SamplerKind,
        section: &str,
        binding: &SamplerBinding,
    ) -> Box<dyn Sampler>;
    /// Creates an unbuilt memory system for flow `fid`.
    fn new_memory(&self, kind: MemoryKind, fid: FlowId) -> Box<dyn MemorySystem>;
    /// Creates the processor of flow `fid` on top of a built memory system.
    fn new_processor(
        &self,
        kind: ProcessorKind,
        memory: BuiltMemory,
        fid: FlowId,
    ) -> Box<dyn Processor>;
    /// Creates the power model.
    fn new_power_model(&self) -> Box<dyn PowerModel>;
    /// Creates the thermal report.
    fn new_thermal(&self) -> Box<dyn ThermalReport>;
}
