//! Component kinds resolved from configuration strings.
//!
//! Every polymorphic choice the boot loader makes is a closed enum here. String
//! values from the configuration are mapped once, through an explicit table, and an
//! unmatched (or disabled) value becomes a `ConfError::UnknownType` rather than a
//! string comparison at every call site.

use std::fmt;

use crate::common::ConfError;
use crate::common::error::Component;
use crate::config::Capabilities;

/// Case-insensitive lookup in a `(name, kind)` table.
fn lookup<T: Copy>(table: &[(&str, T)], value: &str) -> Option<T> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|&(_, kind)| kind)
}

/// Emulation backend kinds (`type` field of a `cpuemul` section).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmulKind {
    /// Full-system CPU emulation. Exclusive in section, instantiated per flow.
    Qemu,
    /// Accelerator (GPU) emulation. One instance shared by every accelerator flow.
    Gpu,
}

impl EmulKind {
    const TABLE: [(&'static str, Self); 2] = [("QEMU", Self::Qemu), ("GPU", Self::Gpu)];

    /// Resolves a configured `type` string.
    ///
    /// Accelerator kinds are only recognised when `caps.accelerator` is set.
    pub fn from_conf(section: &str, value: &str, caps: &Capabilities) -> Result<Self, ConfError> {
        lookup(&Self::TABLE, value)
            .filter(|kind| caps.accelerator || !kind.is_accelerator())
            .ok_or_else(|| ConfError::UnknownType {
                component: Component::Emulator,
                section: section.to_owned(),
                value: value.to_owned(),
            })
    }

    /// Returns `true` for kinds that need accelerator support.
    pub const fn is_accelerator(self) -> bool {
        matches!(self, Self::Gpu)
    }

    /// Backend slot recorded in the flow-to-emulator mapping.
    pub const fn slot(self) -> EmulSlot {
        match self {
            Self::Qemu => EmulSlot::Cpu,
            Self::Gpu => EmulSlot::Accel,
        }
    }
}

impl fmt::Display for EmulKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qemu => write!(f, "QEMU"),
            Self::Gpu => write!(f, "GPU"),
        }
    }
}

/// Index of the emulation backend serving a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EmulSlot {
    /// Interface 0: the full-system CPU emulator.
    Cpu = 0,
    /// Interface 1: the shared accelerator emulator.
    Accel = 1,
}

impl EmulSlot {
    /// Numeric slot index.
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Sampling strategies (`type` field of a sampler section).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Instruction-count based sampling with phase-transition profiling.
    Inst,
    /// Fixed time-period sampling.
    Time,
    /// Spatial sampling across accelerator lanes.
    GpuSpacial,
}

impl SamplerKind {
    const TABLE: [(&'static str, Self); 3] = [
        ("inst", Self::Inst),
        ("time", Self::Time),
        ("GPUSpacial", Self::GpuSpacial),
    ];

    /// Resolves a configured sampler `type` string.
    pub fn from_conf(section: &str, value: &str, caps: &Capabilities) -> Result<Self, ConfError> {
        lookup(&Self::TABLE, value)
            .filter(|kind| caps.accelerator || !kind.is_accelerator())
            .ok_or_else(|| ConfError::UnknownType {
                component: Component::Sampler,
                section: section.to_owned(),
                value: value.to_owned(),
            })
    }

    /// Returns `true` for kinds that need accelerator support.
    pub const fn is_accelerator(self) -> bool {
        matches!(self, Self::GpuSpacial)
    }

    /// Short name used in statistics and reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inst => "TASS",
            Self::Time => "TBS",
            Self::GpuSpacial => "GPUSpacial",
        }
    }
}

/// Memory system variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Full cache hierarchy described by the configuration.
    Real,
    /// No-op memory system for flows declaring `noMemory`.
    Dummy,
}

/// Processor timing models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    /// In-order core.
    InOrder,
    /// Out-of-order core.
    OutOfOrder,
    /// Accelerator streaming multiprocessor.
    GpuSm,
}

impl ProcessorKind {
    /// Short name used in statistics and reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::InOrder => "InOrder",
            Self::OutOfOrder => "OoO",
            Self::GpuSm => "GPUSM",
        }
    }
}
