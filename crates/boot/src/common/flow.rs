//! Flow identifiers.
//!
//! A flow is one simulated or emulated execution stream (a CPU core or an
//! accelerator lane). Flows are numbered densely from zero in the order their
//! entries appear in the configuration records.

use std::fmt;

/// Dense, zero-based identifier of one execution stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FlowId(pub u32);

impl FlowId {
    /// Returns the flow number as a vector index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for FlowId {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
