//! Common types shared by every stage of the boot loader.
//!
//! This module provides the small vocabulary the resolvers and the orchestrator agree on:
//! 1. **Flow identity:** `FlowId`, the dense zero-based index of one execution stream.
//! 2. **Error Handling:** configuration errors (accumulated) and boot errors (fatal).

/// Error types for configuration resolution and lifecycle stages.
pub mod error;

/// Flow identifier type.
pub mod flow;

pub use error::{BootError, ConfError};
pub use flow::FlowId;
