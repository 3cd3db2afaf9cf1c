/// Lifecycle orchestrator (plug, boot, report, unboot, unplug).
pub mod boot_loader;

/// Signal-driven crash recovery.
pub mod recovery;

pub use self::boot_loader::BootLoader;
pub use self::recovery::Recovery;
