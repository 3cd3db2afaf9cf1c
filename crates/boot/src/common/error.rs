//! Configuration and boot error definitions.
//!
//! This module defines the two error families of the boot loader. It provides:
//! 1. **`ConfError`:** A single configuration problem. These are accumulated by the
//!    configuration store so that one run surfaces every mistake at once.
//! 2. **`BootError`:** A fatal failure of a lifecycle stage (failed checkpoint,
//!    configuration lock failure, I/O on the report or configuration files).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::flow::FlowId;
use crate::config::kinds::EmulKind;

/// Component family named in an "unknown type" diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Emulation backend (`cpuemul` entries).
    Emulator,
    /// Sampling strategy (`sampler` sections).
    Sampler,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emulator => write!(f, "cpuemul"),
            Self::Sampler => write!(f, "sampler"),
        }
    }
}

/// A single configuration problem recorded through the store's error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfError {
    /// A required field is absent.
    #[error("field '{key}' should be defined in section [{section}]")]
    MissingField {
        /// Section that was searched.
        section: String,
        /// Missing key.
        key: String,
    },

    /// A section referenced by another field does not exist.
    #[error("section [{section}] referenced by [{from}] {key} does not exist")]
    MissingSection {
        /// The absent section.
        section: String,
        /// Section holding the reference.
        from: String,
        /// Key holding the reference.
        key: String,
    },

    /// A field exists but holds a value of the wrong JSON type.
    #[error("field '{key}' in section [{section}] should be {expected}")]
    WrongType {
        /// Section holding the field.
        section: String,
        /// Offending key.
        key: String,
        /// Human readable expected type.
        expected: &'static str,
    },

    /// A record lookup went past the end of the record.
    #[error("record '{key}' in section [{section}] has no entry {index}")]
    MissingRecord {
        /// Section holding the record.
        section: String,
        /// Record key.
        key: String,
        /// Requested entry.
        index: usize,
    },

    /// A type string does not name any known (or enabled) implementation.
    #[error("unknown {component} type '{value}' in section [{section}]")]
    UnknownType {
        /// Which component family was being resolved.
        component: Component,
        /// Section holding the `type` field.
        section: String,
        /// The unrecognised value.
        value: String,
    },

    /// A second declaration of a single-instance backend names another section.
    #[error(
        "only a single {kind} instance is supported: cpuemul[{flow}] specifies section [{found}] but [{expected}] is already in use"
    )]
    SectionConflict {
        /// Backend kind whose section is exclusive.
        kind: EmulKind,
        /// Flow whose entry conflicts.
        flow: FlowId,
        /// Section fixed by the first declaration.
        expected: String,
        /// Section of the conflicting declaration.
        found: String,
    },

    /// A numeric parameter is out of range.
    #[error("invalid value {value} for '{key}' in section [{section}]")]
    InvalidValue {
        /// Section holding the field.
        section: String,
        /// Offending key.
        key: String,
        /// Rendered value.
        value: String,
    },

    /// A mutation was attempted after the store was locked.
    #[error("configuration is locked; cannot set [{section}] {key}")]
    Locked {
        /// Section of the attempted write.
        section: String,
        /// Key of the attempted write.
        key: String,
    },

    /// A command line override is not of the form `section:key=value`.
    #[error("malformed override '{0}', expected section:key=value")]
    BadOverride(String),
}

/// Fatal failure of a lifecycle stage.
#[derive(Debug, Error)]
pub enum BootError {
    /// The configuration file could not be read.
    #[error("cannot read configuration '{path}': {source}")]
    ConfRead {
        /// Configuration path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("cannot parse configuration '{path}': {source}")]
    ConfParse {
        /// Configuration path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration document is valid JSON but not an object.
    #[error("configuration root must be an object of sections")]
    ConfShape,

    /// A validation checkpoint found configuration errors.
    ///
    /// The report file opened during `plug` has already been removed.
    #[error("**** ESESC CONFIGURATION INCORRECT **** ({} error(s))", errors.len())]
    ConfigIncorrect {
        /// Report file that was deleted, if one had been opened.
        report: Option<PathBuf>,
        /// Every error accumulated up to the failing checkpoint.
        errors: Vec<ConfError>,
    },

    /// The configuration store refused to lock at boot time.
    #[error("configuration could not be locked")]
    LockFailed,

    /// A stage was called before the stage it depends on.
    #[error("{stage} called before plug")]
    NotPlugged {
        /// Name of the offending stage.
        stage: &'static str,
    },

    /// Crash recovery has taken over; the run ends with its partial report.
    #[error("simulation stopped by a signal; recovery owns the shutdown")]
    Stopping,

    /// Report sink or diagram I/O failure.
    #[error("report I/O: {0}")]
    Io(#[from] io::Error),
}
