//! Report sink and report-file identity.
//!
//! This module owns the statistics report artifact. It provides:
//! 1. **`ReportSink`:** the field-oriented append interface every report goes through.
//! 2. **`FileReport`:** the file-backed sink; a trailing `XXXXXX` in the requested name is
//!    replaced with a unique suffix each time a file is opened.
//! 3. **`ReportIdentity`:** the base name `esesc_<name>[_<name2>].XXXXXX`, computed once
//!    from `REPORTFILE`/`REPORTFILE2` or the configured `reportFile`.

use std::env;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::common::ConfError;
use crate::config::ConfStore;

/// Field-oriented report writer.
///
/// A sink holds at most one open file. `open` closes whatever was open before.
pub trait ReportSink: Send + fmt::Debug {
    /// Opens (creating) the report named `name`.
    fn open(&mut self, name: &str) -> io::Result<()>;
    /// Appends one `key=value` line. Writing with no open file is an error.
    fn field(&mut self, line: &str) -> io::Result<()>;
    /// Flushes and closes the open file, if any.
    fn close(&mut self) -> io::Result<()>;
    /// Path of the most recently opened file.
    fn name_id(&self) -> Option<&Path>;
    /// Closes and deletes the most recently opened file.
    fn remove(&mut self) -> io::Result<()>;
    /// A new, closed sink writing to the same place as this one.
    ///
    /// Partial reports go through a sibling so the run's own report stays open.
    fn sibling(&self) -> Box<dyn ReportSink>;
}

/// Placeholder replaced by a unique suffix when a report file is created.
pub const PLACEHOLDER: &str = "XXXXXX";

/// Report sink writing plain text files into a directory.
#[derive(Debug)]
pub struct FileReport {
    dir: PathBuf,
    out: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl FileReport {
    /// Creates a sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            out: None,
            path: None,
        }
    }

    /// Returns `true` while a file is open.
    pub const fn is_open(&self) -> bool {
        self.out.is_some()
    }
}

impl ReportSink for FileReport {
    fn open(&mut self, name: &str) -> io::Result<()> {
        self.close()?;

        let (file, path) = match name.strip_suffix(PLACEHOLDER) {
            Some(prefix) => tempfile::Builder::new()
                .prefix(prefix)
                .rand_bytes(PLACEHOLDER.len())
                .tempfile_in(&self.dir)?
                .keep()?,
            None => {
                let path = self.dir.join(name);
                (File::create(&path)?, path)
            }
        };
        debug!(path = %path.display(), "report opened");

        self.out = Some(BufWriter::new(file));
        self.path = Some(path);
        Ok(())
    }

    fn field(&mut self, line: &str) -> io::Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no report file open"))?;
        writeln!(out, "{line}")
    }

    fn close(&mut self) -> io::Result<()> {
        match self.out.take() {
            Some(mut out) => out.flush(),
            None => Ok(()),
        }
    }

    fn name_id(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn remove(&mut self) -> io::Result<()> {
        drop(self.out.take());
        match self.path.as_deref() {
            Some(path) => match fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn sibling(&self) -> Box<dyn ReportSink> {
        Box::new(Self::new(self.dir.clone()))
    }
}

/// Environment variable overriding the report base name.
pub const REPORTFILE: &str = "REPORTFILE";
/// Environment variable appended to the report base name.
pub const REPORTFILE2: &str = "REPORTFILE2";

/// Report file base name, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportIdentity(String);

impl ReportIdentity {
    /// Composes `esesc_<name>[_<name2>].XXXXXX`.
    pub fn compose(name: &str, name2: Option<&str>) -> Self {
        match name2 {
            Some(name2) => Self(format!("esesc_{name}_{name2}.{PLACEHOLDER}")),
            None => Self(format!("esesc_{name}.{PLACEHOLDER}")),
        }
    }

    /// Resolves the identity from the process environment and `conf`.
    pub fn resolve(conf: &ConfStore) -> Result<Self, ConfError> {
        Self::resolve_with(conf, |key| env::var(key).ok())
    }

    /// Resolves the identity using `env` for variable lookup.
    ///
    /// `REPORTFILE` replaces the configured root `reportFile` field; `REPORTFILE2`, when
    /// set, is appended to whichever base name was chosen.
    pub fn resolve_with<F>(conf: &ConfStore, env: F) -> Result<Self, ConfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = match env(REPORTFILE) {
            Some(name) => name,
            None => conf.record(ConfStore::ROOT, "reportFile", 0)?.to_owned(),
        };
        Ok(Self::compose(&name, env(REPORTFILE2).as_deref()))
    }

    /// The file name template, including the placeholder.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
