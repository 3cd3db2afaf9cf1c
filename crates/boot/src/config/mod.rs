//! Configuration store for the boot loader.
//!
//! This module holds everything the orchestrator knows about the declarative
//! configuration. It provides:
//! 1. **Store:** `ConfStore`, a section/key/value view over a JSON document with typed accessors.
//! 2. **Error channel:** configuration errors are accumulated with `not_correct` and checked
//!    as a whole with `check`, so a single run reports every mistake.
//! 3. **Lock:** once `lock` succeeds the store rejects further mutation.
//! 4. **Arguments and capabilities:** `ConfArgs` (where to load from) and `Capabilities`
//!    (which optional component families this build supports).
//!
//! Top-level JSON objects become sections; every other top-level value belongs to the
//! root section `""`. A record is either an array (one entry per flow) or a scalar (a
//! record of size one).

/// Closed enums naming every implementation the resolvers can instantiate.
pub mod kinds;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::{error, info};

use crate::common::{BootError, ConfError};
use crate::report::ReportSink;

/// Built-in defaults.
mod defaults {
    /// File name of the memory architecture diagram written at the end of `plug`.
    pub const ARCH_DIAGRAM: &str = "memory-arch.dot";
}

/// Key/value pairs of one configuration section.
pub type Section = Map<String, Value>;

/// Where to load the configuration from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfArgs {
    /// Path of the JSON configuration document.
    pub path: PathBuf,
    /// `section:key=value` overrides applied after loading, in order.
    pub overrides: Vec<String>,
}

impl ConfArgs {
    /// Creates arguments for `path` with no overrides.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overrides: Vec::new(),
        }
    }

    /// Appends one `section:key=value` override.
    #[must_use]
    pub fn with_override(mut self, entry: impl Into<String>) -> Self {
        self.overrides.push(entry.into());
        self
    }
}

/// Optional component families and artifacts supported by this build.
///
/// Defaults follow the cargo features the crate was compiled with; tests and
/// embedders may override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Accelerator (GPU) emulation, samplers and SM processor models.
    pub accelerator: bool,
    /// Thermal reporting hooks in `unboot`/`unplug`.
    pub thermal: bool,
    /// Where to write the memory architecture diagram; `None` disables it.
    pub arch_diagram: Option<PathBuf>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            accelerator: cfg!(feature = "accel"),
            thermal: cfg!(feature = "thermal"),
            arch_diagram: Some(PathBuf::from(defaults::ARCH_DIAGRAM)),
        }
    }
}

/// Section-oriented configuration store with an accumulating error channel.
#[derive(Debug, Clone, Default)]
pub struct ConfStore {
    sections: BTreeMap<String, Section>,
    errors: Vec<ConfError>,
    locked: bool,
}

impl ConfStore {
    /// Name of the root section.
    pub const ROOT: &'static str = "";

    /// Loads the document named by `args` and applies its overrides.
    ///
    /// Malformed overrides are recorded as configuration errors rather than
    /// returned, so they surface at the first checkpoint with everything else.
    pub fn load(args: &ConfArgs) -> Result<Self, BootError> {
        let text = fs::read_to_string(&args.path).map_err(|source| BootError::ConfRead {
            path: args.path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| BootError::ConfParse {
            path: args.path.clone(),
            source,
        })?;

        let mut conf = Self::from_value(value)?;
        for entry in &args.overrides {
            if let Err(e) = conf.apply_override(entry) {
                conf.not_correct(e);
            }
        }
        info!(
            path = %args.path.display(),
            sections = conf.sections.len(),
            "configuration loaded"
        );
        Ok(conf)
    }

    /// Builds a store from an already parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, BootError> {
        let Value::Object(doc) = value else {
            return Err(BootError::ConfShape);
        };

        let mut sections: BTreeMap<String, Section> = BTreeMap::new();
        let mut root = Section::new();
        for (name, v) in doc {
            match v {
                Value::Object(section) if !name.is_empty() => {
                    let _ = sections.insert(name, section);
                }
                other => {
                    let _ = root.insert(name, other);
                }
            }
        }
        let _ = sections.insert(String::from(Self::ROOT), root);

        Ok(Self {
            sections,
            errors: Vec::new(),
            locked: false,
        })
    }

    /// Returns `true` if `section` exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Returns `true` if `section` defines `key`.
    pub fn check_key(&self, section: &str, key: &str) -> bool {
        self.sections
            .get(section)
            .is_some_and(|s| s.contains_key(key))
    }

    fn value(&self, section: &str, key: &str) -> Result<&Value, ConfError> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .ok_or_else(|| ConfError::MissingField {
                section: section.to_owned(),
                key: key.to_owned(),
            })
    }

    fn wrong_type(section: &str, key: &str, expected: &'static str) -> ConfError {
        ConfError::WrongType {
            section: section.to_owned(),
            key: key.to_owned(),
            expected,
        }
    }

    /// Reads a required string field.
    pub fn get_str(&self, section: &str, key: &str) -> Result<&str, ConfError> {
        match self.value(section, key)? {
            Value::String(s) => Ok(s),
            _ => Err(Self::wrong_type(section, key, "a string")),
        }
    }

    /// Reads a required boolean field.
    ///
    /// Integers are accepted (non-zero is true), as are the strings `true` and `false`.
    pub fn get_bool(&self, section: &str, key: &str) -> Result<bool, ConfError> {
        match self.value(section, key)? {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.as_i64() != Some(0)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(Self::wrong_type(section, key, "a boolean")),
        }
    }

    /// Reads an optional boolean field, falling back to `default` when absent.
    pub fn get_bool_or(&self, section: &str, key: &str, default: bool) -> Result<bool, ConfError> {
        if self.check_key(section, key) {
            self.get_bool(section, key)
        } else {
            Ok(default)
        }
    }

    /// Reads a required integer field.
    pub fn get_int(&self, section: &str, key: &str) -> Result<i64, ConfError> {
        match self.value(section, key)? {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| Self::wrong_type(section, key, "an integer")),
            _ => Err(Self::wrong_type(section, key, "an integer")),
        }
    }

    /// Returns `true` if the field is present and holds an integer.
    pub fn check_int(&self, section: &str, key: &str) -> bool {
        matches!(self.value(section, key), Ok(Value::Number(n)) if n.is_i64())
    }

    /// Reads a required floating point field.
    pub fn get_double(&self, section: &str, key: &str) -> Result<f64, ConfError> {
        match self.value(section, key)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| Self::wrong_type(section, key, "a number")),
            _ => Err(Self::wrong_type(section, key, "a number")),
        }
    }

    /// Number of entries in a record; zero when the key is absent.
    pub fn record_size(&self, section: &str, key: &str) -> usize {
        match self.value(section, key) {
            Ok(Value::Array(items)) => items.len(),
            Ok(_) => 1,
            Err(_) => 0,
        }
    }

    /// Reads entry `index` of a string record.
    pub fn record(&self, section: &str, key: &str, index: usize) -> Result<&str, ConfError> {
        let missing = || ConfError::MissingRecord {
            section: section.to_owned(),
            key: key.to_owned(),
            index,
        };
        let entry = match self.value(section, key)? {
            Value::Array(items) => items.get(index).ok_or_else(missing)?,
            scalar if index == 0 => scalar,
            _ => return Err(missing()),
        };
        entry
            .as_str()
            .ok_or_else(|| Self::wrong_type(section, key, "a record of section names"))
    }

    /// Sets a field, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: Value) -> Result<(), ConfError> {
        if self.locked {
            return Err(ConfError::Locked {
                section: section.to_owned(),
                key: key.to_owned(),
            });
        }
        let _ = self
            .sections
            .entry(section.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    /// Applies one `section:key=value` override.
    ///
    /// A missing `section:` prefix targets the root section. The value is parsed
    /// as JSON when possible and kept as a plain string otherwise.
    pub fn apply_override(&mut self, entry: &str) -> Result<(), ConfError> {
        let bad = || ConfError::BadOverride(entry.to_owned());
        let (path, raw) = entry.split_once('=').ok_or_else(bad)?;
        let (section, key) = path.split_once(':').unwrap_or((Self::ROOT, path));
        if key.is_empty() {
            return Err(bad());
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        self.set(section, key, value)
    }

    /// Records a configuration error. Resolution continues; callers check later.
    pub fn not_correct(&mut self, err: ConfError) {
        error!("ERROR: {err}");
        self.errors.push(err);
    }

    /// Returns `true` when no configuration error has been recorded.
    pub fn check(&self) -> bool {
        self.errors.is_empty()
    }

    /// All errors recorded so far, in recording order.
    pub fn errors(&self) -> &[ConfError] {
        &self.errors
    }

    /// Freezes the store. Fails when errors are pending.
    pub fn lock(&mut self) -> bool {
        if !self.check() {
            return false;
        }
        self.locked = true;
        true
    }

    /// Returns `true` once `lock` has succeeded.
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Writes every section to the report sink, root section first.
    pub fn dump(&self, sink: &mut dyn ReportSink) -> io::Result<()> {
        sink.field("#BEGIN_CONFIGURATION")?;
        for (name, section) in &self.sections {
            if !name.is_empty() {
                sink.field(&format!("[{name}]"))?;
            }
            for (key, value) in section {
                sink.field(&format!("{key}={}", render(value)))?;
            }
        }
        sink.field("#END_CONFIGURATION")
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}
