//! Lifecycle orchestrator.
//!
//! `BootLoader` sequences the run: `plug` → `boot` → `report` → `unboot` → `unplug`.
//! Each stage assumes the side effects of the one before it. Every method takes
//! `&self` so that the crash recovery handler, which holds an `Arc` to the same
//! instance, can produce a partial report and tear the system down from its own
//! thread while the main thread is still inside `boot`.
//!
//! The run's report file is opened in `plug` and stays open until the final
//! `report`. Partial reports are written to sibling files, so a dump request during
//! the run leaves the final report intact.
//!
//! Lock order, when more than one is held: report sink → configuration → scheduler
//! registry; report sink → power model; configuration → power model.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::common::{BootError, ConfError};
use crate::components::Components;
use crate::config::{Capabilities, ConfArgs, ConfStore};
use crate::power::{PowerModel, ThermalReport};
use crate::report::{ReportIdentity, ReportSink};
use crate::sched::Scheduler;
use crate::simu::topology::ArchDiagram;
use crate::stats::StatsRegistry;
use crate::{emul, simu};

/// Field written to the report (and the log) when a checkpoint fails.
pub const CONF_INCORRECT: &str = "**** ESESC CONFIGURATION INCORRECT ****";

/// `ctime(3)`-style timestamp layout used for begin and end times.
const CTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Label of reports written while the simulation may still be running.
pub const PARTIAL: &str = "partial";

/// Environment variable lookup.
type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of all orchestrator state for one simulator process.
pub struct BootLoader {
    components: Arc<dyn Components>,
    tasks: Arc<dyn Scheduler>,
    caps: Capabilities,
    env: Box<EnvLookup>,
    conf: RwLock<ConfStore>,
    report: Mutex<Box<dyn ReportSink>>,
    report_file: OnceLock<ReportIdentity>,
    start: Mutex<Option<DateTime<Local>>>,
    power: Mutex<Option<Box<dyn PowerModel>>>,
    do_power: AtomicBool,
    stopping: AtomicBool,
    thermal: Mutex<Option<Box<dyn ThermalReport>>>,
    stats: Mutex<StatsRegistry>,
}

impl fmt::Debug for BootLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootLoader")
            .field("components", &self.components)
            .field("tasks", &self.tasks)
            .field("caps", &self.caps)
            .field("report_file", &self.report_file.get())
            .field("do_power", &self.do_power.load(Ordering::Relaxed))
            .field("stopping", &self.stopping.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl BootLoader {
    /// Creates an orchestrator. Nothing is resolved until `plug`.
    ///
    /// Environment overrides are read from the process environment; see [`Self::with_env`].
    pub fn new(
        components: Arc<dyn Components>,
        tasks: Arc<dyn Scheduler>,
        sink: Box<dyn ReportSink>,
        caps: Capabilities,
    ) -> Self {
        let thermal = caps.thermal.then(|| components.new_thermal());
        Self {
            components,
            tasks,
            caps,
            env: Box::new(|key| std::env::var(key).ok()),
            conf: RwLock::new(ConfStore::default()),
            report: Mutex::new(sink),
            report_file: OnceLock::new(),
            start: Mutex::new(None),
            power: Mutex::new(None),
            do_power: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            thermal: Mutex::new(thermal),
            stats: Mutex::new(StatsRegistry::new()),
        }
    }

    /// Replaces the environment lookup used for `REPORTFILE`/`REPORTFILE2`.
    #[must_use]
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    fn read_conf(&self) -> RwLockReadGuard<'_, ConfStore> {
        self.conf.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_conf(&self) -> RwLockWriteGuard<'_, ConfStore> {
        self.conf.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read access to the configuration store.
    pub fn conf(&self) -> RwLockReadGuard<'_, ConfStore> {
        self.read_conf()
    }

    /// The scheduler collaborator.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.tasks
    }

    /// Capabilities this orchestrator resolves against.
    pub const fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Report identity, once `plug` has computed it.
    pub fn report_identity(&self) -> Option<&ReportIdentity> {
        self.report_file.get()
    }

    /// Path of the run's report file.
    pub fn report_path(&self) -> Option<PathBuf> {
        lock(&self.report).name_id().map(Path::to_path_buf)
    }

    /// Returns `true` when the configuration enabled the power model.
    pub fn is_power_enabled(&self) -> bool {
        self.do_power.load(Ordering::Acquire)
    }

    /// Returns `true` once crash recovery has taken over the shutdown.
    ///
    /// From then on the final report is refused and the caller should leave
    /// teardown to the recovery handler.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub(crate) fn begin_stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Global statistics registry.
    pub fn stats(&self) -> MutexGuard<'_, StatsRegistry> {
        lock(&self.stats)
    }

    /// Loads the configuration named by `args` and resolves the whole system.
    pub fn plug(&self, args: &ConfArgs) -> Result<(), BootError> {
        let conf = ConfStore::load(args)?;
        self.plug_with(conf)
    }

    /// Resolves the whole system from an already loaded configuration.
    ///
    /// On a failed checkpoint the report file opened here is deleted and
    /// [`BootError::ConfigIncorrect`] is returned; callers are expected to exit.
    pub fn plug_with(&self, conf: ConfStore) -> Result<(), BootError> {
        *self.write_conf() = conf;
        *lock(&self.power) = Some(self.components.new_power_model());

        self.tasks.plug_begin();
        simu::plug_simu_interfaces(
            &mut self.write_conf(),
            &self.caps,
            self.components.as_ref(),
            self.tasks.as_ref(),
        );
        self.check()?;

        let identity = ReportIdentity::resolve_with(&self.read_conf(), |key| (self.env)(key));
        let identity = identity.map_err(|e| self.reject(e))?;
        {
            let mut sink = lock(&self.report);
            sink.open(identity.as_str())?;
            if let Some(path) = sink.name_id() {
                info!(report = %path.display(), "report file opened");
            }
        }
        if self.report_file.set(identity).is_err() {
            warn!("report identity already fixed by an earlier plug; keeping it");
        }

        // Read only so that it shows up in the configuration dump.
        let frequency = self.read_conf().get_double("technology", "frequency");
        match frequency {
            Ok(frequency) => debug!(frequency, "technology frequency"),
            Err(e) => self.write_conf().not_correct(e),
        }
        self.check()?;

        emul::plug_emul_interfaces(
            &mut self.write_conf(),
            &self.caps,
            self.components.as_ref(),
            self.tasks.as_ref(),
        );
        self.check()?;

        let power_section = power_section(&self.read_conf());
        match power_section {
            Ok(Some(section)) => {
                self.do_power.store(true, Ordering::Release);
                {
                    let mut conf = self.write_conf();
                    if let Some(power) = lock(&self.power).as_mut() {
                        power.plug(&section, &mut conf);
                    }
                }
                self.check()?;
            }
            Ok(None) => info!("Power calculations disabled"),
            Err(e) => self.write_conf().not_correct(e),
        }

        self.check()?;
        self.tasks.plug_end();

        {
            let mut stats = lock(&self.stats);
            stats.set("BootLoader:emulFlows", self.tasks.emul_mapping().len() as u64);
            stats.set(
                "BootLoader:simuFlows",
                self.tasks.memory_topologies().len() as u64,
            );
        }
        self.draw_arch();
        Ok(())
    }

    /// Validation checkpoint.
    ///
    /// Passes when the configuration store has recorded no error. Otherwise the
    /// report file is marked, deleted, and [`BootError::ConfigIncorrect`] is returned.
    pub fn check(&self) -> Result<(), BootError> {
        if self.read_conf().check() {
            return Ok(());
        }
        Err(self.abort_plug())
    }

    fn reject(&self, err: ConfError) -> BootError {
        self.write_conf().not_correct(err);
        self.abort_plug()
    }

    fn abort_plug(&self) -> BootError {
        let errors = self.read_conf().errors().to_vec();
        let mut sink = lock(&self.report);
        let report = sink.name_id().map(Path::to_path_buf);
        match &report {
            Some(path) => {
                if let Err(e) = sink.field(CONF_INCORRECT) {
                    debug!("cannot mark report: {e}");
                }
                error!("{CONF_INCORRECT} Deleting report file {}", path.display());
                if let Err(e) = sink.remove() {
                    warn!("cannot delete report file {}: {e}", path.display());
                }
            }
            None => error!("{CONF_INCORRECT}"),
        }
        BootError::ConfigIncorrect { report, errors }
    }

    fn draw_arch(&self) {
        let Some(path) = &self.caps.arch_diagram else {
            return;
        };
        let diagram: ArchDiagram = self.tasks.memory_topologies().iter().collect();
        match diagram.write_dot(path) {
            Ok(()) => info!(
                path = %path.display(),
                edges = diagram.edge_count(),
                "memory architecture diagram written"
            ),
            Err(e) => warn!("cannot write {}: {e}", path.display()),
        }
    }

    /// Locks the configuration, dumps it to the report and runs the simulation.
    ///
    /// Returns when every flow has finished or `unboot` stopped them.
    pub fn boot(&self) -> Result<(), BootError> {
        if self.report_file.get().is_none() {
            return Err(BootError::NotPlugged { stage: "boot" });
        }
        *lock(&self.start) = Some(Local::now());

        if !self.write_conf().lock() {
            error!("configuration could not be locked");
            return Err(BootError::LockFailed);
        }
        {
            let mut sink = lock(&self.report);
            self.read_conf().dump(&mut **sink)?;
        }

        self.tasks.boot();
        Ok(())
    }

    /// Stops thermal reporting and the simulated flows.
    pub fn unboot(&self) {
        info!("BootLoader::unboot called... Finishing the work");
        if let Some(thermal) = lock(&self.thermal).as_mut() {
            thermal.stop_cb();
        }
        self.tasks.unboot();
    }

    /// Releases every backend and unplugs the power model if it was enabled.
    pub fn unplug(&self) {
        if let Some(thermal) = lock(&self.thermal).as_mut() {
            thermal.stop_cb();
            thermal.close();
        }
        self.tasks.unplug();
        if self.is_power_enabled() {
            if let Some(power) = lock(&self.power).as_mut() {
                power.unplug();
            }
        }
    }

    /// Writes the final, labelled summary to the run's report and closes it.
    ///
    /// Refused with [`BootError::Stopping`] once recovery has taken over.
    pub fn report(&self, label: &str) -> Result<(), BootError> {
        if self.is_stopping() {
            return Err(BootError::Stopping);
        }
        let mut sink = lock(&self.report);
        self.write_report(label, &mut **sink)
    }

    fn write_report(&self, label: &str, sink: &mut dyn ReportSink) -> Result<(), BootError> {
        let end = Local::now();
        let begin = (*lock(&self.start)).unwrap_or(end);

        sink.field(&format!("OSSim:reportName={label}"))?;
        sink.field(&format!("OSSim:beginTime={}", begin.format(CTIME)))?;
        sink.field(&format!("OSSim:endTime={}", end.format(CTIME)))?;

        self.tasks.report(label, sink)?;

        let msecs = (end - begin).num_milliseconds() as f64;
        sink.field(&format!("OSSim:msecs={msecs:8.2}"))?;

        lock(&self.stats).report(label, sink)?;
        sink.close()?;
        Ok(())
    }

    /// Writes one partial report to a sibling of the run's report.
    ///
    /// Partial reports are serialized on the run's sink lock. `before_report` runs
    /// after the configuration dump, with that lock held.
    fn write_partial(
        &self,
        file: Option<&str>,
        before_report: impl FnOnce(),
    ) -> Result<(), BootError> {
        let name = match (file, self.report_file.get()) {
            (Some(file), _) => file.to_owned(),
            (None, Some(identity)) => identity.as_str().to_owned(),
            (None, None) => {
                warn!("no report identity yet; partial report skipped");
                return Ok(());
            }
        };
        let run = lock(&self.report);
        let mut sink = run.sibling();
        sink.open(&name)?;
        self.read_conf().dump(&mut *sink)?;
        before_report();
        self.write_report(PARTIAL, &mut *sink)?;
        drop(run);
        if let Some(path) = sink.name_id() {
            debug!(report = %path.display(), "partial report written");
        }
        Ok(())
    }

    /// Writes a partial report without stopping the simulation.
    ///
    /// The report goes to `file` when given, otherwise to a fresh file under the
    /// report identity. The run's own report file is left untouched.
    pub fn report_on_the_fly(&self, file: Option<&str>) -> Result<(), BootError> {
        self.write_partial(file, || {})
    }

    /// Writes a partial report and starts the power model's periodic dump.
    pub fn start_report_on_the_fly(&self) -> Result<(), BootError> {
        self.write_partial(None, || {
            if let Some(power) = lock(&self.power).as_mut() {
                power.start_dump();
            }
        })
    }

    /// Stops the power model's periodic dump.
    pub fn stop_report_on_the_fly(&self) {
        if let Some(power) = lock(&self.power).as_mut() {
            power.stop_dump();
        }
    }
}

/// Power model section, when the configuration names one with `doPower` set.
fn power_section(conf: &ConfStore) -> Result<Option<String>, ConfError> {
    if !conf.check_key(ConfStore::ROOT, "pwrmodel") {
        return Ok(None);
    }
    let section = conf.record(ConfStore::ROOT, "pwrmodel", 0)?;
    let enabled = conf.get_bool_or(section, "doPower", false)?;
    Ok(enabled.then(|| section.to_owned()))
}
