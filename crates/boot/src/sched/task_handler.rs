//! Round-robin flow scheduler.
//!
//! `TaskHandler` keeps the flow registry filled during `plug` and, once booted,
//! gives each unfinished emulation flow one slice per round until every flow
//! reports completion or `unboot` clears the running flag.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;

use tracing::{debug, info, warn};

use super::Scheduler;
use crate::common::FlowId;
use crate::config::kinds::EmulSlot;
use crate::emul::EmulInterface;
use crate::report::ReportSink;
use crate::simu::Processor;
use crate::simu::topology::Topology;

#[derive(Debug, Default)]
struct Registry {
    emuls: BTreeMap<FlowId, Box<dyn EmulInterface>>,
    shared: Option<(FlowId, Box<dyn EmulInterface>)>,
    mapping: Vec<EmulSlot>,
    simus: BTreeMap<FlowId, Box<dyn Processor>>,
    slices: BTreeMap<FlowId, u64>,
    finished: BTreeSet<FlowId>,
}

impl Registry {
    /// Gives every unfinished flow one slice. Returns `true` while any flow is left.
    fn run_round(&mut self, running: &AtomicBool) -> bool {
        let Self {
            emuls,
            shared,
            mapping,
            slices,
            finished,
            ..
        } = self;

        for (i, slot) in mapping.iter().enumerate() {
            if !running.load(Ordering::Acquire) {
                break;
            }
            let fid = FlowId::from(i);
            if finished.contains(&fid) {
                continue;
            }
            let emul = match slot {
                EmulSlot::Cpu => emuls.get_mut(&fid),
                EmulSlot::Accel => shared.as_mut().map(|(_, emul)| emul),
            };
            let alive = emul.is_some_and(|emul| emul.execute(fid));
            *slices.entry(fid).or_insert(0) += 1;
            if !alive {
                debug!(flow = %fid, "flow finished");
                let _ = finished.insert(fid);
            }
        }
        finished.len() < mapping.len()
    }

    fn release(&mut self) {
        self.emuls.clear();
        self.shared = None;
        self.simus.clear();
    }

    fn backend(&self, fid: FlowId) -> Option<&dyn EmulInterface> {
        match self.mapping.get(fid.index())? {
            EmulSlot::Cpu => self.emuls.get(&fid).map(Box::as_ref),
            EmulSlot::Accel => self.shared.as_ref().map(|(_, emul)| &**emul),
        }
    }
}

/// Default [`Scheduler`]: flow registry plus a single-threaded round-robin runner.
#[derive(Debug, Default)]
pub struct TaskHandler {
    registry: Mutex<Registry>,
    plugging: AtomicBool,
    booted: AtomicBool,
    running: AtomicBool,
}

impl TaskHandler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` between `plug_begin` and `plug_end`.
    pub fn is_plugging(&self) -> bool {
        self.plugging.load(Ordering::Acquire)
    }

    /// Returns `true` while `boot` is running flows.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of registered exclusive backends.
    pub fn emul_count(&self) -> usize {
        self.registry().emuls.len()
    }

    /// Owner flow of the shared accelerator backend, if one is registered.
    pub fn shared_owner(&self) -> Option<FlowId> {
        self.registry().shared.as_ref().map(|(owner, _)| *owner)
    }

    /// Number of registered simulation backends.
    pub fn simu_count(&self) -> usize {
        self.registry().simus.len()
    }
}

impl Scheduler for TaskHandler {
    fn plug_begin(&self) {
        self.plugging.store(true, Ordering::Release);
    }

    fn plug_end(&self) {
        self.plugging.store(false, Ordering::Release);
        let reg = self.registry();
        info!(
            emul_flows = reg.mapping.len(),
            simu_flows = reg.simus.len(),
            "flow registry complete"
        );
    }

    fn add_emul(&self, fid: FlowId, emul: Box<dyn EmulInterface>) {
        if self.registry().emuls.insert(fid, emul).is_some() {
            warn!(flow = %fid, "emulation backend replaced");
        }
    }

    fn add_emul_shared(&self, emul: Box<dyn EmulInterface>, owner: FlowId) {
        self.registry().shared = Some((owner, emul));
    }

    fn push_emul_mapping(&self, slot: EmulSlot) {
        if self.booted.load(Ordering::Acquire) {
            warn!("flow mapping is read-only after boot; slot {} ignored", slot.index());
            return;
        }
        self.registry().mapping.push(slot);
    }

    fn emul_mapping(&self) -> Vec<EmulSlot> {
        self.registry().mapping.clone()
    }

    fn add_simu(&self, fid: FlowId, simu: Box<dyn Processor>) {
        if self.registry().simus.insert(fid, simu).is_some() {
            warn!(flow = %fid, "simulation backend replaced");
        }
    }

    fn memory_topologies(&self) -> Vec<Topology> {
        self.registry()
            .simus
            .values()
            .map(|simu| simu.memory().topology().clone())
            .collect()
    }

    fn boot(&self) {
        self.booted.store(true, Ordering::Release);
        self.running.store(true, Ordering::Release);
        info!("running {} emulation flows", self.registry().mapping.len());

        while self.running.load(Ordering::Acquire) {
            if !self.registry().run_round(&self.running) {
                break;
            }
            // Lets reports and unplug reach the registry between rounds.
            thread::yield_now();
        }
        self.running.store(false, Ordering::Release);
    }

    fn unboot(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn unplug(&self) {
        self.running.store(false, Ordering::Release);
        self.registry().release();
    }

    fn try_unplug(&self) -> bool {
        self.running.store(false, Ordering::Release);
        let mut reg = match self.registry.try_lock() {
            Ok(reg) => reg,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("flow registry busy; backends left in place");
                return false;
            }
        };
        reg.release();
        true
    }

    fn report(&self, _label: &str, sink: &mut dyn ReportSink) -> io::Result<()> {
        let reg = self.registry();
        let flows: BTreeSet<FlowId> = (0..reg.mapping.len())
            .map(FlowId::from)
            .chain(reg.simus.keys().copied())
            .collect();

        for fid in flows {
            if let Some(emul) = reg.backend(fid) {
                sink.field(&format!("P({fid}):emul={}", emul.kind()))?;
                if let Some(sampler) = emul.sampler(fid) {
                    sink.field(&format!("P({fid}):sampler={}", sampler.kind().label()))?;
                }
            }
            if let Some(simu) = reg.simus.get(&fid) {
                sink.field(&format!("P({fid}):proc={}", simu.kind().label()))?;
                sink.field(&format!("P({fid}):memory={:?}", simu.memory().kind()))?;
            }
            let slices = reg.slices.get(&fid).copied().unwrap_or(0);
            sink.field(&format!("P({fid}):slices={slices}"))?;
        }
        Ok(())
    }
}
