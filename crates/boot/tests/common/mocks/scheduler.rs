use std::fmt;
use std::io;
use std::sync::Mutex;

use esesc_boot::FlowId;
use esesc_boot::TaskHandler;
use esesc_boot::config::kinds::EmulSlot;
use esesc_boot::emul::EmulInterface;
use esesc_boot::report::ReportSink;
use esesc_boot::sched::Scheduler;
use esesc_boot::simu::Processor;
use esesc_boot::simu::topology::Topology;

use super::{Event, EventLog};

type Hook = Box<dyn FnMut() + Send>;

/// `TaskHandler` wrapper that logs every call.
///
/// An optional hook runs inside `unboot`, which lets a test deliver a second
/// signal while the first one is still being handled.
pub struct RecordingScheduler {
    inner: TaskHandler,
    log: EventLog,
    unboot_hook: Mutex<Option<Hook>>,
}

impl fmt::Debug for RecordingScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingScheduler")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl RecordingScheduler {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: TaskHandler::new(),
            log,
            unboot_hook: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &TaskHandler {
        &self.inner
    }

    pub fn on_unboot(&self, hook: impl FnMut() + Send + 'static) {
        *self.unboot_hook.lock().unwrap() = Some(Box::new(hook));
    }
}

impl Scheduler for RecordingScheduler {
    fn plug_begin(&self) {
        self.log.push(Event::PlugBegin);
        self.inner.plug_begin();
    }

    fn plug_end(&self) {
        self.log.push(Event::PlugEnd);
        self.inner.plug_end();
    }

    fn add_emul(&self, fid: FlowId, emul: Box<dyn EmulInterface>) {
        self.log.push(Event::AddEmul(fid));
        self.inner.add_emul(fid, emul);
    }

    fn add_emul_shared(&self, emul: Box<dyn EmulInterface>, owner: FlowId) {
        self.log.push(Event::AddShared(owner));
        self.inner.add_emul_shared(emul, owner);
    }

    fn push_emul_mapping(&self, slot: EmulSlot) {
        self.log.push(Event::Mapping(slot));
        self.inner.push_emul_mapping(slot);
    }

    fn emul_mapping(&self) -> Vec<EmulSlot> {
        self.inner.emul_mapping()
    }

    fn add_simu(&self, fid: FlowId, simu: Box<dyn Processor>) {
        self.log.push(Event::AddSimu(fid));
        self.inner.add_simu(fid, simu);
    }

    fn memory_topologies(&self) -> Vec<Topology> {
        self.inner.memory_topologies()
    }

    fn boot(&self) {
        self.log.push(Event::Boot);
        self.inner.boot();
    }

    fn unboot(&self) {
        self.log.push(Event::Unboot);
        self.inner.unboot();
        if let Some(hook) = self.unboot_hook.lock().unwrap().as_mut() {
            hook();
        }
    }

    fn unplug(&self) {
        self.log.push(Event::Unplug);
        self.inner.unplug();
    }

    fn try_unplug(&self) -> bool {
        self.log.push(Event::TryUnplug);
        self.inner.try_unplug()
    }

    fn report(&self, label: &str, sink: &mut dyn ReportSink) -> io::Result<()> {
        self.inner.report(label, sink)
    }
}
