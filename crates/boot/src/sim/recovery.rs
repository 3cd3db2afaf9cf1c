//! Crash recovery.
//!
//! Turns an asynchronous stop request into a partial report followed by an orderly
//! shutdown. The state machine lives in [`Recovery::on_signal`], which decides what
//! to do and returns a [`Disposition`]; [`apply`] carries the disposition out.
//! [`install`] wires both to the process signals on a listener thread.
//!
//! States:
//! - `Normal`: a dump request writes a partial report and the simulation continues.
//!   Any other signal moves to `Faulting`, marks the boot loader as stopping (the
//!   final report is refused from then on), writes one partial report, unboots and
//!   unplugs, then aborts.
//! - `Faulting`: every signal (dump requests included) releases the backends, kills
//!   the whole process group and aborts. No second report is written.

use std::io;
use std::process;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};

use super::BootLoader;

/// Signals that request a partial report.
pub const DUMP_SIGNALS: [i32; 1] = [SIGUSR1];

/// Signals that stop the simulation.
pub const TERM_SIGNALS: [i32; 4] = [SIGINT, SIGTERM, SIGHUP, SIGQUIT];

/// Recovery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultState {
    /// No fault in progress.
    Normal = 0,
    /// A fault is being handled.
    Faulting = 1,
}

impl FaultState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Normal,
            _ => Self::Faulting,
        }
    }
}

/// What a signal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Partial report, keep running.
    Dump,
    /// Stop the simulation.
    Terminate,
}

impl SignalKind {
    /// Classifies a signal number; `None` for signals recovery does not handle.
    pub fn classify(signo: i32) -> Option<Self> {
        if DUMP_SIGNALS.contains(&signo) {
            Some(Self::Dump)
        } else if TERM_SIGNALS.contains(&signo) {
            Some(Self::Terminate)
        } else {
            None
        }
    }
}

/// Action left to take once a signal has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep simulating.
    Continue,
    /// Abort the process.
    Abort,
    /// Kill the process group, then abort.
    KillGroup,
}

/// Signal-driven recovery bound to one boot loader.
#[derive(Debug)]
pub struct Recovery {
    boot: Arc<BootLoader>,
    state: AtomicU8,
}

impl Recovery {
    /// Creates a recovery handler in the `Normal` state.
    pub fn new(boot: Arc<BootLoader>) -> Self {
        Self {
            boot,
            state: AtomicU8::new(FaultState::Normal as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> FaultState {
        FaultState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The boot loader this handler drives.
    pub fn boot_loader(&self) -> &Arc<BootLoader> {
        &self.boot
    }

    /// Handles one signal and returns what is left to do.
    pub fn on_signal(&self, kind: SignalKind, signo: i32) -> Disposition {
        match kind {
            SignalKind::Dump if self.state() == FaultState::Normal => self.on_dump(signo),
            _ => self.on_fault(signo),
        }
    }

    fn on_dump(&self, signo: i32) -> Disposition {
        warn!("signal {signo} received. Dumping partial statistics");
        if let Err(e) = self.boot.report_on_the_fly(None) {
            error!("partial report failed: {e}");
        }
        Disposition::Continue
    }

    fn on_fault(&self, signo: i32) -> Disposition {
        info!("Stopping simulation early");

        let entered = self.state.compare_exchange(
            FaultState::Normal as u8,
            FaultState::Faulting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if entered.is_err() {
            let _ = self.boot.scheduler().try_unplug();
            warn!("Not a nice stop. It may leave pids");
            return Disposition::KillGroup;
        }

        self.boot.begin_stop();
        warn!("unexpected signal {signo} received. Dumping partial statistics");
        if let Err(e) = self.boot.report_on_the_fly(None) {
            error!("partial report failed: {e}");
        }
        self.boot.unboot();
        self.boot.unplug();

        self.state.store(FaultState::Normal as u8, Ordering::Release);
        Disposition::Abort
    }
}

/// Carries out `disposition`. Returns only for [`Disposition::Continue`].
pub fn apply(disposition: Disposition) {
    match disposition {
        Disposition::Continue => {}
        Disposition::Abort => process::abort(),
        Disposition::KillGroup => {
            kill_process_group();
            process::abort()
        }
    }
}

fn kill_process_group() {
    // SAFETY: getpgrp cannot fail; killpg only sends a signal to our own group.
    unsafe {
        let group = libc::getpgrp();
        let _ = libc::killpg(group, libc::SIGKILL);
    }
}

/// Registers the recovery signals and starts the listener thread.
///
/// The listener only routes signals and never blocks on the simulation. Dump
/// requests queue up for a single dump worker, so partial reports never
/// interleave. Stop requests get a worker thread each, so a second signal is
/// still noticed while the first one is being handled or a dump is stuck.
pub fn install(recovery: Arc<Recovery>) -> io::Result<JoinHandle<()>> {
    let mut signals = Signals::new(DUMP_SIGNALS.iter().chain(TERM_SIGNALS.iter()))?;

    let (dumps, queue) = mpsc::channel::<i32>();
    let dumper = Arc::clone(&recovery);
    let _dump_worker = thread::Builder::new()
        .name("esesc-dump".into())
        .spawn(move || {
            for signo in queue {
                apply(dumper.on_signal(SignalKind::Dump, signo));
            }
        })?;

    thread::Builder::new()
        .name("esesc-recovery".into())
        .spawn(move || {
            for signo in signals.forever() {
                let Some(kind) = SignalKind::classify(signo) else {
                    continue;
                };
                if kind == SignalKind::Dump && recovery.state() == FaultState::Normal {
                    if let Err(e) = dumps.send(signo) {
                        error!("dump worker is gone; signal {} dropped", e.0);
                    }
                    continue;
                }

                let recovery = Arc::clone(&recovery);
                let worker = thread::Builder::new()
                    .name(format!("esesc-signal-{signo}"))
                    .spawn(move || apply(recovery.on_signal(kind, signo)));
                if let Err(e) = worker {
                    error!("cannot spawn signal worker: {e}");
                }
            }
        })
}
