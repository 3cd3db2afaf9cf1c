//! # Crash Recovery Tests
//!
//! Drives `Recovery::on_signal` directly and checks the returned disposition.
//! Nothing here aborts the test process; the installed listener is only ever
//! sent dump requests.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use esesc_boot::sim::recovery::{self, Disposition, FaultState, SignalKind};
use esesc_boot::{BootError, Recovery};
use pretty_assertions::assert_eq;
use rstest::rstest;
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGSEGV, SIGTERM, SIGUSR1};

use crate::common::harness::{TestBed, base_conf};
use crate::common::mocks::Event;

fn plugged() -> (TestBed, Arc<Recovery>) {
    let bed = TestBed::new();
    bed.plug(base_conf()).unwrap();
    let recovery = Arc::new(Recovery::new(Arc::clone(&bed.boot)));
    (bed, recovery)
}

#[rstest]
#[case(SIGUSR1, Some(SignalKind::Dump))]
#[case(SIGINT, Some(SignalKind::Terminate))]
#[case(SIGTERM, Some(SignalKind::Terminate))]
#[case(SIGHUP, Some(SignalKind::Terminate))]
#[case(SIGQUIT, Some(SignalKind::Terminate))]
#[case(SIGSEGV, None)]
fn test_signal_classification(#[case] signo: i32, #[case] expected: Option<SignalKind>) {
    assert_eq!(SignalKind::classify(signo), expected);
}

#[test]
fn test_dump_request_keeps_running() {
    let (bed, recovery) = plugged();

    assert_eq!(
        recovery.on_signal(SignalKind::Dump, SIGUSR1),
        Disposition::Continue
    );
    assert_eq!(
        recovery.on_signal(SignalKind::Dump, SIGUSR1),
        Disposition::Continue
    );

    assert_eq!(bed.reports_labelled("partial").len(), 2);
    assert_eq!(bed.log.count(|e| *e == Event::Unboot), 0);
    assert_eq!(bed.log.count(|e| *e == Event::Unplug), 0);
    assert_eq!(recovery.state(), FaultState::Normal);
}

#[test]
fn test_stop_signal_reports_once_then_tears_down() {
    let (bed, recovery) = plugged();

    let disposition = recovery.on_signal(SignalKind::Terminate, SIGTERM);

    assert_eq!(disposition, Disposition::Abort);
    assert_eq!(bed.reports_labelled("partial").len(), 1);
    let unboot = bed.log.position(&Event::Unboot).unwrap();
    let unplug = bed.log.position(&Event::Unplug).unwrap();
    assert!(unboot < unplug);
    assert_eq!(recovery.state(), FaultState::Normal);
    assert_eq!(bed.tasks.inner().emul_count(), 0);

    assert!(bed.boot.is_stopping());
    assert!(matches!(bed.boot.report("done"), Err(BootError::Stopping)));
    assert!(bed.reports_labelled("done").is_empty());
}

#[test]
fn test_stop_during_boot_hands_shutdown_to_recovery() {
    let bed = TestBed::endless();
    bed.plug(base_conf()).unwrap();
    let recovery = Recovery::new(Arc::clone(&bed.boot));

    let runner = {
        let boot = Arc::clone(&bed.boot);
        thread::spawn(move || boot.boot())
    };
    while !bed.tasks.inner().is_running() {
        thread::yield_now();
    }

    assert_eq!(
        recovery.on_signal(SignalKind::Terminate, SIGTERM),
        Disposition::Abort
    );
    runner.join().unwrap().unwrap();

    // What the main thread sees once `boot` returns.
    assert!(matches!(bed.boot.report("done"), Err(BootError::Stopping)));
    assert!(bed.reports_labelled("done").is_empty());

    let partial = bed.reports_labelled("partial");
    assert_eq!(partial.len(), 1);
    assert!(partial[0].contains("#BEGIN_CONFIGURATION"));
    let unboot = bed.log.position(&Event::Unboot).unwrap();
    let unplug = bed.log.position(&Event::Unplug).unwrap();
    assert!(unboot < unplug);
    assert_eq!(bed.tasks.inner().emul_count(), 0);
}

#[rstest]
#[case::second_stop(SignalKind::Terminate, SIGINT)]
#[case::dump_during_fault(SignalKind::Dump, SIGUSR1)]
fn test_signal_during_fault_kills_the_group(#[case] kind: SignalKind, #[case] signo: i32) {
    let (bed, recovery) = plugged();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let weak = Arc::downgrade(&recovery);
    let sink = Arc::clone(&seen);
    bed.tasks.on_unboot(move || {
        if let Some(recovery) = weak.upgrade() {
            let state = recovery.state();
            let disposition = recovery.on_signal(kind, signo);
            sink.lock().unwrap().push((state, disposition));
        }
    });

    let outer = recovery.on_signal(SignalKind::Terminate, SIGTERM);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(FaultState::Faulting, Disposition::KillGroup)]
    );
    assert_eq!(outer, Disposition::Abort);
    assert_eq!(bed.reports_labelled("partial").len(), 1);
    // The nested handler releases the scheduler without waiting, before the outer unplug runs.
    let released = bed.log.position(&Event::TryUnplug).unwrap();
    let unplug = bed.log.position(&Event::Unplug).unwrap();
    assert!(released < unplug);
    assert_eq!(bed.log.count(|e| *e == Event::Unplug), 1);
}

#[test]
fn test_stop_before_plug_still_tears_down() {
    let bed = TestBed::new();
    let recovery = Recovery::new(Arc::clone(&bed.boot));

    assert_eq!(
        recovery.on_signal(SignalKind::Terminate, SIGINT),
        Disposition::Abort
    );
    assert!(bed.report_files().is_empty());
    assert_eq!(bed.log.snapshot(), vec![Event::Unboot, Event::Unplug]);
}

#[test]
fn test_installed_listener_dumps_and_the_run_still_reports() {
    let (bed, recovery) = plugged();
    bed.boot.boot().unwrap();
    let _listener = recovery::install(Arc::clone(&recovery)).unwrap();

    signal_hook::low_level::raise(SIGUSR1).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let finished = |bed: &TestBed| {
        bed.reports_labelled("partial")
            .iter()
            .any(|text| text.contains("BootLoader:simuFlows="))
    };
    while !finished(&bed) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(finished(&bed), "no partial report within the deadline");
    assert_eq!(recovery.state(), FaultState::Normal);
    assert!(!bed.boot.is_stopping());

    bed.boot.report("done").unwrap();
    assert_eq!(bed.reports_labelled("done").len(), 1);
    assert_eq!(bed.reports_labelled("partial").len(), 1);
}
