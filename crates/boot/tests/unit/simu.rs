//! # Simulation Resolver Tests
//!
//! Memory-before-processor ordering, processor selection precedence and the
//! resolved memory topology.

use esesc_boot::common::ConfError;
use esesc_boot::config::kinds::{MemoryKind, ProcessorKind};
use esesc_boot::sched::Scheduler;
use esesc_boot::simu::plug_simu_interfaces;
use esesc_boot::simu::topology::{ArchDiagram, Topology};
use esesc_boot::{Capabilities, ConfStore, FlowId};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

use crate::common::harness::{caps, cpu_only_caps, init_tracing, set, system_conf};
use crate::common::mocks::components::RecordingComponents;
use crate::common::mocks::scheduler::RecordingScheduler;
use crate::common::mocks::{Event, EventLog};

struct Resolved {
    conf: ConfStore,
    log: EventLog,
    tasks: RecordingScheduler,
}

fn resolve(doc: Value, caps: &Capabilities) -> Resolved {
    init_tracing();
    let mut conf = ConfStore::from_value(doc).unwrap();
    let log = EventLog::default();
    let components = RecordingComponents::new(log.clone());
    let tasks = RecordingScheduler::new(log.clone());
    plug_simu_interfaces(&mut conf, caps, &components, &tasks);
    Resolved { conf, log, tasks }
}

fn processor_kinds(log: &EventLog) -> Vec<(ProcessorKind, FlowId)> {
    log.snapshot()
        .into_iter()
        .filter_map(|e| match e {
            Event::Processor(kind, fid) => Some((kind, fid)),
            _ => None,
        })
        .collect()
}

fn edges(topo: &Topology) -> Vec<(&str, &str)> {
    topo.edges()
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect()
}

#[test]
fn test_memory_is_built_before_its_processor() {
    let r = resolve(system_conf(1, 2), &caps());
    assert!(r.conf.check(), "{:?}", r.conf.errors());

    for fid in (0..3).map(FlowId) {
        let built = r.log.position(&Event::MemoryBuilt(fid)).unwrap();
        let processor = r
            .log
            .snapshot()
            .iter()
            .position(|e| matches!(e, Event::Processor(_, f) if *f == fid))
            .unwrap();
        let registered = r.log.position(&Event::AddSimu(fid)).unwrap();
        assert!(built < processor, "flow {fid}: {:?}", r.log.snapshot());
        assert!(processor < registered);
    }
}

#[test]
fn test_no_memory_selects_the_dummy_system() {
    let r = resolve(system_conf(1, 2), &caps());

    assert_eq!(
        r.log.count(|e| matches!(e, Event::MemoryCreated(MemoryKind::Dummy, _))),
        2
    );
    assert_eq!(
        r.log.count(|e| *e == Event::MemoryCreated(MemoryKind::Real, FlowId(0))),
        1
    );
    let topologies = r.tasks.memory_topologies();
    assert!(topologies[1].edges().is_empty());
    assert!(topologies[2].edges().is_empty());
}

#[rstest]
#[case::out_of_order(json!({}), caps(), ProcessorKind::OutOfOrder)]
#[case::in_order(json!({ "inorder": true }), caps(), ProcessorKind::InOrder)]
#[case::in_order_beats_sm(json!({ "inorder": 1, "sp_per_sm": 16 }), caps(), ProcessorKind::InOrder)]
#[case::sm(json!({ "sp_per_sm": 16 }), caps(), ProcessorKind::GpuSm)]
#[case::sm_without_accel(json!({ "sp_per_sm": 16 }), cpu_only_caps(), ProcessorKind::OutOfOrder)]
fn test_processor_selection(
    #[case] fields: Value,
    #[case] caps: Capabilities,
    #[case] expected: ProcessorKind,
) {
    let mut fields = fields;
    fields["noMemory"] = json!(true);
    let doc = json!({ "cpusimu": "node", "node": fields });

    let r = resolve(doc, &caps);

    assert!(r.conf.check(), "{:?}", r.conf.errors());
    assert_eq!(processor_kinds(&r.log), vec![(expected, FlowId(0))]);
}

#[rstest]
#[case(0)]
#[case(-4)]
fn test_non_positive_lane_count_is_rejected(#[case] lanes: i64) {
    let doc = json!({ "cpusimu": "node", "node": { "sp_per_sm": lanes, "noMemory": true } });

    let r = resolve(doc, &caps());

    assert_eq!(
        r.conf.errors(),
        &[ConfError::InvalidValue {
            section: "node".into(),
            key: "sp_per_sm".into(),
            value: lanes.to_string(),
        }]
    );
    assert!(processor_kinds(&r.log).is_empty());
}

#[test]
fn test_missing_simu_section_is_reported() {
    let mut doc = system_conf(1, 0);
    set(&mut doc, "", "cpusimu", json!(["core", "ghost"]));

    let r = resolve(doc, &caps());

    assert_eq!(
        r.conf.errors(),
        &[ConfError::MissingSection {
            section: "ghost".into(),
            from: String::new(),
            key: "cpusimu".into(),
        }]
    );
    assert_eq!(r.tasks.inner().simu_count(), 1);
}

#[test]
fn test_missing_cache_level_fails_the_memory_build() {
    let mut doc = system_conf(1, 0);
    set(&mut doc, "core", "DL1", json!("DL1_absent DL1"));

    let r = resolve(doc, &caps());

    assert_eq!(
        r.conf.errors(),
        &[ConfError::MissingSection {
            section: "DL1_absent".into(),
            from: "core".into(),
            key: "DL1".into(),
        }]
    );
    assert!(processor_kinds(&r.log).is_empty());
}

#[test]
fn test_topology_names_private_and_shared_levels() {
    let r = resolve(system_conf(2, 0), &caps());
    let topologies = r.tasks.memory_topologies();

    assert_eq!(topologies[1].root(), "P(1)");
    assert_eq!(
        edges(&topologies[1]),
        vec![
            ("P(1)", "IL1(1)"),
            ("IL1(1)", "L2"),
            ("L2", "MemBus"),
            ("P(1)", "DL1(1)"),
            ("DL1(1)", "L2"),
        ]
    );
}

#[test]
fn test_arch_diagram_merges_shared_levels() {
    let r = resolve(system_conf(2, 0), &caps());
    let diagram: ArchDiagram = r.tasks.memory_topologies().iter().collect();

    // Four private edges per flow, plus L2 -> MemBus once.
    assert_eq!(diagram.edge_count(), 9);

    let dot = diagram.to_dot();
    assert!(dot.starts_with("digraph memory_arch {"));
    assert!(dot.contains("\"P(0)\" [shape=ellipse];"));
    assert!(dot.contains("\"L2\" -> \"MemBus\";"));
    assert_eq!(dot.matches("\"L2\" -> \"MemBus\"").count(), 1);
}

#[test]
fn test_arch_diagram_is_written_to_disk() {
    let r = resolve(system_conf(1, 0), &caps());
    let diagram: ArchDiagram = r.tasks.memory_topologies().iter().collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arch.dot");
    diagram.write_dot(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), diagram.to_dot());
}

#[test]
fn test_malformed_no_memory_flag_is_reported() {
    let doc = json!({ "cpusimu": "node", "node": { "noMemory": "yes" } });

    let r = resolve(doc, &caps());

    assert_eq!(
        r.conf.errors(),
        &[ConfError::WrongType {
            section: "node".into(),
            key: "noMemory".into(),
            expected: "a boolean",
        }]
    );
    assert_eq!(r.log.count(|e| matches!(e, Event::MemoryCreated(..))), 0);
    assert!(processor_kinds(&r.log).is_empty());
}
