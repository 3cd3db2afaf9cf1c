//! Emulation backend resolution.
//!
//! This module turns the root `cpuemul` record into emulation backends. It performs:
//! 1. **Type resolution:** each entry's `type` is mapped to an `EmulKind`.
//! 2. **Sharing validation:** a registry keyed by kind fixes the section on first use
//!    ("first writer wins") and rejects later entries naming a different section.
//! 3. **Instancing:** a full-system CPU backend is created per flow, while one accelerator
//!    backend is shared by every accelerator flow.
//! 4. **Mapping:** one slot per flow is appended to the scheduler's flow-to-emulator mapping.
//! 5. **Sampler attachment:** every flow gets its sampler bound to the backend serving it.
//!
//! Errors go through the configuration store's error channel and resolution continues,
//! so the caller's next checkpoint reports all of them at once.

/// Sampler trait and sampler resolution.
pub mod sampler;

use std::fmt;

use tracing::{debug, info};

use self::sampler::{Sampler, SamplerBinding};
use crate::common::{ConfError, FlowId};
use crate::components::Components;
use crate::config::kinds::EmulKind;
use crate::config::{Capabilities, ConfStore};
use crate::sched::Scheduler;

/// An emulation backend producing the dynamic instruction stream of its flows.
pub trait EmulInterface: Send + fmt::Debug {
    /// Backend kind.
    fn kind(&self) -> EmulKind;
    /// Configuration section the backend was created from.
    fn section(&self) -> &str;
    /// Binds the sampler driving flow `fid`. A flow has exactly one sampler.
    fn set_sampler(&mut self, sampler: Box<dyn Sampler>, fid: FlowId);
    /// Sampler bound to flow `fid`, if any.
    fn sampler(&self, fid: FlowId) -> Option<&dyn Sampler>;
    /// Runs one slice of flow `fid`. Returns `false` once the flow has finished.
    fn execute(&mut self, fid: FlowId) -> bool;
}

/// Result of claiming a backend kind for a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// First declaration of this kind; the section is now fixed.
    First,
    /// A later declaration naming the already fixed section.
    Again,
}

/// Sections fixed per backend kind, with the flow that fixed them.
#[derive(Debug, Default)]
struct BackendRegistry {
    cpu: Option<(String, FlowId)>,
    accel: Option<(String, FlowId)>,
}

impl BackendRegistry {
    fn claim(&mut self, kind: EmulKind, section: &str, fid: FlowId) -> Result<Claim, ConfError> {
        let entry = match kind {
            EmulKind::Qemu => &mut self.cpu,
            EmulKind::Gpu => &mut self.accel,
        };
        match entry.as_ref() {
            None => {}
            Some((owned, _)) if owned.eq_ignore_ascii_case(section) => return Ok(Claim::Again),
            Some((owned, _)) => {
                return Err(ConfError::SectionConflict {
                    kind,
                    flow: fid,
                    expected: owned.clone(),
                    found: section.to_owned(),
                });
            }
        }
        *entry = Some((section.to_owned(), fid));
        Ok(Claim::First)
    }
}

/// Resolves every `cpuemul` entry and registers the backends with `tasks`.
pub fn plug_emul_interfaces(
    conf: &mut ConfStore,
    caps: &Capabilities,
    components: &dyn Components,
    tasks: &dyn Scheduler,
) {
    let nemul = conf.record_size(ConfStore::ROOT, "cpuemul");
    info!("cpuemul size [{nemul}]");
    if nemul == 0 {
        conf.not_correct(ConfError::MissingField {
            section: ConfStore::ROOT.to_owned(),
            key: "cpuemul".to_owned(),
        });
        return;
    }

    let mut registry = BackendRegistry::default();
    let mut shared: Option<Box<dyn EmulInterface>> = None;

    for i in 0..nemul {
        let fid = FlowId::from(i);
        let section = match conf.record(ConfStore::ROOT, "cpuemul", i) {
            Ok(section) => section.to_owned(),
            Err(e) => {
                conf.not_correct(e);
                continue;
            }
        };
        let kind = conf
            .get_str(&section, "type")
            .and_then(|ty| EmulKind::from_conf(&section, ty, caps));
        let kind = match kind {
            Ok(kind) => kind,
            Err(e) => {
                conf.not_correct(e);
                continue;
            }
        };
        let claim = match registry.claim(kind, &section, fid) {
            Ok(claim) => claim,
            Err(e) => {
                conf.not_correct(e);
                continue;
            }
        };

        tasks.push_emul_mapping(kind.slot());
        debug!(flow = %fid, %kind, section = %section, "cpuemul resolved");

        match kind {
            EmulKind::Qemu => {
                // Each CPU flow has its own backend and sampler on the shared section.
                let mut eint = components.new_emul(kind, &section);
                attach_sampler(conf, caps, components, eint.as_mut(), fid);
                tasks.add_emul(fid, eint);
            }
            EmulKind::Gpu => {
                if claim == Claim::First {
                    shared = Some(components.new_emul(kind, &section));
                }
                if let Some(eint) = shared.as_mut() {
                    attach_sampler(conf, caps, components, eint.as_mut(), fid);
                }
            }
        }
    }

    if let (Some(eint), Some((_, owner))) = (shared, registry.accel) {
        tasks.add_emul_shared(eint, owner);
    }
}

fn attach_sampler(
    conf: &mut ConfStore,
    caps: &Capabilities,
    components: &dyn Components,
    eint: &mut dyn EmulInterface,
    fid: FlowId,
) {
    let binding = SamplerBinding {
        fid,
        emul: eint.kind(),
        emul_section: eint.section().to_owned(),
    };
    if let Some(sampler) = sampler::get_sampler(conf, caps, components, &binding, "sampler") {
        eint.set_sampler(sampler, fid);
    }
}
