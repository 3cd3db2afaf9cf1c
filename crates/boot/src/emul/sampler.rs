//! Sampler resolution.
//!
//! A sampler decides how its backend alternates fast-forward and detailed timing for
//! one flow. Each sampler is bound to exactly one (flow, backend) pair.

use std::fmt;

use crate::common::{ConfError, FlowId};
use crate::components::Components;
use crate::config::kinds::{EmulKind, SamplerKind};
use crate::config::{Capabilities, ConfStore};

/// Sampling strategy attached to one flow of one backend.
pub trait Sampler: Send + fmt::Debug {
    /// Strategy kind.
    fn kind(&self) -> SamplerKind;
    /// Sampler section the strategy was configured from.
    fn section(&self) -> &str;
    /// Flow the sampler drives.
    fn flow(&self) -> FlowId;
}

/// The (flow, backend) pair a new sampler is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    /// Flow the sampler drives.
    pub fid: FlowId,
    /// Kind of the backend serving the flow.
    pub emul: EmulKind,
    /// Section of the backend serving the flow.
    pub emul_section: String,
}

/// Resolves the sampler referenced by `keyword` in the backend's section.
///
/// Returns `None` after recording a configuration error when the reference, the
/// sampler section or its `type` is missing or unknown.
pub fn get_sampler(
    conf: &mut ConfStore,
    caps: &Capabilities,
    components: &dyn Components,
    binding: &SamplerBinding,
    keyword: &str,
) -> Option<Box<dyn Sampler>> {
    let sampler_sec = match conf.get_str(&binding.emul_section, keyword) {
        Ok(section) => section.to_owned(),
        Err(e) => {
            conf.not_correct(e);
            return None;
        }
    };
    if !conf.has_section(&sampler_sec) {
        conf.not_correct(ConfError::MissingSection {
            section: sampler_sec,
            from: binding.emul_section.clone(),
            key: keyword.to_owned(),
        });
        return None;
    }

    let kind = conf
        .get_str(&sampler_sec, "type")
        .and_then(|ty| SamplerKind::from_conf(&sampler_sec, ty, caps));
    match kind {
        Ok(kind) => Some(components.new_sampler(kind, &sampler_sec, binding)),
        Err(e) => {
            conf.not_correct(e);
            None
        }
    }
}
