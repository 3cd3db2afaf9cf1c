//! Power and thermal model seams.
//!
//! The boot loader only decides *whether* the power model runs and toggles its
//! periodic dump; the computation itself lives behind [`PowerModel`].

use std::fmt;

use crate::config::ConfStore;

/// Power model collaborator.
pub trait PowerModel: Send + fmt::Debug {
    /// Plugs the model using `section`. Problems go through `conf`'s error channel.
    fn plug(&mut self, section: &str, conf: &mut ConfStore);
    /// Releases whatever `plug` acquired.
    fn unplug(&mut self);
    /// Starts the periodic partial-report stream. The model decides the cadence.
    fn start_dump(&mut self);
    /// Stops the periodic partial-report stream.
    fn stop_dump(&mut self);
}

/// Thermal reporting collaborator.
pub trait ThermalReport: Send + fmt::Debug {
    /// Stops the periodic thermal callback.
    fn stop_cb(&mut self);
    /// Closes the thermal trace.
    fn close(&mut self);
}

/// Power model that only tracks its own lifecycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NullPowerModel {
    section: Option<String>,
    dumping: bool,
}

impl NullPowerModel {
    /// Section the model was plugged with, if plugged.
    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// Returns `true` while the periodic dump is running.
    pub const fn is_dumping(&self) -> bool {
        self.dumping
    }
}

impl PowerModel for NullPowerModel {
    fn plug(&mut self, section: &str, _conf: &mut ConfStore) {
        self.section = Some(section.to_owned());
    }

    fn unplug(&mut self) {
        self.dumping = false;
        self.section = None;
    }

    fn start_dump(&mut self) {
        self.dumping = true;
    }

    fn stop_dump(&mut self) {
        self.dumping = false;
    }
}

/// Thermal report with no trace behind it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullThermal {
    stopped: bool,
    closed: bool,
}

impl NullThermal {
    /// Returns `true` once `stop_cb` has been called.
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Returns `true` once `close` has been called.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ThermalReport for NullThermal {
    fn stop_cb(&mut self) {
        self.stopped = true;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
