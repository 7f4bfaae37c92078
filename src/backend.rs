//! Boundary to the actual display system.
//!
//! Everything hardware-specific sits behind [`DisplayBackend`]: the monitor
//! and CRTC inventory, scale capabilities, and the mode-setting entry point
//! that consumes a [`ConfigUpdate`]. The manager and generators only ever
//! see this trait, so tests drive them with an in-memory double.

use bitflags::bitflags;

use crate::config::LayoutMode;
use crate::error::ConfigError;
use crate::geometry::RectF;
use crate::monitor::{Crtc, CrtcId, CrtcMode, Monitor, MonitorMode, MonitorSpec, OutputId, Transform};

/// Two scale factors closer than this are the same scale.
pub const SCALE_EPSILON: f64 = 1e-6;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BackendCapabilities: u32 {
        /// All monitors must share one scale factor.
        const GLOBAL_SCALE_REQUIRED = 1 << 0;
    }
}

/// How a configuration is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMethod {
    /// Run assignment and validation only; nothing reaches the hardware.
    Verify,
    /// Apply without persisting or arming the confirmation timeout.
    Temporary,
    /// Apply and await user confirmation before the config is stored.
    Persistent,
}

/// Programming for one CRTC.
#[derive(Debug, Clone, PartialEq)]
pub struct CrtcAssignment {
    pub crtc: CrtcId,
    pub mode: CrtcMode,
    /// Frame in layout coordinates; fractional under scaling.
    pub layout: RectF,
    pub transform: Transform,
    pub scale: f64,
    pub outputs: Vec<OutputId>,
}

/// Per-output attributes accompanying the CRTC programming.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputAssignment {
    pub output: OutputId,
    pub is_primary: bool,
    pub is_presentation: bool,
    pub is_underscanning: bool,
}

/// The full outcome of assignment, ready for mode-setting. CRTCs and
/// outputs not mentioned here are to be disabled by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub crtc_assignments: Vec<CrtcAssignment>,
    pub output_assignments: Vec<OutputAssignment>,
}

pub trait DisplayBackend {
    fn capabilities(&self) -> BackendCapabilities;

    /// Current monitor inventory, rebuilt on hotplug.
    fn monitors(&self) -> &[Monitor];

    fn crtcs(&self) -> &[Crtc];

    fn is_lid_closed(&self) -> bool;

    fn default_layout_mode(&self) -> LayoutMode;

    /// The scale to use for a monitor at a mode when nothing is configured.
    fn calculate_monitor_mode_scale(
        &self,
        layout_mode: LayoutMode,
        monitor: &Monitor,
        mode: &MonitorMode,
    ) -> f64;

    fn calculate_supported_scales(
        &self,
        layout_mode: LayoutMode,
        monitor: &Monitor,
        mode: &MonitorMode,
    ) -> Vec<f64>;

    fn is_transform_handled(&self, crtc: CrtcId, transform: Transform) -> bool;

    /// Absolute panel orientation reported by an accelerometer, if any.
    fn orientation_transform(&self) -> Transform {
        Transform::Normal
    }

    /// Whether hotplug events may change modes of already-connected
    /// monitors (virtual machines do this), making stored configs stale.
    fn has_hotplug_mode_update(&self) -> bool {
        false
    }

    /// Program the hardware. Must be all-or-nothing; a failure leaves the
    /// previous state in place.
    fn apply(&mut self, update: &ConfigUpdate, method: ApplyMethod)
        -> Result<(), ConfigError>;

    fn is_scale_supported(
        &self,
        layout_mode: LayoutMode,
        monitor: &Monitor,
        mode: &MonitorMode,
        scale: f64,
    ) -> bool {
        self.calculate_supported_scales(layout_mode, monitor, mode)
            .iter()
            .any(|supported| (supported - scale).abs() < SCALE_EPSILON)
    }

    fn monitor_from_spec(&self, spec: &MonitorSpec) -> Option<&Monitor> {
        self.monitors().iter().find(|monitor| monitor.spec == *spec)
    }
}
