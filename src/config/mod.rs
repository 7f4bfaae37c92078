//! Configuration data model.
//!
//! A [`MonitorsConfig`] describes one complete desired state of all
//! connected monitors: a set of logical monitors (each driving one or more
//! physical monitors at a mode, scale and transform) plus the monitors
//! deliberately left disabled. Configs are immutable once built and shared
//! via `Rc`; the [`MonitorsConfigKey`] identifies which hardware combination
//! a config is for.

use std::rc::Rc;

use bitflags::bitflags;

use crate::geometry::Rect;
use crate::monitor::{Monitor, MonitorModeSpec, MonitorSpec, Transform};

pub mod format;
pub mod store;

/// Scale carried by configs migrated from the legacy on-disk format until
/// the first time they are resolved against real hardware.
pub const PENDING_MIGRATION_SCALE: f64 = -1.0;

/// How logical monitor sizes relate to pixel sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutMode {
    /// Logical size is the pixel size divided by the per-monitor scale.
    #[default]
    Logical,
    /// Logical size equals the pixel size; scaling is a client concern.
    Physical,
    /// Logical size is derived from a single global UI scale.
    GlobalUiLogical,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfigFlags: u32 {
        /// Loaded from a read-only system location; never written back.
        const SYSTEM_CONFIG = 1 << 0;
        /// Migrated from the legacy format; scales are placeholders until
        /// resolved against the hardware.
        const MIGRATED = 1 << 1;
    }
}

/// Which generator shape a config was produced by, for cycling through
/// switch-config presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchConfig {
    AllMirror,
    AllLinear,
    External,
    Builtin,
    #[default]
    Unknown,
}

/// One physical monitor's part in a logical monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub monitor_spec: MonitorSpec,
    pub mode_spec: MonitorModeSpec,
    pub enable_underscanning: bool,
}

/// One logical monitor: a rectangle in the layout driven by one or more
/// physical monitors showing the same content.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalMonitorConfig {
    pub layout: Rect,
    pub scale: f64,
    pub transform: Transform,
    pub is_primary: bool,
    pub is_presentation: bool,
    pub monitor_configs: Vec<MonitorConfig>,
}

/// Identifies the hardware combination a config applies to. The spec list
/// is sorted, so the key is independent of the order monitors were
/// enumerated in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitorsConfigKey {
    pub monitor_specs: Vec<MonitorSpec>,
}

impl MonitorsConfigKey {
    /// Key for the currently connected hardware. A closed laptop lid hides
    /// the builtin panel from the key, unless it is the only monitor.
    pub fn for_current_state(monitors: &[Monitor], lid_is_closed: bool) -> Option<Self> {
        let mut monitor_specs: Vec<MonitorSpec> = monitors
            .iter()
            .filter(|monitor| !(monitor.is_builtin && lid_is_closed && monitors.len() > 1))
            .map(|monitor| monitor.spec.clone())
            .collect();
        if monitor_specs.is_empty() {
            return None;
        }
        monitor_specs.sort();
        Some(Self { monitor_specs })
    }
}

/// The largest per-logical-monitor scale in a config, floored at 1. Feeds
/// the global UI scale under [`LayoutMode::GlobalUiLogical`].
pub fn max_scale(logical_monitor_configs: &[LogicalMonitorConfig]) -> f64 {
    logical_monitor_configs
        .iter()
        .map(|logical| logical.scale)
        .fold(1.0, f64::max)
}

/// Expected logical layout size for a monitor mode of the given pixel size.
pub fn derive_logical_monitor_size(
    mode_width: i32,
    mode_height: i32,
    transform: Transform,
    scale: f64,
    layout_mode: LayoutMode,
    max_scale: f64,
) -> (i32, i32) {
    let (width, height) = if transform.is_rotated() {
        (mode_height, mode_width)
    } else {
        (mode_width, mode_height)
    };

    match layout_mode {
        LayoutMode::Logical => (
            (width as f64 / scale).round() as i32,
            (height as f64 / scale).round() as i32,
        ),
        LayoutMode::GlobalUiLogical => (
            (width as f64 * max_scale.ceil() / scale).round() as i32,
            (height as f64 * max_scale.ceil() / scale).round() as i32,
        ),
        LayoutMode::Physical => (width, height),
    }
}

/// A complete desired state of all connected monitors.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorsConfig {
    pub key: MonitorsConfigKey,
    pub logical_monitor_configs: Vec<LogicalMonitorConfig>,
    pub disabled_monitor_specs: Vec<MonitorSpec>,
    pub layout_mode: LayoutMode,
    pub flags: ConfigFlags,
    pub switch_config: SwitchConfig,
}

impl MonitorsConfig {
    pub fn new(
        logical_monitor_configs: Vec<LogicalMonitorConfig>,
        disabled_monitor_specs: Vec<MonitorSpec>,
        layout_mode: LayoutMode,
        flags: ConfigFlags,
    ) -> Rc<Self> {
        let mut monitor_specs: Vec<MonitorSpec> = logical_monitor_configs
            .iter()
            .flat_map(|logical| &logical.monitor_configs)
            .map(|config| config.monitor_spec.clone())
            .chain(disabled_monitor_specs.iter().cloned())
            .collect();
        monitor_specs.sort();

        Rc::new(Self {
            key: MonitorsConfigKey { monitor_specs },
            logical_monitor_configs,
            disabled_monitor_specs,
            layout_mode,
            flags,
            switch_config: SwitchConfig::Unknown,
        })
    }

    pub fn with_switch_config(self: Rc<Self>, switch_config: SwitchConfig) -> Rc<Self> {
        let mut config = (*self).clone();
        config.switch_config = switch_config;
        Rc::new(config)
    }

    pub fn monitor_config_for(&self, spec: &MonitorSpec) -> Option<&MonitorConfig> {
        self.logical_monitor_configs
            .iter()
            .flat_map(|logical| &logical.monitor_configs)
            .find(|config| config.monitor_spec == *spec)
    }

    pub fn is_monitor_disabled(&self, spec: &MonitorSpec) -> bool {
        self.disabled_monitor_specs.contains(spec)
    }

    /// The logical monitor driving only this monitor, if any. Clones (more
    /// than one monitor per logical monitor) do not count.
    pub fn solo_logical_config_for(
        &self,
        spec: &MonitorSpec,
    ) -> Option<&LogicalMonitorConfig> {
        self.logical_monitor_configs.iter().find(|logical| {
            logical.monitor_configs.len() == 1
                && logical.monitor_configs[0].monitor_spec == *spec
        })
    }
}
