//! In-memory display backend and inventory builders for tests.

use std::collections::HashMap;
use std::sync::Once;

use crate::backend::{
    ApplyMethod, BackendCapabilities, ConfigUpdate, DisplayBackend,
};
use crate::config::LayoutMode;
use crate::error::ConfigError;
use crate::monitor::{
    Crtc, CrtcId, CrtcMode, CrtcModeId, ModeFlags, Monitor, MonitorMode, MonitorModeSpec,
    MonitorSpec, Output, OutputId, Transform,
};

/// Routes tracing output to the test harness. Filter with `RUST_LOG`.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub fn simple_mode(id: u64, width: i32, height: i32, refresh_rate: f64) -> MonitorMode {
    MonitorMode {
        spec: MonitorModeSpec {
            width,
            height,
            refresh_rate,
            flags: ModeFlags::empty(),
        },
        crtc_modes: vec![Some(CrtcMode {
            id: CrtcModeId(id),
            width,
            height,
            refresh_rate,
            flags: ModeFlags::empty(),
        })],
    }
}

pub fn simple_monitor_with_crtcs(
    connector: &str,
    id: u64,
    width: i32,
    height: i32,
    possible_crtcs: &[u64],
) -> Monitor {
    Monitor {
        spec: MonitorSpec::new(
            connector,
            "VEN",
            &format!("Model-{connector}"),
            &format!("0x{id:04x}"),
        ),
        modes: vec![simple_mode(id * 100, width, height, 60.0)],
        preferred_mode: 0,
        outputs: vec![Output {
            id: OutputId(id),
            possible_crtcs: possible_crtcs.iter().copied().map(CrtcId).collect(),
            assigned_crtc: None,
            tile_info: None,
        }],
        is_builtin: false,
        is_primary: false,
        is_active: false,
        is_underscanning: false,
        suggested_position: None,
        panel_orientation_transform: Transform::Normal,
    }
}

pub fn simple_monitor(connector: &str, id: u64, width: i32, height: i32) -> Monitor {
    simple_monitor_with_crtcs(connector, id, width, height, &[id])
}

pub fn builtin_monitor(connector: &str, id: u64, width: i32, height: i32) -> Monitor {
    Monitor {
        is_builtin: true,
        ..simple_monitor(connector, id, width, height)
    }
}

/// Adds an extra mode to a single-output monitor.
pub fn add_mode(monitor: &mut Monitor, id: u64, width: i32, height: i32, refresh_rate: f64) {
    monitor.modes.push(simple_mode(id, width, height, refresh_rate));
}

pub struct TestBackend {
    pub monitors: Vec<Monitor>,
    pub crtcs: Vec<Crtc>,
    pub capabilities: BackendCapabilities,
    pub lid_closed: bool,
    pub layout_mode: LayoutMode,
    pub supported_scales: Vec<f64>,
    pub mode_scales: HashMap<String, f64>,
    pub transform_handled: bool,
    pub orientation: Transform,
    pub hotplug_mode_update: bool,
    pub applied: Vec<(ConfigUpdate, ApplyMethod)>,
    pub fail_apply: bool,
}

impl TestBackend {
    pub fn new(monitors: Vec<Monitor>) -> Self {
        let mut crtc_ids: Vec<CrtcId> = monitors
            .iter()
            .flat_map(|monitor| &monitor.outputs)
            .flat_map(|output| output.possible_crtcs.iter().copied())
            .collect();
        crtc_ids.sort();
        crtc_ids.dedup();

        Self {
            monitors,
            crtcs: crtc_ids.into_iter().map(|id| Crtc { id }).collect(),
            capabilities: BackendCapabilities::empty(),
            lid_closed: false,
            layout_mode: LayoutMode::Logical,
            supported_scales: vec![1.0],
            mode_scales: HashMap::new(),
            transform_handled: true,
            orientation: Transform::Normal,
            hotplug_mode_update: false,
            applied: Vec::new(),
            fail_apply: false,
        }
    }

    pub fn with_supported_scales(mut self, scales: Vec<f64>) -> Self {
        self.supported_scales = scales;
        self
    }

    pub fn with_transform_handled(mut self, handled: bool) -> Self {
        self.transform_handled = handled;
        self
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_lid_closed(mut self, closed: bool) -> Self {
        self.lid_closed = closed;
        self
    }

    pub fn with_layout_mode(mut self, layout_mode: LayoutMode) -> Self {
        self.layout_mode = layout_mode;
        self
    }

    /// Overrides the preferred scale reported for one connector.
    pub fn with_mode_scale(mut self, connector: &str, scale: f64) -> Self {
        self.mode_scales.insert(connector.to_owned(), scale);
        if !self
            .supported_scales
            .iter()
            .any(|supported| (supported - scale).abs() < crate::backend::SCALE_EPSILON)
        {
            self.supported_scales.push(scale);
        }
        self
    }

    pub fn last_applied(&self) -> Option<&(ConfigUpdate, ApplyMethod)> {
        self.applied.last()
    }
}

impl DisplayBackend for TestBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    fn crtcs(&self) -> &[Crtc] {
        &self.crtcs
    }

    fn is_lid_closed(&self) -> bool {
        self.lid_closed
    }

    fn default_layout_mode(&self) -> LayoutMode {
        self.layout_mode
    }

    fn calculate_monitor_mode_scale(
        &self,
        _layout_mode: LayoutMode,
        monitor: &Monitor,
        _mode: &MonitorMode,
    ) -> f64 {
        self.mode_scales
            .get(&monitor.spec.connector)
            .copied()
            .unwrap_or(1.0)
    }

    fn calculate_supported_scales(
        &self,
        _layout_mode: LayoutMode,
        _monitor: &Monitor,
        _mode: &MonitorMode,
    ) -> Vec<f64> {
        self.supported_scales.clone()
    }

    fn is_transform_handled(&self, _crtc: CrtcId, _transform: Transform) -> bool {
        self.transform_handled
    }

    fn orientation_transform(&self) -> Transform {
        self.orientation
    }

    fn has_hotplug_mode_update(&self) -> bool {
        self.hotplug_mode_update
    }

    fn apply(
        &mut self,
        update: &ConfigUpdate,
        method: ApplyMethod,
    ) -> Result<(), ConfigError> {
        if self.fail_apply {
            return Err(ConfigError::Backend("test backend refused".to_owned()));
        }
        self.applied.push((update.clone(), method));
        Ok(())
    }
}
