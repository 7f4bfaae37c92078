//! CRTC and output assignment.
//!
//! Turns a validated [`MonitorsConfig`] plus the live inventory into a
//! [`ConfigUpdate`]: one CRTC assignment per participating output and the
//! per-output attribute records. Assignment is all-or-nothing; any monitor
//! or mode that cannot be realized fails the whole configuration.

use tracing::debug;

use crate::backend::{ConfigUpdate, CrtcAssignment, DisplayBackend, OutputAssignment};
use crate::config::{LayoutMode, LogicalMonitorConfig, MonitorConfig, MonitorsConfig};
use crate::error::ConfigError;
use crate::geometry::RectF;
use crate::monitor::{CrtcId, Monitor, MonitorMode, Output, Transform};

fn is_crtc_assigned(crtc: CrtcId, assignments: &[CrtcAssignment]) -> bool {
    assignments.iter().any(|assignment| assignment.crtc == crtc)
}

/// Prefer the CRTC already driving the output, then an unreserved candidate,
/// then any free candidate. The reserved set only exists to avoid stealing
/// CRTCs from outputs that keep theirs across the reconfiguration, so it is
/// ignored as a last resort.
fn find_unassigned_crtc(
    output: &Output,
    assignments: &[CrtcAssignment],
    reserved_crtcs: &[CrtcId],
) -> Option<CrtcId> {
    if let Some(crtc) = output.assigned_crtc {
        if !is_crtc_assigned(crtc, assignments) {
            return Some(crtc);
        }
    }

    output
        .possible_crtcs
        .iter()
        .copied()
        .find(|&crtc| {
            !is_crtc_assigned(crtc, assignments) && !reserved_crtcs.contains(&crtc)
        })
        .or_else(|| {
            output
                .possible_crtcs
                .iter()
                .copied()
                .find(|&crtc| !is_crtc_assigned(crtc, assignments))
        })
}

struct AssignmentPass<'a> {
    backend: &'a dyn DisplayBackend,
    config: &'a MonitorsConfig,
    reserved_crtcs: Vec<CrtcId>,
    update: ConfigUpdate,
}

impl AssignmentPass<'_> {
    fn assign_monitor_crtc(
        &mut self,
        logical: &LogicalMonitorConfig,
        monitor_config: &MonitorConfig,
        is_first_monitor_config: bool,
        monitor: &Monitor,
        mode: &MonitorMode,
        output_index: usize,
        crtc_mode: &crate::monitor::CrtcMode,
    ) -> Result<(), ConfigError> {
        let output = &monitor.outputs[output_index];

        let crtc = find_unassigned_crtc(output, &self.update.crtc_assignments, &self.reserved_crtcs)
            .ok_or_else(|| ConfigError::NoCrtcAvailable(monitor.spec.clone()))?;

        let crtc_transform = monitor.logical_to_crtc_transform(logical.transform);
        let crtc_hw_transform = if self.backend.is_transform_handled(crtc, crtc_transform) {
            crtc_transform
        } else {
            Transform::Normal
        };

        let mut scale = logical.scale;
        if !self
            .backend
            .is_scale_supported(self.config.layout_mode, monitor, mode, scale)
        {
            scale = scale.round();
            if !self
                .backend
                .is_scale_supported(self.config.layout_mode, monitor, mode, scale)
            {
                scale = 1.0;
            }
        }

        let (crtc_x, crtc_y) = monitor.calculate_crtc_pos(output_index, crtc_transform);

        let x_offset = logical.layout.x as f64;
        let y_offset = logical.layout.y as f64;

        match self.config.layout_mode {
            LayoutMode::Logical => scale = logical.scale,
            LayoutMode::Physical => scale = 1.0,
            // Keep the resolved scale.
            LayoutMode::GlobalUiLogical => (),
        }

        let (width, height) = if crtc_transform.is_rotated() {
            (crtc_mode.height as f64 / scale, crtc_mode.width as f64 / scale)
        } else {
            (crtc_mode.width as f64 / scale, crtc_mode.height as f64 / scale)
        };

        let layout = RectF::new(
            x_offset + crtc_x as f64 / scale,
            y_offset + crtc_y as f64 / scale,
            width,
            height,
        );

        // Only one output may be primary, so only the main output of the
        // first monitor of a primary logical monitor gets the flag.
        let assign_output_as_primary = logical.is_primary
            && is_first_monitor_config
            && monitor.main_output().id == output.id;

        self.update.crtc_assignments.push(CrtcAssignment {
            crtc,
            mode: crtc_mode.clone(),
            layout,
            transform: crtc_hw_transform,
            scale,
            outputs: vec![output.id],
        });
        self.update.output_assignments.push(OutputAssignment {
            output: output.id,
            is_primary: assign_output_as_primary,
            is_presentation: logical.is_presentation,
            is_underscanning: monitor_config.enable_underscanning,
        });

        Ok(())
    }

    fn assign_monitor_crtcs(
        &mut self,
        logical: &LogicalMonitorConfig,
        monitor_config: &MonitorConfig,
        is_first_monitor_config: bool,
    ) -> Result<(), ConfigError> {
        let monitor = self
            .backend
            .monitor_from_spec(&monitor_config.monitor_spec)
            .ok_or_else(|| ConfigError::MonitorNotFound(monitor_config.monitor_spec.clone()))?;

        let mode = monitor
            .mode_from_spec(&monitor_config.mode_spec)
            .ok_or_else(|| ConfigError::ModeNotFound {
                monitor: monitor_config.monitor_spec.clone(),
                mode: monitor_config.mode_spec.clone(),
            })?;

        for (output_index, crtc_mode) in mode.crtc_modes.iter().enumerate() {
            // Outputs without a CRTC mode do not take part in this monitor
            // mode (tiled monitors running a smaller mode).
            let Some(crtc_mode) = crtc_mode else {
                continue;
            };
            self.assign_monitor_crtc(
                logical,
                monitor_config,
                is_first_monitor_config,
                monitor,
                mode,
                output_index,
                crtc_mode,
            )?;
        }

        Ok(())
    }
}

/// Computes the CRTC/output programming for a config against the current
/// inventory. Does not touch the backend's mode-setting path.
pub fn assign(
    backend: &dyn DisplayBackend,
    config: &MonitorsConfig,
) -> Result<ConfigUpdate, ConfigError> {
    // CRTCs currently driving outputs of configured monitors are reserved
    // so unrelated outputs are not needlessly reassigned.
    let mut reserved_crtcs = Vec::new();
    for logical in &config.logical_monitor_configs {
        for monitor_config in &logical.monitor_configs {
            let Some(monitor) = backend.monitor_from_spec(&monitor_config.monitor_spec)
            else {
                continue;
            };
            for output in &monitor.outputs {
                if let Some(crtc) = output.assigned_crtc {
                    reserved_crtcs.push(crtc);
                }
            }
        }
    }

    let mut pass = AssignmentPass {
        backend,
        config,
        reserved_crtcs,
        update: ConfigUpdate::default(),
    };

    for logical in &config.logical_monitor_configs {
        for (index, monitor_config) in logical.monitor_configs.iter().enumerate() {
            pass.assign_monitor_crtcs(logical, monitor_config, index == 0)?;
        }
    }

    debug!(
        crtcs = pass.update.crtc_assignments.len(),
        outputs = pass.update.output_assignments.len(),
        "assigned config"
    );
    Ok(pass.update)
}
