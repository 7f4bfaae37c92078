//! Structural validation of candidate configurations.
//!
//! These checks run before any configuration reaches assignment or the
//! backend. They are pure; everything hardware-dependent (does the monitor
//! exist, is the scale supported) lives in the manager's applicability
//! check instead.

use crate::backend::BackendCapabilities;
use crate::config::{
    LayoutMode, LogicalMonitorConfig, MonitorConfig, MonitorsConfig,
};
use crate::error::ConfigError;
use crate::geometry::Rect;
use crate::monitor::{MonitorModeSpec, MonitorSpec};

pub fn verify_monitor_mode_spec(spec: &MonitorModeSpec) -> Result<(), ConfigError> {
    if spec.width > 0 && spec.height > 0 && spec.refresh_rate > 0. {
        Ok(())
    } else {
        Err(ConfigError::Invalid("monitor mode invalid".to_owned()))
    }
}

pub fn verify_monitor_spec(spec: &MonitorSpec) -> Result<(), ConfigError> {
    if !spec.connector.is_empty()
        && !spec.vendor.is_empty()
        && !spec.product.is_empty()
        && !spec.serial.is_empty()
    {
        Ok(())
    } else {
        Err(ConfigError::Invalid("monitor spec incomplete".to_owned()))
    }
}

pub fn verify_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    verify_monitor_spec(&config.monitor_spec)?;
    verify_monitor_mode_spec(&config.mode_spec)
}

/// Checks one logical monitor: sane position, at least one monitor, and a
/// layout size that corresponds to every member's mode size once scale,
/// layout mode and rotation are undone.
pub fn verify_logical_monitor_config(
    logical: &LogicalMonitorConfig,
    layout_mode: LayoutMode,
    max_scale: f64,
) -> Result<(), ConfigError> {
    if logical.layout.x < 0 || logical.layout.y < 0 {
        return Err(ConfigError::Invalid(format!(
            "invalid logical monitor position ({}, {})",
            logical.layout.x, logical.layout.y
        )));
    }

    if logical.monitor_configs.is_empty() {
        return Err(ConfigError::Invalid("logical monitor is empty".to_owned()));
    }

    let (mut expected_width, mut expected_height) = if logical.transform.is_rotated() {
        (logical.layout.height, logical.layout.width)
    } else {
        (logical.layout.width, logical.layout.height)
    };

    match layout_mode {
        LayoutMode::GlobalUiLogical => {
            expected_width /= max_scale.ceil() as i32;
            expected_height /= max_scale.ceil() as i32;
            expected_width = (expected_width as f64 * logical.scale).round() as i32;
            expected_height = (expected_height as f64 * logical.scale).round() as i32;
        }
        LayoutMode::Logical => {
            expected_width = (expected_width as f64 * logical.scale).round() as i32;
            expected_height = (expected_height as f64 * logical.scale).round() as i32;
        }
        LayoutMode::Physical => (),
    }

    for monitor_config in &logical.monitor_configs {
        verify_monitor_config(monitor_config)?;

        if monitor_config.mode_spec.width != expected_width
            || monitor_config.mode_spec.height != expected_height
        {
            return Err(ConfigError::Invalid(
                "monitor modes in logical monitor conflict".to_owned(),
            ));
        }
    }

    Ok(())
}

fn has_adjacent_neighbor(config: &MonitorsConfig, logical: &LogicalMonitorConfig) -> bool {
    if config.logical_monitor_configs.len() == 1 {
        return true;
    }

    config
        .logical_monitor_configs
        .iter()
        .filter(|other| !std::ptr::eq(*other, logical))
        .any(|other| logical.layout.is_adjacent_to(&other.layout))
}

/// Checks a whole config: non-empty, consistent scales where the hardware
/// demands one global scale, no overlaps, a single primary, a connected
/// region anchored at (0, 0), and no monitor both enabled and disabled.
pub fn verify_monitors_config(
    config: &MonitorsConfig,
    capabilities: BackendCapabilities,
) -> Result<(), ConfigError> {
    if config.logical_monitor_configs.is_empty() {
        return Err(ConfigError::Invalid("monitors config incomplete".to_owned()));
    }

    let global_scale_required =
        capabilities.contains(BackendCapabilities::GLOBAL_SCALE_REQUIRED);

    let max_scale = crate::config::max_scale(&config.logical_monitor_configs);

    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut has_primary = false;
    let mut region: Vec<Rect> = Vec::new();
    let mut prev_scale = None;
    for logical in &config.logical_monitor_configs {
        verify_logical_monitor_config(logical, config.layout_mode, max_scale)?;

        if global_scale_required {
            if prev_scale.is_some_and(|scale: f64| scale != logical.scale) {
                return Err(ConfigError::Invalid(
                    "logical monitor scales must be identical".to_owned(),
                ));
            }
            prev_scale = Some(logical.scale);
        }

        if logical.layout.overlaps_region(&region) {
            return Err(ConfigError::Conflict("logical monitors overlap".to_owned()));
        }

        if logical.is_primary {
            if has_primary {
                return Err(ConfigError::Conflict(
                    "config contains multiple primary logical monitors".to_owned(),
                ));
            }
            has_primary = true;
        }

        if !has_adjacent_neighbor(config, logical) {
            return Err(ConfigError::Conflict(
                "logical monitors not adjacent".to_owned(),
            ));
        }

        min_x = min_x.min(logical.layout.x);
        min_y = min_y.min(logical.layout.y);
        region.push(logical.layout);
    }

    for spec in &config.disabled_monitor_specs {
        if config.monitor_config_for(spec).is_some() {
            return Err(ConfigError::Conflict(
                "assigned monitor explicitly disabled".to_owned(),
            ));
        }
    }

    if min_x != 0 || min_y != 0 {
        return Err(ConfigError::Invalid(
            "logical monitors positions are offset".to_owned(),
        ));
    }

    if !has_primary {
        return Err(ConfigError::Invalid(
            "config is missing primary logical".to_owned(),
        ));
    }

    Ok(())
}
