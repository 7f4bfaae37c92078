//! Config generators.
//!
//! Each generator synthesizes a [`MonitorsConfig`] from the current
//! inventory (plus, for the rotation and layout variants, a prior config),
//! returning `None` when no usable monitor exists or the shape does not
//! apply. Generators never touch the backend's mode-setting path; the
//! manager validates and applies whatever they produce.

use std::rc::Rc;

use bitflags::bitflags;
use tracing::warn;

use crate::backend::{BackendCapabilities, DisplayBackend};
use crate::config::{
    ConfigFlags, LayoutMode, LogicalMonitorConfig, MonitorConfig, MonitorsConfig,
    SwitchConfig,
};
use crate::geometry::Rect;
use crate::monitor::{Monitor, MonitorMode, Transform};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct MonitorMatchRule: u32 {
        const EXTERNAL = 1 << 0;
        const BUILTIN = 1 << 1;
        const PRIMARY = 1 << 2;
        const VISIBLE = 1 << 3;
        const WITH_POSITION = 1 << 4;
    }
}

fn laptop_panel(backend: &dyn DisplayBackend) -> Option<&Monitor> {
    backend.monitors().iter().find(|monitor| monitor.is_builtin)
}

fn find_monitor_with_highest_preferred_resolution(
    backend: &dyn DisplayBackend,
    match_rule: MonitorMatchRule,
) -> Option<&Monitor> {
    let mut largest_area = 0;
    let mut largest_monitor = None;
    for monitor in backend.monitors() {
        if match_rule.contains(MonitorMatchRule::EXTERNAL) && monitor.is_builtin {
            continue;
        }

        let spec = &monitor.preferred_mode().spec;
        let area = spec.width * spec.height;
        if area > largest_area {
            largest_area = area;
            largest_monitor = Some(monitor);
        }
    }
    largest_monitor
}

/// The monitor a generated layout should center on. Prefers the
/// hardware-reported primary, then the laptop panel, then the largest
/// preferred resolution; a closed lid demotes the panel to last resort.
pub fn find_primary_monitor(backend: &dyn DisplayBackend) -> Option<&Monitor> {
    if backend.is_lid_closed() {
        if let Some(primary) = backend.monitors().iter().find(|m| m.is_primary) {
            if !primary.is_builtin {
                return Some(primary);
            }
        }

        find_monitor_with_highest_preferred_resolution(backend, MonitorMatchRule::EXTERNAL)
            .or_else(|| {
                find_monitor_with_highest_preferred_resolution(
                    backend,
                    MonitorMatchRule::empty(),
                )
            })
    } else {
        backend
            .monitors()
            .iter()
            .find(|monitor| monitor.is_primary)
            .or_else(|| laptop_panel(backend))
            .or_else(|| {
                find_monitor_with_highest_preferred_resolution(
                    backend,
                    MonitorMatchRule::empty(),
                )
            })
    }
}

fn create_monitor_config(monitor: &Monitor, mode: &MonitorMode) -> MonitorConfig {
    MonitorConfig {
        monitor_spec: monitor.spec.clone(),
        mode_spec: mode.spec.clone(),
        enable_underscanning: monitor.is_underscanning,
    }
}

/// Builtin panels follow the accelerometer; everything else stays normal.
fn get_monitor_transform(backend: &dyn DisplayBackend, monitor: &Monitor) -> Transform {
    if monitor.is_builtin {
        backend.orientation_transform()
    } else {
        Transform::Normal
    }
}

/// The largest preferred-mode scale among matching monitors, floored at 1.
/// Feeds the global UI scale under [`LayoutMode::GlobalUiLogical`].
fn preferred_max_scale(
    backend: &dyn DisplayBackend,
    layout_mode: LayoutMode,
    match_rule: MonitorMatchRule,
) -> f64 {
    let mut scale: f64 = 1.0;
    for monitor in backend.monitors() {
        if match_rule.contains(MonitorMatchRule::PRIMARY) && !monitor.is_primary {
            continue;
        }
        if match_rule.contains(MonitorMatchRule::BUILTIN) {
            if !monitor.is_builtin {
                continue;
            }
        } else if match_rule.contains(MonitorMatchRule::EXTERNAL) && monitor.is_builtin {
            continue;
        }
        if match_rule.contains(MonitorMatchRule::VISIBLE)
            && monitor.is_builtin
            && backend.is_lid_closed()
        {
            continue;
        }
        if match_rule.contains(MonitorMatchRule::WITH_POSITION)
            && monitor.suggested_position.is_none()
        {
            continue;
        }

        let mode = monitor.preferred_mode();
        scale = scale.max(backend.calculate_monitor_mode_scale(layout_mode, monitor, mode));
    }
    scale
}

/// One monitor at its preferred mode, placed at (x, y). When the hardware
/// requires a global scale, secondary monitors inherit the primary's scale.
fn create_preferred_logical_monitor_config(
    backend: &dyn DisplayBackend,
    monitor: &Monitor,
    x: i32,
    y: i32,
    max_scale: f64,
    primary_config: Option<&LogicalMonitorConfig>,
    layout_mode: LayoutMode,
) -> LogicalMonitorConfig {
    let mode = monitor.preferred_mode();
    let mut width = mode.spec.width;
    let mut height = mode.spec.height;

    let scale = match primary_config {
        Some(primary)
            if backend
                .capabilities()
                .contains(BackendCapabilities::GLOBAL_SCALE_REQUIRED) =>
        {
            primary.scale
        }
        _ => backend.calculate_monitor_mode_scale(layout_mode, monitor, mode),
    };

    match layout_mode {
        LayoutMode::Logical => {
            width = (width as f64 / scale).round() as i32;
            height = (height as f64 / scale).round() as i32;
        }
        LayoutMode::GlobalUiLogical => {
            let ui_scale = scale / max_scale.ceil();
            width = (width as f64 / ui_scale).round() as i32;
            height = (height as f64 / ui_scale).round() as i32;
        }
        LayoutMode::Physical => (),
    }

    let transform = get_monitor_transform(backend, monitor);
    if transform.is_rotated() {
        std::mem::swap(&mut width, &mut height);
    }

    LogicalMonitorConfig {
        layout: Rect::new(x, y, width, height),
        scale,
        transform,
        is_primary: false,
        is_presentation: false,
        monitor_configs: vec![create_monitor_config(monitor, mode)],
    }
}

/// Primary monitor at (0, 0), every other monitor appended to the right,
/// each at its preferred mode. A closed lid leaves the panel out.
pub fn create_linear(backend: &dyn DisplayBackend) -> Option<Rc<MonitorsConfig>> {
    let primary_monitor = find_primary_monitor(backend)?;

    let layout_mode = backend.default_layout_mode();
    let max_scale = if layout_mode == LayoutMode::GlobalUiLogical {
        preferred_max_scale(backend, layout_mode, MonitorMatchRule::VISIBLE)
    } else {
        1.0
    };

    let mut primary_config = create_preferred_logical_monitor_config(
        backend,
        primary_monitor,
        0,
        0,
        max_scale,
        None,
        layout_mode,
    );
    primary_config.is_primary = true;

    let mut x = primary_config.layout.width;
    let mut logical_monitor_configs = vec![primary_config];
    for monitor in backend.monitors() {
        if monitor.spec == primary_monitor.spec {
            continue;
        }
        if monitor.is_builtin && backend.is_lid_closed() {
            continue;
        }

        let logical = create_preferred_logical_monitor_config(
            backend,
            monitor,
            x,
            0,
            max_scale,
            Some(&logical_monitor_configs[0]),
            layout_mode,
        );
        x += logical.layout.width;
        logical_monitor_configs.push(logical);
    }

    Some(MonitorsConfig::new(
        logical_monitor_configs,
        vec![],
        layout_mode,
        ConfigFlags::empty(),
    ))
}

/// The primary monitor alone. Last resort before giving up entirely.
pub fn create_fallback(backend: &dyn DisplayBackend) -> Option<Rc<MonitorsConfig>> {
    let primary_monitor = find_primary_monitor(backend)?;

    let layout_mode = backend.default_layout_mode();
    let max_scale = if layout_mode == LayoutMode::GlobalUiLogical {
        preferred_max_scale(backend, layout_mode, MonitorMatchRule::PRIMARY)
    } else {
        1.0
    };

    let mut primary_config = create_preferred_logical_monitor_config(
        backend,
        primary_monitor,
        0,
        0,
        max_scale,
        None,
        layout_mode,
    );
    primary_config.is_primary = true;

    Some(MonitorsConfig::new(
        vec![primary_config],
        vec![],
        layout_mode,
        ConfigFlags::empty(),
    ))
}

/// A layout from hardware-reported suggested positions (docking stations
/// report these). Rejected when the result overlaps or is disconnected.
pub fn create_suggested(backend: &dyn DisplayBackend) -> Option<Rc<MonitorsConfig>> {
    let primary_monitor = find_primary_monitor(backend)?;
    let (x, y) = primary_monitor.suggested_position?;

    let layout_mode = backend.default_layout_mode();
    let max_scale = if layout_mode == LayoutMode::GlobalUiLogical {
        preferred_max_scale(backend, layout_mode, MonitorMatchRule::WITH_POSITION)
    } else {
        1.0
    };

    let mut primary_config = create_preferred_logical_monitor_config(
        backend,
        primary_monitor,
        x,
        y,
        max_scale,
        None,
        layout_mode,
    );
    primary_config.is_primary = true;

    let mut region = vec![primary_config.layout];
    let mut logical_monitor_configs = vec![primary_config];
    for monitor in backend.monitors() {
        if monitor.spec == primary_monitor.spec {
            continue;
        }
        let Some((x, y)) = monitor.suggested_position else {
            continue;
        };

        let logical = create_preferred_logical_monitor_config(
            backend,
            monitor,
            x,
            y,
            max_scale,
            Some(&logical_monitor_configs[0]),
            layout_mode,
        );

        if logical.layout.overlaps_region(&region) {
            warn!("suggested monitor config has overlapping region, rejecting");
            return None;
        }

        region.push(logical.layout);
        logical_monitor_configs.push(logical);
    }

    if region.len() > 1 {
        for rect in &region {
            if !rect.has_adjacent_in_region(&region) {
                warn!("suggested monitor config has monitors with no neighbors, rejecting");
                return None;
            }
        }
    }

    Some(MonitorsConfig::new(
        logical_monitor_configs,
        vec![],
        layout_mode,
        ConfigFlags::empty(),
    ))
}

/// Derives a new config from `current` by changing only the builtin panel's
/// transform. `rotate` steps one rotation further; otherwise `transform` is
/// an absolute panel-space orientation converted into logical space.
fn create_for_builtin_display_rotation(
    backend: &dyn DisplayBackend,
    current: &MonitorsConfig,
    rotate: bool,
    transform: Transform,
) -> Option<Rc<MonitorsConfig>> {
    let panel = laptop_panel(backend).filter(|panel| panel.is_active)?;
    let current_logical = current.solo_logical_config_for(&panel.spec)?;

    let transform = if rotate {
        current_logical.transform.next_rotation()
    } else {
        // An accelerometer transform applies to the CRTC as is; logical
        // configs are corrected for panel orientation on apply, so convert
        // here.
        panel.crtc_to_logical_transform(transform)
    };

    if current_logical.transform == transform {
        return None;
    }

    let mut logical_monitor_configs = current.logical_monitor_configs.clone();
    let logical = logical_monitor_configs
        .iter_mut()
        .find(|logical| {
            logical.monitor_configs.len() == 1
                && logical.monitor_configs[0].monitor_spec == panel.spec
        })?;

    if logical.transform.is_rotated() != transform.is_rotated() {
        std::mem::swap(&mut logical.layout.width, &mut logical.layout.height);
    }
    logical.transform = transform;

    Some(MonitorsConfig::new(
        logical_monitor_configs,
        current.disabled_monitor_specs.clone(),
        current.layout_mode,
        ConfigFlags::empty(),
    ))
}

/// Snaps the builtin panel to an absolute accelerometer orientation.
pub fn create_for_orientation(
    backend: &dyn DisplayBackend,
    current: &MonitorsConfig,
    transform: Transform,
) -> Option<Rc<MonitorsConfig>> {
    create_for_builtin_display_rotation(backend, current, false, transform)
}

/// Rotates the builtin panel by another 90 degrees.
pub fn create_for_rotate_monitor(
    backend: &dyn DisplayBackend,
    current: &MonitorsConfig,
) -> Option<Rc<MonitorsConfig>> {
    create_for_builtin_display_rotation(backend, current, true, Transform::Normal)
}

/// Re-expresses a config in another layout mode, re-deriving sizes and
/// rounding scales to integers when moving to physical coordinates.
pub fn create_for_layout(
    config: &Rc<MonitorsConfig>,
    layout_mode: LayoutMode,
) -> Rc<MonitorsConfig> {
    if config.layout_mode == layout_mode {
        return config.clone();
    }

    let mut logical_monitor_configs = config.logical_monitor_configs.clone();
    if layout_mode == LayoutMode::Physical {
        for logical in &mut logical_monitor_configs {
            logical.scale = logical.scale.round();
        }
    }

    let max_scale = crate::config::max_scale(&logical_monitor_configs);
    for logical in &mut logical_monitor_configs {
        let mode_spec = &logical.monitor_configs[0].mode_spec;
        let (width, height) = crate::config::derive_logical_monitor_size(
            mode_spec.width,
            mode_spec.height,
            logical.transform,
            logical.scale,
            layout_mode,
            max_scale,
        );
        logical.layout.width = width;
        logical.layout.height = height;
    }

    MonitorsConfig::new(
        logical_monitor_configs,
        config.disabled_monitor_specs.clone(),
        layout_mode,
        ConfigFlags::empty(),
    )
}

/// Every monitor mirrored into one logical monitor at the largest mode size
/// they all share; `None` when no common size exists.
fn create_for_switch_config_all_mirror(
    backend: &dyn DisplayBackend,
) -> Option<Rc<MonitorsConfig>> {
    let monitors = backend.monitors();
    let (first, rest) = monitors.split_first()?;

    let mut common_size = (0, 0);
    for mode in &first.modes {
        let size = (mode.spec.width, mode.spec.height);
        let shared_by_all = rest.iter().all(|other| {
            other
                .modes
                .iter()
                .any(|m| (m.spec.width, m.spec.height) == size)
        });
        if shared_by_all && common_size.0 * common_size.1 < size.0 * size.1 {
            common_size = size;
        }
    }
    if common_size == (0, 0) {
        return None;
    }

    let mut best_scale: f64 = 1.0;
    let mut monitor_configs = Vec::new();
    for monitor in monitors {
        let Some(mode) = monitor
            .modes
            .iter()
            .find(|mode| (mode.spec.width, mode.spec.height) == common_size)
        else {
            continue;
        };

        let scale = backend.calculate_monitor_mode_scale(
            backend.default_layout_mode(),
            monitor,
            mode,
        );
        best_scale = best_scale.max(scale);
        monitor_configs.push(create_monitor_config(monitor, mode));
    }

    let logical = LogicalMonitorConfig {
        layout: Rect::new(0, 0, common_size.0, common_size.1),
        scale: best_scale,
        transform: Transform::Normal,
        is_primary: true,
        is_presentation: false,
        monitor_configs,
    };

    Some(MonitorsConfig::new(
        vec![logical],
        vec![],
        backend.default_layout_mode(),
        ConfigFlags::empty(),
    ))
}

/// Linear layout restricted to external monitors.
fn create_for_switch_config_external(
    backend: &dyn DisplayBackend,
) -> Option<Rc<MonitorsConfig>> {
    let layout_mode = backend.default_layout_mode();
    let max_scale = if layout_mode == LayoutMode::GlobalUiLogical {
        preferred_max_scale(backend, layout_mode, MonitorMatchRule::EXTERNAL)
    } else {
        1.0
    };

    let mut x = 0;
    let mut logical_monitor_configs: Vec<LogicalMonitorConfig> = Vec::new();
    for monitor in backend.monitors() {
        if monitor.is_builtin {
            continue;
        }

        let mut logical = create_preferred_logical_monitor_config(
            backend,
            monitor,
            x,
            0,
            max_scale,
            None,
            layout_mode,
        );
        logical.is_primary = x == 0;
        x += logical.layout.width;
        logical_monitor_configs.push(logical);
    }

    if logical_monitor_configs.is_empty() {
        return None;
    }

    Some(MonitorsConfig::new(
        logical_monitor_configs,
        vec![],
        layout_mode,
        ConfigFlags::empty(),
    ))
}

/// The builtin panel alone.
fn create_for_switch_config_builtin(
    backend: &dyn DisplayBackend,
) -> Option<Rc<MonitorsConfig>> {
    let panel = laptop_panel(backend)?;

    let layout_mode = backend.default_layout_mode();
    let max_scale = if layout_mode == LayoutMode::GlobalUiLogical {
        preferred_max_scale(backend, layout_mode, MonitorMatchRule::BUILTIN)
    } else {
        1.0
    };

    let mut logical = create_preferred_logical_monitor_config(
        backend,
        panel,
        0,
        0,
        max_scale,
        None,
        layout_mode,
    );
    logical.is_primary = true;

    Some(MonitorsConfig::new(
        vec![logical],
        vec![],
        layout_mode,
        ConfigFlags::empty(),
    ))
}

/// Whether cycling through switch configs makes sense right now.
pub fn can_switch_config(backend: &dyn DisplayBackend) -> bool {
    !backend.is_lid_closed() && backend.monitors().len() > 1
}

/// One of the display-switcher presets, tagged with its kind.
pub fn create_for_switch_config(
    backend: &dyn DisplayBackend,
    config_type: SwitchConfig,
) -> Option<Rc<MonitorsConfig>> {
    if !can_switch_config(backend) {
        return None;
    }

    let config = match config_type {
        SwitchConfig::AllMirror => create_for_switch_config_all_mirror(backend),
        SwitchConfig::AllLinear => create_linear(backend),
        SwitchConfig::External => create_for_switch_config_external(backend),
        SwitchConfig::Builtin => create_for_switch_config_builtin(backend),
        SwitchConfig::Unknown => {
            warn!("unknown switch config type requested");
            None
        }
    }?;

    Some(config.with_switch_config(config_type))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::{add_mode, builtin_monitor, simple_monitor, TestBackend};

    fn laptop_and_external() -> TestBackend {
        let mut panel = builtin_monitor("eDP-1", 1, 1920, 1080);
        panel.is_primary = true;
        let external = simple_monitor("DP-1", 2, 1920, 1080);
        TestBackend::new(vec![panel, external])
    }

    #[test]
    fn linear_places_monitors_side_by_side() {
        let backend = laptop_and_external();
        let config = create_linear(&backend).unwrap();

        assert_eq!(config.logical_monitor_configs.len(), 2);
        let primary = &config.logical_monitor_configs[0];
        assert_eq!(primary.layout, Rect::new(0, 0, 1920, 1080));
        assert!(primary.is_primary);
        assert_eq!(primary.monitor_configs[0].monitor_spec.connector, "eDP-1");

        let second = &config.logical_monitor_configs[1];
        assert_eq!(second.layout, Rect::new(1920, 0, 1920, 1080));
        assert!(!second.is_primary);
    }

    #[test]
    fn linear_skips_closed_lid_panel() {
        let backend = laptop_and_external().with_lid_closed(true);
        let config = create_linear(&backend).unwrap();

        assert_eq!(config.logical_monitor_configs.len(), 1);
        let only = &config.logical_monitor_configs[0];
        assert_eq!(only.monitor_configs[0].monitor_spec.connector, "DP-1");
        assert_eq!(only.layout, Rect::new(0, 0, 1920, 1080));
        assert!(only.is_primary);
    }

    #[test]
    fn fallback_is_primary_alone() {
        let backend = laptop_and_external();
        let config = create_fallback(&backend).unwrap();

        assert_eq!(config.logical_monitor_configs.len(), 1);
        assert_eq!(
            config.logical_monitor_configs[0].monitor_configs[0]
                .monitor_spec
                .connector,
            "eDP-1"
        );
    }

    #[test]
    fn suggested_uses_reported_positions() {
        let mut backend = laptop_and_external();
        backend.monitors[0].suggested_position = Some((1920, 0));
        backend.monitors[1].suggested_position = Some((0, 0));

        let config = create_suggested(&backend).unwrap();
        assert_eq!(config.logical_monitor_configs.len(), 2);
        assert_eq!(
            config.logical_monitor_configs[0].layout,
            Rect::new(1920, 0, 1920, 1080)
        );
        assert_eq!(
            config.logical_monitor_configs[1].layout,
            Rect::new(0, 0, 1920, 1080)
        );
    }

    #[test]
    fn suggested_rejects_overlap_and_gaps() {
        let mut backend = laptop_and_external();
        backend.monitors[0].suggested_position = Some((0, 0));
        backend.monitors[1].suggested_position = Some((100, 0));
        assert!(create_suggested(&backend).is_none());

        backend.monitors[1].suggested_position = Some((5000, 0));
        assert!(create_suggested(&backend).is_none());

        backend.monitors[1].suggested_position = None;
        let config = create_suggested(&backend).unwrap();
        assert_eq!(config.logical_monitor_configs.len(), 1);
    }

    #[test]
    fn all_mirror_finds_largest_common_mode() {
        let mut panel = builtin_monitor("eDP-1", 1, 1920, 1080);
        add_mode(&mut panel, 10, 1280, 720, 60.0);
        let mut external = simple_monitor("DP-1", 2, 2560, 1440);
        add_mode(&mut external, 20, 1920, 1080, 60.0);
        add_mode(&mut external, 21, 1280, 720, 60.0);
        let backend = TestBackend::new(vec![panel, external]);

        let config =
            create_for_switch_config(&backend, SwitchConfig::AllMirror).unwrap();
        assert_eq!(config.switch_config, SwitchConfig::AllMirror);
        assert_eq!(config.logical_monitor_configs.len(), 1);
        let logical = &config.logical_monitor_configs[0];
        assert_eq!(logical.layout, Rect::new(0, 0, 1920, 1080));
        assert_eq!(logical.monitor_configs.len(), 2);
        assert!(logical.is_primary);
    }

    #[test]
    fn all_mirror_without_common_mode_fails() {
        let panel = builtin_monitor("eDP-1", 1, 1920, 1080);
        let external = simple_monitor("DP-1", 2, 2560, 1440);
        let backend = TestBackend::new(vec![panel, external]);

        assert!(create_for_switch_config(&backend, SwitchConfig::AllMirror).is_none());
    }

    #[test]
    fn switch_config_external_and_builtin() {
        let backend = laptop_and_external();

        let external =
            create_for_switch_config(&backend, SwitchConfig::External).unwrap();
        assert_eq!(external.logical_monitor_configs.len(), 1);
        assert_eq!(
            external.logical_monitor_configs[0].monitor_configs[0]
                .monitor_spec
                .connector,
            "DP-1"
        );

        let builtin =
            create_for_switch_config(&backend, SwitchConfig::Builtin).unwrap();
        assert_eq!(
            builtin.logical_monitor_configs[0].monitor_configs[0]
                .monitor_spec
                .connector,
            "eDP-1"
        );
    }

    #[test]
    fn no_switching_with_single_monitor_or_closed_lid() {
        let single = TestBackend::new(vec![simple_monitor("DP-1", 1, 1920, 1080)]);
        assert!(create_for_switch_config(&single, SwitchConfig::AllLinear).is_none());

        let closed = laptop_and_external().with_lid_closed(true);
        assert!(create_for_switch_config(&closed, SwitchConfig::AllLinear).is_none());
    }

    #[test]
    fn rotate_monitor_cycles_panel_transform() {
        let mut backend = laptop_and_external();
        backend.monitors[0].is_active = true;
        let current = create_linear(&backend).unwrap();

        let rotated = create_for_rotate_monitor(&backend, &current).unwrap();
        let panel_logical = rotated.solo_logical_config_for(&backend.monitors[0].spec);
        let panel_logical = panel_logical.unwrap();
        assert_eq!(panel_logical.transform, Transform::Rotate90);
        assert_eq!(panel_logical.layout.width, 1080);
        assert_eq!(panel_logical.layout.height, 1920);
    }

    #[test]
    fn orientation_noop_returns_none() {
        let mut backend = laptop_and_external();
        backend.monitors[0].is_active = true;
        let current = create_linear(&backend).unwrap();

        assert!(create_for_orientation(&backend, &current, Transform::Normal).is_none());

        let rotated =
            create_for_orientation(&backend, &current, Transform::Rotate90).unwrap();
        let panel_logical = rotated
            .solo_logical_config_for(&backend.monitors[0].spec)
            .unwrap();
        assert_eq!(panel_logical.transform, Transform::Rotate90);
    }

    #[test]
    fn global_ui_logical_sizing_uses_ceiled_max_scale() {
        use crate::verify::verify_monitors_config;

        let backend = TestBackend::new(vec![
            simple_monitor("DP-1", 1, 3840, 2160),
            simple_monitor("HDMI-1", 2, 1920, 1080),
        ])
        .with_layout_mode(LayoutMode::GlobalUiLogical)
        .with_mode_scale("DP-1", 1.5);

        let config = create_linear(&backend).unwrap();
        assert_eq!(config.layout_mode, LayoutMode::GlobalUiLogical);

        // The 1.5 maximum scale rounds up to a global UI scale of 2, so
        // every size is mode * 2 / scale.
        let primary = &config.logical_monitor_configs[0];
        assert_eq!(primary.scale, 1.5);
        assert_eq!(primary.layout, Rect::new(0, 0, 5120, 2880));

        let second = &config.logical_monitor_configs[1];
        assert_eq!(second.scale, 1.0);
        assert_eq!(second.layout, Rect::new(5120, 0, 3840, 2160));

        verify_monitors_config(&config, BackendCapabilities::empty()).unwrap();
    }

    #[test]
    fn layout_conversion_rounds_scale_for_physical() {
        let backend = TestBackend::new(vec![simple_monitor("DP-1", 1, 3840, 2160)])
            .with_supported_scales(vec![1.0, 1.5, 2.0])
            .with_mode_scale("DP-1", 1.5);

        let config = create_linear(&backend).unwrap();
        assert_eq!(config.logical_monitor_configs[0].scale, 1.5);
        assert_eq!(
            config.logical_monitor_configs[0].layout,
            Rect::new(0, 0, 2560, 1440)
        );

        let physical = create_for_layout(&config, LayoutMode::Physical);
        assert_eq!(physical.layout_mode, LayoutMode::Physical);
        assert_eq!(physical.logical_monitor_configs[0].scale, 2.0);
        assert_eq!(
            physical.logical_monitor_configs[0].layout,
            Rect::new(0, 0, 3840, 2160)
        );
    }
}
