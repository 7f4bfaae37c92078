//! On-disk representation of stored monitor configurations.
//!
//! Configs persist as a KDL document with a versioned `monitors` root node:
//!
//! ```kdl
//! monitors version=2 {
//!     configuration {
//!         layout-mode "logical"
//!         logicalmonitor {
//!             x 0
//!             y 0
//!             scale 1.0
//!             primary
//!             transform rotation="left"
//!             monitor {
//!                 monitorspec connector="DP-1" vendor="DEL" \
//!                     product="U2720Q" serial="0x1234"
//!                 mode width=3840 height=2160 rate=59.997
//!             }
//!         }
//!         disabled {
//!             monitorspec connector="eDP-1" vendor="AUO" \
//!                 product="0x1234" serial="0x0000"
//!         }
//!     }
//! }
//! ```
//!
//! Version 1 documents use the pre-logical-monitor layout and are not
//! parsed here; loading one yields [`ConfigError::NeedsMigration`].

use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::{
    derive_logical_monitor_size, max_scale, ConfigFlags, LayoutMode, LogicalMonitorConfig,
    MonitorConfig, MonitorsConfig, PENDING_MIGRATION_SCALE,
};
use crate::backend::BackendCapabilities;
use crate::error::ConfigError;
use crate::geometry::Rect;
use crate::monitor::{ModeFlags, MonitorModeSpec, MonitorSpec, Transform};
use crate::verify::verify_monitors_config;

pub const FORMAT_VERSION: u32 = 2;

#[derive(knuffel::Decode)]
struct DocumentRoot {
    #[knuffel(child)]
    monitors: MonitorsNode,
}

#[derive(knuffel::Decode)]
struct MonitorsNode {
    #[knuffel(property)]
    #[allow(dead_code)] // checked by the version probe before parsing
    version: u32,
    #[knuffel(children(name = "configuration"))]
    configurations: Vec<ConfigurationNode>,
}

#[derive(knuffel::Decode)]
struct ConfigurationNode {
    #[knuffel(child)]
    migrated: bool,
    #[knuffel(child, unwrap(argument))]
    layout_mode: Option<String>,
    #[knuffel(children(name = "logicalmonitor"))]
    logical_monitors: Vec<LogicalMonitorNode>,
    #[knuffel(child)]
    disabled: Option<DisabledNode>,
}

#[derive(knuffel::Decode)]
struct LogicalMonitorNode {
    #[knuffel(child, unwrap(argument))]
    x: i32,
    #[knuffel(child, unwrap(argument))]
    y: i32,
    #[knuffel(child, unwrap(argument))]
    scale: Option<f64>,
    #[knuffel(child)]
    primary: bool,
    #[knuffel(child)]
    presentation: bool,
    #[knuffel(child)]
    transform: Option<TransformNode>,
    #[knuffel(children(name = "monitor"))]
    monitors: Vec<MonitorNode>,
}

#[derive(knuffel::Decode)]
struct TransformNode {
    #[knuffel(property)]
    rotation: String,
    #[knuffel(property, default)]
    flipped: bool,
}

#[derive(knuffel::Decode)]
struct MonitorNode {
    #[knuffel(child)]
    monitorspec: MonitorSpecNode,
    #[knuffel(child)]
    mode: ModeNode,
    #[knuffel(child)]
    underscanning: bool,
}

#[derive(knuffel::Decode)]
struct MonitorSpecNode {
    #[knuffel(property)]
    connector: String,
    #[knuffel(property)]
    vendor: String,
    #[knuffel(property)]
    product: String,
    #[knuffel(property)]
    serial: String,
}

#[derive(knuffel::Decode)]
struct ModeNode {
    #[knuffel(property)]
    width: i32,
    #[knuffel(property)]
    height: i32,
    #[knuffel(property)]
    rate: f64,
    #[knuffel(property, default)]
    interlace: bool,
}

#[derive(knuffel::Decode)]
struct DisabledNode {
    #[knuffel(children(name = "monitorspec"))]
    specs: Vec<MonitorSpecNode>,
}

static VERSION_PROBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*monitors\b[^\r\n{]*\bversion=(\d+)").unwrap()
});

/// Parses a stored document into configs. `name` is the file name for
/// diagnostics; `base_flags` is merged into every parsed config.
///
/// Configurations that fail structural validation are dropped with a
/// warning instead of failing the whole document; migrated ones are
/// exempt until their scales are resolved against the hardware.
pub fn parse_configs(
    name: &str,
    text: &str,
    base_flags: ConfigFlags,
) -> Result<Vec<Rc<MonitorsConfig>>, ConfigError> {
    // Probe the version before handing the document to the full parser so
    // legacy files fail with a migration error, not a syntax error.
    let version = VERSION_PROBE
        .captures(text)
        .and_then(|captures| captures[1].parse::<u32>().ok())
        .ok_or_else(|| {
            ConfigError::Parse(format!("{name}: missing monitors version"))
        })?;
    if version != FORMAT_VERSION {
        return Err(ConfigError::NeedsMigration(version));
    }

    let root = knuffel::parse::<DocumentRoot>(name, text).map_err(|err| {
        ConfigError::Parse(format!("{:?}", miette::Report::new(err)))
    })?;

    let mut configs = Vec::new();
    for node in root.monitors.configurations {
        let config = config_from_node(name, node, base_flags)?;
        if !config.flags.contains(ConfigFlags::MIGRATED) {
            if let Err(err) =
                verify_monitors_config(&config, BackendCapabilities::empty())
            {
                warn!("{name}: dropping invalid stored configuration: {err}");
                continue;
            }
        }
        configs.push(config);
    }
    Ok(configs)
}

fn config_from_node(
    name: &str,
    node: ConfigurationNode,
    base_flags: ConfigFlags,
) -> Result<Rc<MonitorsConfig>, ConfigError> {
    let mut flags = base_flags;
    if node.migrated {
        flags |= ConfigFlags::MIGRATED;
    }

    // Migrated configs predate per-monitor scaling, so their coordinates
    // are in device pixels.
    let layout_mode = if node.migrated {
        LayoutMode::Physical
    } else {
        match node.layout_mode.as_deref() {
            None | Some("logical") => LayoutMode::Logical,
            Some("physical") => LayoutMode::Physical,
            Some("global-ui-logical") => LayoutMode::GlobalUiLogical,
            Some(other) => {
                return Err(ConfigError::Parse(format!(
                    "{name}: unknown layout mode \"{other}\""
                )));
            }
        }
    };

    if node.logical_monitors.is_empty() {
        return Err(ConfigError::Parse(format!(
            "{name}: configuration without any logical monitor"
        )));
    }

    let mut logical_monitor_configs = node
        .logical_monitors
        .into_iter()
        .map(|logical| logical_from_node(name, logical, node.migrated))
        .collect::<Result<Vec<_>, _>>()?;

    // The document only stores positions; sizes are a function of mode,
    // transform, scale and layout mode.
    let max_scale = max_scale(&logical_monitor_configs);
    for logical in &mut logical_monitor_configs {
        let mode_spec = &logical.monitor_configs[0].mode_spec;
        if logical.monitor_configs.iter().any(|config| {
            config.mode_spec.width != mode_spec.width
                || config.mode_spec.height != mode_spec.height
        }) {
            return Err(ConfigError::Parse(format!(
                "{name}: monitors in logical monitor have incompatible modes"
            )));
        }

        let (width, height) = derive_logical_monitor_size(
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

    let disabled_monitor_specs = node
        .disabled
        .map(|disabled| disabled.specs.into_iter().map(spec_from_node).collect())
        .unwrap_or_default();

    Ok(MonitorsConfig::new(
        logical_monitor_configs,
        disabled_monitor_specs,
        layout_mode,
        flags,
    ))
}

fn logical_from_node(
    name: &str,
    node: LogicalMonitorNode,
    migrated: bool,
) -> Result<LogicalMonitorConfig, ConfigError> {
    // Migrated configs carry a placeholder scale until it is derived
    // against the hardware. A missing or zero scale means the
    // pre-fractional-scaling default of 1.
    let scale = if migrated {
        PENDING_MIGRATION_SCALE
    } else {
        match node.scale {
            None => 1.0,
            Some(scale) if scale == 0. => 1.0,
            Some(scale) if scale > 0. => scale,
            Some(scale) => {
                return Err(ConfigError::Parse(format!(
                    "{name}: negative scale {scale}"
                )));
            }
        }
    };
    if node.monitors.is_empty() {
        return Err(ConfigError::Parse(format!(
            "{name}: logical monitor without any monitor"
        )));
    }

    let transform = match node.transform {
        None => Transform::Normal,
        Some(transform) => {
            match (transform.rotation.as_str(), transform.flipped) {
                ("normal", false) => Transform::Normal,
                ("left", false) => Transform::Rotate90,
                ("upside_down", false) => Transform::Rotate180,
                ("right", false) => Transform::Rotate270,
                ("normal", true) => Transform::Flipped,
                ("left", true) => Transform::Flipped90,
                ("upside_down", true) => Transform::Flipped180,
                ("right", true) => Transform::Flipped270,
                (other, _) => {
                    return Err(ConfigError::Parse(format!(
                        "{name}: unknown rotation \"{other}\""
                    )));
                }
            }
        }
    };

    let monitor_configs = node
        .monitors
        .into_iter()
        .map(|monitor| MonitorConfig {
            monitor_spec: spec_from_node(monitor.monitorspec),
            mode_spec: MonitorModeSpec {
                width: monitor.mode.width,
                height: monitor.mode.height,
                refresh_rate: monitor.mode.rate,
                flags: if monitor.mode.interlace {
                    ModeFlags::INTERLACE
                } else {
                    ModeFlags::empty()
                },
            },
            enable_underscanning: monitor.underscanning,
        })
        .collect();

    Ok(LogicalMonitorConfig {
        layout: Rect::new(node.x, node.y, 0, 0),
        scale,
        transform,
        is_primary: node.primary,
        is_presentation: node.presentation,
        monitor_configs,
    })
}

fn spec_from_node(node: MonitorSpecNode) -> MonitorSpec {
    MonitorSpec {
        connector: node.connector,
        vendor: node.vendor,
        product: node.product,
        serial: node.serial,
    }
}

// ===== Serialization ========================================================

fn kdl_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn rotation_name(transform: Transform) -> &'static str {
    match transform {
        Transform::Normal | Transform::Flipped => "normal",
        Transform::Rotate90 | Transform::Flipped90 => "left",
        Transform::Rotate180 | Transform::Flipped180 => "upside_down",
        Transform::Rotate270 | Transform::Flipped270 => "right",
    }
}

fn layout_mode_name(layout_mode: LayoutMode) -> &'static str {
    match layout_mode {
        LayoutMode::Logical => "logical",
        LayoutMode::Physical => "physical",
        LayoutMode::GlobalUiLogical => "global-ui-logical",
    }
}

fn append_spec(out: &mut String, indent: &str, spec: &MonitorSpec) {
    out.push_str(indent);
    out.push_str(&format!(
        "monitorspec connector={} vendor={} product={} serial={}\n",
        kdl_string(&spec.connector),
        kdl_string(&spec.vendor),
        kdl_string(&spec.product),
        kdl_string(&spec.serial),
    ));
}

fn append_logical(out: &mut String, logical: &LogicalMonitorConfig) {
    out.push_str("        logicalmonitor {\n");
    out.push_str(&format!("            x {}\n", logical.layout.x));
    out.push_str(&format!("            y {}\n", logical.layout.y));
    out.push_str(&format!("            scale {:?}\n", logical.scale));
    if logical.is_primary {
        out.push_str("            primary\n");
    }
    if logical.is_presentation {
        out.push_str("            presentation\n");
    }
    if logical.transform != Transform::Normal {
        out.push_str(&format!(
            "            transform rotation=\"{}\"",
            rotation_name(logical.transform)
        ));
        if logical.transform.is_flipped() {
            out.push_str(" flipped=true");
        }
        out.push('\n');
    }
    for monitor in &logical.monitor_configs {
        out.push_str("            monitor {\n");
        append_spec(out, "                ", &monitor.monitor_spec);
        out.push_str(&format!(
            "                mode width={} height={} rate={:?}",
            monitor.mode_spec.width, monitor.mode_spec.height, monitor.mode_spec.refresh_rate,
        ));
        if monitor.mode_spec.flags.contains(ModeFlags::INTERLACE) {
            out.push_str(" interlace=true");
        }
        out.push('\n');
        if monitor.enable_underscanning {
            out.push_str("                underscanning\n");
        }
        out.push_str("            }\n");
    }
    out.push_str("        }\n");
}

/// Serializes the given configs into a complete document. The caller is
/// expected to have filtered out system configs already.
pub fn serialize_configs<'a>(
    configs: impl IntoIterator<Item = &'a MonitorsConfig>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("monitors version={FORMAT_VERSION} {{\n"));
    for config in configs {
        out.push_str("    configuration {\n");
        if config.flags.contains(ConfigFlags::MIGRATED) {
            out.push_str("        migrated\n");
        }
        out.push_str(&format!(
            "        layout-mode \"{}\"\n",
            layout_mode_name(config.layout_mode)
        ));
        for logical in &config.logical_monitor_configs {
            append_logical(&mut out, logical);
        }
        if !config.disabled_monitor_specs.is_empty() {
            out.push_str("        disabled {\n");
            for spec in &config.disabled_monitor_specs {
                append_spec(&mut out, "            ", spec);
            }
            out.push_str("        }\n");
        }
        out.push_str("    }\n");
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_config() -> Rc<MonitorsConfig> {
        MonitorsConfig::new(
            vec![
                LogicalMonitorConfig {
                    layout: Rect::new(0, 0, 1920, 1080),
                    scale: 2.0,
                    transform: Transform::Normal,
                    is_primary: true,
                    is_presentation: false,
                    monitor_configs: vec![MonitorConfig {
                        monitor_spec: MonitorSpec::new("DP-1", "DEL", "U2720Q", "0x1234"),
                        mode_spec: MonitorModeSpec {
                            width: 3840,
                            height: 2160,
                            refresh_rate: 59.997,
                            flags: ModeFlags::empty(),
                        },
                        enable_underscanning: false,
                    }],
                },
                LogicalMonitorConfig {
                    layout: Rect::new(1920, 0, 1080, 1920),
                    scale: 1.0,
                    transform: Transform::Rotate90,
                    is_primary: false,
                    is_presentation: true,
                    monitor_configs: vec![MonitorConfig {
                        monitor_spec: MonitorSpec::new("HDMI-1", "SAM", "S24E450", "0x0042"),
                        mode_spec: MonitorModeSpec {
                            width: 1920,
                            height: 1080,
                            refresh_rate: 60.0,
                            flags: ModeFlags::INTERLACE,
                        },
                        enable_underscanning: true,
                    }],
                },
            ],
            vec![MonitorSpec::new("eDP-1", "AUO", "0x1e3d", "0x0000")],
            LayoutMode::Logical,
            ConfigFlags::empty(),
        )
    }

    #[test]
    fn round_trip() {
        let config = sample_config();
        let text = serialize_configs([&*config]);
        let parsed = parse_configs("monitors.kdl", &text, ConfigFlags::empty())
            .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(*parsed[0], *config);
    }

    #[test]
    fn invalid_configurations_are_dropped() {
        // The first configuration stacks both monitors at the origin; only
        // the valid second one must survive parsing.
        let text = r#"
monitors version=2 {
    configuration {
        logicalmonitor {
            x 0
            y 0
            scale 1.0
            primary
            monitor {
                monitorspec connector="DP-1" vendor="DEL" product="U2720Q" serial="0x1"
                mode width=1920 height=1080 rate=60.0
            }
        }
        logicalmonitor {
            x 0
            y 0
            scale 1.0
            monitor {
                monitorspec connector="DP-2" vendor="DEL" product="U2720Q" serial="0x2"
                mode width=1920 height=1080 rate=60.0
            }
        }
    }
    configuration {
        logicalmonitor {
            x 0
            y 0
            scale 1.0
            primary
            monitor {
                monitorspec connector="HDMI-1" vendor="SAM" product="S24E450" serial="0x3"
                mode width=1920 height=1080 rate=60.0
            }
        }
    }
}
"#;
        let parsed = parse_configs("monitors.kdl", text, ConfigFlags::empty()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(
            parsed[0].key.monitor_specs[0].connector,
            "HDMI-1"
        );
    }

    #[test]
    fn missing_scale_defaults_to_one() {
        let text = r#"
monitors version=2 {
    configuration {
        logicalmonitor {
            x 0
            y 0
            primary
            monitor {
                monitorspec connector="DP-1" vendor="DEL" product="U2720Q" serial="0x1"
                mode width=1920 height=1080 rate=60.0
            }
        }
    }
}
"#;
        let parsed = parse_configs("monitors.kdl", text, ConfigFlags::empty()).unwrap();
        let logical = &parsed[0].logical_monitor_configs[0];
        assert_eq!(logical.scale, 1.0);
        assert_eq!(logical.layout, Rect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn legacy_version_needs_migration() {
        let text = "monitors version=1 {\n}\n";
        match parse_configs("monitors.kdl", text, ConfigFlags::empty()) {
            Err(ConfigError::NeedsMigration(1)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_version_is_a_parse_error() {
        let text = "monitors {\n}\n";
        assert!(matches!(
            parse_configs("monitors.kdl", text, ConfigFlags::empty()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn system_flag_is_carried_through() {
        let config = sample_config();
        let text = serialize_configs([&*config]);
        let parsed =
            parse_configs("monitors.kdl", &text, ConfigFlags::SYSTEM_CONFIG).unwrap();
        assert!(parsed[0].flags.contains(ConfigFlags::SYSTEM_CONFIG));
    }

    #[test]
    fn transform_and_flags_survive() {
        let config = sample_config();
        let text = serialize_configs([&*config]);
        let parsed = parse_configs("monitors.kdl", &text, ConfigFlags::empty())
            .unwrap();
        let second = &parsed[0].logical_monitor_configs[1];
        assert_eq!(second.transform, Transform::Rotate90);
        assert!(second.is_presentation);
        assert!(second.monitor_configs[0].enable_underscanning);
        assert!(second.monitor_configs[0]
            .mode_spec
            .flags
            .contains(ModeFlags::INTERLACE));
    }
}
