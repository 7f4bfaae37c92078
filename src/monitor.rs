//! Hardware inventory value types.
//!
//! A [`Monitor`] is one connected display as seen by the backend: its
//! identity ([`MonitorSpec`]), the timing modes it offers, and the physical
//! outputs that realize it (more than one for tiled monitors). These types
//! are plain values; the backend rebuilds them on every hotplug.

use bitflags::bitflags;

/// Two refresh rates closer than this are the same mode.
pub const MAXIMUM_REFRESH_RATE_DIFF: f64 = 0.001;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModeFlags: u32 {
        const INTERLACE = 1 << 0;
    }
}

/// Identity of a physical monitor. Equality is exact field match; ordering
/// (connector, vendor, product, serial) canonicalizes config keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonitorSpec {
    pub connector: String,
    pub vendor: String,
    pub product: String,
    pub serial: String,
}

impl MonitorSpec {
    pub fn new(connector: &str, vendor: &str, product: &str, serial: &str) -> Self {
        Self {
            connector: connector.to_owned(),
            vendor: vendor.to_owned(),
            product: product.to_owned(),
            serial: serial.to_owned(),
        }
    }
}

/// Identity of a timing mode offered by a monitor.
#[derive(Debug, Clone)]
pub struct MonitorModeSpec {
    pub width: i32,
    pub height: i32,
    pub refresh_rate: f64,
    pub flags: ModeFlags,
}

impl PartialEq for MonitorModeSpec {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.refresh_rate - other.refresh_rate).abs() < MAXIMUM_REFRESH_RATE_DIFF
            && self.flags == other.flags
    }
}

/// One of the eight rotation/flip combinations, in CRTC order: four
/// rotations, then the same four mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl Transform {
    pub fn is_rotated(self) -> bool {
        matches!(
            self,
            Transform::Rotate90
                | Transform::Rotate270
                | Transform::Flipped90
                | Transform::Flipped270
        )
    }

    pub fn is_flipped(self) -> bool {
        matches!(
            self,
            Transform::Flipped
                | Transform::Flipped90
                | Transform::Flipped180
                | Transform::Flipped270
        )
    }

    fn rotation_index(self) -> u8 {
        match self {
            Transform::Normal | Transform::Flipped => 0,
            Transform::Rotate90 | Transform::Flipped90 => 1,
            Transform::Rotate180 | Transform::Flipped180 => 2,
            Transform::Rotate270 | Transform::Flipped270 => 3,
        }
    }

    fn from_parts(rotation: u8, flipped: bool) -> Self {
        match (rotation % 4, flipped) {
            (0, false) => Transform::Normal,
            (1, false) => Transform::Rotate90,
            (2, false) => Transform::Rotate180,
            (_, false) => Transform::Rotate270,
            (0, true) => Transform::Flipped,
            (1, true) => Transform::Flipped90,
            (2, true) => Transform::Flipped180,
            (_, true) => Transform::Flipped270,
        }
    }

    /// Applies `other` after `self`: rotations add, flips cancel out.
    pub fn compose(self, other: Transform) -> Transform {
        Transform::from_parts(
            self.rotation_index() + other.rotation_index(),
            self.is_flipped() != other.is_flipped(),
        )
    }

    pub fn invert(self) -> Transform {
        match self {
            Transform::Rotate90 => Transform::Rotate270,
            Transform::Rotate270 => Transform::Rotate90,
            other => other,
        }
    }

    /// The next step when cycling the builtin panel rotation; flips are
    /// dropped.
    pub fn next_rotation(self) -> Transform {
        Transform::from_parts(self.rotation_index() + 1, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrtcId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrtcModeId(pub u64);

/// A hardware timing/scan-out engine driving one active video signal.
#[derive(Debug, Clone)]
pub struct Crtc {
    pub id: CrtcId,
}

/// A hardware mode as programmed on a CRTC. For tiled monitors this is one
/// tile's timing, distinct from the whole monitor's mode size.
#[derive(Debug, Clone, PartialEq)]
pub struct CrtcMode {
    pub id: CrtcModeId,
    pub width: i32,
    pub height: i32,
    pub refresh_rate: f64,
    pub flags: ModeFlags,
}

/// Tile placement of an output within a tiled monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInfo {
    pub loc_h: u32,
    pub loc_v: u32,
    pub tile_w: i32,
    pub tile_h: i32,
}

/// A physical connector an output device is attached to.
#[derive(Debug, Clone)]
pub struct Output {
    pub id: OutputId,
    pub possible_crtcs: Vec<CrtcId>,
    /// The CRTC currently driving this output, if any.
    pub assigned_crtc: Option<CrtcId>,
    pub tile_info: Option<TileInfo>,
}

/// A monitor-level mode: one spec, plus the CRTC mode each of the monitor's
/// outputs must be programmed with to realize it. `crtc_modes` is parallel
/// to [`Monitor::outputs`]; a `None` entry means that output does not
/// participate in this mode.
#[derive(Debug, Clone)]
pub struct MonitorMode {
    pub spec: MonitorModeSpec,
    pub crtc_modes: Vec<Option<CrtcMode>>,
}

/// One connected display.
#[derive(Debug, Clone)]
pub struct Monitor {
    pub spec: MonitorSpec,
    pub modes: Vec<MonitorMode>,
    pub preferred_mode: usize,
    pub outputs: Vec<Output>,
    /// Laptop panel (eDP/LVDS/DSI).
    pub is_builtin: bool,
    /// Hardware-reported primary.
    pub is_primary: bool,
    pub is_active: bool,
    pub is_underscanning: bool,
    /// Hardware-reported preferred position, from e.g. DisplayLink docks.
    pub suggested_position: Option<(i32, i32)>,
    /// How the panel is mounted relative to the device's natural
    /// orientation.
    pub panel_orientation_transform: Transform,
}

impl Monitor {
    pub fn preferred_mode(&self) -> &MonitorMode {
        &self.modes[self.preferred_mode]
    }

    /// The output carrying identity and primary status; by convention the
    /// first one.
    pub fn main_output(&self) -> &Output {
        &self.outputs[0]
    }

    pub fn mode_from_spec(&self, spec: &MonitorModeSpec) -> Option<&MonitorMode> {
        self.modes.iter().find(|mode| mode.spec == *spec)
    }

    pub fn logical_to_crtc_transform(&self, transform: Transform) -> Transform {
        transform.compose(self.panel_orientation_transform)
    }

    pub fn crtc_to_logical_transform(&self, transform: Transform) -> Transform {
        transform.compose(self.panel_orientation_transform.invert())
    }

    /// Position of one output's CRTC frame within the monitor, in CRTC
    /// pixels. Zero except for tiles of a tiled monitor.
    pub fn calculate_crtc_pos(
        &self,
        output_index: usize,
        crtc_transform: Transform,
    ) -> (i32, i32) {
        let Some(tile) = self.outputs[output_index].tile_info else {
            return (0, 0);
        };

        let mut x = 0;
        let mut y = 0;
        for other in &self.outputs {
            let Some(other_tile) = other.tile_info else {
                continue;
            };

            let same_row = other_tile.loc_v == tile.loc_v;
            let same_column = other_tile.loc_h == tile.loc_h;
            match crtc_transform {
                Transform::Normal | Transform::Flipped => {
                    if same_row && other_tile.loc_h < tile.loc_h {
                        x += other_tile.tile_w;
                    }
                    if same_column && other_tile.loc_v < tile.loc_v {
                        y += other_tile.tile_h;
                    }
                }
                Transform::Rotate180 | Transform::Flipped180 => {
                    if same_row && other_tile.loc_h > tile.loc_h {
                        x += other_tile.tile_w;
                    }
                    if same_column && other_tile.loc_v > tile.loc_v {
                        y += other_tile.tile_h;
                    }
                }
                Transform::Rotate270 | Transform::Flipped270 => {
                    if same_row && other_tile.loc_h > tile.loc_h {
                        y += other_tile.tile_w;
                    }
                    if same_column && other_tile.loc_v > tile.loc_v {
                        x += other_tile.tile_h;
                    }
                }
                Transform::Rotate90 | Transform::Flipped90 => {
                    if same_row && other_tile.loc_h < tile.loc_h {
                        y += other_tile.tile_w;
                    }
                    if same_column && other_tile.loc_v < tile.loc_v {
                        x += other_tile.tile_h;
                    }
                }
            }
        }

        (x, y)
    }
}
