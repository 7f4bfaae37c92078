//! Monitor configuration core.
//!
//! This crate decides which configuration of display outputs to apply onto
//! the available scan-out hardware, and orchestrates applying it. It covers:
//!
//! - the configuration data model ([`config`]);
//! - the configuration store with text-format persistence ([`config::store`]);
//! - the generators that synthesize a configuration from the current
//!   hardware inventory when no stored one is usable ([`generators`]);
//! - the CRTC/output assignment algorithm ([`assignment`]);
//! - the structural validation of candidate configurations ([`verify`]);
//! - the `ensure_configured` fallback chain with apply/confirm/rollback and
//!   bounded history ([`manager`]).
//!
//! The actual mode-setting (KMS ioctls, X11 round-trips) lives behind the
//! [`backend::DisplayBackend`] trait; this crate never talks to hardware
//! directly.

pub mod assignment;
pub mod backend;
pub mod config;
pub mod error;
pub mod generators;
pub mod geometry;
pub mod manager;
pub mod monitor;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_utils;

pub use backend::{ApplyMethod, BackendCapabilities, ConfigUpdate, DisplayBackend};
pub use config::store::ConfigStore;
pub use config::{
    ConfigFlags, LayoutMode, LogicalMonitorConfig, MonitorConfig, MonitorsConfig,
    MonitorsConfigKey, SwitchConfig,
};
pub use error::ConfigError;
pub use manager::{ConfigEvent, MonitorManager};
pub use monitor::{
    Crtc, CrtcId, CrtcMode, ModeFlags, Monitor, MonitorMode, MonitorModeSpec, MonitorSpec, Output,
    OutputId, Transform,
};
