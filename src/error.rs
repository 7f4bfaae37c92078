//! Error taxonomy for configuration handling.
//!
//! Assignment and validation errors are recoverable: the manager's fallback
//! chain catches them and moves on to the next candidate. Only
//! [`ConfigError::NeedsMigration`] requires the caller to run a distinct
//! migration step instead of retrying.

use crate::monitor::{MonitorModeSpec, MonitorSpec};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configured monitor '{} {}' not found", .0.vendor, .0.product)]
    MonitorNotFound(MonitorSpec),

    #[error(
        "invalid mode {}x{} ({}) for monitor '{} {}'",
        .mode.width, .mode.height, .mode.refresh_rate,
        .monitor.vendor, .monitor.product
    )]
    ModeNotFound {
        monitor: MonitorSpec,
        mode: MonitorModeSpec,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("not supported by hardware: {0}")]
    Unsupported(String),

    #[error("conflicting configuration: {0}")]
    Conflict(String),

    #[error("no available CRTC for monitor '{} {}'", .0.vendor, .0.product)]
    NoCrtcAvailable(MonitorSpec),

    #[error("monitors config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed monitors config: {0}")]
    Parse(String),

    #[error("monitors config has the old format (version {0})")]
    NeedsMigration(u32),

    #[error("backend refused configuration: {0}")]
    Backend(String),
}
