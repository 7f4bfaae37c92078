//! Persistent store of known-good monitor configurations.
//!
//! The store maps [`MonitorsConfigKey`]s to configs. At start-up it reads
//! read-only documents from system data dirs, then the per-user file on top
//! (later loads shadow earlier ones). Adding or removing a user config
//! queues an asynchronous write-back of the user file; a new write cancels
//! a still-pending one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{fs, io, thread};

use directories::ProjectDirs;
use tracing::{debug, warn};

use super::format;
use super::{ConfigFlags, MonitorsConfig, MonitorsConfigKey};
use crate::error::ConfigError;

const FILE_NAME: &str = "monitors.kdl";

const SYSTEM_CONFIG_DIRS: &[&str] = &["/etc/xdg", "/usr/share"];

struct PendingSave {
    cancelled: Arc<AtomicBool>,
}

impl PendingSave {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

pub struct ConfigStore {
    configs: HashMap<MonitorsConfigKey, Rc<MonitorsConfig>>,
    user_path: Option<PathBuf>,
    pending_save: Option<PendingSave>,
}

impl ConfigStore {
    /// A store backed by the default per-user path.
    pub fn new() -> Self {
        let user_path = ProjectDirs::from("", "", "monitor-config")
            .map(|dirs| dirs.config_dir().join(FILE_NAME));
        if user_path.is_none() {
            warn!("no home directory, monitor configuration will not persist");
        }
        Self::with_user_path(user_path)
    }

    /// A store backed by an explicit file, or none at all.
    pub fn with_user_path(user_path: Option<PathBuf>) -> Self {
        Self {
            configs: HashMap::new(),
            user_path,
            pending_save: None,
        }
    }

    /// Reads system documents, then the user document. A failure to read
    /// the user file is returned so the caller can decide between migration
    /// and starting fresh; system file failures are only logged.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        for dir in SYSTEM_CONFIG_DIRS {
            let path = Path::new(dir).join("monitor-config").join(FILE_NAME);
            match self.load_file(&path, ConfigFlags::SYSTEM_CONFIG) {
                Ok(true) => debug!("loaded system monitor configs from {path:?}"),
                Ok(false) => (),
                Err(err) => warn!("failed to read {path:?}: {err}"),
            }
        }

        if let Some(path) = self.user_path.clone() {
            if self.load_file(&path, ConfigFlags::empty())? {
                debug!("loaded monitor configs from {path:?}");
            }
        }

        Ok(())
    }

    fn load_file(&mut self, path: &Path, flags: ConfigFlags) -> Result<bool, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let name = path.to_string_lossy();
        for config in format::parse_configs(&name, &text, flags)? {
            self.configs.insert(config.key.clone(), config);
        }
        Ok(true)
    }

    pub fn lookup(&self, key: &MonitorsConfigKey) -> Option<Rc<MonitorsConfig>> {
        self.configs.get(key).cloned()
    }

    pub fn add(&mut self, config: Rc<MonitorsConfig>) {
        let is_system = config.flags.contains(ConfigFlags::SYSTEM_CONFIG);
        self.configs.insert(config.key.clone(), config);
        if !is_system {
            self.queue_save();
        }
    }

    pub fn remove(&mut self, key: &MonitorsConfigKey) {
        if let Some(removed) = self.configs.remove(key) {
            if !removed.flags.contains(ConfigFlags::SYSTEM_CONFIG) {
                self.queue_save();
            }
        }
    }

    /// Serializes the user configs and hands the write to a background
    /// thread. Cancels a write still in flight; the flag is checked again
    /// right before the final rename so a cancelled write never replaces a
    /// newer one.
    fn queue_save(&mut self) {
        let Some(path) = self.user_path.clone() else {
            return;
        };

        if let Some(pending) = self.pending_save.take() {
            pending.cancel();
        }

        let text = self.serialize_user_configs();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.pending_save = Some(PendingSave {
            cancelled: cancelled.clone(),
        });

        thread::Builder::new()
            .name("monitors-config-save".to_owned())
            .spawn(move || {
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                if let Err(err) = write_atomically(&path, &text, Some(&cancelled)) {
                    warn!("failed to save monitor configuration to {path:?}: {err}");
                }
            })
            .map_err(|err| warn!("failed to spawn config save thread: {err}"))
            .ok();
    }

    /// Writes the user document immediately on the calling thread,
    /// superseding any pending async write.
    pub fn save_sync(&mut self) -> Result<(), ConfigError> {
        let Some(path) = self.user_path.clone() else {
            return Ok(());
        };

        if let Some(pending) = self.pending_save.take() {
            pending.cancel();
        }

        let text = self.serialize_user_configs();
        write_atomically(&path, &text, None)?;
        Ok(())
    }

    fn serialize_user_configs(&self) -> String {
        let mut configs: Vec<&MonitorsConfig> = self
            .configs
            .values()
            .filter(|config| !config.flags.contains(ConfigFlags::SYSTEM_CONFIG))
            .map(|config| &**config)
            .collect();
        // HashMap iteration order is arbitrary; keep the file diffable.
        configs.sort_by(|a, b| a.key.monitor_specs.cmp(&b.key.monitor_specs));
        format::serialize_configs(configs)
    }
}

impl Drop for ConfigStore {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_save.take() {
            pending.cancel();
        }
    }
}

fn write_atomically(
    path: &Path,
    text: &str,
    cancelled: Option<&AtomicBool>,
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".new");
    let tmp_path = PathBuf::from(tmp_path);
    fs::write(&tmp_path, text)?;

    if cancelled.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        let _ = fs::remove_file(&tmp_path);
        return Ok(());
    }
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::config::{LayoutMode, LogicalMonitorConfig, MonitorConfig};
    use crate::geometry::Rect;
    use crate::monitor::{ModeFlags, MonitorModeSpec, MonitorSpec, Transform};

    fn simple_config(connector: &str, flags: ConfigFlags) -> Rc<MonitorsConfig> {
        MonitorsConfig::new(
            vec![LogicalMonitorConfig {
                layout: Rect::new(0, 0, 1920, 1080),
                scale: 1.0,
                transform: Transform::Normal,
                is_primary: true,
                is_presentation: false,
                monitor_configs: vec![MonitorConfig {
                    monitor_spec: MonitorSpec::new(connector, "VEN", "Model", "0x01"),
                    mode_spec: MonitorModeSpec {
                        width: 1920,
                        height: 1080,
                        refresh_rate: 60.0,
                        flags: ModeFlags::empty(),
                    },
                    enable_underscanning: false,
                }],
            }],
            vec![],
            LayoutMode::Logical,
            flags,
        )
    }

    #[test]
    fn add_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);

        let config = simple_config("DP-1", ConfigFlags::empty());
        let mut store = ConfigStore::with_user_path(Some(path.clone()));
        store.add(config.clone());
        store.save_sync().unwrap();

        let mut reloaded = ConfigStore::with_user_path(Some(path));
        reloaded.load().unwrap();
        let found = reloaded.lookup(&config.key).unwrap();
        assert_eq!(*found, *config);
    }

    #[test]
    fn remove_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);

        let config = simple_config("DP-1", ConfigFlags::empty());
        let mut store = ConfigStore::with_user_path(Some(path.clone()));
        store.add(config.clone());
        store.remove(&config.key);
        store.save_sync().unwrap();

        let mut reloaded = ConfigStore::with_user_path(Some(path));
        reloaded.load().unwrap();
        assert!(reloaded.lookup(&config.key).is_none());
    }

    #[test]
    fn system_configs_are_not_written_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);

        let system = simple_config("DP-9", ConfigFlags::SYSTEM_CONFIG);
        let user = simple_config("DP-1", ConfigFlags::empty());
        let mut store = ConfigStore::with_user_path(Some(path.clone()));
        store.add(system.clone());
        store.add(user.clone());
        store.save_sync().unwrap();

        let mut reloaded = ConfigStore::with_user_path(Some(path));
        reloaded.load().unwrap();
        assert!(reloaded.lookup(&user.key).is_some());
        assert!(reloaded.lookup(&system.key).is_none());
    }

    #[test]
    fn missing_file_is_fine() {
        let dir = TempDir::new().unwrap();
        let mut store =
            ConfigStore::with_user_path(Some(dir.path().join("nope").join(FILE_NAME)));
        store.load().unwrap();
    }

    #[test]
    fn legacy_user_file_reports_migration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "monitors version=1 {\n}\n").unwrap();

        let mut store = ConfigStore::with_user_path(Some(path));
        match store.load() {
            Err(ConfigError::NeedsMigration(1)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
