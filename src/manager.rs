//! The configuration orchestrator.
//!
//! [`MonitorManager`] owns the current config, a bounded history for
//! rollback, the config store, and the persistent-apply confirmation timer.
//! On hotplug (or start-up) the caller runs [`MonitorManager::ensure_configured`],
//! which walks a fallback chain until some configuration sticks: stored,
//! suggested, previous, linear, fallback, and finally no configuration at
//! all.

use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};
use tracing::{debug, warn};

use crate::assignment;
use crate::backend::{
    ApplyMethod, BackendCapabilities, ConfigUpdate, DisplayBackend, SCALE_EPSILON,
};
use crate::config::store::ConfigStore;
use crate::config::{
    ConfigFlags, MonitorsConfig, MonitorsConfigKey, SwitchConfig, PENDING_MIGRATION_SCALE,
};
use crate::error::ConfigError;
use crate::generators;
use crate::monitor::Transform;
use crate::verify::verify_monitors_config;

pub const CONFIG_HISTORY_MAX_SIZE: usize = 3;

/// How long a persistent apply waits for confirmation before rolling back.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Emitted synchronously to registered observers as configuration state
/// changes.
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// A configuration reached the hardware. `None` means everything was
    /// turned off because no monitor is usable.
    Applied {
        config: Option<Rc<MonitorsConfig>>,
        method: ApplyMethod,
    },
    /// A persistent apply succeeded and now awaits confirmation.
    ConfirmationPending(Rc<MonitorsConfig>),
    /// A pending apply was confirmed and written to the store.
    Confirmed(Rc<MonitorsConfig>),
    /// A pending apply was rejected or timed out and got rolled back.
    Reverted,
}

type Observer = Rc<dyn Fn(&ConfigEvent)>;

struct Inner {
    backend: Rc<RefCell<dyn DisplayBackend>>,
    store: ConfigStore,
    current: Option<Rc<MonitorsConfig>>,
    history: VecDeque<Rc<MonitorsConfig>>,
    pending_confirmation: Option<RegistrationToken>,
    confirmation_timeout: Duration,
    in_init: bool,
    observers: Vec<Observer>,
}

pub struct MonitorManager<D> {
    loop_handle: LoopHandle<'static, D>,
    inner: Rc<RefCell<Inner>>,
}

impl<D> Clone for MonitorManager<D> {
    fn clone(&self) -> Self {
        Self {
            loop_handle: self.loop_handle.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<D: 'static> MonitorManager<D> {
    /// A manager over the default per-user store. Store read failures are
    /// logged and leave the store empty; a legacy-format user file is
    /// reported the same way since migration needs a separate pass.
    pub fn new(
        loop_handle: LoopHandle<'static, D>,
        backend: Rc<RefCell<dyn DisplayBackend>>,
    ) -> Self {
        let mut store = ConfigStore::new();
        match store.load() {
            Ok(()) => (),
            Err(ConfigError::NeedsMigration(version)) => {
                warn!("monitor configuration uses the old format (version {version}), ignoring");
            }
            Err(err) => warn!("failed to load monitor configuration: {err}"),
        }
        Self::with_store(loop_handle, backend, store)
    }

    pub fn with_store(
        loop_handle: LoopHandle<'static, D>,
        backend: Rc<RefCell<dyn DisplayBackend>>,
        store: ConfigStore,
    ) -> Self {
        Self {
            loop_handle,
            inner: Rc::new(RefCell::new(Inner {
                backend,
                store,
                current: None,
                history: VecDeque::new(),
                pending_confirmation: None,
                confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
                in_init: true,
                observers: Vec::new(),
            })),
        }
    }

    /// Marks initial configuration as done; hotplugs from now on may
    /// distrust stored configs on backends that update modes themselves.
    pub fn set_in_init(&self, in_init: bool) {
        self.inner.borrow_mut().in_init = in_init;
    }

    pub fn set_confirmation_timeout(&self, timeout: Duration) {
        self.inner.borrow_mut().confirmation_timeout = timeout;
    }

    pub fn connect(&self, observer: impl Fn(&ConfigEvent) + 'static) {
        self.inner.borrow_mut().observers.push(Rc::new(observer));
    }

    fn emit(&self, event: ConfigEvent) {
        let observers = self.inner.borrow().observers.clone();
        for observer in observers {
            observer(&event);
        }
    }

    pub fn store(&self) -> Ref<'_, ConfigStore> {
        Ref::map(self.inner.borrow(), |inner| &inner.store)
    }

    pub fn current(&self) -> Option<Rc<MonitorsConfig>> {
        self.inner.borrow().current.clone()
    }

    pub fn previous(&self) -> Option<Rc<MonitorsConfig>> {
        self.inner.borrow().history.front().cloned()
    }

    pub fn pop_previous(&self) -> Option<Rc<MonitorsConfig>> {
        self.inner.borrow_mut().history.pop_front()
    }

    pub fn clear_history(&self) {
        self.inner.borrow_mut().history.clear();
    }

    /// Persists the current config in the store.
    pub fn save_current(&self) {
        let mut inner = self.inner.borrow_mut();
        let Some(current) = inner.current.clone() else {
            warn!("no current monitor configuration to save");
            return;
        };
        inner.store.add(current);
    }

    fn set_current(&self, config: Option<Rc<MonitorsConfig>>) {
        let mut inner = self.inner.borrow_mut();
        if let Some(old) = inner.current.take() {
            inner.history.push_front(old);
            inner.history.truncate(CONFIG_HISTORY_MAX_SIZE);
        }
        inner.current = config;
    }

    fn backend(&self) -> Rc<RefCell<dyn DisplayBackend>> {
        self.inner.borrow().backend.clone()
    }

    fn current_state_key(&self) -> Option<MonitorsConfigKey> {
        let backend = self.backend();
        let backend = backend.borrow();
        MonitorsConfigKey::for_current_state(backend.monitors(), backend.is_lid_closed())
    }

    /// The stored config for the connected hardware, resolving pending
    /// migrations on the way. An unresolvable migrated entry is dropped
    /// from the store.
    fn get_stored(&self) -> Option<Rc<MonitorsConfig>> {
        let key = self.current_state_key()?;
        let config = self.inner.borrow().store.lookup(&key)?;

        if !config.flags.contains(ConfigFlags::MIGRATED) {
            return Some(config);
        }

        match self.finish_migration(&config) {
            Some(resolved) => {
                self.inner.borrow_mut().store.add(resolved.clone());
                Some(resolved)
            }
            None => {
                warn!("failed to finish monitors config migration, dropping it");
                self.inner.borrow_mut().store.remove(&key);
                None
            }
        }
    }

    /// Replaces placeholder scales of a migrated config with ones derived
    /// from the hardware. Fails if any referenced monitor or mode is gone.
    fn finish_migration(&self, config: &MonitorsConfig) -> Option<Rc<MonitorsConfig>> {
        let backend = self.backend();
        let backend = backend.borrow();

        let mut logical_monitor_configs = config.logical_monitor_configs.clone();
        for logical in &mut logical_monitor_configs {
            if logical.scale != PENDING_MIGRATION_SCALE {
                continue;
            }

            let monitor_config = logical.monitor_configs.first()?;
            let monitor = backend.monitor_from_spec(&monitor_config.monitor_spec)?;
            let mode = monitor.mode_from_spec(&monitor_config.mode_spec)?;
            logical.scale =
                backend.calculate_monitor_mode_scale(config.layout_mode, monitor, mode);
        }

        Some(MonitorsConfig::new(
            logical_monitor_configs,
            config.disabled_monitor_specs.clone(),
            config.layout_mode,
            config.flags & !ConfigFlags::MIGRATED,
        ))
    }

    /// Hardware-level applicability: every referenced monitor and mode
    /// exists, every scale is supported (and shared, where the hardware
    /// requires one global scale), and no closed laptop panel is enabled.
    pub fn is_config_applicable(&self, config: &MonitorsConfig) -> Result<(), ConfigError> {
        let backend = self.backend();
        let backend = backend.borrow();

        for logical in &config.logical_monitor_configs {
            let scale = logical.scale;

            for monitor_config in &logical.monitor_configs {
                let monitor = backend
                    .monitor_from_spec(&monitor_config.monitor_spec)
                    .ok_or_else(|| {
                        ConfigError::MonitorNotFound(monitor_config.monitor_spec.clone())
                    })?;

                let mode = monitor
                    .mode_from_spec(&monitor_config.mode_spec)
                    .ok_or_else(|| ConfigError::ModeNotFound {
                        monitor: monitor_config.monitor_spec.clone(),
                        mode: monitor_config.mode_spec.clone(),
                    })?;

                let scale_supported = backend
                    .is_scale_supported(config.layout_mode, monitor, mode, scale)
                    && (!backend
                        .capabilities()
                        .contains(BackendCapabilities::GLOBAL_SCALE_REQUIRED)
                        || config
                            .logical_monitor_configs
                            .iter()
                            .all(|l| (l.scale - scale).abs() < SCALE_EPSILON));
                if !scale_supported {
                    return Err(ConfigError::Unsupported(format!(
                        "scale {scale} not supported by backend"
                    )));
                }

                if monitor.is_builtin && backend.is_lid_closed() {
                    return Err(ConfigError::Unsupported(
                        "refusing to activate a closed laptop panel".to_owned(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Whether a config covers exactly the connected hardware and is still
    /// applicable to it. Gates reuse of history entries across hotplugs.
    pub fn is_config_complete(&self, config: &MonitorsConfig) -> bool {
        let Some(key) = self.current_state_key() else {
            return false;
        };
        key == config.key && self.is_config_applicable(config).is_ok()
    }

    /// Assigns and programs a config (or turns everything off for `None`),
    /// then records it as current. No verification, no confirmation timer;
    /// callers wanting the full checks use [`MonitorManager::apply`].
    fn apply_config(
        &self,
        config: Option<Rc<MonitorsConfig>>,
        method: ApplyMethod,
    ) -> Result<(), ConfigError> {
        let update = match &config {
            Some(config) => {
                let backend = self.backend();
                let backend = backend.borrow();
                assignment::assign(&*backend, config)?
            }
            None => ConfigUpdate::default(),
        };

        if method == ApplyMethod::Verify {
            return Ok(());
        }

        let backend = self.backend();
        backend.borrow_mut().apply(&update, method)?;

        self.set_current(config.clone());
        self.emit(ConfigEvent::Applied { config, method });
        Ok(())
    }

    /// The external apply entry point: structural verification, hardware
    /// applicability, then the actual apply. A persistent apply arms the
    /// confirmation timeout and supersedes any still-pending one.
    pub fn apply(
        &self,
        config: Rc<MonitorsConfig>,
        method: ApplyMethod,
    ) -> Result<(), ConfigError> {
        {
            let backend = self.backend();
            let capabilities = backend.borrow().capabilities();
            verify_monitors_config(&config, capabilities)?;
        }
        self.is_config_applicable(&config)?;

        if method != ApplyMethod::Verify {
            self.cancel_persistent_confirmation();
        }

        self.apply_config(Some(config.clone()), method)?;

        if method == ApplyMethod::Persistent {
            self.request_persistent_confirmation(config);
        }

        Ok(())
    }

    fn request_persistent_confirmation(&self, config: Rc<MonitorsConfig>) {
        let timeout = self.inner.borrow().confirmation_timeout;
        let manager = self.clone();
        let token = self
            .loop_handle
            .insert_source(Timer::from_duration(timeout), move |_, _, _| {
                warn!("monitor configuration was not confirmed in time, reverting");
                manager.inner.borrow_mut().pending_confirmation = None;
                manager.restore_previous_config();
                manager.emit(ConfigEvent::Reverted);
                TimeoutAction::Drop
            })
            .unwrap();
        self.inner.borrow_mut().pending_confirmation = Some(token);
        self.emit(ConfigEvent::ConfirmationPending(config));
    }

    fn cancel_persistent_confirmation(&self) {
        if let Some(token) = self.inner.borrow_mut().pending_confirmation.take() {
            self.loop_handle.remove(token);
        }
    }

    /// Resolves an outstanding persistent apply. `true` stores the current
    /// config; `false` rolls back. A no-op when nothing is pending (the
    /// timeout already fired).
    pub fn confirm(&self, ok: bool) {
        if self.inner.borrow().pending_confirmation.is_none() {
            debug!("no monitor configuration awaiting confirmation");
            return;
        }

        self.cancel_persistent_confirmation();
        if ok {
            self.save_current();
            if let Some(current) = self.current() {
                self.emit(ConfigEvent::Confirmed(current));
            }
        } else {
            self.restore_previous_config();
            self.emit(ConfigEvent::Reverted);
        }
    }

    /// Reapplies the most recent history entry, falling back to the whole
    /// configuration chain when there is none or it no longer applies.
    fn restore_previous_config(&self) {
        if let Some(previous) = self.pop_previous() {
            match self.apply_config(Some(previous), ApplyMethod::Temporary) {
                Ok(()) => return,
                Err(err) => warn!("failed to restore previous configuration: {err}"),
            }
        }

        self.ensure_configured();
    }

    /// Walks the fallback chain until a configuration sticks. Returns the
    /// config that ended up applied, or `None` when everything was turned
    /// off for lack of usable monitors.
    pub fn ensure_configured(&self) -> Option<Rc<MonitorsConfig>> {
        let backend = self.backend();
        let (layout_mode, use_stored_config) = {
            let backend = backend.borrow();
            let inner = self.inner.borrow();
            (
                backend.default_layout_mode(),
                inner.in_init || !backend.has_hotplug_mode_update(),
            )
        };
        let method = if use_stored_config {
            ApplyMethod::Persistent
        } else {
            ApplyMethod::Temporary
        };
        let fallback_method = ApplyMethod::Temporary;

        if use_stored_config {
            if let Some(mut config) = self.get_stored() {
                if config.layout_mode != layout_mode {
                    config = generators::create_for_layout(&config, layout_mode);
                }
                match self.apply_config(Some(config.clone()), method) {
                    Ok(()) => return Some(config),
                    Err(err) => {
                        warn!("failed to use stored monitor configuration: {err}");
                    }
                }
            }
        }

        // Bind generated candidates before applying them; apply_config needs
        // the backend borrow back.
        let suggested = generators::create_suggested(&*backend.borrow());
        if let Some(config) = suggested {
            match self.apply_config(Some(config.clone()), method) {
                Ok(()) => return Some(config),
                Err(err) => warn!("failed to use suggested monitor configuration: {err}"),
            }
        }

        if let Some(mut config) = self.previous() {
            if config.layout_mode != layout_mode {
                config = generators::create_for_layout(&config, layout_mode);
            }
            if self.is_config_complete(&config) {
                match self.apply_config(Some(config.clone()), method) {
                    Ok(()) => return Some(config),
                    Err(err) => {
                        warn!("failed to use previous monitor configuration: {err}");
                    }
                }
            }
        }

        let linear = generators::create_linear(&*backend.borrow());
        if let Some(config) = linear {
            match self.apply_config(Some(config.clone()), method) {
                Ok(()) => return Some(config),
                Err(err) => warn!("failed to use linear monitor configuration: {err}"),
            }
        }

        let fallback = generators::create_fallback(&*backend.borrow());
        if let Some(config) = fallback {
            match self.apply_config(Some(config.clone()), fallback_method) {
                Ok(()) => return Some(config),
                Err(err) => warn!("failed to use fallback monitor configuration: {err}"),
            }
        }

        if let Err(err) = self.apply_config(None, fallback_method) {
            warn!("failed to apply empty monitor configuration: {err}");
        }
        None
    }

    /// Rotates the builtin panel by 90 degrees, if it is active on its own.
    pub fn rotate_monitor(&self) -> Result<(), ConfigError> {
        let config = {
            let current = self.current();
            let backend = self.backend();
            let backend = backend.borrow();
            current
                .and_then(|current| generators::create_for_rotate_monitor(&*backend, &current))
        };
        match config {
            Some(config) => self.apply_config(Some(config), ApplyMethod::Temporary),
            None => Ok(()),
        }
    }

    /// Follows an accelerometer-reported orientation for the builtin panel.
    pub fn handle_orientation_change(&self, transform: Transform) -> Result<(), ConfigError> {
        let config = {
            let current = self.current();
            let backend = self.backend();
            let backend = backend.borrow();
            current.and_then(|current| {
                generators::create_for_orientation(&*backend, &current, transform)
            })
        };
        match config {
            Some(config) => self.apply_config(Some(config), ApplyMethod::Temporary),
            None => Ok(()),
        }
    }

    /// Applies one of the display-switcher presets.
    pub fn switch_config(&self, config_type: SwitchConfig) -> Result<(), ConfigError> {
        let config = {
            let backend = self.backend();
            let backend = backend.borrow();
            generators::create_for_switch_config(&*backend, config_type)
        };
        match config {
            Some(config) => self.apply_config(Some(config), ApplyMethod::Temporary),
            None => Err(ConfigError::Unsupported(format!(
                "cannot switch monitor configuration to {config_type:?}"
            ))),
        }
    }
}
