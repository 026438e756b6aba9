use crate::core::config::data::Config;
use crate::core::config::io::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

#[derive(Default)]
pub(crate) struct ConfigCacheState {
    config: Option<Config>,
    modified: Option<SystemTime>,
}

/// Caches the config file and reloads it when its mtime changes, so
/// settings edited by another process are seen at call time.
pub(crate) struct ConfigOrchestrator {
    path: PathBuf,
    state: Mutex<ConfigCacheState>,
}

static CONFIG_ORCHESTRATOR: LazyLock<Result<ConfigOrchestrator, String>> = LazyLock::new(|| {
    Config::get_config_path()
        .map(ConfigOrchestrator::new)
        .map_err(|err| err.to_string())
});

#[cfg(test)]
pub(crate) static TEST_ORCHESTRATOR: LazyLock<Mutex<Option<ConfigOrchestrator>>> =
    LazyLock::new(|| Mutex::new(None));

fn global() -> Result<&'static ConfigOrchestrator, ConfigError> {
    CONFIG_ORCHESTRATOR
        .as_ref()
        .map_err(|_| ConfigError::NoConfigDir)
}

impl ConfigOrchestrator {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(ConfigCacheState::default()),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ConfigCacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, state: &mut ConfigCacheState) -> Result<Config, ConfigError> {
        let disk_modified = Self::modified_time(&self.path);
        if state.config.is_none() || state.modified != disk_modified {
            let config = Config::load_from_path(&self.path)?;
            state.modified = disk_modified;
            state.config = Some(config);
        }
        Ok(state.config.clone().unwrap_or_default())
    }

    pub(crate) fn load_with_cache(&self) -> Result<Config, ConfigError> {
        let mut state = self.lock();
        self.refresh(&mut state)
    }

    pub(crate) fn persist(&self, config: Config) -> Result<(), ConfigError> {
        config.save_to_path(&self.path)?;
        let mut state = self.lock();
        state.modified = Self::modified_time(&self.path);
        state.config = Some(config);
        Ok(())
    }

    pub(crate) fn mutate<F, T>(&self, mutator: F) -> Result<T, ConfigError>
    where
        F: FnOnce(&mut Config) -> T,
    {
        let mut working = {
            let mut state = self.lock();
            self.refresh(&mut state)?
        };
        let result = mutator(&mut working);
        self.persist(working)?;
        Ok(result)
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        #[cfg(test)]
        {
            if let Some(orchestrator) = TEST_ORCHESTRATOR
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
            {
                return orchestrator.load_with_cache();
            }
        }
        global()?.load_with_cache()
    }

    #[cfg(test)]
    pub fn load_test_safe() -> Result<Config, ConfigError> {
        Ok(Config::default())
    }

    #[cfg(not(test))]
    pub fn load_test_safe() -> Result<Config, ConfigError> {
        Self::load()
    }

    pub fn mutate<F, T>(mutator: F) -> Result<T, ConfigError>
    where
        F: FnOnce(&mut Config) -> T,
    {
        #[cfg(test)]
        {
            if let Some(orchestrator) = TEST_ORCHESTRATOR
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
            {
                return orchestrator.mutate(mutator);
            }
        }
        global()?.mutate(mutator)
    }

    /// Location of the config file, for display.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        global().map(|orchestrator| orchestrator.path().to_path_buf())
    }

    #[cfg(test)]
    pub(crate) fn set_test_config_path(path: PathBuf) {
        let mut guard = TEST_ORCHESTRATOR
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(ConfigOrchestrator::new(path));
    }

    #[cfg(test)]
    pub(crate) fn clear_test_config_override() {
        let mut guard = TEST_ORCHESTRATOR
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.take();
    }
}
