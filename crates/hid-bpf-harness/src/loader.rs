//! Process-wide cache of loaded test modules.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::HarnessConfig;
use crate::error::LoadError;
use crate::module::TestModule;

/// Loaded modules keyed by logical name.
///
/// A module is opened once and handed out as the same [`Arc`] afterwards.
/// Nothing is ever evicted: artifacts are stateless between calls, and
/// unloading a shared object whose callbacks may still be referenced is
/// never worth it inside a test run.
pub struct ModuleCache {
    config: HarnessConfig,
    modules: Mutex<HashMap<String, Arc<TestModule>>>,
}

impl ModuleCache {
    /// Empty cache resolving artifacts with `config`.
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache, configured from the environment on first use.
    pub fn global() -> &'static ModuleCache {
        static GLOBAL: OnceLock<ModuleCache> = OnceLock::new();
        GLOBAL.get_or_init(|| ModuleCache::new(HarnessConfig::from_env()))
    }

    /// Configuration used to locate artifacts.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Load `name`, or return the already loaded module.
    ///
    /// Loading holds the cache lock, so concurrent first loads of the same
    /// name open the artifact once.
    pub fn load(&self, name: &str) -> Result<Arc<TestModule>, LoadError> {
        let mut modules = self.modules.lock();
        if let Some(module) = modules.get(name) {
            tracing::debug!(module = name, "Test module cache hit");
            return Ok(Arc::clone(module));
        }

        let module = Arc::new(TestModule::open(name, &self.config)?);
        tracing::info!(
            module = name,
            path = %module.path().display(),
            handle = ?module,
            "Test module loaded"
        );
        modules.insert(name.to_string(), Arc::clone(&module));
        Ok(module)
    }

    /// Load `name`, aborting the test on failure.
    ///
    /// Without the artifact nothing meaningful can be asserted, so a load
    /// failure panics with the diagnostic, including the search path hint.
    pub fn load_or_abort(&self, name: &str) -> Arc<TestModule> {
        match self.load(name) {
            Ok(module) => module,
            Err(err) => {
                tracing::error!(module = name, error = %err, "Unable to load test module");
                panic!("{err}");
            }
        }
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize {
        self.modules.lock().len()
    }

    /// Whether no module has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.modules.lock().is_empty()
    }

    /// Whether `name` has been loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.lock().contains_key(name)
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.modules.lock().keys().cloned().collect();
        names.sort();
        f.debug_struct("ModuleCache")
            .field("config", &self.config)
            .field("modules", &names)
            .finish()
    }
}

/// [`ModuleCache::load`] on the [global](ModuleCache::global) cache.
pub fn load(name: &str) -> Result<Arc<TestModule>, LoadError> {
    ModuleCache::global().load(name)
}

/// [`ModuleCache::load_or_abort`] on the [global](ModuleCache::global) cache.
pub fn load_or_abort(name: &str) -> Arc<TestModule> {
    ModuleCache::global().load_or_abort(name)
}
