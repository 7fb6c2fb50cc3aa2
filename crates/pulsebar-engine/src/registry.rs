//! Application-wide registry of modules.
//!
//! Built once at start-up and passed by reference to whatever needs it. It
//! owns the shared preference store and scheduler and hands them to every
//! module it creates.

use crate::module::{Module, ReaderStatus};
use crate::scheduler::Scheduler;
use crate::store::{self, ConfigStore};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle verbs a module exposes upward, independent of its message type.
pub trait Lifecycle: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    fn enable(&self);
    fn disable(&self);
    fn terminate(&self);
    fn set_visible(&self, visible: bool);
    fn set_interval(&self, seconds: f64) -> Result<()>;
    fn status(&self) -> Vec<ReaderStatus>;
}

impl<M: Clone + Send + Sync + 'static> Lifecycle for Module<M> {
    fn name(&self) -> &str {
        Module::name(self)
    }

    fn is_enabled(&self) -> bool {
        Module::is_enabled(self)
    }

    fn enable(&self) {
        Module::enable(self)
    }

    fn disable(&self) {
        Module::disable(self)
    }

    fn terminate(&self) {
        Module::terminate(self)
    }

    fn set_visible(&self, visible: bool) {
        Module::set_visible(self, visible)
    }

    fn set_interval(&self, seconds: f64) -> Result<()> {
        Module::set_interval(self, seconds)
    }

    fn status(&self) -> Vec<ReaderStatus> {
        Module::status(self)
    }
}

/// Owner of every module in the process.
pub struct Registry {
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<dyn Scheduler>,
    modules: Vec<Arc<dyn Lifecycle>>,
}

impl Registry {
    pub fn new(store: Arc<dyn ConfigStore>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            store,
            scheduler,
            modules: Vec::new(),
        }
    }

    pub fn store(&self) -> Arc<dyn ConfigStore> {
        self.store.clone()
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.scheduler.clone()
    }

    /// Creates a module wired to the shared store and scheduler. It still
    /// has to be [registered](Registry::register).
    pub fn create_module<M: Clone + Send + Sync + 'static>(&self, name: &str) -> Arc<Module<M>> {
        Arc::new(Module::new(name, self.store.clone(), self.scheduler.clone()))
    }

    pub fn register(&mut self, module: Arc<dyn Lifecycle>) {
        debug!("Registered module {}", module.name());
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[Arc<dyn Lifecycle>] {
        &self.modules
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Lifecycle>> {
        self.modules
            .iter()
            .find(|module| module.name() == name)
            .ok_or_else(|| Error::UnknownModule(name.to_string()))
    }

    /// Enables every module whose stored `<module>_state` is true.
    ///
    /// `default_enabled` decides for modules with no stored state.
    pub fn enable_saved<F>(&self, default_enabled: F)
    where
        F: Fn(&str) -> bool,
    {
        for module in &self.modules {
            let key = store::state_key(module.name());
            if store::get_bool(self.store.as_ref(), &key, default_enabled(module.name())) {
                module.enable();
            } else {
                info!("Module {} is disabled", module.name());
            }
        }
    }

    /// Enables or disables a module and remembers the choice.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let module = self.get(name)?;
        self.store
            .set(&store::state_key(name), if enabled { "true" } else { "false" })?;
        if enabled {
            module.enable();
        } else {
            module.disable();
        }
        Ok(())
    }

    /// Forwards consumer visibility to every enabled module.
    pub fn set_visible(&self, visible: bool) {
        for module in &self.modules {
            module.set_visible(visible);
        }
    }

    /// Terminates every module.
    pub fn terminate(&self) {
        for module in &self.modules {
            module.terminate();
        }
        info!("Terminated {} modules", self.modules.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{ReaderConfig, ReaderState};
    use crate::scheduler::ManualScheduler;
    use crate::source::from_fn;
    use crate::store::MemoryStore;

    fn registry_with(store: Arc<MemoryStore>) -> (Registry, Arc<Module<u32>>, Arc<Module<u32>>) {
        let mut registry = Registry::new(store, Arc::new(ManualScheduler::new()));
        let cpu = registry.create_module::<u32>("CPU");
        let ram = registry.create_module::<u32>("RAM");
        for module in [&cpu, &ram] {
            module
                .add_source(from_fn("value", || Ok(Some(1u32))), ReaderConfig::new(1.0))
                .unwrap();
            registry.register(module.clone());
        }
        (registry, cpu, ram)
    }

    #[test]
    fn test_enable_saved_respects_store() {
        let store = Arc::new(MemoryStore::with_values([("RAM_state", "false")]));
        let (registry, cpu, ram) = registry_with(store);

        registry.enable_saved(|_| true);
        assert!(cpu.is_enabled());
        assert!(!ram.is_enabled());
        assert_eq!(ram.status()[0].state, ReaderState::Idle);
    }

    #[test]
    fn test_set_enabled_persists() {
        let store = Arc::new(MemoryStore::new());
        let (registry, cpu, _ram) = registry_with(store.clone());

        registry.set_enabled("CPU", true).unwrap();
        assert!(cpu.is_enabled());
        registry.set_enabled("CPU", false).unwrap();
        assert!(!cpu.is_enabled());
        assert_eq!(store.get("CPU_state", ""), "false");
        assert_eq!(cpu.status()[0].state, ReaderState::Paused);

        assert!(matches!(
            registry.set_enabled("GPU", true),
            Err(Error::UnknownModule(_))
        ));
    }

    #[test]
    fn test_terminate_all() {
        let (registry, cpu, ram) = registry_with(Arc::new(MemoryStore::new()));
        registry.enable_saved(|_| true);
        registry.terminate();
        for module in [cpu, ram] {
            assert!(!module.is_enabled());
            assert!(module
                .status()
                .iter()
                .all(|reader| reader.state == ReaderState::Stopped));
        }
        assert_eq!(registry.modules().len(), 2);
        assert!(registry.get("CPU").is_ok());
    }
}
