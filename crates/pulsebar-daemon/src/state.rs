//! Application state: the module registry and the sources behind it.

use anyhow::{Context, Result};
use pulsebar_engine::{
    ConfigStore, Module, ModuleEvent, ModuleEventKind, ReaderConfig, Registry, Scheduler,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::sensors::{
    BatterySource, CpuSource, DiskActivitySource, DiskSpaceSource, MemorySource, NetworkSource,
    ProcessSource, Reading, ThermalSource,
};

pub type Event = ModuleEvent<Reading>;

/// Owns every module and the popup visibility flag.
pub struct AppState {
    config: Config,
    registry: Registry,
    modules: Vec<Arc<Module<Reading>>>,
    visible: AtomicBool,
}

impl AppState {
    /// Builds all modules. Nothing samples until [`AppState::enable_saved`].
    pub fn new(
        config: Config,
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<dyn Scheduler>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Result<Self> {
        let mut state = Self {
            config,
            registry: Registry::new(store, scheduler),
            modules: Vec::new(),
            visible: AtomicBool::new(false),
        };

        let cpu = state.module("CPU", &events);
        cpu.add_source(CpuSource::new(), state.reader_config("CPU"))
            .context("Failed to create CPU reader")?;

        let ram = state.module("RAM", &events);
        ram.add_source(MemorySource::new(), state.reader_config("RAM"))
            .context("Failed to create memory reader")?;
        ram.add_source(
            ProcessSource::new(state.config.process_count),
            state.reader_config("RAM").popup_driven(),
        )
        .context("Failed to create process reader")?;

        let disk = state.module("Disk", &events);
        disk.add_source(
            DiskSpaceSource::new(&state.config.disk_mount),
            state.reader_config("Disk"),
        )
        .context("Failed to create disk space reader")?;
        let activity = match &state.config.disk_device {
            Some(device) => DiskActivitySource::new(device),
            None => DiskActivitySource::auto(),
        };
        disk.add_source(activity, state.reader_config("Disk"))
            .context("Failed to create disk activity reader")?;

        let network = state.module("Network", &events);
        let source = match &state.config.network_interface {
            Some(interface) => NetworkSource::new(interface),
            None => NetworkSource::auto(),
        };
        network
            .add_source(source, state.reader_config("Network"))
            .context("Failed to create network reader")?;

        let battery = state.module("Battery", &events);
        battery
            .add_source(BatterySource::new(), state.reader_config("Battery").optional())
            .context("Failed to create battery reader")?;

        let sensors = state.module("Sensors", &events);
        sensors
            .add_source(ThermalSource::new(), state.reader_config("Sensors").optional())
            .context("Failed to create thermal reader")?;

        info!("Created {} modules", state.modules.len());
        Ok(state)
    }

    fn module(&mut self, name: &str, events: &mpsc::UnboundedSender<Event>) -> Arc<Module<Reading>> {
        let module = self.registry.create_module::<Reading>(name);
        let events = events.clone();
        module.subscribe(move |event| {
            // Receiver gone means we are shutting down
            let _ = events.send(event.clone());
        });
        self.registry.register(module.clone());
        self.modules.push(module.clone());
        module
    }

    fn reader_config(&self, module: &str) -> ReaderConfig {
        ReaderConfig::new(self.config.modules.interval(module))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn modules(&self) -> &[Arc<Module<Reading>>] {
        &self.modules
    }

    /// Enables modules per the store, falling back to the configuration.
    pub fn enable_saved(&self) {
        let modules = &self.config.modules;
        self.registry
            .enable_saved(|name| modules.enabled(name));
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// Flips popup visibility and returns the new value.
    pub fn toggle_visible(&self) -> bool {
        let visible = !self.visible.fetch_xor(true, Ordering::SeqCst);
        self.registry.set_visible(visible);
        info!("Popup {}", if visible { "shown" } else { "hidden" });
        visible
    }

    /// Logs reader states and buffered history sizes.
    pub fn log_status(&self) {
        for module in &self.modules {
            for reader in module.status() {
                info!(
                    "{}/{}: {} ready={} history={}",
                    module.name(),
                    reader.name,
                    reader.state,
                    reader.ready,
                    reader.history_len
                );
            }
        }
    }

    pub fn shutdown(&self) {
        self.registry.terminate();
    }
}

/// Logs events until every sender is dropped.
pub async fn consume_events(mut events: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = events.recv().await {
        match event.kind {
            ModuleEventKind::Ready => info!("{}/{} ready", event.module, event.reader),
            ModuleEventKind::Value(reading) => info!("{}: {}", event.module, reading),
            ModuleEventKind::Failed => warn!(
                "{}/{} gave up after repeated empty samples",
                event.module, event.reader
            ),
        }
    }
    debug!("Event channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsebar_engine::{ManualScheduler, MemoryStore, ReaderState, TimerHandle};

    fn build(
        store: Arc<MemoryStore>,
        scheduler: Arc<ManualScheduler>,
    ) -> (AppState, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState::new(Config::default(), store, scheduler, tx).unwrap();
        (state, rx)
    }

    fn idle_build() -> (AppState, mpsc::UnboundedReceiver<Event>) {
        build(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualScheduler::deferred()),
        )
    }

    #[test]
    fn test_all_modules_registered() {
        let (state, _rx) = idle_build();
        let names: Vec<&str> = state.modules().iter().map(|m| m.name()).collect();
        assert_eq!(names, ["CPU", "RAM", "Disk", "Network", "Battery", "Sensors"]);
        assert_eq!(state.registry().modules().len(), 6);
        assert_eq!(state.modules()[1].reader_count(), 2);
    }

    #[test]
    fn test_nothing_runs_before_enable() {
        let (state, mut rx) = idle_build();
        for module in state.modules() {
            assert!(module
                .status()
                .iter()
                .all(|reader| reader.state == ReaderState::Idle));
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stored_interval_wins() {
        let store = Arc::new(MemoryStore::with_values([
            ("CPU_updateInterval", "3"),
            ("RAM_state", "false"),
            ("Disk_state", "false"),
            ("Network_state", "false"),
            ("Battery_state", "false"),
            ("Sensors_state", "false"),
        ]));
        let scheduler = Arc::new(ManualScheduler::deferred());
        let (state, _rx) = build(store, scheduler.clone());

        state.enable_saved();
        assert_eq!(scheduler.live_timers(), 1);
        assert_eq!(
            scheduler.interval(TimerHandle::from_raw(1)),
            Some(std::time::Duration::from_secs(3))
        );
    }

    #[test]
    fn test_disabled_module_stays_idle() {
        let store = Arc::new(MemoryStore::with_values([("Battery_state", "false")]));
        let (state, _rx) = build(store, Arc::new(ManualScheduler::deferred()));
        state.enable_saved();

        let battery = state.registry().get("Battery").unwrap();
        assert!(!battery.is_enabled());
        assert!(battery.status().iter().all(|r| r.state == ReaderState::Idle));
        assert!(state.registry().get("CPU").unwrap().is_enabled());

        state.shutdown();
        assert!(state.modules()[0]
            .status()
            .iter()
            .all(|r| r.state == ReaderState::Stopped));
    }

    #[test]
    fn test_toggle_visible() {
        let (state, _rx) = idle_build();
        assert!(!state.is_visible());
        assert!(state.toggle_visible());
        assert!(!state.toggle_visible());
    }

    #[tokio::test]
    async fn test_consume_events_drains_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ModuleEvent {
            module: "CPU".to_string(),
            reader: "cpu_load".to_string(),
            kind: ModuleEventKind::Ready,
        })
        .unwrap();
        drop(tx);
        consume_events(rx).await;
    }
}
