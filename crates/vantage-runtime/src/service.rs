//! Service assembly.
//!
//! `VantageService` owns the process-root instances of the correlation
//! registry, dispatcher, health monitor and reconciler, wires them to the
//! shared bus and stores, runs the inbound consumer loop and schedules the
//! maintenance sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use vantage_bus::MessageBus;
use vantage_commands::correlation::CorrelationRegistry;
use vantage_commands::dispatcher::CommandDispatcher;
use vantage_core::notify::Notifier;
use vantage_core::schedule::Scheduler;
use vantage_core::store::{DetectionStore, DeviceStore, IncidentStore};
use vantage_health::incident::IncidentDeduplicator;
use vantage_health::monitor::HealthMonitor;
use vantage_health::reconcile::Reconciler;

use crate::config::ServiceConfig;
use crate::router::InboundRouter;

/// Process root of the backend core.
pub struct VantageService {
    bus: Arc<dyn MessageBus>,
    detections: Arc<dyn DetectionStore>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<CorrelationRegistry>,
    dispatcher: Arc<CommandDispatcher>,
    monitor: Arc<HealthMonitor>,
    reconciler: Arc<Reconciler>,
    scheduler: Scheduler,
    config: ServiceConfig,
    router_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl VantageService {
    /// Assemble the service over a subscribed bus and the store/notifier
    /// collaborators.
    ///
    /// The bus must already be subscribed to the inbound topics for
    /// `config.consumer_name` (the MQTT adapter subscribes at connect, the
    /// memory bus at `register_consumer`).
    pub fn new(
        bus: Arc<dyn MessageBus>,
        devices: Arc<dyn DeviceStore>,
        incidents: Arc<dyn IncidentStore>,
        detections: Arc<dyn DetectionStore>,
        notifier: Arc<dyn Notifier>,
        config: ServiceConfig,
    ) -> Self {
        let registry = Arc::new(CorrelationRegistry::new());
        let dispatcher = Arc::new(CommandDispatcher::new(bus.clone(), registry.clone()));

        let reconciler = Arc::new(Reconciler::new(
            devices.clone(),
            detections.clone(),
            bus.clone(),
        ));
        let dedup = IncidentDeduplicator::new(incidents, notifier.clone());
        let monitor = Arc::new(HealthMonitor::new(devices, dedup, reconciler.clone()));

        Self {
            bus,
            detections,
            notifier,
            registry,
            dispatcher,
            monitor,
            reconciler,
            scheduler: Scheduler::new(),
            config,
            router_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Start the consumer loop and the maintenance sweep.
    pub async fn start(&self) {
        let router = InboundRouter::new(
            self.bus.clone(),
            self.registry.clone(),
            self.monitor.clone(),
            self.detections.clone(),
            self.notifier.clone(),
        );
        let consumer = self.config.consumer_name.clone();
        let handle = tokio::spawn(async move { router.run(&consumer).await });
        *self.router_handle.write().await = Some(handle);

        let monitor = self.monitor.clone();
        let reconciler = self.reconciler.clone();
        let registry = self.registry.clone();
        self.scheduler
            .schedule(
                Duration::from_secs(self.config.sweep_interval_secs),
                "maintenance-sweep",
                move || {
                    let monitor = monitor.clone();
                    let reconciler = reconciler.clone();
                    let registry = registry.clone();
                    async move {
                        monitor.sweep_stale().await;
                        if let Err(e) = reconciler.dedup_detections().await {
                            tracing::warn!(error = %e, "detection dedup failed");
                        }
                        let evicted = registry.sweep_expired();
                        if evicted > 0 {
                            tracing::debug!(evicted, "orphaned correlation entries evicted");
                        }
                    }
                },
            )
            .await;

        tracing::info!(
            consumer = %self.config.consumer_name,
            sweep_secs = self.config.sweep_interval_secs,
            "vantage service started"
        );
    }

    /// Stop the sweep and the consumer loop.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
        if let Some(handle) = self.router_handle.write().await.take() {
            handle.abort();
        }
        tracing::info!("vantage service stopped");
    }

    /// Dispatcher handle for request handlers.
    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        self.dispatcher.clone()
    }

    /// Correlation registry handle.
    pub fn registry(&self) -> Arc<CorrelationRegistry> {
        self.registry.clone()
    }

    /// Health monitor handle.
    pub fn monitor(&self) -> Arc<HealthMonitor> {
        self.monitor.clone()
    }

    /// Reconciler handle.
    pub fn reconciler(&self) -> Arc<Reconciler> {
        self.reconciler.clone()
    }
}
