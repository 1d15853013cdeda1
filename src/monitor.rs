use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::availability::{AvailabilitySnapshot, AvailabilityState, ServiceAvailability};
use crate::error::ServiceError;

/// An external provider whose availability is tracked and re-probed.
#[async_trait]
pub trait ExternalService: Send + Sync {
    fn availability(&self) -> &ServiceAvailability;

    /// Whether a credential is configured. Unconfigured services stay
    /// `Uninitialized` and are never probed.
    fn is_configured(&self) -> bool;

    /// Lists the provider's capabilities. `Ok(true)` means at least one usable
    /// target exists.
    async fn check_capabilities(&self) -> Result<bool, ServiceError>;
}

/// Runs one capability check and settles the service's state.
pub async fn probe(service: &dyn ExternalService) -> AvailabilityState {
    let availability = service.availability();
    availability.begin_probe();
    let usable = match service.check_capabilities().await {
        Ok(usable) => usable,
        Err(err) => {
            warn!("{} capability check failed: {}", availability.name(), err);
            false
        }
    };
    let state = availability.complete_probe(usable);
    info!("{} is {:?}", availability.name(), state);
    state
}

/// Owns the external services and the periodic re-probe loop.
pub struct AvailabilityMonitor {
    services: Vec<Arc<dyn ExternalService>>,
    interval: Duration,
}

/// Handle to a running monitor loop; dropping it does not stop the loop.
pub struct MonitorHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            warn!("availability monitor ended abnormally: {}", err);
        }
    }
}

impl AvailabilityMonitor {
    pub fn new(services: Vec<Arc<dyn ExternalService>>, interval: Duration) -> Self {
        Self { services, interval }
    }

    /// Startup probe of every configured service.
    pub async fn initialize(&self) {
        for service in &self.services {
            if !service.is_configured() {
                info!(
                    "{} has no credential configured; using fallback only",
                    service.availability().name()
                );
                continue;
            }
            probe(service.as_ref()).await;
        }
    }

    /// Re-probes services that are unavailable and past their backoff window.
    pub async fn tick_at(&self, now: Instant) {
        for service in &self.services {
            let availability = service.availability();
            if service.is_configured() && availability.needs_probe_at(now) {
                debug!("re-probing {}", availability.name());
                probe(service.as_ref()).await;
            }
        }
    }

    pub fn snapshots(&self) -> Vec<AvailabilitySnapshot> {
        self.services
            .iter()
            .map(|service| service.availability().snapshot())
            .collect()
    }

    /// Starts the re-probe loop. Ticks run one after another, never overlapping.
    pub fn spawn(self) -> MonitorHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => self.tick_at(Instant::now()).await,
                }
            }
            debug!("availability monitor stopped");
        });
        MonitorHandle { token, task }
    }
}
