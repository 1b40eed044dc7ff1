use futures::future::select_all;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::{Service, ServiceResult, run_service};
use crate::utils::fmt_duration;

/// Manages registered services and their lifecycle: spawn, wait for the
/// first completion, and fan out graceful shutdown under a deadline.
pub struct ServiceManager {
    registered_services: HashMap<String, Box<dyn Service>>,
    running_services: HashMap<String, JoinHandle<ServiceResult>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registered_services: HashMap::new(),
            running_services: HashMap::new(),
            shutdown_tx,
        }
    }

    /// Register a service to be managed (not yet spawned)
    pub fn register_service(&mut self, name: &str, service: Box<dyn Service>) {
        self.registered_services.insert(name.to_string(), service);
    }

    /// Spawn all registered services
    pub fn spawn_all(&mut self) {
        let service_names: Vec<_> = self.registered_services.keys().cloned().collect();

        for (name, service) in self.registered_services.drain() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(run_service(service, shutdown_rx));
            self.running_services.insert(name, handle);
        }

        info!(services = ?service_names, "spawned {} services", service_names.len());
    }

    /// Wait until any service completes or fails, returning its name and
    /// result. Panicked tasks surface as errors.
    ///
    /// Handles are polled by reference, never moved out: callers race this
    /// future against signal arrival in a `select!`, and a dropped poll must
    /// leave every handle in place for the shutdown pass to await.
    pub async fn run(&mut self) -> (String, ServiceResult) {
        if self.running_services.is_empty() {
            return (
                "none".to_string(),
                ServiceResult::Error(anyhow::anyhow!("No services to run")),
            );
        }

        let (names, joined, index) = {
            let (names, handles): (Vec<String>, Vec<&mut JoinHandle<ServiceResult>>) = self
                .running_services
                .iter_mut()
                .map(|(name, handle)| (name.clone(), handle))
                .unzip();
            let (joined, index, _remaining) = select_all(handles).await;
            (names, joined, index)
        };

        let name = names[index].clone();
        self.running_services.remove(&name);

        match joined {
            Ok(result) => (name, result),
            Err(e) => {
                error!(service = name, "service task panicked: {e}");
                (
                    name.clone(),
                    ServiceResult::Error(anyhow::anyhow!("Task panic: {e}")),
                )
            }
        }
    }

    /// Shutdown all services gracefully with a timeout.
    ///
    /// Returns the elapsed duration on success, or the names of services
    /// that failed to stop in time.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<Duration, Vec<String>> {
        let service_names: Vec<_> = self.running_services.keys().cloned().collect();

        info!(
            services = ?service_names,
            timeout = fmt_duration(timeout),
            "shutting down {} services",
            service_names.len()
        );

        // Signal everyone, then drain with the shared deadline
        let _ = self.shutdown_tx.send(());

        let start_time = std::time::Instant::now();
        let mut pending_services = Vec::new();

        for (name, handle) in self.running_services.drain() {
            let remaining = timeout.saturating_sub(start_time.elapsed());
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(_)) => {
                    debug!(service = name, "service shutdown completed");
                }
                Ok(Err(e)) => {
                    warn!(service = name, error = ?e, "service shutdown failed");
                    pending_services.push(name);
                }
                Err(_) => {
                    warn!(service = name, "service shutdown timed out");
                    pending_services.push(name);
                }
            }
        }

        let elapsed = start_time.elapsed();
        if pending_services.is_empty() {
            info!(
                elapsed = fmt_duration(elapsed),
                "services shutdown completed: {}",
                service_names.join(", ")
            );
            Ok(elapsed)
        } else {
            warn!(
                pending_services = ?pending_services,
                elapsed = fmt_duration(elapsed),
                "services shutdown completed with {} pending",
                pending_services.len()
            );
            Err(pending_services)
        }
    }
}
