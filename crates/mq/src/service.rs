//! Long-running services started and stopped as a group.

use async_trait::async_trait;

/// A background service owned by a [`ServiceGroup`].
#[async_trait]
pub trait Service: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Spawn the service's tasks. Must be called from within a runtime.
    fn start(&mut self);

    /// Signal the service's tasks to finish and wait for them.
    async fn stop(&mut self);
}

/// Services started together and stopped in reverse order.
#[derive(Default)]
pub struct ServiceGroup {
    services: Vec<Box<dyn Service>>,
}

impl ServiceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    pub fn extend(&mut self, services: impl IntoIterator<Item = Box<dyn Service>>) {
        self.services.extend(services);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn start_all(&mut self) {
        for service in &mut self.services {
            tracing::info!(service = service.name(), "Starting service");
            service.start();
        }
    }

    pub async fn stop_all(&mut self) {
        for service in self.services.iter_mut().rev() {
            tracing::info!(service = service.name(), "Stopping service");
            service.stop().await;
        }
    }
}
