//! Registration of every queue consumer this process runs.

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::MqConfig;
use crate::handlers::PaymentUpdateStatusMq;
use crate::queue::Queue;
use crate::service::Service;

/// Build one [`Queue`] service per consumed topic.
pub fn queue_services(config: &MqConfig, broker: Arc<Broker>) -> Vec<Box<dyn Service>> {
    vec![
        // Payment status changes.
        Box::new(Queue::new(
            config.payment_update_status.clone(),
            Arc::clone(&broker),
            Arc::new(PaymentUpdateStatusMq::new()),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use crate::config::QueueConf;

    use super::*;

    #[test]
    fn registers_payment_update_status_queue() {
        let config = MqConfig {
            payment_update_status: QueueConf {
                name: "payment-update-status".into(),
                topic: "payment-update-paystatus-topic".into(),
                group: "payment-update-paystatus-group".into(),
                consumers: 1,
                processors: 1,
            },
        };

        let services = queue_services(&config, Arc::new(Broker::default()));

        let names: Vec<&str> = services.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["payment-update-status"]);
    }
}
