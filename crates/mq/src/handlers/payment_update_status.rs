//! Consumer for payment status change notifications.

use async_trait::async_trait;

use crate::queue::ConsumeHandler;

/// Listens for payment status changes so order state can follow them.
///
/// Acknowledges every message; order updates are not wired in yet.
#[derive(Debug, Default)]
pub struct PaymentUpdateStatusMq;

impl PaymentUpdateStatusMq {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConsumeHandler for PaymentUpdateStatusMq {
    async fn consume(&self, key: &str, value: &str) -> anyhow::Result<()> {
        tracing::info!(key, value, "Received payment status change");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acknowledges_messages() {
        let handler = PaymentUpdateStatusMq::new();
        handler
            .consume("order-1", r#"{"pay_status":1}"#)
            .await
            .unwrap();
    }
}
