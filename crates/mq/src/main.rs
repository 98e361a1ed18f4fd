use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lodging_mq::{listen, Broker, MqConfig, ServiceGroup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lodging_mq=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = MqConfig::from_env();
    tracing::info!(
        topic = %config.payment_update_status.topic,
        group = %config.payment_update_status.group,
        "Loaded queue configuration"
    );

    // --- Queues ---
    let broker = Arc::new(Broker::default());
    let mut group = ServiceGroup::new();
    group.extend(listen::queue_services(&config, Arc::clone(&broker)));
    group.start_all();
    tracing::info!(services = group.len(), "Queue listeners started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    group.stop_all().await;
    Ok(())
}
