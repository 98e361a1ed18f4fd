/// Default number of fetcher tasks per queue.
const DEFAULT_CONSUMERS: usize = 8;

/// Default number of handler tasks per queue.
const DEFAULT_PROCESSORS: usize = 8;

/// Settings for one queue consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConf {
    /// Service name used in logs.
    pub name: String,
    /// Topic to consume.
    pub topic: String,
    /// Consumer group. Each group receives every message on the topic once;
    /// queues sharing a group split its messages.
    pub group: String,
    /// Fetcher tasks pulling from the topic.
    pub consumers: usize,
    /// Tasks running the handler.
    pub processors: usize,
}

impl QueueConf {
    /// Load a queue's settings from `{PREFIX}_*` environment variables.
    ///
    /// | Env Var               | Default         |
    /// |-----------------------|-----------------|
    /// | `{PREFIX}_TOPIC`      | `default_topic` |
    /// | `{PREFIX}_GROUP`      | `default_group` |
    /// | `{PREFIX}_CONSUMERS`  | `8`             |
    /// | `{PREFIX}_PROCESSORS` | `8`             |
    ///
    /// Zero counts are raised to one.
    pub fn from_env(prefix: &str, name: &str, default_topic: &str, default_group: &str) -> Self {
        let var = |suffix: &str| std::env::var(format!("{prefix}_{suffix}"));

        let topic = var("TOPIC").unwrap_or_else(|_| default_topic.into());
        let group = var("GROUP").unwrap_or_else(|_| default_group.into());

        let consumers: usize = var("CONSUMERS")
            .unwrap_or_else(|_| DEFAULT_CONSUMERS.to_string())
            .parse()
            .unwrap_or_else(|_| panic!("{prefix}_CONSUMERS must be a valid usize"));

        let processors: usize = var("PROCESSORS")
            .unwrap_or_else(|_| DEFAULT_PROCESSORS.to_string())
            .parse()
            .unwrap_or_else(|_| panic!("{prefix}_PROCESSORS must be a valid usize"));

        Self {
            name: name.to_string(),
            topic,
            group,
            consumers: consumers.max(1),
            processors: processors.max(1),
        }
    }
}

/// Queue settings for the order message-queue service.
#[derive(Debug, Clone)]
pub struct MqConfig {
    /// Payment status change notifications.
    pub payment_update_status: QueueConf,
}

impl MqConfig {
    /// Load every queue's settings from the environment.
    pub fn from_env() -> Self {
        Self {
            payment_update_status: QueueConf::from_env(
                "PAYMENT_UPDATE_STATUS",
                "payment-update-status",
                "payment-update-paystatus-topic",
                "payment-update-paystatus-group",
            ),
        }
    }
}
