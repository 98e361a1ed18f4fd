//! Queue message handlers, one per consumed topic.

pub mod payment_update_status;

pub use payment_update_status::PaymentUpdateStatusMq;
