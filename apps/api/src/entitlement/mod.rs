//! Entitlement core: subscription state derivation, free-tier usage
//! metering, and the per-action allow/deny gate.

pub mod gate;
pub mod metering;
pub mod subscription;

pub use gate::{ActionKind, Decision, DenyReason, EntitlementGate, FREE_OPTIMIZE_LIMIT};
pub use metering::{usage_in_window, USAGE_WINDOW_DAYS};
pub use subscription::{derive_subscription_state, SubscriptionState};
