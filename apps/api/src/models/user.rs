use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Subscription lifecycle status, advanced only by the webhook reconciler.
///
/// Stored as the Postgres enum `subscription_status`. An account starts at
/// FREE and moves between ACTIVE, PAST_DUE and CANCELLED as billing events
/// arrive; CANCELLED is not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Free,
    Active,
    PastDue,
    Cancelled,
}

/// A registered account, keyed by the identity provider's subject id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Opaque subject id assigned by the external identity provider.
    pub id: String,
    pub email: String,
    pub subscription_status: SubscriptionStatus,
    /// Billing-provider customer reference; set once on first checkout, never cleared.
    pub stripe_customer_id: Option<String>,
    /// Billing-provider subscription reference; cleared when the subscription is deleted.
    pub stripe_subscription_id: Option<String>,
    /// Paid-period expiry; compared against the current time on every entitlement read.
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
