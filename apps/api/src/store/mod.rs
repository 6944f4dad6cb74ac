mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::user::{SubscriptionStatus, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable")]
    Unavailable,
}

/// Fields needed to create an account on first authenticated request.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: String,
    pub email: String,
}

/// Partial update applied to an account row.
///
/// Outer `None` leaves the column untouched. The double-`Option` fields can
/// also clear the column (`Some(None)`), which a plain `Option` cannot
/// express. `stripe_customer_id` has no clear form: it is set once and never
/// removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub subscription_status: Option<SubscriptionStatus>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<Option<String>>,
    pub current_period_end: Option<Option<DateTime<Utc>>>,
}

/// Receipt of one provider billing event, kept for deduplication and
/// out-of-order detection.
#[derive(Debug, Clone)]
pub struct BillingEventRecord {
    pub event_id: String,
    pub user_id: String,
    /// Provider-side creation time of the event.
    pub event_created: DateTime<Utc>,
}

/// Persistence operations required by the entitlement gate and the webhook
/// reconciler.
///
/// Constructed once at process start and handed to its consumers as a shared
/// handle; there is no lazily-initialized global.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_account(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_account_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Inserts a new account; subscription fields start at their defaults.
    async fn create_account(&self, account: NewAccount) -> Result<User, StoreError>;

    async fn update_account(&self, id: &str, update: UserUpdate) -> Result<User, StoreError>;

    /// Number of job applications the account created at or after `since`.
    async fn count_applications_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Whether a billing event with this provider event id was already recorded.
    async fn has_billing_event(&self, event_id: &str) -> Result<bool, StoreError>;

    /// Provider-side creation time of the newest billing event recorded for
    /// the account, if any.
    async fn latest_billing_event_at(
        &self,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn record_billing_event(&self, event: &BillingEventRecord) -> Result<(), StoreError>;
}
