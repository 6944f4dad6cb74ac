use async_trait::async_trait;

use crate::billing::BillingError;

/// A checkout session created at the provider.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page the caller redirects the user to.
    pub url: String,
}

/// A self-service billing portal session.
#[derive(Debug, Clone)]
pub struct PortalSession {
    pub url: String,
}

/// A subscription as the provider currently sees it.
#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub customer_id: String,
    /// Provider status vocabulary ("active", "past_due", ...); the reconciler
    /// maps it onto the local enum.
    pub status: String,
    /// Paid-period expiry in epoch seconds.
    pub current_period_end: i64,
}

/// Payment provider abstraction.
///
/// Carried in `AppState` as `Arc<dyn PaymentProvider>` so the checkout
/// handlers and the reconciler can be exercised against a stub.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a billing customer tagged with the account id, returning the
    /// provider's customer id.
    async fn create_customer(&self, email: &str, account_id: &str) -> Result<String, BillingError>;

    /// Starts a subscription checkout for the customer. The session carries
    /// the account id in metadata so the completion webhook can correlate it.
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        account_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError>;

    /// Opens a billing portal session for subscription self-management.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, BillingError>;

    /// Fetches the current subscription snapshot by provider subscription id.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, BillingError>;
}
