//! Stripe payment provider.
//!
//! Thin REST client over Stripe's form-encoded API. Only the handful of
//! endpoints this service needs are implemented.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::billing::provider::{
    CheckoutSession, PaymentProvider, PortalSession, SubscriptionSnapshot,
};
use crate::billing::BillingError;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeProvider {
    client: Client,
    secret_key: String,
}

impl StripeProvider {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
        }
    }

    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<T, BillingError> {
        let url = format!("{STRIPE_API_BASE}{endpoint}");

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.secret_key, Option::<&str>::None);

        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Stripe API returned {status}: {message}");
            return Err(BillingError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BillingError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_customer(&self, email: &str, account_id: &str) -> Result<String, BillingError> {
        debug!("Creating Stripe customer for account {account_id}");

        let form = [("email", email), ("metadata[account_id]", account_id)];
        let customer: StripeCustomer = self
            .request(reqwest::Method::POST, "/customers", Some(&form))
            .await?;

        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        account_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError> {
        debug!("Creating checkout session for customer {customer_id}");

        let form = [
            ("customer", customer_id),
            ("mode", "subscription"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("metadata[account_id]", account_id),
        ];

        let session: StripeCheckoutSession = self
            .request(reqwest::Method::POST, "/checkout/sessions", Some(&form))
            .await?;

        let url = session
            .url
            .ok_or_else(|| BillingError::Decode("checkout session has no url".to_string()))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, BillingError> {
        debug!("Creating portal session for customer {customer_id}");

        let form = [("customer", customer_id), ("return_url", return_url)];
        let session: StripeBillingPortalSession = self
            .request(
                reqwest::Method::POST,
                "/billing_portal/sessions",
                Some(&form),
            )
            .await?;

        Ok(PortalSession { url: session.url })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, BillingError> {
        debug!("Fetching Stripe subscription {subscription_id}");

        let sub: StripeSubscription = self
            .request(
                reqwest::Method::GET,
                &format!("/subscriptions/{subscription_id}"),
                None,
            )
            .await?;

        Ok(SubscriptionSnapshot {
            id: sub.id,
            customer_id: sub.customer,
            status: sub.status,
            current_period_end: sub.current_period_end,
        })
    }
}

// Stripe wire shapes. StripeSubscription and StripeCheckoutSession double as
// webhook `data.object` payloads for the corresponding event types.

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_end: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub subscription: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct StripeBillingPortalSession {
    url: String,
}
