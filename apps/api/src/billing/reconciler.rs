//! Webhook reconciler.
//!
//! Applies billing-provider lifecycle events to the account store so derived
//! subscription state eventually agrees with the provider's records. Events
//! are deduplicated by provider event id, and an event older than the newest
//! one recorded for the account is kept in the ledger but not applied, so an
//! out-of-order redelivery cannot regress status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::billing::provider::PaymentProvider;
use crate::billing::stripe::{StripeCheckoutSession, StripeSubscription};
use crate::billing::webhook::StripeEvent;
use crate::billing::BillingError;
use crate::models::user::SubscriptionStatus;
use crate::store::{BillingEventRecord, Store, StoreError, UserUpdate};

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event mutated the account.
    Applied,
    /// The event id was recorded before; nothing changed.
    Duplicate,
    /// The event predates the newest recorded one for the account; recorded
    /// for bookkeeping, not applied.
    Stale,
    /// Event type outside the reconciled set; acknowledged as a no-op.
    Ignored,
}

/// Failure applying one event.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("event {event_id} carries no account id tag")]
    MissingAccountTag { event_id: String },

    #[error("no account matches billing customer {customer_id}")]
    UnknownCustomer { customer_id: String },

    #[error("malformed event payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Provider(#[from] BillingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Redelivery can never fix these; the caller should acknowledge the
    /// event and leave the error log as the paper trail, rather than provoke
    /// a retry storm.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingAccountTag { .. } | Self::UnknownCustomer { .. } | Self::MalformedPayload(_)
        )
    }
}

enum Screened {
    Proceed(BillingEventRecord),
    Skip(Outcome),
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn Store>,
    provider: Arc<dyn PaymentProvider>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { store, provider }
    }

    /// Applies one signature-verified event.
    ///
    /// Idempotent per event id. Only ACTIVE/PAST_DUE/CANCELLED transitions
    /// pass through here; nothing else in the codebase advances
    /// `subscription_status`.
    pub async fn apply(&self, event: &StripeEvent) -> Result<Outcome, ReconcileError> {
        match event.event_type.as_str() {
            "checkout.session.completed" => self.apply_checkout_completed(event).await,
            "customer.subscription.updated" => self.apply_subscription_updated(event).await,
            "customer.subscription.deleted" => self.apply_subscription_deleted(event).await,
            other => {
                info!("Ignoring webhook event type {other}");
                Ok(Outcome::Ignored)
            }
        }
    }

    async fn apply_checkout_completed(
        &self,
        event: &StripeEvent,
    ) -> Result<Outcome, ReconcileError> {
        let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        // The session must carry the account id stamped at checkout
        // creation; without it there is no row to update.
        let account_id = session
            .metadata
            .as_ref()
            .and_then(|m| m.get("account_id"))
            .cloned()
            .ok_or_else(|| ReconcileError::MissingAccountTag {
                event_id: event.id.clone(),
            })?;

        let subscription_id = session.subscription.ok_or_else(|| {
            ReconcileError::MalformedPayload("checkout session has no subscription".to_string())
        })?;

        let record = match self.screen(event, &account_id).await? {
            Screened::Proceed(record) => record,
            Screened::Skip(outcome) => return Ok(outcome),
        };

        // The completed-checkout payload does not carry period fields; ask
        // the provider for the subscription snapshot.
        let snapshot = self.provider.get_subscription(&subscription_id).await?;
        let period_end = epoch_to_datetime(snapshot.current_period_end)?;

        self.store
            .update_account(
                &account_id,
                UserUpdate {
                    subscription_status: Some(SubscriptionStatus::Active),
                    stripe_subscription_id: Some(Some(snapshot.id.clone())),
                    current_period_end: Some(Some(period_end)),
                    ..Default::default()
                },
            )
            .await?;
        self.store.record_billing_event(&record).await?;

        info!(
            "Checkout completed for account {account_id}: subscription {} active until {period_end}",
            snapshot.id
        );
        Ok(Outcome::Applied)
    }

    async fn apply_subscription_updated(
        &self,
        event: &StripeEvent,
    ) -> Result<Outcome, ReconcileError> {
        let subscription: StripeSubscription = serde_json::from_value(event.data.object.clone())
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        let user = self.resolve_by_customer(&subscription.customer).await?;

        let record = match self.screen(event, &user.id).await? {
            Screened::Proceed(record) => record,
            Screened::Skip(outcome) => return Ok(outcome),
        };

        let status = map_provider_status(&subscription.status);
        let period_end = epoch_to_datetime(subscription.current_period_end)?;

        // Period end is refreshed on every update, whatever the status maps
        // to; expiry enforcement happens at read time.
        self.store
            .update_account(
                &user.id,
                UserUpdate {
                    subscription_status: Some(status),
                    current_period_end: Some(Some(period_end)),
                    ..Default::default()
                },
            )
            .await?;
        self.store.record_billing_event(&record).await?;

        info!(
            "Subscription update for account {}: status {status:?}, period end {period_end}",
            user.id
        );
        Ok(Outcome::Applied)
    }

    async fn apply_subscription_deleted(
        &self,
        event: &StripeEvent,
    ) -> Result<Outcome, ReconcileError> {
        let subscription: StripeSubscription = serde_json::from_value(event.data.object.clone())
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        let user = self.resolve_by_customer(&subscription.customer).await?;

        let record = match self.screen(event, &user.id).await? {
            Screened::Proceed(record) => record,
            Screened::Skip(outcome) => return Ok(outcome),
        };

        self.store
            .update_account(
                &user.id,
                UserUpdate {
                    subscription_status: Some(SubscriptionStatus::Cancelled),
                    stripe_subscription_id: Some(None),
                    current_period_end: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        self.store.record_billing_event(&record).await?;

        info!("Subscription deleted for account {}; status CANCELLED", user.id);
        Ok(Outcome::Applied)
    }

    async fn resolve_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<crate::models::user::User, ReconcileError> {
        // A subscription event for a customer we never issued points at a
        // data-consistency fault between us and the provider, not a
        // transient failure.
        self.store
            .find_account_by_customer(customer_id)
            .await?
            .ok_or_else(|| ReconcileError::UnknownCustomer {
                customer_id: customer_id.to_string(),
            })
    }

    /// Ledger screening shared by every applied event kind: drop duplicates,
    /// park out-of-order events. On `Proceed` the caller applies the update
    /// and then writes the returned record, so a transient failure
    /// mid-apply leaves the event unrecorded and a redelivery can finish
    /// the job.
    async fn screen(
        &self,
        event: &StripeEvent,
        user_id: &str,
    ) -> Result<Screened, ReconcileError> {
        if self.store.has_billing_event(&event.id).await? {
            info!("Duplicate webhook event {}; skipping", event.id);
            return Ok(Screened::Skip(Outcome::Duplicate));
        }

        let event_created = epoch_to_datetime(event.created)?;
        let record = BillingEventRecord {
            event_id: event.id.clone(),
            user_id: user_id.to_string(),
            event_created,
        };

        if let Some(latest) = self.store.latest_billing_event_at(user_id).await? {
            if event_created < latest {
                warn!(
                    "Webhook event {} created {event_created} predates newest recorded {latest}; not applying",
                    event.id
                );
                self.store.record_billing_event(&record).await?;
                return Ok(Screened::Skip(Outcome::Stale));
            }
        }

        Ok(Screened::Proceed(record))
    }
}

/// Maps the provider's status vocabulary onto the local enum. Unrecognized
/// statuses map to FREE: never assume paid access on an unknown status.
fn map_provider_status(status: &str) -> SubscriptionStatus {
    match status {
        "active" => SubscriptionStatus::Active,
        "canceled" => SubscriptionStatus::Cancelled,
        "past_due" => SubscriptionStatus::PastDue,
        _ => SubscriptionStatus::Free,
    }
}

fn epoch_to_datetime(secs: i64) -> Result<DateTime<Utc>, ReconcileError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        ReconcileError::MalformedPayload(format!("timestamp {secs} out of range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::provider::SubscriptionSnapshot;
    use crate::billing::webhook::StripeEventData;
    use crate::models::user::User;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;

    struct StubProvider {
        subscription: SubscriptionSnapshot,
    }

    #[async_trait]
    impl PaymentProvider for StubProvider {
        async fn create_customer(
            &self,
            _email: &str,
            _account_id: &str,
        ) -> Result<String, BillingError> {
            unimplemented!("not exercised by reconciler tests")
        }

        async fn create_checkout_session(
            &self,
            _customer_id: &str,
            _price_id: &str,
            _account_id: &str,
            _success_url: &str,
            _cancel_url: &str,
        ) -> Result<crate::billing::provider::CheckoutSession, BillingError> {
            unimplemented!("not exercised by reconciler tests")
        }

        async fn create_portal_session(
            &self,
            _customer_id: &str,
            _return_url: &str,
        ) -> Result<crate::billing::provider::PortalSession, BillingError> {
            unimplemented!("not exercised by reconciler tests")
        }

        async fn get_subscription(
            &self,
            subscription_id: &str,
        ) -> Result<SubscriptionSnapshot, BillingError> {
            assert_eq!(subscription_id, self.subscription.id);
            Ok(self.subscription.clone())
        }
    }

    const PERIOD_END: i64 = 1_900_000_000;

    fn make_user(id: &str, customer_id: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            subscription_status: SubscriptionStatus::Free,
            stripe_customer_id: customer_id.map(str::to_string),
            stripe_subscription_id: None,
            current_period_end: None,
            created_at: Utc::now(),
        }
    }

    fn make_reconciler(store: Arc<MemoryStore>) -> Reconciler {
        let provider = Arc::new(StubProvider {
            subscription: SubscriptionSnapshot {
                id: "sub_123".to_string(),
                customer_id: "cus_123".to_string(),
                status: "active".to_string(),
                current_period_end: PERIOD_END,
            },
        });
        Reconciler::new(store, provider)
    }

    fn checkout_event(id: &str, created: i64, metadata: serde_json::Value) -> StripeEvent {
        StripeEvent {
            id: id.to_string(),
            event_type: "checkout.session.completed".to_string(),
            created,
            data: StripeEventData {
                object: json!({
                    "id": "cs_test_1",
                    "subscription": "sub_123",
                    "metadata": metadata,
                }),
            },
        }
    }

    fn subscription_event(
        id: &str,
        event_type: &str,
        created: i64,
        status: &str,
        period_end: i64,
    ) -> StripeEvent {
        StripeEvent {
            id: id.to_string(),
            event_type: event_type.to_string(),
            created,
            data: StripeEventData {
                object: json!({
                    "id": "sub_123",
                    "customer": "cus_123",
                    "status": status,
                    "current_period_end": period_end,
                }),
            },
        }
    }

    #[tokio::test]
    async fn test_checkout_completed_activates_account() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", None));
        let reconciler = make_reconciler(store.clone());

        let event = checkout_event("evt_1", 1_700_000_000, json!({"account_id": "user_a"}));
        let outcome = reconciler.apply(&event).await.unwrap();
        assert_eq!(outcome, Outcome::Applied);

        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
        assert_eq!(user.stripe_subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(
            user.current_period_end,
            Some(DateTime::from_timestamp(PERIOD_END, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_checkout_without_account_tag_is_fatal_and_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", None));
        let reconciler = make_reconciler(store.clone());

        let event = checkout_event("evt_1", 1_700_000_000, json!({}));
        let err = reconciler.apply(&event).await.unwrap_err();
        assert!(matches!(err, ReconcileError::MissingAccountTag { .. }));
        assert!(err.is_unrecoverable());

        // No account row moved.
        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Free);
        assert_eq!(user.stripe_subscription_id, None);
    }

    #[tokio::test]
    async fn test_subscription_updated_maps_status_and_refreshes_period_end() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());

        let event = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            1_700_000_000,
            "past_due",
            PERIOD_END,
        );
        let outcome = reconciler.apply(&event).await.unwrap();
        assert_eq!(outcome, Outcome::Applied);

        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::PastDue);
        assert_eq!(
            user.current_period_end,
            Some(DateTime::from_timestamp(PERIOD_END, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_unmapped_provider_status_defaults_to_free() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());

        let event = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            1_700_000_000,
            "incomplete_expired",
            PERIOD_END,
        );
        reconciler.apply(&event).await.unwrap();

        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Free);
    }

    #[tokio::test]
    async fn test_same_event_id_applies_once() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());

        let event = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            1_700_000_000,
            "active",
            PERIOD_END,
        );
        assert_eq!(reconciler.apply(&event).await.unwrap(), Outcome::Applied);
        assert_eq!(reconciler.apply(&event).await.unwrap(), Outcome::Duplicate);

        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_redelivered_payload_under_new_id_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());

        // Same payload, same created timestamp, fresh event id: applies
        // again and lands on the same state.
        let first = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            1_700_000_000,
            "active",
            PERIOD_END,
        );
        let second = subscription_event(
            "evt_2",
            "customer.subscription.updated",
            1_700_000_000,
            "active",
            PERIOD_END,
        );
        reconciler.apply(&first).await.unwrap();
        let after_first = store.user("user_a").unwrap();

        assert_eq!(reconciler.apply(&second).await.unwrap(), Outcome::Applied);
        let after_second = store.user("user_a").unwrap();

        assert_eq!(
            after_first.subscription_status,
            after_second.subscription_status
        );
        assert_eq!(
            after_first.current_period_end,
            after_second.current_period_end
        );
        assert_eq!(
            after_first.stripe_subscription_id,
            after_second.stripe_subscription_id
        );
    }

    #[tokio::test]
    async fn test_out_of_order_event_is_recorded_but_not_applied() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());

        let newer = subscription_event(
            "evt_2",
            "customer.subscription.updated",
            1_700_000_100,
            "active",
            PERIOD_END,
        );
        let older = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            1_700_000_000,
            "canceled",
            PERIOD_END,
        );

        assert_eq!(reconciler.apply(&newer).await.unwrap(), Outcome::Applied);
        assert_eq!(reconciler.apply(&older).await.unwrap(), Outcome::Stale);

        // The late cancel must not regress the newer active state.
        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);

        // And the stale event is in the ledger now, so a redelivery of it
        // dedupes instead of re-screening.
        assert_eq!(reconciler.apply(&older).await.unwrap(), Outcome::Duplicate);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = make_reconciler(store);

        let event = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            1_700_000_000,
            "active",
            PERIOD_END,
        );
        let err = reconciler.apply(&event).await.unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownCustomer { .. }));
        assert!(err.is_unrecoverable());
    }

    #[tokio::test]
    async fn test_subscription_deleted_clears_subscription_fields() {
        let store = Arc::new(MemoryStore::new());
        let mut user = make_user("user_a", Some("cus_123"));
        user.subscription_status = SubscriptionStatus::Active;
        user.stripe_subscription_id = Some("sub_123".to_string());
        user.current_period_end = Some(Utc::now() + Duration::days(10));
        store.insert_user(user);
        let reconciler = make_reconciler(store.clone());

        let event = subscription_event(
            "evt_1",
            "customer.subscription.deleted",
            1_700_000_000,
            "canceled",
            PERIOD_END,
        );
        assert_eq!(reconciler.apply(&event).await.unwrap(), Outcome::Applied);

        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Cancelled);
        assert_eq!(user.stripe_subscription_id, None);
        assert_eq!(user.current_period_end, None);
        // Customer reference survives cancellation.
        assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_123"));
    }

    #[tokio::test]
    async fn test_cancelled_is_not_terminal() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());

        let deleted = subscription_event(
            "evt_1",
            "customer.subscription.deleted",
            1_700_000_000,
            "canceled",
            PERIOD_END,
        );
        let resubscribed = subscription_event(
            "evt_2",
            "customer.subscription.updated",
            1_700_000_200,
            "active",
            PERIOD_END + 3600,
        );

        reconciler.apply(&deleted).await.unwrap();
        assert_eq!(
            store.user("user_a").unwrap().subscription_status,
            SubscriptionStatus::Cancelled
        );

        reconciler.apply(&resubscribed).await.unwrap();
        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
        assert_eq!(
            user.current_period_end,
            Some(DateTime::from_timestamp(PERIOD_END + 3600, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_unhandled_event_type_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());

        let event = StripeEvent {
            id: "evt_1".to_string(),
            event_type: "invoice.paid".to_string(),
            created: 1_700_000_000,
            data: StripeEventData {
                object: json!({"id": "in_1", "customer": "cus_123"}),
            },
        };
        assert_eq!(reconciler.apply(&event).await.unwrap(), Outcome::Ignored);

        let user = store.user("user_a").unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Free);
    }

    #[tokio::test]
    async fn test_store_failure_is_recoverable() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(make_user("user_a", Some("cus_123")));
        let reconciler = make_reconciler(store.clone());
        store.set_failing(true);

        let event = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            1_700_000_000,
            "active",
            PERIOD_END,
        );
        let err = reconciler.apply(&event).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Store(_)));
        assert!(!err.is_unrecoverable());

        // Once the store is back, the same delivery goes through.
        store.set_failing(false);
        assert_eq!(reconciler.apply(&event).await.unwrap(), Outcome::Applied);
    }
}
