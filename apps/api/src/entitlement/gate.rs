//! Entitlement gate.
//!
//! Combines subscription state and usage metering into a per-action
//! allow/deny decision. The gate is read-only: the metered action's own
//! insert is what raises future counts, the gate never writes a counter.
//!
//! `AppState` carries one gate instance; handlers consult it before any
//! metered work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::entitlement::metering::usage_in_window;
use crate::entitlement::subscription::derive_subscription_state;
use crate::store::Store;

/// Optimization runs allowed per trailing window on the free tier.
pub const FREE_OPTIMIZE_LIMIT: i64 = 3;

/// Metered action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Optimize,
    CoverLetter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The account or its usage could not be read; the gate fails closed.
    StoreUnavailable,
    /// Paid-only action requested without an active subscription.
    SubscriptionRequired,
    /// Free-tier optimization quota is used up for the window.
    QuotaExhausted { used: i64, limit: i64 },
}

#[derive(Clone)]
pub struct EntitlementGate {
    store: Arc<dyn Store>,
}

impl EntitlementGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Decides whether `account_id` may perform `action` at time `now`.
    ///
    /// Total: store failures resolve to a deny instead of propagating, so
    /// callers always get an allow/deny answer.
    pub async fn can_perform(
        &self,
        account_id: &str,
        action: ActionKind,
        now: DateTime<Utc>,
    ) -> Decision {
        let account = match self.store.find_account(account_id).await {
            Ok(account) => account,
            Err(e) => {
                warn!("Entitlement check could not load account {account_id}: {e}; denying");
                return Decision::Deny(DenyReason::StoreUnavailable);
            }
        };

        let state = derive_subscription_state(account.as_ref(), now);

        // Subscribed accounts pass unconditionally, whatever the action.
        if state.is_subscribed {
            return Decision::Allow;
        }

        // Free tier: optimizations are metered; cover letters are not
        // available at any usage count.
        if state.is_free && action == ActionKind::Optimize {
            let used = match usage_in_window(self.store.as_ref(), account_id, now).await {
                Ok(used) => used,
                Err(e) => {
                    warn!("Entitlement check could not count usage for {account_id}: {e}; denying");
                    return Decision::Deny(DenyReason::StoreUnavailable);
                }
            };

            if used < FREE_OPTIMIZE_LIMIT {
                return Decision::Allow;
            }
            return Decision::Deny(DenyReason::QuotaExhausted {
                used,
                limit: FREE_OPTIMIZE_LIMIT,
            });
        }

        Decision::Deny(DenyReason::SubscriptionRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{SubscriptionStatus, User};
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn make_user(id: &str, status: SubscriptionStatus, period_end: Option<DateTime<Utc>>) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            subscription_status: status,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: period_end,
            created_at: Utc::now(),
        }
    }

    fn make_gate() -> (Arc<MemoryStore>, EntitlementGate) {
        let store = Arc::new(MemoryStore::new());
        let gate = EntitlementGate::new(store.clone());
        (store, gate)
    }

    #[tokio::test]
    async fn test_free_account_below_limit_allows_optimize() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user("user_a", SubscriptionStatus::Free, None));
        store.add_application("user_a", now - Duration::days(2));
        store.add_application("user_a", now - Duration::days(5));

        let decision = gate.can_perform("user_a", ActionKind::Optimize, now).await;
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_free_account_at_limit_denies_optimize() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user("user_a", SubscriptionStatus::Free, None));
        for day in 1..=3 {
            store.add_application("user_a", now - Duration::days(day));
        }

        let decision = gate.can_perform("user_a", ActionKind::Optimize, now).await;
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::QuotaExhausted { used: 3, limit: 3 })
        );
    }

    #[tokio::test]
    async fn test_aged_out_records_free_up_quota() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user("user_a", SubscriptionStatus::Free, None));
        for day in [1, 2, 45] {
            store.add_application("user_a", now - Duration::days(day));
        }

        // Only 2 of the 3 records fall inside the window.
        let decision = gate.can_perform("user_a", ActionKind::Optimize, now).await;
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_free_account_never_allowed_cover_letter() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user("user_a", SubscriptionStatus::Free, None));

        // Zero usage: still denied.
        let decision = gate
            .can_perform("user_a", ActionKind::CoverLetter, now)
            .await;
        assert_eq!(decision, Decision::Deny(DenyReason::SubscriptionRequired));

        // Heavy usage: same answer. There is no cover-letter quota to reach.
        for n in 0..1000 {
            store.add_application("user_a", now - Duration::minutes(n));
        }
        let decision = gate
            .can_perform("user_a", ActionKind::CoverLetter, now)
            .await;
        assert_eq!(decision, Decision::Deny(DenyReason::SubscriptionRequired));
    }

    #[tokio::test]
    async fn test_subscribed_account_allows_both_actions() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user(
            "user_a",
            SubscriptionStatus::Active,
            Some(now + Duration::days(20)),
        ));
        // Usage far past the free limit must not matter.
        for day in 1..=10 {
            store.add_application("user_a", now - Duration::days(day));
        }

        let optimize = gate.can_perform("user_a", ActionKind::Optimize, now).await;
        let cover = gate
            .can_perform("user_a", ActionKind::CoverLetter, now)
            .await;
        assert_eq!(optimize, Decision::Allow);
        assert_eq!(cover, Decision::Allow);
    }

    #[tokio::test]
    async fn test_expired_active_subscription_is_denied() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user(
            "user_a",
            SubscriptionStatus::Active,
            Some(now - Duration::hours(1)),
        ));

        // Lapsed ACTIVE is neither subscribed nor free, so it does not even
        // get the metered optimize path.
        let decision = gate.can_perform("user_a", ActionKind::Optimize, now).await;
        assert_eq!(decision, Decision::Deny(DenyReason::SubscriptionRequired));
    }

    #[tokio::test]
    async fn test_past_due_account_denied_optimize() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user("user_a", SubscriptionStatus::PastDue, None));

        let decision = gate.can_perform("user_a", ActionKind::Optimize, now).await;
        assert_eq!(decision, Decision::Deny(DenyReason::SubscriptionRequired));
    }

    #[tokio::test]
    async fn test_absent_account_is_metered_as_free() {
        let (_store, gate) = make_gate();
        let now = Utc::now();

        let optimize = gate.can_perform("ghost", ActionKind::Optimize, now).await;
        let cover = gate.can_perform("ghost", ActionKind::CoverLetter, now).await;
        assert_eq!(optimize, Decision::Allow);
        assert_eq!(cover, Decision::Deny(DenyReason::SubscriptionRequired));
    }

    #[tokio::test]
    async fn test_store_failure_denies_instead_of_erroring() {
        let (store, gate) = make_gate();
        let now = Utc::now();
        store.insert_user(make_user("user_a", SubscriptionStatus::Free, None));
        store.set_failing(true);

        let decision = gate.can_perform("user_a", ActionKind::Optimize, now).await;
        assert_eq!(decision, Decision::Deny(DenyReason::StoreUnavailable));
    }
}
