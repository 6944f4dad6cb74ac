//! Subscription state derivation.
//!
//! Pure computation over an account snapshot and the current wall-clock time.
//! The result is never persisted or cached: `current_period_end` expiry must
//! be detected at read time, so every caller recomputes from raw fields.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::user::{SubscriptionStatus, User};

/// Derived view of an account's subscription, computed per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionState {
    pub is_subscribed: bool,
    pub is_free: bool,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Derives subscription state from an account snapshot at time `now`.
///
/// An absent account derives to the fixed not-subscribed free shape. A
/// PAST_DUE or CANCELLED account is neither subscribed nor free; those
/// statuses fall through to "not entitled" downstream.
pub fn derive_subscription_state(account: Option<&User>, now: DateTime<Utc>) -> SubscriptionState {
    let Some(user) = account else {
        return SubscriptionState {
            is_subscribed: false,
            is_free: true,
            status: SubscriptionStatus::Free,
            current_period_end: None,
        };
    };

    let is_subscribed = user.subscription_status == SubscriptionStatus::Active
        && user
            .current_period_end
            .map(|end| end > now)
            .unwrap_or(false);

    SubscriptionState {
        is_subscribed,
        is_free: user.subscription_status == SubscriptionStatus::Free,
        status: user.subscription_status,
        current_period_end: user.current_period_end,
    }
}
