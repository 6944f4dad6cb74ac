//! Free-tier usage metering.
//!
//! Usage is derived by counting job-application rows over a trailing window;
//! there is no separate counter to keep in sync. The count reflects every
//! qualifying row, never a capped or sampled subset.

use chrono::{DateTime, Duration, Utc};

use crate::store::{Store, StoreError};

/// Trailing lookback for free-tier usage counting, in days.
pub const USAGE_WINDOW_DAYS: i64 = 30;

/// Counts the account's metered actions in `[now - window, now]`.
///
/// The lower bound is inclusive. Future-dated rows count like any other;
/// none are expected.
pub async fn usage_in_window(
    store: &dyn Store,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let since = now - Duration::days(USAGE_WINDOW_DAYS);
    store.count_applications_since(user_id, since).await
}
