use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::user::{SubscriptionStatus, User};

use super::{BillingEventRecord, NewAccount, Store, StoreError, UserUpdate};

/// In-memory store for tests and local development.
///
/// The lock is held only across the synchronous body of each operation, so
/// the async trait methods never suspend while holding it.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing: AtomicBool,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    applications: Vec<(String, DateTime<Utc>)>,
    events: HashMap<String, BillingEventRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail, for exercising fail-closed paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Seeds an account directly, bypassing `create_account`.
    pub fn insert_user(&self, user: User) {
        self.lock().users.insert(user.id.clone(), user);
    }

    /// Seeds one metered action record with an explicit creation time.
    pub fn add_application(&self, user_id: &str, created_at: DateTime<Utc>) {
        self.lock()
            .applications
            .push((user_id.to_string(), created_at));
    }

    /// Snapshot of an account row, for asserting on reconciler effects.
    pub fn user(&self, id: &str) -> Option<User> {
        self.lock().users.get(id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_account(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self.lock().users.get(id).cloned())
    }

    async fn find_account_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn create_account(&self, account: NewAccount) -> Result<User, StoreError> {
        self.check_available()?;
        let user = User {
            id: account.id,
            email: account.email,
            subscription_status: SubscriptionStatus::Free,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: None,
            created_at: Utc::now(),
        };
        self.lock().users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update_account(&self, id: &str, update: UserUpdate) -> Result<User, StoreError> {
        self.check_available()?;
        let mut inner = self.lock();
        let user = inner
            .users
            .get_mut(id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

        if let Some(status) = update.subscription_status {
            user.subscription_status = status;
        }
        if let Some(customer_id) = update.stripe_customer_id {
            user.stripe_customer_id = Some(customer_id);
        }
        if let Some(subscription_id) = update.stripe_subscription_id {
            user.stripe_subscription_id = subscription_id;
        }
        if let Some(period_end) = update.current_period_end {
            user.current_period_end = period_end;
        }

        Ok(user.clone())
    }

    async fn count_applications_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.check_available()?;
        let count = self
            .lock()
            .applications
            .iter()
            .filter(|(owner, created_at)| owner == user_id && *created_at >= since)
            .count();
        Ok(count as i64)
    }

    async fn has_billing_event(&self, event_id: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.lock().events.contains_key(event_id))
    }

    async fn latest_billing_event_at(
        &self,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .events
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.event_created)
            .max())
    }

    async fn record_billing_event(&self, event: &BillingEventRecord) -> Result<(), StoreError> {
        self.check_available()?;
        self.lock()
            .events
            .entry(event.event_id.clone())
            .or_insert_with(|| event.clone());
        Ok(())
    }
}
