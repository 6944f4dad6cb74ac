use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::user::User;

use super::{BillingEventRecord, NewAccount, Store, StoreError, UserUpdate};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_account(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_account_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE stripe_customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn create_account(&self, account: NewAccount) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email) VALUES ($1, $2) RETURNING *",
        )
        .bind(&account.id)
        .bind(&account.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_account(&self, id: &str, update: UserUpdate) -> Result<User, StoreError> {
        // Boolean guards drive the clearable columns: $4/$6 say whether to
        // touch the column at all, $5/$7 carry the new value (possibly NULL).
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET subscription_status = COALESCE($2, subscription_status),
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                stripe_subscription_id = CASE WHEN $4 THEN $5 ELSE stripe_subscription_id END,
                current_period_end = CASE WHEN $6 THEN $7 ELSE current_period_end END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.subscription_status)
        .bind(update.stripe_customer_id)
        .bind(update.stripe_subscription_id.is_some())
        .bind(update.stripe_subscription_id.flatten())
        .bind(update.current_period_end.is_some())
        .bind(update.current_period_end.flatten())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn count_applications_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        // No LIMIT here: the gate must see every qualifying row.
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM job_applications WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn has_billing_event(&self, event_id: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM billing_events WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn latest_billing_event_at(
        &self,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(event_created) FROM billing_events WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(latest)
    }

    async fn record_billing_event(&self, event: &BillingEventRecord) -> Result<(), StoreError> {
        // Conflicts are expected when the provider redelivers concurrently.
        sqlx::query(
            r#"
            INSERT INTO billing_events (event_id, user_id, event_created)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.user_id)
        .bind(event.event_created)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
