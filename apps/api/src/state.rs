use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::billing::{PaymentProvider, Reconciler};
use crate::config::Config;
use crate::entitlement::EntitlementGate;
use crate::llm_client::LlmClient;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub llm: LlmClient,
    /// Plain HTTP client for fetching job postings by URL.
    pub http: reqwest::Client,
    pub config: Config,
    /// Account store behind the entitlement and billing paths. Postgres in
    /// production; the tests swap in an in-memory implementation.
    pub store: Arc<dyn Store>,
    pub gate: EntitlementGate,
    pub provider: Arc<dyn PaymentProvider>,
    pub reconciler: Reconciler,
}
