pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};

use crate::applications::handlers as application_handlers;
use crate::billing::handlers as billing_handlers;
use crate::generation::handlers as generation_handlers;
use crate::resumes::handlers as resume_handlers;
use crate::resumes::handlers::MAX_UPLOAD_BYTES;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume intake
        .route(
            "/api/v1/resumes",
            post(resume_handlers::handle_upload_resume)
                .get(resume_handlers::handle_list_resumes)
                // Axum's default body limit is 2 MB; uploads go to 10 MB.
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 16 * 1024)),
        )
        .route("/api/v1/resumes/paste", post(resume_handlers::handle_paste_resume))
        .route("/api/v1/resumes/:id", get(resume_handlers::handle_get_resume))
        // Generation
        .route(
            "/api/v1/optimize-resume",
            post(generation_handlers::handle_optimize_resume),
        )
        .route(
            "/api/v1/cover-letters",
            post(generation_handlers::handle_generate_cover_letter),
        )
        // Application tracking
        .route(
            "/api/v1/applications",
            get(application_handlers::handle_list_applications),
        )
        .route(
            "/api/v1/applications/:id",
            get(application_handlers::handle_get_application)
                .patch(application_handlers::handle_update_application),
        )
        // Billing
        .route(
            "/api/v1/billing/subscription",
            get(billing_handlers::handle_get_subscription),
        )
        .route(
            "/api/v1/billing/checkout",
            post(billing_handlers::handle_create_checkout),
        )
        .route(
            "/api/v1/billing/portal",
            post(billing_handlers::handle_create_portal),
        )
        // Stripe webhook (signature-verified, not behind user auth)
        .route(
            "/webhooks/stripe",
            post(billing_handlers::handle_stripe_webhook),
        )
        .with_state(state)
}
