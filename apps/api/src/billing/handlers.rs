use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::auth::AuthUser;
use crate::billing::webhook::{verify_signature, StripeEvent};
use crate::entitlement::subscription::{derive_subscription_state, SubscriptionState};
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::UserUpdate;

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// GET /api/v1/billing/subscription
///
/// Derived subscription state for the calling account, recomputed from raw
/// fields on every request.
pub async fn handle_get_subscription(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SubscriptionState>, AppError> {
    let account = state.store.find_account(&auth.user_id).await?;
    Ok(Json(derive_subscription_state(account.as_ref(), Utc::now())))
}

/// POST /api/v1/billing/checkout
///
/// Lazily creates the billing customer on first use, then starts a
/// subscription checkout session tagged with the account id.
pub async fn handle_create_checkout(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let user = state
        .store
        .find_account(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    let customer_id = match user.stripe_customer_id {
        Some(id) => id,
        None => {
            let id = state.provider.create_customer(&user.email, &user.id).await?;
            state
                .store
                .update_account(
                    &user.id,
                    UserUpdate {
                        stripe_customer_id: Some(id.clone()),
                        ..Default::default()
                    },
                )
                .await?;
            info!("Created billing customer {id} for account {}", user.id);
            id
        }
    };

    let success_url = format!("{}/dashboard?success=true", state.config.app_url);
    let cancel_url = format!("{}/pricing", state.config.app_url);
    let session = state
        .provider
        .create_checkout_session(
            &customer_id,
            &state.config.stripe_price_id,
            &user.id,
            &success_url,
            &cancel_url,
        )
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// POST /api/v1/billing/portal
pub async fn handle_create_portal(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PortalResponse>, AppError> {
    let user = state
        .store
        .find_account(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    let customer_id = user
        .stripe_customer_id
        .ok_or_else(|| AppError::NotFound("No subscription found".to_string()))?;

    let return_url = format!("{}/dashboard", state.config.app_url);
    let session = state
        .provider
        .create_portal_session(&customer_id, &return_url)
        .await?;

    Ok(Json(PortalResponse { url: session.url }))
}

/// POST /webhooks/stripe
///
/// Raw-body endpoint: signature verification needs the exact bytes. Returns
/// 400 for unverifiable envelopes, 200 for everything the reconciler
/// resolved (including unrecoverable correlation failures, which redelivery
/// can never fix), and 500 only for transient store/provider errors so the
/// provider retries.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    let Some(signature) = signature else {
        return webhook_rejection(StatusCode::BAD_REQUEST, "Missing Stripe-Signature header");
    };

    if let Err(e) = verify_signature(&body, signature, &state.config.stripe_webhook_secret) {
        warn!("Webhook signature rejected: {e}");
        return webhook_rejection(StatusCode::BAD_REQUEST, "Invalid webhook signature");
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Webhook payload did not parse: {e}");
            return webhook_rejection(StatusCode::BAD_REQUEST, "Malformed webhook payload");
        }
    };

    match state.reconciler.apply(&event).await {
        Ok(outcome) => {
            info!("Webhook event {} ({}): {outcome:?}", event.id, event.event_type);
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(e) if e.is_unrecoverable() => {
            // Redelivery can never fix these; acknowledge and keep the log.
            error!(
                "Webhook event {} ({}) failed unrecoverably: {e}",
                event.id, event.event_type
            );
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(e) => {
            error!("Webhook event {} ({}) failed: {e}", event.id, event.event_type);
            webhook_rejection(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Event processing failed",
            )
        }
    }
}

fn webhook_rejection(status: StatusCode, message: &str) -> Response {
    let code = match status {
        StatusCode::BAD_REQUEST => "WEBHOOK_REJECTED",
        _ => "WEBHOOK_ERROR",
    };
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message
        }
    }));
    (status, body).into_response()
}
