//! Request identity.
//!
//! The API sits behind a reverse proxy that authenticates every request and
//! forwards the verified subject in trusted headers. The extractor resolves
//! those headers to an account, creating the row the first time a subject is
//! seen (sync-on-read) so no signup callback is needed.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;
use crate::store::NewAccount;

pub const SUBJECT_HEADER: &str = "x-auth-subject";
pub const EMAIL_HEADER: &str = "x-auth-email";

/// The authenticated caller.
///
/// Extraction rejects with 401 when the subject header is absent, or when an
/// unknown subject arrives without an email to create the account from.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let subject = header_value(parts, SUBJECT_HEADER).ok_or(AppError::Unauthorized)?;

        if let Some(user) = state.store.find_account(&subject).await? {
            return Ok(AuthUser {
                user_id: user.id,
                email: user.email,
            });
        }

        let email = header_value(parts, EMAIL_HEADER).ok_or(AppError::Unauthorized)?;
        let user = state
            .store
            .create_account(NewAccount { id: subject, email })
            .await?;
        info!("Created account {} on first authenticated request", user.id);

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
        })
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
