use thiserror::Error;

/// Errors talking to the billing provider or verifying its webhooks.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Transport-level failure reaching the provider.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// The provider's response did not match the expected shape.
    #[error("unexpected provider response: {0}")]
    Decode(String),

    /// Webhook envelope failed signature verification or parsing.
    #[error("webhook error: {0}")]
    Webhook(String),
}
