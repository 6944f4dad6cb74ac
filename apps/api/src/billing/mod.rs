// Billing: Stripe client, webhook verification, and the reconciler that
// applies provider lifecycle events to the account store.
// All provider traffic goes through the PaymentProvider trait; handlers and
// the reconciler never talk HTTP directly.

pub mod error;
pub mod handlers;
pub mod provider;
pub mod reconciler;
pub mod stripe;
pub mod webhook;

pub use error::BillingError;
pub use provider::PaymentProvider;
pub use reconciler::{Outcome, ReconcileError, Reconciler};
