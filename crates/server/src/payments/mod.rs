//! Payment gateway integration.
//!
//! This module provides:
//! - [`PaymentGateway`], the seam checkout uses to open hosted payment sessions
//! - [`StripeClient`], the Stripe Checkout implementation
//! - Webhook signature verification and event parsing in [`webhook`]
//!
//! # Flow
//!
//! 1. Checkout builds a [`SessionRequest`] from the caller's cart
//! 2. The gateway returns a [`HostedSession`] whose URL the client follows
//! 3. After payment the gateway posts a signed `checkout.session.completed`
//!    event to `/stripe/webhook`
//! 4. Settlement debits stock and records the payment

mod error;
mod stripe;
pub mod webhook;

use async_trait::async_trait;

use bazaar_core::UserId;

pub use error::{PaymentError, WebhookError};
pub use stripe::StripeClient;
pub use webhook::{WebhookEvent, compute_signature, verify_signature};

/// One line of a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLine {
    /// Product name shown on the payment page.
    pub name: String,
    /// Unit price in minor units.
    pub unit_amount: i64,
    /// Lower-case currency code.
    pub currency: String,
    pub quantity: i32,
}

/// Everything the gateway needs to open a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub user_id: UserId,
    pub lines: Vec<SessionLine>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A hosted checkout session opened by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedSession {
    pub id: String,
    /// Where the client is redirected to pay.
    pub url: String,
}

/// A provider of hosted payment pages.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the provider is unreachable or rejects the
    /// request.
    async fn create_session(&self, request: &SessionRequest)
    -> Result<HostedSession, PaymentError>;
}
