//! Checkout: validate the caller's cart and open a hosted payment session.
//!
//! The stock check here is advisory. Nothing is reserved; settlement debits
//! stock only after the gateway reports the payment complete.

use thiserror::Error;
use tracing::instrument;

use bazaar_core::{MoneyError, UserId, to_minor_units};

use crate::db::{RepositoryError, ShopStore};
use crate::models::CartLine;
use crate::payments::{HostedSession, PaymentError, PaymentGateway, SessionLine, SessionRequest};

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A line asks for more units than are in stock.
    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    /// A price could not be converted to minor units.
    #[error("invalid price: {0}")]
    Money(#[from] MoneyError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// The payment gateway failed.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] PaymentError),
}

/// Redirect targets handed to the gateway.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    store: &'a dyn ShopStore,
    gateway: &'a dyn PaymentGateway,
    urls: CheckoutUrls,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        store: &'a dyn ShopStore,
        gateway: &'a dyn PaymentGateway,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            store,
            gateway,
            urls,
        }
    }

    /// Open a hosted payment session for the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::InsufficientStock`
    /// without contacting the gateway, and `CheckoutError::Gateway` if the
    /// gateway fails.
    #[instrument(skip(self))]
    pub async fn start(&self, user_id: UserId) -> Result<HostedSession, CheckoutError> {
        let lines = self.store.cart_lines(user_id).await?;
        let request = self.session_request(user_id, &lines)?;

        let session = self.gateway.create_session(&request).await?;
        tracing::info!(session_id = %session.id, lines = lines.len(), "Checkout session created");
        Ok(session)
    }

    fn session_request(
        &self,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<SessionRequest, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut session_lines = Vec::with_capacity(lines.len());
        for line in lines {
            if !line.is_covered_by_stock() {
                tracing::info!(
                    product_id = %line.product.id,
                    requested = line.quantity,
                    available = line.product.amount,
                    "Checkout rejected for insufficient stock"
                );
                return Err(CheckoutError::InsufficientStock(line.product.name.clone()));
            }
            session_lines.push(SessionLine {
                name: line.product.name.clone(),
                unit_amount: to_minor_units(line.product.price)?,
                currency: line.product.currency.to_lowercase(),
                quantity: line.quantity,
            });
        }

        Ok(SessionRequest {
            user_id,
            lines: session_lines,
            success_url: self.urls.success_url.clone(),
            cancel_url: self.urls.cancel_url.clone(),
        })
    }
}
