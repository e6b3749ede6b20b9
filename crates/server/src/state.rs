//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ShopConfig;
use crate::db::ShopStore;
use crate::payments::PaymentGateway;
use crate::services::auth::TokenIssuer;
use crate::services::checkout::CheckoutUrls;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, the payment gateway and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ShopConfig,
    store: Arc<dyn ShopStore>,
    gateway: Arc<dyn PaymentGateway>,
    tokens: TokenIssuer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Backing store (`PostgreSQL` or in-memory)
    /// * `gateway` - Payment gateway used at checkout
    #[must_use]
    pub fn new(
        config: ShopConfig,
        store: Arc<dyn ShopStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.auth);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                gateway,
                tokens,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ShopConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn ShopStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the payment gateway.
    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    /// Get a reference to the token issuer.
    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    /// Checkout redirect targets from configuration.
    #[must_use]
    pub fn checkout_urls(&self) -> CheckoutUrls {
        CheckoutUrls {
            success_url: self.inner.config.checkout_success_url.clone(),
            cancel_url: self.inner.config.checkout_cancel_url.clone(),
        }
    }
}
