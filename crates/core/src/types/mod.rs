//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod currency;
pub mod email;
pub mod id;
pub mod money;
pub mod username;

pub use currency::{CurrencyCode, CurrencyError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{MoneyError, cart_total, line_subtotal, round_for_display, to_minor_units};
pub use username::{Username, UsernameError};
