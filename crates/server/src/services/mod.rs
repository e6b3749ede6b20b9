//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login and bearer tokens
//! - `catalog` - Product listing and admin inventory
//! - `cart` - Per-user cart mutation and priced summary
//! - `checkout` - Cart validation and hosted payment sessions
//! - `settlement` - Completed-payment reconciliation
//!
//! Services borrow the store (and gateway) from `AppState` for the duration
//! of one request.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod settlement;
