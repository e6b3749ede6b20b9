//! Bazaar Core - Shared domain types.
//!
//! This crate provides the value types used across all Bazaar components:
//! - `server` - HTTP API, stores, checkout and settlement
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and pure arithmetic - no I/O, no database
//! access, no HTTP clients. Money math lives here so that checkout (gateway
//! amounts) and settlement (ledger totals) agree on rounding.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, usernames, currencies and money

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
