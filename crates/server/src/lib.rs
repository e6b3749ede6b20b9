//! Bazaar store server library.
//!
//! Users, catalog, per-user carts, checkout through a hosted payment page and
//! webhook-driven settlement, exposed as a JSON API. The binary and the
//! integration tests both build the router from [`routes::app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
