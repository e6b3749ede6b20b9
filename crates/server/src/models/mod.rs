//! Domain models for the store.
//!
//! These are validated value objects returned by the stores. Database row
//! types stay private to `db::postgres`.

pub mod cart;
pub mod payment;
pub mod product;
pub mod user;

pub use cart::{CartItem, CartLine};
pub use payment::{NewPayment, PaymentRecord};
pub use product::{NewProduct, Product, ProductUpdate};
pub use user::{NewUser, User};
