//! HTTP request handlers.

pub mod checkout;
pub mod enhance;
pub mod health;
pub mod users;
pub mod webhooks;
