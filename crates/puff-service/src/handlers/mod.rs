//! HTTP request handlers.

pub mod admin;
pub mod health;
pub mod payments;
pub mod rewards;
pub mod vault;
pub mod webhooks;
