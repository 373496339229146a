pub mod internal;
pub mod shop;
pub mod webhooks;
