//! Request handlers, one module per resource.

pub mod agreement;
pub mod auth;
pub mod broker;
pub mod dispute;
pub mod events;
pub mod health;
pub mod matches;
pub mod referral;
