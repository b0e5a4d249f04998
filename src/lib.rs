//! Verified Schemes: WhatsApp link-safety and program-information verifier.

pub mod classifier;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod localization;
pub mod session;
pub mod store;
pub mod webhook;
