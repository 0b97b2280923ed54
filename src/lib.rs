//! EVA Assist: billing chat assistant core.

pub mod channels;
pub mod chat;
pub mod config;
pub mod dialogue;
pub mod documents;
pub mod error;
pub mod identity;
pub mod store;
