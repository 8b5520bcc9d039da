//! Service integrations for external systems.
//!
//! This module contains implementations for the services used by the auto-commenter:
//! - Messaging sessions (e.g., Telegram)
//! - The account store (e.g., a JSON file)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod messaging;
pub mod store;
