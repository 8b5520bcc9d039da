//! Operator-facing flows for the auto-commenter.
//!
//! This module provides:
//! - The operator input abstraction and its console implementation
//! - The interactive menu that edits the account store
//! - Session login and the per-channel comment handlers

pub mod menu;
pub mod monitor;
pub mod operator;
