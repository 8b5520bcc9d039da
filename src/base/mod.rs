//! Core components and types for the auto-commenter.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Application settings loaded from the environment and an optional TOML file.
//! - Common types and result handling.

pub mod config;
pub mod types;
