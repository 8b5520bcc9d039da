//! Library root for `auto-commenter`.
//!
//! Auto-commenter posts a fixed comment under every new post in a set of
//! monitored Telegram channels, across multiple user accounts:
//! - Accounts and their (channel, comment) pairs live in a JSON document
//! - An interactive menu adds accounts and channels
//! - Monitoring logs every account in and comments after a configurable delay
//!
//! The architecture is built around small traits for the account store, the
//! messaging session and the operator, so each can be swapped out in tests.

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use interaction::operator::Operator;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Builds the runtime from `config` and runs the interactive menu on the console.
pub async fn start(config: Config) -> Void {
    info!("Starting auto-commenter ...");

    let runtime = runtime::Runtime::new(config);

    runtime.start(Operator::console()).await?;

    Ok(())
}
