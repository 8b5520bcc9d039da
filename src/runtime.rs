//! Runtime services and shared state for the auto-commenter.

use tracing::{info, instrument};

use crate::{
    base::{config::Config, types::Void},
    interaction::{menu::Menu, operator::Operator},
    service::{messaging::Connector, store::StoreClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the account store, the messaging connector, and configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The account store.
    pub store: StoreClient,
    /// The messaging connector.
    pub connector: Connector,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Self {
        // Initialize the account store.
        let store = StoreClient::json_file(config.store_path.clone());

        // Initialize the Telegram connector.
        let connector = Connector::telegram(&config);

        Self { config, store, connector }
    }

    /// Load the account store and show the menu until the operator exits.
    pub async fn start(&self, operator: Operator) -> Void {
        let mut accounts = self.store.load()?;

        info!("Loaded {} account(s) from {}.", accounts.accounts.len(), self.config.store_path.display());

        let menu = Menu::new(self.store.clone(), self.connector.clone(), operator, self.config.comment_delay());

        menu.run(&mut accounts).await
    }
}
