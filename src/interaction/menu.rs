//! Interactive numbered menu.
//!
//! Ctrl+C stops monitoring and returns to the menu. Anywhere else it ends the
//! menu with an `Interrupted.` error.

use std::time::Duration;

use anyhow::anyhow;
use tracing::{info, instrument, warn};

use crate::{
    base::types::Void,
    interaction::{monitor, operator::Operator},
    service::{
        messaging::Connector,
        store::{Account, Accounts, Channel, StoreClient},
    },
};

/// One entry of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    AddAccount,
    AddChannel,
    StartMonitoring,
    Exit,
    Invalid,
}

impl From<&str> for MenuChoice {
    fn from(input: &str) -> Self {
        match input.trim() {
            "1" => MenuChoice::AddAccount,
            "2" => MenuChoice::AddChannel,
            "3" => MenuChoice::StartMonitoring,
            "4" => MenuChoice::Exit,
            _ => MenuChoice::Invalid,
        }
    }
}

/// The menu and the services its actions need.
#[derive(Clone)]
pub struct Menu {
    store: StoreClient,
    connector: Connector,
    operator: Operator,
    comment_delay: Duration,
}

impl Menu {
    pub fn new(store: StoreClient, connector: Connector, operator: Operator, comment_delay: Duration) -> Self {
        Self {
            store,
            connector,
            operator,
            comment_delay,
        }
    }

    /// Show the menu until the operator chooses to exit.
    ///
    /// Authentication failures while starting to monitor end the loop with an error.
    pub async fn run(&self, accounts: &mut Accounts) -> Void {
        loop {
            self.operator.say("");
            self.operator.say("1. Add new account");
            self.operator.say("2. Add channel to existing account");
            self.operator.say("3. Start monitoring");
            self.operator.say("4. Exit");

            let choice = self.operator.prompt("Enter your choice: ").await?;

            match MenuChoice::from(choice.as_str()) {
                MenuChoice::AddAccount => self.add_account(accounts).await?,
                MenuChoice::AddChannel => self.add_channel(accounts).await?,
                MenuChoice::StartMonitoring => self.start_monitoring(accounts).await?,
                MenuChoice::Exit => {
                    self.operator.say("Exiting...");
                    return Ok(());
                }
                MenuChoice::Invalid => self.operator.say("Invalid choice. Please try again."),
            }
        }
    }

    /// Prompt for credentials and store a new account with no channels.
    #[instrument(skip_all)]
    pub async fn add_account(&self, accounts: &mut Accounts) -> Void {
        let phone = self.operator.prompt("Enter phone number: ").await?;
        let api_id = self.operator.prompt("Enter API ID: ").await?;

        let Ok(api_id) = api_id.trim().parse::<i32>() else {
            warn!("Rejected non-numeric API ID.");
            self.operator.say("Invalid API ID. It must be a number.");
            return Ok(());
        };

        let api_hash = self.operator.prompt("Enter API Hash: ").await?;

        self.store.add_account(accounts, Account::new(phone, api_id, api_hash))?;
        self.operator.say("Account added successfully!");

        Ok(())
    }

    /// Prompt for an account, a channel name and a comment, and store the channel.
    #[instrument(skip_all)]
    pub async fn add_channel(&self, accounts: &mut Accounts) -> Void {
        if accounts.accounts.is_empty() {
            self.operator.say("No accounts found. Please add an account first.");
            return Ok(());
        }

        for (i, account) in accounts.accounts.iter().enumerate() {
            self.operator.say(&format!("{}. {}", i + 1, account.phone));
        }

        let choice = self.operator.prompt("Choose account number: ").await?;

        let Some(index) = parse_account_number(&choice, accounts.accounts.len()) else {
            warn!("Rejected account number `{}`.", choice);
            self.operator.say("Invalid account number.");
            return Ok(());
        };

        let username = self.operator.prompt("Enter channel username (without @): ").await?;
        let comment = self.operator.prompt("Enter comment for this channel: ").await?;

        self.store.add_channel(accounts, index, Channel::new(username, comment))?;
        self.operator.say("Channel added successfully!");

        Ok(())
    }

    /// Log every account in, attach handlers, and run until interrupted.
    #[instrument(skip_all)]
    pub async fn start_monitoring(&self, accounts: &Accounts) -> Void {
        if accounts.accounts.is_empty() {
            self.operator.say("No accounts found. Please add an account first.");
            return Ok(());
        }

        let sessions = tokio::select! {
            sessions = monitor::start_monitoring(accounts, &self.connector, &self.operator, self.comment_delay) => sessions?,
            _ = monitor::interrupted() => return Err(anyhow!("Interrupted.")),
        };

        info!("Monitoring {} account(s).", sessions.len());
        self.operator.say("Monitoring started. Press Ctrl+C to stop.");

        monitor::run(&sessions).await?;

        self.operator.say("Monitoring stopped.");

        Ok(())
    }
}

/// Turn a 1-based account number into an index, if it names an existing account.
fn parse_account_number(input: &str, count: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

// Tests.
