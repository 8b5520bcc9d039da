use std::{ops::Deref, sync::Arc};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::base::types::{Res, Void};

pub mod json;

// Traits.

/// Generic account store trait that backends must implement.
///
/// The store always works on the whole document: it is read once at startup
/// and rewritten in full after every change.
pub trait GenericStore: Send + Sync + 'static {
    /// Load the persisted accounts.
    ///
    /// A store that does not exist yet yields an empty list. Malformed content is an error.
    fn load(&self) -> Res<Accounts>;

    /// Overwrite the persisted document with `accounts`.
    fn save(&self, accounts: &Accounts) -> Void;
}

// Data types.

/// The persisted document: every configured account, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounts {
    pub accounts: Vec<Account>,
}

/// A user account and the channels it comments in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub phone: String,
    pub api_id: i32,
    pub api_hash: String,
    pub channels: Vec<Channel>,
}

/// A monitored channel and the comment posted under each of its new messages.
///
/// Neither field is validated; duplicates are kept as entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub username: String,
    pub comment: String,
}

impl Account {
    /// Create an account with no channels.
    pub fn new(phone: impl Into<String>, api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            api_id,
            api_hash: api_hash.into(),
            channels: Vec::new(),
        }
    }
}

impl Channel {
    pub fn new(username: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            comment: comment.into(),
        }
    }
}

// Structs.

/// Store client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<dyn GenericStore>,
}

impl Deref for StoreClient {
    type Target = dyn GenericStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl StoreClient {
    pub fn new(inner: Arc<dyn GenericStore>) -> Self {
        Self { inner }
    }

    /// Append `account` and persist the whole document.
    #[instrument(skip_all, fields(phone = %account.phone))]
    pub fn add_account(&self, accounts: &mut Accounts, account: Account) -> Void {
        accounts.accounts.push(account);
        self.save(accounts)?;

        info!("Account stored ({} total).", accounts.accounts.len());

        Ok(())
    }

    /// Append `channel` to the account at `index` and persist the whole document.
    ///
    /// An out-of-range index leaves the document untouched.
    #[instrument(skip_all, fields(index = index, channel = %channel.username))]
    pub fn add_channel(&self, accounts: &mut Accounts, index: usize, channel: Channel) -> Void {
        let count = accounts.accounts.len();
        let account = accounts.accounts.get_mut(index).ok_or_else(|| anyhow!("No account at index {index} ({count} configured)."))?;

        account.channels.push(channel);
        self.save(accounts)?;

        info!("Channel stored.");

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records every saved document.
    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<Accounts>>,
    }

    impl GenericStore for RecordingStore {
        fn load(&self) -> Res<Accounts> {
            Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
        }

        fn save(&self, accounts: &Accounts) -> Void {
            self.saved.lock().unwrap().push(accounts.clone());
            Ok(())
        }
    }

    fn client() -> (Arc<RecordingStore>, StoreClient) {
        let store = Arc::new(RecordingStore::default());
        (store.clone(), StoreClient::new(store))
    }

    #[test]
    fn add_account_appends_and_persists() {
        let (store, client) = client();
        let mut accounts = Accounts::default();

        client.add_account(&mut accounts, Account::new("+1555", 123, "abc")).unwrap();

        assert_eq!(accounts.accounts, vec![Account::new("+1555", 123, "abc")]);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
        assert_eq!(client.load().unwrap(), accounts);
    }

    #[test]
    fn add_channel_touches_only_the_chosen_account() {
        let (_, client) = client();
        let mut accounts = Accounts::default();
        client.add_account(&mut accounts, Account::new("+1555", 123, "abc")).unwrap();
        client.add_account(&mut accounts, Account::new("+1666", 456, "def")).unwrap();

        client.add_channel(&mut accounts, 1, Channel::new("newsroom", "first!")).unwrap();

        assert!(accounts.accounts[0].channels.is_empty());
        assert_eq!(accounts.accounts[1].channels, vec![Channel::new("newsroom", "first!")]);
        assert_eq!(client.load().unwrap(), accounts);
    }

    #[test]
    fn add_channel_accepts_duplicates() {
        let (_, client) = client();
        let mut accounts = Accounts::default();
        client.add_account(&mut accounts, Account::new("+1555", 123, "abc")).unwrap();

        client.add_channel(&mut accounts, 0, Channel::new("newsroom", "first!")).unwrap();
        client.add_channel(&mut accounts, 0, Channel::new("newsroom", "first!")).unwrap();

        assert_eq!(accounts.accounts[0].channels.len(), 2);
    }

    #[test]
    fn add_channel_rejects_unknown_index() {
        let (store, client) = client();
        let mut accounts = Accounts::default();
        client.add_account(&mut accounts, Account::new("+1555", 123, "abc")).unwrap();
        let before = accounts.clone();

        assert!(client.add_channel(&mut accounts, 3, Channel::new("newsroom", "first!")).is_err());

        assert_eq!(accounts, before);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }
}
