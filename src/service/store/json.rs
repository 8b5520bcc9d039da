//! JSON file implementation of the account store.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tracing::{debug, instrument};

use crate::base::types::{Res, Void};

use super::{Accounts, GenericStore, StoreClient};

// Extra methods on `StoreClient` applied by the JSON implementation.

impl StoreClient {
    /// Creates a store client backed by the JSON document at `path`.
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self::new(std::sync::Arc::new(JsonFileStore::new(path)))
    }
}

/// Account store persisted as a single pretty-printed JSON document.
///
/// There is no locking; concurrent writers overwrite each other.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GenericStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Res<Accounts> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No account store yet; starting empty.");
                return Ok(Accounts::default());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        };

        let accounts = serde_json::from_str(&raw).with_context(|| format!("Malformed account store {}", self.path.display()))?;

        Ok(accounts)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn save(&self, accounts: &Accounts) -> Void {
        let raw = serde_json::to_string_pretty(accounts)?;

        fs::write(&self.path, raw).with_context(|| format!("Failed to write {}", self.path.display()))?;

        debug!("Account store written.");

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::service::store::{Account, Channel};

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("config.json"))
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(store_in(&dir).load().unwrap(), Accounts::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{\"accounts\": [").unwrap();

        assert!(store.load().is_err());
    }

    #[test]
    fn load_then_save_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let document = json!({
            "accounts": [
                { "phone": "+1555", "api_id": 123, "api_hash": "abc", "channels": [
                    { "username": "newsroom", "comment": "first!" },
                    { "username": "newsroom", "comment": "first!" }
                ] }
            ]
        });
        fs::write(store.path(), serde_json::to_string_pretty(&document).unwrap()).unwrap();

        let loaded = store.load().unwrap();
        store.save(&loaded).unwrap();

        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(saved, document);
        assert_eq!(store.load().unwrap(), loaded);
    }

    #[test]
    fn save_writes_the_documented_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut account = Account::new("+1555", 123, "abc");

        store.save(&Accounts { accounts: vec![account.clone()] }).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(saved, json!({"accounts":[{"phone":"+1555","api_id":123,"api_hash":"abc","channels":[]}]}));

        account.channels.push(Channel::new("newsroom", "first!"));
        store.save(&Accounts { accounts: vec![account] }).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(saved["accounts"][0]["channels"], json!([{"username":"newsroom","comment":"first!"}]));
    }

    #[test]
    fn store_client_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = StoreClient::json_file(dir.path().join("config.json"));
        let mut accounts = client.load().unwrap();

        client.add_account(&mut accounts, Account::new("+1555", 123, "abc")).unwrap();

        assert_eq!(client.load().unwrap(), accounts);
    }
}
