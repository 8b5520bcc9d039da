//! Load configuration via `config` crate with env-override support.

use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;

use super::types::Res;

/// Upper bound for the pre-comment delay, in milliseconds.
const MAX_COMMENT_DELAY_MS: u64 = 600_000;

/// Default location of the persisted account document.
fn default_store_path() -> PathBuf {
    PathBuf::from("config.json")
}

/// Default directory for per-account session files.
fn default_session_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Default delay before posting a comment.
fn default_comment_delay_ms() -> u64 {
    2000
}

/// Configuration for the auto-commenter application.
#[derive(Debug, Clone)]
pub struct Config {
    /// The shared settings.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Settings as read from the environment and the settings file.
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Path of the JSON account document (`AUTO_COMMENTER_STORE_PATH`).
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Directory that holds the `session_<phone>.session` files (`AUTO_COMMENTER_SESSION_DIR`).
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
    /// Delay between observing a post and commenting on it (`AUTO_COMMENTER_COMMENT_DELAY_MS`).
    #[serde(default = "default_comment_delay_ms")]
    pub comment_delay_ms: u64,
    /// Replay updates that arrived while the client was offline (`AUTO_COMMENTER_CATCH_UP`).
    #[serde(default)]
    pub catch_up: bool,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            session_dir: default_session_dir(),
            comment_delay_ms: default_comment_delay_ms(),
            catch_up: false,
        }
    }
}

impl ConfigInner {
    /// The pre-comment delay as a [`Duration`].
    pub fn comment_delay(&self) -> Duration {
        Duration::from_millis(self.comment_delay_ms)
    }

    /// Session file used for the account identified by `phone`.
    pub fn session_path(&self, phone: &str) -> PathBuf {
        self.session_dir.join(format!("session_{phone}.session"))
    }
}

impl Config {
    /// Load settings from `AUTO_COMMENTER_*` variables and a TOML file.
    ///
    /// `explicit_path` wins over the default `.hidden/config.toml`, which is optional.
    pub fn load(explicit_path: Option<&Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("AUTO_COMMENTER"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        if result.comment_delay_ms > MAX_COMMENT_DELAY_MS {
            return Err(anyhow::anyhow!("Comment delay must be at most {MAX_COMMENT_DELAY_MS} ms."));
        }

        Ok(result)
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::from(ConfigInner::default());

        assert_eq!(config.store_path, PathBuf::from("config.json"));
        assert_eq!(config.comment_delay(), Duration::from_secs(2));
        assert!(!config.catch_up);
    }

    #[test]
    fn session_path_is_keyed_by_phone() {
        let config = ConfigInner {
            session_dir: PathBuf::from("/tmp/sessions"),
            ..Default::default()
        };

        assert_eq!(config.session_path("+1555"), PathBuf::from("/tmp/sessions/session_+1555.session"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "store_path = \"accounts.json\"\ncomment_delay_ms = 500").unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.store_path, PathBuf::from("accounts.json"));
        assert_eq!(config.comment_delay_ms, 500);
    }

    #[test]
    fn load_rejects_excessive_delay() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "comment_delay_ms = 900000").unwrap();

        assert!(Config::load(Some(file.path())).is_err());
    }
}
