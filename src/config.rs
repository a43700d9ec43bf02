use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "domainsweep";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_RECENT_COUNT: usize = 50;

/// A mailbox the tool can open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Mailbox address; also names the cache file
    pub email: String,
}

/// Contents of config.toml. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many messages the "recent" view fetches
    pub recent_count: usize,
    /// Upper bound on messages fetched by a rebuild
    pub index_limit: Option<usize>,
    pub accounts: BTreeMap<String, AccountConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recent_count: DEFAULT_RECENT_COUNT,
            index_limit: None,
            accounts: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config.toml")?;
        if config.recent_count == 0 {
            bail!("recent_count must be at least 1");
        }
        Ok(config)
    }

    /// Reads a config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::parse(&content)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Picks the mailbox to open.
    ///
    /// A named account must exist. Without a name the first configured
    /// account is used; None means no account is configured at all.
    pub fn mailbox(&self, account: Option<&str>) -> Result<Option<&AccountConfig>> {
        match account {
            Some(name) => self
                .accounts
                .get(name)
                .map(Some)
                .with_context(|| format!("Unknown account '{name}' in {CONFIG_FILE}")),
            None => Ok(self.accounts.values().next()),
        }
    }
}

/// Returns the configuration directory path
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .context("Failed to determine config directory")
}

/// Returns the path to the config file
pub fn config_path() -> Result<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Directory holding the per-mailbox index snapshots
pub fn cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|p| p.join(APP_NAME))
        .context("Failed to determine cache directory")
}

/// Ensures the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir()?;
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create config directory")?;
    }
    Ok(dir)
}
