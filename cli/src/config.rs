//! Configuration storage for the WalletLink CLI
//!
//! Lives at `~/.walletlink/config.json` unless `--config` points elsewhere.
//! Missing file means built-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use walletlink::{AppIdentity, ProviderConfig, WalletProvider};

/// Default directory for CLI state
const WALLETLINK_DIR: &str = ".walletlink";
const CONFIG_FILE: &str = "config.json";

/// Seconds a wallet gets to answer before the attempt is abandoned
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Stored CLI configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// How this app presents itself to wallets
    #[serde(default)]
    pub app: AppIdentity,
    /// Per-wallet overrides of the built-in provider configs
    #[serde(default)]
    pub providers: BTreeMap<WalletProvider, ProviderConfig>,
    /// Pending-request deadline; `null` waits forever
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: Option<u64>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
}

fn default_timeout() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_SECS)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppIdentity::default(),
            providers: BTreeMap::new(),
            request_timeout_secs: default_timeout(),
            created_at: String::new(),
        }
    }
}

impl AppConfig {
    /// Effective config for `provider`: override if present, else built-in
    pub fn provider_config(&self, provider: WalletProvider) -> ProviderConfig {
        self.providers
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| provider.default_config())
    }

    fn validate(&self) -> Result<()> {
        if self.app.app_scheme.is_empty()
            || !self
                .app
                .app_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            bail!("Invalid app scheme '{}'", self.app.app_scheme);
        }
        url::Url::parse(&self.app.app_url)
            .with_context(|| format!("Invalid app URL '{}'", self.app.app_url))?;
        for (provider, config) in &self.providers {
            url::Url::parse(&config.base_url)
                .with_context(|| format!("Invalid base URL for {}", provider))?;
            if config.payload_params.is_empty() {
                bail!("{} override has no payload parameters", provider);
            }
        }
        Ok(())
    }
}

/// Get the WalletLink directory path
pub fn walletlink_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(WALLETLINK_DIR))
        .context("Could not find home directory")
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(walletlink_dir()?.join(CONFIG_FILE))
}

/// Resolve `--config` or fall back to the default location
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// Save config to disk
pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    config.validate()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create config directory")?;
    }

    let json = serde_json::to_string_pretty(config)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, &json)?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, &json)?;
    }

    Ok(())
}

/// Load config from disk
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        bail!(
            "No config found at {}. Run 'walletlink config init' first.",
            path.display()
        );
    }

    let json = fs::read_to_string(path).context("Failed to read config file")?;
    let config: AppConfig = serde_json::from_str(&json).context("Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load config, or defaults when no file exists yet
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use walletlink::Cluster;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.app.cluster = Cluster::MainnetBeta;
        config.request_timeout_secs = None;
        let mut phantom = WalletProvider::Phantom.default_config();
        phantom.base_url = "https://staging.phantom.app".into();
        config.providers.insert(WalletProvider::Phantom, phantom.clone());

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.provider_config(WalletProvider::Phantom), phantom);
        assert_eq!(
            loaded.provider_config(WalletProvider::Solflare),
            WalletProvider::Solflare.default_config()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_config_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        save_config(&path, &AppConfig::default()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert!(load_config(&path).is_err());
        let config = load_or_default(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.request_timeout_secs, Some(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{ "app": { "app_url": "https://courier.example", "app_scheme": "courier" } }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.app.app_scheme, "courier");
        assert_eq!(config.app.cluster, Cluster::Devnet);
        assert!(config.providers.is_empty());
        assert_eq!(config.request_timeout_secs, Some(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.app.app_scheme = "bad scheme".into();
        assert!(save_config(&path, &config).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(load_or_default(&path).is_err());
    }
}
