//! Create and display the CLI configuration

use std::path::Path;

use anyhow::{bail, Result};
use colored::Colorize;
use walletlink::{AppIdentity, Cluster};

use crate::config::{load_config, save_config, AppConfig};

pub struct InitOptions {
    pub force: bool,
    pub app_url: Option<String>,
    pub scheme: Option<String>,
    pub cluster: Option<Cluster>,
    pub timeout_secs: Option<u64>,
}

pub fn init(path: &Path, options: InitOptions) -> Result<()> {
    if path.exists() && !options.force {
        bail!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    let defaults = AppIdentity::default();
    let mut config = AppConfig {
        app: AppIdentity {
            app_url: options.app_url.unwrap_or(defaults.app_url),
            app_scheme: options.scheme.unwrap_or(defaults.app_scheme),
            cluster: options.cluster.unwrap_or(defaults.cluster),
        },
        created_at: chrono::Utc::now().to_rfc3339(),
        ..AppConfig::default()
    };
    if let Some(secs) = options.timeout_secs {
        config.request_timeout_secs = (secs > 0).then_some(secs);
    }

    save_config(path, &config)?;

    println!("{}", "Configuration saved".green().bold());
    println!("  {}", path.display());
    println!();
    println!(
        "Register {}:// with your OS so wallet redirects reach this app.",
        config.app.app_scheme
    );
    Ok(())
}

pub fn show(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> InitOptions {
        InitOptions {
            force: false,
            app_url: Some("https://courier.example".into()),
            scheme: Some("courier".into()),
            cluster: Some(Cluster::Testnet),
            timeout_secs: Some(0),
        }
    }

    #[test]
    fn test_init_writes_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        init(&path, options()).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.app.app_scheme, "courier");
        assert_eq!(config.app.cluster, Cluster::Testnet);
        assert_eq!(config.request_timeout_secs, None);
        assert!(!config.created_at.is_empty());
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        init(&path, options()).unwrap();
        assert!(init(&path, options()).is_err());

        let mut forced = options();
        forced.force = true;
        forced.scheme = Some("courier2".into());
        init(&path, forced).unwrap();
        assert_eq!(load_config(&path).unwrap().app.app_scheme, "courier2");
    }
}
