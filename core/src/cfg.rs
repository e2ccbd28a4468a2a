use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::recovery::RecoveryConfig;

/// Identifier used to compute per-app configuration directories.
#[derive(Clone, Copy)]
pub struct AppId {
    /// Reverse-DNS style qualifier, e.g. `"com"`.
    pub qualifier: &'static str,
    /// Organization or vendor name, e.g. `"local"`.
    pub organization: &'static str,
    /// Application name, e.g. `"svcrec"`.
    pub application: &'static str,
}

/// Application configuration persisted to `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tracing level to use if `RUST_LOG` is not set (e.g. `"info"`).
    pub log_level: String,
}

/// Return the configuration directory for this app, creating it if needed.
pub fn config_dir(app: &AppId) -> Result<PathBuf> {
    let pd = ProjectDirs::from(app.qualifier, app.organization, app.application)
        .ok_or_else(|| anyhow::anyhow!("failed to resolve ProjectDirs"))?;
    let dir = pd.config_dir().to_path_buf();
    fs::create_dir_all(&dir).with_context(|| format!("create config dir {}", dir.display()))?;
    Ok(dir)
}

/// Load `config.toml` from the app config dir or create a default one.
pub fn load_or_init(app: &AppId) -> Result<Config> {
    let dir = config_dir(app)?;
    let path = dir.join("config.toml");
    if path.exists() {
        let txt = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&txt)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    } else {
        let cfg = Config { log_level: "info".to_string() };
        save_config(&path, &cfg)?;
        Ok(cfg)
    }
}

fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg)?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Declared recovery configuration for a set of services.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// One `[[service]]` table per service to reconcile.
    #[serde(default, rename = "service")]
    pub services: Vec<RecoveryConfig>,
}

/// Read and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let txt = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_manifest(&txt).with_context(|| format!("manifest {}", path.display()))
}

/// Parse manifest TOML and enforce the declaration rules the differ relies
/// on: non-empty unique service names and at most 3 failure actions. Action
/// kinds and delay ranges are already constrained by the record's serde
/// shape, so nothing invalid in those reaches the differ.
pub fn parse_manifest(text: &str) -> Result<Manifest> {
    let manifest: Manifest = toml::from_str(text).context("parse manifest")?;
    let mut seen = HashSet::new();
    for service in &manifest.services {
        if service.name.trim().is_empty() {
            bail!("service with empty name");
        }
        if !seen.insert(service.name.as_str()) {
            bail!("service {} declared twice", service.name);
        }
        if let Some(actions) = &service.failure_actions {
            if actions.len() > 3 {
                bail!(
                    "service {}: {} failure actions declared, the facility accepts at most 3",
                    service.name,
                    actions.len()
                );
            }
        }
    }
    Ok(manifest)
}
