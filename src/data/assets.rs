use anyhow::{Context, Result};
use directories::BaseDirs;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_ASSET_DIR: &str = "COVER_ACCENT_ASSET_DIR";

pub(crate) const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/default.toml");

const CONFIG_REL: &str = "config/default.toml";

pub fn resolve_asset_root() -> PathBuf {
    if let Some(p) = std::env::var_os(ENV_ASSET_DIR) {
        return PathBuf::from(p);
    }

    if let Some(sys) = system_config_root() {
        if let Err(e) = ensure_all_assets(&sys) {
            log::warn!("cannot write default assets to {}: {e:#}", sys.display());
        }
        return sys;
    }

    // Only when the OS config directory cannot be determined.
    let local = local_config_root();
    if let Err(e) = ensure_all_assets(&local) {
        log::warn!("cannot write default assets to {}: {e:#}", local.display());
    }
    local
}

pub fn resolve_config_path() -> PathBuf {
    resolve_asset_root().join(CONFIG_REL)
}

/// Writes `<root>/config/default.toml` unless it already exists.
pub fn ensure_all_assets(root: &Path) -> Result<()> {
    ensure_dir(&root.join("config"))?;
    write_if_missing(&root.join(CONFIG_REL), DEFAULT_CONFIG_TOML)
}

fn system_config_root() -> Option<PathBuf> {
    // Linux: $XDG_CONFIG_HOME/cover-accent
    // macOS: ~/Library/Application Support/cover-accent
    // Windows: %APPDATA%\cover-accent
    BaseDirs::new().map(|d| d.config_dir().join("cover-accent"))
}

fn local_config_root() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".config")
}

fn ensure_dir(p: &Path) -> Result<()> {
    fs::create_dir_all(p).with_context(|| format!("mkdir {}", p.display()))
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
