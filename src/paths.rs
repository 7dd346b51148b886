use anyhow::{Context, Result};
use directories::UserDirs;
use std::path::PathBuf;

/// Environment override for the data root. Primarily for tests and
/// non-standard installs; when unset the root is `~/.claude/infinite-context`.
pub const DATA_DIR_ENV: &str = "INFINITE_CONTEXT_DIR";

/// Resolve the data root, creating it if missing.
pub fn data_root() -> Result<PathBuf> {
    let root = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let home = UserDirs::new()
                .map(|u| u.home_dir().to_path_buf())
                .context("could not find home directory")?;
            home.join(".claude").join("infinite-context")
        }
    };
    std::fs::create_dir_all(&root)
        .with_context(|| format!("create data root {}", root.display()))?;
    Ok(root)
}

pub fn db_path() -> Result<PathBuf> {
    Ok(data_root()?.join("memories.db"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(data_root()?.join("config.json"))
}

pub fn prompt_state_path() -> Result<PathBuf> {
    Ok(data_root()?.join("prompt-state.json"))
}

/// The host's settings file where hook commands are registered. The core
/// never touches this; only the installer does.
pub fn host_settings_path() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("could not find home directory")?;
    Ok(home.join(".claude").join("settings.json"))
}
