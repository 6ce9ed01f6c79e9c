use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::DbError;

pub const CONFIG_FILE: &str = "docbench.toml";

/// Engine and loader tuning. Every field has a default, so a partial TOML
/// file is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// LRU entries kept for join key resolutions.
    pub join_cache_capacity: usize,
    pub import_batch_size: usize,
    /// Log import and join progress every N documents; 0 disables it.
    pub progress_every: usize,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            join_cache_capacity: 10_000,
            import_batch_size: 500,
            progress_every: 10_000,
            log_dir: None,
            log_level: None,
        }
    }
}

impl EngineConfig {
    /// # Errors
    /// Returns `Io` if the file cannot be read and `Toml` if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }

    /// Loads configuration with precedence: `cli_path` > `DOCBENCH_CONFIG` >
    /// `./docbench.toml` > `~/.config/docbench.toml` > defaults, then applies
    /// `DOCBENCH_JOIN_CACHE` and `DOCBENCH_BATCH_SIZE` on top.
    ///
    /// # Errors
    /// Fails if an explicitly named file (CLI or `DOCBENCH_CONFIG`) is
    /// unreadable or invalid, or an override variable is not a positive integer.
    pub fn load(cli_path: Option<&Path>) -> Result<Self, DbError> {
        let explicit = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("DOCBENCH_CONFIG").map(PathBuf::from));
        let mut cfg = match explicit {
            Some(p) => Self::from_file(&p)?,
            None => match find_config_paths().into_iter().find(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<(), DbError> {
        if let Some(n) = env_usize("DOCBENCH_JOIN_CACHE")? {
            self.join_cache_capacity = n;
        }
        if let Some(n) = env_usize("DOCBENCH_BATCH_SIZE")? {
            self.import_batch_size = n;
        }
        Ok(())
    }
}

/// Implicit config locations, highest priority first.
#[must_use]
pub fn find_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE));
    }
    paths
}

fn env_usize(key: &str) -> Result<Option<usize>, DbError> {
    match std::env::var(key) {
        Ok(s) => match s.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(DbError::validation(key, format!("expected a positive integer, got {s:?}"))),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("docbench.toml");
        std::fs::write(&p, "join_cache_capacity = 64\nlog_level = \"debug\"\n").unwrap();
        let cfg = EngineConfig::from_file(&p).unwrap();
        assert_eq!(cfg.join_cache_capacity, 64);
        assert_eq!(cfg.import_batch_size, 500);
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.toml");
        std::fs::write(&p, "join_cache_capacity = \"lots\"").unwrap();
        assert!(matches!(EngineConfig::from_file(&p), Err(DbError::Toml(_))));
        assert!(matches!(EngineConfig::load(Some(&dir.path().join("missing.toml"))), Err(DbError::Io(_))));
    }
}
