//! Configuration Vault – reads/writes `~/.wayback/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use wayback_runtime::FusionConfig;

/// Persisted user configuration stored in `~/.wayback/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory that `/export` writes the CSV files into.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Fusion loop, dead reckoning and navigation tunables.
    #[serde(default)]
    pub fusion: FusionConfig,
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(home_dir()).join(".wayback").join("exports")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            fusion: FusionConfig::default(),
        }
    }
}

/// Return the path to `~/.wayback/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".wayback").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config, falling back to defaults (with overrides) when the file
/// is missing or unreadable.
pub fn load_or_default() -> (Config, Option<String>) {
    match load() {
        Ok(Some(cfg)) => (cfg, None),
        Ok(None) => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            (cfg, None)
        }
        Err(e) => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            (cfg, Some(e))
        }
    }
}

/// Apply `WAYBACK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `WAYBACK_EXPORT_DIR` | `export_dir` |
/// | `WAYBACK_TICK_MS` | `fusion.tick_ms` |
/// | `WAYBACK_ALPHA` | `fusion.pdr.heading.alpha` |
///
/// Values that do not parse, a zero tick and an alpha outside `[0, 1]` are
/// ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("WAYBACK_EXPORT_DIR")
        && !v.trim().is_empty()
    {
        cfg.export_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("WAYBACK_TICK_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
        && ms > 0
    {
        cfg.fusion.tick_ms = ms;
    }
    if let Some(v) = lookup("WAYBACK_ALPHA")
        && let Ok(alpha) = v.trim().parse::<f32>()
        && (0.0..=1.0).contains(&alpha)
    {
        cfg.fusion.pdr.heading.alpha = alpha;
    }
}

/// Save the config to disk, creating `~/.wayback/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
