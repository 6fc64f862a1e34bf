use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the geolocator library.
///
/// Selects the reverse-geocoding provider, locates exiftool, and controls
/// write behavior (dry run, backups, staged batches).
///
/// # Loading
///
/// ```rust,no_run
/// use geolocator::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.geocoder.active = 1;
/// config.geocoder.google.api_key = "AIza...".into();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoder: GeocoderConfig,
    pub exiftool: ExifToolConfig,
    pub output: OutputConfig,
}

/// Reverse-geocoding providers and how many lookups run at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Index of the active provider: 0 = local, 1 = google.
    pub active: usize,
    /// Maximum lookups in flight during a batch.
    pub concurrency: usize,
    pub google: GoogleConfig,
    pub local: LocalConfig,
}

/// Google Geocoding API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_key: String,
    pub endpoint: String,
}

/// Offline gazetteer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// JSON array of places; see [`Gazetteer`](crate::geocoder::Gazetteer).
    pub gazetteer_path: Option<PathBuf>,
    /// Lookups farther than this from every known place find nothing.
    pub max_distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExifToolConfig {
    /// Program name or full path of the exiftool executable.
    pub path: PathBuf,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, log what would be written without modifying any files.
    pub dry_run: bool,
    /// If `true`, exiftool keeps a `<name>_original` copy of every file it modifies.
    pub keep_backups: bool,
    /// If `true`, write all edits in one exiftool invocation; otherwise one per file.
    pub staged_write: bool,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            active: 0,
            concurrency: 4,
            google: GoogleConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: crate::geocoder::DEFAULT_GOOGLE_ENDPOINT.to_string(),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            gazetteer_path: None,
            max_distance_km: 25.0,
        }
    }
}

impl Default for ExifToolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("exiftool"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            keep_backups: true,
            staged_write: true,
        }
    }
}

impl Config {
    /// Resolve the config file path: same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    ///
    /// A missing file is not an error: defaults are used and a warning logged.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config.normalized())
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Clamp values that would stall or misroute a batch.
    fn normalized(mut self) -> Self {
        if self.geocoder.concurrency == 0 {
            log::warn!("geocoder.concurrency must be at least 1, using 1");
            self.geocoder.concurrency = 1;
        }
        let max = self.geocoder.local.max_distance_km;
        if max.is_nan() || max <= 0.0 {
            log::warn!(
                "geocoder.local.max_distance_km must be positive, using {}",
                LocalConfig::default().max_distance_km
            );
            self.geocoder.local.max_distance_km = LocalConfig::default().max_distance_km;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.geocoder.active, 0);
        assert_eq!(config.geocoder.concurrency, 4);
        assert_eq!(config.geocoder.local.max_distance_km, 25.0);
        assert_eq!(config.exiftool.path, PathBuf::from("exiftool"));
        assert!(config.output.keep_backups);
        assert!(config.output.staged_write);
        assert!(!config.output.dry_run);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config.geocoder.concurrency, 4);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.geocoder.active = 1;
        config.geocoder.google.api_key = "KEY".into();
        config.output.dry_run = true;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.geocoder.active, 1);
        assert_eq!(loaded.geocoder.google.api_key, "KEY");
        assert!(loaded.output.dry_run);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "geocoder": { "active": 1, "concurrency": 0 } }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.geocoder.active, 1);
        assert_eq!(config.geocoder.concurrency, 1);
        assert_eq!(
            config.geocoder.google.endpoint,
            crate::geocoder::DEFAULT_GOOGLE_ENDPOINT
        );
        assert!(config.output.keep_backups);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ geocoder").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
