use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default name of the LaTeX macro emitted once per reference.
pub const DEFAULT_MACRO_NAME: &str = "dumbibReferenceEntry";

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub venues: Option<VenuesConfig>,
    pub processing: Option<ProcessingConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenuesConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub strict: Option<bool>,
    pub duplicate_match_year: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub macro_name: Option<String>,
}

/// Settings resolved for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Abort on configuration-level entry errors (unknown type or venue).
    pub strict: bool,
    /// Require equal years before two entries count as (possible) duplicates.
    pub duplicate_match_year: bool,
    pub macro_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strict: true,
            duplicate_match_year: true,
            macro_name: DEFAULT_MACRO_NAME.to_string(),
        }
    }
}

impl Settings {
    /// Fill unset config values with defaults.
    pub fn from_config(config: &ConfigFile) -> Self {
        let defaults = Self::default();
        let processing = config.processing.as_ref();
        Self {
            strict: processing
                .and_then(|p| p.strict)
                .unwrap_or(defaults.strict),
            duplicate_match_year: processing
                .and_then(|p| p.duplicate_match_year)
                .unwrap_or(defaults.duplicate_match_year),
            macro_name: config
                .output
                .as_ref()
                .and_then(|o| o.macro_name.clone())
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.macro_name),
        }
    }
}

impl ConfigFile {
    pub fn venue_table_path(&self) -> Option<PathBuf> {
        self.venues
            .as_ref()
            .and_then(|v| v.path.as_deref())
            .map(PathBuf::from)
    }
}

/// Platform config directory path: `<config_dir>/dumbib/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dumbib").join("config.toml"))
}

/// Load config by cascading CWD `.dumbib.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".dumbib.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        venues: Some(VenuesConfig {
            path: overlay
                .venues
                .as_ref()
                .and_then(|v| v.path.clone())
                .or_else(|| base.venues.as_ref().and_then(|v| v.path.clone())),
        }),
        processing: Some(ProcessingConfig {
            strict: overlay
                .processing
                .as_ref()
                .and_then(|p| p.strict)
                .or_else(|| base.processing.as_ref().and_then(|p| p.strict)),
            duplicate_match_year: overlay
                .processing
                .as_ref()
                .and_then(|p| p.duplicate_match_year)
                .or_else(|| {
                    base.processing
                        .as_ref()
                        .and_then(|p| p.duplicate_match_year)
                }),
        }),
        output: Some(OutputConfig {
            macro_name: overlay
                .output
                .as_ref()
                .and_then(|o| o.macro_name.clone())
                .or_else(|| base.output.as_ref().and_then(|o| o.macro_name.clone())),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venues_path_round_trip_toml() {
        let config = ConfigFile {
            venues: Some(VenuesConfig {
                path: Some("/tmp/venue_list.csv".to_string()),
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.venue_table_path(),
            Some(PathBuf::from("/tmp/venue_list.csv"))
        );
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = "[processing]\nduplicate_match_year = false\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let settings = Settings::from_config(&parsed);
        assert!(settings.strict);
        assert!(!settings.duplicate_match_year);
        assert_eq!(settings.macro_name, DEFAULT_MACRO_NAME);
        assert!(parsed.venue_table_path().is_none());
    }

    #[test]
    fn blank_macro_name_falls_back() {
        let config = ConfigFile {
            output: Some(OutputConfig {
                macro_name: Some("  ".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(Settings::from_config(&config).macro_name, DEFAULT_MACRO_NAME);
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            processing: Some(ProcessingConfig {
                strict: Some(true),
                duplicate_match_year: Some(true),
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            processing: Some(ProcessingConfig {
                strict: Some(false),
                duplicate_match_year: None,
            }),
            ..Default::default()
        };
        let settings = Settings::from_config(&merge(base, overlay));
        assert!(!settings.strict);
        assert!(settings.duplicate_match_year);
    }

    #[test]
    fn merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            venues: Some(VenuesConfig {
                path: Some("base.csv".to_string()),
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        assert_eq!(merged.venue_table_path(), Some(PathBuf::from("base.csv")));
    }

    #[test]
    fn unparsable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[processing\nstrict = ").unwrap();
        assert!(load_from_path(&path).is_none());
        assert!(load_from_path(&dir.path().join("absent.toml")).is_none());
    }
}
