use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::journeys::JourneyConfig;
use super::Config;
use crate::errors::{Error, Result};

/// File names probed in each directory, in order of preference
pub const CONFIG_FILE_NAMES: [&str; 3] = [".riskmap.toml", ".riskmap.yaml", ".riskmap.yml"];

const MAX_TRAVERSAL_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension; anything unknown is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

/// Configuration together with the file it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

pub(crate) fn read_config_file(path: &Path) -> std::io::Result<String> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<Config> {
    let config: Config = match format {
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| Error::config(e.to_string()))?,
        ConfigFormat::Yaml => {
            serde_yaml::from_str(contents).map_err(|e| Error::config(e.to_string()))?
        }
    };
    config.validate()?;
    Ok(config)
}

pub fn load_config_file(path: &Path) -> Result<Config> {
    let contents = read_config_file(path).map_err(|e| {
        Error::config_with_path(format!("cannot read {}: {}", path.display(), e), path)
    })?;
    parse_config(&contents, ConfigFormat::from_path(path)).map_err(|e| match e {
        Error::Config { message, .. } => {
            Error::config_with_path(format!("{}: {}", path.display(), message), path)
        }
        other => other,
    })
}

/// Load a standalone journeys file, replacing any journeys from the main config.
pub fn load_journeys_file(path: &Path) -> Result<JourneyConfig> {
    let contents = read_config_file(path).map_err(|e| {
        Error::config_with_path(format!("cannot read {}: {}", path.display(), e), path)
    })?;
    let journeys: JourneyConfig = match ConfigFormat::from_path(path) {
        ConfigFormat::Toml => toml::from_str(&contents)
            .map_err(|e| Error::config_with_path(format!("{}: {}", path.display(), e), path))?,
        ConfigFormat::Yaml => serde_yaml::from_str(&contents)
            .map_err(|e| Error::config_with_path(format!("{}: {}", path.display(), e), path))?,
    };
    journeys.validate()?;
    log::debug!(
        "Loaded {} journeys from {}",
        journeys.journeys.len(),
        path.display()
    );
    Ok(journeys)
}

pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Find the nearest config file at or above `start`.
pub fn discover_config(start: &Path) -> Option<PathBuf> {
    let start = fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    let start = if start.is_file() {
        start.parent().map(Path::to_path_buf).unwrap_or(start)
    } else {
        start
    };

    directory_ancestors(start, MAX_TRAVERSAL_DEPTH)
        .flat_map(|dir| CONFIG_FILE_NAMES.map(|name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Resolve configuration for a run.
///
/// An explicit path must exist. Otherwise the nearest discovered file is used,
/// falling back to defaults when there is none. A file that exists but does
/// not parse or validate is always an error.
pub fn load_config(start: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config(start),
    };

    match path {
        Some(path) => {
            let config = load_config_file(&path)?;
            log::debug!("Loaded config from {}", path.display());
            Ok(LoadedConfig {
                config,
                source: Some(path),
            })
        }
        None => {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            Ok(LoadedConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use tempfile::TempDir;

    #[test]
    fn discovers_config_in_ancestor() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            temp.path().join(".riskmap.toml"),
            "[risk.weights]\nsecurity = 1.0\n",
        )
        .unwrap();

        let loaded = load_config(&nested, None).unwrap();
        assert!(loaded.source.is_some());
        assert_eq!(loaded.config.risk.weights.security, 1.0);
        assert_eq!(loaded.config.risk.weights.coverage, 0.3);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded = load_config(temp.path(), None).unwrap();
        assert_eq!(loaded.source, None);
        assert_eq!(loaded.config, Config::default());
    }

    #[test]
    fn invalid_config_is_an_error_not_a_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".riskmap.toml");
        fs::write(&path, "[risk.bands]\np0 = 10\np1 = 20\np2 = 30\n").unwrap();

        let err = load_config(temp.path(), None).unwrap_err();
        assert!(matches!(err, Error::Config { path: Some(_), .. }), "{err:?}");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(load_config(temp.path(), Some(&missing)).is_err());
    }

    #[test]
    fn yaml_config_is_supported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".riskmap.yaml");
        fs::write(
            &path,
            indoc! {"
                collectors:
                  churn_window_days: 30
                journeys:
                  journey:
                    - id: checkout
                      patterns: ['src/checkout/**']
                      target: 75
            "},
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.collectors.churn_window_days, 30);
        assert_eq!(config.journeys.journeys[0].target, 75.0);
    }

    #[test]
    fn journeys_file_loads_yaml_list() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journeys.yml");
        fs::write(
            &path,
            indoc! {"
                min_gap_delta: 2.5
                journeys:
                  - id: signup
                    name: Sign up
                    patterns: ['src/signup/*.py']
                    target: 70
            "},
        )
        .unwrap();

        let journeys = load_journeys_file(&path).unwrap();
        assert_eq!(journeys.min_gap_delta, 2.5);
        assert_eq!(journeys.journeys[0].display_name(), "Sign up");
    }
}
