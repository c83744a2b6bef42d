use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = ".qreport.yml";
pub const GEOFILE_WIDTH_DEFAULT: u32 = 690;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    #[default]
    Skip,
    Abort,
}

impl UnresolvedPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub geofile_width: u32,
    pub include_fails: bool,
    pub unresolved: UnresolvedPolicy,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            geofile_width: GEOFILE_WIDTH_DEFAULT,
            include_fails: false,
            unresolved: UnresolvedPolicy::Skip,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    geofile_width: Option<u32>,
    #[serde(default)]
    include_fails: Option<bool>,
    #[serde(default)]
    unresolved: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Yaml(PathBuf, serde_yaml::Error),
    InvalidPolicy(String),
    InvalidWidth(u32),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, err) => write!(f, "{}: {err}", path.display()),
            Self::Yaml(path, err) => write!(f, "{}: {err}", path.display()),
            Self::InvalidPolicy(value) => {
                write!(f, "unknown unresolved-token policy `{value}` (expected skip or abort)")
            }
            Self::InvalidWidth(value) => write!(f, "geofile width must be positive, got {value}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Default)]
struct ConfigLayer {
    geofile_width: Option<u32>,
    include_fails: Option<bool>,
    unresolved: Option<UnresolvedPolicy>,
}

/// Merges the user layer, the nearest project layer above `cwd`, and an
/// explicit file, in that order. Later layers win key by key. Only the
/// explicit file is required to exist.
pub fn load_effective_config(
    cwd: &Path,
    explicit_config: Option<&Path>,
    user_config: Option<&Path>,
) -> Result<EffectiveConfig, ConfigError> {
    let mut merged = EffectiveConfig::default();

    if let Some(path) = user_config.filter(|path| path.exists()) {
        merge_layer(&mut merged, load_config_layer(path)?);
    }

    if let Some(path) = find_nearest_project_config(cwd) {
        merge_layer(&mut merged, load_config_layer(&path)?);
    }

    if let Some(path) = explicit_config {
        merge_layer(&mut merged, load_config_layer(path)?);
    }

    Ok(merged)
}

pub fn find_nearest_project_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn merge_layer(merged: &mut EffectiveConfig, layer: ConfigLayer) {
    if let Some(width) = layer.geofile_width {
        merged.geofile_width = width;
    }
    if let Some(include_fails) = layer.include_fails {
        merged.include_fails = include_fails;
    }
    if let Some(policy) = layer.unresolved {
        merged.unresolved = policy;
    }
}

fn load_config_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content =
        fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
    parse_config_layer(path, &content)
}

fn parse_config_layer(path: &Path, content: &str) -> Result<ConfigLayer, ConfigError> {
    if content.trim().is_empty() {
        return Ok(ConfigLayer::default());
    }
    let raw: RawConfig =
        serde_yaml::from_str(content).map_err(|err| ConfigError::Yaml(path.to_path_buf(), err))?;
    let geofile_width = match raw.geofile_width {
        Some(0) => return Err(ConfigError::InvalidWidth(0)),
        other => other,
    };
    let unresolved = raw
        .unresolved
        .as_deref()
        .map(parse_unresolved_policy)
        .transpose()?;
    Ok(ConfigLayer {
        geofile_width,
        include_fails: raw.include_fails,
        unresolved,
    })
}

pub fn parse_unresolved_policy(raw: &str) -> Result<UnresolvedPolicy, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "skip" => Ok(UnresolvedPolicy::Skip),
        "abort" => Ok(UnresolvedPolicy::Abort),
        _ => Err(ConfigError::InvalidPolicy(raw.to_string())),
    }
}

pub fn default_user_config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE_NAME)
}

pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}
