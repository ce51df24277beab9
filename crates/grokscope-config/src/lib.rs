use std::fs;
use std::path::{Path, PathBuf};

use grokscope_core::is_valid_glyph;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GROKSCOPE_DIR_NAME: &str = ".grokscope";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_DATABASE_FILE: &str = "annotations.sqlite";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_PAGE_SIZE: u32 = 1_000;
pub const DEFAULT_MAX_PAGES: u32 = 10;
pub const DEFAULT_GLYPH: &str = "*";
pub const DEFAULT_HIGHLIGHT: &str = "SignColumn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GrokscopeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub annotations: AnnotationsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub verify_on_connect: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: None,
            verify_on_connect: false,
            request_timeout_ms: default_request_timeout_ms(),
            verify_timeout_ms: default_verify_timeout_ms(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    /// Local checkout that search-result paths are relative to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationsConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_glyph")]
    pub default_glyph: String,
    #[serde(default = "default_highlight")]
    pub default_highlight: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagStyleConfig>,
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            default_glyph: default_glyph(),
            default_highlight: default_highlight(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStyleConfig {
    pub name: String,
    pub glyph: String,
    pub highlight: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn grokscope_dir(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(GROKSCOPE_DIR_NAME)
}

pub fn config_path(root: impl AsRef<Path>) -> PathBuf {
    grokscope_dir(root).join(CONFIG_FILE_NAME)
}

/// Absolute location of the annotation database; relative names live under `.grokscope/`.
pub fn database_path(root: impl AsRef<Path>, config: &GrokscopeConfig) -> PathBuf {
    let configured = Path::new(&config.annotations.database);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        grokscope_dir(root).join(configured)
    }
}

pub fn load_config(root: impl AsRef<Path>) -> Result<GrokscopeConfig, ConfigError> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(GrokscopeConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: GrokscopeConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_config(root: impl AsRef<Path>) -> Result<GrokscopeConfig, ConfigError> {
    let root = root.as_ref();
    fs::create_dir_all(grokscope_dir(root))?;

    let path = config_path(root);
    if path.exists() {
        return load_config(root);
    }

    let config = GrokscopeConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &GrokscopeConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.server.address.is_none() {
        warnings.push(ConfigWarning {
            code: "server_address_missing",
            message: "server.address is not set; queries will fail until it is configured"
                .to_owned(),
        });
    }
    if config.source.base_path.is_none() {
        warnings.push(ConfigWarning {
            code: "base_path_missing",
            message: "source.base_path is not set; search results cannot be opened".to_owned(),
        });
    }
    if config.server.page_size == 0 {
        warnings.push(ConfigWarning {
            code: "page_size_zero",
            message: format!("server.page_size is 0, using {DEFAULT_PAGE_SIZE}"),
        });
    }
    if !is_valid_glyph(&config.annotations.default_glyph) {
        warnings.push(ConfigWarning {
            code: "default_glyph_invalid",
            message: format!(
                "annotations.default_glyph '{}' must be 1-2 display cells, using '{DEFAULT_GLYPH}'",
                config.annotations.default_glyph
            ),
        });
    }
    for style in &config.annotations.tags {
        if !is_valid_glyph(&style.glyph) {
            warnings.push(ConfigWarning {
                code: "tag_glyph_invalid",
                message: format!(
                    "glyph '{}' for tag '{}' must be 1-2 display cells; the style is skipped",
                    style.glyph, style.name
                ),
            });
        }
    }

    warnings
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_verify_timeout_ms() -> u64 {
    DEFAULT_VERIFY_TIMEOUT_MS
}

fn default_keepalive_interval_secs() -> u64 {
    DEFAULT_KEEPALIVE_INTERVAL_SECS
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_database() -> String {
    DEFAULT_DATABASE_FILE.to_owned()
}

fn default_glyph() -> String {
    DEFAULT_GLYPH.to_owned()
}

fn default_highlight() -> String {
    DEFAULT_HIGHLIGHT.to_owned()
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn normalize_config(mut config: GrokscopeConfig) -> GrokscopeConfig {
    config.server.address = normalize_optional(config.server.address.take())
        .map(|address| address.trim_end_matches('/').to_owned());
    config.source.base_path = normalize_optional(config.source.base_path.take());
    config.server.max_pages = config.server.max_pages.max(1);

    let database = config.annotations.database.trim();
    config.annotations.database = if database.is_empty() {
        default_database()
    } else {
        database.to_owned()
    };

    let highlight = config.annotations.default_highlight.trim();
    config.annotations.default_highlight = if highlight.is_empty() {
        default_highlight()
    } else {
        highlight.to_owned()
    };

    for style in &mut config.annotations.tags {
        style.name = style.name.trim().to_lowercase();
        style.highlight = style.highlight.trim().to_owned();
    }
    config
        .annotations
        .tags
        .retain(|style| !style.name.is_empty());

    config
}
