use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Compiled-in location of the dawn_db unit, used when nothing else is configured.
pub const DEFAULT_MODULE_PATH: &str = "/usr/local/share/lua/5.4/dawn_db.luac";

/// File name searched for by [`find_config`].
pub const CONFIG_FILE_NAME: &str = "dawn.toml";

/// Overrides the module path.
pub const MODULE_PATH_ENV: &str = "DAWN_DB_MODULE_PATH";

/// Overrides the unit format (`binary`, `text` or `auto`).
pub const UNIT_FORMAT_ENV: &str = "DAWN_DB_UNIT_FORMAT";

/// How the bytes of a unit are interpreted when it is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitFormat {
    /// Precompiled bytecode only.
    #[default]
    Binary,
    /// Source text only.
    Text,
    /// Bytecode or source, detected from the signature byte.
    Auto,
}

impl UnitFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitFormat::Binary => "binary",
            UnitFormat::Text => "text",
            UnitFormat::Auto => "auto",
        }
    }
}

impl fmt::Display for UnitFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(UnitFormat::Binary),
            "text" => Ok(UnitFormat::Text),
            "auto" => Ok(UnitFormat::Auto),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

/// Where the module path of a [`LoaderConfig`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    /// A `dawn.toml` file at this path.
    File(PathBuf),
    Environment,
    Explicit,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Environment => write!(f, "${}", MODULE_PATH_ENV),
            ConfigSource::Explicit => write!(f, "command line"),
        }
    }
}

/// Resolved loader settings: which unit to load and how to parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub module_path: PathBuf,
    pub format: UnitFormat,
    pub source: ConfigSource,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            module_path: PathBuf::from(DEFAULT_MODULE_PATH),
            format: UnitFormat::default(),
            source: ConfigSource::Default,
        }
    }
}

/// The `[module]` table of `dawn.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub format: Option<UnitFormat>,
}

/// Raw TOML structure for deserialization.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    module: ModuleSection,
}

/// Errors that can occur when resolving loader configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid dawn.toml: {0}")]
    ParseError(String),
    #[error("invalid dawn.toml: [module] path must not be empty")]
    EmptyPath,
    #[error("invalid unit format '{0}' (expected 'binary', 'text' or 'auto')")]
    InvalidFormat(String),
}

impl LoaderConfig {
    /// Configuration for an explicitly chosen unit.
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: module_path.into(),
            format: UnitFormat::default(),
            source: ConfigSource::Explicit,
        }
    }

    pub fn with_format(mut self, format: UnitFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the module path; an explicit path wins over every other source.
    pub fn with_module_path(mut self, module_path: impl Into<PathBuf>) -> Self {
        self.module_path = module_path.into();
        self.source = ConfigSource::Explicit;
        self
    }

    /// Resolve configuration from `dawn.toml` (searched upward from
    /// `start_dir`) and the process environment.
    pub fn discover(start_dir: &Path) -> Result<Self, ConfigError> {
        Self::discover_with(start_dir, |key| std::env::var(key).ok())
    }

    /// Like [`LoaderConfig::discover`], reading variables through `lookup`.
    pub fn discover_with<F>(start_dir: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match find_config(start_dir) {
            Some(path) => load_config(&path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Apply `DAWN_DB_MODULE_PATH` and `DAWN_DB_UNIT_FORMAT` on top of the
    /// current settings. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(MODULE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.module_path = PathBuf::from(path);
            self.source = ConfigSource::Environment;
        }
        if let Some(format) = lookup(UNIT_FORMAT_ENV).filter(|f| !f.is_empty()) {
            self.format = format.parse()?;
        }
        Ok(())
    }
}

/// Walk up from `start_dir` looking for `dawn.toml`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load and validate a `dawn.toml` file.
pub fn load_config(path: &Path) -> Result<LoaderConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let root_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    parse_config(&content, root_dir)
}

/// Parse a `dawn.toml` document. A relative `path` is resolved against
/// `root_dir`, the directory holding the file.
pub fn parse_config(content: &str, root_dir: PathBuf) -> Result<LoaderConfig, ConfigError> {
    let raw: RawConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let mut config = LoaderConfig::default();
    if let Some(format) = raw.module.format {
        config.format = format;
    }
    if let Some(path) = raw.module.path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        config.module_path = root_dir.join(path);
        config.source = ConfigSource::File(root_dir.join(CONFIG_FILE_NAME));
    }
    Ok(config)
}
