//! Client configuration stored as TOML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::executor::ResponseOrdering;
use crate::viz::{PlanImages, DEFAULT_BEST_PLAN_IMAGE, DEFAULT_PLAN_IMAGE};

/// Planner address used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8888/";

/// Query entered when the user has not typed one.
pub const DEFAULT_QUERY: &str = "SELECT musical.title, musical.year
FROM
  (SELECT * FROM
    (SELECT * FROM animation, musical
    WHERE animation.mid = musical.mid)
  WHERE animation.embedding to [1,2,3,4] < 10)
WHERE musical.year > 1960";

/// Loaded client configuration plus the file it came from.
#[derive(Debug, Default)]
pub struct ClientConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl ClientConfig {
    /// Loads `explicit`, or the default location when `None`. A missing file
    /// yields the defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        data.validate()?;
        Ok(Self { path, data })
    }

    /// Parses configuration text that is not backed by a file.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let data: RawConfig =
            toml::from_str(text).map_err(|source| ConfigError::ParseInline { source })?;
        data.validate()?;
        Ok(Self { path: None, data })
    }

    /// File the configuration was loaded from or will be written to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Planner base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_url(
            self.data
                .server
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL),
        )
    }

    /// Overrides the planner base URL after validating it.
    pub fn set_base_url(&mut self, url: &str) -> Result<(), ConfigError> {
        parse_url(url)?;
        self.data.server.base_url = Some(url.to_string());
        Ok(())
    }

    /// Query used when the user has not entered one.
    pub fn default_query(&self) -> &str {
        self.data.query.default.as_deref().unwrap_or(DEFAULT_QUERY)
    }

    /// Policy for overlapping executions.
    pub fn response_ordering(&self) -> ResponseOrdering {
        self.data.query.response_ordering.unwrap_or_default()
    }

    /// Overrides the response ordering policy.
    pub fn set_response_ordering(&mut self, ordering: ResponseOrdering) {
        self.data.query.response_ordering = Some(ordering);
    }

    /// Visualization handles for the configured image paths.
    pub fn plan_images(&self) -> PlanImages {
        let viz = &self.data.visualization;
        PlanImages::new(
            viz.plan_image.as_deref().unwrap_or(DEFAULT_PLAN_IMAGE),
            viz.best_plan_image.as_deref().unwrap_or(DEFAULT_BEST_PLAN_IMAGE),
        )
    }

    /// Configuration as TOML, with defaults filled in.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.resolved())
            .map_err(|source| ConfigError::Serialize { source })
    }

    /// Writes the configuration, defaults filled in, to its path.
    pub fn persist(&self) -> Result<PathBuf, ConfigError> {
        let target = match &self.path {
            Some(path) => path.clone(),
            None => default_config_path().ok_or(ConfigError::NoConfigPath)?,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = self.to_toml_string()?;
        fs::write(&target, serialized).map_err(|source| ConfigError::Write {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }

    fn resolved(&self) -> RawConfig {
        let images = self.plan_images();
        RawConfig {
            server: ServerSection {
                base_url: Some(
                    self.data
                        .server
                        .base_url
                        .clone()
                        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                ),
            },
            visualization: VisualizationSection {
                plan_image: Some(images.plan.path().to_string()),
                best_plan_image: Some(images.best_plan.path().to_string()),
            },
            query: QuerySection {
                default: Some(self.default_query().to_string()),
                response_ordering: Some(self.response_ordering()),
            },
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        value: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    visualization: VisualizationSection,
    #[serde(default)]
    query: QuerySection,
}

impl RawConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = self.server.base_url.as_deref() {
            parse_url(url)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ServerSection {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct VisualizationSection {
    plan_image: Option<String>,
    best_plan_image: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct QuerySection {
    default: Option<String>,
    response_ordering: Option<ResponseOrdering>,
}

/// Errors raised while loading or writing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// Inline configuration text is not valid.
    #[error("failed to parse config: {source}")]
    ParseInline {
        /// Underlying error.
        source: toml::de::Error,
    },
    /// Serializing the configuration failed.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying error.
        source: toml::ser::Error,
    },
    /// Writing the file failed.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Creating the parent directory failed.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The planner URL does not parse.
    #[error("invalid planner url '{value}': {source}")]
    InvalidUrl {
        /// Offending value.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// The planner URL is not http(s).
    #[error("unsupported planner url scheme '{scheme}'")]
    UnsupportedScheme {
        /// Offending scheme.
        scheme: String,
    },
    /// No path was given and no config directory exists.
    #[error("no config directory found; pass --config or set PLANSYNC_CONFIG")]
    NoConfigPath,
}

/// `<config dir>/plansync/client.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("plansync").join("client.toml"))
}
