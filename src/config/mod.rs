use std::fs;
use std::path::Path;

use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "faultline.yml";
pub const DEFAULT_DATABASE_FILE: &str = "exceptions.db";

/// Effective scan configuration: which exception type is mined, where source
/// files live, and where the store goes. Defaults target a Cassandra-style
/// Java tree, so a config file is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub exception: String,
    pub qualified: Vec<String>,
    pub source_root: String,
    pub extensions: Vec<String>,
    pub database: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exception: "InvalidRequestException".to_string(),
            qualified: vec!["org.apache.cassandra.exceptions.InvalidRequestException".to_string()],
            source_root: "src".to_string(),
            extensions: vec!["java".to_string()],
            database: DEFAULT_DATABASE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    exception: Option<String>,
    #[serde(default)]
    qualified: Option<Vec<String>>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    extensions: Option<Vec<String>>,
    #[serde(default)]
    database: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    EmptyExceptionName,
    InvalidIdentity { line: usize, token: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Yaml(err) => write!(f, "{err}"),
            Self::EmptyExceptionName => write!(f, "exception name must not be empty"),
            Self::InvalidIdentity { line, token } => {
                write!(f, "line {line}: `{token}` is not an identity number")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

pub fn load_config(path: &Path) -> Result<ScanConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Missing config file means defaults; a present but malformed file is fatal.
pub fn load_config_or_default(path: &Path) -> Result<ScanConfig, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(ScanConfig::default())
    }
}

fn parse_config(content: &str) -> Result<ScanConfig, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(content)?;
    let defaults = ScanConfig::default();

    let config = ScanConfig {
        exception: raw.exception.unwrap_or(defaults.exception),
        qualified: raw.qualified.unwrap_or(defaults.qualified),
        source_root: raw.source_root.unwrap_or(defaults.source_root),
        extensions: raw
            .extensions
            .unwrap_or(defaults.extensions)
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect(),
        database: raw.database.unwrap_or(defaults.database),
    };

    if config.exception.trim().is_empty() {
        return Err(ConfigError::EmptyExceptionName);
    }
    Ok(config)
}

pub fn default_config_yaml() -> String {
    r#"exception: InvalidRequestException
qualified:
  - org.apache.cassandra.exceptions.InvalidRequestException
source_root: src
extensions:
  - java
database: exceptions.db
"#
    .to_string()
}

/// Lines of a list file with blank lines and `#` comments dropped. The
/// surviving line positions define implicit indices for revision lists.
pub fn read_list_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(filter_list_lines(&content))
}

pub fn filter_list_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}

/// One directive per surviving line: two or more whitespace-separated
/// identity numbers. Single-identity lines merge nothing and are skipped;
/// a token that is not an integer makes the whole file invalid.
pub fn parse_merge_directives(content: &str) -> Result<Vec<Vec<i64>>, ConfigError> {
    let mut directives = Vec::new();
    for (line_idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut identities = Vec::new();
        for token in trimmed.split_whitespace() {
            let identity: i64 = token.parse().map_err(|_| ConfigError::InvalidIdentity {
                line: line_idx + 1,
                token: token.to_string(),
            })?;
            identities.push(identity);
        }
        if identities.len() > 1 {
            directives.push(identities);
        }
    }
    Ok(directives)
}

pub fn read_merge_directives(path: &Path) -> Result<Vec<Vec<i64>>, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_merge_directives(&content)
}
