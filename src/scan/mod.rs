//! Source-tree scanning: walk one checked-out revision and pull out every
//! throw site of the configured exception type.

pub mod extract;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::config::ScanConfig;

use self::extract::{MessagePattern, extract_messages};

/// One message expression found at a throw site. `filename` is the path of
/// the containing file relative to the repository root, with forward slashes
/// on every platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowSite {
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub sites: Vec<ThrowSite>,
    pub excluded: Vec<String>,
}

#[derive(Debug)]
pub enum ScanError {
    Pattern(regex::Error),
    Io(io::Error),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Pattern(err) => write!(f, "invalid scan pattern: {err}"),
            ScanError::Io(err) => write!(f, "scan failed: {err}"),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<regex::Error> for ScanError {
    fn from(err: regex::Error) -> Self {
        ScanError::Pattern(err)
    }
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        ScanError::Io(err)
    }
}

pub struct TreeScanner {
    pattern: MessagePattern,
    source_root: String,
    extensions: Vec<String>,
    exclude: Option<Regex>,
}

impl TreeScanner {
    pub fn new(config: &ScanConfig, exclude_patterns: &[String]) -> Result<Self, ScanError> {
        Ok(Self {
            pattern: MessagePattern::new(&config.exception, &config.qualified)?,
            source_root: config.source_root.clone(),
            extensions: config.extensions.clone(),
            exclude: exclude_filter(exclude_patterns)?,
        })
    }

    /// Walks the configured source root under `repo_root` and extracts every
    /// throw site, in lexicographic file order. A revision that predates the
    /// source root yields an empty outcome. Files matching an exclusion
    /// pattern are reported in `excluded` instead of being read.
    pub fn scan(&self, repo_root: &Path) -> Result<ScanOutcome, ScanError> {
        let root = repo_root.join(&self.source_root);
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        if root.is_dir() {
            for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                if !self.wanted_extension(entry.path()) {
                    continue;
                }
                files.push((relative_name(repo_root, entry.path()), entry.path().to_path_buf()));
            }
        }
        files.sort();

        let mut outcome = ScanOutcome::default();
        for (relative, path) in files {
            if let Some(filter) = &self.exclude {
                if filter.is_match(&relative) {
                    outcome.excluded.push(relative);
                    continue;
                }
            }
            // Old revisions can carry legacy encodings; decode lossily rather
            // than abort a whole collection run on one file.
            let bytes = fs::read(&path)?;
            let content = String::from_utf8_lossy(&bytes);
            for message in extract_messages(&content, &self.pattern) {
                outcome.sites.push(ThrowSite {
                    filename: relative.clone(),
                    message,
                });
            }
        }
        Ok(outcome)
    }

    fn wanted_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|wanted| wanted == ext)
    }
}

fn relative_name(repo_root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(repo_root).unwrap_or(path);
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compiles the exclusion list into one whole-word alternation applied to
/// relative paths. Blank patterns are dropped; an empty list disables
/// filtering entirely.
pub fn exclude_filter(patterns: &[String]) -> Result<Option<Regex>, regex::Error> {
    let cleaned: Vec<String> = patterns
        .iter()
        .map(|pattern| pattern.trim())
        .filter(|pattern| !pattern.is_empty())
        .map(regex::escape)
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"\b({})\b", cleaned.join("|"))).map(Some)
}
