//! Source enumeration: which files belong to a load batch, in what order.

use std::path::{Path, PathBuf};

use taxi_core::config::SourceConfig;
use tracing::{debug, info};

use crate::error::LoadError;

/// Filename shape `<prefix>_<period>[-<suffix>].<extension>`.
///
/// With period `2025`, `yellow_tripdata_2025-01.parquet` matches; with
/// period `2025-01`, only January does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    pub prefix: String,
    pub period: String,
    pub extension: String,
}

impl FilePattern {
    pub fn new(prefix: impl Into<String>, period: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            period: period.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(&config.prefix, &config.period, &config.extension)
    }

    pub fn matches(&self, file_name: &str) -> bool {
        let stem = match file_name
            .strip_suffix(self.extension.as_str())
            .and_then(|s| s.strip_suffix('.'))
        {
            Some(stem) => stem,
            None => return false,
        };
        let rest = match stem
            .strip_prefix(self.prefix.as_str())
            .and_then(|s| s.strip_prefix('_'))
            .and_then(|s| s.strip_prefix(self.period.as_str()))
        {
            Some(rest) => rest,
            None => return false,
        };
        rest.is_empty() || rest.starts_with('-')
    }
}

impl std::fmt::Display for FilePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}*.{}", self.prefix, self.period, self.extension)
    }
}

/// Ordered, non-empty list of files processed in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    files: Vec<PathBuf>,
}

impl Batch {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// List the files in `dir` (non-recursive) matching `pattern`, sorted by path.
///
/// An empty result is an error: loading zero files after the reset would
/// leave the sink truncated to nothing. A missing directory counts as empty.
pub fn enumerate(dir: &Path, pattern: &FilePattern) -> Result<Batch, LoadError> {
    let no_input = || LoadError::NoInputFiles {
        dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
    };

    if !dir.is_dir() {
        return Err(no_input());
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|e| {
            LoadError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop while listing sources")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if pattern.matches(name) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(no_input());
    }

    files.sort();
    info!(dir = %dir.display(), pattern = %pattern, count = files.len(), "enumerated source files");
    for f in &files {
        debug!(file = %f.display(), "batch member");
    }
    Ok(Batch { files })
}
