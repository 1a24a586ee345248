//! File handling for routing data: format detection, discovery and
//! deserialization of RON, TOML and JSON files.

use conduit_network::RoutingError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading routing data.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The layout parsed but describes something that cannot be built.
    #[error("invalid layout in {file}: {detail}")]
    InvalidLayout { file: PathBuf, detail: String },

    /// The network rejected a node or side from the layout.
    #[error("routing error in {file}: {source}")]
    Routing {
        file: PathBuf,
        #[source]
        source: RoutingError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const EXTENSIONS: [&'static str; 3] = ["ron", "toml", "json"];
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` when none exists and `ConflictingFormats` when more
/// than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in Format::EXTENSIONS {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = &found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing.clone(),
                b: candidate,
            });
        }
        found = Some(candidate);
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format).map_err(|detail| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    })
}

/// Deserialize in-memory text of a known format. Errors are rendered to
/// strings so callers can attach their own file context.
pub fn deserialize_str<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, String> {
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name, returning `UnresolvedRef` if it was never declared.
pub fn resolve_name<V: Copy>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<V, DataLoadError> {
    map.get(name)
        .copied()
        .ok_or_else(|| DataLoadError::UnresolvedRef {
            file: file.to_path_buf(),
            name: name.to_string(),
            expected_kind,
        })
}

/// Fail with `DuplicateName` if `name` is already declared.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
