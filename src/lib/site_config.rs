//! Documentation site configuration (`config.yaml`).
//!
//! The site configuration is an arbitrary YAML mapping. Only two keys below
//! `params` are managed here:
//!
//! - `params.versions`: the registry of published documentation versions, a
//!   sequence of `{version, url}` mappings kept sorted
//! - `params.version`: the version currently shown as the main documentation
//!
//! Everything else is carried through untouched, in its original key order.
//! Registry entries are moved when the registry is re-sorted but never
//! rewritten, so keys such as an empty `url` or a custom label survive.
//!
//! Versions must be YAML strings. An unquoted `1.10` is the number `1.1`
//! once parsed, so numeric versions are rejected instead of guessed.
//!
//! # Version ordering
//!
//! The registry is sorted descending by `(first character is a digit, version)`.
//! Release numbers such as `1.2.0` therefore rank above named tags such as
//! `development`, and each group is ordered lexicographically. This is a
//! heuristic rather than a semantic version comparison: `v2.0` ranks with the
//! named tags, and `9.0.0` ranks above `10.0.0`.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_yaml::{Mapping, Value};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

const PARAMS_KEY: &str = "params";
const VERSIONS_KEY: &str = "versions";
const MAIN_VERSION_KEY: &str = "version";

/// The site URL under which a documentation version is published.
pub fn version_url(version: &str) -> String {
  format!("/docs-{version}/")
}

/// One published documentation version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
  #[serde(deserialize_with = "version_string")]
  pub version: String,
  #[serde(default)]
  pub url: String,
  /// Any other keys of the entry, preserved as they were.
  #[serde(flatten)]
  pub extra: Mapping,
}

impl VersionEntry {
  pub fn new(version: &str) -> Self {
    Self {
      version: version.to_string(),
      url: version_url(version),
      extra: Mapping::new(),
    }
  }

  fn sort_key(&self) -> (bool, &str) {
    let leading_digit = self
      .version
      .chars()
      .next()
      .is_some_and(|c| c.is_ascii_digit());
    (leading_digit, self.version.as_str())
  }
}

/// Registry order: numbered releases first, then named tags, each group in
/// descending lexicographic order.
fn registry_order(a: &VersionEntry, b: &VersionEntry) -> Ordering {
  b.sort_key().cmp(&a.sort_key())
}

/// Sorts a version registry into registry order.
pub fn sort_versions(versions: &mut [VersionEntry]) {
  versions.sort_by(registry_order);
}

fn version_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Err(de::Error::custom(format!(
      "version `{n}` is an unquoted number, quote it to keep its text"
    ))),
    other => Err(de::Error::custom(format!(
      "expected a version string, found {other:?}"
    ))),
  }
}

/// The parsed site configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
  /// The full document; its `params` value is kept in `params` while loaded.
  document: Mapping,
  params: Mapping,
}

impl FromStr for SiteConfig {
  type Err = SiteConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let value: Value = serde_yaml::from_str(s).map_err(SiteConfigError::Parse)?;

    let mut document = match value {
      Value::Mapping(mapping) => mapping,
      Value::Null => return Err(SiteConfigError::InvalidShape("document is empty".into())),
      _ => {
        return Err(SiteConfigError::InvalidShape(
          "top level is not a mapping".into(),
        ));
      }
    };

    let params = match document.get(PARAMS_KEY) {
      Some(Value::Mapping(params)) => params.clone(),
      Some(Value::Null) | None => {
        #[cfg(feature = "tracing")]
        debug!("No params section, starting with an empty one");
        Mapping::new()
      }
      Some(_) => {
        return Err(SiteConfigError::InvalidShape(
          "`params` is not a mapping".into(),
        ));
      }
    };
    match params.get(MAIN_VERSION_KEY) {
      None | Some(Value::Null) | Some(Value::String(_)) => {}
      Some(other) => {
        return Err(SiteConfigError::InvalidShape(format!(
          "`params.version` must be a quoted string, found {other:?}"
        )));
      }
    }
    // Reserve the slot so `params` keeps its position on write.
    document.insert(Value::from(PARAMS_KEY), Value::Null);

    let config = Self { document, params };
    // Reject a malformed registry up front rather than on first mutation.
    config.versions()?;

    Ok(config)
  }
}

impl SiteConfig {
  /// Reads and parses the configuration file at `path`.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SiteConfigError> {
    let path = path.as_ref();

    #[cfg(feature = "tracing")]
    debug!("Loading site config from {:?}", path);

    let content = std::fs::read_to_string(path).map_err(|source| SiteConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    content.parse()
  }

  /// Writes the configuration to `path`, replacing the previous file in one step.
  pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SiteConfigError> {
    let path = path.as_ref();
    let content = self.to_yaml()?;
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));

    #[cfg(feature = "tracing")]
    debug!("Writing site config to {:?}", path);

    std::fs::write(&tmp, content).map_err(|source| SiteConfigError::Write {
      path: tmp.clone(),
      source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| SiteConfigError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn to_yaml(&self) -> Result<String, SiteConfigError> {
    serde_yaml::to_string(&self.to_value()).map_err(SiteConfigError::Serialize)
  }

  /// The full document, `params` included.
  pub fn to_value(&self) -> Value {
    let mut document = self.document.clone();
    document.insert(Value::from(PARAMS_KEY), Value::Mapping(self.params.clone()));
    Value::Mapping(document)
  }

  /// The version registry, empty when `params.versions` is absent.
  pub fn versions(&self) -> Result<Vec<VersionEntry>, SiteConfigError> {
    match self.params.get(VERSIONS_KEY) {
      None | Some(Value::Null) => Ok(Vec::new()),
      Some(value) => serde_yaml::from_value(value.clone())
        .map_err(|e| SiteConfigError::InvalidShape(format!("`params.versions`: {e}"))),
    }
  }

  /// Adds `version` to the registry unless it is already listed, then re-sorts it.
  ///
  /// Duplicate entries already present in the file collapse to the first one.
  /// Returns whether a new entry was added.
  pub fn register_version(&mut self, version: &str) -> Result<bool, SiteConfigError> {
    let raw = match self.params.get(VERSIONS_KEY) {
      Some(Value::Sequence(entries)) => entries.clone(),
      _ => Vec::new(),
    };
    // Parsed views only drive matching and ordering; the raw entries are written back.
    let mut entries: Vec<(VersionEntry, Value)> = self.versions()?.into_iter().zip(raw).collect();

    let mut seen = HashSet::new();
    entries.retain(|(entry, _)| seen.insert(entry.version.clone()));

    let added = !seen.contains(version);
    if added {
      #[cfg(feature = "tracing")]
      debug!("Registering new version {}", version);
      let entry = VersionEntry::new(version);
      let value = serde_yaml::to_value(&entry).map_err(SiteConfigError::Serialize)?;
      entries.push((entry, value));
    } else {
      #[cfg(feature = "tracing")]
      trace!("Version {} already registered", version);
    }

    entries.sort_by(|(a, _), (b, _)| registry_order(a, b));
    let sequence = entries.into_iter().map(|(_, value)| value).collect();
    self
      .params
      .insert(Value::from(VERSIONS_KEY), Value::Sequence(sequence));

    Ok(added)
  }

  /// The version shown as the main documentation, if set.
  pub fn main_version(&self) -> Option<String> {
    self
      .params
      .get(MAIN_VERSION_KEY)
      .and_then(Value::as_str)
      .map(str::to_string)
  }

  pub fn set_main_version(&mut self, version: &str) {
    #[cfg(feature = "tracing")]
    debug!("Setting main version to {}", version);

    self
      .params
      .insert(Value::from(MAIN_VERSION_KEY), Value::from(version));
  }
}

/// Errors that can occur while reading or writing the site configuration.
#[derive(Debug, thiserror::Error)]
pub enum SiteConfigError {
  /// Error reading the configuration file
  #[error("Failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  /// The configuration is not valid YAML
  #[error("Invalid YAML: {0}")]
  Parse(#[source] serde_yaml::Error),
  /// The configuration is valid YAML but not a site configuration
  #[error("Unexpected config structure: {0}")]
  InvalidShape(String),
  /// Error serializing the configuration
  #[error("Failed to serialize config: {0}")]
  Serialize(#[source] serde_yaml::Error),
  /// Error writing the configuration file
  #[error("Failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl SiteConfigError {
  /// True for failures caused by the file content rather than the filesystem.
  pub fn is_parse_error(&self) -> bool {
    matches!(
      self,
      SiteConfigError::Parse(_) | SiteConfigError::InvalidShape(_)
    )
  }
}
