//! Documentation version synchronization.
//!
//! Publishes one version of the documentation from a source repository into
//! a documentation site repository.
//!
//! # Sync Logic
//!
//! The sync process:
//! 1. Validates the inputs and loads the site `config.yaml`
//! 2. Mirrors `<source>/docs/content/docs` onto `<site>/content/en/docs-<version>`
//! 3. Registers the version in `params.versions` and re-sorts the registry
//! 4. When promoting to main:
//!    - Mirrors `content/en/docs-<version>` onto `content/en/docs`
//!    - Sets `params.version` to the version
//!    - Mirrors `<source>/examples` onto the examples repository
//! 5. Writes `config.yaml` back
//!
//! Mirrors are destructive: files in a destination that are not in the
//! source are deleted. Nothing is rolled back when a step fails.
//!
//! Runs hold no lock. Two runs against the same site race on the mirrored
//! trees and the last one to write `config.yaml` wins, so callers must
//! serialize invocations.
//!
//! # Examples
//!
//! ```rust,no_run
//! use docs_version_sync::sync::{DocsSync, DocsSyncOptions};
//! use std::path::PathBuf;
//!
//! let options = DocsSyncOptions {
//!     version: "1.2.0".to_string(),
//!     source_repo: PathBuf::from("lifecycle-toolkit"),
//!     docs_repo: PathBuf::from("lifecycle-toolkit-docs"),
//!     examples_repo: PathBuf::from("lifecycle-toolkit-examples"),
//!     promote_to_main: true,
//!     dry_run: false,
//! };
//!
//! DocsSync::sync_with_options(options).unwrap();
//! ```

use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::mirror::{DirMirror, Mirror, MirrorError, MirrorOptions, MirrorReport};
use crate::site_config::{SiteConfig, SiteConfigError};

/// Documentation sources inside the source repository.
pub const SOURCE_DOCS_DIR: &str = "docs/content/docs";
/// Examples inside the source repository.
pub const SOURCE_EXAMPLES_DIR: &str = "examples";
/// Content root of the documentation site.
pub const SITE_CONTENT_DIR: &str = "content/en";
/// Directory name of the main documentation below the content root.
pub const MAIN_DOCS_DIR: &str = "docs";
pub const SITE_CONFIG_FILE: &str = "config.yaml";

const DOCS_EXCLUDES: &[&str] = &["^tmp", "Makefile"];
const EXAMPLES_EXCLUDES: &[&str] = &["^tmp"];

/// Main synchronization service for documentation versions.
pub struct DocsSync;

impl DocsSync {
  /// Synchronizes a documentation version on the local filesystem.
  pub fn sync_with_options(options: DocsSyncOptions) -> Result<SyncSummary, DocsSyncError> {
    Self::sync_with_mirror(options, &DirMirror)
  }

  /// Synchronizes a documentation version, delegating every directory mirror to `mirror`.
  ///
  /// Inputs are validated and the site configuration is parsed before any
  /// directory is touched.
  pub fn sync_with_mirror<M: Mirror + ?Sized>(
    options: DocsSyncOptions,
    mirror: &M,
  ) -> Result<SyncSummary, DocsSyncError> {
    options.validate()?;

    let DocsSyncOptions {
      version,
      source_repo,
      docs_repo,
      examples_repo,
      promote_to_main,
      dry_run,
    } = options;

    #[cfg(feature = "tracing")]
    info!(%version, promote_to_main, dry_run, "Starting docs sync");

    let config_path = docs_repo.join(SITE_CONFIG_FILE);
    let mut config = SiteConfig::load(&config_path)?;

    let source_docs = source_repo.join(SOURCE_DOCS_DIR);
    let versioned_docs = Self::versioned_docs_dir(&docs_repo, &version);
    let docs_options = MirrorOptions::new(DOCS_EXCLUDES.iter().copied()).dry_run(dry_run);

    #[cfg(feature = "tracing")]
    debug!(?source_docs, ?versioned_docs, "Mirroring versioned docs");
    let docs = mirror.mirror(&source_docs, &versioned_docs, &docs_options)?;

    let version_added = config.register_version(&version)?;

    let mut summary = SyncSummary {
      docs,
      version_added,
      main_docs: None,
      examples: None,
    };

    if promote_to_main {
      let main_docs = Self::main_docs_dir(&docs_repo);
      // A dry run wrote nothing, so the versioned tree may not exist yet.
      let main_source = if dry_run { &source_docs } else { &versioned_docs };

      #[cfg(feature = "tracing")]
      debug!(?main_source, ?main_docs, "Promoting version to main docs");
      summary.main_docs = Some(mirror.mirror(main_source, &main_docs, &docs_options)?);

      config.set_main_version(&version);

      let source_examples = source_repo.join(SOURCE_EXAMPLES_DIR);
      let examples_options = MirrorOptions::new(EXAMPLES_EXCLUDES.iter().copied()).dry_run(dry_run);

      #[cfg(feature = "tracing")]
      debug!(?source_examples, ?examples_repo, "Mirroring examples");
      summary.examples = Some(mirror.mirror(&source_examples, &examples_repo, &examples_options)?);
    }

    if dry_run {
      #[cfg(feature = "tracing")]
      info!("Dry run, leaving {:?} untouched", config_path);
    } else {
      config.save(&config_path)?;
    }

    #[cfg(feature = "tracing")]
    info!("Docs sync completed successfully");

    Ok(summary)
  }

  /// `<docs_repo>/content/en/docs-<version>`
  pub fn versioned_docs_dir(docs_repo: &Path, version: &str) -> PathBuf {
    docs_repo
      .join(SITE_CONTENT_DIR)
      .join(format!("{MAIN_DOCS_DIR}-{version}"))
  }

  /// `<docs_repo>/content/en/docs`
  pub fn main_docs_dir(docs_repo: &Path) -> PathBuf {
    docs_repo.join(SITE_CONTENT_DIR).join(MAIN_DOCS_DIR)
  }
}

/// Configuration options for a documentation sync.
#[derive(Debug, Clone, Default)]
pub struct DocsSyncOptions {
  /// Version identifier, e.g. `1.2.0` or `development`.
  pub version: String,
  /// Repository holding `docs/content/docs` and `examples`.
  pub source_repo: PathBuf,
  /// Documentation site repository holding `config.yaml` and `content/en`.
  pub docs_repo: PathBuf,
  /// Destination of the examples; only used when promoting to main.
  pub examples_repo: PathBuf,
  /// Also publish this version as the main documentation.
  pub promote_to_main: bool,
  /// Report what would change without writing anything.
  pub dry_run: bool,
}

impl DocsSyncOptions {
  fn validate(&self) -> Result<(), DocsSyncError> {
    if self.version.trim().is_empty() {
      return Err(DocsSyncError::MissingInput("version"));
    }
    if self.version.contains(['/', '\\']) {
      return Err(DocsSyncError::InvalidVersion(self.version.clone()));
    }
    if self.source_repo.as_os_str().is_empty() {
      return Err(DocsSyncError::MissingInput("klt-repo"));
    }
    if self.docs_repo.as_os_str().is_empty() {
      return Err(DocsSyncError::MissingInput("klt-docs"));
    }
    if self.promote_to_main && self.examples_repo.as_os_str().is_empty() {
      return Err(DocsSyncError::MissingInput("klt-examples"));
    }
    Ok(())
  }
}

/// What a sync run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
  /// Mirror of the source docs into the versioned directory.
  pub docs: MirrorReport,
  /// Whether the version was new to the registry.
  pub version_added: bool,
  /// Mirror of the versioned docs onto the main docs, when promoting.
  pub main_docs: Option<MirrorReport>,
  /// Mirror of the examples, when promoting.
  pub examples: Option<MirrorReport>,
}

/// Errors that can occur during a documentation sync.
#[derive(Debug, thiserror::Error)]
pub enum DocsSyncError {
  /// A required input is empty
  #[error("Missing required input: {0}")]
  MissingInput(&'static str),
  /// The version cannot be used as a directory name
  #[error("Invalid version identifier: {0:?}")]
  InvalidVersion(String),
  /// Error mirroring one of the directory trees
  #[error("Mirror error: {0}")]
  Mirror(#[from] MirrorError),
  /// Error reading, parsing or writing the site configuration
  #[error("Site config error: {0}")]
  SiteConfig(#[from] SiteConfigError),
}

impl DocsSyncError {
  /// True when the failure was caught while validating inputs, before any mutation.
  pub fn is_input_error(&self) -> bool {
    matches!(
      self,
      DocsSyncError::MissingInput(_) | DocsSyncError::InvalidVersion(_)
    )
  }
}
