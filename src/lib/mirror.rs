//! One-way directory mirroring.
//!
//! A mirror turns a destination directory into an exact copy of a source
//! directory:
//!
//! 1. Files only present in the source are copied over
//! 2. Files present in both are overwritten when their bytes differ
//! 3. Entries only present in the destination are removed
//!
//! Entries matching an exclusion pattern are skipped on both sides: they are
//! never copied from the source and never removed from the destination.
//! Patterns are regular expressions anchored at the start of the candidate,
//! and each entry is tested by its path relative to the mirror root (with
//! `/` separators) as well as by its file name. Excluding a directory
//! excludes its whole subtree.
//!
//! Mirroring is not transactional. When an operation fails halfway the
//! destination is left as the completed steps made it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use docs_version_sync::mirror::{DirMirror, Mirror, MirrorOptions};
//! use std::path::Path;
//!
//! let options = MirrorOptions::new(["^tmp", "Makefile"]);
//! let report = DirMirror
//!   .mirror(Path::new("repo/docs"), Path::new("site/docs"), &options)
//!   .unwrap();
//! println!("{} files copied", report.created.len());
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

/// Reconciles a destination directory onto a source directory.
pub trait Mirror {
  /// Makes `dest` mirror `source`, honoring `options`.
  fn mirror(
    &self,
    source: &Path,
    dest: &Path,
    options: &MirrorOptions,
  ) -> Result<MirrorReport, MirrorError>;
}

/// Options controlling a single mirror run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorOptions {
  /// Exclusion patterns, matched from the start of a relative path or file name.
  pub exclude: Vec<String>,
  /// Create the destination (and its parents) when it does not exist.
  pub create: bool,
  /// Only report what would change.
  pub dry_run: bool,
}

impl MirrorOptions {
  /// Options with the given exclusions that create a missing destination.
  pub fn new<I, S>(exclude: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      exclude: exclude.into_iter().map(Into::into).collect(),
      create: true,
      dry_run: false,
    }
  }

  pub fn dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = dry_run;
    self
  }
}

/// Relative paths touched by a mirror run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
  /// Files copied into the destination.
  pub created: Vec<PathBuf>,
  /// Files overwritten because their content differed.
  pub updated: Vec<PathBuf>,
  /// Files already identical in both trees.
  pub unchanged: Vec<PathBuf>,
  /// Files and directories deleted from the destination.
  pub removed: Vec<PathBuf>,
}

impl MirrorReport {
  /// True when the destination already was an exact mirror.
  pub fn is_noop(&self) -> bool {
    self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
  }
}

/// Filesystem-backed [`Mirror`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DirMirror;

impl Mirror for DirMirror {
  fn mirror(
    &self,
    source: &Path,
    dest: &Path,
    options: &MirrorOptions,
  ) -> Result<MirrorReport, MirrorError> {
    #[cfg(feature = "tracing")]
    debug!(?source, ?dest, exclude = ?options.exclude, dry_run = options.dry_run, "Mirroring directory");

    let filter = ExcludeFilter::new(&options.exclude)?;

    if !source.exists() {
      return Err(MirrorError::SourceNotFound(source.to_path_buf()));
    }
    if !source.is_dir() {
      return Err(MirrorError::NotADirectory(source.to_path_buf()));
    }

    let dest_exists = dest.exists();
    if dest_exists && !dest.is_dir() {
      return Err(MirrorError::NotADirectory(dest.to_path_buf()));
    }
    if !dest_exists {
      if !options.create {
        return Err(MirrorError::DestinationNotFound(dest.to_path_buf()));
      }
      if !options.dry_run {
        #[cfg(feature = "tracing")]
        debug!("Creating destination: {:?}", dest);
        fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
      }
    }

    let source_entries = scan(source, &filter, Side::Source)?;
    let dest_entries = if dest_exists {
      scan(dest, &filter, Side::Dest)?
    } else {
      BTreeMap::new()
    };

    let mut report = MirrorReport::default();
    let apply = !options.dry_run;
    // Destination directories already deleted, along with everything below them.
    let mut removed_dirs: Vec<PathBuf> = Vec::new();

    for (rel, kind) in &source_entries {
      let from = source.join(rel);
      let to = dest.join(rel);

      match (kind, dest_entries.get(rel)) {
        (EntryKind::Dir, Some(EntryKind::Dir)) => {}
        (EntryKind::Link, _) => {}
        (EntryKind::Dir, existing) => {
          if existing.is_some() {
            #[cfg(feature = "tracing")]
            trace!("Replacing non-directory with directory: {:?}", rel);
            report.removed.push(rel.clone());
            if apply {
              fs::remove_file(&to).map_err(|e| io_err(&to, e))?;
            }
          }
          if apply {
            fs::create_dir_all(&to).map_err(|e| io_err(&to, e))?;
          }
        }
        (EntryKind::File, None) => {
          #[cfg(feature = "tracing")]
          trace!("Creating {:?}", rel);
          report.created.push(rel.clone());
          if apply {
            copy_file(&from, &to)?;
          }
        }
        (EntryKind::File, Some(EntryKind::Dir)) => {
          #[cfg(feature = "tracing")]
          trace!("Replacing directory with file: {:?}", rel);
          report.removed.push(rel.clone());
          report.created.push(rel.clone());
          removed_dirs.push(rel.clone());
          if apply {
            fs::remove_dir_all(&to).map_err(|e| io_err(&to, e))?;
            copy_file(&from, &to)?;
          }
        }
        (EntryKind::File, Some(EntryKind::Link)) => {
          // Never copy through a link: its target may live outside `dest`.
          #[cfg(feature = "tracing")]
          trace!("Replacing link with file: {:?}", rel);
          report.removed.push(rel.clone());
          report.created.push(rel.clone());
          if apply {
            fs::remove_file(&to).map_err(|e| io_err(&to, e))?;
            copy_file(&from, &to)?;
          }
        }
        (EntryKind::File, Some(EntryKind::File)) => {
          if same_content(&from, &to)? {
            report.unchanged.push(rel.clone());
          } else {
            #[cfg(feature = "tracing")]
            trace!("Updating {:?}", rel);
            report.updated.push(rel.clone());
            if apply {
              copy_file(&from, &to)?;
            }
          }
        }
      }
    }

    // Parents sort before their children, so a removed directory shadows
    // everything below it.
    for (rel, kind) in &dest_entries {
      if source_entries.contains_key(rel) || removed_dirs.iter().any(|dir| rel.starts_with(dir)) {
        continue;
      }

      #[cfg(feature = "tracing")]
      trace!("Removing {:?}", rel);
      report.removed.push(rel.clone());

      let target = dest.join(rel);
      match kind {
        EntryKind::Dir => {
          removed_dirs.push(rel.clone());
          if apply {
            fs::remove_dir_all(&target).map_err(|e| io_err(&target, e))?;
          }
        }
        EntryKind::File | EntryKind::Link => {
          if apply {
            fs::remove_file(&target).map_err(|e| io_err(&target, e))?;
          }
        }
      }
    }

    #[cfg(feature = "tracing")]
    debug!(
      created = report.created.len(),
      updated = report.updated.len(),
      unchanged = report.unchanged.len(),
      removed = report.removed.len(),
      "Mirror finished"
    );

    Ok(report)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
  File,
  Dir,
  /// Symlink or special file in the destination.
  Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
  Source,
  Dest,
}

struct ExcludeFilter {
  patterns: Vec<Regex>,
}

impl ExcludeFilter {
  fn new(patterns: &[String]) -> Result<Self, MirrorError> {
    let patterns = patterns
      .iter()
      .map(|pattern| Regex::new(&format!("^(?:{pattern})")))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self { patterns })
  }

  fn is_excluded(&self, rel: &Path) -> bool {
    if self.patterns.is_empty() {
      return false;
    }

    let joined = rel
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    let name = rel
      .file_name()
      .map(|n| n.to_string_lossy())
      .unwrap_or_default();

    self
      .patterns
      .iter()
      .any(|re| re.is_match(&joined) || re.is_match(&name))
  }
}

/// Collects every non-excluded entry below `root`, keyed by relative path.
///
/// Symlinks are never followed. In the source a link resolving to a file is
/// read as that file and any other link or special entry is ignored. In the
/// destination every link or special entry is kept as [`EntryKind::Link`] so
/// it gets replaced or removed instead of written through.
fn scan(
  root: &Path,
  filter: &ExcludeFilter,
  side: Side,
) -> Result<BTreeMap<PathBuf, EntryKind>, MirrorError> {
  let mut entries = BTreeMap::new();

  let walker = WalkDir::new(root)
    .min_depth(1)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| match entry.path().strip_prefix(root) {
      Ok(rel) => !filter.is_excluded(rel),
      Err(_) => true,
    });

  for entry in walker {
    let entry = entry?;
    let Ok(rel) = entry.path().strip_prefix(root) else {
      continue;
    };

    let file_type = entry.file_type();
    let kind = if file_type.is_dir() {
      EntryKind::Dir
    } else if file_type.is_file() {
      EntryKind::File
    } else if side == Side::Dest {
      EntryKind::Link
    } else if entry.path().is_file() {
      EntryKind::File
    } else {
      #[cfg(feature = "tracing")]
      trace!("Skipping special entry: {:?}", entry.path());
      continue;
    };

    entries.insert(rel.to_path_buf(), kind);
  }

  Ok(entries)
}

fn same_content(a: &Path, b: &Path) -> Result<bool, MirrorError> {
  let a_len = fs::metadata(a).map_err(|e| io_err(a, e))?.len();
  let b_len = fs::metadata(b).map_err(|e| io_err(b, e))?.len();
  if a_len != b_len {
    return Ok(false);
  }

  let a_bytes = fs::read(a).map_err(|e| io_err(a, e))?;
  let b_bytes = fs::read(b).map_err(|e| io_err(b, e))?;
  Ok(a_bytes == b_bytes)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), MirrorError> {
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
  }
  fs::copy(from, to).map_err(|e| io_err(to, e))?;
  Ok(())
}

/// Errors that can occur while mirroring a directory.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
  /// The source directory does not exist
  #[error("Source directory not found: {0}")]
  SourceNotFound(PathBuf),
  /// The destination does not exist and creation was not requested
  #[error("Destination directory not found: {0}")]
  DestinationNotFound(PathBuf),
  /// A mirror root exists but is not a directory
  #[error("Not a directory: {0}")]
  NotADirectory(PathBuf),
  /// An exclusion pattern is not a valid regular expression
  #[error("Invalid exclude pattern: {0}")]
  InvalidPattern(#[from] regex::Error),
  /// Error walking one of the trees
  #[error("Directory walk error: {0}")]
  Walk(#[from] walkdir::Error),
  /// Error reading or writing an entry
  #[error("IO error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

fn io_err(path: &Path, source: std::io::Error) -> MirrorError {
  MirrorError::Io {
    path: path.to_path_buf(),
    source,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
  }

  fn docs_options() -> MirrorOptions {
    MirrorOptions::new(["^tmp", "Makefile"])
  }

  #[test]
  fn test_mirror_creates_destination() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("out/nested/dest");

    write(&source, "index.md", "# Index");
    write(&source, "guide/install.md", "install");

    let report = DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert_eq!(read(&dest, "index.md"), "# Index");
    assert_eq!(read(&dest, "guide/install.md"), "install");
    assert_eq!(
      report.created,
      vec![PathBuf::from("guide/install.md"), PathBuf::from("index.md")]
    );
    assert!(report.removed.is_empty());
  }

  #[test]
  fn test_mirror_reconciles_existing_destination() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");

    write(&source, "same.md", "same");
    write(&source, "changed.md", "new content");
    write(&dest, "same.md", "same");
    write(&dest, "changed.md", "old");
    write(&dest, "stale.md", "stale");
    write(&dest, "old/deep/page.md", "gone");

    let report = DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert_eq!(read(&dest, "changed.md"), "new content");
    assert!(!dest.join("stale.md").exists());
    assert!(!dest.join("old").exists());

    assert_eq!(report.unchanged, vec![PathBuf::from("same.md")]);
    assert_eq!(report.updated, vec![PathBuf::from("changed.md")]);
    assert_eq!(
      report.removed,
      vec![PathBuf::from("old"), PathBuf::from("stale.md")]
    );
  }

  #[test]
  fn test_mirror_same_length_different_content() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");

    write(&source, "page.md", "abc");
    write(&dest, "page.md", "xyz");

    let report = DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert_eq!(read(&dest, "page.md"), "abc");
    assert_eq!(report.updated, vec![PathBuf::from("page.md")]);
  }

  #[test]
  fn test_mirror_exclusions() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");

    write(&source, "page.md", "page");
    write(&source, "Makefile", "all:");
    write(&source, "tmp/scratch.md", "scratch");
    write(&source, "tmpfile.md", "scratch");
    write(&source, "guide/Makefile", "all:");
    write(&source, "guide/tmp.md", "scratch");
    write(&source, "guide/intro.md", "intro");
    write(&dest, "tmp-local/keep.md", "keep");

    let report = DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert!(dest.join("page.md").exists());
    assert!(dest.join("guide/intro.md").exists());
    assert!(!dest.join("Makefile").exists());
    assert!(!dest.join("tmp").exists());
    assert!(!dest.join("tmpfile.md").exists());
    assert!(!dest.join("guide/Makefile").exists());
    assert!(!dest.join("guide/tmp.md").exists());

    // Excluded destination entries are preserved
    assert_eq!(read(&dest, "tmp-local/keep.md"), "keep");
    assert!(report.removed.is_empty());
  }

  #[test]
  fn test_mirror_kind_changes() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");

    write(&source, "was_dir", "now a file");
    write(&source, "was_file/page.md", "inside");
    write(&dest, "was_dir/page.md", "old");
    write(&dest, "was_file", "old");

    DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert_eq!(read(&dest, "was_dir"), "now a file");
    assert_eq!(read(&dest, "was_file/page.md"), "inside");
  }

  #[test]
  fn test_mirror_is_noop_when_in_sync() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");

    write(&source, "a/b.md", "b");

    DirMirror.mirror(&source, &dest, &docs_options()).unwrap();
    let second = DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert!(second.is_noop());
    assert_eq!(second.unchanged, vec![PathBuf::from("a/b.md")]);
  }

  #[test]
  fn test_mirror_dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let existing = temp.path().join("existing");
    let missing = temp.path().join("missing");

    write(&source, "new.md", "new");
    write(&existing, "stale.md", "stale");

    let options = docs_options().dry_run(true);

    let report = DirMirror.mirror(&source, &existing, &options).unwrap();
    assert_eq!(report.created, vec![PathBuf::from("new.md")]);
    assert_eq!(report.removed, vec![PathBuf::from("stale.md")]);
    assert!(existing.join("stale.md").exists());
    assert!(!existing.join("new.md").exists());

    let report = DirMirror.mirror(&source, &missing, &options).unwrap();
    assert_eq!(report.created, vec![PathBuf::from("new.md")]);
    assert!(!missing.exists());
  }

  #[test]
  fn test_mirror_source_not_found() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("nope");
    let dest = temp.path().join("dest");

    let result = DirMirror.mirror(&source, &dest, &docs_options());

    match result.unwrap_err() {
      MirrorError::SourceNotFound(path) => assert_eq!(path, source),
      other => panic!("Expected SourceNotFound, got {other:?}"),
    }
    assert!(!dest.exists());
  }

  #[test]
  fn test_mirror_without_create() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");
    write(&source, "page.md", "page");

    let options = MirrorOptions {
      create: false,
      ..docs_options()
    };

    assert!(matches!(
      DirMirror.mirror(&source, &dest, &options),
      Err(MirrorError::DestinationNotFound(_))
    ));
  }

  #[test]
  fn test_mirror_invalid_pattern() {
    let temp = TempDir::new().unwrap();
    let options = MirrorOptions::new(["(unclosed"]);

    assert!(matches!(
      DirMirror.mirror(temp.path(), temp.path(), &options),
      Err(MirrorError::InvalidPattern(_))
    ));
  }

  #[cfg(unix)]
  #[test]
  fn test_mirror_replaces_destination_symlinks() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");
    let outside = temp.path().join("outside.txt");
    let outside_dir = temp.path().join("outside-dir");

    write(&source, "page.md", "from source");
    write(temp.path(), "outside.txt", "precious");
    write(&outside_dir, "kept.md", "kept");
    fs::create_dir_all(&dest).unwrap();
    symlink(&outside, dest.join("page.md")).unwrap();
    symlink(&outside_dir, dest.join("linkdir")).unwrap();
    symlink(temp.path().join("nowhere"), dest.join("dangling")).unwrap();

    let report = DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert_eq!(fs::read_to_string(&outside).unwrap(), "precious");
    assert_eq!(read(&outside_dir, "kept.md"), "kept");

    let page = fs::symlink_metadata(dest.join("page.md")).unwrap();
    assert!(page.file_type().is_file());
    assert_eq!(read(&dest, "page.md"), "from source");
    assert!(fs::symlink_metadata(dest.join("linkdir")).is_err());
    assert!(fs::symlink_metadata(dest.join("dangling")).is_err());

    assert_eq!(report.created, vec![PathBuf::from("page.md")]);
    assert!(report.updated.is_empty());
    assert_eq!(
      report.removed,
      vec![
        PathBuf::from("page.md"),
        PathBuf::from("dangling"),
        PathBuf::from("linkdir"),
      ]
    );
  }

  #[cfg(unix)]
  #[test]
  fn test_mirror_replaces_link_with_directory() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");
    let outside_dir = temp.path().join("outside-dir");

    write(&source, "guide/intro.md", "intro");
    write(&outside_dir, "other.md", "other");
    fs::create_dir_all(&dest).unwrap();
    symlink(&outside_dir, dest.join("guide")).unwrap();

    DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    assert!(fs::symlink_metadata(dest.join("guide")).unwrap().is_dir());
    assert_eq!(read(&dest, "guide/intro.md"), "intro");
    assert!(!outside_dir.join("intro.md").exists());
    assert_eq!(read(&outside_dir, "other.md"), "other");
  }

  #[cfg(unix)]
  #[test]
  fn test_mirror_copies_source_file_links_as_files() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dest");

    write(temp.path(), "shared.md", "shared");
    fs::create_dir_all(&source).unwrap();
    symlink(temp.path().join("shared.md"), source.join("shared.md")).unwrap();
    symlink(temp.path().join("nowhere"), source.join("dangling")).unwrap();

    let report = DirMirror.mirror(&source, &dest, &docs_options()).unwrap();

    let copied = fs::symlink_metadata(dest.join("shared.md")).unwrap();
    assert!(copied.file_type().is_file());
    assert_eq!(read(&dest, "shared.md"), "shared");
    assert!(fs::symlink_metadata(dest.join("dangling")).is_err());
    assert_eq!(report.created, vec![PathBuf::from("shared.md")]);
  }

  #[test]
  fn test_exclude_filter_matches_from_start() {
    let filter = ExcludeFilter::new(&["^tmp".to_string(), "Makefile".to_string()]).unwrap();

    assert!(filter.is_excluded(Path::new("tmp")));
    assert!(filter.is_excluded(Path::new("tmp/page.md")));
    assert!(filter.is_excluded(Path::new("guide/tmp.md")));
    assert!(filter.is_excluded(Path::new("guide/Makefile")));
    assert!(!filter.is_excluded(Path::new("guide/attempt.md")));
    assert!(!filter.is_excluded(Path::new("guide/NotAMakefile")));
  }
}
