//! Documentation version synchronization library.
//!
//! This library publishes a version of a project's documentation into a
//! documentation site repository. It mirrors the documentation tree into a
//! version-named directory, keeps the site's sorted version registry in
//! `config.yaml` up to date and can promote a version to be the main one.
//!
//! # Features
//!
//! - **Destructive mirroring**: Destination trees become exact copies of their source
//! - **Injectable mirror**: The [`mirror::Mirror`] trait lets callers replace the filesystem
//! - **Lossless config updates**: Only the version keys of `config.yaml` are rewritten
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust,no_run
//! use docs_version_sync::sync::{DocsSync, DocsSyncOptions};
//! use std::path::PathBuf;
//!
//! let options = DocsSyncOptions {
//!     version: "development".to_string(),
//!     source_repo: PathBuf::from("lifecycle-toolkit"),
//!     docs_repo: PathBuf::from("lifecycle-toolkit-docs"),
//!     ..Default::default()
//! };
//!
//! DocsSync::sync_with_options(options).unwrap();
//! ```

pub mod mirror;
pub mod site_config;
pub mod sync;
