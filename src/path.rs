// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the configuration tree lives, and where its files are
//! relative to it.

use std::path::{Path, PathBuf};

/// Name of the optional settings file at the top-level of a tree.
pub const SETTINGS_FILE: &str = "nixcfg.toml";

/// Determine absolute path to top-level of configuration tree.
///
/// Uses the given path if there is one, and the current working directory
/// otherwise. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWorkingDir`] if the current working directory is needed but
///   cannot be determined.
pub fn tree_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) if root.is_absolute() => Ok(root),
        Some(root) => Ok(std::env::current_dir().map_err(NoWorkingDir)?.join(root)),
        None => std::env::current_dir().map_err(NoWorkingDir),
    }
}

/// Determine path to settings file of tree at `root`.
pub fn settings_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(SETTINGS_FILE)
}

/// Resolve `path` relative to `root`, leaving absolute paths alone.
pub fn resolve(root: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(path)
}

/// No way to determine current working directory.
#[derive(Debug, thiserror::Error)]
#[error("cannot determine current working directory")]
pub struct NoWorkingDir(#[source] pub std::io::Error);

/// Friendly result alias :3
pub type Result<T, E = NoWorkingDir> = std::result::Result<T, E>;
