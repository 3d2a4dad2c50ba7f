// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Entity file store management.
//!
//! Users and profiles of a configuration tree each live in their own
//! __entity directory__. Every entity is one `<name>.nix` file at the
//! top-level of that directory, so `profiles/users/gamer.nix` means that the
//! user profile store contains a profile named "gamer".
//!
//! A `default.nix` file may sit next to the entities. It is the index that
//! pulls the entities into the flake, and it is never treated as an entity
//! itself.
//!
//! Only the top-level of an entity directory is evaluated. Entity names
//! must be bare Nix identifiers, because they end up as attribute names and
//! file names.

use crate::registry::scan::is_identifier;

use glob::Pattern;
use std::{
    fs::{self, read_to_string},
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Name of index file in an entity directory.
pub const INDEX_FILE: &str = "default.nix";

/// Entity file with its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFile {
    pub name: String,
    pub path: PathBuf,
    pub contents: String,
}

/// Directory holding one `.nix` file per named entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDir {
    dir: PathBuf,
}

impl EntityDir {
    /// Construct new entity directory handle.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of entity directory.
    pub fn path(&self) -> &Path {
        self.dir.as_path()
    }

    /// Path to index file.
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Path to entity file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::InvalidName`] if name is not a bare Nix
    ///   identifier.
    pub fn entity_path(&self, name: &str) -> Result<PathBuf> {
        if !is_identifier(name) || name == "default" {
            return Err(StoreError::InvalidName { name: name.into() });
        }

        Ok(self.dir.join(format!("{name}.nix")))
    }

    /// Check if entity exists.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::InvalidName`] if name is invalid.
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.entity_path(name)?.is_file())
    }

    /// Read entity file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::InvalidName`] if name is invalid.
    /// - Return [`StoreError::NotFound`] if entity does not exist.
    /// - Return [`StoreError::Read`] if entity file cannot be read.
    pub fn read(&self, name: &str) -> Result<EntityFile> {
        let path = self.entity_path(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound { path });
        }

        let contents = read_file(&path)?;
        Ok(EntityFile {
            name: name.into(),
            path,
            contents,
        })
    }

    /// Create new entity file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::InvalidName`] if name is invalid.
    /// - Return [`StoreError::AlreadyExists`] if entity already exists.
    /// - Return [`StoreError::Write`] if entity file cannot be written.
    #[instrument(skip(self, contents), level = "debug")]
    pub fn create(&self, name: &str, contents: impl AsRef<str>) -> Result<PathBuf> {
        let path = self.entity_path(name)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists { path });
        }

        mkdirp::mkdirp(&self.dir).map_err(|source| StoreError::Write {
            source,
            path: self.dir.clone(),
        })?;
        write_file(&path, contents)?;
        Ok(path)
    }

    /// Remove entity file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::InvalidName`] if name is invalid.
    /// - Return [`StoreError::NotFound`] if entity does not exist.
    /// - Return [`StoreError::Remove`] if entity file cannot be removed.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, name: &str) -> Result<PathBuf> {
        let path = self.entity_path(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound { path });
        }

        fs::remove_file(&path).map_err(|source| StoreError::Remove {
            source,
            path: path.clone(),
        })?;

        Ok(path)
    }

    /// List entity names in sorted order.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Pattern`] if the directory path cannot be
    ///   turned into a search pattern.
    /// - Return [`StoreError::Glob`] if a directory entry cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let pattern = format!(
            "{}/*.nix",
            Pattern::escape(self.dir.to_string_lossy().as_ref())
        );
        debug!("list entities matching {pattern:?}");

        let mut names = Vec::new();
        for path in glob::glob(&pattern)? {
            let path = path?;
            if !path.is_file() {
                continue;
            }

            let Some(name) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
            else {
                continue;
            };

            if name != "default" {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Replace contents of index file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] if index cannot be written.
    pub fn write_index(&self, contents: impl AsRef<str>) -> Result<PathBuf> {
        let path = self.index_path();
        write_file(&path, contents)?;
        Ok(path)
    }
}

/// Read whole file into string.
///
/// # Errors
///
/// - Return [`StoreError::Read`] if file cannot be read.
pub fn read_file(path: impl AsRef<Path>) -> Result<String> {
    read_to_string(path.as_ref()).map_err(|source| StoreError::Read {
        source,
        path: path.as_ref().into(),
    })
}

/// Replace whole file in one step.
///
/// Contents go to a temporary file next to the target first, which is then
/// renamed over the target. Readers see either the old file or the new one.
/// Permissions of an existing target are carried over.
///
/// # Errors
///
/// - Return [`StoreError::Write`] if any step fails.
pub fn write_file(path: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
    let path = path.as_ref();
    let write_err = |source| StoreError::Write {
        source,
        path: path.into(),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(parent).map_err(write_err)?;
    file.write_all(contents.as_ref().as_bytes())
        .map_err(write_err)?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(file.path(), metadata.permissions()).map_err(write_err)?;
    }

    file.persist(path).map_err(|err| write_err(err.error))?;
    debug!("wrote {:?}", path.display());

    Ok(())
}

/// Entity store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Name cannot be used for an entity.
    #[error("{name:?} is not a valid name")]
    InvalidName { name: String },

    /// Entity already exists.
    #[error("{:?} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    /// Entity does not exist.
    #[error("{:?} does not exist", path.display())]
    NotFound { path: PathBuf },

    /// File cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory path cannot be searched.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Directory entry cannot be read while searching.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
