// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration tree handle.
//!
//! A __workspace__ ties the top-level directory of a configuration tree to
//! its settings, and hands out the pieces every command works with: the host
//! registry, the flake it lives in, and the entity directories.

use crate::{
    config::{ConfigError, Settings},
    path::{resolve, settings_path},
    registry::Registry,
    store::{self, EntityDir},
};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration tree at a known location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    settings: Settings,
}

impl Workspace {
    /// Open tree at `root`, loading its settings file if it has one.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if the settings file exists but is invalid.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let settings = Settings::load(settings_path(&root))?;
        debug!("opened tree at {:?}", root.display());
        Ok(Self::new(root, settings))
    }

    /// Construct new workspace from already loaded settings.
    pub fn new(root: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Host registry editor configured for this tree.
    pub fn registry(&self) -> Registry {
        Registry::new(self.settings.registry.clone())
    }

    pub fn flake_path(&self) -> PathBuf {
        resolve(&self.root, &self.settings.paths.flake)
    }

    /// Directory holding one sub-directory per host.
    pub fn hosts_dir(&self) -> PathBuf {
        resolve(&self.root, &self.settings.paths.hosts)
    }

    pub fn host_dir(&self, name: &str) -> PathBuf {
        self.hosts_dir().join(name)
    }

    pub fn users(&self) -> EntityDir {
        EntityDir::new(resolve(&self.root, &self.settings.paths.users))
    }

    pub fn user_profiles(&self) -> EntityDir {
        EntityDir::new(resolve(&self.root, &self.settings.paths.user_profiles))
    }

    pub fn package_profiles(&self) -> EntityDir {
        EntityDir::new(resolve(&self.root, &self.settings.paths.package_profiles))
    }

    /// Read whole flake.
    ///
    /// # Errors
    ///
    /// - Return [`store::StoreError::Read`] if the flake cannot be read.
    pub fn read_flake(&self) -> store::Result<String> {
        store::read_file(self.flake_path())
    }

    /// Replace whole flake in one write.
    ///
    /// # Errors
    ///
    /// - Return [`store::StoreError::Write`] if the flake cannot be written.
    pub fn write_flake(&self, document: impl AsRef<str>) -> store::Result<()> {
        store::write_file(self.flake_path(), document)
    }
}
