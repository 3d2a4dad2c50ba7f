// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host management.
//!
//! A host has two halves: its entry in the flake's registry, and its own
//! directory under `hosts/` holding the machine-specific configuration.
//! Registry edits are computed in full before anything touches the file
//! system, so a failed command never leaves a half-edited flake behind. If
//! writing the flake fails after `add` populated the host directory, the
//! files and directories it created are removed again.

use crate::{
    registry::{Entry, RegistryError, SubEntry},
    store::{self, StoreError},
    template,
    workspace::Workspace,
};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Summary of one host for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSummary {
    pub name: String,
    pub profiles: Vec<String>,
    pub users: Vec<String>,
    pub system: Option<String>,

    /// Whether `hosts/<name>/` exists.
    pub has_dir: bool,
}

/// Full view of one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDetail {
    pub name: String,

    /// Entry exactly as written in the flake.
    pub text: String,

    pub dir: PathBuf,

    /// Sorted file names in host directory, or `None` if it does not exist.
    pub files: Option<Vec<String>>,
}

/// Request for a new host.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NewHost {
    pub name: String,

    /// Profile tags, or the configured defaults if `None`.
    pub profiles: Option<Vec<String>>,

    /// Target system, or the configured default system if `None`.
    pub system: Option<String>,

    /// Raw module expressions for `extraModules`.
    pub modules: Vec<String>,
}

/// Request for a user attached to a host.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,

    /// User profiles, or the configured defaults if `None`.
    pub profiles: Option<Vec<String>>,

    /// Extra groups, or the configured defaults if `None`.
    pub groups: Option<Vec<String>>,
}

/// Host manager of a workspace.
#[derive(Debug, Clone, Copy)]
pub struct Hosts<'ws> {
    workspace: &'ws Workspace,
}

impl<'ws> Hosts<'ws> {
    /// Construct new host manager.
    pub fn new(workspace: &'ws Workspace) -> Self {
        Self { workspace }
    }

    /// Summarize every host in registry order.
    ///
    /// # Errors
    ///
    /// - Return [`HostError::Store`] if the flake cannot be read.
    /// - Return [`HostError::Registry`] if the flake cannot be scanned.
    pub fn list(&self) -> Result<Vec<HostSummary>> {
        let document = self.workspace.read_flake()?;
        let registry = self.workspace.registry();

        let hosts = registry
            .entries(&document)?
            .into_iter()
            .map(|located| {
                let summary = registry.summarize(&document, &located);
                HostSummary {
                    has_dir: self.workspace.host_dir(&summary.name).is_dir(),
                    name: summary.name,
                    profiles: summary.profiles,
                    users: summary.users,
                    system: summary.system,
                }
            })
            .collect();

        Ok(hosts)
    }

    /// Show registry entry and directory listing of host.
    ///
    /// # Errors
    ///
    /// - Return [`HostError::Registry`] if there is no such host.
    /// - Return [`HostError::ReadDir`] if the host directory exists but
    ///   cannot be listed.
    pub fn show(&self, name: &str) -> Result<HostDetail> {
        let document = self.workspace.read_flake()?;
        let located = self
            .workspace
            .registry()
            .locate(&document, name)?
            .ok_or_else(|| RegistryError::EntryNotFound { name: name.into() })?;

        let dir = self.workspace.host_dir(name);
        let files = if dir.is_dir() {
            Some(dir_listing(&dir)?)
        } else {
            None
        };

        Ok(HostDetail {
            name: name.into(),
            text: located.text(&document).into(),
            dir,
            files,
        })
    }

    /// Register new host and give it a host directory.
    ///
    /// Existing files in the host directory are kept as they are. Returns
    /// path to host directory.
    ///
    /// # Errors
    ///
    /// - Return [`HostError::Registry`] if the host cannot be inserted, e.g.,
    ///   because it already exists.
    /// - Return [`HostError::CreateDir`] or [`HostError::Store`] if the host
    ///   directory cannot be populated.
    #[instrument(skip(self, host), fields(name = %host.name), level = "debug")]
    pub fn add(&self, host: NewHost) -> Result<PathBuf> {
        let settings = self.workspace.settings();
        let mut entry = Entry::new(host.name.as_str())
            .with_profiles(
                host.profiles
                    .unwrap_or_else(|| settings.defaults.host_profiles.clone()),
            )
            .with_modules(host.modules);
        if let Some(system) = host.system {
            entry = entry.with_system(system);
        }

        let document = self.workspace.read_flake()?;
        let document = self.workspace.registry().insert(&document, &entry)?;

        let package_profiles = self.workspace.package_profiles();
        for profile in &entry.profiles {
            if !package_profiles.exists(profile).unwrap_or(false) {
                warn!("package profile {profile:?} does not exist");
            }
        }

        let dir = self.workspace.host_dir(&entry.name);
        let created = mkdirp::mkdirp(&dir).map_err(|source| HostError::CreateDir {
            source,
            path: dir.clone(),
        })?;
        if let Some(created) = &created {
            debug!("created {:?}", created.display());
        }

        let mut written = Vec::new();
        let result = write_host_files(&dir, &entry.name, &mut written)
            .and_then(|()| self.workspace.write_flake(document).map_err(HostError::from));
        if let Err(error) = result {
            undo_host_files(created.as_deref(), &written);
            return Err(error);
        }
        info!("created host {:?} at {:?}", entry.name, dir.display());

        Ok(dir)
    }

    /// Remove host from registry.
    ///
    /// The host directory is never removed. Returns its path if it is still
    /// around.
    ///
    /// # Errors
    ///
    /// - Return [`HostError::Registry`] if there is no such host.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, name: &str) -> Result<Option<PathBuf>> {
        let document = self.workspace.read_flake()?;
        let document = self.workspace.registry().delete(&document, name)?;
        self.workspace.write_flake(document)?;
        info!("removed host {name:?} from registry");

        let dir = self.workspace.host_dir(name);
        if dir.exists() {
            warn!("host directory {:?} still exists", dir.display());
            return Ok(Some(dir));
        }

        Ok(None)
    }

    /// Attach user to host.
    ///
    /// # Errors
    ///
    /// - Return [`HostError::Registry`] if there is no such host, or the user
    ///   is already attached to it.
    #[instrument(skip(self, user), fields(user = %user.name), level = "debug")]
    pub fn add_user(&self, host: &str, user: NewUser) -> Result<()> {
        let defaults = &self.workspace.settings().defaults;
        let user = SubEntry::new(
            user.name,
            user.profiles
                .unwrap_or_else(|| defaults.user_profiles.clone()),
            user.groups.unwrap_or_else(|| defaults.user_groups.clone()),
        );

        if !self.workspace.users().exists(&user.name).unwrap_or(false) {
            warn!("user file for {:?} does not exist", user.name);
        }

        let user_profiles = self.workspace.user_profiles();
        for profile in &user.profiles {
            if !user_profiles.exists(profile).unwrap_or(false) {
                warn!("user profile {profile:?} does not exist");
            }
        }

        let name = user.name.clone();
        let document = self.workspace.read_flake()?;
        let document = self
            .workspace
            .registry()
            .replace(&document, host, |entry| entry.add_user(user))?;
        self.workspace.write_flake(document)?;
        info!("added user {name:?} to host {host:?}");

        Ok(())
    }

    /// Detach user from host.
    ///
    /// # Errors
    ///
    /// - Return [`HostError::Registry`] if there is no such host, or the user
    ///   is not attached to it.
    #[instrument(skip(self), level = "debug")]
    pub fn remove_user(&self, host: &str, user: &str) -> Result<()> {
        let document = self.workspace.read_flake()?;
        let document = self
            .workspace
            .registry()
            .replace(&document, host, |entry| entry.remove_user(user).map(|_| ()))?;
        self.workspace.write_flake(document)?;
        info!("removed user {user:?} from host {host:?}");

        Ok(())
    }
}

fn dir_listing(dir: &Path) -> Result<Vec<String>> {
    let read_err = |source| HostError::ReadDir {
        source,
        path: dir.into(),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        files.push(entry.map_err(read_err)?.file_name().to_string_lossy().into_owned());
    }
    files.sort();

    Ok(files)
}

fn write_host_files(dir: &Path, host: &str, written: &mut Vec<PathBuf>) -> Result<()> {
    for (file, contents) in [
        ("default.nix", template::host_loader(host)),
        ("configuration.nix", template::host_configuration(host)),
    ] {
        let path = dir.join(file);
        if path.exists() {
            warn!("keeping existing {:?}", path.display());
            continue;
        }
        store::write_file(&path, contents)?;
        written.push(path);
    }

    Ok(())
}

/// Take back what a failed host add put on disk.
///
/// Removes the topmost directory the add created, or else only the files it
/// wrote into a directory that was already there.
fn undo_host_files(created: Option<&Path>, written: &[PathBuf]) {
    let result = match created {
        Some(created) => fs::remove_dir_all(created),
        None => written.iter().try_for_each(|path| fs::remove_file(path)),
    };

    if let Err(error) = result {
        warn!("failed to clean up after host add: {error}");
    }
}

/// Host management error types.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Host directory cannot be created.
    #[error("failed to create host directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Host directory cannot be listed.
    #[error("failed to list host directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = HostError> = std::result::Result<T, E>;
