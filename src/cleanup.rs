// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reset configuration tree to a clean slate.
//!
//! Cleanup strips a tree down to its stock contents so it can serve as the
//! starting point of a new configuration. Every entry of the user, profile,
//! and host directories that is not on its keep list goes away, and so does
//! every registry entry of a host that is not kept.
//!
//! The flake itself is edited, not replaced by a stock copy. Kept hosts, by
//! default `nixos-wsl`, stay registered along with whatever else the flake
//! declares. Empty [`crate::config::CleanupSettings::hosts`] to drop every
//! registry entry.
//!
//! Cleanup happens in two steps. A [`CleanupPlan`] is computed first without
//! touching anything, so callers can show it and ask for confirmation before
//! calling [`Cleanup::execute`].

use crate::{registry::RegistryError, store::StoreError, template, workspace::Workspace};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Entries to remove from one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTarget {
    pub description: &'static str,
    pub dir: PathBuf,

    /// Sorted paths of directory entries not on the keep list.
    pub remove: Vec<PathBuf>,
}

/// Everything a cleanup would remove.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupPlan {
    pub targets: Vec<CleanupTarget>,

    /// Registry entries of hosts that are not kept.
    pub hosts: Vec<String>,
}

impl CleanupPlan {
    /// Check if there is nothing left to clean.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.targets.iter().all(|target| target.remove.is_empty())
    }
}

/// Outcome of an executed cleanup.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Number of files and directories removed.
    pub removed: usize,

    /// Hosts removed from registry.
    pub hosts: Vec<String>,
}

/// Cleanup of a workspace.
#[derive(Debug, Clone, Copy)]
pub struct Cleanup<'ws> {
    workspace: &'ws Workspace,
}

impl<'ws> Cleanup<'ws> {
    /// Construct new cleanup.
    pub fn new(workspace: &'ws Workspace) -> Self {
        Self { workspace }
    }

    /// Determine what would be removed.
    ///
    /// Directories that do not exist are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError::ReadDir`] if a directory cannot be listed.
    /// - Return [`CleanupError::Store`] if the flake cannot be read.
    /// - Return [`CleanupError::Registry`] if the flake cannot be scanned.
    pub fn plan(&self) -> Result<CleanupPlan> {
        let keep = &self.workspace.settings().cleanup;
        let targets = [
            (
                "individual user configurations",
                self.workspace.users().path().to_path_buf(),
                &keep.users,
            ),
            (
                "custom user profiles",
                self.workspace.user_profiles().path().to_path_buf(),
                &keep.user_profiles,
            ),
            (
                "custom package profiles",
                self.workspace.package_profiles().path().to_path_buf(),
                &keep.package_profiles,
            ),
            (
                "custom host configurations",
                self.workspace.hosts_dir(),
                &keep.hosts,
            ),
        ];

        let mut plan = CleanupPlan::default();
        for (description, dir, keep) in targets {
            if !dir.is_dir() {
                warn!("directory {:?} does not exist, skipping", dir.display());
                continue;
            }

            let remove = unkept_entries(&dir, keep)?;
            plan.targets.push(CleanupTarget {
                description,
                dir,
                remove,
            });
        }

        let document = self.workspace.read_flake()?;
        plan.hosts = self
            .workspace
            .registry()
            .list(&document)?
            .into_iter()
            .filter(|host| !keep.hosts.contains(host))
            .collect();

        Ok(plan)
    }

    /// Carry out cleanup plan.
    ///
    /// The new flake is computed before anything is removed, so a flake that
    /// cannot be edited stops the cleanup before it starts.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError::Registry`] if a host cannot be removed from
    ///   the flake.
    /// - Return [`CleanupError::Remove`] if a file or directory cannot be
    ///   removed.
    /// - Return [`CleanupError::Store`] if the flake or the user profile
    ///   index cannot be read or written.
    #[instrument(skip(self, plan), level = "debug")]
    pub fn execute(&self, plan: &CleanupPlan) -> Result<CleanupReport> {
        let registry = self.workspace.registry();
        let mut document = self.workspace.read_flake()?;
        for host in &plan.hosts {
            document = registry.delete(&document, host)?;
        }

        let mut report = CleanupReport::default();
        for target in &plan.targets {
            info!("cleaning {}", target.description);
            for path in &target.remove {
                remove_path(path)?;
                info!("removed {:?}", path.display());
                report.removed += 1;
            }

            if target.remove.is_empty() {
                info!("{}: already clean", target.description);
            }
        }

        // INVARIANT: User profile index must not import removed profiles.
        let user_profiles = self.workspace.user_profiles();
        let pruned_profiles = plan
            .targets
            .iter()
            .any(|target| target.dir == user_profiles.path() && !target.remove.is_empty());
        if pruned_profiles && user_profiles.index_path().is_file() {
            let profiles = user_profiles.list()?;
            user_profiles.write_index(template::user_profile_index(&profiles))?;
            info!("updated user profile index with {} profiles", profiles.len());
        }

        if !plan.hosts.is_empty() {
            self.workspace.write_flake(document)?;
            info!("removed {} hosts from registry", plan.hosts.len());
            report.hosts = plan.hosts.clone();
        }

        Ok(report)
    }
}

fn unkept_entries(dir: &Path, keep: &[String]) -> Result<Vec<PathBuf>> {
    let read_err = |source| CleanupError::ReadDir {
        source,
        path: dir.into(),
    };

    let mut remove = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !keep.contains(&name) {
            remove.push(entry.path());
        }
    }
    remove.sort();

    Ok(remove)
}

fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|source| CleanupError::Remove {
        source,
        path: path.into(),
    })
}

/// Cleanup error types.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Directory cannot be listed.
    #[error("failed to list {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File or directory cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CleanupError> = std::result::Result<T, E>;
