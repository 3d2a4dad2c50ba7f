// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Individual user configuration files.

use crate::{
    store::{EntityFile, StoreError},
    template,
    workspace::Workspace,
};

use std::path::PathBuf;
use tracing::{info, instrument};

/// Request for a new user file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NewUserFile {
    pub name: String,
    pub email: Option<String>,

    /// Full name for git identity, the user name is used if `None`.
    pub fullname: Option<String>,
}

/// User file manager of a workspace.
#[derive(Debug, Clone, Copy)]
pub struct Users<'ws> {
    workspace: &'ws Workspace,
}

impl<'ws> Users<'ws> {
    /// Construct new user file manager.
    pub fn new(workspace: &'ws Workspace) -> Self {
        Self { workspace }
    }

    /// Sorted names of every user with a file.
    ///
    /// # Errors
    ///
    /// - Return [`UserError::Store`] if the user directory cannot be listed.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.workspace.users().list()?)
    }

    /// Read user file.
    ///
    /// # Errors
    ///
    /// - Return [`UserError::Store`] if the user does not exist, or its file
    ///   cannot be read.
    pub fn show(&self, name: &str) -> Result<EntityFile> {
        Ok(self.workspace.users().read(name)?)
    }

    /// Create new user file.
    ///
    /// # Errors
    ///
    /// - Return [`UserError::Store`] if the user already exists, or its file
    ///   cannot be written.
    #[instrument(skip(self, user), fields(name = %user.name), level = "debug")]
    pub fn add(&self, user: NewUserFile) -> Result<PathBuf> {
        let contents = template::user(
            &user.name,
            user.email.as_deref(),
            user.fullname.as_deref(),
        );
        let path = self.workspace.users().create(&user.name, contents)?;
        info!("created user {:?} at {:?}", user.name, path.display());

        Ok(path)
    }

    /// Remove user file.
    ///
    /// Hosts the user is attached to are left alone.
    ///
    /// # Errors
    ///
    /// - Return [`UserError::Store`] if the user does not exist, or its file
    ///   cannot be removed.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, name: &str) -> Result<PathBuf> {
        let path = self.workspace.users().remove(name)?;
        info!("removed user {name:?}");

        Ok(path)
    }
}

/// User file error types.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = UserError> = std::result::Result<T, E>;
