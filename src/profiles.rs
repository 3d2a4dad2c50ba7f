// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Profile management.
//!
//! Profiles are named bundles of configuration that hosts and users opt into
//! through their profile tags. There are two kinds:
//!
//! - __User profiles__ are home-manager modules under `profiles/users/`. Their
//!   `default.nix` index imports every profile by name, and is regenerated
//!   whenever a user profile is added or removed.
//! - __Package profiles__ are system modules under `profiles/packages/`, each
//!   one mostly a list of packages in `environment.systemPackages`. Their
//!   index discovers profiles on its own, so it is never touched.
//!
//! Some profiles are required by the rest of the tree, and are protected from
//! removal.

use crate::{
    registry::scan::{self, ScanError, Span},
    store::{EntityDir, EntityFile, StoreError},
    template,
    workspace::Workspace,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

const SYSTEM_PACKAGES: &str = "environment.systemPackages";

/// Kind of profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    User,
    Package,
}

impl Display for ProfileKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::User => fmt.write_str("user profile"),
            Self::Package => fmt.write_str("package profile"),
        }
    }
}

/// Details of a package profile for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDetail {
    pub name: String,
    pub path: PathBuf,

    /// Text of the first `# ` comment line, if any.
    pub description: Option<String>,

    /// Packages listed under `environment.systemPackages`, or `None` if the
    /// profile does not list any in a form that can be read.
    pub packages: Option<Vec<String>>,
}

/// Profile manager of a workspace for one kind of profile.
#[derive(Debug, Clone, Copy)]
pub struct Profiles<'ws> {
    workspace: &'ws Workspace,
    kind: ProfileKind,
}

impl<'ws> Profiles<'ws> {
    /// Construct new profile manager.
    pub fn new(workspace: &'ws Workspace, kind: ProfileKind) -> Self {
        Self { workspace, kind }
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    fn dir(&self) -> EntityDir {
        match self.kind {
            ProfileKind::User => self.workspace.user_profiles(),
            ProfileKind::Package => self.workspace.package_profiles(),
        }
    }

    fn protected(&self) -> &[String] {
        let protected = &self.workspace.settings().protected;
        match self.kind {
            ProfileKind::User => &protected.user_profiles,
            ProfileKind::Package => &protected.package_profiles,
        }
    }

    /// Sorted names of every profile.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Store`] if the profile directory cannot be
    ///   listed.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.dir().list()?)
    }

    /// Read profile file.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Store`] if the profile does not exist, or its
    ///   file cannot be read.
    pub fn show(&self, name: &str) -> Result<EntityFile> {
        Ok(self.dir().read(name)?)
    }

    /// Create new profile from template.
    ///
    /// The description only shows up in package profiles.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Store`] if the profile already exists, or its
    ///   file cannot be written.
    #[instrument(skip(self, description), fields(kind = %self.kind), level = "debug")]
    pub fn add(&self, name: &str, description: Option<&str>) -> Result<PathBuf> {
        let contents = match self.kind {
            ProfileKind::User => template::user_profile(name),
            ProfileKind::Package => template::package_profile(name, description),
        };

        let path = self.dir().create(name, contents)?;
        info!("created {} {name:?} at {:?}", self.kind, path.display());
        self.update_index()?;

        Ok(path)
    }

    /// Remove profile.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Protected`] if the profile is protected.
    /// - Return [`ProfileError::Store`] if the profile does not exist, or its
    ///   file cannot be removed.
    #[instrument(skip(self), fields(kind = %self.kind), level = "debug")]
    pub fn remove(&self, name: &str) -> Result<PathBuf> {
        if self.protected().iter().any(|protected| protected == name) {
            return Err(ProfileError::Protected {
                kind: self.kind,
                name: name.into(),
            });
        }

        let path = self.dir().remove(name)?;
        info!("removed {} {name:?}", self.kind);
        self.update_index()?;

        Ok(path)
    }

    /// Details of every profile.
    ///
    /// Profiles that cannot be read are logged and skipped.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Store`] if the profile directory cannot be
    ///   listed.
    pub fn details(&self) -> Result<Vec<ProfileDetail>> {
        let mut details = Vec::new();
        for name in self.list()? {
            match self.dir().read(&name) {
                Ok(file) => details.push(detail(file)),
                Err(error) => warn!("cannot read {} {name:?}: {error}", self.kind),
            }
        }

        Ok(details)
    }

    /// Check profile for problems.
    ///
    /// Returns warnings that do not make the profile invalid.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::Store`] if the profile cannot be read.
    /// - Return [`ProfileError::Invalid`] if a delimiter, string, or comment
    ///   is left unterminated.
    pub fn validate(&self, name: &str) -> Result<Vec<String>> {
        let file = self.dir().read(name)?;
        scan::check_balanced(&file.contents).map_err(|source| ProfileError::Invalid {
            source,
            path: file.path.clone(),
        })?;

        let mut warnings = Vec::new();
        if !file.contents.contains('{') {
            warnings.push(format!("{name}.nix does not define an attribute set"));
        }

        if self.kind == ProfileKind::Package
            && scan::find_assignments(&file.contents, SYSTEM_PACKAGES)
                .map(|found| found.is_empty())
                .unwrap_or(true)
        {
            warnings.push(format!("{name}.nix does not define {SYSTEM_PACKAGES}"));
        }

        for warning in &warnings {
            warn!("{warning}");
        }

        Ok(warnings)
    }

    fn update_index(&self) -> Result<()> {
        let dir = self.dir();
        match self.kind {
            ProfileKind::User => {
                let profiles = dir.list()?;
                dir.write_index(template::user_profile_index(&profiles))?;
                info!("updated user profile index with {} profiles", profiles.len());
            }
            ProfileKind::Package => {
                debug!("package profile index discovers profiles on its own");
            }
        }

        Ok(())
    }
}

fn detail(file: EntityFile) -> ProfileDetail {
    let description = file
        .contents
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|line| line.trim().to_owned());

    ProfileDetail {
        packages: packages(&file.contents),
        name: file.name,
        path: file.path,
        description,
    }
}

/// Extract package expressions from `environment.systemPackages`.
pub fn packages(text: &str) -> Option<Vec<String>> {
    let extract = || -> std::result::Result<Option<Vec<String>>, ScanError> {
        let found = scan::find_assignments(text, SYSTEM_PACKAGES)?;
        let Some(binding) = found.first() else {
            return Ok(None);
        };

        let Some(inner) = scan::leading_list(text, binding.value)? else {
            return Ok(None);
        };

        Ok(Some(
            scan::list_items(text, inner)?
                .into_iter()
                .map(|item: Span| item.slice(text).to_owned())
                .collect(),
        ))
    };

    extract().unwrap_or_else(|error| {
        debug!("cannot extract packages: {error}");
        None
    })
}

/// Profile management error types.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Profile is required by the rest of the tree.
    #[error("cannot remove {kind} {name:?}, it is required by the system")]
    Protected { kind: ProfileKind, name: String },

    /// Profile is not valid Nix.
    #[error("invalid Nix syntax in {:?}", path.display())]
    Invalid {
        #[source]
        source: ScanError,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ProfileError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn workspace() -> anyhow::Result<(tempfile::TempDir, Workspace)> {
        let dir = tempfile::tempdir()?;
        let workspace = Workspace::new(dir.path(), Settings::default());
        Ok((dir, workspace))
    }

    #[test]
    fn user_profiles_regenerate_index() -> anyhow::Result<()> {
        let (_dir, workspace) = workspace()?;
        let profiles = Profiles::new(&workspace, ProfileKind::User);

        profiles.add("common", None)?;
        profiles.add("gamer", None)?;
        let index = fs::read_to_string(workspace.user_profiles().index_path())?;
        assert_eq!(
            index,
            indoc! {r#"
                # User Profiles Index
                # Auto-generated - do not edit manually
                {
                  common = import ./common.nix;
                  gamer = import ./gamer.nix;
                }
            "#}
        );

        profiles.remove("gamer")?;
        let index = fs::read_to_string(workspace.user_profiles().index_path())?;
        assert!(!index.contains("gamer"));
        assert_eq!(profiles.list()?, vec!["common"]);

        Ok(())
    }

    #[test]
    fn protected_profiles_stay() -> anyhow::Result<()> {
        let (_dir, workspace) = workspace()?;
        for kind in [ProfileKind::User, ProfileKind::Package] {
            let profiles = Profiles::new(&workspace, kind);
            profiles.add("common", None)?;
            assert!(matches!(
                profiles.remove("common"),
                Err(ProfileError::Protected { .. })
            ));
            assert_eq!(profiles.list()?, vec!["common"]);
        }

        Ok(())
    }

    #[test]
    fn package_profile_index_is_left_alone() -> anyhow::Result<()> {
        let (_dir, workspace) = workspace()?;
        let profiles = Profiles::new(&workspace, ProfileKind::Package);
        profiles.add("gaming", Some("Steam and friends"))?;
        assert!(!workspace.package_profiles().index_path().exists());

        Ok(())
    }

    #[test]
    fn details_count_packages() -> anyhow::Result<()> {
        let (_dir, workspace) = workspace()?;
        let profiles = Profiles::new(&workspace, ProfileKind::Package);
        profiles.add("empty", None)?;
        fs::write(
            workspace.package_profiles().path().join("dev.nix"),
            indoc! {r#"
                # Development tools
                { pkgs, ... }: {
                  environment.systemPackages = with pkgs; [
                    git
                    # commented
                    (python3.withPackages (ps: [ ps.requests ]))
                    vim
                  ];
                }
            "#},
        )?;

        let result = profiles.details()?;
        assert_eq!(result.len(), 2);

        assert_eq!(result[0].name, "dev");
        assert_eq!(result[0].description.as_deref(), Some("Development tools"));
        assert_eq!(
            result[0].packages,
            Some(vec![
                "git".into(),
                "(python3.withPackages (ps: [ ps.requests ]))".into(),
                "vim".into(),
            ])
        );

        assert_eq!(result[1].name, "empty");
        assert_eq!(result[1].description.as_deref(), Some("empty Package Profile"));
        assert_eq!(result[1].packages, Some(Vec::new()));

        Ok(())
    }

    #[test]
    fn validate_reports_problems() -> anyhow::Result<()> {
        let (_dir, workspace) = workspace()?;
        let profiles = Profiles::new(&workspace, ProfileKind::Package);
        let dir = workspace.package_profiles();
        profiles.add("fine", None)?;
        fs::write(dir.path().join("bare.nix"), "{ ... }: { services.foo.enable = true; }\n")?;
        fs::write(dir.path().join("broken.nix"), "{ ... }: { environment = {;\n")?;

        assert_eq!(profiles.validate("fine")?, Vec::<String>::new());
        assert_eq!(
            profiles.validate("bare")?,
            vec!["bare.nix does not define environment.systemPackages".to_owned()]
        );
        assert!(matches!(
            profiles.validate("broken"),
            Err(ProfileError::Invalid { .. })
        ));
        assert!(matches!(
            profiles.validate("ghost"),
            Err(ProfileError::Store(StoreError::NotFound { .. }))
        ));

        Ok(())
    }
}
