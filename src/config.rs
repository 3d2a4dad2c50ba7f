// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional `nixcfg.toml` settings file that can
//! sit at the top-level of a configuration tree. Every field has a default
//! that matches the stock layout of the tree, so an empty or missing file is
//! perfectly valid.
//!
//! # General Layout
//!
//! ```toml
//! [paths]
//! flake = "flake.nix"
//! hosts = "hosts"
//! users = "users"
//! user_profiles = "profiles/users"
//! package_profiles = "profiles/packages"
//!
//! [registry]
//! collection = "nixosConfigurations"
//! constructor = "lib.mkSystem"
//! default_system = "x86_64-linux"
//!
//! [defaults]
//! host_profiles = ["common"]
//! user_groups = ["wheel", "networkmanager"]
//!
//! [protected]
//! user_profiles = ["common"]
//! package_profiles = ["common"]
//!
//! [cleanup]
//! hosts = ["nixos-wsl"]
//! ```
//!
//! Relative paths are resolved against the top-level of the tree. Paths go
//! through shell expansion, so `~` and `$VARIABLES` may be used.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Settings of a configuration tree.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Locations of files and directories.
    pub paths: PathSettings,

    /// Layout of host registry.
    pub registry: RegistrySettings,

    /// Values used when the command line does not supply any.
    pub defaults: DefaultSettings,

    /// Profiles that may never be removed.
    pub protected: ProtectedSettings,

    /// What survives a cleanup.
    pub cleanup: CleanupSettings,
}

impl Settings {
    /// Load settings file, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid.
    /// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no settings at {:?}, use defaults", path.display());
            return Ok(Self::default());
        }

        debug!("load settings at {:?}", path.display());
        read_to_string(path)
            .map_err(|source| ConfigError::Read {
                source,
                path: path.into(),
            })?
            .parse()
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        let paths = &mut settings.paths;
        for path in [
            &mut paths.flake,
            &mut paths.hosts,
            &mut paths.users,
            &mut paths.user_profiles,
            &mut paths.package_profiles,
        ] {
            *path = expand(path)?;
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Locations of files and directories in the configuration tree.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    /// Flake holding the host registry.
    pub flake: PathBuf,

    /// Directory with one sub-directory per host.
    pub hosts: PathBuf,

    /// Directory with one file per user.
    pub users: PathBuf,

    /// Directory with one file per user profile.
    pub user_profiles: PathBuf,

    /// Directory with one file per package profile.
    pub package_profiles: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            flake: "flake.nix".into(),
            hosts: "hosts".into(),
            users: "users".into(),
            user_profiles: "profiles/users".into(),
            package_profiles: "profiles/packages".into(),
        }
    }
}

/// Layout of the host registry inside the flake.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Name of the attribute holding every host.
    pub collection: String,

    /// Function each host entry is built with.
    pub constructor: String,

    /// System that does not need to be spelled out in an entry.
    pub default_system: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            collection: "nixosConfigurations".into(),
            constructor: "lib.mkSystem".into(),
            default_system: "x86_64-linux".into(),
        }
    }
}

/// Fallback values for optional command arguments.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultSettings {
    pub host_profiles: Vec<String>,
    pub user_profiles: Vec<String>,
    pub user_groups: Vec<String>,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            host_profiles: vec!["common".into()],
            user_profiles: Vec::new(),
            user_groups: vec!["wheel".into(), "networkmanager".into()],
        }
    }
}

/// Profiles that cannot be removed.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtectedSettings {
    pub user_profiles: Vec<String>,
    pub package_profiles: Vec<String>,
}

impl Default for ProtectedSettings {
    fn default() -> Self {
        Self {
            user_profiles: vec!["common".into()],
            package_profiles: vec!["common".into()],
        }
    }
}

/// Directory entries kept by a cleanup, by file name.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupSettings {
    pub users: Vec<String>,
    pub user_profiles: Vec<String>,
    pub package_profiles: Vec<String>,

    /// Host directories, and registry entries, to keep.
    pub hosts: Vec<String>,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        fn names(names: &[&str]) -> Vec<String> {
            names.iter().map(|name| (*name).to_owned()).collect()
        }

        Self {
            users: names(&["default.nix", "example.nix"]),
            user_profiles: names(&[
                "common.nix",
                "admin.nix",
                "developer.nix",
                "minimal.nix",
                "default.nix",
            ]),
            package_profiles: names(&[
                "common.nix",
                "desktop.nix",
                "development.nix",
                "security.nix",
                "default.nix",
            ]),
            hosts: names(&["nixos-wsl"]),
        }
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
