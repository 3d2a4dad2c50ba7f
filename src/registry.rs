// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host registry inside the flake.
//!
//! The __registry__ is the one designated collection block of the flake,
//! `nixosConfigurations = { ... };` by default, in which every host of the
//! configuration tree is declared through a constructor call:
//!
//! ```text
//! web1 = lib.mkSystem {
//!   hostname = "web1";
//!   profiles = [ "common" "web" ];
//!   users = [
//!     {
//!       name = "alice";
//!       profiles = [ "developer" ];
//!       extraGroups = [ "wheel" ];
//!     }
//!   ];
//! };
//! ```
//!
//! Each such binding is an __entry__, and each attribute set in its `users`
//! list is a __sub-entry__. The rest of the flake is free-form text that must
//! survive every edit byte-for-byte.
//!
//! # Editing Model
//!
//! The flake is never evaluated. Every operation takes the document text and
//! returns either a query result or a brand new document text. File I/O is
//! left to the caller, which is expected to replace the flake in one write.
//!
//! - The [`scan`] module locates bindings while tracking delimiter depth.
//! - Entries are rendered with fixed indentation, so an entry that is
//!   replaced gets normalized formatting, but nothing outside of its span
//!   changes.
//! - Deleting an entry also deletes the whitespace in front of it. Blank
//!   lines that become orphaned are not cleaned up.
//!
//! # Limitations
//!
//! Two processes editing the same flake at the same time race each other.
//! The last write wins.

pub mod scan;

mod edit;
mod extract;
mod render;

pub use extract::Summary;

use crate::{config::RegistrySettings, registry::scan::Span};

use std::collections::BTreeMap;

/// One host declared in the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Attribute name of entry, unique inside the collection block.
    pub name: String,

    /// Ordered profile tags. Order is significant.
    pub profiles: Vec<String>,

    /// Users attached to host.
    pub users: Vec<SubEntry>,

    /// Plain string fields, e.g., `system`.
    pub extra: BTreeMap<String, String>,

    /// Raw module expressions listed under `extraModules`.
    pub modules: Vec<String>,

    /// Raw `inherit ...;` statements.
    pub inherits: Vec<String>,

    /// Any other binding, kept as raw `(attribute path, expression)` pairs
    /// exactly as written.
    pub verbatim: Vec<(String, String)>,
}

impl Entry {
    /// Construct new entry with no profiles or users.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set profile tags.
    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    /// Set target system, e.g., "aarch64-linux".
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.extra.insert("system".into(), system.into());
        self
    }

    /// Set raw module expressions.
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Target system of entry, if any was declared.
    pub fn system(&self) -> Option<&str> {
        self.extra.get("system").map(String::as_str)
    }

    /// Attach a user.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::DuplicateUser`] if a user with the same name
    ///   is already attached.
    pub fn add_user(&mut self, user: SubEntry) -> Result<()> {
        if self.users.iter().any(|existing| existing.name == user.name) {
            return Err(RegistryError::DuplicateUser {
                host: self.name.clone(),
                user: user.name,
            });
        }

        self.users.push(user);
        Ok(())
    }

    /// Detach a user by name.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::UserNotFound`] if no such user is attached.
    pub fn remove_user(&mut self, name: &str) -> Result<SubEntry> {
        let index = self
            .users
            .iter()
            .position(|user| user.name == name)
            .ok_or_else(|| RegistryError::UserNotFound {
                host: self.name.clone(),
                user: name.into(),
            })?;

        Ok(self.users.remove(index))
    }
}

/// User attached to an entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubEntry {
    pub name: String,
    pub profiles: Vec<String>,
    pub groups: Vec<String>,

    /// Raw `inherit ...;` statements.
    pub inherits: Vec<String>,

    /// Any other binding, kept as raw `(attribute path, expression)` pairs
    /// exactly as written.
    pub verbatim: Vec<(String, String)>,
}

impl SubEntry {
    /// Construct new user entry.
    pub fn new(
        name: impl Into<String>,
        profiles: impl IntoIterator<Item = impl Into<String>>,
        groups: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            profiles: profiles.into_iter().map(Into::into).collect(),
            groups: groups.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Entry found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub name: String,

    /// From the first byte of the name up to and including the final `;`.
    pub span: Span,

    /// Inside of the constructor's attribute set braces.
    pub body: Span,
}

impl Located {
    /// Exact text of entry as written in the document.
    pub fn text<'a>(&self, document: &'a str) -> &'a str {
        self.span.slice(document)
    }
}

/// The designated collection block found in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    /// Offset of opening `{`.
    pub open: usize,

    /// Offset of matching closing `}`.
    pub close: usize,
}

impl Collection {
    /// Span between the braces.
    pub fn body(&self) -> Span {
        Span::new(self.open + 1, self.close)
    }
}

/// Host registry editor.
///
/// Stateless apart from the layout settings that say which collection block
/// to edit, and which constructor marks a binding as an entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registry {
    settings: RegistrySettings,
}

impl Registry {
    /// Construct new registry editor.
    pub fn new(settings: RegistrySettings) -> Self {
        Self { settings }
    }

    /// Layout settings in use.
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Find the designated collection block.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Malformed`] if the document cannot be
    ///   scanned, the collection is not an attribute set, or more than one
    ///   collection block exists.
    pub fn collection(&self, document: &str) -> Result<Option<Collection>> {
        let name = &self.settings.collection;
        let found = scan::find_assignments(document, name)?;
        let Some(first) = found.first() else {
            return Ok(None);
        };

        if let Some(second) = found.get(1) {
            return Err(RegistryError::Malformed(scan::ScanError::new(
                format!("more than one `{name}` block"),
                second.span.start,
            )));
        }

        let Some(body) = scan::enclosed(document, first.value, b'{')? else {
            return Err(RegistryError::Malformed(scan::ScanError::new(
                format!("`{name}` is not an attribute set"),
                first.value.start,
            )));
        };

        Ok(Some(Collection {
            open: body.start - 1,
            close: body.end,
        }))
    }

    /// Find entry by exact name.
    ///
    /// Only direct children of the collection block are considered, and only
    /// if their value is a constructor call. Returns `None` if there is no
    /// collection block at all.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Malformed`] if the document cannot be
    ///   scanned.
    pub fn locate(&self, document: &str, name: &str) -> Result<Option<Located>> {
        Ok(self
            .entries(document)?
            .into_iter()
            .find(|located| located.name == name))
    }

    /// List names of all entries in document order.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Malformed`] if the document cannot be
    ///   scanned.
    pub fn list(&self, document: &str) -> Result<Vec<String>> {
        Ok(self
            .entries(document)?
            .into_iter()
            .map(|located| located.name)
            .collect())
    }

    pub(crate) fn entries(&self, document: &str) -> Result<Vec<Located>> {
        let Some(collection) = self.collection(document)? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for binding in scan::bindings(document, collection.body())? {
            if let Some(body) = self.constructor_body(document, binding.value)? {
                entries.push(Located {
                    name: binding.name,
                    span: binding.span,
                    body,
                });
            }
        }

        Ok(entries)
    }

    fn constructor_body(&self, document: &str, value: Span) -> Result<Option<Span>> {
        let constructor = self.settings.constructor.as_str();
        let Some(rest) = value.slice(document).strip_prefix(constructor) else {
            return Ok(None);
        };

        // INVARIANT: Constructor name must end at a word boundary.
        if rest
            .bytes()
            .next()
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'\'' | b'.'))
        {
            return Ok(None);
        }

        let rest_start = value.start + constructor.len();
        let offset = rest.len() - rest.trim_start().len();
        let args = Span::new(rest_start + offset, value.end);
        Ok(scan::enclosed(document, args, b'{')?)
    }
}

/// Registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Entry name is already taken by a sibling binding.
    #[error("host {name:?} already exists in registry")]
    DuplicateEntry { name: String },

    /// No entry with given name.
    #[error("host {name:?} not found in registry")]
    EntryNotFound { name: String },

    /// Document has no designated collection block.
    #[error("no `{collection}` block found in registry")]
    CollectionBlockMissing { collection: String },

    /// Document does not have the expected shape.
    #[error("malformed registry: {0}")]
    Malformed(#[from] scan::ScanError),

    /// Entry name cannot be written as bare attribute name.
    #[error("{name:?} is not a valid host name")]
    InvalidName { name: String },

    /// User already attached to host.
    #[error("user {user:?} already exists in host {host:?}")]
    DuplicateUser { host: String, user: String },

    /// User not attached to host.
    #[error("user {user:?} not found in host {host:?}")]
    UserNotFound { host: String, user: String },
}

/// Friendly result alias :3
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
