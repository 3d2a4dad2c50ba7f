// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Recover structured entries from located text.
//!
//! Two flavors are offered. [`Registry::summarize`] is tolerant and meant for
//! display: anything it cannot make sense of simply comes back empty.
//! [`Registry::decode`] is strict, because its result gets rendered back
//! into the document.

use crate::registry::{
    scan::{self, Binding, ScanError, Span},
    Entry, Located, Registry, RegistryError, Result, SubEntry,
};

use tracing::debug;

/// Display-oriented view of an entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub name: String,
    pub profiles: Vec<String>,
    pub users: Vec<String>,
    pub system: Option<String>,
}

impl Registry {
    /// Summarize located entry.
    ///
    /// Never fails. Missing or unreadable `profiles` and `users` lists yield
    /// empty sequences.
    pub fn summarize(&self, document: &str, located: &Located) -> Summary {
        let mut summary = Summary {
            name: located.name.clone(),
            ..Default::default()
        };

        let bindings = match scan::bindings(document, located.body) {
            Ok(bindings) => bindings,
            Err(error) => {
                debug!("cannot summarize {:?}: {error}", located.name);
                return summary;
            }
        };

        for binding in bindings {
            match binding.name.as_str() {
                "profiles" => {
                    summary.profiles = scan::string_list(document, binding.value).unwrap_or_default()
                }
                "users" => summary.users = user_names(document, binding.value),
                "system" => summary.system = scan::string_value(document, binding.value),
                _ => {}
            }
        }

        summary
    }

    /// Decode located entry in full.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Malformed`] if the entry has no
    ///   `users = [ ... ];` list, or if its `profiles` or `users` do not
    ///   have the expected shape.
    pub fn decode(&self, document: &str, located: &Located) -> Result<Entry> {
        let mut entry = Entry::new(located.name.clone());
        let mut users = None;

        let members = scan::members(document, located.body)?;
        entry.inherits = raw_statements(document, &members.inherits);

        for binding in members.bindings {
            match binding.name.as_str() {
                "profiles" => entry.profiles = scan::string_list(document, binding.value)?,
                "users" => users = Some(decode_users(document, binding.value)?),
                "extraModules" => {
                    let Some(inner) = scan::enclosed(document, binding.value, b'[')? else {
                        return Err(ScanError::new(
                            "expected `extraModules` to be a list",
                            binding.value.start,
                        )
                        .into());
                    };
                    entry.modules = scan::list_items(document, inner)?
                        .into_iter()
                        .map(|item| item.slice(document).to_owned())
                        .collect();
                }
                name => match scan::string_value(document, binding.value) {
                    // INVARIANT: Hostname that matches entry name is implied.
                    Some(value) if name == "hostname" && value == entry.name => {}
                    Some(value) if scan::is_identifier(name) => {
                        entry.extra.insert(name.to_owned(), value);
                    }
                    _ => entry.verbatim.push(raw_binding(document, &binding)),
                },
            }
        }

        entry.users = users.ok_or_else(|| {
            RegistryError::Malformed(ScanError::new(
                format!("host {:?} has no `users = [ ... ];` list", located.name),
                located.span.start,
            ))
        })?;

        Ok(entry)
    }
}

fn decode_users(document: &str, value: Span) -> Result<Vec<SubEntry>> {
    let Some(inner) = scan::enclosed(document, value, b'[')? else {
        return Err(ScanError::new("expected `users` to be a list", value.start).into());
    };

    let mut users = Vec::new();
    for item in scan::list_items(document, inner)? {
        let Some(body) = scan::enclosed(document, item, b'{')? else {
            return Err(ScanError::new("expected user attribute set", item.start).into());
        };

        let mut name = None;
        let mut user = SubEntry::default();
        let members = scan::members(document, body)?;
        user.inherits = raw_statements(document, &members.inherits);
        for binding in members.bindings {
            match binding.name.as_str() {
                "name" => name = scan::string_value(document, binding.value),
                "profiles" => user.profiles = scan::string_list(document, binding.value)?,
                "extraGroups" => user.groups = scan::string_list(document, binding.value)?,
                _ => user.verbatim.push(raw_binding(document, &binding)),
            }
        }

        user.name = name
            .ok_or_else(|| ScanError::new("user has no `name` string", item.start))?;
        users.push(user);
    }

    Ok(users)
}

fn raw_binding(document: &str, binding: &Binding) -> (String, String) {
    (
        binding.key.slice(document).to_owned(),
        binding.value.slice(document).to_owned(),
    )
}

fn raw_statements(document: &str, spans: &[Span]) -> Vec<String> {
    spans
        .iter()
        .map(|span| span.slice(document).to_owned())
        .collect()
}

fn user_names(document: &str, value: Span) -> Vec<String> {
    let Ok(Some(inner)) = scan::enclosed(document, value, b'[') else {
        return Vec::new();
    };

    scan::list_items(document, inner)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| scan::enclosed(document, item, b'{').ok().flatten())
        .filter_map(|body| scan::bindings(document, body).ok())
        .filter_map(|bindings| {
            bindings
                .into_iter()
                .find(|binding| binding.name == "name")
                .and_then(|binding| scan::string_value(document, binding.value))
        })
        .collect()
}
