// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Splice entries in and out of the registry document.
//!
//! Every edit is computed in memory and handed back as a new document. On
//! failure the input document is left as it was, so the caller never has
//! anything partial to write.

use crate::registry::{scan, Entry, Registry, RegistryError, Result};

use tracing::debug;

impl Registry {
    /// Insert new entry right before the collection block's closing brace.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::InvalidName`] if entry name is not a bare
    ///   Nix identifier.
    /// - Return [`RegistryError::CollectionBlockMissing`] if the document has
    ///   no designated collection block.
    /// - Return [`RegistryError::DuplicateEntry`] if any binding of the
    ///   collection block already uses entry's name.
    /// - Return [`RegistryError::Malformed`] if the document cannot be
    ///   scanned.
    pub fn insert(&self, document: &str, entry: &Entry) -> Result<String> {
        if !scan::is_identifier(&entry.name) {
            return Err(RegistryError::InvalidName {
                name: entry.name.clone(),
            });
        }

        let collection =
            self.collection(document)?
                .ok_or_else(|| RegistryError::CollectionBlockMissing {
                    collection: self.settings.collection.clone(),
                })?;

        // INVARIANT: Any sibling binding counts, not just constructor calls.
        if scan::bindings(document, collection.body())?
            .iter()
            .any(|binding| binding.name == entry.name)
        {
            return Err(RegistryError::DuplicateEntry {
                name: entry.name.clone(),
            });
        }

        let rendered = self.render(entry);
        let bytes = document.as_bytes();
        let mut at = collection.close;
        while at > collection.open + 1 && matches!(bytes[at - 1], b' ' | b'\t') {
            at -= 1;
        }

        let mut output = String::with_capacity(document.len() + rendered.len() + 2);
        output.push_str(&document[..at]);
        if bytes[at - 1] != b'\n' {
            output.push('\n');
        }
        output.push_str(&rendered);
        output.push('\n');
        output.push_str(&document[at..]);

        debug!("inserted {:?} at byte {at}", entry.name);
        Ok(output)
    }

    /// Replace entry with mutated version of itself.
    ///
    /// Decodes the entry, hands it to `mutate`, and swaps the re-rendered text
    /// in for exactly the located span. The indentation in front of the entry
    /// is kept.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::EntryNotFound`] if there is no such entry.
    /// - Return [`RegistryError::Malformed`] if the entry cannot be decoded.
    /// - Return whatever `mutate` fails with.
    pub fn replace<F>(&self, document: &str, name: &str, mutate: F) -> Result<String>
    where
        F: FnOnce(&mut Entry) -> Result<()>,
    {
        let located = self
            .locate(document, name)?
            .ok_or_else(|| RegistryError::EntryNotFound { name: name.into() })?;

        let mut entry = self.decode(document, &located)?;
        mutate(&mut entry)?;

        let rendered = self.render(&entry);
        let mut output = String::with_capacity(document.len() + rendered.len());
        output.push_str(&document[..located.span.start]);
        output.push_str(rendered.trim_start());
        output.push_str(&document[located.span.end..]);

        debug!("replaced {name:?} at bytes {:?}", located.span);
        Ok(output)
    }

    /// Delete entry along with the whitespace in front of it.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::EntryNotFound`] if there is no such entry.
    /// - Return [`RegistryError::Malformed`] if the document cannot be
    ///   scanned.
    pub fn delete(&self, document: &str, name: &str) -> Result<String> {
        let located = self
            .locate(document, name)?
            .ok_or_else(|| RegistryError::EntryNotFound { name: name.into() })?;

        let bytes = document.as_bytes();
        let mut start = located.span.start;
        while start > 0 && bytes[start - 1].is_ascii_whitespace() {
            start -= 1;
        }

        // INVARIANT: Keep one line break if nothing after the entry supplies
        // one, so a trailing comment on the previous line cannot swallow the
        // following text.
        let rest = &document[located.span.end..];
        let rest_breaks_line = rest
            .bytes()
            .take_while(u8::is_ascii_whitespace)
            .any(|byte| byte == b'\n');
        let removed = &document[start..located.span.start];
        if !rest_breaks_line {
            if let Some(newline) = removed.rfind('\n') {
                start += newline + 1;
            }
        }

        let mut output = String::with_capacity(document.len());
        output.push_str(&document[..start]);
        output.push_str(rest);

        debug!("deleted {name:?} at bytes {start}..{}", located.span.end);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::RegistrySettings,
        registry::{Entry, Registry, RegistryError, SubEntry},
    };

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn systems() -> Registry {
        Registry::new(RegistrySettings {
            collection: "systems".into(),
            ..Default::default()
        })
    }

    fn three_hosts() -> String {
        let registry = systems();
        let mut document = String::from("{\n  systems = {\n  };\n}\n");
        for name in ["a", "b", "c"] {
            let entry = Entry::new(name).with_profiles(["common"]);
            document = registry.insert(&document, &entry).unwrap();
        }
        document
    }

    #[test]
    fn insert_into_empty_collection() {
        let registry = systems();
        let entry = Entry::new("web1").with_profiles(["base", "web"]);
        let result = registry.insert("systems = { };", &entry).unwrap();

        let expect = [
            "systems = {",
            "          web1 = lib.mkSystem {",
            "            hostname = \"web1\";",
            "            profiles = [ \"base\" \"web\" ];",
            "            users = [];",
            "          };",
            " };",
        ]
        .join("\n");
        assert_eq!(result, expect);

        assert!(registry.locate(&result, "web1").unwrap().is_some());
        let result = registry.delete(&result, "web1").unwrap();
        assert_eq!(registry.locate(&result, "web1").unwrap(), None);
    }

    #[test]
    fn insert_before_closing_line() {
        let registry = Registry::default();
        let document = indoc! {r#"
            {
              flake = {
                nixosConfigurations = {
                  # Add hosts here.
                };
              };
            }
        "#};
        let result = registry
            .insert(document, &Entry::new("box").with_profiles(["common"]))
            .unwrap();

        let expect = indoc! {r#"
            {
              flake = {
                nixosConfigurations = {
                  # Add hosts here.
                      box = lib.mkSystem {
                        hostname = "box";
                        profiles = [ "common" ];
                        users = [];
                      };
                };
              };
            }
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn insert_rejects_duplicates_without_touching_document() {
        let registry = systems();
        let document = three_hosts();
        let result = registry.insert(&document, &Entry::new("b"));
        assert!(matches!(result, Err(RegistryError::DuplicateEntry { .. })));

        let document = "systems = { b = import ./b.nix; };";
        let result = registry.insert(document, &Entry::new("b"));
        assert!(matches!(result, Err(RegistryError::DuplicateEntry { .. })));
    }

    #[test]
    fn insert_allows_names_that_extend_existing_ones() {
        let registry = systems();
        let document = registry.insert(&three_hosts(), &Entry::new("a-2")).unwrap();
        assert_eq!(registry.list(&document).unwrap(), vec!["a", "b", "c", "a-2"]);
    }

    #[test]
    fn insert_requires_collection() {
        let registry = systems();
        let result = registry.insert("{ other = { }; }", &Entry::new("web1"));
        assert!(matches!(
            result,
            Err(RegistryError::CollectionBlockMissing { .. })
        ));
    }

    #[test]
    fn insert_rejects_invalid_names() {
        let registry = systems();
        let result = registry.insert("systems = { };", &Entry::new("bad name"));
        assert!(matches!(result, Err(RegistryError::InvalidName { .. })));
    }

    #[test]
    fn delete_leaves_siblings_intact() {
        let registry = systems();
        let document = three_hosts();
        let before_a = registry.locate(&document, "a").unwrap().unwrap();
        let before_c = registry.locate(&document, "c").unwrap().unwrap();

        let result = registry.delete(&document, "b").unwrap();
        let after_a = registry.locate(&result, "a").unwrap().unwrap();
        let after_c = registry.locate(&result, "c").unwrap().unwrap();

        assert_eq!(registry.list(&result).unwrap(), vec!["a", "c"]);
        assert_eq!(after_a.text(&result), before_a.text(&document));
        assert_eq!(after_c.text(&result), before_c.text(&document));
    }

    #[test]
    fn delete_missing_entry_fails() {
        let registry = systems();
        let result = registry.delete(&three_hosts(), "zzz");
        assert!(matches!(result, Err(RegistryError::EntryNotFound { .. })));
    }

    #[test]
    fn delete_keeps_line_break_after_comment() {
        let registry = systems();
        let document = "systems = {\n  # keep me\n  a = lib.mkSystem { users = []; };};";
        let result = registry.delete(document, "a").unwrap();
        assert_eq!(result, "systems = {\n  # keep me\n};");
    }

    #[test]
    fn replace_adds_user_and_preserves_surroundings() {
        let registry = systems();
        let document = three_hosts();
        let span = registry.locate(&document, "b").unwrap().unwrap().span;

        let result = registry
            .replace(&document, "b", |entry| {
                entry.add_user(SubEntry::new("alice", ["dev"], ["wheel"]))
            })
            .unwrap();

        let located = registry.locate(&result, "b").unwrap().unwrap();
        assert_eq!(located.span.start, span.start);
        assert_eq!(&result[..span.start], &document[..span.start]);
        assert_eq!(&result[located.span.end..], &document[span.end..]);

        let entry = registry.decode(&result, &located).unwrap();
        assert_eq!(entry.users, vec![SubEntry::new("alice", ["dev"], ["wheel"])]);
        assert_eq!(entry.profiles, vec!["common"]);
    }

    const HAND_WRITTEN: &str = indoc! {r#"
        systems = {
          web1 = lib.mkSystem {
            hostname = "${prefix}-web";
            inherit specialArgs;
            "my key" = 1;
            profiles = [ "base" ];
            users = [];
          };
          web2 = lib.mkSystem {
            hostname = name;
            profiles = [];
            users = [ { name = "bob"; inherit uid; profiles = []; extraGroups = []; } ];
          };
        };
    "#};

    #[test]
    fn replace_keeps_hand_written_fields() {
        let registry = systems();
        let alice = SubEntry::new("alice", ["dev"], ["wheel"]);
        let result = registry
            .replace(HAND_WRITTEN, "web1", |entry| entry.add_user(alice))
            .unwrap();

        let located = registry.locate(&result, "web1").unwrap().unwrap();
        let expect = [
            "web1 = lib.mkSystem {",
            "            inherit specialArgs;",
            "            hostname = \"${prefix}-web\";",
            "            \"my key\" = 1;",
            "            profiles = [ \"base\" ];",
            "            users = [",
            "              {",
            "                name = \"alice\";",
            "                profiles = [ \"dev\" ];",
            "                extraGroups = [ \"wheel\" ];",
            "              }",
            "            ];",
            "          };",
        ]
        .join("\n");
        assert_eq!(located.text(&result), expect);

        let result = registry
            .replace(&result, "web1", |entry| entry.remove_user("alice").map(|_| ()))
            .unwrap();
        let before = registry.locate(HAND_WRITTEN, "web1").unwrap().unwrap();
        let after = registry.locate(&result, "web1").unwrap().unwrap();
        assert_eq!(
            registry.decode(&result, &after).unwrap(),
            registry.decode(HAND_WRITTEN, &before).unwrap()
        );
    }

    #[test]
    fn replace_keeps_hostname_expression_single() {
        let registry = systems();
        let result = registry
            .replace(HAND_WRITTEN, "web2", |entry| {
                entry.add_user(SubEntry::new("alice", Vec::<String>::new(), ["wheel"]))
            })
            .unwrap();

        let located = registry.locate(&result, "web2").unwrap().unwrap();
        let text = located.text(&result);
        assert_eq!(text.matches("hostname =").count(), 1);
        assert!(text.contains("            hostname = name;\n"));
        assert!(text.contains("                inherit uid;\n"));

        let entry = registry.decode(&result, &located).unwrap();
        let names = entry.users.iter().map(|user| user.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["bob", "alice"]);
    }

    #[test]
    fn hand_written_entries_render_stably() {
        let registry = systems();
        for name in ["web1", "web2"] {
            let located = registry.locate(HAND_WRITTEN, name).unwrap().unwrap();
            let first = registry.render(&registry.decode(HAND_WRITTEN, &located).unwrap());

            let document = format!("systems = {{\n{first}\n}};\n");
            let located = registry.locate(&document, name).unwrap().unwrap();
            let second = registry.render(&registry.decode(&document, &located).unwrap());
            assert_eq!(second, first);
        }
    }

    #[test]
    fn replace_propagates_mutation_failure() {
        let registry = systems();
        let result = registry.replace(&three_hosts(), "a", |entry| {
            entry.remove_user("ghost").map(|_| ())
        });
        assert!(matches!(result, Err(RegistryError::UserNotFound { .. })));
    }

    #[test]
    fn replace_missing_entry_fails() {
        let registry = systems();
        let result = registry.replace(&three_hosts(), "zzz", |_| Ok(()));
        assert!(matches!(result, Err(RegistryError::EntryNotFound { .. })));
    }

    #[test]
    fn inserted_entry_decodes_back() {
        let registry = systems();
        let mut entry = Entry::new("web1").with_profiles(["base", "web"]);
        entry
            .add_user(SubEntry::new("alice", ["dev"], ["wheel"]))
            .unwrap();

        let document = registry.insert("systems = { };", &entry).unwrap();
        let located = registry.locate(&document, "web1").unwrap().unwrap();
        assert_eq!(registry.decode(&document, &located).unwrap(), entry);
    }
}
