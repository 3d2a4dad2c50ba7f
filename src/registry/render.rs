// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Canonical entry text.

use crate::{
    config::RegistrySettings,
    registry::{
        scan::{attr_name, quote, quote_list},
        Entry, Registry, SubEntry,
    },
};

use std::fmt::{Display, Formatter, Result as FmtResult};

const ENTRY_INDENT: &str = "          ";
const FIELD_INDENT: &str = "            ";
const USER_INDENT: &str = "              ";
const USER_FIELD_INDENT: &str = "                ";

impl Registry {
    /// Render entry into its canonical text.
    ///
    /// Output starts with the entry's indentation and ends right after the
    /// closing `};`, without a trailing newline. Same entry always renders
    /// to the same bytes.
    pub fn render(&self, entry: &Entry) -> String {
        RenderEntry {
            settings: &self.settings,
            entry,
        }
        .to_string()
    }
}

struct RenderEntry<'a> {
    settings: &'a RegistrySettings,
    entry: &'a Entry,
}

impl Display for RenderEntry<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let entry = self.entry;
        writeln!(
            fmt,
            "{ENTRY_INDENT}{} = {} {{",
            entry.name, self.settings.constructor
        )?;

        // INVARIANT: Hostname written as an expression replaces the default.
        let raw_hostname = entry.verbatim.iter().any(|(key, _)| is_hostname(key))
            || entry.inherits.iter().any(|statement| inherits_hostname(statement));
        if !raw_hostname {
            let hostname = entry.extra.get("hostname").unwrap_or(&entry.name);
            writeln!(fmt, "{FIELD_INDENT}hostname = {};", quote(hostname))?;
        }

        for statement in &entry.inherits {
            writeln!(fmt, "{FIELD_INDENT}{statement}")?;
        }

        for (key, value) in &entry.extra {
            if key == "hostname" || (key == "system" && *value == self.settings.default_system) {
                continue;
            }
            writeln!(fmt, "{FIELD_INDENT}{} = {};", attr_name(key), quote(value))?;
        }

        if !entry.modules.is_empty() {
            writeln!(
                fmt,
                "{FIELD_INDENT}extraModules = [ {} ];",
                entry.modules.join(" ")
            )?;
        }

        for (key, value) in &entry.verbatim {
            writeln!(fmt, "{FIELD_INDENT}{key} = {value};")?;
        }

        writeln!(
            fmt,
            "{FIELD_INDENT}profiles = {};",
            quote_list(&entry.profiles)
        )?;

        if entry.users.is_empty() {
            writeln!(fmt, "{FIELD_INDENT}users = [];")?;
        } else {
            writeln!(fmt, "{FIELD_INDENT}users = [")?;
            for user in &entry.users {
                write!(fmt, "{}", RenderUser(user))?;
            }
            writeln!(fmt, "{FIELD_INDENT}];")?;
        }

        write!(fmt, "{ENTRY_INDENT}}};")
    }
}

struct RenderUser<'a>(&'a SubEntry);

impl Display for RenderUser<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let user = self.0;
        writeln!(fmt, "{USER_INDENT}{{")?;
        writeln!(fmt, "{USER_FIELD_INDENT}name = {};", quote(&user.name))?;
        for statement in &user.inherits {
            writeln!(fmt, "{USER_FIELD_INDENT}{statement}")?;
        }
        writeln!(
            fmt,
            "{USER_FIELD_INDENT}profiles = {};",
            quote_list(&user.profiles)
        )?;
        writeln!(
            fmt,
            "{USER_FIELD_INDENT}extraGroups = {};",
            quote_list(&user.groups)
        )?;
        for (key, value) in &user.verbatim {
            writeln!(fmt, "{USER_FIELD_INDENT}{key} = {value};")?;
        }
        writeln!(fmt, "{USER_INDENT}}}")
    }
}

fn is_hostname(key: &str) -> bool {
    key == "hostname" || key == "\"hostname\""
}

fn inherits_hostname(statement: &str) -> bool {
    statement
        .trim_end_matches(';')
        .split_whitespace()
        .any(|word| word == "hostname")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_minimal_entry() {
        let entry = Entry::new("web1").with_profiles(["base", "web"]);
        let result = Registry::default().render(&entry);
        let expect = [
            "          web1 = lib.mkSystem {",
            "            hostname = \"web1\";",
            "            profiles = [ \"base\" \"web\" ];",
            "            users = [];",
            "          };",
        ]
        .join("\n");
        assert_eq!(result, expect);
    }

    #[test]
    fn render_full_entry() {
        let mut entry = Entry::new("pi")
            .with_profiles(Vec::<String>::new())
            .with_system("aarch64-linux")
            .with_modules(["./hardware.nix", "inputs.hw.nixosModules.pi"]);
        entry
            .verbatim
            .push(("specialArgs".into(), "{ inherit inputs; }".into()));
        entry
            .add_user(SubEntry::new("alice", ["dev"], ["wheel", "docker"]))
            .unwrap();
        entry
            .add_user(SubEntry::new("bob", Vec::<String>::new(), ["wheel"]))
            .unwrap();

        let result = Registry::default().render(&entry);
        let expect = [
            "          pi = lib.mkSystem {",
            "            hostname = \"pi\";",
            "            system = \"aarch64-linux\";",
            "            extraModules = [ ./hardware.nix inputs.hw.nixosModules.pi ];",
            "            specialArgs = { inherit inputs; };",
            "            profiles = [];",
            "            users = [",
            "              {",
            "                name = \"alice\";",
            "                profiles = [ \"dev\" ];",
            "                extraGroups = [ \"wheel\" \"docker\" ];",
            "              }",
            "              {",
            "                name = \"bob\";",
            "                profiles = [];",
            "                extraGroups = [ \"wheel\" ];",
            "              }",
            "            ];",
            "          };",
        ]
        .join("\n");
        assert_eq!(result, expect);
    }

    #[test]
    fn render_keeps_hand_written_fields() {
        let mut entry = Entry::new("web1");
        entry.extra.insert("my key".into(), "x".into());
        entry.inherits.push("inherit specialArgs;".into());
        entry.verbatim.push(("hostname".into(), "name".into()));
        let mut alice = SubEntry::new("alice", Vec::<String>::new(), ["wheel"]);
        alice.inherits.push("inherit (cfg) uid;".into());
        entry.add_user(alice).unwrap();

        let result = Registry::default().render(&entry);
        let expect = [
            "          web1 = lib.mkSystem {",
            "            inherit specialArgs;",
            "            \"my key\" = \"x\";",
            "            hostname = name;",
            "            profiles = [];",
            "            users = [",
            "              {",
            "                name = \"alice\";",
            "                inherit (cfg) uid;",
            "                profiles = [];",
            "                extraGroups = [ \"wheel\" ];",
            "              }",
            "            ];",
            "          };",
        ]
        .join("\n");
        assert_eq!(result, expect);
    }

    #[test]
    fn render_omits_default_system() {
        let entry = Entry::new("box").with_system("x86_64-linux");
        let result = Registry::default().render(&entry);
        assert!(!result.contains("system ="));
    }

    #[test]
    fn render_preserves_profile_order() {
        let entry = Entry::new("box").with_profiles(["zeta", "alpha", "mid"]);
        let result = Registry::default().render(&entry);
        assert!(result.contains(r#"profiles = [ "zeta" "alpha" "mid" ];"#));
    }
}
