// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Boilerplate for new files in the configuration tree.

use crate::registry::scan::quote;

use indoc::formatdoc;

/// Loader placed at `hosts/<name>/default.nix`.
pub fn host_loader(host: &str) -> String {
    formatdoc! {r#"
        # Host Configuration Loader
        # Loads the configuration.nix for {host}

        {{ config, lib, pkgs, inputs, ... }}: {{
          imports = [ ./configuration.nix ];
        }}
    "#, host = host}
}

/// Host-specific configuration placed at `hosts/<name>/configuration.nix`.
pub fn host_configuration(host: &str) -> String {
    formatdoc! {r#"
        # {host} Configuration
        # Host-specific configuration for {host}

        {{ config, lib, pkgs, ... }}: {{
          networking.hostName = "{host}";

          # Add host-specific configuration here
        }}
    "#, host = host}
}

/// Individual user configuration.
///
/// Git identity uses `fullname` if given and the user name otherwise. The
/// email line is left out entirely without an email.
pub fn user(name: &str, email: Option<&str>, fullname: Option<&str>) -> String {
    let display = fullname.unwrap_or(name);
    let git_name = quote(display);
    let email = match email {
        Some(email) => format!("\n    userEmail = {};", quote(email)),
        None => String::new(),
    };

    formatdoc! {r#"
        # {heading}'s Individual User Configuration
        # Personal configurations specific to {name}

        {{ lib, pkgs, ... }}: {{
          # Personal git configuration
          programs.git = {{
            userName = {git_name};{email}
            extraConfig = {{
              core.editor = "nvim";
              init.defaultBranch = "main";
              pull.rebase = true;
              push.autoSetupRemote = true;
            }};
          }};

          # Personal packages
          home.packages = with pkgs; [
            # Add personal packages here
          ];

          # Personal shell aliases
          programs.zsh.shellAliases = {{
            # Add personal aliases here
          }};

          # Personal program configurations
          programs = {{
            # Configure personal programs here
          }};

          # Custom home-manager configurations
          home = {{
            # Add home configurations here
          }};
        }}
    "#, heading = comment_text(display), name = name, git_name = git_name, email = email}
}

/// Home-manager profile shared between users.
pub fn user_profile(name: &str) -> String {
    formatdoc! {r#"
        # User Profile: {name}
        {{ pkgs, ... }}: {{
          # Import common profile
          imports = [ ./common.nix ];

          # Home packages specific to {name} profile
          home.packages = with pkgs; [
            # Add packages here
          ];

          # Program configurations
          programs = {{
            # Configure programs here
          }};

          # Shell aliases
          programs.zsh.shellAliases = {{
            # Add aliases here
          }};
        }}
    "#, name = name}
}

/// Index that imports every user profile by name.
pub fn user_profile_index(profiles: &[String]) -> String {
    let mut out = String::from("# User Profiles Index\n# Auto-generated - do not edit manually\n{\n");
    for profile in profiles {
        out.push_str(&format!("  {profile} = import ./{profile}.nix;\n"));
    }
    out.push_str("}\n");
    out
}

/// System-wide package profile.
pub fn package_profile(name: &str, description: Option<&str>) -> String {
    let description = match description {
        Some(description) => format!("# {}", comment_text(description)),
        None => format!("# System-wide packages for {name}"),
    };

    formatdoc! {r#"
        # {name} Package Profile
        {description}

        {{ config, lib, pkgs, ... }}: {{
          environment.systemPackages = with pkgs; [
            # Add system-wide packages here
          ];

          # System services for {name}
          # services = {{
          #   # Configure services here
          # }};

          # System configuration for {name}
          # programs = {{
          #   # Configure programs here
          # }};

          # Environment variables
          # environment.variables = {{
          #   # Add environment variables here
          # }};
        }}
    "#, name = name, description = description}
}

/// Flatten text onto one line so it cannot leave a `#` comment.
fn comment_text(text: &str) -> String {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::scan::check_balanced;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn user_profile_index_lists_every_profile() {
        let result = user_profile_index(&["common".into(), "gamer".into()]);
        let expect = indoc! {r#"
            # User Profiles Index
            # Auto-generated - do not edit manually
            {
              common = import ./common.nix;
              gamer = import ./gamer.nix;
            }
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn user_email_line_is_optional() {
        let result = user("alice", None, None);
        assert!(result.starts_with("# alice's Individual User Configuration\n"));
        assert!(result.contains("    userName = \"alice\";\n    extraConfig = {\n"));
        assert!(!result.contains("userEmail"));

        let result = user("alice", Some("alice@example.com"), Some("Alice Liddell"));
        assert!(result.contains(
            "    userName = \"Alice Liddell\";\n    userEmail = \"alice@example.com\";\n"
        ));
    }

    #[test]
    fn package_profile_description_falls_back() {
        let result = package_profile("gaming", None);
        assert!(result.starts_with("# gaming Package Profile\n# System-wide packages for gaming\n"));

        let result = package_profile("gaming", Some("Steam and friends"));
        assert!(result.starts_with("# gaming Package Profile\n# Steam and friends\n"));
    }

    #[test]
    fn comment_text_stays_on_one_line() {
        let result = package_profile("gaming", Some("Steam\n}; evil = true; {\r\nand friends"));
        assert!(result.starts_with(
            "# gaming Package Profile\n# Steam }; evil = true; { and friends\n\n{ config"
        ));

        let result = user("alice", None, Some("Alice\nbuiltins.abort \"x\""));
        assert!(result.starts_with("# Alice builtins.abort \"x\"'s Individual User Configuration\n"));
        assert!(result.contains("    userName = \"Alice\\nbuiltins.abort \\\"x\\\"\";\n"));
        assert!(check_balanced(&result).is_ok());
    }

    #[test]
    fn templates_are_balanced() {
        for text in [
            host_loader("web1"),
            host_configuration("web1"),
            user("alice", Some("a@b.c"), None),
            user_profile("gamer"),
            user_profile_index(&[]),
            package_profile("gaming", None),
        ] {
            assert!(check_balanced(&text).is_ok(), "unbalanced template:\n{text}");
        }
    }
}
