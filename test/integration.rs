// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{TreeFixture, STOCK_FLAKE};

use anyhow::Result;
use nixcfg::{
    cleanup::Cleanup,
    hosts::{HostError, Hosts, NewHost, NewUser},
    profiles::{ProfileError, ProfileKind, Profiles},
    registry::{RegistryError, SubEntry},
    users::{NewUserFile, Users},
};
use pretty_assertions::assert_eq;
use std::{fs, process::Command};

#[test]
fn host_and_user_workflow() -> Result<()> {
    let tree = TreeFixture::new()?;
    let workspace = tree.workspace();
    let hosts = Hosts::new(workspace);

    Users::new(workspace).add(NewUserFile {
        name: "alice".into(),
        email: Some("alice@example.com".into()),
        fullname: Some("Alice Liddell".into()),
    })?;
    Profiles::new(workspace, ProfileKind::User).add("developer", None)?;

    hosts.add(NewHost {
        name: "web1".into(),
        profiles: Some(vec!["common".into(), "web".into()]),
        system: Some("aarch64-linux".into()),
        modules: vec!["./hardware/web1.nix".into()],
    })?;
    hosts.add_user(
        "web1",
        NewUser {
            name: "alice".into(),
            profiles: Some(vec!["developer".into()]),
            groups: None,
        },
    )?;

    let summaries = hosts.list()?;
    let names = summaries.iter().map(|host| host.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["nixos-wsl", "web1"]);
    assert_eq!(summaries[1].profiles, vec!["common", "web"]);
    assert_eq!(summaries[1].users, vec!["alice"]);
    assert_eq!(summaries[1].system.as_deref(), Some("aarch64-linux"));
    assert!(summaries[1].has_dir);

    let registry = workspace.registry();
    let flake = tree.flake()?;
    let located = registry.locate(&flake, "web1")?.expect("web1 is registered");
    let entry = registry.decode(&flake, &located)?;
    assert_eq!(
        entry.users,
        vec![SubEntry::new("alice", ["developer"], ["wheel", "networkmanager"])]
    );
    assert_eq!(entry.modules, vec!["./hardware/web1.nix"]);

    // Everything outside the registry block is untouched.
    let (head, _) = STOCK_FLAKE.split_once("nixos-wsl = lib.mkSystem").unwrap();
    assert!(flake.starts_with(head));
    assert!(flake.contains("echo \"run 'task --list' to see tasks; nothing = here;\""));

    hosts.remove_user("web1", "alice")?;
    assert_eq!(hosts.remove("web1")?, Some(tree.path("hosts/web1")));
    assert_eq!(tree.flake()?, STOCK_FLAKE);

    Ok(())
}

#[test]
fn failed_commands_leave_flake_alone() -> Result<()> {
    let tree = TreeFixture::new()?;
    let hosts = Hosts::new(tree.workspace());

    let result = hosts.add(NewHost {
        name: "nixos-wsl".into(),
        ..Default::default()
    });
    assert!(matches!(
        result,
        Err(HostError::Registry(RegistryError::DuplicateEntry { .. }))
    ));

    let result = hosts.add_user(
        "ghost",
        NewUser {
            name: "alice".into(),
            ..Default::default()
        },
    );
    assert!(matches!(
        result,
        Err(HostError::Registry(RegistryError::EntryNotFound { .. }))
    ));

    let result = hosts.remove_user("nixos-wsl", "alice");
    assert!(matches!(
        result,
        Err(HostError::Registry(RegistryError::UserNotFound { .. }))
    ));

    assert_eq!(tree.flake()?, STOCK_FLAKE);

    Ok(())
}

#[test]
fn missing_collection_is_reported() -> Result<()> {
    let tree = TreeFixture::new()?;
    fs::write(tree.path("flake.nix"), "{ outputs = _: { }; }\n")?;

    let result = Hosts::new(tree.workspace()).add(NewHost {
        name: "web1".into(),
        ..Default::default()
    });
    assert!(matches!(
        result,
        Err(HostError::Registry(RegistryError::CollectionBlockMissing { .. }))
    ));
    assert!(!tree.path("hosts/web1").exists());

    Ok(())
}

#[test]
fn package_profile_workflow() -> Result<()> {
    let tree = TreeFixture::new()?;
    let profiles = Profiles::new(tree.workspace(), ProfileKind::Package);

    profiles.add("gaming", Some("Steam and friends"))?;
    assert_eq!(profiles.list()?, vec!["common", "gaming"]);
    assert_eq!(profiles.validate("gaming")?, Vec::<String>::new());

    let details = profiles.details()?;
    assert_eq!(details[0].description.as_deref(), Some("Common Package Profile"));
    assert_eq!(
        details[0].packages,
        Some(vec!["git".into(), "vim".into(), "curl".into(), "wget".into()])
    );
    assert_eq!(details[1].packages, Some(Vec::new()));

    assert!(matches!(
        profiles.remove("common"),
        Err(ProfileError::Protected { .. })
    ));
    profiles.remove("gaming")?;
    assert_eq!(profiles.list()?, vec!["common"]);

    Ok(())
}

#[test]
fn cleanup_resets_tree() -> Result<()> {
    let tree = TreeFixture::new()?;
    let workspace = tree.workspace();
    Hosts::new(workspace).add(NewHost {
        name: "web1".into(),
        ..Default::default()
    })?;
    Users::new(workspace).add(NewUserFile {
        name: "alice".into(),
        ..Default::default()
    })?;
    Profiles::new(workspace, ProfileKind::User).add("gamer", None)?;

    let cleanup = Cleanup::new(workspace);
    let plan = cleanup.plan()?;
    assert_eq!(plan.hosts, vec!["web1"]);

    let report = cleanup.execute(&plan)?;
    assert_eq!(report.hosts, vec!["web1"]);
    assert!(!tree.path("hosts/web1").exists());
    assert!(!tree.path("users/alice.nix").exists());
    assert!(!tree.path("profiles/users/gamer.nix").exists());

    let index = fs::read_to_string(tree.path("profiles/users/default.nix"))?;
    assert!(index.contains("common = import ./common.nix;"));
    assert!(!index.contains("gamer"));
    assert!(tree.path("profiles/users/common.nix").exists());
    assert!(tree.path("hosts/nixos-wsl").exists());
    assert_eq!(tree.flake()?, STOCK_FLAKE);
    assert!(cleanup.plan()?.is_empty());

    Ok(())
}

#[test]
fn settings_file_changes_layout() -> Result<()> {
    let tree = TreeFixture::new()?;
    fs::write(
        tree.path("nixcfg.toml"),
        "[defaults]\nhost_profiles = [\"base\"]\n",
    )?;
    let workspace = nixcfg::workspace::Workspace::open(tree.root())?;

    Hosts::new(&workspace).add(NewHost {
        name: "web1".into(),
        ..Default::default()
    })?;
    assert_eq!(Hosts::new(&workspace).list()?[1].profiles, vec!["base"]);

    Ok(())
}

#[test]
fn binary_reports_missing_arguments() -> Result<()> {
    let tree = TreeFixture::new()?;
    let output = Command::new(env!("CARGO_BIN_EXE_nixcfg"))
        .arg("--root")
        .arg(tree.root())
        .args(["hosts", "show"])
        .env("NO_COLOR", "1")
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("name=HOST"));

    let output = Command::new(env!("CARGO_BIN_EXE_nixcfg"))
        .arg("--root")
        .arg(tree.root())
        .args(["hosts", "list"])
        .output()?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("nixos-wsl\n"));

    Ok(())
}
