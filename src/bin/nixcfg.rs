// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use nixcfg::{
    args::{Assignment, Assignments},
    cleanup::Cleanup,
    hosts::{Hosts, NewHost, NewUser},
    path::tree_root,
    profiles::{ProfileKind, Profiles},
    users::{NewUserFile, Users},
    workspace::Workspace,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use inquire::Confirm;
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HOSTS_SHOW: &str = "nixcfg hosts show name=HOST";
const HOSTS_ADD: &str =
    "nixcfg hosts add name=HOST [profiles=a,b] [system=SYSTEM] [modules=m1,m2]";
const HOSTS_REMOVE: &str = "nixcfg hosts remove name=HOST";
const HOSTS_ADD_USER: &str =
    "nixcfg hosts add-user host=HOST name=USER [profiles=a,b] [groups=a,b]";
const HOSTS_REMOVE_USER: &str = "nixcfg hosts remove-user host=HOST name=USER";
const USERS_SHOW: &str = "nixcfg users show name=USER";
const USERS_ADD: &str = "nixcfg users add name=USER [email=EMAIL] [fullname=NAME]";
const USERS_REMOVE: &str = "nixcfg users remove name=USER";
const USER_PROFILES_SHOW: &str = "nixcfg user-profiles show name=PROFILE";
const USER_PROFILES_ADD: &str = "nixcfg user-profiles add name=PROFILE";
const USER_PROFILES_REMOVE: &str = "nixcfg user-profiles remove name=PROFILE";
const PACKAGE_PROFILES_SHOW: &str = "nixcfg package-profiles show name=PROFILE";
const PACKAGE_PROFILES_ADD: &str =
    "nixcfg package-profiles add name=PROFILE [description=TEXT]";
const PACKAGE_PROFILES_REMOVE: &str = "nixcfg package-profiles remove name=PROFILE";
const PACKAGE_PROFILES_VALIDATE: &str = "nixcfg package-profiles validate name=PROFILE";

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "nixcfg [options] <group> <command> [key=value]...",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Top-level directory of configuration tree.
    #[arg(short, long, global = true, value_name = "dir")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let workspace = Workspace::open(tree_root(self.root)?)?;
        match self.command {
            Command::Hosts(command) => run_hosts(&workspace, command),
            Command::Users(command) => run_users(&workspace, command),
            Command::UserProfiles(command) => run_user_profiles(&workspace, command),
            Command::PackageProfiles(command) => run_package_profiles(&workspace, command),
            Command::Cleanup(opts) => run_cleanup(&workspace, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Manage hosts in the flake registry.
    #[command(subcommand)]
    Hosts(HostCommand),

    /// Manage individual user configurations.
    #[command(subcommand)]
    Users(UserCommand),

    /// Manage home-manager user profiles.
    #[command(subcommand)]
    UserProfiles(UserProfileCommand),

    /// Manage system package profiles.
    #[command(subcommand)]
    PackageProfiles(PackageProfileCommand),

    /// Remove everything that is not part of the stock tree.
    #[command(override_usage = "nixcfg cleanup [--force]")]
    Cleanup(CleanupOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum HostCommand {
    /// List hosts with their profiles and users.
    List,

    /// Show registry entry and files of host.
    #[command(override_usage = HOSTS_SHOW)]
    Show(Tokens),

    /// Register new host and create its directory.
    #[command(override_usage = HOSTS_ADD)]
    Add(Tokens),

    /// Remove host from registry, leaving its directory alone.
    #[command(override_usage = HOSTS_REMOVE)]
    Remove(Tokens),

    /// Attach user to host.
    #[command(override_usage = HOSTS_ADD_USER)]
    AddUser(Tokens),

    /// Detach user from host.
    #[command(override_usage = HOSTS_REMOVE_USER)]
    RemoveUser(Tokens),
}

#[derive(Debug, Clone, Subcommand)]
enum UserCommand {
    /// List users with a configuration file.
    List,

    /// Show configuration file of user.
    #[command(override_usage = USERS_SHOW)]
    Show(Tokens),

    /// Create configuration file for new user.
    #[command(override_usage = USERS_ADD)]
    Add(Tokens),

    /// Remove configuration file of user.
    #[command(override_usage = USERS_REMOVE)]
    Remove(Tokens),
}

#[derive(Debug, Clone, Subcommand)]
enum UserProfileCommand {
    /// List user profiles.
    List,

    /// Show user profile.
    #[command(override_usage = USER_PROFILES_SHOW)]
    Show(Tokens),

    /// Create new user profile.
    #[command(override_usage = USER_PROFILES_ADD)]
    Add(Tokens),

    /// Remove user profile.
    #[command(override_usage = USER_PROFILES_REMOVE)]
    Remove(Tokens),
}

#[derive(Debug, Clone, Subcommand)]
enum PackageProfileCommand {
    /// List package profiles.
    List,

    /// List package profiles with description and packages.
    ListDetailed,

    /// Show package profile.
    #[command(override_usage = PACKAGE_PROFILES_SHOW)]
    Show(Tokens),

    /// Create new package profile.
    #[command(override_usage = PACKAGE_PROFILES_ADD)]
    Add(Tokens),

    /// Remove package profile.
    #[command(override_usage = PACKAGE_PROFILES_REMOVE)]
    Remove(Tokens),

    /// Check package profile for problems.
    #[command(override_usage = PACKAGE_PROFILES_VALIDATE)]
    Validate(Tokens),
}

#[derive(Parser, Clone, Debug)]
struct Tokens {
    /// Arguments of command.
    #[arg(value_name = "key=value")]
    pub args: Vec<Assignment>,
}

impl Tokens {
    fn accept(self, known: &[&str]) -> Assignments {
        let args = Assignments::new(self.args);
        args.warn_unknown(known);
        args
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CleanupOptions {
    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub force: bool,
}

fn main() {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_hosts(workspace: &Workspace, command: HostCommand) -> Result<()> {
    let hosts = Hosts::new(workspace);
    match command {
        HostCommand::List => {
            let summaries = hosts.list()?;
            if summaries.is_empty() {
                println!("no hosts configured");
            }

            for host in summaries {
                println!("{}", host.name);
                println!("  profiles: {}", join_or_none(&host.profiles));
                println!("  users: {}", join_or_none(&host.users));
                if let Some(system) = host.system {
                    println!("  system: {system}");
                }
                println!(
                    "  host dir: {}",
                    if host.has_dir { "present" } else { "missing" }
                );
            }
        }
        HostCommand::Show(tokens) => {
            let args = tokens.accept(&["name"]);
            let detail = hosts.show(args.require("name", HOSTS_SHOW)?)?;
            println!("{}", detail.text);
            match detail.files {
                Some(files) => {
                    println!("\n{}:", detail.dir.display());
                    for file in files {
                        println!("  {file}");
                    }
                }
                None => println!("\n{} does not exist", detail.dir.display()),
            }
        }
        HostCommand::Add(tokens) => {
            let args = tokens.accept(&["name", "profiles", "system", "modules"]);
            hosts.add(NewHost {
                name: args.require("name", HOSTS_ADD)?.into(),
                profiles: args.list("profiles"),
                system: non_empty(args.get("system")),
                modules: args.list("modules").unwrap_or_default(),
            })?;
        }
        HostCommand::Remove(tokens) => {
            let args = tokens.accept(&["name"]);
            if let Some(dir) = hosts.remove(args.require("name", HOSTS_REMOVE)?)? {
                info!("run `rm -rf {}` to remove it if desired", dir.display());
            }
        }
        HostCommand::AddUser(tokens) => {
            let args = tokens.accept(&["host", "name", "profiles", "groups"]);
            let host = args.require("host", HOSTS_ADD_USER)?;
            hosts.add_user(
                host,
                NewUser {
                    name: args.require("name", HOSTS_ADD_USER)?.into(),
                    profiles: args.list("profiles"),
                    groups: args.list("groups"),
                },
            )?;
        }
        HostCommand::RemoveUser(tokens) => {
            let args = tokens.accept(&["host", "name"]);
            hosts.remove_user(
                args.require("host", HOSTS_REMOVE_USER)?,
                args.require("name", HOSTS_REMOVE_USER)?,
            )?;
        }
    }

    Ok(())
}

fn run_users(workspace: &Workspace, command: UserCommand) -> Result<()> {
    let users = Users::new(workspace);
    match command {
        UserCommand::List => print_names("users", users.list()?),
        UserCommand::Show(tokens) => {
            let args = tokens.accept(&["name"]);
            let file = users.show(args.require("name", USERS_SHOW)?)?;
            print!("{}", file.contents);
        }
        UserCommand::Add(tokens) => {
            let args = tokens.accept(&["name", "email", "fullname"]);
            users.add(NewUserFile {
                name: args.require("name", USERS_ADD)?.into(),
                email: non_empty(args.get("email")),
                fullname: non_empty(args.get("fullname")),
            })?;
        }
        UserCommand::Remove(tokens) => {
            let args = tokens.accept(&["name"]);
            users.remove(args.require("name", USERS_REMOVE)?)?;
        }
    }

    Ok(())
}

fn run_user_profiles(workspace: &Workspace, command: UserProfileCommand) -> Result<()> {
    let profiles = Profiles::new(workspace, ProfileKind::User);
    match command {
        UserProfileCommand::List => print_names("user profiles", profiles.list()?),
        UserProfileCommand::Show(tokens) => {
            let args = tokens.accept(&["name"]);
            let file = profiles.show(args.require("name", USER_PROFILES_SHOW)?)?;
            print!("{}", file.contents);
        }
        UserProfileCommand::Add(tokens) => {
            let args = tokens.accept(&["name"]);
            profiles.add(args.require("name", USER_PROFILES_ADD)?, None)?;
        }
        UserProfileCommand::Remove(tokens) => {
            let args = tokens.accept(&["name"]);
            profiles.remove(args.require("name", USER_PROFILES_REMOVE)?)?;
        }
    }

    Ok(())
}

fn run_package_profiles(workspace: &Workspace, command: PackageProfileCommand) -> Result<()> {
    let profiles = Profiles::new(workspace, ProfileKind::Package);
    match command {
        PackageProfileCommand::List => print_names("package profiles", profiles.list()?),
        PackageProfileCommand::ListDetailed => {
            for detail in profiles.details()? {
                println!("{}", detail.name);
                println!(
                    "  description: {}",
                    detail.description.as_deref().unwrap_or("none")
                );
                match detail.packages {
                    Some(packages) => {
                        println!("  packages: {}", packages.len());
                        if !packages.is_empty() {
                            let more = if packages.len() > 3 { ", ..." } else { "" };
                            let sample = packages.iter().take(3).cloned().collect::<Vec<_>>();
                            println!("  sample: {}{more}", sample.join(", "));
                        }
                    }
                    None => println!("  packages: none declared"),
                }
                println!("  file: {}", detail.path.display());
            }
        }
        PackageProfileCommand::Show(tokens) => {
            let args = tokens.accept(&["name"]);
            let file = profiles.show(args.require("name", PACKAGE_PROFILES_SHOW)?)?;
            print!("{}", file.contents);
        }
        PackageProfileCommand::Add(tokens) => {
            let args = tokens.accept(&["name", "description"]);
            let description = non_empty(args.get("description"));
            profiles.add(
                args.require("name", PACKAGE_PROFILES_ADD)?,
                description.as_deref(),
            )?;
        }
        PackageProfileCommand::Remove(tokens) => {
            let args = tokens.accept(&["name"]);
            profiles.remove(args.require("name", PACKAGE_PROFILES_REMOVE)?)?;
        }
        PackageProfileCommand::Validate(tokens) => {
            let args = tokens.accept(&["name"]);
            let name = args.require("name", PACKAGE_PROFILES_VALIDATE)?;
            let warnings = profiles.validate(name)?;
            info!(
                "package profile {name:?} is valid with {} warnings",
                warnings.len()
            );
        }
    }

    Ok(())
}

fn run_cleanup(workspace: &Workspace, opts: CleanupOptions) -> Result<()> {
    let cleanup = Cleanup::new(workspace);
    let plan = cleanup.plan()?;
    if plan.is_empty() {
        info!("configuration tree is already clean");
        return Ok(());
    }

    for target in &plan.targets {
        println!("{} in {}:", target.description, target.dir.display());
        if target.remove.is_empty() {
            println!("  nothing to remove");
        }
        for path in &target.remove {
            println!("  {}", path.display());
        }
    }
    if !plan.hosts.is_empty() {
        println!("hosts in registry:");
        for host in &plan.hosts {
            println!("  {host}");
        }
    }

    if !opts.force {
        let proceed = Confirm::new("Remove everything listed above? This cannot be undone.")
            .with_default(false)
            .prompt()?;
        if !proceed {
            info!("cleanup aborted");
            return Ok(());
        }
    }

    let report = cleanup.execute(&plan)?;
    info!(
        "cleanup removed {} entries and {} hosts",
        report.removed,
        report.hosts.len()
    );

    Ok(())
}

fn print_names(what: &str, names: Vec<String>) {
    if names.is_empty() {
        println!("no {what} found");
    }

    for name in names {
        println!("{name}");
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join(", ")
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|value| !value.is_empty()).map(Into::into)
}
