// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Maintenance of NixOS flake configuration trees.
//!
//! A __configuration tree__ is a flake whose hosts are declared in one
//! registry block of `flake.nix`, next to directories holding per-host
//! configuration, per-user configuration, and reusable profiles:
//!
//! ```text
//! flake.nix
//! hosts/<host>/{default,configuration}.nix
//! users/<user>.nix
//! profiles/users/<profile>.nix
//! profiles/packages/<profile>.nix
//! ```
//!
//! Nixcfg creates, lists, shows, and removes these pieces without ever
//! evaluating Nix. The [`registry`] module holds the text editing protocol
//! that keeps the flake consistent, while everything else is thin file
//! lifecycle management around it.

pub mod args;
pub mod cleanup;
pub mod config;
pub mod hosts;
pub mod path;
pub mod profiles;
pub mod registry;
pub mod store;
pub mod template;
pub mod users;
pub mod workspace;
