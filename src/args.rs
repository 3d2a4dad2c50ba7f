// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Command argument tokens.
//!
//! Commands take their arguments as `key=value` tokens, e.g.,
//! `nixcfg hosts add name=web1 profiles=common,web`. The value is everything
//! after the first `=`, so values may contain `=` themselves. List values are
//! comma separated, with empty items dropped.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::warn;

/// Single `key=value` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
}

impl FromStr for Assignment {
    type Err = ArgsError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| ArgsError::NotAssignment {
                token: token.into(),
            })?;

        if key.is_empty() {
            return Err(ArgsError::NotAssignment {
                token: token.into(),
            });
        }

        Ok(Self {
            key: key.into(),
            value: value.into(),
        })
    }
}

impl Display for Assignment {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}={}", self.key, self.value)
    }
}

/// All tokens given to one command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Assignments {
    tokens: Vec<Assignment>,
}

impl Assignments {
    /// Construct new set of tokens.
    pub fn new(tokens: impl IntoIterator<Item = Assignment>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Value of first token with given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|token| token.key == key)
            .map(|token| token.value.as_str())
    }

    /// Value of first token with given key, which must not be empty.
    ///
    /// # Errors
    ///
    /// - Return [`ArgsError::Missing`] with `usage` if there is no such key.
    pub fn require(&self, key: &str, usage: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ArgsError::Missing {
                key: key.into(),
                usage: usage.into(),
            }),
        }
    }

    /// Comma separated list under given key, if the key was given at all.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Into::into)
                .collect()
        })
    }

    /// Warn about every key not in `known`.
    pub fn warn_unknown(&self, known: &[&str]) {
        for token in &self.tokens {
            if !known.contains(&token.key.as_str()) {
                warn!("ignoring unknown argument {:?}", token.key);
            }
        }
    }
}

impl FromIterator<Assignment> for Assignments {
    fn from_iter<I: IntoIterator<Item = Assignment>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Argument error types.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    /// Token has no `=`, or nothing in front of it.
    #[error("expected key=value, found {token:?}")]
    NotAssignment { token: String },

    /// Required key was not given.
    #[error("missing required argument {key:?}\n\nUsage: {usage}")]
    Missing { key: String, usage: String },
}

/// Friendly result alias :3
pub type Result<T, E = ArgsError> = std::result::Result<T, E>;
