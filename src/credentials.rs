//! Bearer-token discovery.
//!
//! Tokens are looked up in order: `GITHUB_TOKEN`, `GH_TOKEN`, then
//! `gh auth token` if the GitHub CLI is installed and logged in.

use std::process::Command;

use crate::error::{Result, SquashError};

/// Environment variables checked for a token, in priority order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

const TOKEN_INSTRUCTIONS: &str = "\
Provide a token in one of these ways:
  1. export GITHUB_TOKEN=<token>
  2. run `gh auth login` so `gh auth token` can supply one
  3. create a classic personal access token with the `repo` scope at
     https://github.com/settings/tokens and export it as GITHUB_TOKEN";

/// Resolve a bearer token from the environment or the GitHub CLI.
pub fn resolve_token() -> Result<String> {
    resolve_token_with(|name| std::env::var(name).ok(), gh_auth_token)
}

/// Token resolution with injectable lookups.
pub(crate) fn resolve_token_with(
    env: impl Fn(&str) -> Option<String>,
    gh: impl FnOnce() -> Option<String>,
) -> Result<String> {
    for name in TOKEN_ENV_VARS {
        if let Some(token) = env(name).map(|t| t.trim().to_string())
            && !token.is_empty()
        {
            tracing::debug!(source = name, "using token from environment");
            return Ok(token);
        }
    }

    if let Some(token) = gh().map(|t| t.trim().to_string())
        && !token.is_empty()
    {
        tracing::debug!(source = "gh", "using token from GitHub CLI");
        return Ok(token);
    }

    Err(SquashError::MissingCredentials {
        instructions: TOKEN_INSTRUCTIONS.into(),
    })
}

fn gh_auth_token() -> Option<String> {
    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}
