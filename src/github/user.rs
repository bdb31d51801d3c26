//! Authenticated-user lookup.

use serde::Deserialize;

use crate::error::{Result, SquashError};
use crate::github::GitHubClient;

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: Option<String>,
}

/// Identity resolution for the token's owner.
pub trait IdentityOps {
    /// Return the login of the account the token belongs to.
    fn authenticated_login(&self) -> Result<String>;
}

impl IdentityOps for GitHubClient {
    fn authenticated_login(&self) -> Result<String> {
        let user: AuthenticatedUser = self.get("/user").map_err(|e| SquashError::Identity {
            message: e.to_string(),
        })?;
        non_empty_login(user.login)
    }
}

fn non_empty_login(login: Option<String>) -> Result<String> {
    match login.map(|l| l.trim().to_string()) {
        Some(login) if !login.is_empty() => Ok(login),
        _ => Err(SquashError::Identity {
            message: "the API returned no login for this token".into(),
        }),
    }
}
