use thiserror::Error;

use super::client::ApiError;
use super::store::StateError;
use crate::render::TemplateError;
use crate::vault::VaultError;

/// Errors that end a sync run or a relocation
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl SyncError {
    /// Whether signing in again is the fix
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Api(e) if e.is_auth())
    }

    /// The message shown to the user when a run fails
    pub fn user_message(&self) -> &'static str {
        if self.is_auth() {
            "Unable to sync with Matter, please sign in again."
        } else {
            "There was a problem syncing with Matter, try again later."
        }
    }

    /// What the user can do about a vault failure, if anything
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Vault(e) => e.recovery_suggestion(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_recovery_suggestion() {
        let vault = SyncError::from(VaultError::from_io(
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            "Matter/a.md",
        ));
        assert_eq!(
            vault.recovery_suggestion(),
            Some("Check file and directory permissions of the vault folder.")
        );

        let auth = SyncError::from(ApiError::Auth("expired".to_string()));
        assert!(auth.recovery_suggestion().is_none());
    }

    #[test]
    fn test_user_message() {
        let auth = SyncError::from(ApiError::Auth("expired".to_string()));
        assert!(auth.is_auth());
        assert_eq!(
            auth.user_message(),
            "Unable to sync with Matter, please sign in again."
        );

        let request = SyncError::from(ApiError::Request {
            status: 500,
            body: String::new(),
        });
        assert!(!request.is_auth());
        assert_eq!(
            request.user_message(),
            "There was a problem syncing with Matter, try again later."
        );
    }

    #[test]
    fn test_vault_error_is_transparent() {
        let err = SyncError::from(VaultError::NotFound {
            path: "Matter/a.md".to_string(),
        });
        assert_eq!(
            err.to_string(),
            VaultError::NotFound {
                path: "Matter/a.md".to_string()
            }
            .to_string()
        );
    }
}
