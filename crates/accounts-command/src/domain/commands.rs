//! Commands accepted by the account service.

use accounts_core::account::PartialAccount;
use serde::{Deserialize, Serialize};

/// Action name of the register command.
pub const REGISTER_USER: &str = "RegisterUser";
/// Action name of the update command.
pub const UPDATE_USER: &str = "UpdateUser";
/// Action name of the delete command.
pub const DELETE_USER: &str = "DeleteUser";

/// The executors a command can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Create a new account.
    RegisterUser,
    /// Shallow-merge fields into an existing account.
    UpdateUser,
    /// Remove every account matching a filter.
    DeleteUser,
}

impl CommandAction {
    /// Resolves a wire action name. Names are case-sensitive.
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            REGISTER_USER => Some(Self::RegisterUser),
            UPDATE_USER => Some(Self::UpdateUser),
            DELETE_USER => Some(Self::DeleteUser),
            _ => None,
        }
    }

    /// The wire action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegisterUser => REGISTER_USER,
            Self::UpdateUser => UPDATE_USER,
            Self::DeleteUser => DELETE_USER,
        }
    }
}

/// Payload of an `UpdateUser` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParams {
    /// Selects the account to update.
    #[serde(default)]
    pub filter: Option<PartialAccount>,
    /// Fields to overwrite.
    #[serde(default)]
    pub update: Option<PartialAccount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_action() {
        for action in [
            CommandAction::RegisterUser,
            CommandAction::UpdateUser,
            CommandAction::DeleteUser,
        ] {
            assert_eq!(CommandAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(CommandAction::parse("registeruser"), None);
        assert_eq!(CommandAction::parse(""), None);
    }

    #[test]
    fn test_update_params_null_members_decode_as_absent() {
        let params: UpdateParams =
            serde_json::from_str(r#"{"filter":null,"update":{"role":"admin"}}"#).unwrap();

        assert!(params.filter.is_none());
        assert_eq!(
            params.update.and_then(|u| u.role).as_deref(),
            Some("admin")
        );
    }
}
