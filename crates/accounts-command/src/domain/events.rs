//! Domain events for the account aggregate.

use accounts_core::account::{Account, PartialAccount};
use accounts_core::error::DomainError;
use accounts_core::message::Event;
use serde::{Deserialize, Serialize};

use crate::domain::commands::UpdateParams;

/// Emitted when an account is registered. Shares its name with the command.
pub const USER_REGISTERED: &str = "RegisterUser";
/// Older name for `USER_REGISTERED`, still present in the log.
pub const LEGACY_USER_REGISTERED: &str = "UserRegistered";
/// Emitted when account fields are overwritten.
pub const USER_UPDATED: &str = "UserUpdated";
/// Emitted when accounts are removed.
pub const USER_DELETED: &str = "UserDeleted";

/// Payload of a `UserUpdated` event: the filter and the delta actually applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdated {
    /// Selects the accounts the delta applies to.
    pub filter: PartialAccount,
    /// Fields to overwrite. A supplied password is already hashed.
    pub update: PartialAccount,
}

/// Acknowledgement payload of an update: the filter and the merged account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// The filter from the command.
    pub filter: PartialAccount,
    /// The matched account with the delta applied.
    pub update: Account,
}

/// Acknowledgement payload of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Number of accounts the filter matched.
    #[serde(rename = "matchedCount")]
    pub matched_count: u64,
}

/// Decoded payload of an account event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEventKind {
    /// A new account, password already hashed.
    Registered(Account),
    /// A delta to apply to every account matching the filter.
    Updated(UserUpdated),
    /// Removes every account matching the filter.
    Deleted(PartialAccount),
}

impl AccountEventKind {
    /// Decodes the payload of `event`. Returns `Ok(None)` for actions this
    /// service does not project.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Decode` if the payload does not match the
    /// action, or `DomainError::Validation` if an update event lacks its
    /// filter or delta.
    pub fn decode(event: &Event) -> Result<Option<Self>, DomainError> {
        let decode_err = |e: serde_json::Error| {
            DomainError::Decode(format!("{} event {}: {e}", event.action, event.uuid))
        };
        let kind = match event.action.as_str() {
            USER_REGISTERED | LEGACY_USER_REGISTERED => {
                Self::Registered(serde_json::from_slice(&event.data).map_err(decode_err)?)
            }
            USER_UPDATED => {
                let params: UpdateParams =
                    serde_json::from_slice(&event.data).map_err(decode_err)?;
                let (Some(filter), Some(update)) = (params.filter, params.update) else {
                    return Err(DomainError::Validation(format!(
                        "update event {} is missing its filter or delta",
                        event.uuid
                    )));
                };
                Self::Updated(UserUpdated { filter, update })
            }
            USER_DELETED => {
                Self::Deleted(serde_json::from_slice(&event.data).map_err(decode_err)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn event(action: &str, data: &[u8]) -> Event {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Event::new(action, Uuid::new_v4(), data.to_vec(), "test", now)
    }

    #[test]
    fn test_decode_accepts_legacy_registration_name() {
        let id = Uuid::new_v4();
        let data = format!(r#"{{"userID":"{id}","userName":"ada","password":"$2b$04$x"}}"#);

        let kind = AccountEventKind::decode(&event(LEGACY_USER_REGISTERED, data.as_bytes()))
            .unwrap()
            .unwrap();

        match kind {
            AccountEventKind::Registered(account) => {
                assert_eq!(account.account_id, id);
                assert_eq!(account.user_name, "ada");
            }
            other => panic!("expected Registered, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_update_without_filter_is_rejected() {
        let result =
            AccountEventKind::decode(&event(USER_UPDATED, br#"{"update":{"role":"admin"}}"#));

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_decode_unknown_action_is_skipped() {
        let result = AccountEventKind::decode(&event("UserRenamed", b"{}")).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_decode_malformed_payload_is_a_decode_error() {
        let result = AccountEventKind::decode(&event(USER_DELETED, b"not json"));

        assert!(matches!(result, Err(DomainError::Decode(_))));
    }

    #[test]
    fn test_delete_result_wire_shape() {
        let json = serde_json::to_string(&DeleteResult { matched_count: 3 }).unwrap();

        assert_eq!(json, r#"{"matchedCount":3}"#);
    }
}
