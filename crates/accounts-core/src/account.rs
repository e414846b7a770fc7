//! The account read-model and its partial (all-optional) counterpart.
//!
//! `Account` is the fully materialized projection record. `PartialAccount`
//! carries the same fields as explicit optionals and doubles as a match
//! filter, an update delta and the register payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate type tag stamped on every account event.
pub const AGGREGATE_ID: i8 = 1;

/// A fully materialized account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Globally unique account identifier, always encoded as a string.
    #[serde(rename = "userID")]
    pub account_id: Uuid,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Given name.
    #[serde(rename = "firstName", alias = "first_name", default)]
    pub first_name: String,
    /// Family name.
    #[serde(rename = "lastName", alias = "last_name", default)]
    pub last_name: String,
    /// Globally unique login name.
    #[serde(rename = "userName", alias = "username", default)]
    pub user_name: String,
    /// Password hash.
    #[serde(default)]
    pub password: String,
    /// Authorization role.
    #[serde(alias = "roles", default)]
    pub role: String,
}

impl Account {
    /// Returns a copy with every mutable field supplied in `delta` overwritten.
    ///
    /// Account ID and user name are never taken from the delta.
    #[must_use]
    pub fn patched(&self, delta: &PartialAccount) -> Self {
        let mut merged = self.clone();
        let overwrite = |field: &mut String, value: &Option<String>| {
            if let Some(value) = value {
                field.clone_from(value);
            }
        };
        overwrite(&mut merged.email, &delta.email);
        overwrite(&mut merged.first_name, &delta.first_name);
        overwrite(&mut merged.last_name, &delta.last_name);
        overwrite(&mut merged.password, &delta.password);
        overwrite(&mut merged.role, &delta.role);
        merged
    }
}

/// An account with every field optional. `None` means "not supplied".
///
/// Unknown keys are rejected: as a filter, a dropped key would widen the
/// match to every account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialAccount {
    /// Account identifier in its string form; parsed on use.
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Given name.
    #[serde(
        rename = "firstName",
        alias = "first_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(
        rename = "lastName",
        alias = "last_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_name: Option<String>,
    /// Login name.
    #[serde(
        rename = "userName",
        alias = "username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_name: Option<String>,
    /// Password (plaintext on the way in, hash once it reaches an event).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Authorization role.
    #[serde(alias = "roles", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl PartialAccount {
    /// A filter selecting the account with the given identifier.
    #[must_use]
    pub fn by_account_id(account_id: Uuid) -> Self {
        Self {
            account_id: Some(account_id.to_string()),
            ..Self::default()
        }
    }

    /// A filter selecting the account with the given user name.
    #[must_use]
    pub fn by_user_name(user_name: impl Into<String>) -> Self {
        Self {
            user_name: Some(user_name.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if no field is supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parses the supplied account ID. `None` if absent, `Some(Err)` if it is
    /// not a valid UUID.
    #[must_use]
    pub fn parsed_account_id(&self) -> Option<Result<Uuid, uuid::Error>> {
        self.account_id.as_deref().map(Uuid::parse_str)
    }

    /// Returns `true` if every supplied field equals the account's field.
    /// An empty filter matches every account.
    #[must_use]
    pub fn matches(&self, account: &Account) -> bool {
        let id_matches = match self.parsed_account_id() {
            None => true,
            Some(Ok(id)) => id == account.account_id,
            Some(Err(_)) => false,
        };
        let eq = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().is_none_or(|wanted| wanted == actual)
        };
        id_matches
            && eq(&self.email, &account.email)
            && eq(&self.first_name, &account.first_name)
            && eq(&self.last_name, &account.last_name)
            && eq(&self.user_name, &account.user_name)
            && eq(&self.password, &account.password)
            && eq(&self.role, &account.role)
    }
}

/// Returns `true` if the value is absent or contains only whitespace.
#[must_use]
pub fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
