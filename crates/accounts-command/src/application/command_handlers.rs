//! Command handlers for the account aggregate.
//!
//! Each handler validates a command against the projection and, on success,
//! returns the acknowledgement payload together with the event to publish.
//! Only registration writes to the projection directly (to reserve the
//! account); updates and deletes reach it when their events are replayed.

use std::sync::Arc;

use accounts_core::account::{Account, PartialAccount, is_blank};
use accounts_core::clock::Clock;
use accounts_core::error::DomainError;
use accounts_core::message::{Command, Event};
use accounts_core::password::PasswordHasher;
use accounts_core::store::{AccountFilter, ProjectionStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::domain::commands::UpdateParams;
use crate::domain::events::{
    DeleteResult, USER_DELETED, USER_REGISTERED, USER_UPDATED, UpdateResult, UserUpdated,
};

/// Shared dependencies of every handler.
#[derive(Clone)]
pub struct CommandContext {
    /// The account projection.
    pub store: Arc<dyn ProjectionStore>,
    /// Hashes passwords before they are stored or emitted.
    pub hasher: Arc<dyn PasswordHasher>,
    /// Stamps events.
    pub clock: Arc<dyn Clock>,
    /// Written to the `source` field of events and acknowledgements.
    pub service_name: String,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

/// What a successful handler produces.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Acknowledgement payload.
    pub result: Vec<u8>,
    /// Event to publish.
    pub event: Event,
    /// Account written to the projection ahead of its event. Must be
    /// released if the event cannot be enqueued.
    pub reserved: Option<Uuid>,
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, DomainError> {
    serde_json::from_slice(data).map_err(|e| DomainError::Decode(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DomainError> {
    serde_json::to_vec(value)
        .map_err(|e| DomainError::Infrastructure(format!("result serialization failed: {e}")))
}

fn event_for(command: &Command, ctx: &CommandContext, action: &str, data: Vec<u8>) -> Event {
    Event::new(
        action,
        command.uuid,
        data,
        &ctx.service_name,
        ctx.clock.now(),
    )
}

/// Runs the hasher off the async executor; bcrypt is CPU-bound.
async fn hash_password(ctx: &CommandContext, plaintext: String) -> Result<String, DomainError> {
    let hasher = Arc::clone(&ctx.hasher);
    tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
        .await
        .map_err(|e| DomainError::Infrastructure(format!("hashing task failed: {e}")))?
}

fn require(value: Option<&str>, field: &str) -> Result<String, DomainError> {
    match value {
        Some(v) if !is_blank(Some(v)) => Ok(v.to_owned()),
        _ => Err(DomainError::Validation(format!("missing {field} for user"))),
    }
}

/// Handles `RegisterUser`: validates the new account, checks that neither
/// its ID nor its user name is taken, hashes the password and reserves the
/// account in the projection.
///
/// # Errors
///
/// Returns `DomainError::Decode` for a malformed payload,
/// `DomainError::Validation` for a bad ID or a missing field,
/// `DomainError::AlreadyExists` if the ID or user name is taken, and
/// `DomainError::Infrastructure` for store or hashing faults.
pub async fn handle_register_user(
    command: &Command,
    ctx: &CommandContext,
) -> Result<CommandOutcome, DomainError> {
    let input: PartialAccount = decode(&command.data)?;

    let account_id = if is_blank(input.account_id.as_deref()) {
        Uuid::new_v4()
    } else {
        input
            .parsed_account_id()
            .transpose()
            .map_err(|e| DomainError::Validation(format!("invalid userID: {e}")))?
            .unwrap_or_else(Uuid::new_v4)
    };

    let first_name = require(input.first_name.as_deref(), "FirstName")?;
    let email = require(input.email.as_deref(), "Email")?;
    let user_name = require(input.user_name.as_deref(), "UserName")?;
    let password = require(input.password.as_deref(), "Password")?;
    let role = require(input.role.as_deref(), "Role")?;

    let taken = AccountFilter::AnyOf(vec![
        PartialAccount::by_account_id(account_id),
        PartialAccount::by_user_name(user_name.clone()),
    ]);
    if ctx.store.find_one(&taken).await?.is_some() {
        return Err(DomainError::AlreadyExists);
    }

    let account = Account {
        account_id,
        email,
        first_name,
        last_name: input.last_name.unwrap_or_default(),
        user_name,
        password: hash_password(ctx, password).await?,
        role,
    };
    let data = encode(&account)?;

    // A concurrent registration may have won since the lookup above.
    ctx.store.insert_one(&account).await?;
    debug!(account_id = %account.account_id, "reserved account");

    let event = event_for(command, ctx, USER_REGISTERED, data.clone());
    Ok(CommandOutcome {
        result: data,
        event,
        reserved: Some(account.account_id),
    })
}

fn validate_update(params: UpdateParams) -> Result<(PartialAccount, PartialAccount), DomainError> {
    let Some(filter) = params.filter else {
        return Err(DomainError::Validation("nil filter provided".into()));
    };
    let Some(mut update) = params.update else {
        return Err(DomainError::Validation("nil update provided".into()));
    };
    if !is_blank(update.account_id.as_deref()) {
        return Err(DomainError::Immutable("userID"));
    }
    if !is_blank(update.user_name.as_deref()) {
        return Err(DomainError::Immutable("username"));
    }
    if update.password.is_some() && is_blank(update.password.as_deref()) {
        return Err(DomainError::Validation("found blank password".into()));
    }
    update.account_id = None;
    update.user_name = None;
    Ok((filter, update))
}

/// Handles `UpdateUser`: overwrites every supplied field of the first
/// account matching the filter. The acknowledgement carries the merged
/// account; the event carries only the delta.
///
/// # Errors
///
/// Returns `DomainError::Decode` for a malformed payload,
/// `DomainError::Validation`/`DomainError::Immutable` for a rejected
/// update, `DomainError::NotFound` if nothing matches, and
/// `DomainError::Infrastructure` for store or hashing faults.
pub async fn handle_update_user(
    command: &Command,
    ctx: &CommandContext,
) -> Result<CommandOutcome, DomainError> {
    let params: UpdateParams = decode(&command.data)?;
    let (filter, mut delta) = validate_update(params)?;

    let matched = ctx
        .store
        .find_one(&AccountFilter::Match(filter.clone()))
        .await?
        .ok_or(DomainError::NotFound)?;

    if let Some(plaintext) = delta.password.take() {
        delta.password = Some(hash_password(ctx, plaintext).await?);
    }

    let merged = matched.patched(&delta);
    let result = encode(&UpdateResult {
        filter: filter.clone(),
        update: merged,
    })?;
    let data = encode(&UserUpdated {
        filter,
        update: delta,
    })?;

    Ok(CommandOutcome {
        result,
        event: event_for(command, ctx, USER_UPDATED, data),
        reserved: None,
    })
}

/// Handles `DeleteUser`: counts the accounts matching the filter and emits
/// a deletion event carrying the filter unchanged.
///
/// # Errors
///
/// Returns `DomainError::Decode` for a malformed payload,
/// `DomainError::NotFound` if nothing matches, and
/// `DomainError::Infrastructure` for store faults.
pub async fn handle_delete_user(
    command: &Command,
    ctx: &CommandContext,
) -> Result<CommandOutcome, DomainError> {
    let filter: PartialAccount = decode(&command.data)?;

    let matched = ctx.store.find(&AccountFilter::Match(filter)).await?;
    if matched.is_empty() {
        return Err(DomainError::NotFound);
    }

    let result = encode(&DeleteResult {
        matched_count: matched.len() as u64,
    })?;

    Ok(CommandOutcome {
        result,
        event: event_for(command, ctx, USER_DELETED, command.data.clone()),
        reserved: None,
    })
}
