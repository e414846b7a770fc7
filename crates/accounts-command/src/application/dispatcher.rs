//! Routes a decoded command to its handler and the outcome to the lanes.

use std::time::Duration;

use accounts_core::account::PartialAccount;
use accounts_core::error::{DomainError, ErrorKind};
use accounts_core::message::{Command, Document, Event};
use accounts_core::store::AccountFilter;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::application::command_handlers::{
    CommandContext, CommandOutcome, handle_delete_user, handle_register_user, handle_update_user,
};
use crate::application::projection_rebuilder::ProjectionRebuilder;
use crate::domain::commands::CommandAction;

/// An output lane stopped accepting items.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The event lane has shut down.
    #[error("event lane closed")]
    EventLaneClosed,
    /// The acknowledgement lane has shut down.
    #[error("acknowledgement lane closed")]
    AckLaneClosed,
}

/// Runs one command end to end: catch-up, execution, output.
pub struct CommandDispatcher {
    context: CommandContext,
    rebuilder: ProjectionRebuilder,
    rebuild_timeout: Duration,
    events: mpsc::Sender<Event>,
    results: mpsc::Sender<Document>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("context", &self.context)
            .field("rebuild_timeout", &self.rebuild_timeout)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Creates a dispatcher feeding the given lanes.
    #[must_use]
    pub fn new(
        context: CommandContext,
        rebuilder: ProjectionRebuilder,
        rebuild_timeout: Duration,
        events: mpsc::Sender<Event>,
        results: mpsc::Sender<Document>,
    ) -> Self {
        Self {
            context,
            rebuilder,
            rebuild_timeout,
            events,
            results,
        }
    }

    /// The projection rebuilder run before every command.
    #[must_use]
    pub fn rebuilder(&self) -> &ProjectionRebuilder {
        &self.rebuilder
    }

    /// Catches the projection up, executes `command`, and enqueues its
    /// event (on success) and exactly one acknowledgement. Waits while a
    /// lane is full.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` if a lane has shut down.
    #[instrument(
        skip(self, command),
        fields(command_id = %command.uuid, action = %command.action)
    )]
    pub async fn dispatch(&self, command: Command) -> Result<(), DispatchError> {
        if let Err(e) = self.rebuilder.rebuild(self.rebuild_timeout).await {
            warn!(error = %e, "projection rebuild failed, using current projection");
        }

        let source = &self.context.service_name;
        let document = match self.execute(&command).await {
            Ok(CommandOutcome {
                result,
                event,
                reserved,
            }) => {
                if self.events.send(event).await.is_err() {
                    if let Some(account_id) = reserved {
                        self.release(account_id).await;
                    }
                    return Err(DispatchError::EventLaneClosed);
                }
                info!("command accepted");
                Document::success(&command, source, result)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::User => info!(error = %e, "command rejected"),
                    ErrorKind::Internal => warn!(error = %e, "command failed"),
                }
                Document::failure(&command, source, &e)
            }
        };

        self.results
            .send(document)
            .await
            .map_err(|_| DispatchError::AckLaneClosed)
    }

    /// Drops a reservation whose event never reached the event lane, so the
    /// projection holds no account the log does not.
    async fn release(&self, account_id: Uuid) {
        let filter = AccountFilter::Match(PartialAccount::by_account_id(account_id));
        match self.context.store.delete_many(&filter).await {
            Ok(_) => info!(%account_id, "released unpublished reservation"),
            Err(e) => error!(%account_id, error = %e, "failed to release reservation"),
        }
    }

    async fn execute(&self, command: &Command) -> Result<CommandOutcome, DomainError> {
        match CommandAction::parse(&command.action) {
            Some(CommandAction::RegisterUser) => handle_register_user(command, &self.context).await,
            Some(CommandAction::UpdateUser) => handle_update_user(command, &self.context).await,
            Some(CommandAction::DeleteUser) => handle_delete_user(command, &self.context).await,
            None => Err(DomainError::Validation(format!(
                "unregistered action: {}",
                command.action
            ))),
        }
    }
}
