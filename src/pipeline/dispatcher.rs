//! Action dispatchers: apply to the local store, or only record.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::DispatchError;
use crate::pipeline::types::ActionDispatcher;
use crate::rules::{Action, PlannedAction, ReadState};
use crate::store::Database;

/// Applies actions to messages in the local store.
///
/// `mark` sets the read flag; `move` adds the label and removes INBOX.
pub struct StoreDispatcher {
    db: Arc<dyn Database>,
}

impl StoreDispatcher {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActionDispatcher for StoreDispatcher {
    fn name(&self) -> &str {
        "store"
    }

    async fn apply(&self, message_id: &str, action: &Action) -> Result<(), DispatchError> {
        match action {
            Action::Mark { state } => {
                self.db
                    .set_read_state(message_id, *state == ReadState::Read)
                    .await?
            }
            Action::Move { label } => self.db.move_to_label(message_id, label).await?,
        }
        debug!(message_id, action = %action, "Applied action");
        Ok(())
    }
}

/// Records actions without touching any message.
#[derive(Default)]
pub struct DryRunDispatcher {
    planned: Mutex<Vec<PlannedAction>>,
}

impl DryRunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions recorded so far, in dispatch order.
    pub async fn planned(&self) -> Vec<PlannedAction> {
        self.planned.lock().await.clone()
    }
}

#[async_trait]
impl ActionDispatcher for DryRunDispatcher {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn apply(&self, message_id: &str, action: &Action) -> Result<(), DispatchError> {
        info!(message_id, action = %action, "Would apply action");
        self.planned.lock().await.push(PlannedAction {
            message_id: message_id.to_string(),
            action: action.clone(),
        });
        Ok(())
    }
}
