//! Optimistic reconciliation of local drags against the canonical list.
//!
//! A drag is applied to the local board at once. A cross-column drag also
//! starts one status update call in the background; its completion comes
//! back through [`BoardReconciler::next_event`]. A failed call rolls the
//! task back to where it was picked up, but only while that move is still
//! the task's latest and no canonical rebuild has happened since; once the
//! server's list has been re-applied it wins.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use workpulse_proto::task::{Task, TaskId, TaskStatus};

use super::state::{BoardState, DragLocation, MoveOutcome, TaskScope};
use super::BoardError;
use crate::api::{ApiError, StatusUpdater};

/// Outcome of a background status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// The server accepted the new status.
    StatusUpdated {
        /// Moved task.
        task_id: TaskId,
        /// Persisted status.
        status: TaskStatus,
    },
    /// The server rejected the new status, or could not be reached.
    StatusUpdateFailed {
        /// Moved task.
        task_id: TaskId,
        /// Status that failed to persist.
        status: TaskStatus,
        /// Error text for display.
        error: String,
        /// Whether the task was returned to its pre-move slot.
        rolled_back: bool,
    },
}

/// A cross-column move whose call has not completed, still eligible for
/// rollback.
#[derive(Debug, Clone, Copy)]
struct PendingMove {
    ticket: u64,
    origin: DragLocation,
}

struct Completion {
    task_id: TaskId,
    status: TaskStatus,
    ticket: u64,
    result: Result<(), ApiError>,
}

/// Owns one board and reconciles it with the server.
pub struct BoardReconciler<U> {
    board: BoardState,
    scope: TaskScope,
    updater: Arc<U>,
    next_ticket: u64,
    pending: HashMap<TaskId, PendingMove>,
    in_flight: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<U: StatusUpdater> BoardReconciler<U> {
    /// Create an empty board that persists status changes through `updater`.
    #[must_use]
    pub fn new(updater: Arc<U>, scope: TaskScope) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            board: BoardState::default(),
            scope,
            updater,
            next_ticket: 0,
            pending: HashMap::new(),
            in_flight: 0,
            completions_tx,
            completions_rx,
        }
    }

    /// The board as currently shown.
    #[must_use]
    pub const fn board(&self) -> &BoardState {
        &self.board
    }

    /// Which tasks this board shows.
    #[must_use]
    pub const fn scope(&self) -> TaskScope {
        self.scope
    }

    /// Status update calls that have not completed yet.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Rebuild the board from a fresh canonical list.
    ///
    /// Local moves not yet reflected by the server are discarded, and no
    /// earlier move remains eligible for rollback.
    pub fn replace_canonical(&mut self, tasks: &[Task]) {
        let scope = self.scope;
        self.board = BoardState::from_tasks(tasks.iter().filter(|t| scope.matches(t)));
        self.pending.clear();
        tracing::debug!(tasks = self.board.len(), ?scope, "board rebuilt from canonical list");
    }

    /// Apply a drag locally; persist it if it changed the task's status.
    ///
    /// # Errors
    ///
    /// [`BoardError::ColumnIndexOutOfRange`] if `source` names no task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn drag(
        &mut self,
        source: DragLocation,
        destination: Option<DragLocation>,
    ) -> Result<MoveOutcome, BoardError> {
        let outcome = self.board.apply_move(source, destination)?;

        if let MoveOutcome::StatusChanged { task_id, from, to } = outcome {
            self.next_ticket += 1;
            let ticket = self.next_ticket;
            self.pending.insert(
                task_id,
                PendingMove {
                    ticket,
                    origin: source,
                },
            );
            self.in_flight += 1;
            tracing::info!(task = %task_id, %from, %to, "task moved, persisting status");

            let updater = Arc::clone(&self.updater);
            let tx = self.completions_tx.clone();
            tokio::spawn(async move {
                let result = updater.update_status(task_id, to).await;
                // The reconciler may already be gone; nothing to report to.
                let _ = tx.send(Completion {
                    task_id,
                    status: to,
                    ticket,
                    result,
                });
            });
        }
        Ok(outcome)
    }

    /// Wait for the next status update to complete and apply its outcome.
    ///
    /// Returns `None` when no call is in flight.
    pub async fn next_event(&mut self) -> Option<BoardEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.settle(completion))
    }

    /// Apply the outcome of an already completed status update, if any.
    pub fn try_next_event(&mut self) -> Option<BoardEvent> {
        let completion = self.completions_rx.try_recv().ok()?;
        Some(self.settle(completion))
    }

    fn settle(&mut self, completion: Completion) -> BoardEvent {
        let Completion {
            task_id,
            status,
            ticket,
            result,
        } = completion;
        self.in_flight = self.in_flight.saturating_sub(1);

        let latest = self
            .pending
            .get(&task_id)
            .is_some_and(|p| p.ticket == ticket);
        let origin = if latest {
            self.pending.remove(&task_id).map(|p| p.origin)
        } else {
            None
        };

        match result {
            Ok(()) => BoardEvent::StatusUpdated { task_id, status },
            Err(e) => {
                let rolled_back = origin.is_some_and(|origin| self.roll_back(task_id, origin));
                tracing::warn!(task = %task_id, %status, err = %e, rolled_back, "status update failed");
                BoardEvent::StatusUpdateFailed {
                    task_id,
                    status,
                    error: e.to_string(),
                    rolled_back,
                }
            }
        }
    }

    fn roll_back(&mut self, task_id: TaskId, origin: DragLocation) -> bool {
        let Some(mut task) = self.board.take(task_id) else {
            return false;
        };
        task.status = origin.status;
        self.board.place(origin, task);
        true
    }
}
