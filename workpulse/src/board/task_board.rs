//! A task board screen: a task list view plus its reconciler.

use std::sync::Arc;

use tokio::sync::watch;
use workpulse_proto::task::Task;

use super::reconciler::{BoardEvent, BoardReconciler};
use super::state::{BoardState, DragLocation, MoveOutcome, TaskScope};
use super::BoardError;
use crate::api::StatusUpdater;
use crate::bus::{Domain, UpdateBus};
use crate::view::{DataView, Fetch, ViewState};

/// Task list view wired to a [`BoardReconciler`].
///
/// Every snapshot the view applies is fed to
/// [`BoardReconciler::replace_canonical`] by [`TaskBoard::sync`].
pub struct TaskBoard<F, U> {
    view: DataView<Task, F>,
    reconciler: BoardReconciler<U>,
    watch: watch::Receiver<ViewState<Task>>,
    seen_revision: u64,
}

impl<F, U> TaskBoard<F, U>
where
    F: Fetch<Task>,
    U: StatusUpdater,
{
    /// Mount the task list view and build the board from its first
    /// snapshot.
    pub async fn mount(bus: &Arc<UpdateBus>, fetcher: F, updater: Arc<U>, scope: TaskScope) -> Self {
        let view = DataView::mount("tasks", bus, &[Domain::Tasks], fetcher).await;
        let watch = view.watch();
        let mut board = Self {
            view,
            reconciler: BoardReconciler::new(updater, scope),
            watch,
            seen_revision: 0,
        };
        board.sync();
        board
    }

    /// Rebuild the board if the view applied a new snapshot since the last
    /// call. Returns whether it did.
    pub fn sync(&mut self) -> bool {
        let records = {
            let state = self.watch.borrow_and_update();
            if state.revision == self.seen_revision {
                return false;
            }
            self.seen_revision = state.revision;
            Arc::clone(&state.records)
        };
        self.reconciler.replace_canonical(&records);
        true
    }

    /// Wait for the view to change, then [`TaskBoard::sync`].
    ///
    /// Returns `false` if the view can no longer change.
    pub async fn changed(&mut self) -> bool {
        if self.watch.changed().await.is_err() {
            return false;
        }
        self.sync();
        true
    }

    /// See [`BoardReconciler::drag`].
    ///
    /// # Errors
    ///
    /// [`BoardError::ColumnIndexOutOfRange`] if `source` names no task.
    pub fn drag(
        &mut self,
        source: DragLocation,
        destination: Option<DragLocation>,
    ) -> Result<MoveOutcome, BoardError> {
        self.reconciler.drag(source, destination)
    }

    /// See [`BoardReconciler::next_event`].
    pub async fn next_event(&mut self) -> Option<BoardEvent> {
        self.reconciler.next_event().await
    }

    /// Refetch the task list now.
    pub async fn refresh(&mut self) {
        self.view.refresh().await;
        self.sync();
    }

    /// The board as currently shown.
    #[must_use]
    pub const fn board(&self) -> &BoardState {
        self.reconciler.board()
    }

    /// The underlying reconciler.
    pub const fn reconciler_mut(&mut self) -> &mut BoardReconciler<U> {
        &mut self.reconciler
    }

    /// Receiver notified whenever the task list view changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewState<Task>> {
        self.view.watch()
    }

    /// Fetch notice of the task list view, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        self.view.state().notice
    }
}
