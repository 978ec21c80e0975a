//! Pure board state: tasks partitioned into status columns.

use workpulse_proto::task::{Task, TaskId, TaskStatus, UserId};

use super::BoardError;

/// A slot on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragLocation {
    /// Column.
    pub status: TaskStatus,
    /// Index within the column.
    pub index: usize,
}

impl DragLocation {
    /// Slot `index` of column `status`.
    #[must_use]
    pub const fn new(status: TaskStatus, index: usize) -> Self {
        Self { status, index }
    }
}

/// Result of applying a drag to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Dropped outside any column or onto its own slot.
    Unchanged,
    /// Moved within its column; nothing to persist.
    Reordered {
        /// Moved task.
        task_id: TaskId,
    },
    /// Moved to another column; the new status must be persisted.
    StatusChanged {
        /// Moved task.
        task_id: TaskId,
        /// Column it left.
        from: TaskStatus,
        /// Column it entered.
        to: TaskStatus,
    },
}

/// Which tasks a board shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskScope {
    /// Every task in the canonical list.
    #[default]
    All,
    /// Tasks assigned to the user ("My Tasks").
    AssignedTo(UserId),
    /// Tasks the user assigned to others.
    AssignedBy(UserId),
}

impl TaskScope {
    /// Whether `task` belongs on a board with this scope.
    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::AssignedTo(user) => task.assigned_to_id == Some(user),
            Self::AssignedBy(user) => task.assigned_by_id == user,
        }
    }
}

/// Three ordered columns, one per [`TaskStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    columns: [Vec<Task>; 3],
}

impl BoardState {
    /// Partition `tasks` by status, keeping their relative order.
    #[must_use]
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut board = Self::default();
        for task in tasks {
            board.columns[task.status.index()].push(task.clone());
        }
        board
    }

    /// Tasks in column `status`, top to bottom.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> &[Task] {
        &self.columns[status.index()]
    }

    /// Total number of tasks on the board.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// Whether the board has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// Where task `id` currently sits.
    #[must_use]
    pub fn position(&self, id: TaskId) -> Option<DragLocation> {
        TaskStatus::ALL.into_iter().find_map(|status| {
            self.column(status)
                .iter()
                .position(|t| t.id == id)
                .map(|index| DragLocation::new(status, index))
        })
    }

    /// Apply a drag from `source` to `destination`.
    ///
    /// A destination index past the end of the column appends.
    ///
    /// # Errors
    ///
    /// [`BoardError::ColumnIndexOutOfRange`] if `source` names no task; the
    /// board is left unchanged.
    pub fn apply_move(
        &mut self,
        source: DragLocation,
        destination: Option<DragLocation>,
    ) -> Result<MoveOutcome, BoardError> {
        let Some(destination) = destination else {
            return Ok(MoveOutcome::Unchanged);
        };
        if source == destination {
            return Ok(MoveOutcome::Unchanged);
        }

        let column = &mut self.columns[source.status.index()];
        if source.index >= column.len() {
            return Err(BoardError::ColumnIndexOutOfRange {
                status: source.status,
                index: source.index,
                len: column.len(),
            });
        }
        let mut task = column.remove(source.index);
        let task_id = task.id;

        if source.status == destination.status {
            let at = destination.index.min(column.len());
            column.insert(at, task);
            return Ok(MoveOutcome::Reordered { task_id });
        }

        task.status = destination.status;
        self.place(destination, task);
        Ok(MoveOutcome::StatusChanged {
            task_id,
            from: source.status,
            to: destination.status,
        })
    }

    /// Take task `id` off the board, wherever it is.
    pub(super) fn take(&mut self, id: TaskId) -> Option<Task> {
        let at = self.position(id)?;
        Some(self.columns[at.status.index()].remove(at.index))
    }

    /// Insert `task` at `at`, clamping the index to the column length.
    pub(super) fn place(&mut self, at: DragLocation, task: Task) {
        let column = &mut self.columns[at.status.index()];
        let index = at.index.min(column.len());
        column.insert(index, task);
    }
}
