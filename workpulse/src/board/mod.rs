//! Task board with optimistic drag-and-drop.
//!
//! [`state::BoardState`] is the pure column model. The
//! [`reconciler::BoardReconciler`] applies drags to it immediately, issues
//! the status update call for cross-column moves, and rebuilds the board
//! wholesale whenever a fresh canonical task list arrives.
//! [`task_board::TaskBoard`] wires a reconciler to a task list data view.

pub mod reconciler;
pub mod state;
pub mod task_board;

use workpulse_proto::task::TaskStatus;

pub use reconciler::{BoardEvent, BoardReconciler};
pub use state::{BoardState, DragLocation, MoveOutcome, TaskScope};
pub use task_board::TaskBoard;

/// Errors from board operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// A drag started from a slot that holds no task.
    #[error("no task at {status}[{index}] (column has {len})")]
    ColumnIndexOutOfRange {
        /// Column of the source slot.
        status: TaskStatus,
        /// Requested index.
        index: usize,
        /// Column length.
        len: usize,
    },
}
