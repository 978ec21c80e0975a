// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Integration tests for optimistic board reconciliation.
//!
//! The task board is mounted over a fake task list endpoint and a
//! recording status updater:
//! - reordering within a column is local only
//! - a cross-column drag issues exactly one status update
//! - the next canonical snapshot wins over local moves
//! - a rejected update moves the task back
//! - a scoped board only shows the user's tasks
//!
//! Verification command: `cargo test --test board_reconcile`

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use workpulse::api::{ApiError, StatusUpdater};
use workpulse::board::{BoardEvent, DragLocation, MoveOutcome, TaskBoard, TaskScope};
use workpulse::bus::{Domain, UpdateBus};
use workpulse::view::{Fetch, fetch_fn};
use workpulse_proto::task::{Priority, Task, TaskId, TaskStatus, UserId};

// =============================================================================
// Test helpers
// =============================================================================

fn task(id: i64, status: TaskStatus, assignee: i64) -> Task {
    Task {
        id: TaskId(id),
        title: format!("T{id}"),
        description: String::new(),
        status,
        priority: Priority::Medium,
        assigned_to_id: Some(UserId(assignee)),
        assigned_by_id: UserId(100),
        due_date: None,
    }
}

type Server = Arc<Mutex<Vec<Task>>>;

fn server(tasks: Vec<Task>) -> Server {
    Arc::new(Mutex::new(tasks))
}

fn task_list(server: &Server) -> impl Fetch<Task> + use<> {
    let server = Arc::clone(server);
    fetch_fn(move || {
        let snapshot = server.lock().clone();
        async move { Ok::<_, ApiError>(snapshot) }
    })
}

/// Records every call; answers with queued replies, then with success.
/// Successful calls are written through to the fake server.
struct RecordingUpdater {
    server: Server,
    calls: Mutex<Vec<(TaskId, TaskStatus)>>,
    replies: Mutex<VecDeque<Result<(), ApiError>>>,
}

impl RecordingUpdater {
    fn new(server: &Server) -> Arc<Self> {
        Arc::new(Self {
            server: Arc::clone(server),
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
        })
    }

    fn reject_next(&self, message: &str) {
        self.replies.lock().push_back(Err(ApiError::Status {
            status: 400,
            message: message.to_string(),
        }));
    }

    fn calls(&self) -> Vec<(TaskId, TaskStatus)> {
        self.calls.lock().clone()
    }
}

impl StatusUpdater for RecordingUpdater {
    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), ApiError> {
        self.calls.lock().push((id, status));
        let reply = self.replies.lock().pop_front().unwrap_or(Ok(()));
        if reply.is_ok() {
            if let Some(t) = self.server.lock().iter_mut().find(|t| t.id == id) {
                t.status = status;
            }
        }
        reply
    }
}

fn column_ids<F, U>(board: &TaskBoard<F, U>, status: TaskStatus) -> Vec<i64>
where
    F: Fetch<Task>,
    U: StatusUpdater,
{
    board.board().column(status).iter().map(|t| t.id.0).collect()
}

async fn next_event<F: Fetch<Task>, U: StatusUpdater>(board: &mut TaskBoard<F, U>) -> BoardEvent {
    tokio::time::timeout(Duration::from_secs(2), board.next_event())
        .await
        .unwrap()
        .unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn reorder_within_column_makes_no_call() {
    let server = server(vec![
        task(1, TaskStatus::Todo, 1),
        task(2, TaskStatus::Todo, 1),
    ]);
    let updater = RecordingUpdater::new(&server);
    let bus = Arc::new(UpdateBus::new());
    let mut board =
        TaskBoard::mount(&bus, task_list(&server), Arc::clone(&updater), TaskScope::All).await;
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![1, 2]);

    let outcome = board
        .drag(
            DragLocation::new(TaskStatus::Todo, 1),
            Some(DragLocation::new(TaskStatus::Todo, 0)),
        )
        .unwrap();

    assert_eq!(outcome, MoveOutcome::Reordered { task_id: TaskId(2) });
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![2, 1]);
    assert!(board.next_event().await.is_none());
    assert!(updater.calls().is_empty());
}

#[tokio::test]
async fn cross_column_drag_issues_one_update() {
    let server = server(vec![
        task(1, TaskStatus::Todo, 1),
        task(2, TaskStatus::Todo, 1),
    ]);
    let updater = RecordingUpdater::new(&server);
    let bus = Arc::new(UpdateBus::new());
    let mut board =
        TaskBoard::mount(&bus, task_list(&server), Arc::clone(&updater), TaskScope::All).await;

    let outcome = board
        .drag(
            DragLocation::new(TaskStatus::Todo, 0),
            Some(DragLocation::new(TaskStatus::InProgress, 0)),
        )
        .unwrap();
    assert_eq!(
        outcome,
        MoveOutcome::StatusChanged {
            task_id: TaskId(1),
            from: TaskStatus::Todo,
            to: TaskStatus::InProgress,
        }
    );
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![2]);
    assert_eq!(column_ids(&board, TaskStatus::InProgress), vec![1]);
    assert_eq!(
        board.board().column(TaskStatus::InProgress)[0].status,
        TaskStatus::InProgress
    );

    assert_eq!(
        next_event(&mut board).await,
        BoardEvent::StatusUpdated {
            task_id: TaskId(1),
            status: TaskStatus::InProgress,
        }
    );
    assert_eq!(updater.calls(), vec![(TaskId(1), TaskStatus::InProgress)]);
}

#[tokio::test]
async fn canonical_snapshot_overrides_local_order() {
    let server = server(vec![
        task(1, TaskStatus::Todo, 1),
        task(2, TaskStatus::Todo, 1),
        task(3, TaskStatus::Completed, 1),
    ]);
    let updater = RecordingUpdater::new(&server);
    let bus = Arc::new(UpdateBus::new());
    let mut board =
        TaskBoard::mount(&bus, task_list(&server), Arc::clone(&updater), TaskScope::All).await;

    board
        .drag(
            DragLocation::new(TaskStatus::Todo, 1),
            Some(DragLocation::new(TaskStatus::Todo, 0)),
        )
        .unwrap();
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![2, 1]);

    // Someone else completes task 2; the hub announces it.
    server.lock()[1].status = TaskStatus::Completed;
    bus.publish_domain_event(Domain::Tasks);
    assert!(tokio::time::timeout(Duration::from_secs(2), board.changed())
        .await
        .unwrap());
    while board.board().column(TaskStatus::Completed).len() < 2 {
        assert!(board.changed().await);
    }

    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![1]);
    assert_eq!(column_ids(&board, TaskStatus::Completed), vec![2, 3]);
    assert!(updater.calls().is_empty());
}

#[tokio::test]
async fn rejected_update_moves_task_back() {
    let server = server(vec![
        task(1, TaskStatus::Todo, 1),
        task(2, TaskStatus::Todo, 1),
        task(3, TaskStatus::InProgress, 1),
    ]);
    let updater = RecordingUpdater::new(&server);
    updater.reject_next("Task is locked");
    let bus = Arc::new(UpdateBus::new());
    let mut board =
        TaskBoard::mount(&bus, task_list(&server), Arc::clone(&updater), TaskScope::All).await;

    board
        .drag(
            DragLocation::new(TaskStatus::Todo, 1),
            Some(DragLocation::new(TaskStatus::InProgress, 1)),
        )
        .unwrap();
    assert_eq!(column_ids(&board, TaskStatus::InProgress), vec![3, 2]);

    match next_event(&mut board).await {
        BoardEvent::StatusUpdateFailed {
            task_id,
            status,
            error,
            rolled_back,
        } => {
            assert_eq!(task_id, TaskId(2));
            assert_eq!(status, TaskStatus::InProgress);
            assert!(error.contains("Task is locked"));
            assert!(rolled_back);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![1, 2]);
    assert_eq!(column_ids(&board, TaskStatus::InProgress), vec![3]);
    assert_eq!(board.board().column(TaskStatus::Todo)[1].status, TaskStatus::Todo);
}

#[tokio::test]
async fn failure_after_rebuild_leaves_canonical_board() {
    let server = server(vec![task(1, TaskStatus::Todo, 1)]);
    let updater = RecordingUpdater::new(&server);
    updater.reject_next("conflict");
    let bus = Arc::new(UpdateBus::new());
    let mut board =
        TaskBoard::mount(&bus, task_list(&server), Arc::clone(&updater), TaskScope::All).await;

    board
        .drag(
            DragLocation::new(TaskStatus::Todo, 0),
            Some(DragLocation::new(TaskStatus::Completed, 0)),
        )
        .unwrap();

    // The server moved it to in-progress meanwhile; its list arrives first.
    server.lock()[0].status = TaskStatus::InProgress;
    board.refresh().await;
    assert_eq!(column_ids(&board, TaskStatus::InProgress), vec![1]);

    match next_event(&mut board).await {
        BoardEvent::StatusUpdateFailed { rolled_back, .. } => assert!(!rolled_back),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(column_ids(&board, TaskStatus::InProgress), vec![1]);
    assert!(column_ids(&board, TaskStatus::Todo).is_empty());
}

#[tokio::test]
async fn drop_outside_columns_changes_nothing() {
    let server = server(vec![task(1, TaskStatus::Todo, 1)]);
    let updater = RecordingUpdater::new(&server);
    let bus = Arc::new(UpdateBus::new());
    let mut board =
        TaskBoard::mount(&bus, task_list(&server), Arc::clone(&updater), TaskScope::All).await;

    let outcome = board
        .drag(DragLocation::new(TaskStatus::Todo, 0), None)
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Unchanged);
    assert!(board
        .drag(
            DragLocation::new(TaskStatus::Completed, 0),
            Some(DragLocation::new(TaskStatus::Todo, 0))
        )
        .is_err());
    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![1]);
    assert!(updater.calls().is_empty());
}

#[tokio::test]
async fn scoped_board_shows_only_assigned_tasks() {
    let server = server(vec![
        task(1, TaskStatus::Todo, 7),
        task(2, TaskStatus::Todo, 8),
        task(3, TaskStatus::Completed, 7),
    ]);
    let updater = RecordingUpdater::new(&server);
    let bus = Arc::new(UpdateBus::new());
    let board = TaskBoard::mount(
        &bus,
        task_list(&server),
        updater,
        TaskScope::AssignedTo(UserId(7)),
    )
    .await;

    assert_eq!(column_ids(&board, TaskStatus::Todo), vec![1]);
    assert_eq!(column_ids(&board, TaskStatus::Completed), vec![3]);
    assert_eq!(board.board().len(), 2);
}
