//! `WorkPulse`: live terminal view of the portal's task board.
//!
//! Connects to the portal's notification hub, mounts the task board and
//! the notification bell, and prints them again whenever a push message
//! makes them stale. Configuration via CLI flags, environment variables,
//! or config file (`~/.config/workpulse/config.toml`).
//!
//! ```bash
//! cargo run --bin workpulse -- --api http://localhost:5000/api \
//!     --token "$TOKEN" --user-id 4 --role employee
//!
//! # Move task 12 to "in progress" once the board has loaded
//! cargo run --bin workpulse -- --api http://localhost:5000/api --move 12=in_progress
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use workpulse::api::RestClient;
use workpulse::board::{BoardEvent, DragLocation, TaskBoard, TaskScope};
use workpulse::config::{CliArgs, ClientConfig};
use workpulse::notify::NotificationCenter;
use workpulse::session::{self, ScreenFeed, Session};
use workpulse::transport::{ConnectionState, static_token};
use workpulse::view::{DataView, Fetch};
use workpulse_proto::task::{TaskId, TaskStatus};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("workpulse starting");

    let Some(api_base) = config.api_base_url.clone() else {
        eprintln!("error: no API base URL (use --api or [api] base_url)");
        return ExitCode::FAILURE;
    };
    let move_request = match cli.move_task.as_deref().map(parse_move).transpose() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let tokens = static_token(config.token.clone());
    let api = match RestClient::new(&api_base, Arc::clone(&tokens), config.request_timeout) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let session = match session::create_session(&config, tokens) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    run(&session, &api, &config, move_request).await;

    session::destroy_session(session);
    tracing::info!("workpulse exiting");
    ExitCode::SUCCESS
}

/// Watch loop: reprint whatever changed until Ctrl-C.
async fn run(
    session: &Session,
    api: &RestClient,
    config: &ClientConfig,
    move_request: Option<(TaskId, TaskStatus)>,
) {
    let bus = session.bus();
    let scope = config.user_id.map_or(TaskScope::All, |user| {
        if config.role.can_assign_tasks() {
            TaskScope::AssignedBy(user)
        } else {
            TaskScope::AssignedTo(user)
        }
    });

    let mut board = TaskBoard::mount(bus, api.list("tasks"), Arc::new(api.clone()), scope).await;
    let notifications =
        NotificationCenter::mount(bus, api.list("notifications"), config.notification_window).await;
    let mut side_views = Vec::new();
    for feed in session::task_screen_feeds(config.role) {
        if feed.path == "tasks" {
            continue;
        }
        let fetcher: workpulse::api::ListEndpoint<serde_json::Value> = api.list(feed.path);
        side_views.push((feed, DataView::mount(feed.path, bus, &[feed.domain], fetcher).await));
    }

    print_board(&board);
    print_side_views(&side_views);
    print_notifications(&notifications);

    if let Some((task_id, status)) = move_request {
        request_move(&mut board, task_id, status);
    }

    let mut connection = session.watch_connection();
    let mut notification_watch = notifications.watch();
    let mut board_watch = board.watch();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            Ok(()) = board_watch.changed() => {
                if board.sync() {
                    print_board(&board);
                }
                if let Some(notice) = board.notice() {
                    println!("! {notice}");
                }
            }
            Ok(()) = notification_watch.changed() => {
                print_notifications(&notifications);
            }
            Some(event) = board.next_event() => {
                report(&event);
                print_board(&board);
            }
            Ok(()) = connection.changed() => {
                let state = *connection.borrow_and_update();
                println!("push channel {state}");
                if state == ConnectionState::Failed {
                    println!("! live updates stopped; restart to reconnect");
                }
            }
            _ = &mut interrupted => {
                tracing::info!("interrupted");
                break;
            }
        }
    }
}

fn request_move<F, U>(board: &mut TaskBoard<F, U>, task_id: TaskId, status: TaskStatus)
where
    F: Fetch<workpulse_proto::task::Task>,
    U: workpulse::api::StatusUpdater,
{
    let Some(source) = board.board().position(task_id) else {
        println!("! task {task_id} is not on this board");
        return;
    };
    let destination = DragLocation::new(status, board.board().column(status).len());
    match board.drag(source, Some(destination)) {
        Ok(outcome) => tracing::info!(?outcome, "move applied"),
        Err(e) => println!("! {e}"),
    }
    print_board(board);
}

fn report(event: &BoardEvent) {
    match event {
        BoardEvent::StatusUpdated { task_id, status } => {
            println!("task {task_id} saved as {status}");
        }
        BoardEvent::StatusUpdateFailed {
            task_id,
            status,
            error,
            rolled_back,
        } => {
            let suffix = if *rolled_back { " (moved back)" } else { "" };
            println!("! could not move task {task_id} to {status}: {error}{suffix}");
        }
    }
}

fn print_board<F, U>(board: &TaskBoard<F, U>)
where
    F: Fetch<workpulse_proto::task::Task>,
    U: workpulse::api::StatusUpdater,
{
    for status in TaskStatus::ALL {
        let column = board.board().column(status);
        println!("[{status}] {}", column.len());
        for task in column {
            println!("  #{} {} ({:?})", task.id, task.title, task.priority);
        }
    }
}

fn print_side_views<F: Fetch<serde_json::Value>>(views: &[(ScreenFeed, DataView<serde_json::Value, F>)]) {
    for (feed, view) in views {
        let state = view.state();
        println!("{}: {} records", view.name(), feed.visible(&state.records).count());
        if let Some(notice) = state.notice {
            println!("! {notice}");
        }
    }
}

fn print_notifications<F: Fetch<workpulse_proto::notification::NotificationRecord>>(
    center: &NotificationCenter<F>,
) {
    let chat = if center.has_new_chat() { " +chat" } else { "" };
    println!("notifications: {} unread{chat}", center.unread_count());
    for n in center.recent() {
        println!("  {} {}", n.created_at.format("%Y-%m-%d %H:%M"), n.message);
    }
}

/// Parse `ID=STATUS`, e.g. `12=in_progress`.
fn parse_move(s: &str) -> Result<(TaskId, TaskStatus), String> {
    let (id, status) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=STATUS, got {s}"))?;
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid task id {id}: {e}"))?;
    let status = TaskStatus::ALL
        .into_iter()
        .find(|st| st.as_str() == status.trim())
        .ok_or_else(|| format!("unknown status {status}"))?;
    Ok((TaskId(id), status))
}

/// Initialize logging.
///
/// Logs go to `file_path` through a non-blocking writer when given,
/// otherwise to stderr so they don't interleave with the board on stdout.
/// The returned [`WorkerGuard`] must be held until shutdown to flush
/// buffered entries.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
