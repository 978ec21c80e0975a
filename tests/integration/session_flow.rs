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

//! End-to-end session tests: push frames in, refetches out.
//!
//! A session routes hub frames into its bus; mounted views refetch the
//! domains a message touches. Covers:
//! - an unrecognized message (`LeaveApproved`) refreshes every view
//! - a task message refreshes the task views and the bell, nothing else
//! - a view dropped before the message arrives fetches nothing more
//! - chat messages set the bell badge without a refetch
//! - destroying a session stops delivery to views built on it
//!
//! Verification command: `cargo test --test session_flow`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use workpulse::api::ApiError;
use workpulse::bus::Domain;
use workpulse::config::{ClientConfig, ReconnectConfig};
use workpulse::notify::{DEFAULT_WINDOW, NotificationCenter};
use workpulse::session::{self, Session};
use workpulse::transport::loopback::{LoopbackConnector, LoopbackHub};
use workpulse::transport::{ConnectionState, static_token};
use workpulse::view::{DataView, Fetch, fetch_fn};
use workpulse_hub::hub::{HubState, start_server_with_state};
use workpulse_proto::notification::NotificationRecord;
use workpulse_proto::push::{NEW_CHAT_MESSAGE, PushFrame, RECEIVE_NOTIFICATION};

// =============================================================================
// Test helpers
// =============================================================================

fn quick() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_attempts: None,
        ..ReconnectConfig::default()
    }
}

/// A fetcher that counts its calls and returns one record per call so far.
fn counting(calls: &Arc<AtomicUsize>) -> impl Fetch<Value> + use<> {
    let calls = Arc::clone(calls);
    fetch_fn(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok::<_, ApiError>(vec![json!({ "fetch": n })]) }
    })
}

fn no_notifications() -> impl Fetch<NotificationRecord> {
    fetch_fn(|| async { Ok::<_, ApiError>(Vec::new()) })
}

async fn connected_session() -> (Session, LoopbackHub) {
    let (connector, hub) = LoopbackConnector::pair();
    let session = Session::create(&quick(), connector, static_token(Some("t".into())));
    let mut state = session.watch_connection();
    tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    (session, hub)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

struct Screen {
    tasks: Arc<AtomicUsize>,
    employees: Arc<AtomicUsize>,
    leave: Arc<AtomicUsize>,
    notifications: Arc<AtomicUsize>,
    /// Keeps the views mounted.
    _views: Vec<Box<dyn std::any::Any>>,
}

async fn mount_screen(session: &Session) -> Screen {
    let bus = session.bus();
    let tasks = Arc::new(AtomicUsize::new(0));
    let employees = Arc::new(AtomicUsize::new(0));
    let leave = Arc::new(AtomicUsize::new(0));
    let notifications = Arc::new(AtomicUsize::new(0));

    let mut views: Vec<Box<dyn std::any::Any>> = Vec::new();
    for (name, domain, calls) in [
        ("tasks", Domain::Tasks, &tasks),
        ("employees", Domain::Employees, &employees),
        ("leave", Domain::Leave, &leave),
        ("notifications", Domain::Notifications, &notifications),
    ] {
        views.push(Box::new(DataView::mount(name, bus, &[domain], counting(calls)).await));
    }

    Screen {
        tasks,
        employees,
        leave,
        notifications,
        _views: views,
    }
}

fn counts(screen: &Screen) -> [usize; 4] {
    [
        screen.tasks.load(Ordering::SeqCst),
        screen.employees.load(Ordering::SeqCst),
        screen.leave.load(Ordering::SeqCst),
        screen.notifications.load(Ordering::SeqCst),
    ]
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn unrecognized_message_refreshes_every_view() {
    let (session, hub) = connected_session().await;
    let screen = mount_screen(&session).await;
    assert_eq!(counts(&screen), [1, 1, 1, 1]);

    assert!(hub.push(PushFrame::notification("LeaveApproved")));
    settle().await;

    assert_eq!(counts(&screen), [2, 2, 2, 2]);
    for domain in Domain::ALL {
        assert_eq!(session.bus().generation(domain), 1);
    }
}

#[tokio::test]
async fn task_message_refreshes_tasks_and_bell_only() {
    let (session, hub) = connected_session().await;
    let screen = mount_screen(&session).await;

    assert!(hub.push(PushFrame::notification("TaskStatusChanged")));
    settle().await;

    assert_eq!(counts(&screen), [2, 1, 1, 2]);
    assert_eq!(session.bus().generation(Domain::Tasks), 1);
    assert_eq!(session.bus().generation(Domain::Employees), 0);
}

#[tokio::test]
async fn dropped_view_fetches_nothing_more() {
    let (session, hub) = connected_session().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let view = DataView::mount("employees", session.bus(), &[Domain::Employees], counting(&calls)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.bus().subscriber_count(Domain::Employees), 1);

    view.unmount();
    assert_eq!(session.bus().subscriber_count(Domain::Employees), 0);

    assert!(hub.push(PushFrame::notification("EmployeeAdded")));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.bus().generation(Domain::Employees), 1);
}

#[tokio::test]
async fn chat_message_sets_badge_without_refetching() {
    let (session, hub) = connected_session().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let fetches = Arc::clone(&calls);
    let fetcher = fetch_fn(move || {
        fetches.fetch_add(1, Ordering::SeqCst);
        async { Ok::<Vec<NotificationRecord>, ApiError>(Vec::new()) }
    });
    let center = NotificationCenter::mount(session.bus(), fetcher, DEFAULT_WINDOW).await;
    assert!(!center.has_new_chat());

    assert!(hub.push(PushFrame::new(
        RECEIVE_NOTIFICATION,
        vec![json!(NEW_CHAT_MESSAGE), json!({ "chatId": 3, "senderId": 8 })],
    )));
    settle().await;

    assert!(center.has_new_chat());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.bus().generation(Domain::Notifications), 0);
}

#[tokio::test]
async fn destroyed_session_stops_delivery() {
    let (session, hub) = connected_session().await;
    let bus = Arc::clone(session.bus());
    let screen = mount_screen(&session).await;
    let _bell = NotificationCenter::mount(&bus, no_notifications(), DEFAULT_WINDOW).await;

    session::destroy_session(session);
    settle().await;

    assert!(!hub.push(PushFrame::notification("TaskAssigned")));
    assert_eq!(bus.publish_domain_event(Domain::Tasks), None);
    settle().await;
    assert_eq!(counts(&screen), [1, 1, 1, 1]);
}

#[tokio::test]
async fn session_over_live_hub_refreshes_views() {
    let state = Arc::new(HubState::with_tokens(vec!["jwt".to_string()]));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();

    let config = ClientConfig {
        hub_url: Some(format!("ws://{addr}/notificationHub")),
        reconnect: quick(),
        token: Some("jwt".to_string()),
        ..ClientConfig::default()
    };
    let session = session::create_session(&config, static_token(config.token.clone())).unwrap();
    let mut conn = session.watch_connection();
    tokio::time::timeout(
        Duration::from_secs(5),
        conn.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    while state.connected_clients() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let view = DataView::mount("leave", session.bus(), &[Domain::Leave], counting(&calls)).await;
    let mut watch = view.watch();
    watch.borrow_and_update();

    state.broadcast(&PushFrame::notification("LeaveRequestUpdated"));
    tokio::time::timeout(Duration::from_secs(5), watch.changed())
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while view.state().revision < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(view.records()[0]["fetch"], 2);
    session::destroy_session(session);
}
