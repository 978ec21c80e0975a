//! Session lifecycle: one bus and one push channel per signed-in user.
//!
//! Creating a session starts the push channel and routes its
//! `ReceiveNotification` frames into a fresh [`UpdateBus`]. Destroying it
//! (or dropping it) stops the channel and closes the bus, so a re-login
//! never sees counters or subscribers from the previous session.

use std::sync::Arc;

use tokio::sync::watch;
use workpulse_proto::employee::Role;
use workpulse_proto::push::RECEIVE_NOTIFICATION;

use crate::bus::{Domain, UpdateBus};
use crate::config::{ClientConfig, ReconnectConfig};
use crate::transport::ws::WsConnector;
use crate::transport::{ConnectionState, Connector, PushChannel, TokenProvider, TransportError};

/// A signed-in session.
pub struct Session {
    bus: Arc<UpdateBus>,
    channel: PushChannel,
}

impl Session {
    /// Start a session over `connector`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create<C: Connector>(
        reconnect: &ReconnectConfig,
        connector: C,
        tokens: TokenProvider,
    ) -> Self {
        let bus = Arc::new(UpdateBus::new());
        let channel = PushChannel::new(reconnect.clone());

        let weak = Arc::downgrade(&bus);
        channel.on(RECEIVE_NOTIFICATION, move |frame| {
            if let Some(bus) = weak.upgrade() {
                let classification = bus.dispatch_frame(frame);
                tracing::debug!(?classification, "push notification dispatched");
            }
        });
        channel.connect(connector, tokens);

        tracing::info!("session created");
        Self { bus, channel }
    }

    /// The session's update bus.
    #[must_use]
    pub const fn bus(&self) -> &Arc<UpdateBus> {
        &self.bus
    }

    /// Current push connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Receiver observing push connection state changes.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.channel.watch_state()
    }

    /// End the session. Equivalent to dropping it.
    pub fn destroy(self) {}

    fn teardown(&self) {
        self.channel.disconnect();
        self.bus.close();
        tracing::info!("session destroyed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Start a session against the hub named by `config`, presenting `tokens`.
///
/// # Errors
///
/// [`TransportError::Protocol`] if no hub endpoint can be derived from the
/// configuration.
pub fn create_session(config: &ClientConfig, tokens: TokenProvider) -> Result<Session, TransportError> {
    let endpoint = config.push_endpoint()?;
    let connector = WsConnector::new(endpoint).with_connect_timeout(config.connect_timeout);
    Ok(Session::create(&config.reconnect, connector, tokens))
}

/// End a session.
pub fn destroy_session(session: Session) {
    session.destroy();
}

/// Domains the task screen depends on for a user with `role`.
///
/// Task-assigning roles also load leave requests to show availability.
#[must_use]
pub fn task_view_domains(role: Role) -> Vec<Domain> {
    if role.can_assign_tasks() {
        vec![Domain::Tasks, Domain::Employees, Domain::Leave]
    } else {
        vec![Domain::Tasks, Domain::Employees]
    }
}

/// One collection the task screen loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenFeed {
    /// Domain that triggers a refetch.
    pub domain: Domain,
    /// List endpoint, relative to the API base.
    pub path: &'static str,
    /// Only records whose `status` is `approved` are shown.
    pub approved_only: bool,
}

impl ScreenFeed {
    /// Whether `record` is shown on the task screen.
    #[must_use]
    pub fn keeps(&self, record: &serde_json::Value) -> bool {
        !self.approved_only
            || record
                .get("status")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|status| status.eq_ignore_ascii_case("approved"))
    }

    /// The records of `records` shown on the task screen.
    pub fn visible<'a>(
        &'a self,
        records: &'a [serde_json::Value],
    ) -> impl Iterator<Item = &'a serde_json::Value> + 'a {
        records.iter().filter(|record| self.keeps(record))
    }
}

/// Collections the task screen loads for a user with `role`.
///
/// Task-assigning roles get the full employee directory; everyone else
/// only the names list. Leave counts toward availability only once
/// approved.
#[must_use]
pub fn task_screen_feeds(role: Role) -> Vec<ScreenFeed> {
    task_view_domains(role)
        .into_iter()
        .map(|domain| ScreenFeed {
            domain,
            path: match domain {
                Domain::Employees if !role.can_assign_tasks() => "employees/names",
                Domain::Employees => "employees",
                Domain::Leave => "leave-requests",
                _ => "tasks",
            },
            approved_only: domain == Domain::Leave,
        })
        .collect()
}
