//! Update bus: per-domain change counters and targeted events.
//!
//! The bus is the only writer of the domain counters. Data views subscribe
//! to the domains they render and refetch when a counter moves. Targeted
//! events (a new chat message) go to their own subscribers and leave every
//! counter untouched.
//!
//! Publishing snapshots the subscriber list under the lock and invokes the
//! callbacks after releasing it, so a callback may subscribe, unsubscribe,
//! or publish. A subscription dropped before its turn in an ongoing publish
//! is skipped.

pub mod classify;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use workpulse_proto::push::PushFrame;

pub use classify::{Classification, classify};

/// A category of server data with its own change counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Task board.
    Tasks,
    /// Employee directory.
    Employees,
    /// Leave requests.
    Leave,
    /// Company announcements.
    Announcements,
    /// Goals and performance reviews.
    Goals,
    /// Payroll runs and payslips.
    Payroll,
    /// The bell notification list.
    Notifications,
}

impl Domain {
    /// Every domain.
    pub const ALL: [Self; 7] = [
        Self::Tasks,
        Self::Employees,
        Self::Leave,
        Self::Announcements,
        Self::Goals,
        Self::Payroll,
        Self::Notifications,
    ];

    /// Position of this domain in [`Domain::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Tasks => 0,
            Self::Employees => 1,
            Self::Leave => 2,
            Self::Announcements => 3,
            Self::Goals => 4,
            Self::Payroll => 5,
            Self::Notifications => 6,
        }
    }

    /// Lowercase name, used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Employees => "employees",
            Self::Leave => "leave",
            Self::Announcements => "announcements",
            Self::Goals => "goals",
            Self::Payroll => "payroll",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered to specific subscribers instead of bumping a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetedKind {
    /// A chat message arrived for the user.
    ChatMessage,
}

type DomainCallback = dyn Fn(u64) + Send + Sync;
type TargetedCallback = dyn Fn(&Value) + Send + Sync;

struct Entry<F: ?Sized> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Arc<F>,
}

impl<F: ?Sized> Clone for Entry<F> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            callback: Arc::clone(&self.callback),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Key {
    Domain(Domain),
    Targeted(TargetedKind),
}

#[derive(Default)]
struct Inner {
    counters: [u64; Domain::ALL.len()],
    domain_subs: HashMap<Domain, Vec<Entry<DomainCallback>>>,
    targeted_subs: HashMap<TargetedKind, Vec<Entry<TargetedCallback>>>,
    next_id: u64,
    closed: bool,
}

/// The per-session update bus. Shared as `Arc<UpdateBus>`.
#[derive(Default)]
pub struct UpdateBus {
    inner: Mutex<Inner>,
}

/// Keeps a bus callback registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<UpdateBus>,
    key: Key,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Remove the callback. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.key, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl UpdateBus {
    /// Create an empty bus with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for changes to `domain`.
    ///
    /// The callback receives the domain's new generation. On a closed bus
    /// the returned guard is inert.
    pub fn subscribe(
        self: &Arc<Self>,
        domain: Domain,
        callback: impl Fn(u64) + Send + Sync + 'static,
    ) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        if inner.closed {
            active.store(false, Ordering::Release);
        } else {
            inner.domain_subs.entry(domain).or_default().push(Entry {
                id,
                active: Arc::clone(&active),
                callback: Arc::new(callback),
            });
        }
        Subscription {
            bus: Arc::downgrade(self),
            key: Key::Domain(domain),
            id,
            active,
        }
    }

    /// Register `callback` for targeted events of `kind`.
    pub fn subscribe_targeted(
        self: &Arc<Self>,
        kind: TargetedKind,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        if inner.closed {
            active.store(false, Ordering::Release);
        } else {
            inner.targeted_subs.entry(kind).or_default().push(Entry {
                id,
                active: Arc::clone(&active),
                callback: Arc::new(callback),
            });
        }
        Subscription {
            bus: Arc::downgrade(self),
            key: Key::Targeted(kind),
            id,
            active,
        }
    }

    /// Advance `domain`'s counter and notify its subscribers in
    /// subscription order.
    ///
    /// Returns the new generation, or `None` once the bus is closed.
    pub fn publish_domain_event(&self, domain: Domain) -> Option<u64> {
        let (generation, subscribers) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return None;
            }
            let counter = &mut inner.counters[domain.index()];
            *counter += 1;
            let generation = *counter;
            let subscribers = inner.domain_subs.get(&domain).cloned().unwrap_or_default();
            (generation, subscribers)
        };

        tracing::debug!(%domain, generation, subscribers = subscribers.len(), "domain advanced");
        for entry in subscribers {
            if entry.active.load(Ordering::Acquire) {
                (entry.callback)(generation);
            }
        }
        Some(generation)
    }

    /// Deliver `payload` to the subscribers of `kind`.
    ///
    /// Returns how many callbacks ran.
    pub fn publish_targeted_event(&self, kind: TargetedKind, payload: &Value) -> usize {
        let subscribers = {
            let inner = self.inner.lock();
            if inner.closed {
                return 0;
            }
            inner.targeted_subs.get(&kind).cloned().unwrap_or_default()
        };

        let mut delivered = 0;
        for entry in subscribers {
            if entry.active.load(Ordering::Acquire) {
                (entry.callback)(payload);
                delivered += 1;
            }
        }
        tracing::debug!(?kind, delivered, "targeted event delivered");
        delivered
    }

    /// Classify a push frame and publish the resulting events.
    ///
    /// Unrecognized messages (and frames without a string message type)
    /// advance every domain. Every non-targeted message also advances
    /// [`Domain::Notifications`], since the server records a notification
    /// alongside each change it pushes.
    pub fn dispatch_frame(&self, frame: &PushFrame) -> Classification {
        let classification = frame
            .message_type()
            .map_or(Classification::Unrecognized, classify);

        match classification {
            Classification::Targeted(kind) => {
                let payload = frame.arguments.get(1).cloned().unwrap_or(Value::Null);
                self.publish_targeted_event(kind, &payload);
            }
            Classification::Domain(domain) => {
                self.publish_domain_event(domain);
                if domain != Domain::Notifications {
                    self.publish_domain_event(Domain::Notifications);
                }
            }
            Classification::Unrecognized => {
                tracing::debug!(
                    message_type = frame.message_type().unwrap_or("<none>"),
                    "unrecognized push message, refreshing everything"
                );
                for domain in Domain::ALL {
                    self.publish_domain_event(domain);
                }
            }
        }
        classification
    }

    /// Current generation of `domain`.
    #[must_use]
    pub fn generation(&self, domain: Domain) -> u64 {
        self.inner.lock().counters[domain.index()]
    }

    /// Number of live subscribers of `domain`.
    #[must_use]
    pub fn subscriber_count(&self, domain: Domain) -> usize {
        self.inner.lock().domain_subs.get(&domain).map_or(0, Vec::len)
    }

    /// Drop every subscription and ignore further publishes.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        for entry in inner.domain_subs.drain().flat_map(|(_, v)| v) {
            entry.active.store(false, Ordering::Release);
        }
        for entry in inner.targeted_subs.drain().flat_map(|(_, v)| v) {
            entry.active.store(false, Ordering::Release);
        }
        tracing::debug!("update bus closed");
    }

    /// Whether [`UpdateBus::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn remove(&self, key: Key, id: u64) {
        let mut inner = self.inner.lock();
        match key {
            Key::Domain(domain) => {
                if let Some(entries) = inner.domain_subs.get_mut(&domain) {
                    entries.retain(|e| e.id != id);
                }
            }
            Key::Targeted(kind) => {
                if let Some(entries) = inner.targeted_subs.get_mut(&kind) {
                    entries.retain(|e| e.id != id);
                }
            }
        }
    }
}
