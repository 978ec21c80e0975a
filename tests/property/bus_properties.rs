// Test-specific lint overrides: property tests use unwrap freely.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::missing_panics_doc
)]

//! Property tests for the update bus.
//!
//! 1. A domain's generation equals the number of events published for it,
//!    and every subscriber sees strictly increasing generations.
//! 2. Publishing to one domain never runs callbacks of another.
//! 3. Subscribers of the same domain are independent: dropping some stops
//!    their callbacks at once and leaves the rest seeing every generation.
//! 4. Dispatching arbitrary push frames never moves a counter backwards.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use workpulse::bus::{Domain, UpdateBus};
use workpulse_proto::push::PushFrame;

fn arb_domain() -> impl Strategy<Value = Domain> {
    (0..Domain::ALL.len()).prop_map(|i| Domain::ALL[i])
}

fn arb_message_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("TaskAssigned".to_string()),
        Just("EmployeeUpdated".to_string()),
        Just("LeaveRequestSubmitted".to_string()),
        Just("PayrollProcessed".to_string()),
        Just("NewChatMessage".to_string()),
        Just("LeaveApproved".to_string()),
        "[A-Za-z]{0,12}",
    ]
}

proptest! {
    #[test]
    fn generations_count_publishes(events in prop::collection::vec(arb_domain(), 0..64)) {
        let bus = Arc::new(UpdateBus::new());
        let seen: Vec<Arc<Mutex<Vec<u64>>>> =
            Domain::ALL.iter().map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
        let _subs: Vec<_> = Domain::ALL
            .iter()
            .zip(&seen)
            .map(|(&domain, log)| {
                let log = Arc::clone(log);
                bus.subscribe(domain, move |generation| log.lock().push(generation))
            })
            .collect();

        for &domain in &events {
            bus.publish_domain_event(domain).unwrap();
        }

        for (domain, log) in Domain::ALL.iter().zip(&seen) {
            let published = events.iter().filter(|d| *d == domain).count() as u64;
            prop_assert_eq!(bus.generation(*domain), published);

            let log = log.lock();
            let expected: Vec<u64> = (1..=published).collect();
            prop_assert_eq!(&*log, &expected);
        }
    }

    #[test]
    fn publishing_one_domain_leaves_others_quiet(
        target in arb_domain(),
        count in 1_usize..16,
    ) {
        let bus = Arc::new(UpdateBus::new());
        let calls: Vec<Arc<Mutex<usize>>> =
            Domain::ALL.iter().map(|_| Arc::new(Mutex::new(0))).collect();
        let _subs: Vec<_> = Domain::ALL
            .iter()
            .zip(&calls)
            .map(|(&domain, n)| {
                let n = Arc::clone(n);
                bus.subscribe(domain, move |_| *n.lock() += 1)
            })
            .collect();

        for _ in 0..count {
            bus.publish_domain_event(target);
        }

        for (domain, n) in Domain::ALL.iter().zip(&calls) {
            let expected = if *domain == target { count } else { 0 };
            prop_assert_eq!(*n.lock(), expected);
            if *domain != target {
                prop_assert_eq!(bus.generation(*domain), 0);
            }
        }
    }

    #[test]
    fn dropped_subscribers_stop_while_others_continue(
        domain in arb_domain(),
        keep in prop::collection::vec(any::<bool>(), 1..8),
        before in 0_u64..6,
        after in 1_u64..6,
    ) {
        let bus = Arc::new(UpdateBus::new());
        let logs: Vec<Arc<Mutex<Vec<u64>>>> =
            keep.iter().map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
        let subs: Vec<_> = logs
            .iter()
            .map(|log| {
                let log = Arc::clone(log);
                bus.subscribe(domain, move |generation| log.lock().push(generation))
            })
            .collect();

        for _ in 0..before {
            bus.publish_domain_event(domain);
        }
        let survivors: Vec<_> = subs
            .into_iter()
            .zip(&keep)
            .filter_map(|(sub, &kept)| kept.then_some(sub))
            .collect();
        prop_assert_eq!(bus.subscriber_count(domain), survivors.len());

        for _ in 0..after {
            bus.publish_domain_event(domain);
        }

        for (log, &kept) in logs.iter().zip(&keep) {
            let last = if kept { before + after } else { before };
            let expected: Vec<u64> = (1..=last).collect();
            prop_assert_eq!(&*log.lock(), &expected);
        }
        drop(survivors);
        prop_assert_eq!(bus.subscriber_count(domain), 0);
    }

    #[test]
    fn dispatch_never_moves_counters_backwards(
        messages in prop::collection::vec(arb_message_type(), 0..32),
    ) {
        let bus = UpdateBus::new();
        let mut last = [0_u64; 7];
        for message in messages {
            bus.dispatch_frame(&PushFrame::notification(message));
            for domain in Domain::ALL {
                let now = bus.generation(domain);
                prop_assert!(now >= last[domain.index()]);
                last[domain.index()] = now;
            }
        }
    }
}
