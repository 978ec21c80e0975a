//! `WorkPulse` development hub library.
//!
//! A stand-in for the portal's notification hub: it accepts WebSocket
//! clients on `/notificationHub` and broadcasts every push frame posted to
//! `/notify` to all of them. Exposed as a library for tests and embedding.

pub mod config;
pub mod hub;
